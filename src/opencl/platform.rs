use crate::executor::{Stream, StreamExecutor, StreamId};
use crate::registry::Platform;
use crate::{Error, Result};
use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    device::{get_device_ids, Device, CL_DEVICE_TYPE_GPU},
    event::Event,
    platform::get_platforms,
};

fn enumeration_error(e: impl std::fmt::Display) -> Error {
    Error::Backend(format!("OpenCL enumeration failed: {}", e))
}

/// All GPU devices of one OpenCL platform.
pub struct OpenClPlatform {
    name: String,
    executors: Vec<OpenClExecutor>,
}

impl OpenClPlatform {
    pub fn new(platform_index: usize) -> Result<Self> {
        let platforms = get_platforms().map_err(enumeration_error)?;
        let platform = platforms
            .get(platform_index)
            .ok_or(Error::PlatformNotFound(platform_index))?;
        let name = platform
            .name()
            .unwrap_or_else(|_| "Unknown Platform".to_string());

        let device_ids =
            get_device_ids(platform.id(), CL_DEVICE_TYPE_GPU).map_err(enumeration_error)?;
        let executors = device_ids
            .into_iter()
            .enumerate()
            .map(|(index, id)| {
                let ordinal = i32::try_from(index).map_err(|_| {
                    Error::Backend(format!("OpenCL device index {} exceeds the ordinal range", index))
                })?;
                OpenClExecutor::new(ordinal, Device::new(id))
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "OpenCL platform {} ({}): {} GPU device(s)",
            platform_index,
            name,
            executors.len()
        );
        Ok(OpenClPlatform { name, executors })
    }
}

impl Platform for OpenClPlatform {
    type Executor = OpenClExecutor;

    fn name(&self) -> &str {
        &self.name
    }

    fn executors(&self) -> &[OpenClExecutor] {
        &self.executors
    }
}

pub struct OpenClExecutor {
    ordinal: i32,
    device: Device,
    context: Context,
}

impl OpenClExecutor {
    fn new(ordinal: i32, device: Device) -> Result<Self> {
        let context = Context::from_device(&device)?;
        log::debug!(
            "Created OpenCL context for device {} ({})",
            ordinal,
            device.name().unwrap_or_else(|_| "Unknown Device".to_string())
        );
        Ok(OpenClExecutor {
            ordinal,
            device,
            context,
        })
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    pub fn vendor(&self) -> String {
        self.device
            .vendor()
            .unwrap_or_else(|_| "Unknown Vendor".to_string())
    }

    /// Global memory size in bytes, zero if the driver does not report it.
    pub fn global_mem_size(&self) -> u64 {
        self.device.global_mem_size().unwrap_or(0)
    }
}

impl StreamExecutor for OpenClExecutor {
    type Stream = OpenClStream;
    type Event = OpenClEvent;

    fn device_ordinal(&self) -> i32 {
        self.ordinal
    }

    fn create_stream(&self) -> Result<OpenClStream> {
        let queue = CommandQueue::create_default_with_properties(&self.context, 0, 0)?;
        Ok(OpenClStream {
            id: StreamId::next(),
            queue,
        })
    }

    fn create_event(&self) -> Result<OpenClEvent> {
        Ok(OpenClEvent { marker: None })
    }

    fn record_event(&self, stream: &OpenClStream, event: &mut OpenClEvent) -> Result<()> {
        // SAFETY: an empty wait list references no foreign events.
        let marker = unsafe { stream.queue.enqueue_marker_with_wait_list(&[])? };
        event.marker = Some(marker);
        Ok(())
    }
}

/// A command queue on one device.
pub struct OpenClStream {
    id: StreamId,
    queue: CommandQueue,
}

impl OpenClStream {
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }
}

impl Stream for OpenClStream {
    fn id(&self) -> StreamId {
        self.id
    }

    fn block_host_until_done(&self) -> Result<()> {
        self.queue.finish()?;
        Ok(())
    }
}

/// Marker event; empty until first recorded.
pub struct OpenClEvent {
    marker: Option<Event>,
}

impl OpenClEvent {
    pub fn wait(&self) -> Result<()> {
        if let Some(marker) = &self.marker {
            marker.wait()?;
        }
        Ok(())
    }
}

/// Prints every OpenCL platform and the GPU executors it would provide.
pub fn list_devices() -> Result<()> {
    let platform_count = get_platforms().map_err(enumeration_error)?.len();
    println!("Available OpenCL Platforms and Devices:");
    if platform_count == 0 {
        println!("  No OpenCL platforms found.");
        return Ok(());
    }

    for index in 0..platform_count {
        let platform = match OpenClPlatform::new(index) {
            Ok(platform) => platform,
            Err(e) => {
                println!("\nPlatform {}: unavailable ({})", index, e);
                continue;
            }
        };
        println!("\nPlatform {}: {}", index, platform.name());
        if platform.executors().is_empty() {
            println!("  No GPU devices found on this platform.");
        }
        for executor in platform.executors() {
            println!(
                "  Device {}: {} ({}) - Memory: {} MB",
                executor.device_ordinal(),
                executor.device_name(),
                executor.vendor(),
                executor.global_mem_size() / (1024 * 1024)
            );
        }
    }
    Ok(())
}
