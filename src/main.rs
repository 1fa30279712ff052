//! Accelerator device probe
//!
//! Builds a device registry on the selected backend and exercises each
//! device's streams, stream pool and event pool once.

use accel_device::{
    AllocationModel, DeviceHandle, DeviceOptions, DeviceRegistry, Platform, Stream, StreamExecutor,
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// In-process worker threads, no accelerator required
    Host,
    /// OpenCL GPU devices (requires the `opencl` feature)
    Opencl,
}

/// Command line arguments for the device probe
#[derive(Parser, Debug)]
#[clap(
    name = "accel-device",
    about = "Enumerate accelerator devices and exercise their streams and pools.",
    version
)]
struct Args {
    /// Executor backend to build devices from
    #[clap(short, long, value_enum, default_value = "host")]
    backend: Backend,

    /// OpenCL platform index
    #[clap(short, long, default_value = "0")]
    platform: usize,

    /// Number of devices exposed by the host backend
    #[clap(long, default_value = "1")]
    host_devices: usize,

    /// Allocation model applied to every device
    #[clap(short, long, value_enum, default_value = "compute-synchronized")]
    allocation_model: AllocationModel,

    /// Block on each stream after enqueueing work
    #[clap(long)]
    synchronous: bool,

    /// Disable reuse of released events
    #[clap(long)]
    no_event_reuse: bool,

    /// Enable verbose logging
    #[clap(short, long)]
    verbose: bool,

    /// List available OpenCL platforms and devices and exit
    #[clap(long)]
    list_devices: bool,
}

impl Args {
    fn device_options(&self) -> DeviceOptions {
        DeviceOptions {
            allocation_model: self.allocation_model,
            asynchronous: !self.synchronous,
            allow_event_reuse: !self.no_event_reuse,
        }
    }
}

fn probe_device<E, C>(device: &DeviceHandle<'_, E, C>) -> Result<()>
where
    E: StreamExecutor,
    C: ?Sized,
{
    log::info!(
        "Device {}: ordinal {}, allocation model {}, asynchronous {}",
        device.id(),
        device.device_ordinal(),
        device.allocation_model(),
        device.asynchronous()
    );

    let stream = device
        .borrow_stream_from_pool()
        .with_context(|| format!("Failed to borrow a stream on device {}", device.id()))?;
    log::debug!("Borrowed stream {} from pool", stream.id());
    device.return_stream_to_pool(stream);

    let event = device
        .event_pool()
        .then_allocate_and_record_event(device.executor(), device.compute_stream())
        .with_context(|| format!("Failed to record an event on device {}", device.id()))?;
    log::debug!(
        "Recorded event #{} on compute stream {}",
        event.sequence_number(),
        device.compute_stream().id()
    );
    device.block_if_synchronous(device.compute_stream())?;

    device
        .synchronize_all_activity()
        .with_context(|| format!("Failed to synchronize device {}", device.id()))?;
    Ok(())
}

fn probe_platform<P: Platform>(platform: &P, options: DeviceOptions) -> Result<()> {
    let registry =
        DeviceRegistry::new(platform, options).context("Failed to build device registry")?;
    if registry.is_empty() {
        log::warn!("Platform '{}' exposes no devices", platform.name());
        return Ok(());
    }
    for device in registry.devices() {
        probe_device(device)?;
    }
    log::info!(
        "All {} device(s) on '{}' responded",
        registry.len(),
        platform.name()
    );
    Ok(())
}

#[cfg(feature = "opencl")]
fn run_opencl(args: &Args) -> Result<()> {
    let platform = accel_device::opencl::OpenClPlatform::new(args.platform)
        .with_context(|| format!("Failed to open OpenCL platform {}", args.platform))?;
    for executor in platform.executors() {
        log::info!(
            "OpenCL device {}: {}",
            executor.device_ordinal(),
            executor.device_name()
        );
    }
    probe_platform(&platform, args.device_options())
}

#[cfg(feature = "opencl")]
fn list_opencl_devices() -> Result<()> {
    accel_device::opencl::list_devices().context("Failed to list OpenCL devices")
}

#[cfg(not(feature = "opencl"))]
fn list_opencl_devices() -> Result<()> {
    anyhow::bail!("Device listing requires the `opencl` feature")
}

#[cfg(not(feature = "opencl"))]
fn run_opencl(_args: &Args) -> Result<()> {
    anyhow::bail!("OpenCL backend not available: rebuild with `--features opencl`")
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    if args.list_devices {
        return list_opencl_devices();
    }

    log::info!(
        "Starting device probe (backend: {:?}, allocation model: {})",
        args.backend,
        args.allocation_model
    );

    match args.backend {
        Backend::Host => {
            let platform = accel_device::host::HostPlatform::new(args.host_devices)
                .context("Invalid host device count")?;
            probe_platform(&platform, args.device_options())?;
        }
        Backend::Opencl => run_opencl(&args)?,
    }

    log::info!("Device probe finished.");
    Ok(())
}
