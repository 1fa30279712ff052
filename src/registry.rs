//! Device enumeration: one [`DeviceHandle`] per executor of a platform.

use crate::allocation::AllocationModel;
use crate::device::DeviceHandle;
use crate::executor::StreamExecutor;
use crate::{Error, Result};

/// A source of devices, also acting as the client every handle refers to.
pub trait Platform: Send + Sync {
    type Executor: StreamExecutor;

    fn name(&self) -> &str;

    fn executors(&self) -> &[Self::Executor];
}

/// Settings applied to every device of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOptions {
    pub allocation_model: AllocationModel,
    /// When false, callers block on each stream after enqueueing work.
    pub asynchronous: bool,
    pub allow_event_reuse: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            allocation_model: AllocationModel::ComputeSynchronized,
            asynchronous: true,
            allow_event_reuse: true,
        }
    }
}

/// Owns the device handles of one platform. Dropping the registry tears down
/// every device.
pub struct DeviceRegistry<'a, P: Platform> {
    platform: &'a P,
    devices: Vec<DeviceHandle<'a, P::Executor, P>>,
}

impl<'a, P: Platform> DeviceRegistry<'a, P> {
    pub fn new(platform: &'a P, options: DeviceOptions) -> Result<Self> {
        let devices = platform
            .executors()
            .iter()
            .enumerate()
            .map(|(index, executor)| {
                let id = i32::try_from(index).map_err(|_| {
                    Error::Backend(format!("Device index {} exceeds the id range", index))
                })?;
                DeviceHandle::new(
                    id,
                    executor,
                    platform,
                    options.allocation_model,
                    options.asynchronous,
                    options.allow_event_reuse,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Registered {} device(s) on platform '{}'",
            devices.len(),
            platform.name()
        );
        Ok(DeviceRegistry { platform, devices })
    }

    pub fn platform(&self) -> &'a P {
        self.platform
    }

    pub fn devices(&self) -> &[DeviceHandle<'a, P::Executor, P>] {
        &self.devices
    }

    pub fn device(&self, id: i32) -> Option<&DeviceHandle<'a, P::Executor, P>> {
        self.devices.iter().find(|d| d.id() == id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostPlatform;

    #[test]
    fn one_handle_per_executor() {
        let platform = HostPlatform::new(2).unwrap();
        let options = DeviceOptions {
            allocation_model: AllocationModel::Synchronous,
            asynchronous: false,
            allow_event_reuse: true,
        };
        let registry = DeviceRegistry::new(&platform, options).unwrap();

        assert_eq!(registry.len(), 2);
        for (i, device) in registry.devices().iter().enumerate() {
            assert_eq!(device.id(), i as i32);
            assert_eq!(device.device_ordinal(), i as i32);
            assert!(std::ptr::eq(device.client(), &platform));
            assert_eq!(device.allocation_model(), AllocationModel::Synchronous);
        }
        assert!(registry.device(1).is_some());
        assert!(registry.device(2).is_none());
    }

    #[test]
    fn empty_platform_yields_empty_registry() {
        let platform = HostPlatform::new(0).unwrap();
        let registry = DeviceRegistry::new(&platform, DeviceOptions::default()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.platform().name(), "host");
    }
}
