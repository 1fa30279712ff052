//! OpenCL backend
//!
//! This module exposes OpenCL GPU devices as stream executors: every device
//! gets its own context, streams are command queues and events are markers
//! enqueued on those queues.

mod platform;

pub use platform::{list_devices, OpenClEvent, OpenClExecutor, OpenClPlatform, OpenClStream};
