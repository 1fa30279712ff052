//! Accelerator device handles
//!
//! This crate wraps a single accelerator device behind a [`DeviceHandle`]: an
//! identity-bearing view over an owned [`DeviceState`] that manages the
//! device's execution streams, a reusable stream pool and an event pool.
//!
//! Backends plug in through the [`StreamExecutor`] trait. An in-process
//! [`host`] backend is always available; an OpenCL backend is built with the
//! `opencl` feature.

pub mod allocation;
pub mod device;
pub mod error;
pub mod event_pool;
pub mod executor;
pub mod host;
#[cfg(feature = "opencl")]
pub mod opencl;
pub mod registry;
pub mod state;

pub use allocation::AllocationModel;
pub use device::DeviceHandle;
pub use error::{Error, Result};
pub use event_pool::{EventHandle, EventPool};
pub use executor::{Stream, StreamExecutor, StreamId};
pub use registry::{DeviceOptions, DeviceRegistry, Platform};
pub use state::DeviceState;
