/// Errors surfaced by device state and executor backends.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Generic failure reported by an executor backend.
    #[error("backend error: {0}")]
    Backend(String),

    /// A stream stopped accepting work.
    #[error("stream {stream} failed: {msg}")]
    StreamFailed { stream: u64, msg: String },

    #[error("platform {0} not found")]
    PlatformNotFound(usize),

    #[cfg(feature = "opencl")]
    #[error("opencl error: {0}")]
    OpenCl(#[from] opencl3::error_codes::ClError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
