#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod backend;
pub mod d2xx;
pub mod sio;
pub mod wire;

pub use backend::{DataPhase, UsbBackend};
pub use d2xx::ffi::FtStatus;
pub use d2xx::{get_backend, D2xx, DeviceHandle, DeviceInfo};

/// What can go wrong between the USB surface and the vendor driver.
///
/// Nothing is retried or repaired here; callers own the recovery
/// policy (typically: try another device, another request, or give
/// up).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The vendor library could not be loaded or is missing entry
    /// points. Surfaced as "no backend" from
    /// [`get_backend`](crate::get_backend).
    #[error("FTDI D2XX driver is not available")]
    DriverNotAvailable,

    /// A vendor entry point returned a non-zero status.
    #[error("{function}({params}) failed: {status}")]
    VendorCall {
        function: &'static str,
        params: String,
        status: FtStatus,
    },

    /// A descriptor, interface, alternate-setting or endpoint index
    /// outside the synthesized device's range.
    #[error("invalid {kind} index {index}")]
    OutOfRange { kind: &'static str, index: u8 },

    /// A control transfer this backend does not translate.
    #[error("not implemented")]
    NotImplemented,

    /// The caller's buffer is too short for the response.
    #[error("buffer too small for response")]
    InvalidBuffer,
}

/// A result type with the error hardwired to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
