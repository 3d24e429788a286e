//! # MPS060602 RS
//!
//! A Rust library for controlling the MPS-060602 data-acquisition card
//! through its vendor-supplied dynamic library.
//!
//! The vendor DLL owns the actual hardware protocol; this crate wraps it
//! with parameter validation, strict session lifecycle bookkeeping, and
//! raw-sample-to-voltage conversion.
//!
//! ## Features
//!
//! - **Validated configuration**: channel mode, sample rate, and PGA gain
//!   are checked before anything reaches the device
//! - **Session lifecycle**: one owned handle per [`MpsSession`], walked
//!   through open → configure → start → read → suspend → close
//! - **Voltage conversion**: raw unsigned 16-bit ADC samples mapped to volts
//!   using the configured gain's range
//! - **Swappable backend**: the six vendor primitives sit behind the
//!   [`MpsBackend`] trait, with [`DllBackend`] for real hardware and
//!   [`MockBackend`] for tests and hardware-free development
//!
//! ## Examples
//!
//! ### Acquiring voltages from a card
//!
//! ```rust,no_run
//! use mps060602_rs::{
//!     AcquisitionParameters, ChannelMode, DllBackend, MpsSession, PgaGain,
//!     host_library_filename, DEFAULT_BUFFER_SIZE,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Bind the vendor binary matching this process's bitness.
//! let backend = unsafe { DllBackend::load(host_library_filename())? };
//!
//! let mut card = MpsSession::open(backend, 0, DEFAULT_BUFFER_SIZE)?;
//! let para = AcquisitionParameters::new(ChannelMode::In1, 10_000, PgaGain::Range10V)?;
//! card.configure(&para)?;
//! card.start()?;
//!
//! let volts = card.read_to_volt(None)?;
//! println!("First sample: {:.3} V", volts[0]);
//!
//! card.suspend()?;
//! card.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Working without hardware
//!
//! ```rust
//! use mps060602_rs::{AcquisitionParameters, MockBackend, MpsSession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut card = MpsSession::open(MockBackend::new(), 0, 64)?;
//! card.configure(&AcquisitionParameters::default())?;
//! card.start()?;
//! assert_eq!(card.read_to_volt(Some(16))?.len(), 16);
//! # Ok(())
//! # }
//! ```
//!
//! ### Raw reads and manual conversion
//!
//! ```rust
//! use mps060602_rs::{AcquisitionParameters, MockBackend, MpsSession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut card = MpsSession::open(MockBackend::new(), 0, 64)?;
//! card.configure(&AcquisitionParameters::default())?;
//! card.start()?;
//!
//! // The slice is a view into the session's buffer; copy before the next
//! // read if the samples need to outlive it.
//! let raw = card.data_in(Some(4))?.to_vec();
//! for sample in raw {
//!     println!("{} -> {:.4} V", sample, card.to_volt(sample)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod params;
pub mod session;

// Re-export the main types for convenience
pub use backend::{
    host_library_filename, library_filename, BackendCall, BackendError, DllBackend, MockBackend,
    MpsBackend, RawHandle, INVALID_HANDLE,
};

pub use params::{AcquisitionParameters, ChannelMode, ParameterError, PgaGain};

pub use session::{DeviceError, MpsSession, DEFAULT_BUFFER_SIZE};
