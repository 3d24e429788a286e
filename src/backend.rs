//! Access to the vendor-supplied MPS-060602 dynamic library.
//!
//! The six vendor primitives are abstracted behind the [`MpsBackend`] trait
//! so the session layer can be driven either by the real DLL
//! ([`DllBackend`]) or by a scripted fake ([`MockBackend`]) in tests and
//! hardware-free demos. Backends return the vendor's raw codes untouched;
//! interpreting the failure conventions is the session's job.

use libloading::Library;

/// Opaque per-open-session identifier handed out by the vendor library.
///
/// The vendor ABI uses a platform pointer-width handle, so this is `usize`
/// on every target.
pub type RawHandle = usize;

/// The vendor's open-failure sentinel: a handle with all bits set.
pub const INVALID_HANDLE: RawHandle = RawHandle::MAX;

/// The six primitives of the vendor ABI.
///
/// Signatures mirror the C calling convention byte for byte: `i32` where the
/// DLL takes a C `int`, [`RawHandle`] where it takes its pointer-width
/// handle. Return codes are passed through raw; for everything but
/// `open_device` the vendor convention is `0` means failure.
pub trait MpsBackend {
    fn open_device(&self, device_number: i32) -> RawHandle;
    fn configure(
        &self,
        channel_mode: i32,
        sample_rate: i32,
        gain_index: i32,
        handle: RawHandle,
    ) -> i32;
    fn start(&self, handle: RawHandle) -> i32;
    /// Fills `buffer` with up to `sample_count` raw samples. Callers must
    /// guarantee `sample_count <= buffer.len()`; the vendor library writes
    /// unchecked.
    fn data_in(&self, buffer: &mut [u16], sample_count: i32, handle: RawHandle) -> i32;
    fn stop(&self, handle: RawHandle) -> i32;
    fn close_device(&self, handle: RawHandle) -> i32;
}

impl<B: MpsBackend + ?Sized> MpsBackend for &B {
    fn open_device(&self, device_number: i32) -> RawHandle {
        (**self).open_device(device_number)
    }

    fn configure(
        &self,
        channel_mode: i32,
        sample_rate: i32,
        gain_index: i32,
        handle: RawHandle,
    ) -> i32 {
        (**self).configure(channel_mode, sample_rate, gain_index, handle)
    }

    fn start(&self, handle: RawHandle) -> i32 {
        (**self).start(handle)
    }

    fn data_in(&self, buffer: &mut [u16], sample_count: i32, handle: RawHandle) -> i32 {
        (**self).data_in(buffer, sample_count, handle)
    }

    fn stop(&self, handle: RawHandle) -> i32 {
        (**self).stop(handle)
    }

    fn close_device(&self, handle: RawHandle) -> i32 {
        (**self).close_device(handle)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to load vendor library: {0}")]
    Load(#[source] libloading::Error),

    #[error("vendor library is missing symbol {symbol}: {source}")]
    Symbol {
        symbol: &'static str,
        source: libloading::Error,
    },
}

/// File name of the vendor binary for a given machine architecture string.
///
/// The vendor ships one DLL per bitness; anything whose architecture string
/// ends in `64` gets the x64 binary. The string is injected rather than read
/// from the host so the mapping stays a pure function; use
/// [`host_library_filename`] for the running process.
pub fn library_filename(machine: &str) -> &'static str {
    if machine.ends_with("64") {
        "MPS-060602x64.dll"
    } else {
        "MPS-060602.dll"
    }
}

/// Vendor binary matching the architecture of the running process.
pub fn host_library_filename() -> &'static str {
    library_filename(std::env::consts::ARCH)
}

type OpenDeviceFn = unsafe extern "C" fn(i32) -> RawHandle;
type ConfigureFn = unsafe extern "C" fn(i32, i32, i32, RawHandle) -> i32;
type StartFn = unsafe extern "C" fn(RawHandle) -> i32;
type DataInFn = unsafe extern "C" fn(*mut u16, i32, RawHandle) -> i32;
type StopFn = unsafe extern "C" fn(RawHandle) -> i32;
type CloseDeviceFn = unsafe extern "C" fn(RawHandle) -> i32;

/// [`MpsBackend`] bound to the real vendor DLL.
///
/// All `MPS_*` symbols are resolved once at load time; the [`Library`] is
/// kept alive for as long as the backend exists so the resolved function
/// pointers stay valid.
pub struct DllBackend {
    _library: Library,
    open_device: OpenDeviceFn,
    configure: ConfigureFn,
    start: StartFn,
    data_in: DataInFn,
    stop: StopFn,
    close_device: CloseDeviceFn,
}

impl DllBackend {
    /// Load the vendor library from `path` and resolve the six primitives.
    ///
    /// # Safety
    ///
    /// Loading a dynamic library runs its initialization code, and every
    /// later primitive call jumps into vendor machine code. The caller must
    /// ensure `path` points at a genuine MPS-060602 vendor binary matching
    /// the process bitness (see [`host_library_filename`]).
    pub unsafe fn load(path: impl AsRef<std::ffi::OsStr>) -> Result<Self, BackendError> {
        let library = Library::new(path.as_ref()).map_err(BackendError::Load)?;
        log::debug!("Loaded vendor library from {:?}", path.as_ref());

        // Copy the resolved function pointers out of their borrowing
        // `Symbol` wrappers before the `Library` is moved into the struct.
        let open_device: OpenDeviceFn = *Self::symbol(&library, "MPS_OpenDevice")?;
        let configure: ConfigureFn = *Self::symbol(&library, "MPS_Configure")?;
        let start: StartFn = *Self::symbol(&library, "MPS_Start")?;
        let data_in: DataInFn = *Self::symbol(&library, "MPS_DataIn")?;
        let stop: StopFn = *Self::symbol(&library, "MPS_Stop")?;
        let close_device: CloseDeviceFn = *Self::symbol(&library, "MPS_CloseDevice")?;
        log::debug!("Resolved all MPS_* symbols");

        Ok(Self {
            _library: library,
            open_device,
            configure,
            start,
            data_in,
            stop,
            close_device,
        })
    }

    unsafe fn symbol<'lib, T>(
        library: &'lib Library,
        name: &'static str,
    ) -> Result<libloading::Symbol<'lib, T>, BackendError> {
        library
            .get(name.as_bytes())
            .map_err(|source| BackendError::Symbol {
                symbol: name,
                source,
            })
    }
}

impl MpsBackend for DllBackend {
    fn open_device(&self, device_number: i32) -> RawHandle {
        unsafe { (self.open_device)(device_number) }
    }

    fn configure(
        &self,
        channel_mode: i32,
        sample_rate: i32,
        gain_index: i32,
        handle: RawHandle,
    ) -> i32 {
        unsafe { (self.configure)(channel_mode, sample_rate, gain_index, handle) }
    }

    fn start(&self, handle: RawHandle) -> i32 {
        unsafe { (self.start)(handle) }
    }

    fn data_in(&self, buffer: &mut [u16], sample_count: i32, handle: RawHandle) -> i32 {
        assert!(
            sample_count >= 0 && sample_count as usize <= buffer.len(),
            "sample_count must fit the buffer"
        );
        unsafe { (self.data_in)(buffer.as_mut_ptr(), sample_count, handle) }
    }

    fn stop(&self, handle: RawHandle) -> i32 {
        unsafe { (self.stop)(handle) }
    }

    fn close_device(&self, handle: RawHandle) -> i32 {
        unsafe { (self.close_device)(handle) }
    }
}

/// One recorded call into a [`MockBackend`], in vendor-ABI terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    OpenDevice {
        device_number: i32,
    },
    Configure {
        channel_mode: i32,
        sample_rate: i32,
        gain_index: i32,
        handle: RawHandle,
    },
    Start {
        handle: RawHandle,
    },
    DataIn {
        sample_count: i32,
        handle: RawHandle,
    },
    Stop {
        handle: RawHandle,
    },
    CloseDevice {
        handle: RawHandle,
    },
}

/// Scripted stand-in for the vendor DLL.
///
/// Records every primitive invocation and returns configurable results, so
/// tests can assert both outcomes and that validation short-circuits before
/// the device boundary. `data_in` fills the buffer from a repeating sample
/// pattern (an identity ramp by default).
///
/// Not thread-safe; the session contract is single-threaded anyway.
pub struct MockBackend {
    handle: RawHandle,
    configure_result: i32,
    start_result: i32,
    data_in_result: i32,
    stop_result: i32,
    close_result: i32,
    samples: Vec<u16>,
    calls: std::cell::RefCell<Vec<BackendCall>>,
}

impl MockBackend {
    /// A backend where every primitive succeeds.
    pub fn new() -> Self {
        Self {
            handle: 0x4D50_5344,
            configure_result: 1,
            start_result: 1,
            data_in_result: 1,
            stop_result: 1,
            close_result: 1,
            samples: (0..=u16::MAX).collect(),
            calls: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.handle = INVALID_HANDLE;
        self
    }

    pub fn failing_configure(mut self) -> Self {
        self.configure_result = 0;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.start_result = 0;
        self
    }

    pub fn failing_data_in(mut self) -> Self {
        self.data_in_result = 0;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.stop_result = 0;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.close_result = 0;
        self
    }

    /// Replace the repeating pattern `data_in` fills buffers with.
    pub fn with_samples(mut self, samples: Vec<u16>) -> Self {
        assert!(!samples.is_empty(), "sample pattern must not be empty");
        self.samples = samples;
        self
    }

    /// Every primitive invocation so far, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn record(&self, call: BackendCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MpsBackend for MockBackend {
    fn open_device(&self, device_number: i32) -> RawHandle {
        self.record(BackendCall::OpenDevice { device_number });
        self.handle
    }

    fn configure(
        &self,
        channel_mode: i32,
        sample_rate: i32,
        gain_index: i32,
        handle: RawHandle,
    ) -> i32 {
        self.record(BackendCall::Configure {
            channel_mode,
            sample_rate,
            gain_index,
            handle,
        });
        self.configure_result
    }

    fn start(&self, handle: RawHandle) -> i32 {
        self.record(BackendCall::Start { handle });
        self.start_result
    }

    fn data_in(&self, buffer: &mut [u16], sample_count: i32, handle: RawHandle) -> i32 {
        self.record(BackendCall::DataIn {
            sample_count,
            handle,
        });
        if self.data_in_result != 0 {
            for (i, slot) in buffer.iter_mut().take(sample_count as usize).enumerate() {
                *slot = self.samples[i % self.samples.len()];
            }
        }
        self.data_in_result
    }

    fn stop(&self, handle: RawHandle) -> i32 {
        self.record(BackendCall::Stop { handle });
        self.stop_result
    }

    fn close_device(&self, handle: RawHandle) -> i32 {
        self.record(BackendCall::CloseDevice { handle });
        self.close_result
    }
}
