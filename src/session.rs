//! Device session: handle lifecycle and sample conversion.
//!
//! A [`MpsSession`] owns exactly one vendor handle and walks it through the
//! open → configure → start → read → suspend → close sequence the card
//! expects. All vendor failure conventions (the all-bits-set open sentinel,
//! zero-means-failure return codes) are interpreted here and nowhere else.

use crate::backend::{MpsBackend, RawHandle, INVALID_HANDLE};
use crate::params::AcquisitionParameters;

/// Buffer capacity used when the caller does not pick one.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Invalid device number {0}, should be in [0, 9]")]
    InvalidDeviceNumber(i32),

    #[error("Open device failed, given device number {0}")]
    OpenDeviceFailed(i32),

    #[error("Configure device failed, device number {0}")]
    ConfigureDeviceFailed(i32),

    #[error("Device failed to start, device number {0}")]
    DeviceStartFailed(i32),

    #[error("Device failed to stop, device number {0}")]
    DeviceStopFailed(i32),

    #[error("Device failed to close, device number {0}")]
    DeviceCloseFailed(i32),

    #[error("Device is not started, device number {0}")]
    DeviceNotStarted(i32),

    #[error("DataIn failed, device number {0}")]
    DataInFailed(i32),

    #[error("Device {0} has no configuration applied, voltage conversion needs a gain setting")]
    NotConfigured(i32),

    #[error("Session for device {0} is closed")]
    SessionClosed(i32),

    #[error("Requested {requested} samples but the buffer holds {capacity}")]
    SampleCountExceedsBuffer { requested: usize, capacity: usize },
}

/// One open MPS-060602 card.
///
/// The session tracks the last successfully applied
/// [`AcquisitionParameters`] (voltage conversion depends on the configured
/// gain) and whether acquisition is currently started. Reads refill an
/// internal buffer in place, so a returned sample slice is only valid until
/// the next read; copy it if you need it longer.
///
/// Dropping an unclosed session closes the device on a best-effort basis.
/// The whole type is single-threaded and synchronous; the vendor library's
/// thread-safety is unknown, so no call may run concurrently with another.
pub struct MpsSession<B: MpsBackend> {
    backend: B,
    handle: RawHandle,
    device_number: i32,
    buffer: Vec<u16>,
    parameter: Option<AcquisitionParameters>,
    started: bool,
    closed: bool,
}

fn raw_to_volt(raw: u16, volt_range: f64) -> f64 {
    // Bipolar ADC encoded as unsigned 16 bit, zero volts at mid-scale:
    // raw 0 maps to +range, raw 65536 would map to -range.
    (1.0 - (f64::from(raw) / 65536.0) * 2.0) * volt_range
}

impl<B: MpsBackend> MpsSession<B> {
    /// Open device slot `device_number` (0 to 9).
    ///
    /// The device number is checked before the vendor library is touched.
    /// `buffer_size` fixes the capacity of the internal sample buffer for
    /// the lifetime of the session ([`DEFAULT_BUFFER_SIZE`] is a reasonable
    /// pick). The fresh session is not started and has no parameters
    /// applied.
    pub fn open(backend: B, device_number: i32, buffer_size: usize) -> Result<Self, DeviceError> {
        if !(0..=9).contains(&device_number) {
            return Err(DeviceError::InvalidDeviceNumber(device_number));
        }

        let handle = backend.open_device(device_number);
        if handle == INVALID_HANDLE {
            return Err(DeviceError::OpenDeviceFailed(device_number));
        }
        log::debug!("Opened device {device_number}, handle {handle:#x}");

        Ok(Self {
            backend,
            handle,
            device_number,
            buffer: vec![0; buffer_size],
            parameter: None,
            started: false,
            closed: false,
        })
    }

    /// Apply a validated parameter set to the card.
    ///
    /// On success the parameters become the session's current configuration
    /// and drive later voltage conversion; each call supersedes the previous
    /// one. On failure the previously stored configuration is kept.
    pub fn configure(&mut self, para: &AcquisitionParameters) -> Result<(), DeviceError> {
        self.ensure_open()?;
        let result = self.backend.configure(
            para.channel_mode().code(),
            para.sample_rate() as i32,
            para.gain().index(),
            self.handle,
        );
        if result == 0 {
            return Err(DeviceError::ConfigureDeviceFailed(self.device_number));
        }
        log::debug!(
            "Configured device {}: channel {:?}, {} Hz, gain {:?}",
            self.device_number,
            para.channel_mode(),
            para.sample_rate(),
            para.gain()
        );
        self.parameter = Some(*para);
        Ok(())
    }

    /// Start acquisition. Required before [`MpsSession::data_in`].
    pub fn start(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if self.backend.start(self.handle) == 0 {
            return Err(DeviceError::DeviceStartFailed(self.device_number));
        }
        self.started = true;
        Ok(())
    }

    /// Suspend acquisition.
    ///
    /// Reads are rejected until the next [`MpsSession::start`]; the handle
    /// itself stays valid. Safe to call whether or not the card is started.
    pub fn suspend(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if self.backend.stop(self.handle) == 0 {
            return Err(DeviceError::DeviceStopFailed(self.device_number));
        }
        self.started = false;
        Ok(())
    }

    /// Close the device and invalidate the session.
    ///
    /// Every later operation, including a second `close`, fails with
    /// [`DeviceError::SessionClosed`] without reaching the vendor library.
    pub fn close(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if self.backend.close_device(self.handle) == 0 {
            return Err(DeviceError::DeviceCloseFailed(self.device_number));
        }
        log::debug!("Closed device {}", self.device_number);
        self.started = false;
        self.closed = true;
        Ok(())
    }

    /// Read raw samples into the internal buffer.
    ///
    /// `None` or `Some(0)` reads a full buffer. The returned slice is a view
    /// into the internal buffer and is overwritten by the next read. Fails
    /// with [`DeviceError::DeviceNotStarted`] before the vendor read
    /// primitive is ever invoked; the primitive is documented as unsafe to
    /// call on a card that is not started.
    pub fn data_in(&mut self, sample_count: Option<usize>) -> Result<&[u16], DeviceError> {
        let count = self.fill_buffer(sample_count)?;
        Ok(&self.buffer[..count])
    }

    /// Convert one raw sample to volts using the configured gain's range.
    ///
    /// `volt = (1 - (raw / 65536) * 2) * range`: raw 0 is the positive full
    /// scale, mid-scale is zero volts. Fails with
    /// [`DeviceError::NotConfigured`] until a configure call has succeeded.
    pub fn to_volt(&self, raw: u16) -> Result<f64, DeviceError> {
        Ok(raw_to_volt(raw, self.configured_volt_range()?))
    }

    /// Read raw samples and convert them all to volts.
    ///
    /// Same failure behavior as [`MpsSession::data_in`]; the returned vector
    /// is an independent copy, one voltage per raw sample read.
    pub fn read_to_volt(&mut self, sample_count: Option<usize>) -> Result<Vec<f64>, DeviceError> {
        let count = self.fill_buffer(sample_count)?;
        let volt_range = self.configured_volt_range()?;
        Ok(self.buffer[..count]
            .iter()
            .map(|&raw| raw_to_volt(raw, volt_range))
            .collect())
    }

    pub fn device_number(&self) -> i32 {
        self.device_number
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Last successfully applied parameters, if any.
    pub fn parameters(&self) -> Option<AcquisitionParameters> {
        self.parameter
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn fill_buffer(&mut self, sample_count: Option<usize>) -> Result<usize, DeviceError> {
        self.ensure_open()?;
        if !self.started {
            return Err(DeviceError::DeviceNotStarted(self.device_number));
        }

        let capacity = self.buffer.len();
        let count = match sample_count {
            None | Some(0) => capacity,
            Some(requested) => requested,
        };
        if count > capacity {
            return Err(DeviceError::SampleCountExceedsBuffer {
                requested: count,
                capacity,
            });
        }

        if self
            .backend
            .data_in(&mut self.buffer, count as i32, self.handle)
            == 0
        {
            return Err(DeviceError::DataInFailed(self.device_number));
        }
        Ok(count)
    }

    fn configured_volt_range(&self) -> Result<f64, DeviceError> {
        self.parameter
            .map(|para| para.gain().volt_range())
            .ok_or(DeviceError::NotConfigured(self.device_number))
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::SessionClosed(self.device_number));
        }
        Ok(())
    }
}

impl<B: MpsBackend> Drop for MpsSession<B> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.backend.close_device(self.handle) == 0 {
            log::warn!(
                "Failed to close device {} while dropping its session",
                self.device_number
            );
        }
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, MockBackend};
    use crate::params::{ChannelMode, PgaGain};

    fn open_session(mock: &MockBackend) -> MpsSession<&MockBackend> {
        MpsSession::open(mock, 0, 8).expect("open must succeed on the default mock")
    }

    fn configured_session(mock: &MockBackend) -> MpsSession<&MockBackend> {
        let mut session = open_session(mock);
        let para = AcquisitionParameters::new(ChannelMode::In1, 1000, PgaGain::Range10V)
            .expect("parameters are valid");
        session.configure(&para).expect("configure must succeed");
        session
    }

    #[test]
    fn test_invalid_device_number_never_reaches_backend() {
        let mock = MockBackend::new();
        for device_number in [-1, 10, 15, i32::MIN, i32::MAX] {
            let result = MpsSession::open(&mock, device_number, 8);
            assert_eq!(
                result.err(),
                Some(DeviceError::InvalidDeviceNumber(device_number))
            );
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_open_failure_sentinel() {
        let mock = MockBackend::new().failing_open();
        let result = MpsSession::open(&mock, 3, 8);
        assert_eq!(result.err(), Some(DeviceError::OpenDeviceFailed(3)));
    }

    #[test]
    fn test_open_boundaries_accepted() {
        let mock = MockBackend::new();
        assert!(MpsSession::open(&mock, 0, 8).is_ok());
        assert!(MpsSession::open(&mock, 9, 8).is_ok());
    }

    #[test]
    fn test_fresh_session_state() {
        let mock = MockBackend::new();
        let session = open_session(&mock);
        assert_eq!(session.device_number(), 0);
        assert!(!session.is_started());
        assert!(!session.is_closed());
        assert!(session.parameters().is_none());
        assert_eq!(session.buffer_capacity(), 8);
    }

    #[test]
    fn test_configure_passes_selector_codes() {
        let mock = MockBackend::new();
        let mut session = open_session(&mock);
        let para = AcquisitionParameters::new(ChannelMode::Difference, 20_000, PgaGain::Range2V)
            .expect("parameters are valid");
        session.configure(&para).expect("configure must succeed");

        let handle = mock.open_device(0); // same scripted handle
        assert!(mock.calls().contains(&BackendCall::Configure {
            channel_mode: 4,
            sample_rate: 20_000,
            gain_index: 2,
            handle,
        }));
        assert_eq!(session.parameters(), Some(para));
    }

    #[test]
    fn test_configure_failure_keeps_previous_parameters() {
        let mock = MockBackend::new().failing_configure();
        let mut session = open_session(&mock);
        let para = AcquisitionParameters::default();
        assert_eq!(
            session.configure(&para),
            Err(DeviceError::ConfigureDeviceFailed(0))
        );
        assert!(session.parameters().is_none());
    }

    #[test]
    fn test_reconfigure_supersedes() {
        let mock = MockBackend::new();
        let mut session = configured_session(&mock);
        let second = AcquisitionParameters::new(ChannelMode::In2, 2000, PgaGain::Range1V)
            .expect("parameters are valid");
        session.configure(&second).expect("reconfigure must succeed");
        assert_eq!(session.parameters(), Some(second));
    }

    #[test]
    fn test_start_failure() {
        let mock = MockBackend::new().failing_start();
        let mut session = open_session(&mock);
        assert_eq!(session.start(), Err(DeviceError::DeviceStartFailed(0)));
        assert!(!session.is_started());
    }

    #[test]
    fn test_suspend_failure_and_success() {
        let mock = MockBackend::new().failing_stop();
        let mut session = open_session(&mock);
        // Valid to suspend a card that was never started.
        assert_eq!(session.suspend(), Err(DeviceError::DeviceStopFailed(0)));

        let mock = MockBackend::new();
        let mut session = open_session(&mock);
        session.start().expect("start must succeed");
        session.suspend().expect("suspend must succeed");
        assert!(!session.is_started());
        // The handle stays usable for another start.
        session.start().expect("restart must succeed");
        assert!(session.is_started());
    }

    #[test]
    fn test_read_before_start_never_reaches_backend() {
        let mock = MockBackend::new();
        let mut session = open_session(&mock);
        assert_eq!(
            session.data_in(Some(1)).err(),
            Some(DeviceError::DeviceNotStarted(0))
        );
        assert!(!mock
            .calls()
            .iter()
            .any(|call| matches!(call, BackendCall::DataIn { .. })));
    }

    #[test]
    fn test_data_in_defaults_to_buffer_capacity() {
        let mock = MockBackend::new();
        let mut session = configured_session(&mock);
        session.start().expect("start must succeed");

        let samples = session.data_in(None).expect("read must succeed");
        assert_eq!(samples.len(), 8);
        let samples = session.data_in(Some(0)).expect("read must succeed");
        assert_eq!(samples.len(), 8);
        let samples = session.data_in(Some(3)).expect("read must succeed");
        assert_eq!(samples, [0, 1, 2]);
    }

    #[test]
    fn test_data_in_rejects_oversized_request() {
        let mock = MockBackend::new();
        let mut session = configured_session(&mock);
        session.start().expect("start must succeed");
        assert_eq!(
            session.data_in(Some(9)).err(),
            Some(DeviceError::SampleCountExceedsBuffer {
                requested: 9,
                capacity: 8,
            })
        );
    }

    #[test]
    fn test_data_in_failure() {
        let mock = MockBackend::new().failing_data_in();
        let mut session = configured_session(&mock);
        session.start().expect("start must succeed");
        assert_eq!(session.data_in(None).err(), Some(DeviceError::DataInFailed(0)));
    }

    #[test]
    fn test_to_volt_requires_configuration() {
        let mock = MockBackend::new();
        let session = open_session(&mock);
        assert_eq!(session.to_volt(0), Err(DeviceError::NotConfigured(0)));
    }

    #[test]
    fn test_conversion_linear_and_symmetric() {
        let mock = MockBackend::new();
        let session = configured_session(&mock); // ±10 V range

        assert_eq!(session.to_volt(0).unwrap(), 10.0);
        let mid = session.to_volt(32768).unwrap();
        assert!(mid.abs() <= 10.0 / 65536.0, "mid-scale should be ~0 V, got {mid}");
        let bottom = session.to_volt(65535).unwrap();
        assert!((bottom + 10.0).abs() <= 2.0 * 10.0 / 65536.0);
    }

    #[test]
    fn test_conversion_uses_last_applied_gain() {
        let mock = MockBackend::new();
        let mut session = configured_session(&mock); // ±10 V range
        assert_eq!(session.to_volt(0).unwrap(), 10.0);

        let para = AcquisitionParameters::new(ChannelMode::In1, 1000, PgaGain::Range2V)
            .expect("parameters are valid");
        session.configure(&para).expect("reconfigure must succeed");
        assert_eq!(session.to_volt(0).unwrap(), 2.0);
    }

    #[test]
    fn test_read_to_volt_matches_elementwise_conversion() {
        let mock = MockBackend::new().with_samples(vec![0, 16384, 32768, 49152, 65535]);
        let mut session = configured_session(&mock);
        session.start().expect("start must succeed");

        let volts = session.read_to_volt(Some(5)).expect("read must succeed");
        assert_eq!(volts.len(), 5);

        let raw = session.data_in(Some(5)).expect("read must succeed").to_vec();
        for (r, v) in raw.iter().zip(&volts) {
            assert_eq!(session.to_volt(*r).unwrap(), *v);
        }
    }

    #[test]
    fn test_read_to_volt_defaults_to_capacity() {
        let mock = MockBackend::new();
        let mut session = configured_session(&mock);
        session.start().expect("start must succeed");
        let volts = session.read_to_volt(None).expect("read must succeed");
        assert_eq!(volts.len(), session.buffer_capacity());
    }

    #[test]
    fn test_full_acquisition_scenario() {
        let raw_sample = 12345u16;
        let mock = MockBackend::new().with_samples(vec![raw_sample]);
        let mut session = MpsSession::open(&mock, 0, 8).expect("open must succeed");

        let para = AcquisitionParameters::new(ChannelMode::In1, 1000, PgaGain::Range10V)
            .expect("parameters are valid");
        session.configure(&para).expect("configure must succeed");
        session.start().expect("start must succeed");

        let samples = session.data_in(Some(1)).expect("read must succeed");
        assert_eq!(samples, [raw_sample]);

        let expected = (1.0 - (f64::from(raw_sample) / 65536.0) * 2.0) * 10.0;
        assert_eq!(session.to_volt(raw_sample).unwrap(), expected);
    }

    #[test]
    fn test_close_then_reject_everything() {
        let mock = MockBackend::new();
        let mut session = configured_session(&mock);
        session.start().expect("start must succeed");
        session.close().expect("close must succeed");

        assert!(session.is_closed());
        assert!(!session.is_started());
        assert_eq!(session.close(), Err(DeviceError::SessionClosed(0)));
        assert_eq!(session.start(), Err(DeviceError::SessionClosed(0)));
        assert_eq!(session.suspend(), Err(DeviceError::SessionClosed(0)));
        assert_eq!(
            session.data_in(None).err(),
            Some(DeviceError::SessionClosed(0))
        );
        assert_eq!(
            session.configure(&AcquisitionParameters::default()),
            Err(DeviceError::SessionClosed(0))
        );
    }

    #[test]
    fn test_close_failure() {
        let mock = MockBackend::new().failing_close();
        let mut session = open_session(&mock);
        assert_eq!(session.close(), Err(DeviceError::DeviceCloseFailed(0)));
        // Still open; the caller may retry.
        assert!(!session.is_closed());
    }

    #[test]
    fn test_drop_closes_unclosed_session() {
        let mock = MockBackend::new();
        {
            let _session = open_session(&mock);
        }
        let closes = mock
            .calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::CloseDevice { .. }))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn test_drop_after_close_does_not_double_close() {
        let mock = MockBackend::new();
        {
            let mut session = open_session(&mock);
            session.close().expect("close must succeed");
        }
        let closes = mock
            .calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::CloseDevice { .. }))
            .count();
        assert_eq!(closes, 1);
    }
}
