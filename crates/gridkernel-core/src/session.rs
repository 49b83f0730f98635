//! Device session: program lifecycle and queue ownership.

use bytemuck::Pod;

use crate::buffer::BufferPair;
use crate::device::{ComputeDevice, DeviceInfo};
use crate::dispatch::Dispatcher;
use crate::error::{GridKernelError, Result};
use crate::program::{EntryPointInfo, ProgramSource};

/// An open device with one compiled program.
///
/// Every buffer, transfer and dispatch of a run goes through the session, so
/// all device work is serialised on the backend's single in-order queue.
pub struct DeviceSession<D: ComputeDevice> {
    device: D,
    program: D::Program,
    program_name: String,
    build_options: String,
}

impl<D: ComputeDevice> DeviceSession<D> {
    /// Compile `source` on `device`.
    ///
    /// A build failure is returned as [`GridKernelError::CompilationFailed`]
    /// with the full build log; no device memory is allocated in that case.
    pub fn open(device: D, source: ProgramSource) -> Result<Self> {
        tracing::info!(
            "Building program '{}' on {} [{}]",
            source.name(),
            device.info(),
            source.build_options()
        );

        let program = match device.build_program(&source) {
            Ok(program) => program,
            Err(e) => {
                if let Some(log) = e.build_log() {
                    tracing::warn!(
                        "Program '{}' failed to build: {}",
                        log.program,
                        log.status
                    );
                }
                return Err(e);
            }
        };

        let session = Self {
            device,
            program,
            program_name: source.name().to_string(),
            build_options: source.build_options(),
        };

        tracing::debug!(
            "Program '{}' exposes entry points: {:?}",
            session.program_name,
            session
                .entry_points()
                .iter()
                .map(|ep| ep.name.as_str())
                .collect::<Vec<_>>()
        );

        Ok(session)
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Information about the selected device.
    pub fn info(&self) -> &DeviceInfo {
        self.device.info()
    }

    /// The compiled program.
    pub fn program(&self) -> &D::Program {
        &self.program
    }

    /// Name of the compiled program.
    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// Build options the program was compiled with.
    pub fn build_options(&self) -> &str {
        &self.build_options
    }

    /// Compute entry points of the compiled program.
    pub fn entry_points(&self) -> &[EntryPointInfo] {
        self.device.entry_points(&self.program)
    }

    /// Look up an entry point by exact name.
    pub fn entry_point(&self, name: &str) -> Result<&EntryPointInfo> {
        self.entry_points()
            .iter()
            .find(|ep| ep.name == name)
            .ok_or_else(|| GridKernelError::KernelNotFound(name.to_string()))
    }

    /// Allocate a buffer of `len` elements of `T`, optionally seeded.
    pub fn create_buffer<T: Pod>(
        &self,
        label: &str,
        len: usize,
        initial: Option<&[T]>,
    ) -> Result<D::Buffer> {
        let size = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| GridKernelError::config(format!("buffer '{}' is too large", label)))?;

        if size == 0 || size % 4 != 0 {
            return Err(GridKernelError::config(format!(
                "buffer '{}' must be a non-zero multiple of 4 bytes, got {}",
                label, size
            )));
        }

        if let Some(data) = initial {
            if data.len() != len {
                return Err(GridKernelError::config(format!(
                    "initial data for '{}' has {} elements, expected {}",
                    label,
                    data.len(),
                    len
                )));
            }
        }

        tracing::debug!("Allocating buffer '{}' ({} bytes)", label, size);
        self.device
            .create_buffer(label, size, initial.map(bytemuck::cast_slice))
    }

    /// Blocking copy of host data into the start of a buffer.
    pub fn write_buffer<T: Pod>(&self, buffer: &D::Buffer, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.check_extent(buffer, bytes.len())?;
        self.device.write_buffer(buffer, bytes)
    }

    /// Blocking copy of the first `len` elements of a buffer into a new vector.
    pub fn read_buffer<T: Pod>(&self, buffer: &D::Buffer, len: usize) -> Result<Vec<T>> {
        let mut host = vec![T::zeroed(); len];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut host);
        self.check_extent(buffer, bytes.len())?;
        self.device.read_buffer(buffer, bytes)?;
        Ok(host)
    }

    /// Allocate a ping-pong buffer pair of `len` elements.
    pub fn buffer_pair<T: Pod>(
        &self,
        len: usize,
        initial: Option<&[T]>,
    ) -> Result<BufferPair<D, T>> {
        BufferPair::create(self, len, initial)
    }

    /// A dispatcher bound to this session's program and queue.
    pub fn dispatcher(&self) -> Dispatcher<'_, D> {
        Dispatcher::new(self)
    }

    fn check_extent(&self, buffer: &D::Buffer, bytes: usize) -> Result<()> {
        let available = self.device.buffer_size(buffer);
        if bytes > available {
            return Err(GridKernelError::TransferFailed(format!(
                "transfer of {} bytes exceeds buffer size {}",
                bytes, available
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{mock_source, Event, MockDevice};

    #[test]
    fn test_open_and_lookup() {
        let session = DeviceSession::open(MockDevice::new(), mock_source()).unwrap();

        assert!(session.entry_point("jacobi_step").is_ok());
        assert!(matches!(
            session.entry_point("missing"),
            Err(GridKernelError::KernelNotFound(_))
        ));
        assert_eq!(session.program_name(), "mock.wgsl");
    }

    #[test]
    fn test_compile_failure_allocates_nothing() {
        let device = Arc::new(MockDevice::new());
        let source = ProgramSource::new("broken.wgsl", "@compute fn main( {");

        let err = DeviceSession::open(Arc::clone(&device), source)
            .err()
            .unwrap();
        let log = err.build_log().unwrap();

        assert_eq!(log.program, "broken.wgsl");
        assert!(!log.log.is_empty());
        assert!(device
            .events()
            .iter()
            .all(|e| !matches!(e, Event::Alloc { .. })));
    }

    #[test]
    fn test_buffer_roundtrip_and_extent() {
        let session = DeviceSession::open(MockDevice::new(), mock_source()).unwrap();
        let buffer = session
            .create_buffer::<f32>("data", 4, Some(&[1.0, 2.0, 3.0, 4.0][..]))
            .unwrap();

        session.write_buffer(&buffer, &[9.0f32, 8.0]).unwrap();
        let host: Vec<f32> = session.read_buffer(&buffer, 4).unwrap();
        assert_eq!(host, vec![9.0, 8.0, 3.0, 4.0]);

        assert!(session.read_buffer::<f32>(&buffer, 5).is_err());
        assert!(session.create_buffer::<f32>("empty", 0, None).is_err());
        assert!(session
            .create_buffer::<f32>("short", 4, Some(&[1.0][..]))
            .is_err());
    }
}
