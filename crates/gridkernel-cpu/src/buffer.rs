//! Host-memory device buffers.

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use gridkernel_core::error::{GridKernelError, Result};

/// A fixed-size buffer of 32-bit words in host memory.
///
/// Storage is word-aligned so typed views of `u32`, `i32` and `f32` can be
/// taken without copying.
pub struct CpuBuffer {
    label: String,
    words: RwLock<Vec<u32>>,
}

impl CpuBuffer {
    /// Allocate a zeroed buffer of `size` bytes.
    pub(crate) fn new(label: &str, size: usize) -> Result<Self> {
        if size == 0 || size % 4 != 0 {
            return Err(GridKernelError::AllocationFailed(format!(
                "buffer '{}' size {} is not a positive multiple of 4",
                label, size
            )));
        }
        Ok(Self {
            label: label.to_string(),
            words: RwLock::new(vec![0; size / 4]),
        })
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.words.read().len() * 4
    }

    pub(crate) fn write_bytes(&self, data: &[u8]) -> Result<()> {
        let mut words = self.words.write();
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut words[..]);
        if data.len() > dst.len() {
            return Err(GridKernelError::TransferFailed(format!(
                "write of {} bytes into '{}' ({} bytes)",
                data.len(),
                self.label,
                dst.len()
            )));
        }
        dst[..data.len()].copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn read_bytes(&self, data: &mut [u8]) -> Result<()> {
        let words = self.words.read();
        let src: &[u8] = bytemuck::cast_slice(&words[..]);
        if data.len() > src.len() {
            return Err(GridKernelError::TransferFailed(format!(
                "read of {} bytes from '{}' ({} bytes)",
                data.len(),
                self.label,
                src.len()
            )));
        }
        data.copy_from_slice(&src[..data.len()]);
        Ok(())
    }

    /// Shared typed view. Fails if the buffer is currently bound for writing.
    pub(crate) fn view<T: bytemuck::Pod>(&self) -> Result<MappedRwLockReadGuard<'_, [T]>> {
        let guard = self.words.try_read().ok_or_else(|| self.aliased())?;
        Ok(RwLockReadGuard::map(guard, |w| bytemuck::cast_slice(&w[..])))
    }

    /// Exclusive typed view. Fails if the buffer is already bound in this launch.
    pub(crate) fn view_mut<T: bytemuck::Pod>(&self) -> Result<MappedRwLockWriteGuard<'_, [T]>> {
        let guard = self.words.try_write().ok_or_else(|| self.aliased())?;
        Ok(RwLockWriteGuard::map(guard, |w| {
            bytemuck::cast_slice_mut(&mut w[..])
        }))
    }

    fn aliased(&self) -> GridKernelError {
        GridKernelError::LaunchFailed(format!(
            "buffer '{}' is bound as both input and output",
            self.label
        ))
    }
}

impl std::fmt::Debug for CpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuBuffer")
            .field("label", &self.label)
            .field("size", &self.size())
            .finish()
    }
}
