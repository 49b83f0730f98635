//! Kernel dispatch.

use crate::device::{ComputeDevice, KernelArg, WorkShape};
use crate::error::{GridKernelError, Result};
use crate::session::DeviceSession;

/// Issues blocking kernel executions on a session's queue.
///
/// Every launch is validated before the device is touched: the entry point
/// must exist, the global shape must be non-empty and tile exactly by the
/// local shape, and the local shape must equal the entry point's declared
/// work-group size. After enqueueing, the dispatcher drains the queue, so a
/// successful return means the kernel has completed.
pub struct Dispatcher<'s, D: ComputeDevice> {
    session: &'s DeviceSession<D>,
}

impl<'s, D: ComputeDevice> Dispatcher<'s, D> {
    /// Create a dispatcher for `session`.
    pub fn new(session: &'s DeviceSession<D>) -> Self {
        Self { session }
    }

    /// Check a launch configuration without executing anything.
    pub fn validate(&self, kernel: &str, global: WorkShape, local: WorkShape) -> Result<WorkShape> {
        let entry = self.session.entry_point(kernel)?;
        let groups = global.groups(local)?;

        match entry.local_shape() {
            Some(declared) if declared == local => Ok(groups),
            _ => Err(GridKernelError::config(format!(
                "kernel '{}' declares workgroup size {:?}, launch requested {}",
                kernel, entry.workgroup_size, local
            ))),
        }
    }

    /// Execute `kernel` once over `global` and wait for completion.
    pub fn dispatch(
        &self,
        kernel: &str,
        args: &[KernelArg<'_, D::Buffer>],
        global: WorkShape,
        local: WorkShape,
    ) -> Result<()> {
        let groups = self.validate(kernel, global, local)?;

        tracing::debug!(
            "Dispatching '{}' global={} local={} groups={}",
            kernel,
            global,
            local,
            groups
        );

        let device = self.session.device();
        device.enqueue_kernel(self.session.program(), kernel, args, global, local)?;
        device.finish()
    }
}
