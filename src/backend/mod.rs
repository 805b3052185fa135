//! Compute backend capability surface.
//!
//! The execution session only talks to a device through [`ComputeBackend`].
//! Handles are opaque ids minted by the backend; the session owns them and
//! hands each back through [`ComputeBackend::release`] exactly once.

mod host;
mod source;

pub use host::HostBackend;
pub use source::{LIFE_ENTRY_POINT, LIFE_KERNEL_SOURCE};

use crate::error::LifeResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// In-order command queue; operations enqueued on it complete in submission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueueHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RoutineHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Anything that can be given back to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handle {
    Device(DeviceHandle),
    Queue(QueueHandle),
    Routine(RoutineHandle),
    Buffer(BufferHandle),
}

impl From<DeviceHandle> for Handle {
    fn from(h: DeviceHandle) -> Self {
        Handle::Device(h)
    }
}

impl From<QueueHandle> for Handle {
    fn from(h: QueueHandle) -> Self {
        Handle::Queue(h)
    }
}

impl From<RoutineHandle> for Handle {
    fn from(h: RoutineHandle) -> Self {
        Handle::Routine(h)
    }
}

impl From<BufferHandle> for Handle {
    fn from(h: BufferHandle) -> Self {
        Handle::Buffer(h)
    }
}

/// How device-side code may touch a buffer. Host transfers are always allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn device_readable(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn device_writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// 2-D global work size: one work-item per `(row, col)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkShape {
    pub rows: usize,
    pub cols: usize,
}

impl WorkShape {
    pub fn items(self) -> usize {
        self.rows * self.cols
    }
}

/// Backend status codes carried by [`LifeError::Backend`](crate::LifeError::Backend).
/// Values follow the OpenCL numbering so real drivers can pass theirs through.
pub mod status {
    pub const MEM_OBJECT_ALLOCATION_FAILURE: i32 = -4;
    pub const OUT_OF_RESOURCES: i32 = -5;
    pub const INVALID_VALUE: i32 = -30;
    pub const INVALID_DEVICE: i32 = -33;
    pub const INVALID_COMMAND_QUEUE: i32 = -36;
    pub const INVALID_MEM_OBJECT: i32 = -38;
    pub const INVALID_KERNEL: i32 = -48;
    pub const INVALID_KERNEL_ARGS: i32 = -52;
    pub const INVALID_OPERATION: i32 = -59;
    pub const INVALID_GLOBAL_WORK_SIZE: i32 = -63;
}

/// Device capabilities consumed by an execution session.
///
/// Every fallible call reports `LifeError::Backend` (or `LifeError::Compile`
/// from [`compile`](Self::compile)); callers treat either as fatal.
pub trait ComputeBackend {
    /// Name of this backend (for logging).
    fn name(&self) -> &'static str;

    fn acquire_device(&mut self) -> LifeResult<DeviceHandle>;

    fn create_queue(&mut self, device: DeviceHandle) -> LifeResult<QueueHandle>;

    /// Build `source` and bind its `entry_point`.
    fn compile(
        &mut self,
        device: DeviceHandle,
        source: &str,
        entry_point: &str,
    ) -> LifeResult<RoutineHandle>;

    fn allocate_buffer(
        &mut self,
        device: DeviceHandle,
        size: usize,
        access: AccessMode,
    ) -> LifeResult<BufferHandle>;

    /// Copy `bytes` into the whole of `buffer`.
    fn enqueue_upload(
        &mut self,
        queue: QueueHandle,
        buffer: BufferHandle,
        bytes: &[u8],
    ) -> LifeResult<()>;

    /// Run `routine` once per work-item of `shape`.
    fn enqueue_dispatch(
        &mut self,
        queue: QueueHandle,
        routine: RoutineHandle,
        scalars: &[u32],
        buffers: &[BufferHandle],
        shape: WorkShape,
    ) -> LifeResult<()>;

    /// Blocking read of the whole of `buffer` into `out`.
    fn enqueue_download(
        &mut self,
        queue: QueueHandle,
        buffer: BufferHandle,
        out: &mut [u8],
    ) -> LifeResult<()>;

    fn release(&mut self, handle: Handle) -> LifeResult<()>;
}

impl<B: ComputeBackend + ?Sized> ComputeBackend for &mut B {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn acquire_device(&mut self) -> LifeResult<DeviceHandle> {
        (**self).acquire_device()
    }

    fn create_queue(&mut self, device: DeviceHandle) -> LifeResult<QueueHandle> {
        (**self).create_queue(device)
    }

    fn compile(
        &mut self,
        device: DeviceHandle,
        source: &str,
        entry_point: &str,
    ) -> LifeResult<RoutineHandle> {
        (**self).compile(device, source, entry_point)
    }

    fn allocate_buffer(
        &mut self,
        device: DeviceHandle,
        size: usize,
        access: AccessMode,
    ) -> LifeResult<BufferHandle> {
        (**self).allocate_buffer(device, size, access)
    }

    fn enqueue_upload(
        &mut self,
        queue: QueueHandle,
        buffer: BufferHandle,
        bytes: &[u8],
    ) -> LifeResult<()> {
        (**self).enqueue_upload(queue, buffer, bytes)
    }

    fn enqueue_dispatch(
        &mut self,
        queue: QueueHandle,
        routine: RoutineHandle,
        scalars: &[u32],
        buffers: &[BufferHandle],
        shape: WorkShape,
    ) -> LifeResult<()> {
        (**self).enqueue_dispatch(queue, routine, scalars, buffers, shape)
    }

    fn enqueue_download(
        &mut self,
        queue: QueueHandle,
        buffer: BufferHandle,
        out: &mut [u8],
    ) -> LifeResult<()> {
        (**self).enqueue_download(queue, buffer, out)
    }

    fn release(&mut self, handle: Handle) -> LifeResult<()> {
        (**self).release(handle)
    }
}
