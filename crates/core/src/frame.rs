use smallvec::{SmallVec, smallvec};
use std::sync::{Arc, Mutex};

use crate::format::{PixelFormat, Resolution};

/// Picture type recorded on a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    /// Decoded from a keyframe.
    Intra,
    /// Predicted from prior frames.
    Predicted,
}

impl PictureType {
    /// One-letter tag as carried in frame metadata downstream.
    pub fn as_str(self) -> &'static str {
        match self {
            PictureType::Intra => "I",
            PictureType::Predicted => "P",
        }
    }
}

/// Metadata associated with a decoded frame.
#[derive(Debug, Clone)]
pub struct FrameMeta {
    /// Canonical format of the planes.
    pub format: PixelFormat,
    /// Frame geometry.
    pub resolution: Resolution,
    /// Picture type; defaults to predicted until a decode tags it.
    pub picture_type: PictureType,
}

/// Handle to a pooled buffer.
///
/// When dropped, the buffer is returned to the originating pool so later
/// frames can reuse memory without reallocations.
///
/// # Example
/// ```rust
/// use scrub_core::prelude::BufferPool;
///
/// let pool = BufferPool::with_capacity(2, 1024);
/// let mut lease = pool.lease();
/// lease.resize(16);
/// assert_eq!(lease.len(), 16);
/// ```
pub struct BufferLease {
    pool: Arc<PoolInner>,
    buf: Option<Vec<u8>>,
}

impl BufferLease {
    /// Borrow as an immutable slice.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }

    /// Borrow as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }

    /// Current length of the buffer.
    pub fn len(&self) -> usize {
        self.buf.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ensure the buffer holds exactly `len` zero-initialized-or-old bytes.
    pub fn resize(&mut self, len: usize) {
        if let Some(buf) = self.buf.as_mut() {
            buf.resize(len, 0);
        }
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.recycle(buf);
        }
    }
}

/// Simple buffer pool that hands out reusable owned buffers.
///
/// # Example
/// ```rust
/// use scrub_core::prelude::BufferPool;
///
/// let pool = BufferPool::with_limits(4, 1 << 20, 8);
/// let _lease = pool.lease();
/// ```
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create a pool with `capacity` preallocated buffers of `chunk_size` bytes.
    pub fn with_capacity(capacity: usize, chunk_size: usize) -> Self {
        Self::with_limits(capacity, chunk_size, capacity)
    }

    /// Create a pool with `capacity` preallocated buffers and a maximum retained free list.
    pub fn with_limits(capacity: usize, chunk_size: usize, max_free: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(vec![0; chunk_size]);
        }
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                chunk_size,
                max_free,
            }),
        }
    }

    /// Acquire a buffer, allocating if the pool is empty.
    pub fn lease(&self) -> BufferLease {
        let buf = self
            .inner
            .free
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| vec![0; self.inner.chunk_size]);
        BufferLease {
            pool: self.inner.clone(),
            buf: Some(buf),
        }
    }
}

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    chunk_size: usize,
    max_free: usize,
}

impl PoolInner {
    fn recycle(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = self.free.lock().unwrap();
        if free.len() < self.max_free {
            free.push(buf);
        }
    }
}

/// Plane layout information stored with a frame.
#[derive(Debug, Clone, Copy)]
pub struct PlaneLayout {
    /// Length of the plane in bytes.
    pub len: usize,
    /// Stride in bytes.
    pub stride: usize,
}

/// Borrowed plane view.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    data: &'a [u8],
    stride: usize,
}

impl<'a> Plane<'a> {
    /// Access the raw bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Stride in bytes for this plane.
    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// Mutable plane view.
#[derive(Debug)]
pub struct PlaneMut<'a> {
    data: &'a mut [u8],
    stride: usize,
}

impl<'a> PlaneMut<'a> {
    /// Mutable access to plane bytes.
    pub fn data(&mut self) -> &mut [u8] {
        self.data
    }

    /// Stride in bytes for this plane.
    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// One decoded image: per-plane buffers plus metadata.
///
/// Planes are pool-leased; dropping the frame recycles them. A frame is
/// written exactly once by the unpacker and then frozen behind an `Arc`
/// inside a [`FramePair`].
///
/// # Example
/// ```rust
/// use scrub_core::prelude::{BufferPool, Frame, PixelFormat, Resolution};
///
/// let pool = BufferPool::with_capacity(3, 64);
/// let res = Resolution::new(4, 4).unwrap();
/// let frame = Frame::alloc(PixelFormat::Yuv420P8, res, &pool);
/// assert_eq!(frame.planes().len(), 3);
/// assert_eq!(frame.planes()[1].data().len(), 2 * 2);
/// ```
pub struct Frame {
    meta: FrameMeta,
    buffers: SmallVec<[BufferLease; 3]>,
    layouts: SmallVec<[PlaneLayout; 3]>,
}

impl Frame {
    /// Allocate a frame with tightly-packed planes for `format` at `resolution`.
    pub fn alloc(format: PixelFormat, resolution: Resolution, pool: &BufferPool) -> Self {
        let bps = format.bytes_per_sample();
        let mut buffers: SmallVec<[BufferLease; 3]> = smallvec![];
        let mut layouts: SmallVec<[PlaneLayout; 3]> = smallvec![];
        for plane in 0..format.plane_count() {
            let stride = format.plane_width(resolution.width.get(), plane) as usize * bps;
            let len = stride * format.plane_height(resolution.height.get(), plane) as usize;
            let mut lease = pool.lease();
            lease.resize(len);
            buffers.push(lease);
            layouts.push(PlaneLayout { len, stride });
        }
        Self {
            meta: FrameMeta {
                format,
                resolution,
                picture_type: PictureType::Predicted,
            },
            buffers,
            layouts,
        }
    }

    /// Metadata describing this frame.
    pub fn meta(&self) -> &FrameMeta {
        &self.meta
    }

    /// Record the picture type after a decode.
    pub fn set_picture_type(&mut self, picture_type: PictureType) {
        self.meta.picture_type = picture_type;
    }

    /// Iterate planes as borrowed slices.
    pub fn planes(&self) -> SmallVec<[Plane<'_>; 3]> {
        self.layouts
            .iter()
            .zip(self.buffers.iter())
            .map(|(layout, buf)| Plane {
                data: &buf.as_slice()[..layout.len],
                stride: layout.stride,
            })
            .collect()
    }

    /// Iterate mutable planes for the unpacker to fill.
    pub fn planes_mut(&mut self) -> SmallVec<[PlaneMut<'_>; 3]> {
        self.layouts
            .iter()
            .zip(self.buffers.iter_mut())
            .map(|(layout, buf)| PlaneMut {
                data: &mut buf.as_mut_slice()[..layout.len],
                stride: layout.stride,
            })
            .collect()
    }

    /// Return a copy of plane layouts.
    pub fn layouts(&self) -> SmallVec<[PlaneLayout; 3]> {
        self.layouts.clone()
    }
}

/// The owned output of one decode: a primary frame plus its optional alpha
/// companion of the same index. Cloning is cheap (`Arc` per frame).
#[derive(Clone)]
pub struct FramePair {
    /// Primary video output.
    pub primary: Arc<Frame>,
    /// Synthetic single-channel alpha output, when negotiated.
    pub alpha: Option<Arc<Frame>>,
}

impl FramePair {
    /// Freeze decoded frames into a shareable pair.
    pub fn new(primary: Frame, alpha: Option<Frame>) -> Self {
        Self {
            primary: Arc::new(primary),
            alpha: alpha.map(Arc::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_recycles_buffers() {
        let pool = BufferPool::with_limits(1, 32, 1);
        {
            let mut lease = pool.lease();
            lease.resize(64);
            lease.as_mut_slice()[0] = 7;
        }
        // The recycled buffer comes back cleared.
        let lease = pool.lease();
        assert!(lease.is_empty());
    }

    #[test]
    fn alloc_sizes_chroma_planes_by_subsampling() {
        let pool = BufferPool::with_capacity(3, 16);
        let res = Resolution::new(8, 4).unwrap();
        let frame = Frame::alloc(PixelFormat::Yuv411P8, res, &pool);
        let planes = frame.planes();
        assert_eq!(planes[0].data().len(), 8 * 4);
        assert_eq!(planes[1].data().len(), 2 * 4);
        assert_eq!(planes[2].data().len(), 2 * 4);
        assert_eq!(planes[1].stride(), 2);
    }

    #[test]
    fn pair_handles_share_planes() {
        let pool = BufferPool::with_capacity(1, 16);
        let res = Resolution::new(2, 2).unwrap();
        let pair = FramePair::new(Frame::alloc(PixelFormat::Gray8, res, &pool), None);
        let other = pair.clone();
        assert!(Arc::ptr_eq(&pair.primary, &other.primary));
    }
}
