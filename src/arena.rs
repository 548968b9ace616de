use std::ptr::NonNull;

use tracing::{debug, trace};

use crate::{
  align::align_forward,
  config::DEFAULT_ALIGNMENT,
  error::{AllocError, AllocResult},
  region::RegionView,
  traits::BufferAllocator,
};

/// Linear allocator: every allocation bumps an offset forward, and the only
/// way to reclaim memory is [`free_all`](Self::free_all).
///
/// ```text
///   ┌─────┬───┬─────┬───┬──────┬──────────────────────────────┐
///   │ A1  │pad│ A2  │pad│  A3  │           free               │
///   └─────┴───┴─────┴───┴──────┴──────────────────────────────┘
///   0                          ▲                              len
///                            offset
/// ```
#[derive(Debug)]
pub struct ArenaAllocator<'buf> {
  region: RegionView<'buf>,
  offset: usize,
}

impl<'buf> ArenaAllocator<'buf> {
  pub fn new(buffer: &'buf mut [u8]) -> Self {
    Self::from_region(RegionView::new(buffer))
  }

  pub fn from_region(region: RegionView<'buf>) -> Self {
    debug!(capacity = region.len(), "arena initialised");

    Self { region, offset: 0 }
  }

  pub fn alloc(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<[u8]>> {
    self.alloc_align(size, DEFAULT_ALIGNMENT)
  }

  pub fn alloc_align(
    &mut self,
    size: usize,
    align: usize,
  ) -> AllocResult<NonNull<[u8]>> {
    let current = self.region.addr_of(self.offset);
    let offset = align_forward(current, align)? - self.region.base_addr();

    let end = match offset.checked_add(size) {
      Some(end) if end <= self.region.len() => end,
      _ => {
        trace!(size, align, offset = self.offset, "arena exhausted");

        return Err(AllocError::OutOfMemory {
          requested: size,
          available: self.remaining(),
        });
      }
    };

    self.region.fill_zero(offset, size)?;
    self.offset = end;

    trace!(offset, size, align, "arena alloc");

    self.region.slice(offset, size)
  }

  /// Individual frees are not supported; this always succeeds.
  pub fn free(
    &mut self,
    _ptr: NonNull<u8>,
  ) -> AllocResult<()> {
    Ok(())
  }

  /// Invalidates every region handed out so far.
  pub fn free_all(&mut self) {
    debug!(released = self.offset, "arena reset");

    self.offset = 0;
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.region.len()
  }

  #[inline]
  pub fn used(&self) -> usize {
    self.offset
  }

  #[inline]
  pub fn remaining(&self) -> usize {
    self.region.len() - self.offset
  }
}

impl BufferAllocator for ArenaAllocator<'_> {
  fn alloc_align(
    &mut self,
    size: usize,
    align: usize,
  ) -> AllocResult<NonNull<[u8]>> {
    ArenaAllocator::alloc_align(self, size, align)
  }

  fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> AllocResult<()> {
    ArenaAllocator::free(self, ptr)
  }

  fn free_all(&mut self) {
    ArenaAllocator::free_all(self)
  }

  fn capacity(&self) -> usize {
    ArenaAllocator::capacity(self)
  }

  fn used(&self) -> usize {
    ArenaAllocator::used(self)
  }
}
