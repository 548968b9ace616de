//! Interface shared by every allocator in the crate.

use std::ptr::NonNull;

use crate::{config::DEFAULT_ALIGNMENT, error::AllocResult};

/// An allocator carving sub-regions out of one fixed backing buffer.
///
/// Returned regions stay valid until they are freed, until `free_all`, or
/// until the allocator is dropped, whichever comes first. Nothing detects a
/// use after any of those; dereferencing the pointers is the caller's
/// `unsafe` responsibility.
pub trait BufferAllocator {
  /// Hands out `size` zeroed bytes aligned to `align`.
  fn alloc_align(
    &mut self,
    size: usize,
    align: usize,
  ) -> AllocResult<NonNull<[u8]>>;

  /// [`alloc_align`](Self::alloc_align) with [`DEFAULT_ALIGNMENT`].
  fn alloc(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<[u8]>> {
    self.alloc_align(size, DEFAULT_ALIGNMENT)
  }

  fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> AllocResult<()>;

  /// Returns the allocator to its freshly built state.
  fn free_all(&mut self);

  /// Bytes under management.
  fn capacity(&self) -> usize;

  /// Bytes currently handed out, bookkeeping included.
  fn used(&self) -> usize;

  fn remaining(&self) -> usize {
    self.capacity() - self.used()
  }
}
