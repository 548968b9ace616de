//! Tunables shared by the allocators.

use std::mem;

/// Alignment used when the caller does not ask for one: two machine words,
/// i.e. 16 bytes on 64-bit targets.
pub const DEFAULT_ALIGNMENT: usize = 2 * mem::size_of::<usize>();

/// The stack header stores its padding in a single byte.
pub const STACK_MAX_ALIGNMENT: usize = 128;

/// Free-list allocations are never aligned below this.
pub const FREE_LIST_MIN_ALIGNMENT: usize = 8;

pub const DEFAULT_CHUNK_ALIGNMENT: usize = 8;

/// Pool geometry. Both values are rounded when the pool is built: the buffer
/// start is aligned forward to `chunk_alignment` and `chunk_size` is rounded up
/// to a multiple of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
  pub chunk_size: usize,
  pub chunk_alignment: usize,
}

impl PoolConfig {
  pub const fn new(chunk_size: usize) -> Self {
    Self {
      chunk_size,
      chunk_alignment: DEFAULT_CHUNK_ALIGNMENT,
    }
  }

  pub const fn with_alignment(
    mut self,
    chunk_alignment: usize,
  ) -> Self {
    self.chunk_alignment = chunk_alignment;
    self
  }
}

/// Which free block a [`FreeListAllocator`](crate::FreeListAllocator) picks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Placement {
  /// First block, in address order, large enough for the request.
  #[default]
  FirstFit,
  /// Block leaving the smallest leftover; ties go to the lowest address.
  BestFit,
}
