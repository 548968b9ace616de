use std::ptr::NonNull;

use tracing::{debug, trace, warn};

use crate::{
  align::{align_forward, check_alignment},
  block::PoolNode,
  config::PoolConfig,
  error::{AllocError, AllocResult, FreeViolation},
  region::RegionView,
  traits::BufferAllocator,
};

/// Fixed-size chunk allocator with an intrusive free list.
///
/// Every free chunk stores the offset of the next free chunk in its first
/// word, so both `alloc` and `free` are O(1):
///
/// ```text
///   head ─────────────────────────────┐
///                                     ▼
///   ┌────────┬────────┬────────┬────────┐
///   │ used   │ next ──┼─► ...  │ next ──┼──┐
///   └────────┴────────┴────────┴────────┘  │
///                 ▲                        │
///                 └────────────────────────┘
/// ```
///
/// Double frees are not detected: freeing a chunk twice links it into the list
/// twice and two later allocations will share it.
#[derive(Debug)]
pub struct PoolAllocator<'buf> {
  region: RegionView<'buf>,
  chunk_size: usize,
  chunk_alignment: usize,
  chunk_count: usize,
  head: Option<usize>,
  in_use: usize,
}

impl<'buf> PoolAllocator<'buf> {
  pub fn new(
    buffer: &'buf mut [u8],
    chunk_size: usize,
    chunk_alignment: usize,
  ) -> AllocResult<Self> {
    Self::from_region(
      RegionView::new(buffer),
      PoolConfig::new(chunk_size).with_alignment(chunk_alignment),
    )
  }

  pub fn with_config(
    buffer: &'buf mut [u8],
    config: PoolConfig,
  ) -> AllocResult<Self> {
    Self::from_region(RegionView::new(buffer), config)
  }

  pub fn from_region(
    region: RegionView<'buf>,
    config: PoolConfig,
  ) -> AllocResult<Self> {
    let PoolConfig {
      chunk_size,
      chunk_alignment,
    } = config;

    check_alignment(chunk_alignment)?;

    let start = align_forward(region.base_addr(), chunk_alignment)?;
    let skip = start - region.base_addr();
    if skip > region.len() {
      return Err(AllocError::InvalidConfig(
        "buffer too small to align its start",
      ));
    }
    let region = region.advance(skip)?;

    let chunk_size = align_forward(chunk_size, chunk_alignment)?;

    if chunk_size < PoolNode::SIZE {
      return Err(AllocError::InvalidConfig(
        "chunk size must hold a free-list link",
      ));
    }
    if region.len() < chunk_size {
      return Err(AllocError::InvalidConfig(
        "buffer must hold at least one chunk",
      ));
    }

    let mut pool = Self {
      chunk_count: region.len() / chunk_size,
      region,
      chunk_size,
      chunk_alignment,
      head: None,
      in_use: 0,
    };
    pool.rebuild()?;

    debug!(
      chunk_size,
      chunk_alignment,
      chunk_count = pool.chunk_count,
      skipped = skip,
      "pool initialised"
    );

    Ok(pool)
  }

  /// Pops a zeroed chunk off the free list.
  pub fn alloc(&mut self) -> AllocResult<NonNull<[u8]>> {
    let Some(chunk) = self.head else {
      trace!(chunk_count = self.chunk_count, "pool exhausted");

      return Err(AllocError::OutOfMemory {
        requested: self.chunk_size,
        available: 0,
      });
    };

    let next = PoolNode::read(&self.region, chunk)?.next;
    self.region.fill_zero(chunk, self.chunk_size)?;

    self.head = next;
    self.in_use += 1;

    trace!(offset = chunk, "pool alloc");

    self.region.slice(chunk, self.chunk_size)
  }

  /// Pushes `ptr` back onto the free list. The pointer must be the start of a
  /// chunk; the end of the managed region is not a valid chunk.
  pub fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> AllocResult<()> {
    let chunk = match self.region.offset_of(ptr) {
      Some(offset) if offset < self.chunk_count * self.chunk_size => offset,
      _ => {
        warn!(?ptr, "pool free of a pointer outside the pool");
        return Err(FreeViolation::OutOfBounds.into());
      }
    };

    if chunk % self.chunk_size != 0 {
      warn!(offset = chunk, "pool free of a pointer inside a chunk");
      return Err(FreeViolation::Misaligned.into());
    }

    PoolNode { next: self.head }.write(&mut self.region, chunk)?;

    self.head = Some(chunk);
    self.in_use = self.in_use.saturating_sub(1);

    trace!(offset = chunk, "pool free");

    Ok(())
  }

  pub fn free_all(&mut self) {
    match self.rebuild() {
      Ok(()) => debug!(chunk_count = self.chunk_count, "pool reset"),
      Err(err) => warn!(%err, "pool reset failed"),
    }
  }

  #[inline]
  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  #[inline]
  pub fn chunk_count(&self) -> usize {
    self.chunk_count
  }

  #[inline]
  pub fn free_chunks(&self) -> usize {
    self.chunk_count - self.in_use
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.chunk_count * self.chunk_size
  }

  #[inline]
  pub fn used(&self) -> usize {
    self.in_use * self.chunk_size
  }

  /// Links every chunk, lowest address first, so the highest one ends up at
  /// the head.
  fn rebuild(&mut self) -> AllocResult<()> {
    let mut head = None;

    for index in 0..self.chunk_count {
      let chunk = index * self.chunk_size;
      PoolNode { next: head }.write(&mut self.region, chunk)?;
      head = Some(chunk);
    }

    self.head = head;
    self.in_use = 0;

    Ok(())
  }
}

impl BufferAllocator for PoolAllocator<'_> {
  /// Hands out a whole chunk when `size` and `align` fit the pool geometry.
  fn alloc_align(
    &mut self,
    size: usize,
    align: usize,
  ) -> AllocResult<NonNull<[u8]>> {
    check_alignment(align)?;

    if align > self.chunk_alignment {
      return Err(AllocError::InvalidAlignment(align));
    }
    if size > self.chunk_size {
      return Err(AllocError::OutOfMemory {
        requested: size,
        available: self.chunk_size,
      });
    }

    PoolAllocator::alloc(self)
  }

  fn alloc(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<[u8]>> {
    BufferAllocator::alloc_align(self, size, self.chunk_alignment)
  }

  fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> AllocResult<()> {
    PoolAllocator::free(self, ptr)
  }

  fn free_all(&mut self) {
    PoolAllocator::free_all(self)
  }

  fn capacity(&self) -> usize {
    PoolAllocator::capacity(self)
  }

  fn used(&self) -> usize {
    PoolAllocator::used(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::Aligned;

  #[test]
  fn test_init_rounds_chunk_size() {
    let mut buffer = Aligned::<1024>::new();
    let pool = PoolAllocator::new(buffer.as_mut_slice(), 60, 16).unwrap();

    assert_eq!(pool.chunk_size(), 64);
    assert_eq!(pool.chunk_count(), 16);
    assert_eq!(pool.free_chunks(), 16);
  }

  #[test]
  fn test_init_aligns_buffer_start() {
    let mut buffer = Aligned::<1024>::new();
    let misaligned = &mut buffer.as_mut_slice()[3..];

    let mut pool = PoolAllocator::new(misaligned, 64, 8).unwrap();

    // 5 bytes skipped, 1016 left for 15 chunks.
    assert_eq!(pool.chunk_count(), 15);

    let chunk = pool.alloc().unwrap();
    assert_eq!(chunk.cast::<u8>().as_ptr().addr() % 8, 0);
  }

  #[test]
  fn test_init_rejects_bad_geometry() {
    let mut buffer = Aligned::<64>::new();

    assert_eq!(
      PoolAllocator::new(buffer.as_mut_slice(), 128, 8).unwrap_err(),
      AllocError::InvalidConfig("buffer must hold at least one chunk")
    );
    assert_eq!(
      PoolAllocator::new(buffer.as_mut_slice(), 2, 2).unwrap_err(),
      AllocError::InvalidConfig("chunk size must hold a free-list link")
    );
    assert_eq!(
      PoolAllocator::new(buffer.as_mut_slice(), 16, 12).unwrap_err(),
      AllocError::InvalidAlignment(12)
    );
  }

  #[test]
  fn test_alloc_free_alloc_same_chunk() {
    let mut buffer = Aligned::<256>::new();
    let mut pool = PoolAllocator::new(buffer.as_mut_slice(), 32, 8).unwrap();

    let chunk = pool.alloc().unwrap();
    unsafe { chunk.cast::<u8>().write_bytes(0xEE, 32) };
    pool.free(chunk.cast()).unwrap();

    let again = pool.alloc().unwrap();
    assert_eq!(again, chunk);
    assert_eq!(again.len(), 32);
    assert!(unsafe { again.as_ref() }.iter().all(|byte| *byte == 0));
  }

  #[test]
  fn test_exhaustion() {
    let mut buffer = Aligned::<128>::new();
    let mut pool = PoolAllocator::new(buffer.as_mut_slice(), 32, 8).unwrap();

    for _ in 0..4 {
      pool.alloc().unwrap();
    }

    assert_eq!(
      pool.alloc(),
      Err(AllocError::OutOfMemory {
        requested: 32,
        available: 0,
      })
    );
    assert_eq!(pool.free_chunks(), 0);
    assert!(pool.alloc().is_err());
  }

  #[test]
  fn test_free_bounds() {
    let mut buffer = Aligned::<128>::new();
    let mut pool = PoolAllocator::new(buffer.as_mut_slice(), 32, 8).unwrap();

    let chunk = pool.alloc().unwrap().cast::<u8>();

    let inside = unsafe { chunk.add(4) };
    assert_eq!(
      pool.free(inside),
      Err(AllocError::InvalidFree(FreeViolation::Misaligned))
    );

    // Lowest chunk + four chunks is one past the end of the pool.
    let lowest = unsafe { chunk.sub(3 * 32) };
    let end = unsafe { lowest.add(4 * 32) };
    assert_eq!(
      pool.free(end),
      Err(AllocError::InvalidFree(FreeViolation::OutOfBounds))
    );

    pool.free(chunk).unwrap();
    assert_eq!(pool.free_chunks(), 4);
  }

  #[test]
  fn test_free_all_restores_every_chunk() {
    let mut buffer = Aligned::<256>::new();
    let mut pool = PoolAllocator::new(buffer.as_mut_slice(), 64, 8).unwrap();

    let first = pool.alloc().unwrap();
    pool.alloc().unwrap();
    pool.free_all();

    assert_eq!(pool.free_chunks(), 4);
    assert_eq!(pool.used(), 0);
    assert_eq!(pool.alloc().unwrap(), first);
  }

  #[test]
  fn test_through_trait() {
    let mut buffer = Aligned::<256>::new();
    let mut pool = PoolAllocator::new(buffer.as_mut_slice(), 64, 16).unwrap();
    let pool: &mut dyn BufferAllocator = &mut pool;

    assert_eq!(
      pool.alloc(65),
      Err(AllocError::OutOfMemory {
        requested: 65,
        available: 64,
      })
    );
    assert_eq!(pool.alloc_align(8, 32), Err(AllocError::InvalidAlignment(32)));

    let chunk = pool.alloc(10).unwrap();
    assert_eq!(chunk.len(), 64);
    assert_eq!(pool.used(), 64);
    assert_eq!(pool.remaining(), 192);
  }
}
