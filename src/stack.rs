use std::ptr::NonNull;

use tracing::{debug, trace, warn};

use crate::{
  align::{check_alignment, padding_with_header},
  block::StackHeader,
  config::{DEFAULT_ALIGNMENT, STACK_MAX_ALIGNMENT},
  error::{AllocError, AllocResult, FreeViolation},
  region::RegionView,
  traits::BufferAllocator,
};

/// LIFO allocator. Each payload is preceded by a [`StackHeader`] recording the
/// padding in front of it and the previous top of the stack, so blocks can be
/// popped one at a time, most recent first.
///
/// ```text
///   ┌───────┬────┬──────────┬───────┬────┬──────────┬──────────────┐
///   │filler │ H1 │    A1    │filler │ H2 │    A2    │    free      │
///   └───────┴────┴──────────┴───────┴────┴──────────┴──────────────┘
///                ▲                       ▲          ▲
///             payload                   top       offset
/// ```
#[derive(Debug)]
pub struct StackAllocator<'buf> {
  region: RegionView<'buf>,
  offset: usize,
  top: Option<usize>,
}

impl<'buf> StackAllocator<'buf> {
  pub fn new(buffer: &'buf mut [u8]) -> Self {
    Self::from_region(RegionView::new(buffer))
  }

  pub fn from_region(region: RegionView<'buf>) -> Self {
    debug!(capacity = region.len(), "stack initialised");

    Self {
      region,
      offset: 0,
      top: None,
    }
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
    let (start, padding) = self.place(self.offset, size, align)?;

    StackHeader {
      prev_top: self.top,
      padding,
    }
    .write(&mut self.region, start - StackHeader::SIZE)?;
    self.region.fill_zero(start, size)?;

    self.offset = start + size;
    self.top = Some(start);

    trace!(offset = start, size, align, padding, "stack alloc");

    self.region.slice(start, size)
  }

  /// Pops the most recent allocation. Any other pointer is rejected and the
  /// stack is left as it was.
  pub fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> AllocResult<()> {
    let start = self.locate_top(ptr)?;
    let header = self.header_of(start)?;

    self.offset = start - usize::from(header.padding);
    self.top = header.prev_top;

    trace!(offset = start, new_offset = self.offset, "stack free");

    Ok(())
  }

  pub fn resize(
    &mut self,
    ptr: Option<NonNull<u8>>,
    old_size: usize,
    new_size: usize,
  ) -> AllocResult<Option<NonNull<[u8]>>> {
    self.resize_align(ptr, old_size, new_size, DEFAULT_ALIGNMENT)
  }

  /// Grows or shrinks the top allocation.
  ///
  /// `None` allocates, `new_size == 0` frees, an unchanged size returns the
  /// same region. Otherwise `ptr` must be the top of the stack: the block is
  /// placed again from where it started, keeping its first
  /// `min(old_size, new_size)` bytes and zeroing any growth. With an unchanged
  /// alignment the payload does not move.
  pub fn resize_align(
    &mut self,
    ptr: Option<NonNull<u8>>,
    old_size: usize,
    new_size: usize,
    align: usize,
  ) -> AllocResult<Option<NonNull<[u8]>>> {
    let Some(ptr) = ptr else {
      return self.alloc_align(new_size, align).map(Some);
    };

    if new_size == 0 {
      self.free(ptr)?;
      return Ok(None);
    }

    if old_size == new_size {
      let offset = self
        .region
        .offset_of(ptr)
        .ok_or(FreeViolation::OutOfBounds)?;

      return self.region.slice(offset, old_size).map(Some);
    }

    let start = self.locate_top(ptr)?;
    let header = self.header_of(start)?;
    let from = start - usize::from(header.padding);

    let (new_start, padding) = self.place(from, new_size, align)?;
    let keep = old_size.min(new_size).min(self.offset - start);

    self.region.copy(start, new_start, keep)?;
    StackHeader {
      prev_top: header.prev_top,
      padding,
    }
    .write(&mut self.region, new_start - StackHeader::SIZE)?;
    self.region.fill_zero(new_start + keep, new_size - keep)?;

    self.offset = new_start + new_size;
    self.top = Some(new_start);

    trace!(from = start, to = new_start, old_size, new_size, "stack resize");

    self.region.slice(new_start, new_size).map(Some)
  }

  pub fn free_all(&mut self) {
    debug!(released = self.offset, "stack reset");

    self.offset = 0;
    self.top = None;
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

  /// Payload offset and padding for `size` bytes placed at `from`.
  fn place(
    &self,
    from: usize,
    size: usize,
    align: usize,
  ) -> AllocResult<(usize, u8)> {
    check_alignment(align)?;

    if align > STACK_MAX_ALIGNMENT {
      return Err(AllocError::InvalidAlignment(align));
    }

    let padding = padding_with_header(self.region.addr_of(from), align, StackHeader::SIZE)?;

    let start = from
      .checked_add(padding)
      .filter(|start| {
        start
          .checked_add(size)
          .is_some_and(|end| end <= self.region.len())
      })
      .ok_or(AllocError::OutOfMemory {
        requested: size,
        available: self.region.len() - from,
      })?;

    let padding = u8::try_from(padding).map_err(|_| AllocError::InvalidAlignment(align))?;

    Ok((start, padding))
  }

  fn locate_top(
    &self,
    ptr: NonNull<u8>,
  ) -> AllocResult<usize> {
    let Some(offset) = self.region.offset_of(ptr) else {
      warn!(?ptr, "stack free of a pointer outside the buffer");
      return Err(FreeViolation::OutOfBounds.into());
    };

    if Some(offset) != self.top {
      warn!(offset, top = ?self.top, "stack free out of order");
      return Err(FreeViolation::OutOfOrder.into());
    }

    Ok(offset)
  }

  fn header_of(
    &self,
    start: usize,
  ) -> AllocResult<StackHeader> {
    let corrupt = AllocError::InvalidFree(FreeViolation::CorruptHeader);

    let at = start.checked_sub(StackHeader::SIZE).ok_or(corrupt)?;
    let header = StackHeader::read(&self.region, at)?;

    let padding_fits = usize::from(header.padding) >= StackHeader::SIZE
      && usize::from(header.padding) <= start;
    let prev_below = header.prev_top.is_none_or(|prev| prev < start);

    if padding_fits && prev_below {
      Ok(header)
    } else {
      warn!(offset = start, ?header, "stack header overwritten");
      Err(corrupt)
    }
  }
}

impl BufferAllocator for StackAllocator<'_> {
  fn alloc_align(
    &mut self,
    size: usize,
    align: usize,
  ) -> AllocResult<NonNull<[u8]>> {
    StackAllocator::alloc_align(self, size, align)
  }

  fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> AllocResult<()> {
    StackAllocator::free(self, ptr)
  }

  fn free_all(&mut self) {
    StackAllocator::free_all(self)
  }

  fn capacity(&self) -> usize {
    StackAllocator::capacity(self)
  }

  fn used(&self) -> usize {
    StackAllocator::used(self)
  }
}
