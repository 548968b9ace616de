//! Non-owning, bounds-checked view of a caller-supplied buffer.
//!
//! Every allocator addresses the buffer through offsets relative to the view's
//! base; this module is the only place where those offsets are turned into
//! raw pointer reads and writes, and each access is checked against the
//! buffer length first.
//!
//! Headers and nodes are read and written unaligned, so the buffer itself has
//! no alignment requirement.

use std::{marker::PhantomData, mem, ptr::NonNull};

use crate::error::{AllocError, AllocResult};

/// A `(base, len)` view of a backing buffer borrowed for `'buf`.
///
/// The view holds a raw pointer, so it (and every allocator built on it) is
/// neither `Send` nor `Sync`.
#[derive(Debug)]
pub struct RegionView<'buf> {
  base: NonNull<u8>,
  len: usize,
  _buf: PhantomData<&'buf mut [u8]>,
}

impl<'buf> RegionView<'buf> {
  pub fn new(buffer: &'buf mut [u8]) -> Self {
    let len = buffer.len();

    Self {
      base: NonNull::from(buffer).cast::<u8>(),
      len,
      _buf: PhantomData,
    }
  }

  /// Builds a view over memory the caller obtained elsewhere (C, `mmap`, ...).
  ///
  /// # Safety
  ///
  /// `base` must be valid for reads and writes of `len` bytes for `'buf`, and
  /// nothing else may access that memory while the view (or an allocator
  /// built on it) is alive, except through pointers the allocator returns.
  pub unsafe fn from_raw_parts(
    base: NonNull<u8>,
    len: usize,
  ) -> Self {
    Self {
      base,
      len,
      _buf: PhantomData,
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Address of the first byte.
  #[inline]
  pub fn base_addr(&self) -> usize {
    self.base.as_ptr().addr()
  }

  /// Address of the byte at `offset`. Pure arithmetic, nothing is accessed.
  #[inline]
  pub fn addr_of(
    &self,
    offset: usize,
  ) -> usize {
    self.base_addr() + offset
  }

  /// Offset of `ptr` from the base, if it lies in `[base, base + len]`.
  ///
  /// The one-past-the-end address is accepted here (a zero-sized allocation
  /// can sit there); allocators that need an exclusive bound check it
  /// themselves.
  pub fn offset_of(
    &self,
    ptr: NonNull<u8>,
  ) -> Option<usize> {
    ptr
      .as_ptr()
      .addr()
      .checked_sub(self.base_addr())
      .filter(|offset| *offset <= self.len)
  }

  /// Drops the first `count` bytes from the view.
  pub(crate) fn advance(
    self,
    count: usize,
  ) -> AllocResult<Self> {
    self.check(0, count)?;

    Ok(Self {
      // SAFETY: `count <= len`, so the result stays inside (or one past) the buffer.
      base: unsafe { self.base.add(count) },
      len: self.len - count,
      _buf: PhantomData,
    })
  }

  pub(crate) fn check(
    &self,
    offset: usize,
    len: usize,
  ) -> AllocResult<()> {
    match offset.checked_add(len) {
      Some(end) if end <= self.len => Ok(()),
      _ => Err(AllocError::OutOfBounds {
        offset,
        len,
        capacity: self.len,
      }),
    }
  }

  /// Pointer to `len` bytes starting at `offset`.
  pub(crate) fn slice(
    &self,
    offset: usize,
    len: usize,
  ) -> AllocResult<NonNull<[u8]>> {
    self.check(offset, len)?;

    // SAFETY: `offset + len <= self.len`.
    let start = unsafe { self.base.add(offset) };

    Ok(NonNull::slice_from_raw_parts(start, len))
  }

  pub(crate) fn read_byte(
    &self,
    offset: usize,
  ) -> AllocResult<u8> {
    self.check(offset, 1)?;

    // SAFETY: bounds checked above.
    Ok(unsafe { self.base.add(offset).read() })
  }

  pub(crate) fn write_byte(
    &mut self,
    offset: usize,
    value: u8,
  ) -> AllocResult<()> {
    self.check(offset, 1)?;

    // SAFETY: bounds checked above.
    unsafe { self.base.add(offset).write(value) };

    Ok(())
  }

  pub(crate) fn read_word(
    &self,
    offset: usize,
  ) -> AllocResult<usize> {
    self.check(offset, mem::size_of::<usize>())?;

    // SAFETY: bounds checked above; the read is unaligned.
    Ok(unsafe { self.base.add(offset).cast::<usize>().read_unaligned() })
  }

  pub(crate) fn write_word(
    &mut self,
    offset: usize,
    value: usize,
  ) -> AllocResult<()> {
    self.check(offset, mem::size_of::<usize>())?;

    // SAFETY: bounds checked above; the write is unaligned.
    unsafe {
      self
        .base
        .add(offset)
        .cast::<usize>()
        .write_unaligned(value)
    };

    Ok(())
  }

  pub(crate) fn fill_zero(
    &mut self,
    offset: usize,
    len: usize,
  ) -> AllocResult<()> {
    self.check(offset, len)?;

    // SAFETY: bounds checked above.
    unsafe { self.base.add(offset).write_bytes(0, len) };

    Ok(())
  }

  /// `memmove` inside the buffer; the ranges may overlap.
  pub(crate) fn copy(
    &mut self,
    src: usize,
    dst: usize,
    len: usize,
  ) -> AllocResult<()> {
    self.check(src, len)?;
    self.check(dst, len)?;

    // SAFETY: both ranges checked above; `copy_to` tolerates overlap.
    unsafe { self.base.add(src).copy_to(self.base.add(dst), len) };

    Ok(())
  }
}
