//! General purpose allocator over a fixed buffer.
//!
//! Free blocks form a singly linked list kept in ascending address order, with
//! each node stored in the first bytes of the block it describes. Allocated
//! blocks carry an [`AllocationHeader`] right before the payload:
//!
//! ```text
//!   block start                         payload
//!      │                                   │
//!      ▼                                   ▼
//!      ┌──────────────┬────────────────────┬───────────────────┬──────────────┐
//!      │   filler     │ AllocationHeader   │   payload         │ split-off    │
//!      │              │ block_size,padding │   (block_size)    │ free node    │
//!      └──────────────┴────────────────────┴───────────────────┴──────────────┘
//!      ◄──────────── padding ─────────────►
//! ```
//!
//! Freeing reads the header back, reinserts the block at its address-ordered
//! position and merges it with byte-contiguous neighbours.

use std::ptr::NonNull;

use tracing::{debug, trace, warn};

use crate::{
  align::{check_alignment, padding_with_header},
  block::{AllocationHeader, FreeListNode},
  config::{DEFAULT_ALIGNMENT, FREE_LIST_MIN_ALIGNMENT, Placement},
  error::{AllocError, AllocResult, FreeViolation},
  region::RegionView,
  traits::BufferAllocator,
};

/// A free block as seen from outside: byte offset from the buffer start and
/// size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
  pub offset: usize,
  pub size: usize,
}

/// A block chosen to satisfy a request.
#[derive(Debug, Clone, Copy)]
struct Fit {
  prev: Option<usize>,
  offset: usize,
  node: FreeListNode,
  padding: usize,
}

#[derive(Debug)]
pub struct FreeListAllocator<'buf> {
  region: RegionView<'buf>,
  used: usize,
  policy: Placement,
  head: Option<usize>,
}

impl<'buf> FreeListAllocator<'buf> {
  pub fn new(
    buffer: &'buf mut [u8],
    policy: Placement,
  ) -> AllocResult<Self> {
    Self::from_region(RegionView::new(buffer), policy)
  }

  pub fn from_region(
    region: RegionView<'buf>,
    policy: Placement,
  ) -> AllocResult<Self> {
    if region.len() < FreeListNode::SIZE {
      return Err(AllocError::InvalidConfig(
        "buffer must hold at least one free-list node",
      ));
    }

    let mut list = Self {
      region,
      used: 0,
      policy,
      head: None,
    };
    list.reset()?;

    debug!(capacity = list.region.len(), ?policy, "free list initialised");

    Ok(list)
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
    check_alignment(align)?;

    let requested = size;
    let size = size.max(FreeListNode::SIZE);
    let align = align.max(FREE_LIST_MIN_ALIGNMENT);

    let fit = match self.policy {
      Placement::FirstFit => self.find_first(size, align)?,
      Placement::BestFit => self.find_best(size, align)?,
    };

    let Some(Fit {
      prev,
      offset,
      node,
      padding,
    }) = fit
    else {
      trace!(size, align, used = self.used, "free list has no suitable block");

      return Err(AllocError::OutOfMemory {
        requested,
        available: self.region.len() - self.used,
      });
    };

    let required = padding + size;
    let leftover = node.block_size - required;

    // A leftover too small to carry a node stays with the allocation.
    let consumed = if leftover >= FreeListNode::SIZE {
      let split = offset + required;
      self.insert_node(Some(offset), split, leftover)?;
      required
    } else {
      node.block_size
    };

    let next = FreeListNode::read(&self.region, offset)?.next;
    self.remove_node(prev, next)?;

    let payload = offset + padding;
    let block_size = consumed - padding;

    AllocationHeader {
      block_size,
      padding,
    }
    .write(&mut self.region, payload - AllocationHeader::SIZE)?;
    self.region.fill_zero(payload, block_size)?;

    self.used += consumed;

    trace!(offset = payload, size = block_size, padding, "free list alloc");

    self.region.slice(payload, requested)
  }

  /// Returns the block at `ptr` to the free list and merges it with adjacent
  /// free blocks.
  pub fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> AllocResult<()> {
    let (start, span) = self.block_of(ptr)?;

    let mut prev = None;
    let mut cursor = self.head;
    while let Some(at) = cursor {
      if at > start {
        break;
      }
      let node = FreeListNode::read(&self.region, at)?;
      prev = Some((at, node));
      cursor = node.next;
    }

    let overlaps_prev = prev.is_some_and(|(at, node)| at + node.block_size > start);
    let overlaps_next = cursor.is_some_and(|next| start + span > next);
    if overlaps_prev || overlaps_next {
      warn!(offset = start, size = span, "free list double free");
      return Err(FreeViolation::DoubleFree.into());
    }

    let used = self
      .used
      .checked_sub(span)
      .ok_or(AllocError::InvalidFree(FreeViolation::CorruptHeader))?;

    let prev = prev.map(|(at, _)| at);
    self.insert_node(prev, start, span)?;
    self.used = used;

    trace!(offset = start, size = span, "free list free");

    self.coalesce(prev, start)
  }

  /// Collapses the list back to one block spanning the whole buffer.
  pub fn free_all(&mut self) {
    match self.reset() {
      Ok(()) => debug!(capacity = self.region.len(), "free list reset"),
      Err(err) => warn!(%err, "free list reset failed"),
    }
  }

  #[inline]
  pub fn policy(&self) -> Placement {
    self.policy
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.region.len()
  }

  /// Bytes held by live allocations, padding and headers included.
  #[inline]
  pub fn used(&self) -> usize {
    self.used
  }

  /// Walks the free list in address order. Iteration stops early if a node
  /// cannot be read.
  pub fn free_blocks(&self) -> FreeBlocks<'_, 'buf> {
    FreeBlocks {
      region: &self.region,
      cursor: self.head,
    }
  }

  fn reset(&mut self) -> AllocResult<()> {
    FreeListNode {
      next: None,
      block_size: self.region.len(),
    }
    .write(&mut self.region, 0)?;

    self.head = Some(0);
    self.used = 0;

    Ok(())
  }

  fn fit_at(
    &self,
    prev: Option<usize>,
    offset: usize,
    node: FreeListNode,
    size: usize,
    align: usize,
  ) -> AllocResult<Option<Fit>> {
    let padding = padding_with_header(
      self.region.addr_of(offset),
      align,
      AllocationHeader::SIZE,
    )?;

    let fits = padding
      .checked_add(size)
      .is_some_and(|required| required <= node.block_size);

    Ok(fits.then_some(Fit {
      prev,
      offset,
      node,
      padding,
    }))
  }

  fn find_first(
    &self,
    size: usize,
    align: usize,
  ) -> AllocResult<Option<Fit>> {
    let mut prev = None;
    let mut cursor = self.head;

    while let Some(offset) = cursor {
      let node = FreeListNode::read(&self.region, offset)?;

      if let Some(fit) = self.fit_at(prev, offset, node, size, align)? {
        return Ok(Some(fit));
      }

      prev = Some(offset);
      cursor = node.next;
    }

    Ok(None)
  }

  fn find_best(
    &self,
    size: usize,
    align: usize,
  ) -> AllocResult<Option<Fit>> {
    let mut best: Option<(usize, Fit)> = None;
    let mut prev = None;
    let mut cursor = self.head;

    while let Some(offset) = cursor {
      let node = FreeListNode::read(&self.region, offset)?;

      if let Some(fit) = self.fit_at(prev, offset, node, size, align)? {
        let leftover = node.block_size - (fit.padding + size);

        if best.is_none_or(|(smallest, _)| leftover < smallest) {
          best = Some((leftover, fit));
        }
      }

      prev = Some(offset);
      cursor = node.next;
    }

    Ok(best.map(|(_, fit)| fit))
  }

  /// Links a node `{ size }` at `at` right after `prev` (or at the head when
  /// `prev` is `None`).
  ///
  /// Pre: `prev` is a listed node (or `None`), `at` lies between `prev` and
  /// its successor, and `at + size` fits the buffer.
  /// Post: the list contains `at`, still in address order. On error nothing
  /// has been modified.
  fn insert_node(
    &mut self,
    prev: Option<usize>,
    at: usize,
    size: usize,
  ) -> AllocResult<()> {
    self.region.check(at, size)?;

    let next = match prev {
      Some(prev) => FreeListNode::read(&self.region, prev)?.next,
      None => self.head,
    };

    FreeListNode {
      next,
      block_size: size,
    }
    .write(&mut self.region, at)?;

    self.link(prev, Some(at))
  }

  /// Unlinks the successor of `prev` (the head when `prev` is `None`), whose
  /// own `next` is `next`.
  ///
  /// Pre: `next` is the removed node's successor.
  /// Post: the removed node is no longer reachable; its bytes are untouched.
  fn remove_node(
    &mut self,
    prev: Option<usize>,
    next: Option<usize>,
  ) -> AllocResult<()> {
    self.link(prev, next)
  }

  fn link(
    &mut self,
    prev: Option<usize>,
    next: Option<usize>,
  ) -> AllocResult<()> {
    match prev {
      Some(prev) => FreeListNode::set_next(&mut self.region, prev, next),
      None => {
        self.head = next;
        Ok(())
      }
    }
  }

  /// Merges the node at `at` with its successor and then with `prev`, each
  /// only when the two are byte-contiguous.
  fn coalesce(
    &mut self,
    prev: Option<usize>,
    at: usize,
  ) -> AllocResult<()> {
    let mut node = FreeListNode::read(&self.region, at)?;

    if let Some(next) = node.next {
      if at + node.block_size == next {
        let successor = FreeListNode::read(&self.region, next)?;

        node.block_size += successor.block_size;
        node.write(&mut self.region, at)?;
        self.remove_node(Some(at), successor.next)?;
        node.next = successor.next;

        trace!(offset = at, size = node.block_size, "merged with successor");
      }
    }

    if let Some(prev) = prev {
      let mut before = FreeListNode::read(&self.region, prev)?;

      if prev + before.block_size == at {
        before.block_size += node.block_size;
        before.write(&mut self.region, prev)?;
        self.remove_node(Some(prev), node.next)?;

        trace!(offset = prev, size = before.block_size, "merged with predecessor");
      }
    }

    Ok(())
  }

  /// Start offset and total size of the allocated block whose payload is `ptr`.
  fn block_of(
    &self,
    ptr: NonNull<u8>,
  ) -> AllocResult<(usize, usize)> {
    let payload = match self.region.offset_of(ptr) {
      Some(offset) if offset < self.region.len() => offset,
      _ => {
        warn!(?ptr, "free list free of a pointer outside the buffer");
        return Err(FreeViolation::OutOfBounds.into());
      }
    };

    let corrupt = || {
      warn!(offset = payload, "free list allocation header is corrupted");
      AllocError::InvalidFree(FreeViolation::CorruptHeader)
    };

    let at = payload
      .checked_sub(AllocationHeader::SIZE)
      .ok_or_else(corrupt)?;
    let header = AllocationHeader::read(&self.region, at)?;

    if header.padding < AllocationHeader::SIZE {
      return Err(corrupt());
    }

    let start = payload.checked_sub(header.padding).ok_or_else(corrupt)?;
    let span = header
      .span()
      .filter(|span| {
        *span >= FreeListNode::SIZE
          && start
            .checked_add(*span)
            .is_some_and(|end| end <= self.region.len())
      })
      .ok_or_else(corrupt)?;

    Ok((start, span))
  }
}

impl BufferAllocator for FreeListAllocator<'_> {
  fn alloc_align(
    &mut self,
    size: usize,
    align: usize,
  ) -> AllocResult<NonNull<[u8]>> {
    FreeListAllocator::alloc_align(self, size, align)
  }

  fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> AllocResult<()> {
    FreeListAllocator::free(self, ptr)
  }

  fn free_all(&mut self) {
    FreeListAllocator::free_all(self)
  }

  fn capacity(&self) -> usize {
    FreeListAllocator::capacity(self)
  }

  fn used(&self) -> usize {
    FreeListAllocator::used(self)
  }
}

/// Iterator returned by [`FreeListAllocator::free_blocks`].
#[derive(Debug)]
pub struct FreeBlocks<'a, 'buf> {
  region: &'a RegionView<'buf>,
  cursor: Option<usize>,
}

impl Iterator for FreeBlocks<'_, '_> {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<FreeBlock> {
    let offset = self.cursor?;
    let node = FreeListNode::read(self.region, offset).ok()?;

    // A link pointing backwards means the list was corrupted; stop rather
    // than loop forever.
    self.cursor = node.next.filter(|next| *next > offset);

    Some(FreeBlock {
      offset,
      size: node.block_size,
    })
  }
}
