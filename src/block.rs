//! Layouts of the bookkeeping records the allocators overlay on buffer bytes.
//!
//! Links between records are byte offsets from the region base; [`NIL`] marks
//! the end of a list.

use std::mem;

use crate::{error::AllocResult, region::RegionView};

const NIL: usize = usize::MAX;

const WORD: usize = mem::size_of::<usize>();

#[inline]
fn encode(link: Option<usize>) -> usize {
  link.unwrap_or(NIL)
}

#[inline]
fn decode(word: usize) -> Option<usize> {
  (word != NIL).then_some(word)
}

/// Written right before every stack payload.
///
/// ```text
///   ┌──────────────────┬─────────┬────────────
///   │ prev_top (word)  │ padding │ payload ...
///   └──────────────────┴─────────┴────────────
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StackHeader {
  pub prev_top: Option<usize>,
  pub padding: u8,
}

impl StackHeader {
  pub const SIZE: usize = WORD + 1;

  pub fn read(
    region: &RegionView<'_>,
    at: usize,
  ) -> AllocResult<Self> {
    region.check(at, Self::SIZE)?;

    Ok(Self {
      prev_top: decode(region.read_word(at)?),
      padding: region.read_byte(at + WORD)?,
    })
  }

  pub fn write(
    self,
    region: &mut RegionView<'_>,
    at: usize,
  ) -> AllocResult<()> {
    region.check(at, Self::SIZE)?;
    region.write_word(at, encode(self.prev_top))?;
    region.write_byte(at + WORD, self.padding)
  }
}

/// Link stored in the first word of a free pool chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolNode {
  pub next: Option<usize>,
}

impl PoolNode {
  pub const SIZE: usize = WORD;

  pub fn read(
    region: &RegionView<'_>,
    at: usize,
  ) -> AllocResult<Self> {
    Ok(Self {
      next: decode(region.read_word(at)?),
    })
  }

  pub fn write(
    self,
    region: &mut RegionView<'_>,
    at: usize,
  ) -> AllocResult<()> {
    region.write_word(at, encode(self.next))
  }
}

/// Leading bytes of a free block in the free-list allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FreeListNode {
  pub next: Option<usize>,
  pub block_size: usize,
}

impl FreeListNode {
  pub const SIZE: usize = 2 * WORD;

  pub fn read(
    region: &RegionView<'_>,
    at: usize,
  ) -> AllocResult<Self> {
    region.check(at, Self::SIZE)?;

    Ok(Self {
      next: decode(region.read_word(at)?),
      block_size: region.read_word(at + WORD)?,
    })
  }

  pub fn write(
    self,
    region: &mut RegionView<'_>,
    at: usize,
  ) -> AllocResult<()> {
    region.check(at, Self::SIZE)?;
    region.write_word(at, encode(self.next))?;
    region.write_word(at + WORD, self.block_size)
  }

  pub fn set_next(
    region: &mut RegionView<'_>,
    at: usize,
    next: Option<usize>,
  ) -> AllocResult<()> {
    region.write_word(at, encode(next))
  }
}

/// Written right before every free-list payload. `padding` counts the bytes
/// from the block start to the payload (header included), `block_size` the
/// payload bytes that belong to the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AllocationHeader {
  pub block_size: usize,
  pub padding: usize,
}

impl AllocationHeader {
  pub const SIZE: usize = 2 * WORD;

  pub fn read(
    region: &RegionView<'_>,
    at: usize,
  ) -> AllocResult<Self> {
    region.check(at, Self::SIZE)?;

    Ok(Self {
      block_size: region.read_word(at)?,
      padding: region.read_word(at + WORD)?,
    })
  }

  pub fn write(
    self,
    region: &mut RegionView<'_>,
    at: usize,
  ) -> AllocResult<()> {
    region.check(at, Self::SIZE)?;
    region.write_word(at, self.block_size)?;
    region.write_word(at + WORD, self.padding)
  }

  /// Total bytes the block occupies, from its start to the end of the payload.
  pub fn span(&self) -> Option<usize> {
    self.padding.checked_add(self.block_size)
  }
}
