//! Error type shared by every allocator in the crate.

/// Result alias used throughout the crate.
pub type AllocResult<T> = Result<T, AllocError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
  /// The request cannot be satisfied by the remaining capacity, or no free
  /// chunk/block is large enough.
  #[error("out of memory: requested {requested} bytes, {available} available")]
  OutOfMemory { requested: usize, available: usize },

  /// A pointer handed to `free`/`resize` does not denote a live allocation
  /// the allocator can release.
  #[error("invalid free: {0}")]
  InvalidFree(FreeViolation),

  /// Alignment is not a power of two or exceeds what the strategy supports.
  #[error("unsupported alignment {0}")]
  InvalidAlignment(usize),

  /// Construction parameters cannot describe a usable allocator.
  #[error("invalid configuration: {0}")]
  InvalidConfig(&'static str),

  /// Address or size arithmetic overflowed `usize`.
  #[error("address arithmetic overflowed")]
  SizeOverflow,

  /// An in-buffer header or node would extend past the buffer. Only reachable
  /// when the bookkeeping stored in the buffer has been overwritten.
  #[error("access of {len} bytes at offset {offset} exceeds buffer of {capacity} bytes")]
  OutOfBounds {
    offset: usize,
    len: usize,
    capacity: usize,
  },
}

/// Why a free was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FreeViolation {
  #[error("pointer lies outside the managed region")]
  OutOfBounds,
  #[error("pointer is not the top of the stack")]
  OutOfOrder,
  #[error("pointer is not at a chunk boundary")]
  Misaligned,
  #[error("allocation header is corrupted")]
  CorruptHeader,
  #[error("block overlaps memory that is already free")]
  DoubleFree,
}

impl AllocError {
  /// `true` when retrying after releasing memory may succeed.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, AllocError::OutOfMemory { .. })
  }

  /// `true` for caller bugs: bad frees and malformed alignments.
  pub fn is_contract_violation(&self) -> bool {
    matches!(
      self,
      AllocError::InvalidFree(_) | AllocError::InvalidAlignment(_)
    )
  }
}

impl From<FreeViolation> for AllocError {
  fn from(violation: FreeViolation) -> Self {
    AllocError::InvalidFree(violation)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    let err = AllocError::OutOfMemory {
      requested: 64,
      available: 8,
    };
    assert_eq!(
      err.to_string(),
      "out of memory: requested 64 bytes, 8 available"
    );

    let err: AllocError = FreeViolation::OutOfOrder.into();
    assert_eq!(
      err.to_string(),
      "invalid free: pointer is not the top of the stack"
    );
  }

  #[test]
  fn test_classification() {
    let oom = AllocError::OutOfMemory {
      requested: 1,
      available: 0,
    };
    assert!(oom.is_recoverable());
    assert!(!oom.is_contract_violation());

    assert!(AllocError::InvalidAlignment(3).is_contract_violation());
    assert!(AllocError::InvalidFree(FreeViolation::DoubleFree).is_contract_violation());
    assert!(!AllocError::SizeOverflow.is_recoverable());
  }
}
