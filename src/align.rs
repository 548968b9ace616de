use crate::error::{AllocError, AllocResult};

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two and `value + align - 1` must not overflow;
/// [`align_forward`] checks both before expanding this macro.
///
/// # Examples
///
/// ```rust
/// use bufalloc::align;
///
/// assert_eq!(align!(13usize, 8usize), 16);
/// assert_eq!(align!(16usize, 8usize), 16);
/// assert_eq!(align!(1usize, 64usize), 64);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

#[inline]
pub const fn is_power_of_two(x: usize) -> bool {
  x != 0 && (x & (x - 1)) == 0
}

/// Fails with [`AllocError::InvalidAlignment`] unless `align` is a power of two.
#[inline]
pub fn check_alignment(align: usize) -> AllocResult<()> {
  if is_power_of_two(align) {
    Ok(())
  } else {
    Err(AllocError::InvalidAlignment(align))
  }
}

/// Returns the smallest multiple of `align` that is greater than or equal to
/// `address`.
pub fn align_forward(
  address: usize,
  align: usize,
) -> AllocResult<usize> {
  check_alignment(align)?;

  address.checked_add(align - 1).ok_or(AllocError::SizeOverflow)?;

  Ok(align!(address, align))
}

/// Number of filler bytes to place before `address` so that the payload that
/// follows is aligned to `align` and at least `header_size` bytes precede it.
///
/// ```text
///   address                         payload (aligned)
///      │                                  │
///      ▼                                  ▼
///      ┌────────────────────────┬─────────┬───────────────
///      │       filler           │ header  │  payload ...
///      └────────────────────────┴─────────┴───────────────
///      ◄──────────── padding ────────────►
/// ```
pub fn padding_with_header(
  address: usize,
  align: usize,
  header_size: usize,
) -> AllocResult<usize> {
  let mut padding = align_forward(address, align)? - address;

  if padding < header_size {
    let needed = header_size - padding;
    let grow = needed
      .div_ceil(align)
      .checked_mul(align)
      .ok_or(AllocError::SizeOverflow)?;

    padding = padding.checked_add(grow).ok_or(AllocError::SizeOverflow)?;
  }

  Ok(padding)
}
