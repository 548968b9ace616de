/// Test buffer whose first byte is 64-byte aligned, so offsets computed by the
/// allocators do not depend on where the array happens to land.
#[repr(C, align(64))]
pub(crate) struct Aligned<const N: usize>([u8; N]);

impl<const N: usize> Aligned<N> {
  pub fn new() -> Self {
    Self([0; N])
  }

  pub fn as_mut_slice(&mut self) -> &mut [u8] {
    &mut self.0
  }
}
