//! End-to-end usage of each allocator over realistic buffers.

use std::{mem, ptr::NonNull};

use bufalloc::{
  AllocError, ArenaAllocator, BufferAllocator, DEFAULT_ALIGNMENT, FreeListAllocator, Placement,
  PoolAllocator, RegionView, StackAllocator,
};

#[repr(C, align(64))]
struct Aligned<const N: usize>([u8; N]);

fn addr(region: NonNull<[u8]>) -> usize {
  region.cast::<u8>().as_ptr().addr()
}

#[test]
fn arena_repeats_identical_layout_after_reset() {
  let mut backing = [0u8; 256];
  let mut arena = ArenaAllocator::new(&mut backing);

  let mut passes = Vec::new();

  for _ in 0..10 {
    arena.free_all();

    let x = arena.alloc(mem::size_of::<i32>()).unwrap();
    let f = arena.alloc(mem::size_of::<f32>()).unwrap();
    let s = arena.alloc(10).unwrap();

    unsafe {
      x.cast::<i32>().write(123);
      f.cast::<f32>().write(987.0);
      s.cast::<u8>().copy_from_nonoverlapping(NonNull::from(b"Hellope").cast(), 7);

      assert_eq!(x.cast::<i32>().read(), 123);
      assert_eq!(f.cast::<f32>().read(), 987.0);
      assert_eq!(&s.as_ref()[..7], b"Hellope");
      assert_eq!(s.as_ref()[7..], [0, 0, 0]);
    }

    assert!(addr(x) + x.len() <= addr(f));
    assert!(addr(f) + f.len() <= addr(s));
    for region in [x, f, s] {
      assert_eq!(addr(region) % DEFAULT_ALIGNMENT, 0);
    }

    passes.push([addr(x), addr(f), addr(s)]);
  }

  assert!(passes.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn stack_repeats_identical_layout_after_reset() {
  let mut backing = [0u8; 256];
  let mut stack = StackAllocator::new(&mut backing);

  let mut first_pass = None;

  for _ in 0..10 {
    stack.free_all();

    let x = stack.alloc(mem::size_of::<i32>()).unwrap();
    let f = stack.alloc(mem::size_of::<f32>()).unwrap();
    let s = stack.alloc(10).unwrap();

    unsafe {
      x.cast::<i32>().write(123);
      f.cast::<f32>().write(987.0);
      s.cast::<u8>().copy_from_nonoverlapping(NonNull::from(b"Hello").cast(), 5);
    }

    let pass = [addr(x), addr(f), addr(s)];
    assert_eq!(*first_pass.get_or_insert(pass), pass);
    assert!(pass[0] < pass[1] && pass[1] < pass[2]);
  }
}

#[test]
fn pool_reuses_freed_chunks_in_lifo_order() {
  let mut backing = Aligned::<1024>([0; 1024]);
  let mut pool = PoolAllocator::new(&mut backing.0, 64, 8).unwrap();

  let a = pool.alloc().unwrap();
  let b = pool.alloc().unwrap();
  let c = pool.alloc().unwrap();
  let d = pool.alloc().unwrap();
  let e = pool.alloc().unwrap();
  let f = pool.alloc().unwrap();
  assert_eq!(pool.free_chunks(), 10);

  pool.free(f.cast()).unwrap();
  pool.free(c.cast()).unwrap();
  pool.free(b.cast()).unwrap();
  pool.free(d.cast()).unwrap();

  // Most recently freed first.
  assert_eq!(pool.alloc().unwrap(), d);
  assert_eq!(pool.alloc().unwrap(), b);
  assert_eq!(pool.free_chunks(), 12);

  pool.free(a.cast()).unwrap();
  pool.free(e.cast()).unwrap();

  let g = pool.alloc().unwrap();
  assert_eq!(g, e);
  unsafe { g.cast::<i32>().write(16) };
  assert_eq!(unsafe { g.cast::<i32>().read() }, 16);
}

#[test]
fn pool_exhaustion_keeps_free_list_empty() {
  let mut backing = Aligned::<256>([0; 256]);
  let mut pool = PoolAllocator::new(&mut backing.0, 64, 8).unwrap();

  let chunks: Vec<_> = (0..4).map(|_| pool.alloc().unwrap()).collect();

  for _ in 0..3 {
    assert!(matches!(pool.alloc(), Err(AllocError::OutOfMemory { .. })));
    assert_eq!(pool.free_chunks(), 0);
  }

  pool.free(chunks[2].cast()).unwrap();
  assert_eq!(pool.alloc().unwrap(), chunks[2]);
}

#[test]
fn free_list_round_trip_with_both_policies() {
  for policy in [Placement::FirstFit, Placement::BestFit] {
    let mut backing = Aligned::<1024>([0; 1024]);
    let mut list = FreeListAllocator::new(&mut backing.0, policy).unwrap();

    let regions: Vec<_> = [24, 100, 8, 64, 300]
      .into_iter()
      .map(|size| list.alloc_align(size, 8).unwrap())
      .collect();

    for (index, region) in regions.iter().enumerate() {
      unsafe { region.cast::<u8>().write_bytes(index as u8 + 1, region.len()) };
    }
    for (index, region) in regions.iter().enumerate() {
      let expected = index as u8 + 1;
      assert!(unsafe { region.as_ref() }.iter().all(|byte| *byte == expected));
    }

    for index in [1, 3, 0, 4, 2] {
      list.free(regions[index].cast()).unwrap();
    }

    assert_eq!(list.used(), 0);
    assert_eq!(list.free_blocks().count(), 1);
  }
}

#[test]
fn allocators_over_malloc_backed_memory() {
  const LEN: usize = 4096;

  let raw = unsafe { libc::malloc(LEN) }.cast::<u8>();
  let base = NonNull::new(raw).expect("malloc failed");

  {
    let region = unsafe { RegionView::from_raw_parts(base, LEN) };
    let mut list = FreeListAllocator::from_region(region, Placement::BestFit).unwrap();

    let a = list.alloc(512).unwrap();
    let b = list.alloc(1024).unwrap();
    assert!(addr(a) >= raw.addr() && addr(b) + b.len() <= raw.addr() + LEN);

    list.free(a.cast()).unwrap();
    list.free(b.cast()).unwrap();
    assert_eq!(list.remaining(), LEN);
  }

  unsafe { libc::free(raw.cast()) };
}

#[test]
fn allocators_are_interchangeable_behind_the_trait() {
  let mut arena_buf = Aligned::<512>([0; 512]);
  let mut stack_buf = Aligned::<512>([0; 512]);
  let mut pool_buf = Aligned::<512>([0; 512]);
  let mut list_buf = Aligned::<512>([0; 512]);

  let mut arena = ArenaAllocator::new(&mut arena_buf.0);
  let mut stack = StackAllocator::new(&mut stack_buf.0);
  let mut pool = PoolAllocator::new(&mut pool_buf.0, 32, 16).unwrap();
  let mut list = FreeListAllocator::new(&mut list_buf.0, Placement::FirstFit).unwrap();

  let allocators: [&mut dyn BufferAllocator; 4] = [&mut arena, &mut stack, &mut pool, &mut list];

  for allocator in allocators {
    let region = allocator.alloc(24).unwrap();
    assert_eq!(addr(region) % DEFAULT_ALIGNMENT, 0);
    assert!(allocator.used() >= 24);

    allocator.free(region.cast()).unwrap();
    allocator.free_all();
    assert_eq!(allocator.used(), 0);
    assert_eq!(allocator.remaining(), allocator.capacity());
  }
}
