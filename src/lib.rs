//! # bufalloc - Fixed-Region Memory Allocators
//!
//! This crate provides four allocators that carve sub-regions out of **one
//! caller-supplied buffer** and never touch the global heap. All bookkeeping
//! (headers, free-list links) lives inside the buffer itself.
//!
//! ## Overview
//!
//! ```text
//!   Backing buffer (borrowed from the caller):
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                                                                      │
//!   │   ArenaAllocator     bump an offset, reset everything at once        │
//!   │   StackAllocator     bump + header, pop in reverse order             │
//!   │   PoolAllocator      equal chunks, intrusive free list               │
//!   │   FreeListAllocator  any size, first/best fit, coalescing            │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   bufalloc
//!   ├── align      - Alignment macro and padding arithmetic
//!   ├── region     - RegionView, the bounds-checked buffer view
//!   ├── block      - Header/node layouts stored in the buffer (internal)
//!   ├── config     - Default alignments, PoolConfig, Placement
//!   ├── error      - AllocError, FreeViolation
//!   ├── traits     - BufferAllocator
//!   ├── arena      - ArenaAllocator
//!   ├── stack      - StackAllocator
//!   ├── pool       - PoolAllocator
//!   └── free_list  - FreeListAllocator
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use bufalloc::{ArenaAllocator, PoolAllocator};
//!
//! let mut backing = [0u8; 256];
//! let mut arena = ArenaAllocator::new(&mut backing);
//!
//! let number = arena.alloc(4).unwrap().cast::<u32>();
//! unsafe { number.write_unaligned(123) };
//! assert_eq!(unsafe { number.read_unaligned() }, 123);
//!
//! // Everything handed out so far becomes invalid.
//! arena.free_all();
//!
//! let mut backing = [0u8; 1024];
//! let mut pool = PoolAllocator::new(&mut backing, 64, 8).unwrap();
//!
//! let chunk = pool.alloc().unwrap();
//! assert_eq!(chunk.len(), 64);
//! pool.free(chunk.cast()).unwrap();
//! ```
//!
//! ## Headers
//!
//! Allocators that support individual frees store a header right before the
//! payload and align the payload past it:
//!
//! ```text
//!   Single Allocation:
//!   ┌──────────────┬────────────────┬────────────────────────────────┐
//!   │   Filler     │     Header     │           User Data            │
//!   │              │                │                                │
//!   │              │  stack: prev   │  ┌──────────────────────────┐  │
//!   │              │   top, padding │  │                          │  │
//!   │              │  list: size,   │  │     N bytes usable       │  │
//!   │              │   padding      │  │                          │  │
//!   │              │                │  └──────────────────────────┘  │
//!   └──────────────┴────────────────┴────────────────────────────────┘
//!   ◄────────── padding ───────────►▲
//!                                   └── Pointer returned to user
//! ```
//!
//! ## Errors
//!
//! Nothing panics on bad input. Exhaustion is reported as
//! [`AllocError::OutOfMemory`]; caller bugs (bad frees, non power-of-two
//! alignments) as [`AllocError::InvalidFree`] and
//! [`AllocError::InvalidAlignment`]. A failed call leaves the allocator as it
//! was.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: allocators are neither `Send` nor `Sync`
//! - **No use-after-free detection**: regions are raw pointers; using one after
//!   it was freed or after `free_all` is undefined behaviour
//! - **Pool double frees are not detected** and corrupt its free list
//!
//! ## Logging
//!
//! Allocation events are emitted through [`tracing`]: construction and resets
//! at `debug`, every alloc/free at `trace`, rejected frees at `warn`.

pub mod align;
mod arena;
mod block;
pub mod config;
pub mod error;
mod free_list;
mod pool;
pub mod region;
mod stack;
mod traits;

#[cfg(test)]
mod testing;

pub use arena::ArenaAllocator;
pub use config::{DEFAULT_ALIGNMENT, Placement, PoolConfig};
pub use error::{AllocError, AllocResult, FreeViolation};
pub use free_list::{FreeBlock, FreeBlocks, FreeListAllocator};
pub use pool::PoolAllocator;
pub use region::RegionView;
pub use stack::StackAllocator;
pub use traits::BufferAllocator;
