#![doc = include_str!("../README.md")]
//! # Chunked Deque
//!
//! A double-ended queue backed by fixed-size chunks behind a central
//! pointer map, in the spirit of the classic segmented deque layout.
//!
//! ## Overview
//! `std::collections::VecDeque` stores everything in one ring buffer, so
//! growth copies every element. [`ChunkedDeque`] never moves elements to
//! grow: it allocates another fixed-size chunk and, when the map of chunk
//! pointers runs out of slots, shuffles or reallocates the small map
//! instead. Chunks emptied by pops are retained as "ghost capacity" and
//! reused, so streaming workloads that push at one end and pop at the
//! other settle into steady state with no allocator traffic at all.
//!
//! ## Key Features
//! - **Amortized O(1) pushes at both ends** with element addresses that
//!   survive every end operation.
//! - **O(1) indexing** through the two-level chunk map.
//! - **Shorter-side middle insertion and removal**, like the segmented
//!   deques of the classic standard libraries.
//! - **Allocator aware:** every byte goes through an
//!   [`allocator_api2::alloc::Allocator`], pluggable per container.
//!
//! ## Examples
//!
//! ### ChunkedDeque
//! ```rust
//! use chunked_deque::ChunkedDeque;
//!
//! let mut d: ChunkedDeque<i32> = ChunkedDeque::new();
//! d.push_back(2);
//! d.push_back(3);
//! d.push_front(1);
//! assert_eq!(d.len(), 3);
//! assert_eq!(d[0], 1);
//! assert_eq!(d.pop_back(), Some(3));
//!
//! d.insert(1, 10);
//! assert_eq!(d.iter().copied().collect::<Vec<_>>(), vec![1, 10, 2]);
//! ```
//!
//! ### AnyDeque
//! ```rust
//! use std::collections::VecDeque;
//! use chunked_deque::{AnyDeque, ChunkedDeque};
//!
//! fn bounded_push<D: AnyDeque<u64>>(d: &mut D, item: u64, cap: usize) {
//!     if d.len() == cap {
//!         d.pop_front();
//!     }
//!     d.push_back(item);
//! }
//!
//! let mut ring: VecDeque<u64> = VecDeque::new();
//! let mut chunked: ChunkedDeque<u64> = ChunkedDeque::new();
//! for i in 0..10 {
//!     bounded_push(&mut ring, i, 4);
//!     bounded_push(&mut chunked, i, 4);
//! }
//! assert_eq!(ring.len(), chunked.len());
//! ```

// --- Module Declarations ---

pub mod any;
pub mod deque;

pub use any::AnyDeque;
pub use deque::{ChunkedDeque, IntoIter, Iter, IterMut};
