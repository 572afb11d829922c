//! A copy-on-write ordered B-tree for Rust.
//!
//! This crate provides [`CowTree`], an in-memory ordered collection keyed by
//! an opaque item type under a caller-supplied ordering:
//!
//! - [`insert`](CowTree::insert) / [`remove`](CowTree::remove) - replace-or-insert
//!   and delete, each returning the displaced item
//! - [`ascend`](CowTree::ascend), [`descend`](CowTree::descend) and six range /
//!   pivot walks with early-terminating predicates
//! - [`cursor`](CowTree::cursor) - a bidirectional cursor with `seek`
//! - [`clone`](Clone::clone) - O(1) logical snapshots through copy-on-write
//!   path copying
//!
//! # Example
//!
//! ```
//! use kauri_tree::CowTree;
//!
//! let mut tree = CowTree::new(32, |a: &u64, b: &u64| a < b);
//! for value in [5u64, 1, 4, 2, 3] {
//!     tree.insert(value);
//! }
//!
//! assert_eq!(tree.len(), 5);
//! assert_eq!(tree.first(), Some(&1));
//! assert_eq!(tree.last(), Some(&5));
//!
//! // Cloning is O(1); the trees then diverge independently.
//! let snapshot = tree.clone();
//! tree.remove(&3);
//! assert_eq!(tree.len(), 4);
//! assert_eq!(snapshot.len(), 5);
//! assert!(snapshot.contains(&3));
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - only requires `alloc`
//! - **Caller-supplied order** - items need no `Ord` impl; a `less(a, b)`
//!   closure fixed at construction defines the total order
//! - **Configurable branching** - every non-root node holds between
//!   `degree - 1` and `2 * degree - 1` items
//! - **Cheap snapshots** - cloning shares the whole node graph; the first
//!   mutation after a clone copies exactly the touched root-to-leaf path
//!
//! # Implementation
//!
//! The tree is a classic B-tree (items in every node) with single-pass
//! top-down mutation: insertion splits any full node before descending into
//! it, deletion fattens any minimal node before descending, so neither ever
//! backs up the path. Node edges are shared pointers with atomic reference
//! counts; each node carries the identity of the tree that may edit it in
//! place, and every other tree copies the node before writing.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod raw;

pub mod cow_tree;

pub use cow_tree::{CowTree, Cursor, Iter};
