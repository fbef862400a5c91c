//! Fixed-region memory allocation without a system heap.
//!
//! This crate manages sub-allocations inside a single caller-owned buffer.
//! It never calls into an underlying heap, which makes it suitable for
//! embedded and bare-metal environments where allocation must be
//! deterministic and self-contained.
//!
//! # Available Allocators
//!
//! ## [`RegionAllocator`](fixed_region::RegionAllocator)
//!
//! An intrusive free-list / used-list allocator over one fixed region.
//! Best suited for:
//!
//! - A pre-existing buffer of known size (static arrays, reserved pages)
//! - Deterministic, synchronous allocation with no hidden system calls
//! - Workloads that tolerate fragmentation in exchange for simplicity
//!
//! **Performance**: O(n) allocation where n is the number of free blocks,
//! O(1) deallocation.
//!
//! # Usage Example
//!
//! ```rust
//! use region_alloc::fixed_region::RegionAllocator;
//!
//! // In production this would be a static or reserved buffer; the header
//! // layout requires 32-byte alignment of the region start.
//! #[repr(align(32))]
//! struct Region([u8; 1024]);
//! let mut region = Region([0; 1024]);
//!
//! let mut allocator = unsafe { RegionAllocator::new(region.0.as_mut_ptr(), 1024) };
//!
//! let ptr = allocator.allocate(480).expect("region has space");
//! // Use the memory...
//! unsafe {
//!     allocator.deallocate(ptr);
//! }
//!
//! // Teardown is fallible: outstanding allocations are reported.
//! allocator.finish().expect("all allocations returned");
//! ```
//!
//! # Design Considerations
//!
//! ## Memory Safety
//!
//! Construction and deallocation are `unsafe`: the caller guarantees the
//! region is valid and exclusive for the allocator's lifetime, and that
//! deallocated pointers came from a matching [`allocate`] on the same
//! instance. There is no runtime validation of pointer origin.
//!
//! ## Thread Safety
//!
//! The allocator is `Send` but not `Sync`. It can be moved between threads
//! but requires external synchronization for concurrent access.
//!
//! [`allocate`]: fixed_region::RegionAllocator::allocate

#![no_std]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod fixed_region;
