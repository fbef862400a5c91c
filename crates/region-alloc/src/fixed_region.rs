//! Fixed-region allocator implementation.
//!
//! This module provides an allocator that manages one pre-existing,
//! caller-owned memory region using an intrusive free-list / used-list
//! scheme. Every block, free or used, carries a [`BlockHeader`] directly in
//! front of its payload, so a bare payload pointer is enough to recover the
//! block's metadata on deallocation.
//!
//! # Algorithm
//!
//! - **Free list**: a doubly linked, null-terminated list of available
//!   blocks in insertion order. Freed blocks are pushed at the head; no
//!   address ordering is maintained.
//! - **Allocation**: first-fit scan of the free list. A block that is
//!   large enough to yield a second valid block is split; the remainder
//!   stays on the free list in the original block's place.
//! - **Deallocation**: the block moves back to the free-list head,
//!   unmodified. Address-adjacent free blocks are *not* merged, so
//!   fragmentation never decreases across allocate/deallocate cycles.
//! - **Used list**: every live block is tracked on a second doubly linked
//!   list, which is what lets teardown detect outstanding allocations.
//!
//! # Memory Layout
//!
//! ```text
//! Block Layout:
//! ┌────────────────────────────────────────┬──────────────────────┐
//! │ BlockHeader (32 bytes)                 │ Payload              │
//! │ ┌──────┬──────┬─────────────┬────────┐ │                      │
//! │ │ prev │ next │ usable_size │ (pad)  │ │ usable_size bytes    │
//! │ └──────┴──────┴─────────────┴────────┘ │                      │
//! └────────────────────────────────────────┴──────────────────────┘
//!                                          ▲
//!                                          └── pointer returned to caller
//! ```
//!
//! Requested sizes are rounded up to multiples of the header size, which
//! keeps every block boundary header-aligned and lets a new header be
//! carved out of a larger block's payload safely.
//!
//! # Performance Characteristics
//!
//! - **Allocation**: O(n) where n is the number of free blocks
//! - **Deallocation**: O(1)
//! - **Memory Overhead**: 32 bytes per block, free or used
//! - **Fragmentation**: monotonically non-decreasing (no coalescing)
//!
//! # Thread Safety
//!
//! The allocator is `Send` but not `Sync`. It can be moved between threads
//! but requires external synchronization for concurrent access.

use core::{mem::ManuallyDrop, ptr};

use snafu::{Snafu, ensure};

/// Size in bytes of the per-block control record, and the granularity of
/// every allocation.
///
/// Requested sizes are rounded up to multiples of this value, and the
/// region start must be aligned to it.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Control record placed directly in front of every block's payload.
///
/// The `prev`/`next` links belong to whichever list (free or used)
/// currently owns the block, never to both. `usable_size` counts payload
/// bytes only, excluding the header itself. The representation pads the
/// record to a fixed 32 bytes, which is also the allocation granularity.
#[repr(C, align(32))]
#[derive(Debug)]
struct BlockHeader {
    /// Previous block in the owning list, or null at the front
    prev: *mut Self,
    /// Next block in the owning list, or null at the back
    next: *mut Self,
    /// Payload bytes following the header, excluding the header
    usable_size: usize,
}
const _: () = assert!(size_of::<BlockHeader>() == align_of::<BlockHeader>());

impl BlockHeader {
    /// Writes a fresh, unlinked header at the specified memory location.
    ///
    /// # Arguments
    ///
    /// * `ptr` - Location the header is written to
    /// * `usable_size` - Payload bytes following the header
    ///
    /// # Returns
    ///
    /// A pointer to the newly written header.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the memory range
    /// `ptr..ptr + HEADER_SIZE + usable_size` is valid and exclusively
    /// available for this block.
    unsafe fn init_at(ptr: *mut u8, usable_size: usize) -> *mut Self {
        #[expect(clippy::cast_ptr_alignment)]
        let block = ptr.cast::<Self>();
        assert!(!block.is_null(), "block header must not be null");
        assert!(block.is_aligned(), "block header must be header-aligned");

        unsafe {
            (*block).prev = ptr::null_mut();
            (*block).next = ptr::null_mut();
            (*block).usable_size = usable_size;
        }

        block
    }

    /// Returns the payload pointer of a block, immediately after its
    /// header.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `block` points to a valid
    /// `BlockHeader`.
    unsafe fn payload(block: *mut Self) -> *mut u8 {
        assert!(!block.is_null(), "block must not be null");
        unsafe { block.add(1) }.cast()
    }

    /// Recovers the block header sitting directly in front of a payload
    /// pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `payload` was previously returned by
    /// [`BlockHeader::payload`] for a live block.
    unsafe fn from_payload(payload: *mut u8) -> *mut Self {
        #[expect(clippy::cast_ptr_alignment)]
        let payload = payload.cast::<Self>();
        assert!(!payload.is_null(), "payload must not be null");
        assert!(payload.is_aligned(), "payload must be header-aligned");
        unsafe { payload.sub(1) }
    }

    /// Splits a free block so that it keeps exactly `alloc_size` payload
    /// bytes, leaving the remainder on the free list in its place.
    ///
    /// The split only happens if the remainder would itself be a valid
    /// block (a header plus at least one header's worth of payload) and
    /// the new header address lies strictly inside the region. When either
    /// condition fails the block is left whole and will be handed out
    /// oversized.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `block` points to a valid, free
    /// `BlockHeader` inside the region ending at `region_end`.
    unsafe fn try_split(block: *mut Self, alloc_size: usize, region_end: usize) {
        unsafe {
            if (*block).usable_size < alloc_size + 2 * HEADER_SIZE {
                return;
            }
            let split_at = Self::payload(block).map_addr(|addr| addr + alloc_size);
            // Tail-of-region guard: near the end of the region the whole
            // oversized block is handed out intact.
            if split_at.addr() >= region_end {
                return;
            }

            let remainder =
                Self::init_at(split_at, (*block).usable_size - alloc_size - HEADER_SIZE);
            (*remainder).prev = block;
            (*remainder).next = (*block).next;
            if !(*block).next.is_null() {
                (*(*block).next).prev = remainder;
            }
            (*block).next = remainder;
            (*block).usable_size = alloc_size;
        }
    }
}

/// Error returned by [`RegionAllocator::finish`] when the allocator is
/// torn down while allocations are still outstanding.
#[derive(Debug, Snafu)]
#[snafu(display("fixed region torn down with {live} outstanding allocation(s)"))]
pub struct LeakError {
    live: usize,
}

impl LeakError {
    /// Number of allocations that were still live at teardown.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.live
    }
}

/// An allocator over one fixed, caller-owned memory region.
///
/// On construction the entire region minus one header becomes a single
/// free block. [`allocate`](Self::allocate) carves blocks off the free
/// list (first-fit, splitting oversized blocks) and moves them to the used
/// list; [`deallocate`](Self::deallocate) moves them back, unmerged.
/// Allocation failure is reported as `None` and is an ordinary outcome,
/// never a panic.
///
/// Dropping the allocator while allocations are outstanding is a contract
/// breach and panics; [`finish`](Self::finish) is the fallible alternative
/// that reports the leak instead.
///
/// # Thread Safety
///
/// `Send` but not `Sync`: external synchronization is required for
/// concurrent access.
pub struct RegionAllocator {
    /// First byte of the managed region
    region_start: *mut u8,
    /// Total size of the managed region in bytes
    region_size: usize,
    /// Head of the free-block list
    free_head: *mut BlockHeader,
    /// Head of the used-block list
    used_head: *mut BlockHeader,
}

unsafe impl Send for RegionAllocator {}

impl RegionAllocator {
    /// Creates an allocator managing the region
    /// `region_start..region_start + region_size`.
    ///
    /// The whole region minus one header becomes a single free block; the
    /// used list starts empty.
    ///
    /// # Panics
    ///
    /// Panics if `region_start` is null or not aligned to [`HEADER_SIZE`],
    /// or if `region_size` is not larger than [`HEADER_SIZE`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - The range `region_start..region_start + region_size` is valid
    ///   memory, exclusively owned by this allocator for its lifetime
    /// - The region is not accessed directly while the allocator is alive
    pub unsafe fn new(region_start: *mut u8, region_size: usize) -> Self {
        assert!(!region_start.is_null(), "region start must not be null");
        assert!(
            region_start.addr().is_multiple_of(HEADER_SIZE),
            "region start must be header-aligned"
        );
        assert!(
            region_size > HEADER_SIZE,
            "region must have room for at least one block header"
        );

        let free_head = unsafe { BlockHeader::init_at(region_start, region_size - HEADER_SIZE) };
        Self {
            region_start,
            region_size,
            free_head,
            used_head: ptr::null_mut(),
        }
    }

    /// Allocates a block with at least `size` usable bytes.
    ///
    /// The request is rounded up to the next multiple of [`HEADER_SIZE`]
    /// and satisfied first-fit from the free list in list order. A block
    /// large enough to yield a second valid block is split; the remainder
    /// stays free. The chosen block moves to the used list and its payload
    /// pointer is returned.
    ///
    /// Returns `None` when no single free block can satisfy the request,
    /// even if several smaller free blocks together could: the free list
    /// is a set of discrete blocks, not a combined pool.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn allocate(&mut self, size: usize) -> Option<*mut u8> {
        assert!(size > 0, "allocation size must be greater than zero");
        let alloc_size = size.next_multiple_of(HEADER_SIZE);

        unsafe {
            let mut current = self.free_head;
            while !current.is_null() {
                if (*current).usable_size < alloc_size {
                    current = (*current).next;
                    continue;
                }

                BlockHeader::try_split(current, alloc_size, self.region_end());
                Self::unlink(&mut self.free_head, current);
                Self::push_front(&mut self.used_head, current);
                return Some(BlockHeader::payload(current));
            }
        }
        None
    }

    /// Returns a block to the free list.
    ///
    /// A null `ptr` is explicitly allowed and does nothing. Otherwise the
    /// block header is recovered from directly in front of the payload,
    /// unlinked from the used list, and pushed onto the free-list head
    /// unmodified. Address-adjacent free blocks are not merged.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` is either null or was returned by
    /// [`allocate`](Self::allocate) on this instance and has not been
    /// deallocated since. Foreign and double-freed pointers are not
    /// detected.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        unsafe {
            let block = BlockHeader::from_payload(ptr);
            Self::unlink(&mut self.used_head, block);
            Self::push_front(&mut self.free_head, block);
        }
    }

    /// Tears the allocator down, reporting outstanding allocations.
    ///
    /// # Errors
    ///
    /// Returns [`LeakError`] if any allocation is still live. The
    /// allocator is consumed either way; the region buffer itself remains
    /// with its owner.
    pub fn finish(self) -> Result<(), LeakError> {
        let this = ManuallyDrop::new(self);
        let live = this.used_block_count();
        ensure!(live == 0, LeakSnafu { live });
        Ok(())
    }

    /// Total size of the managed region in bytes.
    #[must_use]
    pub fn region_size(&self) -> usize {
        self.region_size
    }

    /// Number of blocks currently on the free list.
    #[must_use]
    pub fn free_block_count(&self) -> usize {
        Self::list_stats(self.free_head).blocks
    }

    /// Summed usable size of all free blocks.
    ///
    /// Note that a single allocation of this size can still fail: free
    /// blocks are never merged, so only the largest individual block
    /// bounds what is obtainable.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        Self::list_stats(self.free_head).usable_bytes
    }

    /// Usable size of the largest free block, or 0 if none is free.
    #[must_use]
    pub fn largest_free_block(&self) -> usize {
        Self::list_stats(self.free_head).largest
    }

    /// Number of blocks currently on the used list.
    #[must_use]
    pub fn used_block_count(&self) -> usize {
        Self::list_stats(self.used_head).blocks
    }

    /// Summed usable size of all used blocks.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        Self::list_stats(self.used_head).usable_bytes
    }

    /// Address one byte past the end of the managed region.
    fn region_end(&self) -> usize {
        self.region_start.addr() + self.region_size
    }

    /// Removes `block` from the list headed by `head`, updating neighbor
    /// links and the head pointer when `block` is the head.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `block` points to a valid `BlockHeader`
    /// that is currently a member of the list headed by `head`.
    unsafe fn unlink(head: &mut *mut BlockHeader, block: *mut BlockHeader) {
        unsafe {
            if !(*block).prev.is_null() {
                (*(*block).prev).next = (*block).next;
            }
            if !(*block).next.is_null() {
                (*(*block).next).prev = (*block).prev;
            }
            if ptr::eq(*head, block) {
                *head = (*block).next;
            }
        }
    }

    /// Pushes `block` onto the front of the list headed by `head`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `block` points to a valid `BlockHeader`
    /// that is not a member of any list.
    unsafe fn push_front(head: &mut *mut BlockHeader, block: *mut BlockHeader) {
        unsafe {
            if !head.is_null() {
                (**head).prev = block;
            }
            (*block).prev = ptr::null_mut();
            (*block).next = *head;
            *head = block;
        }
    }

    /// Walks a block list and accumulates its statistics.
    fn list_stats(head: *mut BlockHeader) -> ListStats {
        let mut stats = ListStats {
            blocks: 0,
            usable_bytes: 0,
            largest: 0,
        };
        let mut current = head;
        while !current.is_null() {
            unsafe {
                stats.blocks += 1;
                stats.usable_bytes += (*current).usable_size;
                stats.largest = stats.largest.max((*current).usable_size);
                current = (*current).next;
            }
        }
        stats
    }
}

impl Drop for RegionAllocator {
    fn drop(&mut self) {
        assert!(
            self.used_head.is_null(),
            "fixed region dropped with outstanding allocations"
        );
    }
}

/// Aggregate statistics for one block list.
struct ListStats {
    blocks: usize,
    usable_bytes: usize,
    largest: usize,
}
