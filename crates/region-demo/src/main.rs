//! Demo driver for the fixed-region allocator.
//!
//! Replays two reference sequences on a heap-backed region buffer:
//!
//! 1. Allocate 480/224/224 bytes, free all three, and tear down cleanly.
//! 2. On a fresh allocator over the same buffer: allocate and free the
//!    maximum size, allocate and free 480/224/224, then observe that the
//!    maximum size now fails because the freed blocks are never merged.
//!
//! Exits non-zero if any step deviates from the expected outcome.

use std::{
    alloc::{Layout, alloc, dealloc},
    process::ExitCode,
};

use argh::FromArgs;
use region_alloc::fixed_region::{HEADER_SIZE, RegionAllocator};

/// Exercise a fixed-region allocator with its reference sequences.
#[derive(FromArgs)]
struct Args {
    /// size in bytes of the managed region (at least 1024, default 1024)
    #[argh(option, default = "1024")]
    region_size: usize,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    if args.region_size < 1024 {
        eprintln!("error: the reference sequences need a region of at least 1024 bytes");
        return ExitCode::FAILURE;
    }

    let layout = match Layout::from_size_align(args.region_size, HEADER_SIZE) {
        Ok(layout) => layout,
        Err(err) => {
            eprintln!("error: invalid region size {}: {err}", args.region_size);
            return ExitCode::FAILURE;
        }
    };
    let region_start = unsafe { alloc(layout) };
    if region_start.is_null() {
        eprintln!("error: failed to reserve {} bytes", args.region_size);
        return ExitCode::FAILURE;
    }

    let result = run_sequences(region_start, args.region_size);
    unsafe {
        dealloc(region_start, layout);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run_sequences(region_start: *mut u8, region_size: usize) -> Result<(), String> {
    // Largest request the initial block can satisfy after rounding.
    let max_alloc = (region_size - HEADER_SIZE) / HEADER_SIZE * HEADER_SIZE;

    println!("region: {region_size} bytes, header: {HEADER_SIZE} bytes, max: {max_alloc} bytes");

    println!("sequence 1: allocate 480/224/224, free all");
    {
        let mut allocator = unsafe { RegionAllocator::new(region_start, region_size) };
        let a = checked_allocate(&mut allocator, 480)?;
        let b = checked_allocate(&mut allocator, 224)?;
        let c = checked_allocate(&mut allocator, 224)?;
        unsafe {
            allocator.deallocate(a);
            allocator.deallocate(b);
            allocator.deallocate(c);
        }
        allocator.finish().map_err(|err| err.to_string())?;
        println!("  teardown clean");
    }

    println!("sequence 2: fragment the region, then retry the maximum");
    {
        let mut allocator = unsafe { RegionAllocator::new(region_start, region_size) };

        let p = checked_allocate(&mut allocator, max_alloc)?;
        unsafe {
            allocator.deallocate(p);
        }

        let a = checked_allocate(&mut allocator, 480)?;
        let b = checked_allocate(&mut allocator, 224)?;
        let c = checked_allocate(&mut allocator, 224)?;
        unsafe {
            allocator.deallocate(a);
            allocator.deallocate(b);
            allocator.deallocate(c);
        }
        println!(
            "  all freed again: {} free blocks, largest {} bytes",
            allocator.free_block_count(),
            allocator.largest_free_block(),
        );

        if let Some(ptr) = allocator.allocate(max_alloc) {
            unsafe {
                allocator.deallocate(ptr);
            }
            return Err(format!(
                "allocate({max_alloc}) unexpectedly succeeded on the fragmented region"
            ));
        }
        println!("  allocate({max_alloc}) fails as expected: free blocks are never merged");

        allocator.finish().map_err(|err| err.to_string())?;
        println!("  teardown clean");
    }

    Ok(())
}

fn checked_allocate(allocator: &mut RegionAllocator, size: usize) -> Result<*mut u8, String> {
    let ptr = allocator
        .allocate(size)
        .ok_or_else(|| format!("allocate({size}) failed"))?;
    println!(
        "  allocate({size}) -> {ptr:p} ({} bytes used in {} blocks)",
        allocator.used_bytes(),
        allocator.used_block_count(),
    );
    Ok(ptr)
}
