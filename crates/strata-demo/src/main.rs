//! `strata-demo`: walks through the arena lifecycle.
//!
//! Two threads allocate from one shared arena at the same time, the blocks
//! they got are printed, growable containers are filled, and the arena is
//! dumped, reset and destroyed.
//!
//! Set `STRATA_LOG=debug` to see region acquisition and release.

use std::thread;

use strata_log::info;
use strata_mem::{Arena, ArenaString, ArenaVec, DEFAULT_REGION_PAGES, os};

const NO_ELEMENTS: usize = 10;

/// Allocates `NO_ELEMENTS` `i32`s from `arena` and fills them with
/// `i * factor`. Returns the block's address range.
fn fill_numbers(arena: &Arena, factor: i32) -> (usize, usize) {
    let mut numbers = ArenaVec::with_capacity_in(NO_ELEMENTS, arena);
    numbers.extend((0..NO_ELEMENTS as i32).map(|i| i * factor));

    let rendered: Vec<String> = numbers.iter().map(i32::to_string).collect();
    println!("numbers x{factor}: {}", rendered.join(" "));

    let start = numbers.as_ptr().addr();
    let end = numbers.as_ptr_range().end.addr();
    (start, end)
}

fn main() {
    strata_log::init_from_env(None);

    let mut arena = Arena::new(DEFAULT_REGION_PAGES * os::page_size());
    info!("page size is {} bytes", os::page_size());

    let (first, second) = thread::scope(|scope| {
        let a = scope.spawn(|| fill_numbers(&arena, 1));
        let b = scope.spawn(|| fill_numbers(&arena, 2));
        (
            a.join().expect("first worker panicked"),
            b.join().expect("second worker panicked"),
        )
    });

    println!();
    println!("numbers x1 span {:#x}..{:#x}", first.0, first.1);
    println!("numbers x2 span {:#x}..{:#x}", second.0, second.1);
    println!();

    {
        let mut greeting = ArenaString::new_in(&arena);
        greeting.push_str("hello from region ");
        greeting.push('0');
        println!("{greeting} ({} bytes with terminator)", greeting.as_bytes_with_nul().len());
    }

    // Larger than the default region: forces a dedicated region.
    let big = arena.alloc_bytes(3 * os::page_size());
    big.fill(0xA5);

    print!("{}", arena.dump());

    let stats = arena.stats();
    println!(
        "{} regions, {} of {} bytes used ({:.1}% unused)",
        stats.total_regions,
        stats.total_used,
        stats.total_capacity,
        stats.unused_ratio * 100.0
    );

    arena.reset();
    info!("after reset: {} bytes used", arena.stats().total_used);

    arena.destroy();
    info!("destroyed; initialized = {}", arena.is_initialized());
}
