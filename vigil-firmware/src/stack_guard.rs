//! Stack guard
//!
//! All executors share the one main stack, which grows down towards the
//! end of the statics. A band of known words is painted just above the
//! statics at boot. Once the stack has grown into the band it no longer
//! reads back intact, and the task whose activation just ended is
//! terminated with a stack overflow fault.

use core::ptr::{read_volatile, write_volatile};

/// Words in the guard band
const GUARD_WORDS: usize = 16;

/// Pattern painted into the band
const PAINT: u32 = 0xC0DE_5AFE;

unsafe extern "C" {
    // First free RAM word after the statics (cortex-m-rt link.x)
    static __sheap: u32;
}

fn band() -> *mut u32 {
    (&raw const __sheap) as *mut u32
}

/// Paint the guard band
///
/// Call once at boot, while the stack is still shallow.
pub fn paint() {
    let base = band();
    for i in 0..GUARD_WORDS {
        // SAFETY: the band is free RAM between the statics and the stack
        unsafe { write_volatile(base.add(i), PAINT) };
    }
}

/// Whether the stack has reached the guard band
pub fn tripped() -> bool {
    let base = band();
    // SAFETY: same band as `paint`, read only
    (0..GUARD_WORDS).any(|i| unsafe { read_volatile(base.add(i)) } != PAINT)
}
