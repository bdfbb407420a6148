/// Utility functions for arc-based corner tests

/// Packs per-pixel comparison results into a ring bitmask, bit `i` for ring pixel `i`.
pub fn ring_mask(flags: impl IntoIterator<Item = bool>) -> u16 {
    flags
        .into_iter()
        .enumerate()
        .fold(0u16, |mask, (i, set)| if set { mask | (1 << i) } else { mask })
}

/// Check if a circular mask of `len` bits holds at least `arc` consecutive set bits
/// using a branch-free rotate-and-AND reduction
pub fn has_consecutive_bits(mask: u16, len: usize, arc: usize) -> bool {
    if arc == 0 || arc > len || len > 16 {
        return false;
    }
    let full: u16 = if len == 16 { u16::MAX } else { (1u16 << len) - 1 };
    let mask = mask & full;

    // a run of length n survives mask & rot(mask, 1) & ... & rot(mask, n - 1)
    let mut test_mask = mask;
    for i in 1..arc {
        let rotated = ((mask << i) | (mask >> (len - i))) & full;
        test_mask &= rotated;
        if test_mask == 0 {
            return false;
        }
    }

    test_mask != 0
}

/// Largest `t` such that some arc of `arc` consecutive values all exceed `t`,
/// i.e. the maximum over arc start positions of the minimum value on the arc.
pub fn best_arc_minimum(values: &[i32], arc: usize) -> i32 {
    let len = values.len();
    if arc == 0 || arc > len {
        return i32::MIN;
    }
    (0..len)
        .map(|start| {
            (0..arc)
                .map(|k| values[(start + k) % len])
                .min()
                .unwrap_or(i32::MIN)
        })
        .max()
        .unwrap_or(i32::MIN)
}
