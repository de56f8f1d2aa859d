//! Choice between `tableswitch` and `lookupswitch` for a set of case keys.

/// Instruction shape chosen for a switch over int keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchShape {
    /// Dense keys; one jump offset per value in `low..=high`.
    Table { low: i32, high: i32 },
    /// Sparse keys; sorted `(key, offset)` pairs.
    Lookup,
}

/// Picks the cheaper instruction by javac's cost model: a table costs
/// `4 + range` words and 3 comparisons, a lookup `3 + 2n` words and `n`
/// comparisons, with time weighted three times space.
pub fn choose(keys: &[i32]) -> SwitchShape {
    let (Some(&low), Some(&high)) = (keys.iter().min(), keys.iter().max()) else {
        return SwitchShape::Lookup;
    };
    let labels = keys.len() as i64;
    let table_space = 4 + (i64::from(high) - i64::from(low) + 1);
    let table_time = 3;
    let lookup_space = 3 + 2 * labels;
    let lookup_time = labels;
    if table_space + 3 * table_time <= lookup_space + 3 * lookup_time {
        SwitchShape::Table { low, high }
    } else {
        SwitchShape::Lookup
    }
}

/// Bytes of padding after the opcode at `pc` so the operands start on a
/// four-byte boundary.
pub fn padding(pc: usize) -> usize {
    (4 - (pc + 1) % 4) % 4
}
