//! Work partitioning: split `[0, N)` into `T` ordered ranges.
//!
//! - `partition`: base size `B = ⌊(N+1)/T⌋`, range `i` starts at `i·B`, the last
//!   range absorbs the remainder `N − T·B`. Always tiles `[0, N)`.
//! - `grouped_partition`: ranges are whole multiples of a group size `G`
//!   (3 for triangle lists), except the one clamped at `N`.
//! - `legacy_partition`: the historical launch formula, whose start
//!   `⌊i·(N+1)/T⌋` disagrees with the lengths above for some `(N, T)` and then
//!   leaves gaps, overlaps, or runs past `N`. Only for compatibility checks;
//!   never used to dispatch work.

use std::ops::Range;

use crate::error::{EngineError, Result};

/// Contiguous range `[start, start + len)` handled by one job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Partition {
    pub start: usize,
    pub len: usize,
}

impl Partition {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

fn check_tasks(tasks: usize) -> Result<()> {
    if tasks == 0 {
        return Err(EngineError::InvalidConfig {
            name: "tasks",
            reason: "must be at least 1",
        });
    }
    Ok(())
}

#[inline]
fn segment_len(n: usize, tasks: usize, base: usize, i: usize) -> usize {
    if i + 1 == tasks {
        // (T-1)·B <= N holds for every N, T >= 1.
        n - (tasks - 1) * base
    } else {
        base
    }
}

/// Plain partition of `n` elements over `tasks` ranges.
pub fn partition(n: usize, tasks: usize) -> Result<Vec<Partition>> {
    check_tasks(tasks)?;
    let base = n.saturating_add(1) / tasks;
    let mut out = Vec::new();
    out.try_reserve_exact(tasks)?;
    for i in 0..tasks {
        out.push(Partition {
            start: i * base,
            len: segment_len(n, tasks, base, i),
        });
    }
    Ok(out)
}

/// Historical formula, reproduced verbatim: start `⌊i·(N+1)/T⌋`, lengths as
/// in [`partition`]. The result is an exact tiling only when every start
/// equals `i·B`; see [`is_exact_cover`].
pub fn legacy_partition(n: usize, tasks: usize) -> Result<Vec<Partition>> {
    check_tasks(tasks)?;
    let base = n.saturating_add(1) / tasks;
    let mut out = Vec::new();
    out.try_reserve_exact(tasks)?;
    for i in 0..tasks {
        let start = (i as u128 * (n as u128 + 1) / tasks as u128) as usize;
        out.push(Partition {
            start,
            len: segment_len(n, tasks, base, i),
        });
    }
    Ok(out)
}

/// Partition `n` elements into `tasks` ranges made of whole groups of
/// `group` elements. Groups are spread evenly, earlier ranges take the
/// remainder groups, and the range reaching `n` is clamped to it.
pub fn grouped_partition(n: usize, tasks: usize, group: usize) -> Result<Vec<Partition>> {
    check_tasks(tasks)?;
    let group = group.max(1);
    let groups = n.div_ceil(group);
    let per_task = groups / tasks;
    let extra = groups % tasks;
    let mut out = Vec::new();
    out.try_reserve_exact(tasks)?;
    let mut start = 0;
    for i in 0..tasks {
        let assigned = per_task + usize::from(i < extra);
        let len = assigned.saturating_mul(group).min(n - start);
        out.push(Partition { start, len });
        start += len;
    }
    Ok(out)
}

/// True iff `parts` are ordered, contiguous, non-overlapping and cover
/// exactly `[0, n)`.
pub fn is_exact_cover(parts: &[Partition], n: usize) -> bool {
    let mut expected = 0usize;
    for p in parts {
        if p.start != expected {
            return false;
        }
        expected = match p.start.checked_add(p.len) {
            Some(e) => e,
            None => return false,
        };
    }
    expected == n
}
