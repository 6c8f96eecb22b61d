//! Progress reporting.
//!
//! Long-running operations (pool flushes, bulk extraction) take an optional
//! `&mut ProgressFn` and call it synchronously with a percentage in
//! `0.0..=100.0`.  There is no global event bus; pass `None` to disable.

pub type ProgressFn<'a> = dyn FnMut(f64) + 'a;

/// Percentage of `done` out of `total`, rounded to two decimals and
/// clamped to `0.0..=100.0`.  An empty total counts as complete.
pub fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let pct = done as f64 / total as f64 * 100.0;
    ((pct * 100.0).round() / 100.0).clamp(0.0, 100.0)
}
