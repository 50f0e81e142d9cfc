//! Per-block compute scheduling.
//!
//! Every block's transform/quantise stage is independent of its siblings,
//! so the compute stage of an encode or decode pass can fan out across a
//! thread pool; the surrounding stream reads and writes stay sequential to
//! preserve the positional bit order. The scheduler is chosen at processor
//! construction: `Serial` runs in place, `WorkStealing` uses the global
//! rayon pool with dynamic work stealing.

use rayon::prelude::*;

/// Execution strategy for the per-block compute stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheduler {
    /// Run every block on the calling thread
    Serial,
    /// Fan out across the global rayon pool
    #[default]
    WorkStealing,
}

impl Scheduler {
    /// Map `f` over block indices `0..n`, preserving index order in the
    /// result.
    pub fn map_blocks<T, F>(&self, n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            Scheduler::Serial => (0..n).map(f).collect(),
            Scheduler::WorkStealing => (0..n).into_par_iter().map(f).collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
