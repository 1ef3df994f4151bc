use crate::error::CliResult;
use crate::input::InputStage;
use crate::proxy::{ProxyPool, RecordProxy};

/// Loser tree of fixed depth D (§4.4). Node array has `(1<<D)-1` elements;
/// index 0 is the exit, leaves occupy the top `M = 1<<(D-1)` indices. For
/// internal node `i`, children are `2i+1` (right) and `2i+2` (left).
///
/// `resident[node]` doubles as both "a leaf's not-yet-consumed value for
/// this phase" and "the parked loser of an internal node's last match" —
/// the same slot serves both roles because an internal node's resident
/// value, once beaten, simply waits there for its next challenger exactly
/// like a leaf's primed value waits to be drawn into a match. Each slot
/// also carries the 0-based leaf index its value descends from, so a
/// K-way merge (`run_merge`) can refill exactly the one leaf that was just
/// drained without rescanning all K leaves — the same tuple a loser
/// carries back down is what a winner carries up, so provenance survives
/// every match along the path.
pub struct Tournament {
    depth: u32,
    leaf_start: usize,
    leaf_count: usize,
    resident: Vec<Option<(usize, RecordProxy)>>,
    last_leaf: Option<usize>,
}

impl Tournament {
    pub fn new(depth: u32) -> Self {
        let node_count = (1usize << depth) - 1;
        let leaf_start = (1usize << (depth - 1)) - 1;
        let leaf_count = 1usize << (depth - 1);
        Tournament {
            depth,
            leaf_start,
            leaf_count,
            resident: vec![None; node_count],
            last_leaf: None,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_count
    }

    fn is_leaf(&self, node: usize) -> bool {
        node >= self.leaf_start
    }

    /// Clear every node's resident value, per "between phases the tree is
    /// reinitialized" (§4.4).
    fn reset_phase(&mut self) {
        for slot in self.resident.iter_mut() {
            *slot = None;
        }
        self.last_leaf = None;
    }

    /// Pull exactly one proxy per leaf from `input`. Stops priming early
    /// once `input` reports end-of-data (every subsequent leaf gets
    /// `None` too). Returns the number of leaves actually filled.
    fn prime(&mut self, input: &mut dyn InputStage, pool: &mut ProxyPool) -> CliResult<usize> {
        let mut filled = 0;
        for i in 0..self.leaf_count {
            let idx = self.leaf_start + i;
            match input.next(pool)? {
                Some(proxy) => {
                    self.resident[idx] = Some((i, proxy));
                    filled += 1;
                }
                None => break,
            }
        }
        Ok(filled)
    }

    /// Ensure `resident[node]` holds the current winner of its subtree, if
    /// one is available, recomputing the match at `node` only when needed
    /// (i.e. when its last winner was just drawn out by the parent).
    fn ensure(&mut self, node: usize) -> CliResult<()> {
        if self.resident[node].is_some() || self.is_leaf(node) {
            return Ok(());
        }

        let right = 2 * node + 1;
        let left = 2 * node + 2;
        self.ensure(left)?;
        self.ensure(right)?;

        self.resident[node] = match (self.resident[left].take(), self.resident[right].take()) {
            (Some(l), Some(r)) => {
                if l.1 <= r.1 {
                    self.resident[right] = Some(r);
                    Some(l)
                } else {
                    self.resident[left] = Some(l);
                    Some(r)
                }
            }
            (Some(l), None) => Some(l),
            (None, Some(r)) => Some(r),
            (None, None) => None,
        };
        Ok(())
    }

    /// Request the next winner for the current phase. Returns `None` once
    /// the phase is fully drained. Records which leaf the winner descended
    /// from in `last_leaf`, consumed by `run_merge`'s refill step.
    pub fn shake(&mut self) -> CliResult<Option<RecordProxy>> {
        self.ensure(0)?;
        match self.resident[0].take() {
            Some((leaf, proxy)) => {
                self.last_leaf = Some(leaf);
                Ok(Some(proxy))
            }
            None => Ok(None),
        }
    }

    /// Run one full phase: prime the leaf row from `input`, then shake
    /// until drained, returning the sorted run (at most `leaf_capacity()`
    /// records). Returns `None` instead of `Some(vec![])` when `input` was
    /// already exhausted before this phase began, so the caller can tell
    /// "pass complete" apart from "phase produced zero records" — the
    /// latter cannot otherwise happen, since `prime` would report zero
    /// fill only when the former is true.
    pub fn run_phase(
        &mut self,
        input: &mut dyn InputStage,
        pool: &mut ProxyPool,
    ) -> CliResult<Option<Vec<RecordProxy>>> {
        self.reset_phase();
        let filled = self.prime(input, pool)?;
        if filled == 0 {
            return Ok(None);
        }

        let mut run = Vec::with_capacity(filled);
        while let Some(proxy) = self.shake()? {
            run.push(proxy);
        }
        Ok(Some(run))
    }

    /// K-way merge (§4.6): each of `leaves` (K ≤ `leaf_capacity()`) is its
    /// own independent `InputStage`, unlike `run_phase`'s single shared
    /// stream. A leaf is refilled from its own reader every time its value
    /// is drawn out, not just once per phase, so the merge drains all K
    /// readers to exhaustion rather than stopping after `leaf_capacity()`
    /// records — the merged run holds every record the K inputs
    /// contained. `sink` is called once per emitted record in sorted
    /// order, letting the caller either collect the run (writing it to a
    /// further `SegmentStore`) or stream it straight through
    /// `DuplicateFilter`/`OutputStage` on the final pass without
    /// buffering the whole result.
    pub fn run_merge(
        &mut self,
        leaves: &mut [Box<dyn InputStage>],
        pool: &mut ProxyPool,
        mut sink: impl FnMut(RecordProxy) -> CliResult<()>,
    ) -> CliResult<()> {
        assert!(leaves.len() <= self.leaf_count, "merge fan-in exceeds leaf capacity");
        self.reset_phase();

        for (i, leaf) in leaves.iter_mut().enumerate() {
            if let Some(proxy) = leaf.next(pool)? {
                self.resident[self.leaf_start + i] = Some((i, proxy));
            }
        }

        while let Some(proxy) = self.shake()? {
            sink(proxy)?;

            if let Some(leaf) = self.last_leaf.take() {
                if let Some(proxy) = leaves[leaf].next(pool)? {
                    self.resident[self.leaf_start + leaf] = Some((leaf, proxy));
                }
            }
        }

        Ok(())
    }
}
