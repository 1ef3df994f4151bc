mod concat;
mod csv_stage;
mod delimited;
mod fixed;

pub use concat::ConcatInputStage;
pub use csv_stage::CsvInputStage;
pub use delimited::DelimitedInputStage;
pub use fixed::FixedInputStage;

use crate::codec::KeyCodec;
use crate::error::CliResult;
use crate::predicate::Predicate;
use crate::proxy::{ProxyPool, RecordProxy};

/// `{ next() -> Option<Proxy>, reset(), close(), max_rows_estimate() }`
/// from §4.3. Every concrete provider the tournament's leaves attach to —
/// a file-backed reader on pass 1, a `SegmentReader` on later passes —
/// implements this same seam, which is what lets the orchestrator reuse
/// one `Tournament` across passes by swapping leaf providers.
pub trait InputStage {
    /// Pull, filter and key-encode the next surviving record. `Ok(None)`
    /// signals ordinary end-of-input; a `stopWhen` predicate firing is
    /// reported the same way, after backing out its own counter increment
    /// (step 6 of §4.3's algorithm).
    fn next(&mut self, pool: &mut ProxyPool) -> CliResult<Option<RecordProxy>>;

    /// Rewind to the beginning of this stage's input, for stages reused
    /// across phases/passes where the underlying source supports seeking
    /// back (a `SegmentReader` never needs this; a live file reader does
    /// between independent runs of the CLI, not mid-pipeline).
    fn reset(&mut self) -> CliResult<()>;

    fn close(&mut self) -> CliResult<()>;

    /// Best-effort upper bound on remaining records, used by
    /// `MergeOrchestrator` to decide whether the active provider already
    /// fits within one phase (`M`).
    fn max_rows_estimate(&self) -> Option<u64>;

    /// Cumulative read/selected/filtered tally (invariant 7, §8). Only the
    /// pass-1 stages driving a live `RecordPipeline` carry real counts;
    /// later-pass `SegmentReader`s replay already-admitted proxies and
    /// keep the default, zeroed counters.
    fn counters(&self) -> InputCounters {
        InputCounters::default()
    }
}

/// Per-record counters an `InputStage` accumulates, independent of its
/// concrete framing. Exposed so the orchestrator can check invariant 7
/// from §8 (`input = selected + filtered`).
#[derive(Clone, Copy, Debug, Default)]
pub struct InputCounters {
    pub read: u64,
    pub selected: u64,
    pub filtered: u64,
}

/// Shared WHERE/STOP/KeyCodec wiring every concrete `InputStage` drives
/// its raw record bytes through. Factored out so `FixedInputStage`,
/// `DelimitedInputStage` and `CsvInputStage` only need to supply "get me
/// the next raw record", not reimplement steps 3-8 of §4.3 three times.
pub(crate) struct RecordPipeline {
    pub codec: KeyCodec,
    pub r#where: Option<Box<dyn Predicate>>,
    pub stop_when: Option<Box<dyn Predicate>>,
    pub counters: InputCounters,
    pub source_index: u32,
    pub negate_ordinal: bool,
}

impl RecordPipeline {
    pub fn new(codec: KeyCodec, source_index: u32) -> Self {
        RecordPipeline {
            codec,
            r#where: None,
            stop_when: None,
            counters: InputCounters::default(),
            source_index,
            negate_ordinal: false,
        }
    }

    pub fn with_where(mut self, p: Box<dyn Predicate>) -> Self {
        self.r#where = Some(p);
        self
    }

    pub fn with_stop_when(mut self, p: Box<dyn Predicate>) -> Self {
        self.stop_when = Some(p);
        self
    }

    /// `DuplicateDisposition::negates_ordinal` (`dedup.rs`): `LastOnly` and
    /// `Reverse` need duplicate groups to arrive from the tournament in
    /// descending-ordinal order instead of the usual ascending one, which
    /// is realized here, at proxy acquisition, rather than inside the
    /// tournament's comparison itself.
    pub fn with_ordinal_sign(mut self, negate: bool) -> Self {
        self.negate_ordinal = negate;
        self
    }

    /// Steps 3-8 of §4.3 against one already-read raw record. `view` must
    /// already reflect the record's csv fields, if any. `Filtered` means
    /// the caller should loop and pull the next raw record; `Stop` means
    /// end-of-input was signalled and the caller must not pull again.
    pub fn admit(
        &mut self,
        view: &crate::codec::RecordView,
        size: u32,
        position: u64,
        pool: &mut ProxyPool,
    ) -> CliResult<Admission> {
        self.counters.read += 1;
        let record_number = self.counters.read;

        if let Some(predicate) = &self.r#where {
            if !crate::predicate::evaluate_where(predicate.as_ref(), record_number)? {
                self.counters.filtered += 1;
                return Ok(Admission::Filtered);
            }
        }

        if let Some(predicate) = &self.stop_when {
            if crate::predicate::evaluate_stop(predicate.as_ref(), record_number)? {
                self.counters.read -= 1;
                return Ok(Admission::Stop);
            }
        }

        let key = self.codec.encode(view, record_number)?;
        self.counters.selected += 1;
        let ordinal = if self.negate_ordinal {
            -(record_number as i64)
        } else {
            record_number as i64
        };
        Ok(Admission::Proxy(pool.take(
            key,
            size,
            position,
            self.source_index,
            ordinal,
        )))
    }
}

/// Result of running one raw record through WHERE/STOP/KeyCodec. Distinct
/// from `Option<RecordProxy>` so a concrete stage's `next()` loop can tell
/// "skip this one and keep reading" (`Filtered`) apart from "stop reading
/// entirely" (`Stop`) — collapsing both to `None` would make the caller
/// re-read past a `stopWhen` trigger.
pub enum Admission {
    Proxy(RecordProxy),
    Filtered,
    Stop,
}
