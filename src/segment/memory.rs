use std::collections::VecDeque;

use crate::error::CliResult;
use crate::input::InputStage;
use crate::proxy::{ProxyPool, RecordProxy};
use crate::segment::SegmentStore;

/// In-memory variant of §4.5: "runs are arrays of proxies indexed in a
/// side table." No I/O; used when `RunConfig::disk_work` is false and the
/// whole working set is expected to fit in memory.
#[derive(Default)]
pub struct MemorySegmentStore {
    runs: Vec<Vec<RecordProxy>>,
}

impl MemorySegmentStore {
    pub fn new() -> Self {
        MemorySegmentStore { runs: Vec::new() }
    }
}

impl SegmentStore for MemorySegmentStore {
    type Reader = MemorySegmentReader;

    fn write_run(&mut self, run: Vec<RecordProxy>) -> CliResult<()> {
        self.runs.push(run);
        Ok(())
    }

    fn run_count(&self) -> usize {
        self.runs.len()
    }

    fn into_readers(self) -> CliResult<Vec<MemorySegmentReader>> {
        Ok(self
            .runs
            .into_iter()
            .map(|run| MemorySegmentReader {
                remaining: run.into(),
            })
            .collect())
    }
}

/// `SegmentReader` over one in-memory run: the proxies are already fully
/// built and sorted, so `next` is a plain pop, no re-encoding.
pub struct MemorySegmentReader {
    remaining: VecDeque<RecordProxy>,
}

impl InputStage for MemorySegmentReader {
    fn next(&mut self, _pool: &mut ProxyPool) -> CliResult<Option<RecordProxy>> {
        Ok(self.remaining.pop_front())
    }

    fn reset(&mut self) -> CliResult<()> {
        Err(crate::error::CliError::Internal(
            "MemorySegmentReader does not support reset; a run is consumed exactly once".into(),
        ))
    }

    fn close(&mut self) -> CliResult<()> {
        self.remaining.clear();
        Ok(())
    }

    fn max_rows_estimate(&self) -> Option<u64> {
        Some(self.remaining.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EncodedKey;

    fn proxy(n: i64) -> RecordProxy {
        let mut key = EncodedKey::new();
        key.try_extend_from_slice(&n.to_be_bytes()).unwrap();
        RecordProxy::new(key, 8, 0, 0, n)
    }

    #[test]
    fn runs_round_trip_in_stored_order() {
        let mut store = MemorySegmentStore::new();
        store.write_run(vec![proxy(1), proxy(2)]).unwrap();
        store.write_run(vec![proxy(3)]).unwrap();
        assert_eq!(store.run_count(), 2);

        let mut readers = store.into_readers().unwrap();
        let mut pool = ProxyPool::new();
        assert_eq!(readers[0].next(&mut pool).unwrap().unwrap().ordinal, 1);
        assert_eq!(readers[0].next(&mut pool).unwrap().unwrap().ordinal, 2);
        assert!(readers[0].next(&mut pool).unwrap().is_none());
        assert_eq!(readers[1].next(&mut pool).unwrap().unwrap().ordinal, 3);
    }
}
