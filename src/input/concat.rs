use crate::error::CliResult;
use crate::proxy::{ProxyPool, RecordProxy};

use super::{InputCounters, InputStage};

/// `--inputFileName a,b,c`: reads each underlying stage to exhaustion
/// before moving to the next, so a multi-file input looks like one logical
/// stream to pass 1's tournament. Each underlying stage already carries its
/// own `source_index` (assigned when its `RecordPipeline` was built), so
/// `OutputStage::publish` can still re-read the right original file later.
pub struct ConcatInputStage {
    stages: Vec<Box<dyn InputStage>>,
    current: usize,
}

impl ConcatInputStage {
    pub fn new(stages: Vec<Box<dyn InputStage>>) -> Self {
        ConcatInputStage { stages, current: 0 }
    }
}

impl InputStage for ConcatInputStage {
    fn next(&mut self, pool: &mut ProxyPool) -> CliResult<Option<RecordProxy>> {
        while self.current < self.stages.len() {
            if let Some(proxy) = self.stages[self.current].next(pool)? {
                return Ok(Some(proxy));
            }
            self.current += 1;
        }
        Ok(None)
    }

    fn reset(&mut self) -> CliResult<()> {
        for stage in &mut self.stages {
            stage.reset()?;
        }
        self.current = 0;
        Ok(())
    }

    fn close(&mut self) -> CliResult<()> {
        for stage in &mut self.stages {
            stage.close()?;
        }
        Ok(())
    }

    fn max_rows_estimate(&self) -> Option<u64> {
        self.stages
            .iter()
            .map(|s| s.max_rows_estimate())
            .try_fold(0u64, |acc, n| n.map(|n| acc + n))
    }

    /// Summed across every underlying stage, since each contributes its own
    /// slice of the one logical input stream.
    fn counters(&self) -> InputCounters {
        self.stages.iter().map(|s| s.counters()).fold(InputCounters::default(), |acc, c| InputCounters {
            read: acc.read + c.read,
            selected: acc.selected + c.selected,
            filtered: acc.filtered + c.filtered,
        })
    }
}
