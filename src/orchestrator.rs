use log::{debug, info, trace};

use crate::config::RunConfig;
use crate::dedup::DuplicateFilter;
use crate::error::CliResult;
use crate::input::{InputCounters, InputStage};
use crate::output::{OutputStage, SourceRegistry};
use crate::proxy::ProxyPool;
use crate::segment::{AnySegmentReader, AnySegmentStore};
use crate::tournament::Tournament;

/// What one `MergeOrchestrator::run` produced: how many records were
/// actually published, plus the two tallies invariant 7 (§8) checks
/// against each other (`counters.read == counters.selected +
/// counters.filtered`, `published == counters.selected - duplicates_dropped`).
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOutcome {
    pub published: u64,
    pub counters: InputCounters,
    pub duplicates_dropped: u64,
}

/// Drives the whole pipeline (§4.6): pass 1 builds the initial runs from
/// the live input, intermediate merge passes fold the run count down to
/// `leaf_capacity()` using the "smallest K" rule so a single final pass
/// always suffices, and that final pass streams straight through
/// `DuplicateFilter` into the caller's `OutputStage` without materializing
/// the whole sorted dataset in memory.
pub struct MergeOrchestrator {
    config: RunConfig,
}

impl MergeOrchestrator {
    pub fn new(config: RunConfig) -> Self {
        MergeOrchestrator { config }
    }

    fn new_store(&self) -> CliResult<AnySegmentStore> {
        if self.config.disk_work() {
            AnySegmentStore::disk(self.config.new_work_file_path())
        } else {
            Ok(AnySegmentStore::memory())
        }
    }

    /// Run the full sort/merge/copy pipeline, returning how many records
    /// were actually published to `output` (post-deduplication) together
    /// with the input counters invariant 7 (§8) is checked against.
    pub fn run(
        &self,
        mut input: Box<dyn InputStage>,
        dedup_disposition: DuplicateFilter,
        output: &mut dyn OutputStage,
        registry: &mut SourceRegistry,
    ) -> CliResult<RunOutcome> {
        let mut tournament = Tournament::new(self.config.depth());
        let mut pool = ProxyPool::with_capacity(self.config.node_count());

        let mut store = self.new_store()?;
        while let Some(run) = tournament.run_phase(input.as_mut(), &mut pool)? {
            trace!(target: "tapesort", "pass 1: produced run of {} records", run.len());
            store.write_run(run)?;
        }
        let counters = input.counters();
        info!(target: "tapesort", "pass 1 produced {} runs", store.run_count());

        let mut readers: Vec<AnySegmentReader> = store.into_readers()?;
        let leaf_capacity = self.config.leaf_capacity();
        let mut pass_number = 1;

        while readers.len() > leaf_capacity {
            let k = merge_fan_in(readers.len(), leaf_capacity);
            pass_number += 1;
            debug!(
                target: "tapesort",
                "merge pass {}: {} runs remaining, fan-in {}",
                pass_number,
                readers.len(),
                k
            );

            let mut next_store = self.new_store()?;
            let mut remaining = readers;
            while !remaining.is_empty() {
                let take = k.min(remaining.len());
                let mut group: Vec<Box<dyn InputStage>> = remaining
                    .drain(..take)
                    .map(|r| Box::new(r) as Box<dyn InputStage>)
                    .collect();

                let mut merged = Vec::new();
                tournament.run_merge(&mut group, &mut pool, |proxy| {
                    merged.push(proxy);
                    Ok(())
                })?;
                next_store.write_run(merged)?;
            }
            readers = next_store.into_readers()?;
        }

        info!(target: "tapesort", "final pass: merging {} runs", readers.len());
        output.open()?;

        let mut dedup = dedup_disposition;
        let mut leaves: Vec<Box<dyn InputStage>> = readers
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn InputStage>)
            .collect();

        let mut published = 0u64;
        tournament.run_merge(&mut leaves, &mut pool, |proxy| {
            if let Some(p) = dedup.push(proxy) {
                output.publish(&p, registry)?;
                published += 1;
            }
            Ok(())
        })?;
        let dropped = dedup.dropped();
        if let Some(p) = dedup.finish() {
            output.publish(&p, registry)?;
            published += 1;
        }
        output.close()?;

        info!(
            target: "tapesort",
            "published {} records ({} dropped as duplicates)",
            published, dropped
        );
        Ok(RunOutcome {
            published,
            counters,
            duplicates_dropped: dropped,
        })
    }
}

/// "Smallest K" planning rule (§4.6): pick the smallest fan-in, bounded by
/// `leaf_capacity`, that still drives `run_count` down to `leaf_capacity`
/// or fewer runs in exactly one pass.
fn merge_fan_in(run_count: usize, leaf_capacity: usize) -> usize {
    let ceil_div = (run_count + leaf_capacity - 1) / leaf_capacity;
    ceil_div.max(2).min(leaf_capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{KeyCodec, RecordView};
    use crate::columns::{ColumnDef, Direction, FieldType, KeyPart};
    use crate::dedup::DuplicateDisposition;
    use crate::output::{MemoryRecordSource, OutputStage};

    struct VecInput {
        values: Vec<i32>,
        next: usize,
        codec: KeyCodec,
    }

    impl VecInput {
        fn new(values: Vec<i32>) -> Self {
            let parts = vec![KeyPart::new(
                ColumnDef::new("v", FieldType::Int(4), 0, 4).unwrap(),
                Direction::Asc,
            )];
            VecInput {
                values,
                next: 0,
                codec: KeyCodec::new(parts, 256),
            }
        }
    }

    impl InputStage for VecInput {
        fn next(&mut self, pool: &mut ProxyPool) -> CliResult<Option<crate::proxy::RecordProxy>> {
            if self.next >= self.values.len() {
                return Ok(None);
            }
            let v = self.values[self.next];
            let bytes = v.to_be_bytes();
            let view = RecordView::raw(&bytes);
            let record_number = self.next as u64 + 1;
            let key = self.codec.encode(&view, record_number)?;
            let position = self.next as u64 * 4;
            self.next += 1;
            Ok(Some(pool.take(key, 4, position, 0, record_number as i64)))
        }

        fn reset(&mut self) -> CliResult<()> {
            self.next = 0;
            Ok(())
        }

        fn close(&mut self) -> CliResult<()> {
            Ok(())
        }

        fn max_rows_estimate(&self) -> Option<u64> {
            Some((self.values.len() - self.next) as u64)
        }
    }

    struct CollectingOutput {
        values: Vec<i32>,
    }

    impl OutputStage for CollectingOutput {
        fn open(&mut self) -> CliResult<()> {
            Ok(())
        }

        fn publish(
            &mut self,
            proxy: &crate::proxy::RecordProxy,
            registry: &mut SourceRegistry,
        ) -> CliResult<()> {
            let bytes = registry.read(proxy)?;
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes);
            self.values.push(i32::from_be_bytes(buf));
            Ok(())
        }

        fn close(&mut self) -> CliResult<()> {
            Ok(())
        }
    }

    fn memory_source(values: &[i32]) -> Box<dyn crate::output::RecordSource> {
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        Box::new(MemoryRecordSource::new(bytes))
    }

    #[test]
    fn merge_fan_in_picks_smallest_k_that_fits_one_pass() {
        assert_eq!(merge_fan_in(10, 4), 3);
        assert_eq!(merge_fan_in(5, 4), 2);
        assert_eq!(merge_fan_in(100, 4), 4);
    }

    #[test]
    fn multi_pass_merge_produces_fully_sorted_output() {
        let values: Vec<i32> = (0..20).rev().collect();
        let config = RunConfig::default().with_power(2).unwrap(); // M = 2, forces several merge passes
        let orchestrator = MergeOrchestrator::new(config);

        let input: Box<dyn InputStage> = Box::new(VecInput::new(values.clone()));
        let mut registry = SourceRegistry::new();
        registry.register(memory_source(&values));

        let mut output = CollectingOutput { values: Vec::new() };
        let outcome = orchestrator
            .run(input, DuplicateFilter::new(DuplicateDisposition::Original), &mut output, &mut registry)
            .unwrap();

        assert_eq!(outcome.published, 20);
        let mut expected: Vec<i32> = values;
        expected.sort();
        assert_eq!(output.values, expected);
    }

    #[test]
    fn duplicate_keys_are_deduplicated_in_the_final_pass() {
        let values = vec![3, 1, 3, 2, 1];
        let config = RunConfig::default().with_power(2).unwrap();
        let orchestrator = MergeOrchestrator::new(config);

        let input: Box<dyn InputStage> = Box::new(VecInput::new(values.clone()));
        let mut registry = SourceRegistry::new();
        registry.register(memory_source(&values));

        let mut output = CollectingOutput { values: Vec::new() };
        let outcome = orchestrator
            .run(
                input,
                DuplicateFilter::new(DuplicateDisposition::FirstOnly),
                &mut output,
                &mut registry,
            )
            .unwrap();

        assert_eq!(outcome.published, 3);
        assert_eq!(outcome.duplicates_dropped, 2);
        assert_eq!(output.values, vec![1, 2, 3]);
    }
}
