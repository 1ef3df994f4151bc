mod disk;
mod memory;

use std::path::PathBuf;

pub use disk::{DiskSegmentReader, DiskSegmentStore};
pub use memory::{MemorySegmentReader, MemorySegmentStore};

use crate::error::CliResult;
use crate::input::InputStage;
use crate::proxy::{ProxyPool, RecordProxy};

/// Persist a pass's sorted runs to a temp store, memory or disk, selected
/// by `RunConfig::disk_work` (§4.5). One store instance backs a whole
/// pass: `write_run` is called once per phase, and `into_readers` is
/// called once the pass is complete to hand the orchestrator one
/// `SegmentReader` per run for the next pass's tournament leaves.
pub trait SegmentStore {
    type Reader: InputStage;

    fn write_run(&mut self, run: Vec<RecordProxy>) -> CliResult<()>;
    fn run_count(&self) -> usize;
    fn into_readers(self) -> CliResult<Vec<Self::Reader>>;
}

/// Runtime choice between the two `SegmentStore` backings. `SegmentStore`
/// can't be a trait object (its `Reader` associated type), and the
/// orchestrator doesn't know at compile time which backing a given run
/// will use, so it holds this enum instead and matches once per pass.
pub enum AnySegmentStore {
    Memory(MemorySegmentStore),
    Disk(DiskSegmentStore),
}

impl AnySegmentStore {
    pub fn memory() -> Self {
        AnySegmentStore::Memory(MemorySegmentStore::new())
    }

    pub fn disk(path: PathBuf) -> CliResult<Self> {
        Ok(AnySegmentStore::Disk(DiskSegmentStore::create(path)?))
    }

    pub fn write_run(&mut self, run: Vec<RecordProxy>) -> CliResult<()> {
        match self {
            AnySegmentStore::Memory(store) => store.write_run(run),
            AnySegmentStore::Disk(store) => store.write_run(run),
        }
    }

    pub fn run_count(&self) -> usize {
        match self {
            AnySegmentStore::Memory(store) => store.run_count(),
            AnySegmentStore::Disk(store) => store.run_count(),
        }
    }

    pub fn into_readers(self) -> CliResult<Vec<AnySegmentReader>> {
        match self {
            AnySegmentStore::Memory(store) => Ok(store
                .into_readers()?
                .into_iter()
                .map(AnySegmentReader::Memory)
                .collect()),
            AnySegmentStore::Disk(store) => Ok(store
                .into_readers()?
                .into_iter()
                .map(AnySegmentReader::Disk)
                .collect()),
        }
    }
}

/// Runtime choice between the two `SegmentReader` backings, boxed as an
/// `InputStage` so the orchestrator can feed heterogeneous Memory/Disk
/// runs into the same `Tournament::run_merge` leaf slice.
pub enum AnySegmentReader {
    Memory(MemorySegmentReader),
    Disk(DiskSegmentReader),
}

impl InputStage for AnySegmentReader {
    fn next(&mut self, pool: &mut ProxyPool) -> CliResult<Option<RecordProxy>> {
        match self {
            AnySegmentReader::Memory(reader) => reader.next(pool),
            AnySegmentReader::Disk(reader) => reader.next(pool),
        }
    }

    fn reset(&mut self) -> CliResult<()> {
        match self {
            AnySegmentReader::Memory(reader) => reader.reset(),
            AnySegmentReader::Disk(reader) => reader.reset(),
        }
    }

    fn close(&mut self) -> CliResult<()> {
        match self {
            AnySegmentReader::Memory(reader) => reader.close(),
            AnySegmentReader::Disk(reader) => reader.close(),
        }
    }

    fn max_rows_estimate(&self) -> Option<u64> {
        match self {
            AnySegmentReader::Memory(reader) => reader.max_rows_estimate(),
            AnySegmentReader::Disk(reader) => reader.max_rows_estimate(),
        }
    }
}
