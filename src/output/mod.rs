mod csv_stage;
mod delimited;
mod fixed;

pub use csv_stage::CsvOutputStage;
pub use delimited::DelimitedOutputStage;
pub use fixed::FixedOutputStage;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::codec::EncodedKey;
use crate::error::{CliError, CliResult};
use crate::proxy::RecordProxy;

/// One original input's raw bytes, addressable by the `(position, size)` a
/// `RecordProxy` carries. A live file reopens and seeks per read; stdin has
/// no such handle to reopen, so it is instead buffered whole into memory up
/// front and indexed the same way.
pub trait RecordSource {
    fn read_at(&mut self, position: u64, size: u32) -> CliResult<Vec<u8>>;
}

/// Reopens the original file per read rather than holding one seeked
/// handle, since a run's proxies are not guaranteed to be read back in
/// position order once they have passed through a tournament.
pub struct FileRecordSource {
    path: std::path::PathBuf,
}

impl FileRecordSource {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        FileRecordSource { path: path.into() }
    }
}

impl RecordSource for FileRecordSource {
    fn read_at(&mut self, position: u64, size: u32) -> CliResult<Vec<u8>> {
        let mut file = File::open(&self.path).map_err(CliError::from)?;
        file.seek(SeekFrom::Start(position)).map_err(CliError::from)?;
        let mut buf = vec![0u8; size as usize];
        file.read_exact(&mut buf).map_err(CliError::from)?;
        Ok(buf)
    }
}

/// Backing for a non-seekable input (stdin): the whole stream was read into
/// memory once, up front, by whichever `InputStage` consumed it, and handed
/// here so `--copy` can still re-read by `(position, size)` exactly like a
/// real file would support.
pub struct MemoryRecordSource {
    buffer: Vec<u8>,
}

impl MemoryRecordSource {
    pub fn new(buffer: Vec<u8>) -> Self {
        MemoryRecordSource { buffer }
    }
}

impl RecordSource for MemoryRecordSource {
    fn read_at(&mut self, position: u64, size: u32) -> CliResult<Vec<u8>> {
        let start = position as usize;
        let end = start + size as usize;
        self.buffer
            .get(start..end)
            .map(|s| s.to_vec())
            .ok_or_else(|| CliError::Internal("buffered source too short for recorded (position, size)".into()))
    }
}

/// One `RecordSource` per `InputStage` that fed the tournament, indexed by
/// `RecordProxy::source_index` — the mechanism `OutputStage::publish` uses
/// to recover a record's original bytes without the tournament itself ever
/// having carried them.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Box<dyn RecordSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        SourceRegistry { sources: Vec::new() }
    }

    pub fn register(&mut self, source: Box<dyn RecordSource>) -> u32 {
        self.sources.push(source);
        (self.sources.len() - 1) as u32
    }

    pub fn read(&mut self, proxy: &RecordProxy) -> CliResult<Vec<u8>> {
        let source = self
            .sources
            .get_mut(proxy.source_index as usize)
            .ok_or_else(|| CliError::Internal(format!("no registered source at index {}", proxy.source_index)))?;
        source.read_at(proxy.position, proxy.size)
    }
}

/// Ordering self-check plumbing shared by every concrete `OutputStage`
/// (§4.8): each published record's key must be `>=` the previous one, since
/// the merge that feeds `publish` is itself supposed to already be fully
/// sorted. A violation here means a defect in the tournament or merge
/// plan, not a problem with the data, so it is always fatal.
pub(crate) struct OutputSink {
    last_key: Option<EncodedKey>,
    published: u64,
}

impl OutputSink {
    pub fn new() -> Self {
        OutputSink {
            last_key: None,
            published: 0,
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn check(&mut self, proxy: &RecordProxy) -> CliResult<()> {
        if let Some(last) = &self.last_key {
            if &proxy.key < last {
                return Err(CliError::Output(format!(
                    "ordering self-check failed at record {}: key {:?} arrived after {:?}",
                    self.published + 1,
                    proxy.key,
                    last
                )));
            }
        }
        self.last_key = Some(proxy.key.clone());
        self.published += 1;
        Ok(())
    }
}

/// `{ open(), publish(proxy), close() }` from §4.8. `publish` re-reads the
/// record's original bytes through `registry` and writes them in whatever
/// framing the concrete stage implements (fixed, delimited, CSV); the
/// ordering self-check and `header` policy are identical across all three
/// and live in `OutputSink`, not here.
pub trait OutputStage {
    fn open(&mut self) -> CliResult<()>;
    fn publish(&mut self, proxy: &RecordProxy, registry: &mut SourceRegistry) -> CliResult<()>;
    fn close(&mut self) -> CliResult<()>;
}
