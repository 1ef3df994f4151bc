use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::EncodedKey;
use crate::error::{CliError, CliResult};
use crate::input::InputStage;
use crate::proxy::{ProxyPool, RecordProxy};
use crate::segment::SegmentStore;

/// On-disk variant of §4.5: runs are written as a length-prefixed
/// sequence of `(key_len, key_bytes, size, position, source_index,
/// ordinal)` records into a single work file; an in-memory index records
/// each run's file offset and count. Named per §5's policy: prefix
/// `Sorted.`, suffix `.tmp`, inside the configured work directory.
pub struct DiskSegmentStore {
    path: PathBuf,
    writer: BufWriter<File>,
    offset: u64,
    index: Vec<(u64, usize)>,
}

impl DiskSegmentStore {
    pub fn create(path: PathBuf) -> CliResult<Self> {
        let file = File::create(&path).map_err(CliError::from)?;
        Ok(DiskSegmentStore {
            path,
            writer: BufWriter::new(file),
            offset: 0,
            index: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_proxy(&mut self, proxy: &RecordProxy) -> CliResult<u64> {
        let mut written = 0u64;
        let key_len = proxy.key.len() as u32;
        self.writer.write_all(&key_len.to_le_bytes()).map_err(CliError::from)?;
        written += 4;
        self.writer.write_all(&proxy.key).map_err(CliError::from)?;
        written += proxy.key.len() as u64;
        self.writer.write_all(&proxy.size.to_le_bytes()).map_err(CliError::from)?;
        written += 4;
        self.writer.write_all(&proxy.position.to_le_bytes()).map_err(CliError::from)?;
        written += 8;
        self.writer
            .write_all(&proxy.source_index.to_le_bytes())
            .map_err(CliError::from)?;
        written += 4;
        self.writer.write_all(&proxy.ordinal.to_le_bytes()).map_err(CliError::from)?;
        written += 8;
        Ok(written)
    }
}

impl SegmentStore for DiskSegmentStore {
    type Reader = DiskSegmentReader;

    fn write_run(&mut self, run: Vec<RecordProxy>) -> CliResult<()> {
        let start = self.offset;
        let count = run.len();
        for proxy in &run {
            self.offset += self.write_proxy(proxy)?;
        }
        self.index.push((start, count));
        Ok(())
    }

    fn run_count(&self) -> usize {
        self.index.len()
    }

    fn into_readers(mut self) -> CliResult<Vec<DiskSegmentReader>> {
        self.writer.flush().map_err(CliError::from)?;
        drop(self.writer);

        self.index
            .into_iter()
            .map(|(offset, count)| {
                let file = File::open(&self.path).map_err(CliError::from)?;
                let mut reader = BufReader::new(file);
                reader.seek(SeekFrom::Start(offset)).map_err(CliError::from)?;
                Ok(DiskSegmentReader { reader, remaining: count })
            })
            .collect()
    }
}

/// `SegmentReader` over one on-disk run: pulls proxies in stored order,
/// which is already sorted, from its own file handle seeked to the run's
/// recorded offset.
pub struct DiskSegmentReader {
    reader: BufReader<File>,
    remaining: usize,
}

impl DiskSegmentReader {
    fn read_proxy(&mut self) -> CliResult<RecordProxy> {
        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(CliError::from)?;
        let key_len = u32::from_le_bytes(len_buf) as usize;

        let mut key_bytes = vec![0u8; key_len];
        self.reader.read_exact(&mut key_bytes).map_err(CliError::from)?;
        let mut key = EncodedKey::new();
        key.try_extend_from_slice(&key_bytes)
            .map_err(|_| CliError::Internal("stored key exceeds EncodedKey capacity".into()))?;

        let mut u32_buf = [0u8; 4];
        self.reader.read_exact(&mut u32_buf).map_err(CliError::from)?;
        let size = u32::from_le_bytes(u32_buf);

        let mut u64_buf = [0u8; 8];
        self.reader.read_exact(&mut u64_buf).map_err(CliError::from)?;
        let position = u64::from_le_bytes(u64_buf);

        self.reader.read_exact(&mut u32_buf).map_err(CliError::from)?;
        let source_index = u32::from_le_bytes(u32_buf);

        self.reader.read_exact(&mut u64_buf).map_err(CliError::from)?;
        let ordinal = i64::from_le_bytes(u64_buf);

        Ok(RecordProxy::new(key, size, position, source_index, ordinal))
    }
}

impl InputStage for DiskSegmentReader {
    fn next(&mut self, _pool: &mut ProxyPool) -> CliResult<Option<RecordProxy>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let proxy = self.read_proxy()?;
        self.remaining -= 1;
        Ok(Some(proxy))
    }

    fn reset(&mut self) -> CliResult<()> {
        Err(CliError::Internal(
            "DiskSegmentReader does not support reset; a run is consumed exactly once".into(),
        ))
    }

    fn close(&mut self) -> CliResult<()> {
        Ok(())
    }

    fn max_rows_estimate(&self) -> Option<u64> {
        Some(self.remaining as u64)
    }
}
