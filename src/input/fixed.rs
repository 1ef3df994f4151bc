use std::io::Read;

use crate::codec::RecordView;
use crate::error::{CliError, CliResult};
use crate::input::{Admission, InputCounters, InputStage, RecordPipeline};
use crate::proxy::{ProxyPool, RecordProxy};

/// `--fixedIn N`: every record is exactly `record_length` bytes, back to
/// back, no delimiter. `position` is the absolute byte offset of the
/// record's first byte, which `OutputStage::publish` later uses to
/// re-read the raw bytes for `--copy Original`.
pub struct FixedInputStage<R: Read> {
    reader: R,
    record_length: usize,
    position: u64,
    pipeline: RecordPipeline,
    buf: Vec<u8>,
    done: bool,
}

impl<R: Read> FixedInputStage<R> {
    pub fn new(reader: R, record_length: usize, pipeline: RecordPipeline) -> CliResult<Self> {
        if record_length == 0 {
            return Err(CliError::Config("--fixedIn must be at least 1".into()));
        }
        Ok(FixedInputStage {
            reader,
            record_length,
            position: 0,
            pipeline,
            buf: vec![0u8; record_length],
            done: false,
        })
    }

    fn read_one(&mut self) -> CliResult<Option<()>> {
        if self.done {
            return Ok(None);
        }
        match self.reader.read_exact(&mut self.buf) {
            Ok(()) => Ok(Some(())),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.done = true;
                Ok(None)
            }
            Err(e) => Err(CliError::from(e)),
        }
    }
}

impl<R: Read> InputStage for FixedInputStage<R> {
    fn next(&mut self, pool: &mut ProxyPool) -> CliResult<Option<RecordProxy>> {
        loop {
            if self.read_one()?.is_none() {
                return Ok(None);
            }

            let position = self.position;
            self.position += self.record_length as u64;
            let view = RecordView::raw(&self.buf);
            match self.pipeline.admit(&view, self.record_length as u32, position, pool)? {
                Admission::Proxy(p) => return Ok(Some(p)),
                Admission::Filtered => continue,
                Admission::Stop => return Ok(None),
            }
        }
    }

    fn reset(&mut self) -> CliResult<()> {
        Err(CliError::Internal(
            "FixedInputStage does not support reset on a non-seekable reader".into(),
        ))
    }

    fn close(&mut self) -> CliResult<()> {
        Ok(())
    }

    fn max_rows_estimate(&self) -> Option<u64> {
        None
    }

    fn counters(&self) -> InputCounters {
        self.pipeline.counters
    }
}
