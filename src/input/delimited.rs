use std::io::BufRead;

use crate::codec::RecordView;
use crate::error::{CliError, CliResult};
use crate::input::{Admission, InputCounters, InputStage, RecordPipeline};
use crate::proxy::{ProxyPool, RecordProxy};

/// `--variableInput B…`: records are separated by a delimiter byte
/// (default `\n`). Reimplemented directly over `std::io::BufRead` rather
/// than the teacher's `simd_csv::LineReader`, since that crate's line
/// reader is not part of this crate's dependency stack.
pub struct DelimitedInputStage<R: BufRead> {
    reader: R,
    delimiter: u8,
    position: u64,
    pipeline: RecordPipeline,
}

impl<R: BufRead> DelimitedInputStage<R> {
    pub fn new(reader: R, delimiter: u8, pipeline: RecordPipeline) -> Self {
        DelimitedInputStage {
            reader,
            delimiter,
            position: 0,
            pipeline,
        }
    }

    /// Consume `count` leading records as a header, discarding them
    /// without running them through WHERE/STOP/KeyCodec (§4.3 step 2).
    pub fn skip_header(&mut self, count: usize) -> CliResult<()> {
        for _ in 0..count {
            let mut buf = Vec::new();
            let n = self
                .reader
                .read_until(self.delimiter, &mut buf)
                .map_err(CliError::from)?;
            if n == 0 {
                break;
            }
            self.position += n as u64;
        }
        Ok(())
    }

    fn read_one(&mut self) -> CliResult<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let n = self
            .reader
            .read_until(self.delimiter, &mut buf)
            .map_err(CliError::from)?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&self.delimiter) {
            buf.pop();
        }
        Ok(Some(buf))
    }
}

impl<R: BufRead> InputStage for DelimitedInputStage<R> {
    fn next(&mut self, pool: &mut ProxyPool) -> CliResult<Option<RecordProxy>> {
        loop {
            let position = self.position;
            let Some(record) = self.read_one()? else {
                return Ok(None);
            };
            self.position += record.len() as u64 + 1;

            let view = RecordView::raw(&record);
            match self.pipeline.admit(&view, record.len() as u32, position, pool)? {
                Admission::Proxy(p) => return Ok(Some(p)),
                Admission::Filtered => continue,
                Admission::Stop => return Ok(None),
            }
        }
    }

    fn reset(&mut self) -> CliResult<()> {
        Err(CliError::Internal(
            "DelimitedInputStage does not support reset on a non-seekable reader".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::KeyCodec;
    use crate::columns::{ColumnDef, Direction, FieldType, KeyPart};
    use std::io::Cursor;

    fn pipeline() -> RecordPipeline {
        let parts = vec![KeyPart::new(
            ColumnDef::new("name", FieldType::String, 0, 6).unwrap(),
            Direction::Asc,
        )];
        RecordPipeline::new(KeyCodec::new(parts, 256), 0)
    }

    #[test]
    fn s1_string_ascending_over_newline_delimited_input() {
        let data = b"banana\napple \ncherry\n".to_vec();
        let mut stage = DelimitedInputStage::new(Cursor::new(data), b'\n', pipeline());
        let mut pool = ProxyPool::new();

        let mut proxies = Vec::new();
        while let Some(p) = stage.next(&mut pool).unwrap() {
            proxies.push(p);
        }
        proxies.sort();
        assert_eq!(proxies.len(), 3);
        assert!(proxies[0].key < proxies[1].key);
        assert!(proxies[1].key < proxies[2].key);
    }

    #[test]
    fn skip_header_discards_leading_records() {
        let data = b"HEADER\nbanana\napple \n".to_vec();
        let mut stage = DelimitedInputStage::new(Cursor::new(data), b'\n', pipeline());
        stage.skip_header(1).unwrap();
        let mut pool = ProxyPool::new();
        let mut count = 0;
        while stage.next(&mut pool).unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
