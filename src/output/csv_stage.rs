use std::io::Write;

use crate::error::{CliError, CliResult};
use crate::output::{OutputSink, OutputStage, SourceRegistry};
use crate::proxy::RecordProxy;

/// `--csv` output: a record's original raw bytes already are a well-formed
/// CSV row (they were split into fields by `CsvInputStage` on the way in
/// without rewriting the row itself), so publishing is the same
/// "bytes, then line terminator" framing as `DelimitedOutputStage` — the
/// distinct type exists so `pipeline.rs` can name the CSV path explicitly
/// and carry a CSV-flavored header row (column names, not an arbitrary
/// header record).
pub struct CsvOutputStage<W: Write> {
    writer: W,
    headers: Option<csv::ByteRecord>,
    sink: OutputSink,
}

impl<W: Write> CsvOutputStage<W> {
    pub fn new(writer: W, headers: Option<csv::ByteRecord>) -> Self {
        CsvOutputStage {
            writer,
            headers,
            sink: OutputSink::new(),
        }
    }
}

impl<W: Write> OutputStage for CsvOutputStage<W> {
    fn open(&mut self) -> CliResult<()> {
        if let Some(headers) = self.headers.take() {
            let mut line = headers.iter().collect::<Vec<_>>().join(&b","[..]);
            line.push(b'\n');
            self.writer.write_all(&line).map_err(CliError::from)?;
        }
        Ok(())
    }

    fn publish(&mut self, proxy: &RecordProxy, registry: &mut SourceRegistry) -> CliResult<()> {
        self.sink.check(proxy)?;
        let bytes = registry.read(proxy)?;
        self.writer.write_all(&bytes).map_err(CliError::from)?;
        self.writer.write_all(b"\n").map_err(CliError::from)?;
        Ok(())
    }

    fn close(&mut self) -> CliResult<()> {
        self.writer.flush().map_err(CliError::from)
    }
}
