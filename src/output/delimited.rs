use std::io::Write;

use crate::error::{CliError, CliResult};
use crate::output::{OutputSink, OutputStage, SourceRegistry};
use crate::proxy::RecordProxy;

/// `--variableOutput B…`: writes each published record's raw bytes followed
/// by a delimiter byte, mirroring `DelimitedInputStage`'s framing.
pub struct DelimitedOutputStage<W: Write> {
    writer: W,
    delimiter: u8,
    header: Option<Vec<u8>>,
    sink: OutputSink,
}

impl<W: Write> DelimitedOutputStage<W> {
    pub fn new(writer: W, delimiter: u8, header: Option<Vec<u8>>) -> Self {
        DelimitedOutputStage {
            writer,
            delimiter,
            header,
            sink: OutputSink::new(),
        }
    }
}

impl<W: Write> OutputStage for DelimitedOutputStage<W> {
    fn open(&mut self) -> CliResult<()> {
        if let Some(header) = self.header.take() {
            self.writer.write_all(&header).map_err(CliError::from)?;
            self.writer.write_all(&[self.delimiter]).map_err(CliError::from)?;
        }
        Ok(())
    }

    fn publish(&mut self, proxy: &RecordProxy, registry: &mut SourceRegistry) -> CliResult<()> {
        self.sink.check(proxy)?;
        let bytes = registry.read(proxy)?;
        self.writer.write_all(&bytes).map_err(CliError::from)?;
        self.writer.write_all(&[self.delimiter]).map_err(CliError::from)?;
        Ok(())
    }

    fn close(&mut self) -> CliResult<()> {
        self.writer.flush().map_err(CliError::from)
    }
}
