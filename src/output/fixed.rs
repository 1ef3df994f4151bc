use std::io::Write;

use crate::error::{CliError, CliResult};
use crate::output::{OutputSink, OutputStage, SourceRegistry};
use crate::proxy::RecordProxy;

/// `--fixedOut`: writes each published record's raw bytes back to back,
/// with no delimiter, mirroring `FixedInputStage`'s framing on the way in.
pub struct FixedOutputStage<W: Write> {
    writer: W,
    header: Option<Vec<u8>>,
    sink: OutputSink,
}

impl<W: Write> FixedOutputStage<W> {
    pub fn new(writer: W, header: Option<Vec<u8>>) -> Self {
        FixedOutputStage {
            writer,
            header,
            sink: OutputSink::new(),
        }
    }
}

impl<W: Write> OutputStage for FixedOutputStage<W> {
    fn open(&mut self) -> CliResult<()> {
        if let Some(header) = self.header.take() {
            self.writer.write_all(&header).map_err(CliError::from)?;
        }
        Ok(())
    }

    fn publish(&mut self, proxy: &RecordProxy, registry: &mut SourceRegistry) -> CliResult<()> {
        self.sink.check(proxy)?;
        let bytes = registry.read(proxy)?;
        self.writer.write_all(&bytes).map_err(CliError::from)?;
        Ok(())
    }

    fn close(&mut self) -> CliResult<()> {
        self.writer.flush().map_err(CliError::from)
    }
}
