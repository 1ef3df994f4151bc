use crate::error::CliResult;

/// Capability seam behind `--formatOut`/`--count`/`--sum`/`--min`/`--max`/
/// `--avg`: a record's published bytes, or a terminal aggregate over the
/// whole run, pass through this trait rather than the orchestrator knowing
/// anything about reformatting or reduction. Full expression-driven
/// reformatting and aggregation are out of scope for this core; only the
/// identity realization ships.
pub trait OutputFormatter {
    fn format(&self, bytes: &[u8]) -> CliResult<Vec<u8>>;
}

/// The only concrete `OutputFormatter` this crate ships: publishes a
/// record's bytes unchanged, which is what every `--formatOut`-less run
/// (i.e. every run today, since the flag is accepted but not evaluated)
/// actually does.
pub struct IdentityFormatter;

impl OutputFormatter for IdentityFormatter {
    fn format(&self, bytes: &[u8]) -> CliResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}
