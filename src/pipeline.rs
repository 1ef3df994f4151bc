use std::fs;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use crate::cli::{self, Args};
use crate::codec::KeyCodec;
use crate::columns::{resolve_order_by, reverse_key_parts, KeyPart};
use crate::config::{RunConfig, DEFAULT_MAX_KEY_BYTES};
use crate::dedup::{DuplicateDisposition, DuplicateFilter};
use crate::error::{CliError, CliResult};
use crate::input::{
    ConcatInputStage, CsvInputStage, DelimitedInputStage, FixedInputStage, InputStage, RecordPipeline,
};
use crate::orchestrator::{MergeOrchestrator, RunOutcome};
use crate::output::{
    CsvOutputStage, DelimitedOutputStage, FileRecordSource, FixedOutputStage, MemoryRecordSource, OutputStage,
    RecordSource, SourceRegistry,
};
use crate::util;

/// Wires parsed `Args` into concrete `InputStage`/`OutputStage` instances
/// and hands them to `MergeOrchestrator`. This is the one place in the
/// crate that knows both the CLI surface and the core's capability seams;
/// everything it builds is a thin, concrete realization of those seams.
/// Returns the `RunOutcome` the orchestrator produced, so a caller (or a
/// test) can check invariant 7 (§8) against real counters instead of just
/// the published count.
pub fn run(argv: &[&str]) -> CliResult<RunOutcome> {
    let args = cli::parse(argv)?;
    args.copy_mode()?;

    // --copy's no-keys mode (spec.md §6: `ByKey`/`Reverse` ordering the
    // whole record with no declared columns) is not implemented — see
    // SPEC_FULL.md §6 and DESIGN.md — so --columnsIn/--orderBy are always
    // required here, not just defaulted.
    let layout = match &args.flag_columns_in {
        Some(spec) => cli::parse_columns_in(spec)?,
        None => {
            return Err(CliError::Config(
                "--columnsIn is required (this build has no no-keys --copy mode)".into(),
            ))
        }
    };
    let order_by_spec = args.flag_order_by.as_deref().ok_or_else(|| {
        CliError::Config("--orderBy is required (this build has no no-keys --copy mode)".into())
    })?;
    let order_by_pairs = cli::parse_order_by(order_by_spec)?;
    let duplicate_disposition = args.duplicate_disposition()?;
    let mut key_parts = resolve_order_by(&layout, &order_by_pairs)?;
    if duplicate_disposition == DuplicateDisposition::Reverse {
        reverse_key_parts(&mut key_parts);
    }

    let config = RunConfig::default()
        .with_power(args.flag_power)?
        .with_row_max_hint(args.flag_row_max)
        .with_work_directory(&args.flag_work_directory)
        .with_disk_work(args.flag_disk_work)
        .with_no_cache_input(args.flag_no_cache_input)
        .with_syntax_only(args.flag_syntax_only);
    config.validate_capacity()?;

    let input_names = args.input_file_names();
    if args.flag_replace && input_names.len() != 1 {
        return Err(CliError::Config(
            "--replace requires exactly one --inputFileName".into(),
        ));
    }
    if input_names.is_empty() && args.flag_no_cache_input {
        return Err(CliError::Config(
            "--noCacheInput cannot be combined with stdin input, since --copy Original needs to \
             re-read stdin's bytes after the fact; provide --inputFileName instead"
                .into(),
        ));
    }

    if config.syntax_only() {
        return Ok(RunOutcome::default());
    }

    let delimiter_in = Args::delimiter_byte(&args.flag_variable_input, "--variableInput")?;
    let delimiter_out = Args::delimiter_byte(&args.flag_variable_output, "--variableOutput")?;
    let csv_delimiter = Args::delimiter_byte(&args.flag_csv_delimiter, "--csvDelimiter")?;

    let mut registry = SourceRegistry::new();
    let (input, header) = build_input(
        &args,
        &input_names,
        key_parts,
        duplicate_disposition.negates_ordinal(),
        delimiter_in,
        &mut registry,
    )?;

    let replace_target = if args.flag_replace {
        Some(PathBuf::from(&input_names[0]))
    } else {
        None
    };

    let mut output = build_output(&args, header, delimiter_out, csv_delimiter, replace_target.as_deref())?;

    let orchestrator = MergeOrchestrator::new(config);
    let dedup = DuplicateFilter::new(duplicate_disposition);
    let outcome = orchestrator.run(input, dedup, output.stage_mut(), &mut registry)?;
    log::info!(
        target: "tapesort",
        "tapesort run complete: {} records published ({} read, {} selected, {} filtered, {} duplicates dropped)",
        outcome.published, outcome.counters.read, outcome.counters.selected, outcome.counters.filtered,
        outcome.duplicates_dropped
    );

    output.finish(replace_target.as_deref())?;

    Ok(outcome)
}

/// A `RecordSource` whose positions are reported relative to a body with
/// its leading header already carved out; this shifts every read back to
/// where those bytes actually live in the untouched original.
struct OffsetRecordSource {
    inner: Box<dyn RecordSource>,
    offset: u64,
}

impl RecordSource for OffsetRecordSource {
    fn read_at(&mut self, position: u64, size: u32) -> CliResult<Vec<u8>> {
        self.inner.read_at(position + self.offset, size)
    }
}

fn register_source(registry: &mut SourceRegistry, source: Box<dyn RecordSource>, header_offset: u64) -> u32 {
    if header_offset == 0 {
        registry.register(source)
    } else {
        registry.register(Box::new(OffsetRecordSource {
            inner: source,
            offset: header_offset,
        }))
    }
}

fn build_input(
    args: &Args,
    input_names: &[String],
    key_parts: Vec<KeyPart>,
    negate_ordinal: bool,
    delimiter_in: u8,
    registry: &mut SourceRegistry,
) -> CliResult<(Box<dyn InputStage>, Option<Vec<u8>>)> {
    let record_separator = if args.flag_csv { b'\n' } else { delimiter_in };

    if input_names.is_empty() {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer).map_err(CliError::from)?;
        let (header, rest) = take_header(&buffer, args, record_separator);
        let header_offset = header_byte_len(args, &header);
        let rest = rest.to_vec();

        let source_index = register_source(registry, Box::new(MemoryRecordSource::new(buffer)), header_offset);
        let codec = KeyCodec::new(key_parts, DEFAULT_MAX_KEY_BYTES);
        let pipeline = build_pipeline(args, codec, source_index, negate_ordinal)?;
        let stage = build_stage(args, rest, pipeline, delimiter_in)?;
        return Ok((stage, header));
    }

    let mut header = None;
    let mut stages: Vec<Box<dyn InputStage>> = Vec::with_capacity(input_names.len());

    for (i, name) in input_names.iter().enumerate() {
        let bytes = fs::read(name).map_err(CliError::from)?;
        let codec = KeyCodec::new(key_parts.clone(), DEFAULT_MAX_KEY_BYTES);

        let (body, header_offset) = if i == 0 {
            let (h, rest) = take_header(&bytes, args, record_separator);
            let offset = header_byte_len(args, &h);
            header = h;
            (rest.to_vec(), offset)
        } else {
            (bytes, 0)
        };

        let source_index = register_source(registry, Box::new(FileRecordSource::new(name.clone())), header_offset);
        let pipeline = build_pipeline(args, codec, source_index, negate_ordinal)?;
        let stage = build_stage(args, body, pipeline, delimiter_in)?;
        stages.push(stage);
    }

    if stages.len() == 1 {
        Ok((stages.into_iter().next().unwrap(), header))
    } else {
        Ok((Box::new(ConcatInputStage::new(stages)), header))
    }
}

/// Number of raw bytes `take_header` consumed from the front of the
/// original record stream: the header's own bytes, plus the separator
/// that followed it (fixed-width input has no separator to account for).
fn header_byte_len(args: &Args, header: &Option<Vec<u8>>) -> u64 {
    match header {
        None => 0,
        Some(h) => {
            if args.flag_fixed_in.is_some() {
                h.len() as u64
            } else {
                h.len() as u64 + 1
            }
        }
    }
}

fn build_pipeline(
    args: &Args,
    codec: KeyCodec,
    source_index: u32,
    negate_ordinal: bool,
) -> CliResult<RecordPipeline> {
    let r#where = args.where_predicate()?;
    let stop_when = args.stop_when_predicate()?;
    Ok(RecordPipeline::new(codec, source_index)
        .with_where(r#where)
        .with_stop_when(stop_when)
        .with_ordinal_sign(negate_ordinal))
}

/// Carve the leading header record out of `bytes` if `--headerIn` is set,
/// returning `(header, remainder)`. Always done out-of-band, over raw
/// bytes, so every framing (including CSV) hands its concrete `InputStage`
/// an already-headerless body and `has_headers(false)` uniformly.
fn take_header<'a>(bytes: &'a [u8], args: &Args, record_separator: u8) -> (Option<Vec<u8>>, &'a [u8]) {
    if !args.flag_header_in {
        return (None, bytes);
    }
    if let Some(n) = args.flag_fixed_in {
        if bytes.len() >= n {
            return (Some(bytes[..n].to_vec()), &bytes[n..]);
        }
        return (None, bytes);
    }
    match bytes.iter().position(|&b| b == record_separator) {
        Some(pos) => (Some(bytes[..pos].to_vec()), &bytes[pos + 1..]),
        None => (Some(bytes.to_vec()), &bytes[bytes.len()..]),
    }
}

fn build_stage(
    args: &Args,
    body: Vec<u8>,
    pipeline: RecordPipeline,
    delimiter_in: u8,
) -> CliResult<Box<dyn InputStage>> {
    if let Some(n) = args.flag_fixed_in {
        let stage = FixedInputStage::new(io::Cursor::new(body), n, pipeline)?;
        Ok(Box::new(stage))
    } else if args.flag_csv {
        let csv_delimiter = Args::delimiter_byte(&args.flag_csv_delimiter, "--csvDelimiter")?;
        let stage = CsvInputStage::new(csv_delimiter, io::Cursor::new(body), pipeline)?;
        Ok(Box::new(stage))
    } else {
        let stage = DelimitedInputStage::new(BufReader::new(io::Cursor::new(body)), delimiter_in, pipeline);
        Ok(Box::new(stage))
    }
}

fn build_output(
    args: &Args,
    header: Option<Vec<u8>>,
    delimiter_out: u8,
    csv_delimiter: u8,
    replace_target: Option<&Path>,
) -> CliResult<FileOutputHandle> {
    let header_for_output = if args.flag_header_out { header } else { None };

    if let Some(target) = replace_target {
        let file_name = target.file_name().unwrap_or_default().to_string_lossy().into_owned();
        let temp_path = target.with_file_name(format!(".{}.tapesort-tmp-{}", file_name, util::random_suffix()));
        let writer = BufWriter::new(fs::File::create(&temp_path).map_err(CliError::from)?);
        let stage = build_concrete_output(args, writer, header_for_output, delimiter_out, csv_delimiter)?;
        return Ok(FileOutputHandle {
            stage,
            temp_path: Some(temp_path),
        });
    }

    if let Some(path) = &args.flag_output_file_name {
        let writer = BufWriter::new(fs::File::create(path).map_err(CliError::from)?);
        let stage = build_concrete_output(args, writer, header_for_output, delimiter_out, csv_delimiter)?;
        return Ok(FileOutputHandle { stage, temp_path: None });
    }

    let writer = BufWriter::new(io::stdout());
    let stage = build_concrete_output(args, writer, header_for_output, delimiter_out, csv_delimiter)?;
    Ok(FileOutputHandle { stage, temp_path: None })
}

fn build_concrete_output<W: io::Write + 'static>(
    args: &Args,
    writer: W,
    header: Option<Vec<u8>>,
    delimiter_out: u8,
    csv_delimiter: u8,
) -> CliResult<Box<dyn OutputStage>> {
    if args.flag_csv {
        let headers = header.map(|h| {
            let fields: Vec<&[u8]> = h.split(|&b| b == csv_delimiter).collect();
            csv::ByteRecord::from(fields)
        });
        Ok(Box::new(CsvOutputStage::new(writer, headers)))
    } else if args.flag_fixed_out.is_some() {
        Ok(Box::new(FixedOutputStage::new(writer, header)))
    } else {
        Ok(Box::new(DelimitedOutputStage::new(writer, delimiter_out, header)))
    }
}

/// Owns the concrete `OutputStage` plus, under `--replace`, the temp file
/// path it is really writing to; `finish` renames that temp file over the
/// original input only after the orchestrator's `close()` has flushed it.
struct FileOutputHandle {
    stage: Box<dyn OutputStage>,
    temp_path: Option<PathBuf>,
}

impl FileOutputHandle {
    fn stage_mut(&mut self) -> &mut dyn OutputStage {
        self.stage.as_mut()
    }

    fn finish(self, replace_target: Option<&Path>) -> CliResult<()> {
        if let (Some(temp_path), Some(target)) = (&self.temp_path, replace_target) {
            fs::rename(temp_path, target).map_err(CliError::from)?;
        }
        Ok(())
    }
}
