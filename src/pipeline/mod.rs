//! The per-run pipeline: discover captures, load the dissector schema,
//! dissect and transform each file, and flush the writer.

mod dissector;

pub use dissector::Dissector;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use pdmldb_core::fixup::{load_builtin_rules, load_rules};
use pdmldb_core::writer::WriterStats;
use pdmldb_core::{
    DbWriter, Error, FixupEngine, PacketTransformer, WriteFilter, WriterConfig,
};

use crate::backend::AnyBackend;
use crate::cli::Args;

/// Capture file extensions picked up from an input directory.
const CAPTURE_EXTENSIONS: [&str; 3] = ["pcap", "pcapng", "cap"];

/// Per-run counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    pub files: u64,
    pub packets: u64,
    pub rows: u64,
    pub writer: WriterStats,
}

/// Find the captures under `input` (a file, or a directory scanned for
/// known extensions), sorted for deterministic order.
pub fn discover_captures(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let entries = std::fs::read_dir(input)
        .with_context(|| format!("unreadable input directory {}", input.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.context("reading input directory")?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| CAPTURE_EXTENSIONS.contains(&e.as_str()));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Run the full pipeline described by the CLI arguments.
pub fn run(args: &Args) -> Result<RunStats> {
    let mut fixups = FixupEngine::new();
    let builtin = load_builtin_rules(&mut fixups).context("loading built-in fixup rules")?;
    info!(rules = builtin, "built-in fixup rules loaded");
    if let Some(path) = &args.fixups {
        let file = File::open(path)
            .with_context(|| format!("cannot open fixup rule file {}", path.display()))?;
        let extra = load_rules(BufReader::new(file), &mut fixups)
            .with_context(|| format!("invalid fixup rule file {}", path.display()))?;
        info!(rules = extra, file = %path.display(), "external fixup rules loaded");
    }

    let filter = match &args.filter {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open filter file {}", path.display()))?;
            WriteFilter::from_reader(BufReader::new(file))
                .with_context(|| format!("invalid filter file {}", path.display()))?
        }
        None => WriteFilter::allow_all(),
    };

    // fatal: database unreachable at first connect
    let backend = AnyBackend::connect(&args.database)
        .with_context(|| format!("cannot connect to database {}", args.database))?;

    // fatal: missing or broken dissector binary
    let dissector = Dissector::new(&args.dissector);
    let schema = dissector.load_schema()?;

    let files = discover_captures(&args.input)?;
    if files.is_empty() {
        bail!("no capture files found under {}", args.input.display());
    }

    let config = WriterConfig {
        backlog: args.backlog,
        foreign_keys: !args.no_foreign_keys,
        skip_binary_columns: args.skip_bytes,
    };
    let writer = DbWriter::spawn(backend, filter, config);
    let transformer = PacketTransformer::new(&schema, &fixups);

    let mut stats = RunStats::default();
    for file in &files {
        info!(file = %file.display(), "dissecting");
        let sidecar = match dissector.dissect(file) {
            Ok(path) => path,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "skipping file");
                continue;
            }
        };
        let source = match std::fs::canonicalize(file) {
            Ok(abs) => abs.display().to_string(),
            Err(_) => file.display().to_string(),
        };
        let reader = match File::open(&sidecar) {
            Ok(f) => BufReader::new(f),
            Err(err) => {
                warn!(file = %sidecar.display(), error = %err, "cannot read side-car, skipping");
                continue;
            }
        };
        match transformer.transform(&source, reader, writer.queue()) {
            Ok(file_stats) => {
                stats.files += 1;
                stats.packets += file_stats.packets;
                stats.rows += file_stats.rows;
            }
            Err(Error::Writer(err)) => {
                // the writer refused the row: nothing more will land
                return Err(err).context("database writer failed");
            }
            Err(err) => {
                warn!(file = %file.display(), error = %err, "skipping file");
            }
        }
    }

    stats.writer = writer.flush().context("flushing database writer")?;
    info!(
        files = stats.files,
        packets = stats.packets,
        rows = stats.writer.rows_written,
        truncated = stats.writer.truncated_values,
        "load complete"
    );
    Ok(stats)
}
