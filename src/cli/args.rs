//! Command-line argument definitions.

use clap::Parser;
use std::path::PathBuf;

/// Load packet captures into a relational database via an external
/// dissector.
#[derive(Parser, Debug)]
#[command(name = "pdmldb")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Capture file, or directory of captures (.pcap, .pcapng, .cap)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Target database: a SQLite file path or a mysql:// URL
    #[arg(short, long, value_name = "DB")]
    pub database: String,

    /// Dissector binary to invoke
    #[arg(long, default_value = "tshark", value_name = "BIN")]
    pub dissector: PathBuf,

    /// Extra fixup rule file (augments the built-in rules)
    #[arg(long, value_name = "FILE")]
    pub fixups: Option<PathBuf>,

    /// Table/column filter file
    #[arg(long, value_name = "FILE")]
    pub filter: Option<PathBuf>,

    /// Do not create foreign keys
    #[arg(long = "no-foreign-keys")]
    pub no_foreign_keys: bool,

    /// Drop byte-sequence columns entirely
    #[arg(long = "skip-bytes")]
    pub skip_bytes: bool,

    /// Row queue backlog cap
    #[arg(long, default_value = "1000", value_name = "N")]
    pub backlog: usize,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}
