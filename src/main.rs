use ccvalid::files::CcType;
use ccvalid::io_stream::PackageReader;
use ccvalid::sweep::{Sweep, SweepOptions};
use ccvalid::validator;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "ccvalid", about = "Validate DBPF .package files in a mods folder")]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every file below a directory, copying the good ones
    Sweep {
        #[arg(short, long)]
        directory: PathBuf,
        #[arg(short, long)]
        outdir: Option<PathBuf>,
        /// Skip validation for a file kind (repeatable)
        #[arg(short, long, value_enum)]
        skip: Vec<CcType>,
        /// Don't copy skipped files to the output directory
        #[arg(short = 'S', long)]
        dont_write_skipped: bool,
        /// Don't copy anything
        #[arg(short = 't', long)]
        dry_run: bool,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate individual package files
    Check {
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Show decoded header and directory of a package
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {

        // ── Sweep ────────────────────────────────────────────────────────────
        Commands::Sweep { directory, outdir, skip, dont_write_skipped, dry_run, json } => {
            let opts = SweepOptions {
                output_dir:    outdir,
                skip,
                write_skipped: !dont_write_skipped,
                dry_run,
            };
            let report = Sweep::new(opts).run(&directory)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for v in report.files.iter().filter(|v| v.error.is_some()) {
                    if let Some(err) = &v.error {
                        println!("  FAIL  {}  {}: {}", v.path.display(), err.kind, err.detail);
                    }
                }
                println!("{}", report.summary());
            }
            if report.has_failures() {
                std::process::exit(1);
            }
        }

        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { input } => {
            let mut failed = 0usize;
            for path in &input {
                match validator::validate(path) {
                    Ok(()) => println!("  ok    {}", path.display()),
                    Err(err) => {
                        failed += 1;
                        println!("  FAIL  {}  {}: {}", path.display(), err.kind, err.detail);
                    }
                }
            }
            if failed > 0 {
                std::process::exit(1);
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let mut reader = PackageReader::new(BufReader::new(File::open(&input)?));
            let h = reader.read_header()?;

            println!("── DBPF package ─────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Signature      {} ({})", hex::encode(h.signature), String::from_utf8_lossy(&h.signature));
            println!("  Format version {}.{}", h.major_format_version, h.minor_format_version);
            println!("  File version   {}.{}", h.major_file_version, h.minor_file_version);
            println!("  Constants      {} / {}", h.constant_one, h.constant_three);
            println!("  Index entries  {}", h.index_count);
            println!("  Index offset   {} (short) / {} (long)", h.index_offset_short, h.index_offset_long);
            println!("  Index size     {} B", h.index_size);

            if let Err(err) = validator::validate_header(&h) {
                println!("  Header invalid: {err}");
                return Ok(());
            }

            let entries = reader.entries(&h)?;
            let flags = entries.flags();
            println!("  Flags          {:#x} (type {}, group {}, instance {})",
                     flags.raw, flags.constant_type, flags.constant_group, flags.constant_instance);
            println!("{:<10} {:<10} {:<18} {:>10} {:>10} {:>10}  Ext",
                     "Type", "Group", "Instance", "Offset", "Size", "Raw size");
            for entry in entries {
                let e = entry?;
                let key = |v: Option<u32>| v.map(|v| hex::encode(v.to_be_bytes())).unwrap_or_else(|| "-".into());
                let instance = match e.instance() {
                    Some(i) => hex::encode(i.to_be_bytes()),
                    None    => format!("--------{}", hex::encode(e.instance_lo.to_be_bytes())),
                };
                let ext = e.extended
                    .map(|x| format!("{:#06x}/{}", x.compression_type, x.committed))
                    .unwrap_or_default();
                println!("{:<10} {:<10} {:<18} {:>10} {:>10} {:>10}  {}",
                         key(e.type_id), key(e.group_id), instance,
                         e.resource_offset, e.compressed_size, e.uncompressed_size, ext);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

