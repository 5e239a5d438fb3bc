use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use minidump_fulldump::full_dumpize;

#[derive(Parser, Debug)]
#[command(
    name = "minidump-convert",
    about = "Rewrite a partial minidump into a full-memory dump with coalesced memory ranges."
)]
struct Args {
    /// Input minidump path
    input: PathBuf,

    /// Output path (defaults to "<input stem>-full.dmp")
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Suppress the conversion summary
    #[arg(long, action = clap::ArgAction::SetTrue)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    run(Args::parse())
}

fn run(args: Args) -> anyhow::Result<()> {
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    if output_path == args.input {
        bail!("output path equals input path: {}", output_path.display());
    }

    let input = File::open(&args.input)
        .with_context(|| format!("open input {}", args.input.display()))?;
    let output = File::create(&output_path)
        .with_context(|| format!("create output {}", output_path.display()))?;

    let summary = match full_dumpize(input, output) {
        Ok((_, summary)) => summary,
        Err(err) => {
            // A partially written output is not a valid dump.
            let _ = fs::remove_file(&output_path);
            return Err(err).with_context(|| format!("convert {}", args.input.display()));
        }
    };

    if !args.quiet {
        match summary.merge {
            Some(stats) => println!(
                "{}: {} streams; {} memory ranges merged into {} ({} bytes)",
                output_path.display(),
                summary.streams_written,
                stats.source_ranges,
                stats.merged_ranges,
                stats.payload_bytes,
            ),
            None => println!(
                "{}: {} streams; input carried no memory list",
                output_path.display(),
                summary.streams_written,
            ),
        }
    }
    Ok(())
}

/// `<stem>-full<ext>`, appending `.dmp` when the input extension is not
/// already `.dmp`: `app.dmp` → `app-full.dmp`, `app.mdmp` →
/// `app-full.mdmp.dmp`, `app` → `app-full.dmp`.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dump");
    let file_name = match input.extension().and_then(|s| s.to_str()) {
        Some("dmp") => format!("{stem}-full.dmp"),
        Some(other) => format!("{stem}-full.{other}.dmp"),
        None => format!("{stem}-full.dmp"),
    };
    input.with_file_name(file_name)
}
