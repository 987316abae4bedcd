use clap::{Parser, ValueEnum};
use logsplit::{init_tracing_once, Compression, LogSplitter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Codec {
    None,
    Zstd,
}

/// Split a JSON-lines log into one file per day, named `<prefix>-YYYY-MM-DD`.
#[derive(Parser)]
#[command(name = "logsplit", version, about)]
struct Cli {
    /// Input log (one JSON object per line; `.zst` is decoded)
    #[arg(short, long)]
    input: PathBuf,
    /// Output prefix; defaults to the input path without `.json.1`-style suffixes
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Timestamp field, or a JSON pointer such as `/meta/time`
    #[arg(short = 'f', long, default_value = "asctime")]
    field: String,
    /// Extra timestamp format (`time` syntax), tried before the built-in ones; repeatable
    #[arg(long = "format")]
    formats: Vec<String>,
    /// Maximum number of output files held open at once
    #[arg(short = 'k', long, default_value_t = 128)]
    max_open: usize,
    /// Threads used to parse records (1 = sequential)
    #[arg(short = 'j', long, default_value_t = 1)]
    threads: usize,
    /// Records per parse batch when `--threads` > 1
    #[arg(long, default_value_t = 8192)]
    batch: usize,
    /// Output compression
    #[arg(long, value_enum, default_value_t = Codec::None)]
    compress: Codec,
    /// zstd level used with `--compress zstd`
    #[arg(long, default_value_t = 3)]
    zstd_level: i32,
    /// Append skipped lines to `<prefix>.rejected`
    #[arg(long)]
    rejects: bool,
    /// Write a JSON run report here
    #[arg(long)]
    report: Option<PathBuf>,
    /// Show a progress bar
    #[arg(long)]
    progress: bool,
    /// Label shown next to the progress bar
    #[arg(long)]
    progress_label: Option<String>,
    /// Input read buffer in bytes (min 8 KiB)
    #[arg(long, default_value_t = 256 * 1024)]
    read_buffer: usize,
    /// Per-file write buffer in bytes (min 8 KiB)
    #[arg(long, default_value_t = 64 * 1024)]
    write_buffer: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing_once();

    let compression = match cli.compress {
        Codec::None => Compression::None,
        Codec::Zstd => Compression::Zstd { level: cli.zstd_level },
    };

    let mut splitter = LogSplitter::new()
        .input(&cli.input)
        .timestamp_field(cli.field)
        .timestamp_formats(cli.formats)
        .max_open_files(cli.max_open)
        .parallelism(cli.threads)
        .batch_size(cli.batch)
        .compression(compression)
        .rejects(cli.rejects)
        .progress(cli.progress)
        .io_read_buffer(cli.read_buffer)
        .io_write_buffer(cli.write_buffer);
    if let Some(out) = &cli.output {
        splitter = splitter.output_prefix(out);
    }
    if let Some(report) = &cli.report {
        splitter = splitter.report_path(report);
    }
    if let Some(label) = cli.progress_label {
        splitter = splitter.progress_label(label);
    }

    match splitter.run() {
        Ok(report) => {
            eprintln!("{}", report.counters);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("logsplit: {e:#}");
            ExitCode::FAILURE
        }
    }
}
