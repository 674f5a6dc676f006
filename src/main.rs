//! CLI entry point for `emlexport`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use emlexport::config::Config;
use emlexport::export::{ExportOptions, ExportStats, Exporter};
use emlexport::mime::sniff::{sniff, Sniffed};

#[derive(Parser)]
#[command(
    name = "emlexport",
    version,
    about = "Export a mailbox folder tree to standalone .eml files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every folder of a mailbox directory or .mbox file
    Export {
        /// Mailbox directory or .mbox file
        source: PathBuf,
        /// Output root (defaults to export.output_dir, then ./eml-export)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Identify files by content and print their MIME type and extension
    Sniff {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = emlexport::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Export {
            source,
            output,
            json,
        } => cmd_export(&source, output, json, &config),
        Commands::Sniff { files, json } => cmd_sniff(&files, json),
        Commands::Config { init } => cmd_config(init, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = emlexport::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "emlexport.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "emlexport", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Export a mailbox tree.
fn cmd_export(
    source_path: &Path,
    output: Option<PathBuf>,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let output = output
        .or_else(|| config.export.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("eml-export"));

    let source = emlexport::source::open(source_path)?;
    let exporter = Exporter::new(
        source.as_ref(),
        &output,
        ExportOptions::from(&config.export),
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Exporting {msg} [{elapsed_precise}]")
            .expect("valid template"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    let stats = exporter.run(Some(&|folder: &str, processed: usize| {
        pb.set_message(format!("{folder}: {processed} message(s)"));
    }))?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if json {
        print_export_json(source_path, exporter.output_root(), &stats, elapsed)?;
    } else {
        print_export_table(source_path, exporter.output_root(), &stats, elapsed);
    }

    Ok(())
}

/// Print export statistics in a human-readable table.
fn print_export_table(source: &Path, output: &Path, stats: &ExportStats, elapsed: Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<25} {}", "Source", source.display());
    println!("  {:<25} {}", "Output", output.display());
    println!("  {:<25} {}", "Folders", stats.folders);
    if stats.folders_failed > 0 {
        println!("  {:<25} {}", "Folders failed", stats.folders_failed);
    }
    println!("  {:<25} {}", "Messages exported", stats.messages_exported);
    println!("  {:<25} {}", "Messages failed", stats.messages_failed);
    if stats.items_skipped > 0 {
        println!("  {:<25} {}", "Unreadable items", stats.items_skipped);
    }
    println!(
        "  {:<25} {}",
        "Attachments exported", stats.attachments_exported
    );
    if stats.attachments_failed > 0 {
        println!("  {:<25} {}", "Attachments failed", stats.attachments_failed);
    }
    if stats.copy_failures > 0 {
        println!("  {:<25} {}", "Attachment copies failed", stats.copy_failures);
    }
    println!(
        "  {:<25} {}",
        "Written",
        format_size(stats.bytes_written, BINARY)
    );
    println!("  {:<25} {:.2?}", "Time", elapsed);
    println!();
}

/// Print export statistics as JSON.
fn print_export_json(
    source: &Path,
    output: &Path,
    stats: &ExportStats,
    elapsed: Duration,
) -> anyhow::Result<()> {
    let summary = serde_json::json!({
        "source": source.to_string_lossy(),
        "output": output.to_string_lossy(),
        "stats": stats,
        "elapsed_ms": elapsed.as_millis(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// One `sniff --json` entry.
#[derive(Serialize)]
struct SniffReport<'a> {
    file: &'a Path,
    size: u64,
    #[serde(flatten)]
    sniffed: Sniffed,
}

/// Sniff files by content and print the result.
fn cmd_sniff(files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let data = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        results.push((path, data.len() as u64, sniff(&data, name.as_deref())));
    }

    if json {
        let items: Vec<SniffReport> = results
            .iter()
            .map(|(path, size, sniffed)| SniffReport {
                file: path,
                size: *size,
                sniffed: *sniffed,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        use humansize::{format_size, BINARY};
        for (path, size, sniffed) in &results {
            let ext = if sniffed.extension.is_empty() {
                "-"
            } else {
                sniffed.extension
            };
            println!(
                "  {:<40} {:>10} {:<6} {}",
                path.display(),
                format_size(*size, BINARY),
                ext,
                sniffed.mime_type
            );
        }
    }
    Ok(())
}

/// Show or initialize the configuration file.
fn cmd_config(init: bool, config: &Config) -> anyhow::Result<()> {
    let path = emlexport::config::config_file_path();

    if init {
        if let Some(ref p) = path {
            if p.exists() {
                anyhow::bail!("Config file already exists: {}", p.display());
            }
        }
        let written = emlexport::config::save_config(&Config::default())?;
        println!("  Wrote default config to {}", written.display());
        return Ok(());
    }

    match path {
        Some(p) => println!("# {}", p.display()),
        None => println!("# (no config directory on this system)"),
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
