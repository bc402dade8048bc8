use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use hotver::coordinator::{ApplyOutcome, CurrentOutcome, ListOutcome, RegisterOutcome, UploadOutcome};
use hotver::{ApiResponse, Config, HotError, VersionService};

#[derive(Parser)]
#[command(name = "hotver", version, about = "Upload, mirror and publish hot-update bundles")]
struct Cli {
    /// Target platform (defaults to HOTVER_PLATFORM or wxmini)
    #[arg(long, global = true)]
    platform: Option<String>,

    /// Print the {code, msg, data} response envelope instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a <version>.zip bundle
    Upload {
        file: PathBuf,
        /// File name to validate instead of the path's own name
        #[arg(long)]
        name: Option<String>,
    },
    /// Make an uploaded version current
    Publish { version: String },
    /// Roll the current pointer to another version
    Switch { version: String },
    /// List known versions, newest first
    List,
    /// Record a version already present in storage
    Register { version: String },
    /// Show the current version
    Current,
}

enum Output {
    Upload(UploadOutcome),
    Apply(ApplyOutcome),
    List(ListOutcome),
    Register(RegisterOutcome),
    Current(CurrentOutcome),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hotver=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(output) => {
            if json {
                print_envelope(&output)?;
            } else {
                print_human(&output);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let resp: ApiResponse<()> = ApiResponse::from_error(&e);
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else {
                eprintln!("{} {}", "Error:".red().bold(), e);
            }
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<Output, HotError> {
    let config = Config::from_env()?;
    let platform = cli.platform.unwrap_or_else(|| config.platform.clone());
    let service = VersionService::from_config(config).await?;

    let output = match cli.command {
        Command::Upload { file, name } => {
            let filename = name.unwrap_or_else(|| file.to_string_lossy().into_owned());
            let data = tokio::fs::read(&file).await?;

            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
                spinner.set_style(style);
            }
            spinner.set_message(format!(
                "uploading {} ({})",
                filename,
                humansize::format_size(data.len() as u64, humansize::BINARY)
            ));
            spinner.enable_steady_tick(Duration::from_millis(100));

            let result = service.upload(&platform, &filename, Bytes::from(data)).await;
            spinner.finish_and_clear();
            Output::Upload(result?)
        }
        Command::Publish { version } => Output::Apply(service.publish(&platform, &version).await?),
        Command::Switch { version } => Output::Apply(service.switch(&platform, &version).await?),
        Command::List => Output::List(service.list(&platform).await?),
        Command::Register { version } => Output::Register(service.register(&platform, &version).await?),
        Command::Current => Output::Current(service.current(&platform).await?),
    };
    Ok(output)
}

fn envelope<T: Serialize>(data: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(&ApiResponse::ok(data)).context("Failed to encode response")
}

fn print_envelope(output: &Output) -> anyhow::Result<()> {
    let text = match output {
        Output::Upload(o) => envelope(o)?,
        Output::Apply(o) => envelope(o)?,
        Output::List(o) => envelope(o)?,
        Output::Register(o) => envelope(o)?,
        Output::Current(o) => envelope(o)?,
    };
    println!("{text}");
    Ok(())
}

fn print_human(output: &Output) {
    match output {
        Output::Upload(o) => {
            let verb = if o.overwrite { "Replaced" } else { "Uploaded" };
            println!(
                "{} version {} for {}: {} files, {}{}",
                verb.green().bold(),
                o.version.as_str().bold(),
                o.platform,
                o.extract.files,
                humansize::format_size(o.extract.bytes, humansize::BINARY),
                if o.extract.flattened { " (flattened)" } else { "" }
            );
            if !o.sync.skipped {
                println!(
                    "  mirrored: {} deleted, {} uploaded ({}), {} retries",
                    o.sync.objects_deleted,
                    o.sync.objects_uploaded,
                    humansize::format_size(o.sync.bytes_uploaded, humansize::BINARY),
                    o.sync.retries
                );
            }
        }
        Output::Apply(o) => {
            if o.already_current {
                println!("{} is already current", o.version.as_str().bold());
            } else {
                println!(
                    "{} {} is now current",
                    o.action.as_str().green().bold(),
                    o.version.as_str().bold()
                );
            }
        }
        Output::List(o) => {
            if o.versions.is_empty() {
                println!("{}", "no versions".dimmed());
            }
            for entry in &o.versions {
                let marker = if entry.current { "*".green().bold() } else { " ".normal() };
                let stamp = |t: &Option<chrono::DateTime<chrono::Utc>>| {
                    t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string())
                };
                let name = if entry.in_storage {
                    entry.version.as_str().blue().bold()
                } else {
                    entry.version.as_str().yellow()
                };
                println!(
                    "{} {:<12} uploaded {:<19}  published {}",
                    marker,
                    name,
                    stamp(&entry.uploaded_at),
                    stamp(&entry.published_at)
                );
            }
        }
        Output::Register(o) => {
            println!("{} version {}", "Registered".green().bold(), o.version.as_str().bold());
        }
        Output::Current(o) => {
            if o.current_version.is_empty() {
                println!("{}", "no version published".dimmed());
            } else {
                println!("{}", o.current_version);
            }
        }
    }
}
