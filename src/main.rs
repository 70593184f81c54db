use clap::{Parser, Subcommand, ValueEnum};
use smart_thumbs::hooks::Hooks;
use smart_thumbs::host::{FsHost, ImageId};
use smart_thumbs::imaging::RustBackend;
use smart_thumbs::process::Processor;
use smart_thumbs::quota::QuotaGate;
use smart_thumbs::{config, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smart-thumbs")]
#[command(about = "Regenerate trimmed, re-encoded thumbnails for uploaded images")]
#[command(long_about = "\
Regenerate trimmed, re-encoded thumbnails for uploaded images

Each run takes one original and its attachment metadata, trims the border,
renders every selected size, and writes the updated metadata.

Layout:

  uploads/
  ├── 2024/05/chair.jpg              # Original (metadata \"file\" is relative)
  ├── 2024/05/chair-150x150.jpg      # Derived sizes live next to it
  └── 2024/05/chair-150x150.webp     # Optional WebP sibling
  .smart-thumbs/
  ├── attachments.json               # Eligibility + prior-generation snapshots
  └── quota.json                     # Originals processed this month

Run 'smart-thumbs gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (stock defaults apply when missing)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Upload root that metadata paths are relative to
    #[arg(long, default_value = "uploads", global = true)]
    uploads: PathBuf,

    /// Directory for per-image state and the quota counter
    #[arg(long, default_value = ".smart-thumbs", global = true)]
    state_dir: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Regenerate the derived sizes of one image
    Process {
        /// Attachment id
        #[arg(long)]
        id: ImageId,
        /// Attachment metadata JSON
        #[arg(long)]
        meta: PathBuf,
        /// Write the updated metadata back to the file
        #[arg(long)]
        write: bool,
    },
    /// Show quota usage for the current month
    Quota,
    /// Record whether an image may be processed
    Eligibility {
        #[arg(long)]
        id: ImageId,
        #[arg(long, conflicts_with = "disable", required_unless_present = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    /// Validate the config file
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Process { id, meta, write } => {
            let config = config::load_config(&cli.config)?;
            let hooks = Hooks::from_overrides(&config.overrides);
            let limit = config.quota.limit;
            let host = FsHost::open(config, &cli.uploads, &cli.state_dir)?;
            let quota = QuotaGate::new(host.quota_store(), limit);
            let mut processor = Processor::new(host, RustBackend::new(), quota, hooks);

            let metadata = read_metadata(&meta)?;
            let processed = processor.process_detailed(id, metadata);
            output::print_processed(id, &processed);

            if write {
                let json = serde_json::to_string_pretty(&processed.metadata)?;
                std::fs::write(&meta, json)?;
            }
        }
        Command::Quota => {
            let config = config::load_config(&cli.config)?;
            let host = FsHost::open(config, &cli.uploads, &cli.state_dir)?;
            let gate = QuotaGate::new(host.quota_store(), host.config().quota.limit);
            output::print_quota(&gate.usage()?);
        }
        Command::Eligibility { id, enable, .. } => {
            let config = config::load_config(&cli.config)?;
            let mut host = FsHost::open(config, &cli.uploads, &cli.state_dir)?;
            host.set_eligibility(id, enable)?;
            let state = if enable { "eligible" } else { "not eligible" };
            println!("Image {id}: {state}");
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let config = config::load_config(&cli.config)?;
            println!(
                "==> Config is valid ({} sizes selected, {} registered)",
                config.settings.sizes.len(),
                config.sizes.len()
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the `info` default.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn read_metadata(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
