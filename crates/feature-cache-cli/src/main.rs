//! feature-cache — entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use feature_cache::ErrorPolicy;
use feature_cache_cli::commands::{self, build::PolicyChoice, show::EntryFormat};
use feature_cache_cli::config::FetchConfig;

#[derive(Parser)]
#[command(
    name = "feature-cache",
    about = "Fetch image feature vectors from a remote service and cache them on disk",
    version
)]
struct Cli {
    /// Base URL of the feature service.
    /// Also reads from FEATURE_CACHE_BASE_URL env var.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds (default 10).
    /// Also reads from FEATURE_CACHE_TIMEOUT_SECS env var.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Per-item failure handling for `build`.
#[derive(Clone, Copy, ValueEnum)]
enum OnError {
    /// Stop at the first failing image.
    Abort,
    /// Log the failing image and continue.
    Skip,
}

impl From<OnError> for ErrorPolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => ErrorPolicy::Abort,
            OnError::Skip => ErrorPolicy::SkipAndLog,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the feature vector of one image.
    Fetch {
        /// Image file to upload.
        image: PathBuf,

        /// Feature size: 64, 50 or 2000.
        #[arg(long, default_value_t = 64)]
        size: u32,

        /// Write the feature bytes to this file.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Cache features for image files or directories of images.
    Build {
        /// Image files and/or directories (scanned non-recursively).
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Cache directory, created if missing.
        #[arg(short, long)]
        out: PathBuf,

        /// Fetch a single feature of this size (64, 50 or 2000).
        #[arg(long)]
        size: Option<u32>,

        /// Fetch sizes 64 and 50 and store them concatenated.
        #[arg(long)]
        dual: bool,

        /// Compute features locally with this ONNX model.
        #[arg(long)]
        model: Option<PathBuf>,

        /// Failure handling; defaults to abort for --size, skip otherwise.
        #[arg(long, value_enum)]
        on_error: Option<OnError>,
    },

    /// Concatenate entries of DIR_A with same-named entries of DIR_B into OUT.
    Merge {
        dir_a: PathBuf,
        dir_b: PathBuf,
        out: PathBuf,
    },

    /// Summarize a cached feature entry.
    Show {
        entry: PathBuf,

        /// How to read the entry.
        #[arg(long, value_enum, default_value = "npy-u8")]
        format: EntryFormat,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   feature-cache completions bash > ~/.local/share/bash-completion/completions/feature-cache
    ///   feature-cache completions zsh > ~/.zfunc/_feature-cache
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;

    match cli.command {
        Commands::Fetch { image, size, out } => {
            let config = FetchConfig::resolve(cli.base_url.as_deref(), cli.timeout_secs)?;
            let outcome = commands::fetch::execute(&config, &image, size, out.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}: {} bytes (size {})", outcome.image, outcome.bytes, outcome.size);
            }
        }

        Commands::Build {
            inputs,
            out,
            size,
            dual,
            model,
            on_error,
        } => {
            let policy = PolicyChoice::from_flags(size, dual, model)?;
            let config = FetchConfig::resolve(cli.base_url.as_deref(), cli.timeout_secs)?;
            let files = commands::collect_inputs(&inputs)?;
            let report =
                commands::build::execute(&config, &files, &out, policy, on_error.map(Into::into))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Cache: {}", out.display());
                println!("  Images:         {}", report.total);
                println!("  Written:        {}", report.processed);
                println!("  Already cached: {}", report.skipped_existing);
                println!("  Failed:         {}", report.failed.len());
                for item in &report.failed {
                    println!("    {}: {}", item.path.display(), item.error);
                }
            }
        }

        Commands::Merge { dir_a, dir_b, out } => {
            let report = commands::merge::execute(&dir_a, &dir_b, &out)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Merged into {}", out.display());
                println!("  Merged:         {}", report.merged);
                println!("  Already there:  {}", report.skipped_existing);
                println!("  No match:       {}", report.missing.len());
                for name in &report.missing {
                    println!("    {name}");
                }
            }
        }

        Commands::Show { entry, format } => {
            let summary = commands::show::execute(&entry, format)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}: {} elements", summary.path, summary.len);
                println!("  [{}]", summary.head.join(", "));
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "feature-cache", &mut std::io::stdout());
        }
    }

    Ok(())
}
