//! `tapline` CLI - resolve URLs to stream handlers and dump their bytes

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tapline::config::{default_plugin_dir, load_options, load_options_from};
use tapline::plugin::Priority;
use tapline::{Session, SessionOptions};

#[derive(Parser)]
#[command(name = "tapline")]
#[command(about = "Resolve URLs to stream handlers and read their bytes")]
#[command(version)]
struct Cli {
    /// Extra handler directory (repeatable)
    #[arg(long = "plugin-dir", global = true)]
    plugin_dirs: Vec<PathBuf>,

    /// Config file (default: ~/.config/tapline/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List loaded plugins
    Plugins,

    /// Show which plugin handles a URL
    Resolve {
        /// URL to resolve
        url: String,
    },

    /// Stream a URL to stdout or a file
    Stream {
        /// URL to stream
        url: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read directly from the source, without the readahead buffer
        #[arg(long)]
        no_buffer: bool,

        /// Seconds to wait for data before giving up (0 = forever)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = session_options(&cli)?;

    match cli.command {
        Commands::Plugins => cmd_plugins(options),
        Commands::Resolve { url } => cmd_resolve(options, &url),
        Commands::Stream {
            url,
            output,
            no_buffer,
            timeout,
        } => {
            let mut options = options;
            if no_buffer {
                options.buffered = false;
            }
            if let Some(secs) = timeout {
                options.stream_timeout_secs = secs;
            }
            cmd_stream(options, &url, output).await
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "tapline=debug",
        _ => "tapline=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn session_options(cli: &Cli) -> Result<SessionOptions> {
    let mut options = match &cli.config {
        Some(path) => load_options_from(path)?,
        None => load_options()?,
    };

    let default_dir = default_plugin_dir();
    if default_dir.is_dir() && !options.plugin_dirs.contains(&default_dir) {
        options.plugin_dirs.insert(0, default_dir);
    }
    options.plugin_dirs.extend(cli.plugin_dirs.iter().cloned());
    Ok(options)
}

fn cmd_plugins(options: SessionOptions) -> Result<()> {
    let session = Session::new(options)?;
    for name in session.registry().names() {
        if Priority::of(&name).is_fallback() {
            println!("{name} (fallback)");
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

fn cmd_resolve(options: SessionOptions, url: &str) -> Result<()> {
    let session = Session::new(options)?;
    let resolved = session.resolve_url(url)?;

    println!("{}", resolved.name);
    if let Some(matcher) = &resolved.matcher {
        println!("  matcher: {matcher}");
    }
    for (group, value) in &resolved.captures {
        println!("  {group} = {value}");
    }
    Ok(())
}

async fn cmd_stream(options: SessionOptions, url: &str, output: Option<PathBuf>) -> Result<()> {
    let chunk_size = options.chunk_size;
    let session = Session::new(options)?;
    let mut stream = session.open_url(url).await?;

    let copied = match output {
        Some(path) => {
            let mut file = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
            let copied = stream.copy_to(&mut file, chunk_size).await;
            file.flush().await?;
            copied
        }
        None => stream.copy_to(&mut tokio::io::stdout(), chunk_size).await,
    };
    stream.close().await;

    let written = copied.with_context(|| format!("stream from {url} failed"))?;
    tracing::info!("Wrote {written} bytes from {url}");
    Ok(())
}
