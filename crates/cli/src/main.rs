use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use geotrail_engine::Tracker;
use geotrail_store::SqliteStore;
use log::{error, info};
use settings::ConfigArgs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

mod settings;
mod transport;

#[derive(Parser)]
#[command(name = "geotrail")]
#[command(about = "Streaming location ingestion into incremental SVG tracks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept WebSocket connections and ingest location frames
    Serve(ServeArgs),

    /// Print the effective tracker configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:3002
    #[arg(long, default_value = "127.0.0.1:3002")]
    bind: String,

    /// SQLite database for anchors and path references
    #[arg(long, default_value = "geotrail.db")]
    db: PathBuf,

    #[command(flatten)]
    tracker: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Serve(args) => serve(args).await?,
        Commands::Config(args) => print_config(&args)?,
    }

    Ok(())
}

fn print_config(args: &ConfigArgs) -> Result<()> {
    let config = args.resolve()?;
    let text = toml::to_string_pretty(&config).context("Failed to render config")?;
    print!("{text}");
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = args.tracker.resolve()?;
    let store = Arc::new(SqliteStore::open(&args.db));
    let tracker = Tracker::start(config, store).context("Failed to start tracker")?;

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!(
        "Listening on ws://{} (locations on channel {}, store {})",
        args.bind,
        tracker.location_prefix(),
        args.db.display()
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let app = transport::app(transport::AppState {
        tracker: tracker.clone(),
        stop: stop_rx.clone(),
    });
    let server = tokio::spawn(serve_until_stopped(listener, app, stop_rx));

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("Interrupt received; shutting down");
            Ok(())
        }
        failed = startup_failure(&tracker) => failed,
    };

    let _ = stop_tx.send(true);
    server
        .await
        .context("Server task panicked")?
        .context("Server error")?;
    if let Err(e) = tracker.shutdown().await {
        error!("Tracker shutdown incomplete: {e}");
    }
    outcome
}

async fn serve_until_stopped(
    listener: TcpListener,
    app: axum::Router,
    mut stop: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*stop.borrow() {
                if stop.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}

/// Resolves only if a dependency fails permanently; that is fatal at startup.
async fn startup_failure(tracker: &Tracker) -> Result<()> {
    match tracker.when_ready().await {
        Ok(()) => std::future::pending().await,
        Err(e) => Err(e).context("Dependency failed at startup"),
    }
}
