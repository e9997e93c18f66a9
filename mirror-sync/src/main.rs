//! # Mirror Client
//!
//! Headless client that mirrors a device's drawings into a local cache and
//! logs every composed frame.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mirror_core::{DirCache, VersionCache};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mirror_sync::{Driver, DriverEvent, HttpTransport, SyncConfig, SyncEngine};

/// Command-line arguments for mirror-client.
#[derive(Debug, Clone, Parser)]
#[command(name = "mirror-client")]
#[command(about = "Mirror the drawings of a remote device")]
#[command(version)]
struct CliArgs {
    /// Device base URL (e.g., <http://192.168.1.40>)
    #[arg(long, env = "MIRROR_URL")]
    url: String,

    /// Directory for the drawing cache
    #[arg(long, env = "MIRROR_DATA_DIR", default_value = ".mirror-cache")]
    data_dir: PathBuf,

    /// Open this drawing instead of asking the device for its menu
    #[arg(long)]
    drawing: Option<String>,

    /// Viewport width in pixels
    #[arg(long, default_value = "800")]
    viewport_width: f32,

    /// Viewport height in pixels
    #[arg(long, default_value = "800")]
    viewport_height: f32,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Print the main drawings in the cache and exit
    #[arg(long)]
    list_cached: bool,
}

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,mirror_sync=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mirror_sync=debug,mirror_core=info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let cache = Arc::new(DirCache::new(&args.data_dir)?);
    tracing::info!("Drawing cache at {:?}", cache.data_dir());

    if args.list_cached {
        for name in cache.known_main_drawings() {
            println!("{name}");
        }
        return Ok(());
    }

    let transport = HttpTransport::with_timeout(&args.url, Duration::from_secs(args.timeout_secs))?;
    tracing::info!("Mirroring {}", transport.endpoint());

    let config = SyncConfig::new().with_viewport(args.viewport_width, args.viewport_height);
    let mut engine = SyncEngine::new(config, cache);
    match &args.drawing {
        Some(name) => engine.open_drawing(name)?,
        None => engine.start()?,
    }

    let (driver, handle, mut events) = Driver::new(engine, Arc::new(transport));
    let task = tokio::spawn(driver.run());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(DriverEvent::Frame(frame)) => tracing::info!(
                    "Frame for {}: {}x{}, {} item(s), {} indexed, {} touch zone(s)",
                    frame.root,
                    frame.size.0,
                    frame.size.1,
                    frame.items.len(),
                    frame.indexed.len(),
                    frame.touch_zones.len()
                ),
                Some(DriverEvent::Prompt(prompt)) => {
                    tracing::warn!("Ignoring text prompt \"{}\" for {}: no input on this client", prompt.prompt, prompt.cmd);
                }
                Some(DriverEvent::Fatal { drawing, message }) => {
                    tracing::error!("Drawing {drawing} failed: {message}");
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                // The driver may already have exited
                let _ = handle.shutdown().await;
                break;
            }
        }
    }

    task.await??;
    Ok(())
}
