use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use env_logger::Env;
use log::{error, warn};

use content_sync::{ChannelSink, SyncConfig, SyncEngine};

mod progress;

use progress::CliProgress;

#[derive(Parser, Debug)]
#[command(
    name = "content-sync",
    author,
    version,
    about = "Mirror a remote media content list into a local directory"
)]
struct Cli {
    /// JSON config file (defaults to <data dir>/content-sync/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remote root serving `content_list` and the listed files.
    #[arg(long)]
    base_url: Option<String>,

    /// Local directory to sync into.
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Ignore content list lines that carry no checksum.
    #[arg(long)]
    require_checksums: bool,

    /// Skip syncing and print the content already available locally.
    #[arg(long)]
    list: bool,

    /// Print the session report as JSON instead of the local content list.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut SyncConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(dest) = &self.dest {
            config.download_dir = Some(dest.clone());
        }
        if self.require_checksums {
            config.require_checksums = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match SyncConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);

    let cancel_flag = Arc::new(AtomicBool::new(false));
    let mut engine = match SyncEngine::new(config, cancel_flag.clone()) {
        Ok(engine) => engine,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if cli.list {
        engine.load_cached_manifest(None).await;
        for path in engine.list_local_content() {
            println!("{}", path.display());
        }
        return ExitCode::SUCCESS;
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current chunk");
            cancel_flag.store(true, Ordering::SeqCst);
        }
    });

    let (sink, mut updates) = ChannelSink::channel();
    let handle = engine.spawn(None, sink);
    let mut progress = CliProgress::new();
    while let Some(event) = updates.recv().await {
        progress.handle(event);
    }
    if !progress.errors().is_empty() {
        warn!("{} problems during sync", progress.errors().len());
    }

    let (mut engine, result) = match handle.await {
        Ok(done) => done,
        Err(err) => {
            error!("sync task failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!("unable to encode report: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        for path in engine.list_local_content() {
            println!("{}", path.display());
        }
    }

    ExitCode::SUCCESS
}
