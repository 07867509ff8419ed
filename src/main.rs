use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::{task, time};

use assembly_nightbot::cache::ScheduleCache;
use assembly_nightbot::cli;
use assembly_nightbot::collect::{CollectOptions, Collector};
use assembly_nightbot::fetch::ChromeFetcher;
use assembly_nightbot::schedule::RenderOptions;
use assembly_nightbot::server::{self, AppState};

const NAV_TIMEOUT: Duration = Duration::from_secs(30);

fn setup_logging() {
    if env::var("LOG").is_err() {
        env::set_var("LOG", "assembly_nightbot=info");
    }

    pretty_env_logger::init_custom_env("LOG");
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let args = cli::parse(env::args().skip(1).collect());

    let fetcher = ChromeFetcher::new(args.chrome_path.clone(), NAV_TIMEOUT, args.detail_wait);
    let collector = Collector::new(
        Arc::new(fetcher),
        CollectOptions {
            concurrency: args.concurrency,
            render: RenderOptions {
                group_size: args.group_size,
                ..RenderOptions::default()
            },
        },
    );

    let cache = ScheduleCache::new(args.cache_dir.clone());
    cache.load_persisted(args.window_days).await;

    let state = Arc::new(AppState {
        collector,
        cache,
        window_days: args.window_days,
        max_chars: args.max_chars,
    });

    let refresher = Arc::clone(&state);
    task::spawn(async move {
        let mut ticker = time::interval(args.refresh_every);
        loop {
            ticker.tick().await;
            refresher
                .cache
                .refresh_window(&refresher.collector, refresher.window_days)
                .await;
        }
    });

    let listener = TcpListener::bind(args.address).await?;
    info!("listening at http://{}", args.address);

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("could not listen for shutdown signal: {err:#}");
    }
}
