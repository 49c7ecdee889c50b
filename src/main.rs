mod config;
mod dispatch;
mod error;
mod hub;
mod pipeline;
mod protocol;
mod reels;
mod routes;
mod state;
mod utils {
    pub mod gpio;
    pub mod openai;
    pub mod retry;
}

use std::sync::Arc;

use axum::Extension;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    config::Config,
    dispatch::Dispatcher,
    hub::Hub,
    pipeline::{CharacterGenerator, ImageStore, Pipeline, ResultLog},
    utils::{
        gpio::ButtonPanel,
        openai::{OpenAiGenerator, Unconfigured},
        retry::RetryPolicy,
    },
};
use error::AppErr;

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let cfg = Config::from_env()?;

    let generator: Arc<dyn CharacterGenerator> =
        match OpenAiGenerator::new(cfg.openai.clone(), RetryPolicy::new(cfg.retries)) {
            Ok(g) => Arc::new(g),
            Err(e) => {
                warn!("{e}. Image generation will fail.");
                Arc::new(Unconfigured(e.to_string()))
            }
        };
    let out_dir  = cfg.frontend_dir.join("generated");
    let pipeline = Arc::new(Pipeline::new(
        generator,
        ImageStore::new(&out_dir),
        ResultLog::new(out_dir.join("manifest.jsonl")),
    ));
    let log        = pipeline.log().clone();
    let dispatcher = Dispatcher::new(Hub::new(), pipeline);

    /* 硬體按鈕 → 佇列 → dispatcher */
    let (events, queue) = mpsc::unbounded_channel();
    tokio::spawn(dispatcher.clone().run(queue));
    let _buttons = if cfg.gpio.enabled {
        match ButtonPanel::start(&cfg.gpio, events.clone()) {
            Ok(panel) => Some(panel),
            Err(e) => {
                warn!("[GPIO] unavailable ({e}); running network-only");
                None
            }
        }
    } else {
        info!("[GPIO] disabled; running network-only");
        None
    };

    let app = routes::router(&cfg.frontend_dir)
        .layer(Extension(dispatcher))
        .layer(Extension(log));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app.into_make_service()).await?;
    drop(events);
    Ok(())
}
