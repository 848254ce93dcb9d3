use std::sync::Arc;

use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hls_packager::config::settings::AppConfig;
use hls_packager::infrastructure::encoder::ffmpeg::FfmpegEncoder;
use hls_packager::infrastructure::storage::s3::StorageService;
use hls_packager::modules::transcode::JobStatus;
use hls_packager::state::AppState;
use hls_packager::workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting HLS packager...");

    let config = AppConfig::new()?;
    let source_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.source_file.clone());

    let storage = StorageService::new(&config).await;
    let encoder = FfmpegEncoder::new(config.ffmpeg_path.clone(), config.encode_timeout);
    let state = AppState::new(config, Arc::new(storage), Arc::new(encoder));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling job");
            on_signal.cancel();
        }
    });

    let result = workers::transcoder::run_transcode_job(&state, &source_file, &cancel).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.status == JobStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
