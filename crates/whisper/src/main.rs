use std::sync::Arc;

use whisper_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), whisper_core::Error> {
    whisper_core::logging::init("whisper")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        ttl_secs = cfg.whisper_ttl.as_secs(),
        max_pending = cfg.max_pending,
        "starting whisper bot"
    );

    whisper_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| whisper_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
