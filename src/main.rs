use std::error::Error;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use falldetect::app::config::AppConfig;
use falldetect::app::App;

const DEFAULT_CONFIG: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = AppConfig::from_file(&path).map_err(|err| {
        tracing::error!(path = %path.display(), %err, "failed to load configuration");
        err
    })?;

    let app = App::start(config).await.map_err(|err| {
        tracing::error!(%err, "startup failed");
        err
    })?;
    app.run().await?;
    Ok(())
}
