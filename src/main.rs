mod app;
mod input;

use app::App;
use pcm_recorder::Config;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting pcm-recorder");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    let app = App::new(config)?;
    app.run().await
}
