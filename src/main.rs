use anyhow::Context;
use libris_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load LIBRIS settings")?;
    libris_telemetry::init(&settings.telemetry);

    tracing::info!(
        env = settings.environment.as_str(),
        host = %settings.server.host,
        port = settings.server.port,
        "libris-app starting"
    );

    libris_app::app::serve(settings).await
}
