use shop_hex::application::seed::seed_sample_data;
use shop_hex::application::ShopServices;
use shop_hex::config::Config;
use shop_hex::inbound::http::{HttpServer, HttpServerConfig};
use shop_repo::{build_repo, Repo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for DATABASE_URL / SERVER_PORT / query tuning when present.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
        .init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let repo: Repo = build_repo(config.database_url.as_deref()).await?;
    let services = ShopServices::new(repo, config.query);

    if config.seed_sample_data {
        seed_sample_data(&services)
            .await
            .map_err(|e| anyhow::anyhow!("seeding sample data failed: {e}"))?;
    }

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };

    let http = HttpServer::new(services, server_cfg).await?;
    http.run().await
}
