#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a repo feature: `memory` or `sqlite`.");

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://shop.db";

/// The store selected by cargo features. SQLite wins when both are enabled.
#[cfg(feature = "sqlite")]
pub type Repo = sqlite::SqliteRepo;

#[cfg(all(feature = "memory", not(feature = "sqlite")))]
pub type Repo = memory::InMemoryRepo;

pub async fn build_repo(database_url: Option<&str>) -> anyhow::Result<Repo> {
    #[cfg(feature = "sqlite")]
    {
        let url = database_url.unwrap_or(DEFAULT_DATABASE_URL);
        tracing::info!(url, "using sqlite store");
        sqlite::SqliteRepo::new(url).await
    }

    #[cfg(all(feature = "memory", not(feature = "sqlite")))]
    {
        if let Some(url) = database_url {
            tracing::warn!(url, "database url ignored by the in-memory store");
        }
        tracing::info!("using in-memory store");
        Ok(memory::InMemoryRepo::new())
    }
}
