//! Key/value settings

use sqlx::SqlitePool;
use tracing::info;

use crate::session::generate_secret;
use crate::Result;

/// Settings key of the generated session signing secret
pub const SESSION_SECRET_KEY: &str = "session_secret";

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Stored session secret, generating and storing one on first use
pub async fn load_or_init_session_secret(pool: &SqlitePool) -> Result<String> {
    if let Some(secret) = get_setting(pool, SESSION_SECRET_KEY).await? {
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    let secret = generate_secret();
    set_setting(pool, SESSION_SECRET_KEY, &secret).await?;
    info!("Generated new session secret");
    Ok(secret)
}
