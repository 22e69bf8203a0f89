//! SQLite bot registry implementation.
//!
//! Implements `BotRegistry` from `botgate-core` using sqlx with split read/write pools.
//! Webhook paths are stored already normalized, so conflict lookups can compare
//! them in SQL.

use botgate_core::repository::bot::{BotRegistry, RegistrationFilter};
use botgate_types::bot::{BotId, BotRegistration, WEBHOOK_ROUTE_PREFIX, normalize_webhook_path};
use botgate_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::Row;

use super::pool::DatabasePool;

/// Effective webhook path of a row, mirroring `BotRegistration::effective_webhook_path`.
const EFFECTIVE_PATH_SQL: &str = "COALESCE(NULLIF(TRIM(webhook_path), ''), ? || '/' || name)";

/// SQLite-backed implementation of `BotRegistry`.
pub struct SqliteBotRegistry {
    pool: DatabasePool,
}

impl SqliteBotRegistry {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to a domain registration.
struct RegistrationRow {
    id: String,
    name: String,
    dev_token: Option<String>,
    prod_token: Option<String>,
    dev_domain: Option<String>,
    prod_domain: Option<String>,
    webhook_path: Option<String>,
    webhook_secret: Option<String>,
    enabled: bool,
    created_at: String,
    updated_at: String,
}

impl RegistrationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            dev_token: row.try_get("dev_token")?,
            prod_token: row.try_get("prod_token")?,
            dev_domain: row.try_get("dev_domain")?,
            prod_domain: row.try_get("prod_domain")?,
            webhook_path: row.try_get("webhook_path")?,
            webhook_secret: row.try_get("webhook_secret")?,
            enabled: row.try_get("enabled")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_registration(self) -> Result<BotRegistration, RepositoryError> {
        let id = self
            .id
            .parse::<BotId>()
            .map_err(|e| RepositoryError::Query(format!("invalid bot id: {e}")))?;

        Ok(BotRegistration {
            id,
            name: self.name,
            dev_token: self.dev_token.map(SecretString::from),
            prod_token: self.prod_token.map(SecretString::from),
            dev_domain: self.dev_domain,
            prod_domain: self.prod_domain,
            webhook_path: self.webhook_path,
            webhook_secret: self.webhook_secret.map(SecretString::from),
            enabled: self.enabled,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn expose(secret: &Option<SecretString>) -> Option<&str> {
    secret.as_ref().map(|s| s.expose_secret())
}

fn stored_path(registration: &BotRegistration) -> Option<String> {
    registration
        .webhook_path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(normalize_webhook_path)
}

fn map_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<BotRegistration>, RepositoryError> {
    rows.iter()
        .map(|row| {
            RegistrationRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_registration()
        })
        .collect()
}

impl SqliteBotRegistry {
    async fn fetch_by_name(
        &self,
        name: &str,
        enabled_only: bool,
    ) -> Result<Option<BotRegistration>, RepositoryError> {
        let sql = if enabled_only {
            "SELECT * FROM bot_registrations WHERE name = ? AND enabled = 1"
        } else {
            "SELECT * FROM bot_registrations WHERE name = ?"
        };
        let row = sqlx::query(sql)
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let reg_row = RegistrationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(reg_row.into_registration()?))
            }
            None => Ok(None),
        }
    }
}

impl BotRegistry for SqliteBotRegistry {
    async fn find_enabled_by_name(
        &self,
        name: &str,
    ) -> Result<Option<BotRegistration>, RepositoryError> {
        self.fetch_by_name(name, true).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<BotRegistration>, RepositoryError> {
        self.fetch_by_name(name, false).await
    }

    async fn find_conflicting_webhook_path(
        &self,
        path: &str,
        excluding: &BotId,
    ) -> Result<Vec<BotRegistration>, RepositoryError> {
        let sql = format!(
            "SELECT * FROM bot_registrations WHERE enabled = 1 AND id != ? AND {EFFECTIVE_PATH_SQL} = ? ORDER BY name"
        );
        let rows = sqlx::query(&sql)
            .bind(excluding.to_string())
            .bind(WEBHOOK_ROUTE_PREFIX)
            .bind(normalize_webhook_path(path))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows)
    }

    async fn create(&self, registration: &BotRegistration) -> Result<BotRegistration, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO bot_registrations (id, name, dev_token, prod_token, dev_domain, prod_domain, webhook_path, webhook_secret, enabled, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(registration.id.to_string())
        .bind(&registration.name)
        .bind(expose(&registration.dev_token))
        .bind(expose(&registration.prod_token))
        .bind(&registration.dev_domain)
        .bind(&registration.prod_domain)
        .bind(stored_path(registration))
        .bind(expose(&registration.webhook_secret))
        .bind(registration.enabled)
        .bind(format_datetime(&registration.created_at))
        .bind(format_datetime(&registration.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => {
                tracing::info!(bot = %registration.name, "bot registered");
                Ok(registration.clone())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("bot '{}' already exists", registration.name)),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn list(
        &self,
        filter: Option<RegistrationFilter>,
    ) -> Result<Vec<BotRegistration>, RepositoryError> {
        let filter = filter.unwrap_or_default();
        let mut sql = String::from("SELECT * FROM bot_registrations");
        if let Some(enabled) = filter.enabled {
            sql.push_str(if enabled {
                " WHERE enabled = 1"
            } else {
                " WHERE enabled = 0"
            });
        }
        sql.push_str(" ORDER BY name ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows)
    }

    async fn update(&self, registration: &BotRegistration) -> Result<BotRegistration, RepositoryError> {
        let mut updated = registration.clone();
        updated.updated_at = Utc::now();
        updated.webhook_path = stored_path(registration);

        let result = sqlx::query(
            "UPDATE bot_registrations SET name = ?, dev_token = ?, prod_token = ?, dev_domain = ?, prod_domain = ?, webhook_path = ?, webhook_secret = ?, enabled = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&updated.name)
        .bind(expose(&updated.dev_token))
        .bind(expose(&updated.prod_token))
        .bind(&updated.dev_domain)
        .bind(&updated.prod_domain)
        .bind(&updated.webhook_path)
        .bind(expose(&updated.webhook_secret))
        .bind(updated.enabled)
        .bind(format_datetime(&updated.updated_at))
        .bind(updated.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE") => {
                RepositoryError::Conflict(format!("bot '{}' already exists", registration.name))
            }
            e => RepositoryError::Query(e.to_string()),
        })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(updated)
    }

    async fn delete(&self, id: &BotId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM bot_registrations WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
