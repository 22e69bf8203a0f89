//! Bot registry trait definition.

use botgate_types::bot::{BotId, BotRegistration};
use botgate_types::error::RepositoryError;

/// Filter criteria for listing registrations.
#[derive(Debug, Clone, Default)]
pub struct RegistrationFilter {
    /// Only enabled (`Some(true)`) or only disabled (`Some(false)`) entries.
    pub enabled: Option<bool>,
    /// Maximum number of results.
    pub limit: Option<i64>,
}

/// Repository trait for bot registrations.
///
/// Implementations live in botgate-infra (e.g., SqliteBotRegistry).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait BotRegistry: Send + Sync {
    /// Look up an enabled registration by name. Disabled entries are invisible.
    fn find_enabled_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<BotRegistration>, RepositoryError>> + Send;

    /// Look up a registration by name regardless of its enabled flag.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<BotRegistration>, RepositoryError>> + Send;

    /// Other enabled registrations whose effective webhook path equals `path`.
    fn find_conflicting_webhook_path(
        &self,
        path: &str,
        excluding: &BotId,
    ) -> impl std::future::Future<Output = Result<Vec<BotRegistration>, RepositoryError>> + Send;

    /// Create a new registration. Fails with `Conflict` if the name is taken.
    fn create(
        &self,
        registration: &BotRegistration,
    ) -> impl std::future::Future<Output = Result<BotRegistration, RepositoryError>> + Send;

    /// List registrations ordered by name.
    fn list(
        &self,
        filter: Option<RegistrationFilter>,
    ) -> impl std::future::Future<Output = Result<Vec<BotRegistration>, RepositoryError>> + Send;

    /// Update an existing registration. Returns the updated entry.
    fn update(
        &self,
        registration: &BotRegistration,
    ) -> impl std::future::Future<Output = Result<BotRegistration, RepositoryError>> + Send;

    /// Permanently delete a registration by ID.
    fn delete(
        &self,
        id: &BotId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
