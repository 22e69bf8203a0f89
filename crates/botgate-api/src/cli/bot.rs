//! Bot registration CLI commands: add, list, show, update, enable, disable,
//! remove, check.

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use clap::{Subcommand, ValueEnum};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use botgate_core::guard;
use botgate_core::repository::bot::{BotRegistry, RegistrationFilter};
use botgate_types::bot::{BotRegistration, mask_token, slugify};
use botgate_types::environment::Environment;
use botgate_types::error::RepositoryError;

use crate::state::AppState;

/// Bot registration subcommands.
#[derive(Subcommand)]
pub enum BotCommand {
    /// Register a new bot.
    Add {
        /// Bot name (slugified; it becomes the webhook path segment).
        name: String,

        /// Bot API token for the dev deployment.
        #[arg(long, env = "BOTGATE_DEV_TOKEN", hide_env_values = true)]
        dev_token: Option<String>,

        /// Bot API token for the prod deployment.
        #[arg(long, env = "BOTGATE_PROD_TOKEN", hide_env_values = true)]
        prod_token: Option<String>,

        /// Public base URL of the dev deployment (e.g. https://dev.example.com).
        #[arg(long)]
        dev_domain: Option<String>,

        /// Public base URL of the prod deployment.
        #[arg(long)]
        prod_domain: Option<String>,

        /// Register the bot disabled.
        #[arg(long)]
        disabled: bool,
    },

    /// List registered bots.
    #[command(alias = "ls")]
    List {
        /// Only show bots with this status.
        #[arg(long)]
        status: Option<StatusFilter>,
    },

    /// Show one bot's registration (tokens masked).
    Show {
        name: String,
    },

    /// Change credentials or domains. An empty value clears the field.
    Update {
        name: String,

        #[arg(long)]
        dev_token: Option<String>,

        #[arg(long)]
        prod_token: Option<String>,

        #[arg(long)]
        dev_domain: Option<String>,

        #[arg(long)]
        prod_domain: Option<String>,
    },

    /// Route webhooks for a bot again.
    Enable {
        name: String,
    },

    /// Stop routing webhooks for a bot (requests get 404).
    Disable {
        name: String,
    },

    /// Delete a bot registration permanently.
    #[command(alias = "rm")]
    Remove {
        name: String,
    },

    /// Check a bot's deployment and cross-environment isolation offline.
    Check {
        name: String,

        /// Environment to check (default: both).
        #[arg(long)]
        env: Option<Environment>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    Enabled,
    Disabled,
}

/// Handle a bot registration subcommand.
pub async fn handle_bot_command(cmd: BotCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        BotCommand::Add {
            name,
            dev_token,
            prod_token,
            dev_domain,
            prod_domain,
            disabled,
        } => {
            let fields = RegistrationFields {
                dev_token,
                prod_token,
                dev_domain,
                prod_domain,
            };
            add_bot(state, &name, fields, disabled, json).await
        }
        BotCommand::List { status } => list_bots(state, status, json).await,
        BotCommand::Show { name } => show_bot(state, &name, json).await,
        BotCommand::Update {
            name,
            dev_token,
            prod_token,
            dev_domain,
            prod_domain,
        } => {
            let fields = RegistrationFields {
                dev_token,
                prod_token,
                dev_domain,
                prod_domain,
            };
            update_bot(state, &name, fields, json).await
        }
        BotCommand::Enable { name } => set_enabled(state, &name, true, json).await,
        BotCommand::Disable { name } => set_enabled(state, &name, false, json).await,
        BotCommand::Remove { name } => remove_bot(state, &name, json).await,
        BotCommand::Check { name, env } => check_bot(state, &name, env, json).await,
    }
}

/// Per-environment settings given on the command line.
#[derive(Debug, Default)]
pub struct RegistrationFields {
    pub dev_token: Option<String>,
    pub prod_token: Option<String>,
    pub dev_domain: Option<String>,
    pub prod_domain: Option<String>,
}

impl RegistrationFields {
    /// Apply to `registration`: `None` keeps a field, an empty value clears it.
    fn apply(self, registration: &mut BotRegistration) {
        if let Some(token) = self.dev_token {
            registration.dev_token = non_empty(token).map(SecretString::from);
        }
        if let Some(token) = self.prod_token {
            registration.prod_token = non_empty(token).map(SecretString::from);
        }
        if let Some(domain) = self.dev_domain {
            registration.dev_domain = non_empty(domain);
        }
        if let Some(domain) = self.prod_domain {
            registration.prod_domain = non_empty(domain);
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Look up a registration by name, enabled or not.
pub(crate) async fn lookup(state: &AppState, name: &str) -> Result<BotRegistration> {
    state
        .registry
        .find_by_name(name)
        .await?
        .ok_or_else(|| anyhow!("bot '{name}' not found"))
}

/// Register a new bot.
pub async fn add_bot(
    state: &AppState,
    name: &str,
    fields: RegistrationFields,
    disabled: bool,
    json: bool,
) -> Result<()> {
    let slug = slugify(name);
    if slug.is_empty() {
        bail!("bot name '{name}' contains no usable characters");
    }

    let mut registration = BotRegistration::new(slug);
    fields.apply(&mut registration);
    registration.enabled = !disabled;

    let created = state
        .registry
        .create(&registration)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                anyhow!("a bot named '{}' already exists", registration.name)
            }
            other => other.into(),
        })?;

    tracing::info!(bot = %created.name, enabled = created.enabled, "bot registered");

    if json {
        println!("{}", serde_json::to_string_pretty(&RegistrationView::from(&created))?);
        return Ok(());
    }

    println!();
    println!("  {} Bot registered!", style("✓").green().bold());
    println!();
    print_details(&created);
    if !Environment::ALL.iter().any(|env| created.is_deployed_in(*env)) {
        println!(
            "  {} No environment has both a token and a domain yet. Set one with: {}",
            style("!").yellow().bold(),
            style(format!("botgate bot update {} --prod-token ... --prod-domain ...", created.name))
                .yellow()
        );
        println!();
    }

    Ok(())
}

/// List registrations in a table.
pub async fn list_bots(state: &AppState, status: Option<StatusFilter>, json: bool) -> Result<()> {
    let filter = status.map(|s| RegistrationFilter {
        enabled: Some(s == StatusFilter::Enabled),
        ..Default::default()
    });
    let registrations = state.registry.list(filter).await?;

    if json {
        let views: Vec<RegistrationView<'_>> =
            registrations.iter().map(RegistrationView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if registrations.is_empty() {
        println!();
        println!(
            "  {} No bots registered. Add one with: {}",
            style("i").blue().bold(),
            style("botgate bot add <name>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Dev").fg(Color::White),
        Cell::new("Prod").fg(Color::White),
        Cell::new("Webhook Path").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for registration in &registrations {
        let status_cell = if registration.enabled {
            Cell::new("● enabled").fg(Color::Green)
        } else {
            Cell::new("○ disabled").fg(Color::Yellow)
        };

        table.add_row(vec![
            Cell::new(&registration.name).fg(Color::Cyan),
            status_cell,
            Cell::new(environment_summary(registration, Environment::Dev)),
            Cell::new(environment_summary(registration, Environment::Prod)),
            Cell::new(registration.effective_webhook_path()),
            Cell::new(format_relative_time(&registration.updated_at)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} bot{}",
        style(registrations.len()).bold(),
        if registrations.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Show one registration.
pub async fn show_bot(state: &AppState, name: &str, json: bool) -> Result<()> {
    let registration = lookup(state, name).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&RegistrationView::from(&registration))?
        );
        return Ok(());
    }

    println!();
    println!("  {}", style(&registration.name).cyan().bold());
    println!();
    print_details(&registration);

    Ok(())
}

/// Change credentials or domains of an existing registration.
pub async fn update_bot(
    state: &AppState,
    name: &str,
    fields: RegistrationFields,
    json: bool,
) -> Result<()> {
    let mut registration = lookup(state, name).await?;
    fields.apply(&mut registration);
    let updated = state.registry.update(&registration).await?;

    tracing::info!(bot = %updated.name, "bot registration updated");

    if json {
        println!("{}", serde_json::to_string_pretty(&RegistrationView::from(&updated))?);
    } else {
        println!("  {} Bot '{}' updated.", style("✓").green().bold(), updated.name);
    }
    Ok(())
}

/// Enable or disable webhook routing for a bot.
pub async fn set_enabled(state: &AppState, name: &str, enabled: bool, json: bool) -> Result<()> {
    let mut registration = lookup(state, name).await?;
    registration.enabled = enabled;
    let updated = state.registry.update(&registration).await?;

    tracing::info!(bot = %updated.name, enabled, "bot status changed");

    if json {
        println!(
            "{}",
            serde_json::json!({ "name": updated.name, "enabled": updated.enabled })
        );
    } else {
        println!(
            "  {} Bot '{}' is now {}.",
            style("✓").green().bold(),
            updated.name,
            format_status(updated.enabled)
        );
    }
    Ok(())
}

/// Delete a registration.
pub async fn remove_bot(state: &AppState, name: &str, json: bool) -> Result<()> {
    let registration = lookup(state, name).await?;
    state.registry.delete(&registration.id).await?;

    tracing::info!(bot = %registration.name, "bot registration removed");

    if json {
        println!(
            "{}",
            serde_json::json!({ "deleted": true, "name": registration.name })
        );
    } else {
        println!(
            "  {} Bot '{}' removed.",
            style("✓").red().bold(),
            registration.name
        );
    }
    Ok(())
}

/// Outcome of checking one environment of a bot.
#[derive(Debug, Serialize)]
pub struct EnvironmentCheck {
    pub environment: Environment,
    pub has_token: bool,
    pub has_domain: bool,
    /// Why the guard would reject this environment, if it would.
    pub conflict: Option<String>,
    pub healthy: bool,
}

/// Run the deployment and cross-environment conflict checks for `name`.
///
/// Fails when any checked environment is unhealthy, so the command can gate
/// a deployment script.
pub async fn check_bot(
    state: &AppState,
    name: &str,
    environment: Option<Environment>,
    json: bool,
) -> Result<()> {
    let registration = lookup(state, name).await?;
    let checks = run_checks(state, &registration, environment).await?;
    let healthy = registration.enabled && checks.iter().all(|c| c.healthy);

    if json {
        let report = serde_json::json!({
            "name": registration.name,
            "enabled": registration.enabled,
            "webhook_path": registration.effective_webhook_path(),
            "environments": checks,
            "healthy": healthy,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!(
            "  Isolation check for '{}'",
            style(&registration.name).cyan()
        );
        println!();
        println!("  {} Bot enabled", check_mark(registration.enabled));
        for check in &checks {
            println!();
            println!("  {}", style(format!("── {} ──", check.environment)).dim());
            println!("  {} Token configured", check_mark(check.has_token));
            println!("  {} Domain configured", check_mark(check.has_domain));
            match &check.conflict {
                None => println!("  {} No cross-environment conflict", check_mark(true)),
                Some(reason) => println!("  {} {}", check_mark(false), reason),
            }
        }
        println!();
    }

    if !healthy {
        bail!("bot '{}' failed its isolation checks", registration.name);
    }
    Ok(())
}

async fn run_checks(
    state: &AppState,
    registration: &BotRegistration,
    environment: Option<Environment>,
) -> Result<Vec<EnvironmentCheck>> {
    let others = state
        .registry
        .find_conflicting_webhook_path(&registration.effective_webhook_path(), &registration.id)
        .await?;

    let environments = match environment {
        Some(env) => vec![env],
        None => Environment::ALL.to_vec(),
    };

    Ok(environments
        .into_iter()
        .map(|env| {
            let conflict = guard::check_conflicts(registration, env, &others)
                .err()
                .map(|reason| reason.to_string());
            EnvironmentCheck {
                environment: env,
                has_token: registration.has_token_for(env),
                has_domain: registration.domain_for(env).is_some(),
                healthy: registration.is_deployed_in(env) && conflict.is_none(),
                conflict,
            }
        })
        .collect())
}

// --- JSON views ---

/// Serializable view of a registration with tokens masked.
#[derive(Debug, Serialize)]
struct RegistrationView<'a> {
    id: String,
    name: &'a str,
    enabled: bool,
    dev: EnvironmentView<'a>,
    prod: EnvironmentView<'a>,
    webhook_path: String,
    webhook_secret_set: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct EnvironmentView<'a> {
    token: Option<String>,
    domain: Option<&'a str>,
    webhook_url: Option<String>,
}

impl<'a> From<&'a BotRegistration> for RegistrationView<'a> {
    fn from(registration: &'a BotRegistration) -> Self {
        let environment = |env| EnvironmentView {
            token: masked_token(registration, env),
            domain: registration.domain_for(env),
            webhook_url: registration.expected_webhook_url(env),
        };
        Self {
            id: registration.id.to_string(),
            name: &registration.name,
            enabled: registration.enabled,
            dev: environment(Environment::Dev),
            prod: environment(Environment::Prod),
            webhook_path: registration.effective_webhook_path(),
            webhook_secret_set: registration.webhook_secret.is_some(),
            created_at: registration.created_at,
            updated_at: registration.updated_at,
        }
    }
}

// --- Formatting helpers ---

fn masked_token(registration: &BotRegistration, env: Environment) -> Option<String> {
    registration
        .token_for(env)
        .map(|token| mask_token(token.expose_secret()))
}

fn environment_summary(registration: &BotRegistration, env: Environment) -> String {
    match (registration.domain_for(env), masked_token(registration, env)) {
        (Some(domain), Some(token)) => format!("{domain}\n{token}"),
        (Some(domain), None) => format!("{domain}\n(no token)"),
        (None, Some(token)) => format!("(no domain)\n{token}"),
        (None, None) => "-".to_string(),
    }
}

fn print_details(registration: &BotRegistration) {
    println!("  {}", style("── Details ──").dim());
    println!("  {}        {}", style("Status:").bold(), format_status(registration.enabled));
    println!(
        "  {}  {}",
        style("Webhook path:").bold(),
        registration.effective_webhook_path()
    );
    println!(
        "  {}        {}",
        style("Secret:").bold(),
        if registration.webhook_secret.is_some() { "set" } else { "none" }
    );
    for env in Environment::ALL {
        println!();
        println!("  {}", style(format!("── {env} ──")).dim());
        println!(
            "  {}         {}",
            style("Token:").bold(),
            masked_token(registration, env).unwrap_or_else(|| "(none)".to_string())
        );
        println!(
            "  {}        {}",
            style("Domain:").bold(),
            registration.domain_for(env).unwrap_or("(none)")
        );
        if let Some(url) = registration.expected_webhook_url(env) {
            println!("  {}   {}", style("Webhook URL:").bold(), style(url).dim());
        }
    }
    println!();
    println!(
        "  {}       {}",
        style("Created:").bold(),
        registration.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!(
        "  {}       {}",
        style("Updated:").bold(),
        registration.updated_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!();
}

fn format_status(enabled: bool) -> String {
    if enabled {
        format!("{}", style("● enabled").green())
    } else {
        format!("{}", style("○ disabled").yellow())
    }
}

fn check_mark(ok: bool) -> String {
    if ok {
        format!("{}", style("✓").green())
    } else {
        format!("{}", style("✗").red())
    }
}

fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now() - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botgate_types::config::GatewayConfig;

    use crate::test_support::{RecordingUpstream, deployed, test_state};

    async fn state() -> AppState {
        test_state(GatewayConfig::default(), &RecordingUpstream::default()).await
    }

    fn prod_fields() -> RegistrationFields {
        RegistrationFields {
            prod_token: Some("123456789:PRODSECRET".to_string()),
            prod_domain: Some("https://bots.example.com".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_slugifies_and_persists() {
        let state = state().await;
        add_bot(&state, "Support Bot", prod_fields(), false, true)
            .await
            .unwrap();

        let stored = lookup(&state, "support-bot").await.unwrap();
        assert!(stored.enabled);
        assert_eq!(
            stored.prod_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("123456789:PRODSECRET".to_string())
        );
        assert!(stored.dev_token.is_none());
    }

    #[tokio::test]
    async fn test_add_rejects_empty_slug_and_duplicates() {
        let state = state().await;
        assert!(add_bot(&state, "!!!", RegistrationFields::default(), false, true)
            .await
            .is_err());

        add_bot(&state, "support", prod_fields(), false, true).await.unwrap();
        let err = add_bot(&state, "support", prod_fields(), false, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_update_sets_and_clears_fields() {
        let state = state().await;
        add_bot(&state, "support", prod_fields(), false, true).await.unwrap();

        let fields = RegistrationFields {
            dev_token: Some("dev-token".to_string()),
            dev_domain: Some("https://dev.example.com".to_string()),
            prod_domain: Some(String::new()),
            ..Default::default()
        };
        update_bot(&state, "support", fields, true).await.unwrap();

        let stored = lookup(&state, "support").await.unwrap();
        assert!(stored.is_deployed_in(Environment::Dev));
        assert_eq!(stored.prod_domain, None);
        assert!(stored.has_token_for(Environment::Prod));
    }

    #[tokio::test]
    async fn test_enable_disable_and_remove() {
        let state = state().await;
        add_bot(&state, "support", prod_fields(), false, true).await.unwrap();

        set_enabled(&state, "support", false, true).await.unwrap();
        assert!(!lookup(&state, "support").await.unwrap().enabled);
        assert!(state
            .registry
            .find_enabled_by_name("support")
            .await
            .unwrap()
            .is_none());

        set_enabled(&state, "support", true, true).await.unwrap();
        assert!(lookup(&state, "support").await.unwrap().enabled);

        remove_bot(&state, "support", true).await.unwrap();
        assert!(lookup(&state, "support").await.is_err());
        assert!(remove_bot(&state, "support", true).await.is_err());
    }

    #[tokio::test]
    async fn test_check_passes_for_isolated_bot() {
        let state = state().await;
        state.registry.create(&deployed("support")).await.unwrap();
        check_bot(&state, "support", None, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_check_reports_cross_environment_conflict() {
        let state = state().await;
        let mut a = deployed("alpha");
        a.webhook_path = Some("/webhook/shared".to_string());
        let mut b = deployed("beta");
        b.webhook_path = Some("/webhook/shared".to_string());
        // beta's dev deployment lives on alpha's prod domain
        b.dev_domain = a.prod_domain.clone();
        state.registry.create(&a).await.unwrap();
        state.registry.create(&b).await.unwrap();

        let reg = lookup(&state, "alpha").await.unwrap();
        let checks = run_checks(&state, &reg, Some(Environment::Prod)).await.unwrap();
        assert_eq!(checks.len(), 1);
        assert!(!checks[0].healthy);
        assert!(checks[0].conflict.is_some());

        assert!(check_bot(&state, "alpha", Some(Environment::Prod), true)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_check_fails_for_undeployed_environment() {
        let state = state().await;
        add_bot(&state, "support", prod_fields(), false, true).await.unwrap();

        check_bot(&state, "support", Some(Environment::Prod), true)
            .await
            .unwrap();
        assert!(check_bot(&state, "support", Some(Environment::Dev), true)
            .await
            .is_err());
    }

    #[test]
    fn test_view_masks_tokens() {
        let reg = deployed("support");
        let json = serde_json::to_string(&RegistrationView::from(&reg)).unwrap();
        assert!(!json.contains("support-prod-token"));
        assert!(json.contains("support-pr..."));
        assert!(json.contains("https://bots.example.com/webhook/support"));
    }
}
