//! Upstream webhook registration: `botgate webhook set|delete`.
//!
//! `set` points one environment's bot token at `{domain}/webhook/{name}` and
//! stores the path and secret the dispatcher will verify. When dev and prod
//! share a domain, the URL also carries `?token=<token>` so incoming requests
//! can be attributed to an environment.
//!
//! Dev and prod share the registration's path and secret. Rotating the secret
//! re-registers the other environment's live webhook, and deleting one
//! environment's webhook leaves both in place while the other is still set.

use anyhow::{Context, Result, anyhow};
use clap::Subcommand;
use console::style;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use botgate_core::repository::bot::BotRegistry;
use botgate_core::resolver::same_host;
use botgate_core::upstream::BotApi;
use botgate_types::bot::{BotRegistration, mask_token};
use botgate_types::environment::Environment;

use crate::cli::bot::lookup;
use crate::state::AppState;

/// Webhook subcommands.
#[derive(Subcommand)]
pub enum WebhookCommand {
    /// Register the gateway as the bot's webhook for one environment.
    Set {
        name: String,

        /// Environment whose token and domain to use.
        #[arg(long)]
        env: Environment,

        /// Generate a new secret even if one is already stored.
        #[arg(long)]
        rotate: bool,
    },

    /// Remove the bot's webhook for one environment.
    Delete {
        name: String,

        #[arg(long)]
        env: Environment,

        /// Also drop updates queued upstream.
        #[arg(long)]
        drop_pending: bool,
    },
}

/// Handle a webhook subcommand.
pub async fn handle_webhook_command(cmd: WebhookCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        WebhookCommand::Set { name, env, rotate } => {
            set_webhook(state, &name, env, rotate, json).await
        }
        WebhookCommand::Delete {
            name,
            env,
            drop_pending,
        } => delete_webhook(state, &name, env, drop_pending, json).await,
    }
}

/// Call `setWebhook` and persist the webhook path and secret.
pub async fn set_webhook(
    state: &AppState,
    name: &str,
    env: Environment,
    rotate: bool,
    json: bool,
) -> Result<()> {
    let mut registration = lookup(state, name).await?;
    let token = credential(&registration, env)?;
    if registration.webhook_path.is_none() {
        registration.webhook_path = Some(registration.default_webhook_path());
    }
    let base_url = registration
        .expected_webhook_url(env)
        .ok_or_else(|| anyhow!("bot '{name}' has no {env} domain configured"))?;

    let disambiguate = shares_domain(&registration);
    let url = if disambiguate {
        format!("{base_url}?token={}", token.expose_secret())
    } else {
        base_url.clone()
    };
    let display_url = if disambiguate {
        format!("{base_url}?token={}", mask_token(token.expose_secret()))
    } else {
        base_url
    };

    let secret = match (&registration.webhook_secret, rotate) {
        (Some(existing), false) => existing.clone(),
        _ => SecretString::from(Uuid::new_v4().simple().to_string()),
    };

    // Both environments verify against the one stored secret, so a rotation
    // has to reach the other environment's webhook too.
    let other = env.opposite();
    let follow_url = if rotate && registration.webhook_secret.is_some() {
        registered_url(state, &registration, other).await?
    } else {
        None
    };

    let api = bot_api(state, &registration, env, token);
    api.call(
        "setWebhook",
        json!({ "url": url, "secret_token": secret.expose_secret() }),
    )
    .await
    .into_result()
    .with_context(|| format!("setWebhook failed for bot '{name}' ({env})"))?;

    registration.webhook_secret = Some(secret.clone());
    let updated = state.registry.update(&registration).await?;

    tracing::info!(bot = %updated.name, environment = %env, url = %display_url, "webhook set");

    if let Some(other_url) = follow_url {
        let other_token = credential(&updated, other)?;
        bot_api(state, &updated, other, other_token)
            .call(
                "setWebhook",
                json!({ "url": other_url, "secret_token": secret.expose_secret() }),
            )
            .await
            .into_result()
            .with_context(|| {
                format!(
                    "{other} webhook still sends the previous secret; run `botgate webhook set {name} --env {other}`"
                )
            })?;
        tracing::info!(bot = %updated.name, environment = %other, "rotated secret applied");
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "name": updated.name,
                "environment": env,
                "url": display_url,
                "webhook_path": updated.effective_webhook_path(),
            }))?
        );
    } else {
        println!();
        println!(
            "  {} Webhook set for '{}' ({})",
            style("✓").green().bold(),
            style(&updated.name).cyan(),
            env
        );
        println!("  {}  {}", style("URL:").bold(), style(&display_url).dim());
        if disambiguate {
            println!(
                "  {} dev and prod share a domain; requests are told apart by the token in the URL.",
                style("i").blue().bold()
            );
        }
        println!();
    }
    Ok(())
}

/// Call `deleteWebhook` and clear the persisted path and secret.
pub async fn delete_webhook(
    state: &AppState,
    name: &str,
    env: Environment,
    drop_pending: bool,
    json: bool,
) -> Result<()> {
    let mut registration = lookup(state, name).await?;
    let token = credential(&registration, env)?;

    let api = bot_api(state, &registration, env, token);
    api.call(
        "deleteWebhook",
        json!({ "drop_pending_updates": drop_pending }),
    )
    .await
    .into_result()
    .with_context(|| format!("deleteWebhook failed for bot '{name}' ({env})"))?;

    // The path and secret are shared with the other environment; keep them
    // while its webhook is still registered upstream.
    let other = env.opposite();
    let other_active = match registered_url(state, &registration, other).await {
        Ok(url) => url.is_some(),
        Err(err) => {
            tracing::warn!(
                bot = %registration.name,
                environment = %other,
                error = %err,
                "could not check webhook, keeping stored secret"
            );
            true
        }
    };
    if !other_active {
        registration.webhook_path = None;
        registration.webhook_secret = None;
    }
    let updated = state.registry.update(&registration).await?;

    tracing::info!(
        bot = %updated.name,
        environment = %env,
        secret_kept = other_active,
        "webhook deleted"
    );

    if json {
        println!(
            "{}",
            json!({ "name": updated.name, "environment": env, "deleted": true })
        );
    } else {
        println!(
            "  {} Webhook deleted for '{}' ({}).",
            style("✓").red().bold(),
            updated.name,
            env
        );
    }
    Ok(())
}

fn credential(registration: &BotRegistration, env: Environment) -> Result<SecretString> {
    registration
        .token_for(env)
        .cloned()
        .ok_or_else(|| anyhow!("bot '{}' has no {env} token configured", registration.name))
}

/// URL the upstream currently delivers `env`'s updates to, if any.
async fn registered_url(
    state: &AppState,
    registration: &BotRegistration,
    env: Environment,
) -> Result<Option<String>> {
    let Some(token) = registration.token_for(env).cloned() else {
        return Ok(None);
    };
    let info = bot_api(state, registration, env, token)
        .call("getWebhookInfo", json!({}))
        .await
        .into_result()
        .with_context(|| format!("getWebhookInfo failed for bot '{}' ({env})", registration.name))?;
    Ok(info
        .get("url")
        .and_then(|url| url.as_str())
        .filter(|url| !url.is_empty())
        .map(str::to_string))
}

fn bot_api(
    state: &AppState,
    registration: &BotRegistration,
    env: Environment,
    token: SecretString,
) -> BotApi {
    BotApi::new(
        state.upstream.clone(),
        &registration.name,
        env,
        token,
        CancellationToken::new(),
    )
}

/// Whether both environments are served from the same host.
fn shares_domain(registration: &BotRegistration) -> bool {
    match (
        registration.domain_for(Environment::Dev),
        registration.domain_for(Environment::Prod),
    ) {
        (Some(dev), Some(prod)) => same_host(dev, prod),
        _ => false,
    }
}
