//! Settings resolution: file, then environment and flags on top.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tessera_lib::prelude::*;
use tracing::debug;

/// Values given on the command line that take precedence over the settings file.
#[derive(Default)]
pub(crate) struct Overrides {
    pub(crate) config: Option<PathBuf>,
    pub(crate) api_key: Option<String>,
    pub(crate) plan: Option<String>,
    pub(crate) base_url: Option<String>,
}

/// Loads the settings file and applies the overrides.
pub(crate) fn resolve(overrides: &Overrides) -> Result<Settings> {
    let mut settings = match &overrides.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load_or_default().context("Failed to load default settings")?,
    };

    if let Some(api_key) = &overrides.api_key {
        settings.client.api_key.clone_from(api_key);
    }
    if let Some(plan) = &overrides.plan {
        settings.client.plan = plan.parse::<PlanTier>()?;
    }
    if let Some(base_url) = &overrides.base_url {
        settings.client.base_url.clone_from(base_url);
    }

    settings.validate()?;
    debug!(
        plan = %settings.client.plan,
        base_url = %settings.client.base_url,
        max_retries = settings.batch.max_retries,
        "settings resolved"
    );
    Ok(settings)
}

/// Creates a client dispatching through a fresh gate for the configured plan.
pub(crate) fn build_client(settings: &Settings) -> Result<ApiClient> {
    let gate = RateLimitGate::for_plan(settings.client.plan);
    ApiClient::new(settings.client.clone(), gate).context("Failed to create HTTP client")
}
