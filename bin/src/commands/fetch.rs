//! Fetch command implementation.
//!
//! Follows an endpoint's continuation tokens and writes the concatenated items.

use super::Request;
use crate::display::write_values;
use crate::settings::build_client;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tessera_lib::prelude::*;

/// Fetch every page of one endpoint, retrying transient failures.
pub(crate) async fn fetch(settings: &Settings, request: Request, quiet: bool) -> Result<()> {
    let client = build_client(settings)?;
    let executor = BatchExecutor::new(settings.batch);
    let endpoint = request.endpoint();
    let max_pages = request.max_pages(settings);

    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid progress template")?,
        );
        pb.set_message(format!("{} {}", endpoint.method(), endpoint.path()));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let (client, endpoint, params) = (&client, &endpoint, &request.params);
    let result = executor
        .execute(move || client.fetch_all_pages(endpoint, params, max_pages))
        .await
        .with_context(|| format!("Failed to fetch {}", endpoint.path()))?;

    let finish_msg = if result.truncated {
        format!(
            "Fetched {} items in {} pages (stopped at page cap, more data available)",
            result.len(),
            result.pages
        )
    } else {
        format!("Fetched {} items in {} pages", result.len(), result.pages)
    };
    spinner.finish_with_message(finish_msg);

    write_values(&result.items, request.output.as_deref(), request.format)?;

    if !quiet && let Some(output) = &request.output {
        eprintln!("Output written to: {}", output.display());
    }

    Ok(())
}
