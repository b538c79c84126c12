//! Batch command implementation.
//!
//! Runs one paginated fetch per parameter value through the batch executor,
//! with a progress bar and Ctrl-C cancelling whatever has not started yet.

use super::Request;
use crate::display::write_values;
use crate::settings::build_client;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use tessera_lib::prelude::*;

/// Fetch `request` once for each value of the `key` parameter.
pub(crate) async fn batch(
    settings: &Settings,
    request: Request,
    key: &str,
    values: &[String],
    concurrency: usize,
    quiet: bool,
) -> Result<()> {
    let client = build_client(settings)?;
    let executor = BatchExecutor::new(settings.batch);
    let endpoint = request.endpoint();
    let max_pages = request.max_pages(settings);

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(values.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .context("Invalid progress template")?
                .progress_chars("=>-"),
        );
        pb.set_message(format!("{} {} by {key}", endpoint.method(), endpoint.path()));
        pb
    };

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        let progress = progress.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                progress.println("Cancelling: waiting for in-flight requests to finish");
                cancel.cancel();
            }
        }
    });

    let options = BatchRunOptions::new()
        .with_concurrency(concurrency)
        .with_cancel(cancel)
        .with_progress({
            let progress = progress.clone();
            move |completed, _total| progress.set_position(completed as u64)
        });
    options.validate()?;

    let (client, endpoint) = (&client, &endpoint);
    let operations = values.iter().map(|value| {
        let mut params = request.params.clone();
        params.insert(key.to_string(), value.clone());
        move || {
            let params = params.clone();
            async move { client.fetch_all_pages(endpoint, &params, max_pages).await }
        }
    });

    let report = executor.run_report(operations, &options).await;
    ctrl_c.abort();

    progress.finish_with_message(format!(
        "{} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    ));

    for failure in &report.failed {
        eprintln!(
            "  {key}={}: [{}] {} (after {} attempts)",
            values[failure.index],
            failure.error.category(),
            failure.error,
            failure.attempts
        );
    }

    let groups: Vec<Value> = report
        .succeeded
        .iter()
        .map(|(index, result)| {
            json!({
                key: values[*index],
                "pages": result.pages,
                "truncated": result.truncated,
                "items": result.items,
            })
        })
        .collect();

    report
        .into_result(options.is_sequential())
        .context("Batch failed")?;

    write_values(&groups, request.output.as_deref(), request.format)?;

    if !quiet && let Some(output) = &request.output {
        eprintln!("Output written to: {}", output.display());
    }

    Ok(())
}
