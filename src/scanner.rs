use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::progress::Console;
use crate::types::{ProbeFailure, ProbeOutcome, ProbeStatus, RunResult};
use crate::wordlist;
use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Load the wordlist named in `config`, then probe every candidate.
///
/// Configuration and wordlist problems are returned before any request is sent.
pub async fn run(config: &Config, console: Console, cancel: CancellationToken) -> Result<RunResult> {
    config.validate()?;
    let candidates = wordlist::load_candidates(&config.wordlist, &config.extensions)?;
    info!(
        candidates = candidates.len(),
        wordlist = %config.wordlist.display(),
        "wordlist loaded"
    );
    fuzz_with_cancel(config, &candidates, console, cancel).await
}

/// Probe each candidate under `config.url` with at most `config.concurrency` requests in flight.
///
/// - Limits in-flight requests using a `Semaphore`.
/// - Bounds every request with `tokio::time::timeout`; a timeout is a failed probe, not an error.
/// - Reportable outcomes are collected in completion order.
pub async fn fuzz(config: &Config, candidates: &[String], console: Console) -> Result<RunResult> {
    fuzz_internal(config, candidates, console, None).await
}

/// Variant that accepts a `CancellationToken` to allow external cancellation.
///
/// Once the token fires no new probe is started and in-flight probes return
/// `Cancelled`; whatever was collected so far is still returned.
pub async fn fuzz_with_cancel(
    config: &Config,
    candidates: &[String],
    console: Console,
    cancel: CancellationToken,
) -> Result<RunResult> {
    fuzz_internal(config, candidates, console, Some(cancel)).await
}

/// Build the client shared by all probes.
pub fn build_client(config: &Config) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .context("failed to build HTTP client")
}

async fn fuzz_internal(
    config: &Config,
    candidates: &[String],
    console: Console,
    cancel_opt: Option<CancellationToken>,
) -> Result<RunResult> {
    let total = candidates.len() as u64;
    let processed = Arc::new(AtomicU64::new(0));
    let aggregator = Aggregator::new();
    let client = build_client(config)?;
    let cancel = cancel_opt.unwrap_or_default();

    let sem = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut set = JoinSet::new();
    let start = Instant::now();

    info!(
        target_url = config.base_url(),
        total,
        concurrency = config.concurrency,
        "starting run"
    );
    console.progress(0, total);

    for candidate in candidates {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = sem.clone().acquire_owned() => permit.context("probe semaphore closed")?,
        };

        let client = client.clone();
        let url = config.candidate_url(candidate);
        let candidate = candidate.clone();
        let timeout = config.timeout;
        let policy = config.status_policy.clone();
        let verbose = config.verbose;
        let aggregator = aggregator.clone();
        let processed = processed.clone();
        let console = console.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let _permit = permit; // keep permit until task completes

            let status = probe(&client, &url, timeout, &cancel).await;
            if let ProbeStatus::Failed(why) = &status {
                debug!(%url, error = %why, "probe failed");
                if verbose {
                    console.message(&format!("Error {candidate}: {why}"));
                }
            }

            let outcome = ProbeOutcome::new(candidate, url, status, &policy);
            if outcome.is_reportable() {
                console.result(&outcome);
                aggregator.push(outcome).await;
            }

            let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
            console.progress(current, total);
        });
    }

    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            // The task died before counting itself; treat it like a network failure.
            warn!(error = %e, "probe task aborted");
            let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
            console.progress(current, total);
        }
    }
    console.finish();

    let entries = aggregator.take().await;
    let results = RunResult {
        total,
        processed: processed.load(Ordering::Relaxed),
        reported: entries.len() as u64,
        elapsed_ms: start.elapsed().as_millis() as u64,
        cancelled: cancel.is_cancelled(),
        entries,
    };
    info!(
        processed = results.processed,
        reported = results.reported,
        cancelled = results.cancelled,
        elapsed_ms = results.elapsed_ms,
        "run finished"
    );
    Ok(results)
}

/// Send one GET, racing it against the timeout and the cancellation token.
async fn probe(client: &Client, url: &str, timeout: Duration, cancel: &CancellationToken) -> ProbeStatus {
    tokio::select! {
        _ = cancel.cancelled() => ProbeStatus::Cancelled,
        res = time::timeout(timeout, client.get(url).send()) => match res {
            Ok(Ok(resp)) => ProbeStatus::Completed(resp.status().as_u16()),
            Ok(Err(e)) if e.is_timeout() => ProbeStatus::Failed(ProbeFailure::Timeout),
            Ok(Err(e)) => ProbeStatus::Failed(ProbeFailure::Network(error_chain(&e))),
            Err(_elapsed) => ProbeStatus::Failed(ProbeFailure::Timeout),
        },
    }
}

/// reqwest's top-level message is usually just "error sending request"; append the causes.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
