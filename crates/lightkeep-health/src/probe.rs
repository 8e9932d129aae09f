//! HTTP reachability probe.
//!
//! A probe is a single GET with a hard timeout. Any response below 400 is
//! healthy; every other response and every transport failure (timeout, DNS,
//! refused connection, TLS) is unhealthy. Redirects are not followed — a
//! 3xx counts as reachable.

use std::time::Duration;

use tracing::debug;

use lightkeep_registry::HealthStatus;

/// Result of a single reachability probe.
///
/// Exactly two values: callers that need failure visibility inspect the
/// stored status, never catch errors. The surrounding system assigns
/// `unknown` only to records that have no target at all — the probe itself
/// never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The target answered with a status below 400.
    Healthy,
    /// The target answered with an error status, or did not answer.
    Unhealthy,
}

impl From<ProbeOutcome> for HealthStatus {
    fn from(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Healthy => HealthStatus::Healthy,
            ProbeOutcome::Unhealthy => HealthStatus::Unhealthy,
        }
    }
}

/// Build the shared probe client with the hard per-request timeout.
pub fn probe_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Resolve a probe target into a full URL.
///
/// A target that already carries a scheme is used as-is; anything else is
/// treated as `host[:port]` and probed over plain HTTP (port 80 implied).
pub fn resolve_probe_url(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("http://{target}")
    }
}

/// Probe a target once. Never fails; every failure mode maps to
/// [`ProbeOutcome::Unhealthy`].
pub async fn http_probe(client: &reqwest::Client, target: &str) -> ProbeOutcome {
    let url = resolve_probe_url(target);
    match client.get(&url).send().await {
        Ok(resp) if resp.status().as_u16() < 400 => ProbeOutcome::Healthy,
        Ok(resp) => {
            debug!(%url, status = %resp.status(), "probe got error status");
            ProbeOutcome::Unhealthy
        }
        Err(e) => {
            debug!(%url, error = %e, "probe failed");
            ProbeOutcome::Unhealthy
        }
    }
}
