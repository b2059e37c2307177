//! Downstream delivery of validated telemetry.
//!
//! Every outcome of a delivery (2xx, any other status, transport failure,
//! timeout) is logged here and nowhere else. Callers never see a delivery
//! failure affect the device session.

use std::sync::Arc;
use std::time::Duration;

use sensorlink_core::TelemetrySample;
use thiserror::Error;

/// One failed delivery attempt. Logged and dropped.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("downstream answered HTTP {0}")]
    Status(u16),

    #[error("downstream transport error: {0}")]
    Transport(String),

    #[error("downstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Downstream consumer collaborator. Blocking; the relay runs it off the
/// async runtime. Must be safe to call from many sessions at once.
pub trait Forwarder: Send + Sync {
    fn forward(&self, report: &TelemetrySample) -> Result<(), ForwardError>;
}

/// POSTs each report as JSON to a fixed URL.
pub struct HttpForwarder {
    url: String,
    agent: ureq::Agent,
}

impl HttpForwarder {
    /// `timeout` bounds the whole request, connect included.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            url: url.into(),
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Forwarder for HttpForwarder {
    fn forward(&self, report: &TelemetrySample) -> Result<(), ForwardError> {
        let body = serde_json::to_string(report)?;
        match self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(resp) if (200..300).contains(&resp.status()) => Ok(()),
            Ok(resp) => Err(ForwardError::Status(resp.status())),
            Err(ureq::Error::Status(code, _)) => Err(ForwardError::Status(code)),
            Err(ureq::Error::Transport(t)) => Err(ForwardError::Transport(t.to_string())),
        }
    }
}

/// Accepts and drops every report. Used when no callback URL is configured.
pub struct DiscardForwarder;

impl Forwarder for DiscardForwarder {
    fn forward(&self, report: &TelemetrySample) -> Result<(), ForwardError> {
        log::debug!("no downstream configured, dropping report from {}", report.sn);
        Ok(())
    }
}

/// Run one delivery on the blocking pool, bounded by `timeout`, and log how
/// it went. The result is returned for tests; the relay ignores it.
pub async fn deliver(
    forwarder: Arc<dyn Forwarder>,
    report: TelemetrySample,
    timeout: Duration,
) -> Result<(), ForwardError> {
    let sn = report.sn.clone();
    let task = tokio::task::spawn_blocking(move || forwarder.forward(&report));
    let result = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join)) => Err(ForwardError::Transport(join.to_string())),
        Err(_) => Err(ForwardError::Timeout(timeout)),
    };
    match &result {
        Ok(()) => log::info!("report from {sn} forwarded"),
        Err(e) => log::warn!("report from {sn} not forwarded: {e}"),
    }
    result
}
