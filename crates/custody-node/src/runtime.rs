//! # Request Loop
//!
//! One reader task splits the input into lines and queues them; one writer
//! task owns the [`RequestHandler`] and applies them in queue order. Every
//! accepted line yields exactly one response line.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use custody_ledger::adapters::{InMemoryEventFeed, LedgerSnapshot};
use custody_ledger::ipc::{LedgerEnvelope, LedgerReply, LedgerResponseEnvelope, RequestHandler};
use custody_ledger::ports::TimeSource;
use custody_ledger::service::CustodyLedgerService;
use custody_telemetry::metrics::{
    self, record_accepted, record_rejected, record_request, record_role_grant, REQUEST_DURATION,
};
use custody_telemetry::HistogramTimer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Operator commands that bypass the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCommand {
    /// Render Prometheus metrics.
    Metrics,
    /// Stop the loop after answering.
    Shutdown,
}

/// One input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    Control(ControlCommand),
    Request(LedgerEnvelope),
}

/// A line that parsed as JSON but not as an inbound line.
#[derive(Debug)]
pub struct MalformedLine {
    /// The line's `correlation_id` when it carried a readable one, nil otherwise.
    pub correlation_id: Uuid,
    pub error: serde_json::Error,
}

impl InboundLine {
    /// Decode one line. The correlation id is read before the request body,
    /// so a bad body is still answered under the caller's id.
    pub fn decode(line: &str) -> Result<Self, MalformedLine> {
        let value: Value = serde_json::from_str(line).map_err(|error| MalformedLine {
            correlation_id: Uuid::nil(),
            error,
        })?;

        if let Some(control) = value.get("control") {
            return ControlCommand::deserialize(control)
                .map(Self::Control)
                .map_err(|error| MalformedLine {
                    correlation_id: Uuid::nil(),
                    error,
                });
        }

        let correlation_id = value
            .get("correlation_id")
            .and_then(|id| Uuid::deserialize(id).ok())
            .unwrap_or_else(Uuid::nil);
        LedgerEnvelope::deserialize(&value)
            .map(Self::Request)
            .map_err(|error| MalformedLine {
                correlation_id,
                error,
            })
    }
}

/// Answer to a control line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    pub control: ControlCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
}

/// Counters for one run of the loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Lines answered (requests, control lines and malformed lines).
    pub lines: u64,
    /// Lines that were not valid JSON envelopes.
    pub malformed: u64,
}

enum LineOutcome {
    Respond(String),
    Stop(String),
    Skip,
}

/// The node runtime.
pub struct NodeRuntime<T: TimeSource> {
    handler: RequestHandler<InMemoryEventFeed, T>,
    queue_capacity: usize,
    snapshot_path: Option<PathBuf>,
}

impl<T: TimeSource> NodeRuntime<T> {
    /// Build the ledger, restoring the configured snapshot when it exists.
    ///
    /// A restored ledger keeps its history and grants but enforces the
    /// configured policy. Its owner must match the configured owner.
    pub async fn new(config: &NodeConfig, time_source: T) -> Result<Self> {
        let existing = config.snapshot_path.as_ref().filter(|path| path.exists());
        let service = match existing {
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading snapshot {}", path.display()))?;
                let snapshot = LedgerSnapshot::from_json(&json)
                    .with_context(|| format!("parsing snapshot {}", path.display()))?;
                CustodyLedgerService::restore_configured(
                    &snapshot,
                    config.ledger.clone(),
                    InMemoryEventFeed::new(),
                )
                .with_context(|| format!("restoring snapshot {}", path.display()))?
            }
            None => CustodyLedgerService::new(config.ledger.clone(), InMemoryEventFeed::new())
                .context("building ledger from configuration")?,
        };

        Ok(Self {
            handler: RequestHandler::new(Arc::new(service), time_source),
            queue_capacity: config.queue_capacity.max(1),
            snapshot_path: config.snapshot_path.clone(),
        })
    }

    /// The ledger service behind the loop.
    pub fn service(&self) -> &Arc<CustodyLedgerService<InMemoryEventFeed>> {
        self.handler.service()
    }

    /// Serve `input` until end of input or a shutdown line, writing
    /// responses to `output`, then persist the snapshot if configured.
    pub async fn run<R, W>(&self, input: R, output: &mut W) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::channel::<String>(self.queue_capacity);

        let reader = tokio::spawn(async move {
            let mut lines = input.lines();
            while let Some(line) = lines.next_line().await? {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok::<_, std::io::Error>(())
        });

        info!(queue_capacity = self.queue_capacity, "Request loop started");
        let mut summary = RunSummary::default();
        let mut stopped = false;

        while let Some(line) = rx.recv().await {
            let (text, stop) = match self.process_line(&line, &mut summary).await {
                LineOutcome::Respond(text) => (text, false),
                LineOutcome::Stop(text) => (text, true),
                LineOutcome::Skip => continue,
            };
            summary.lines += 1;
            output
                .write_all(text.as_bytes())
                .await
                .context("writing response")?;
            output.write_all(b"\n").await.context("writing response")?;
            output.flush().await.context("flushing response")?;
            if stop {
                stopped = true;
                break;
            }
        }

        drop(rx);
        if stopped {
            reader.abort();
        } else {
            match reader.await {
                Ok(result) => result.context("reading requests")?,
                Err(e) => error!(error = %e, "Request reader task failed"),
            }
        }

        self.persist_snapshot().await?;
        info!(
            lines = summary.lines,
            malformed = summary.malformed,
            "Request loop stopped"
        );
        Ok(summary)
    }

    async fn process_line(&self, line: &str, summary: &mut RunSummary) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Skip;
        }

        let inbound = match InboundLine::decode(line) {
            Ok(inbound) => inbound,
            Err(MalformedLine {
                correlation_id,
                error,
            }) => {
                summary.malformed += 1;
                warn!(correlation_id = %correlation_id, error = %error, "Malformed request line");
                record_request("malformed");
                let response = LedgerResponseEnvelope::bad_request(
                    correlation_id,
                    format!("malformed request: {error}"),
                );
                return LineOutcome::Respond(encode(&response));
            }
        };

        match inbound {
            InboundLine::Control(control) => self.control(control),
            InboundLine::Request(envelope) => {
                let method = envelope.request.method();
                let is_write = envelope.request.is_write();
                record_request(method);
                let response = {
                    let _timer = HistogramTimer::new(&REQUEST_DURATION);
                    self.handler.handle(envelope).await
                };
                if is_write {
                    record_write_outcome(&response);
                }
                LineOutcome::Respond(encode(&response))
            }
        }
    }

    fn control(&self, command: ControlCommand) -> LineOutcome {
        debug!(?command, "Control command");
        match command {
            ControlCommand::Metrics => {
                let metrics = match metrics::encode_metrics() {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!(error = %e, "Failed to encode metrics");
                        None
                    }
                };
                LineOutcome::Respond(encode(&ControlReply {
                    control: command,
                    metrics,
                }))
            }
            ControlCommand::Shutdown => {
                info!("Shutdown requested");
                LineOutcome::Stop(encode(&ControlReply {
                    control: command,
                    metrics: None,
                }))
            }
        }
    }

    async fn persist_snapshot(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let json = self
            .service()
            .snapshot()
            .await
            .to_json()
            .context("encoding snapshot")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        info!(path = %path.display(), "Snapshot written");
        Ok(())
    }
}

fn record_write_outcome(response: &LedgerResponseEnvelope) {
    match (&response.result, &response.error) {
        (Some(LedgerReply::Receipt(receipt)), _) => {
            record_accepted(&receipt.kind.to_string(), receipt.flagged.is_some());
        }
        (Some(LedgerReply::Granted(_)), _) => record_role_grant(),
        (_, Some(error)) => record_rejected(&error.code),
        _ => {}
    }
}

fn encode<S: Serialize>(value: &S) -> String {
    match serde_json::to_string(value) {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "Failed to encode response");
            let fallback = LedgerResponseEnvelope::bad_request(Uuid::nil(), "unencodable response");
            serde_json::to_string(&fallback).unwrap_or_default()
        }
    }
}
