//! Downloading models through the runtime's streaming pull API.
//!
//! The runtime reports progress as newline-delimited JSON records whose shape
//! is not a stable contract. Each record is parsed on its own and skipped if it
//! does not parse. Whether a pull worked is decided afterwards by asking the
//! runtime for its installed models, never by the last status string.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::RuntimeApi;
use crate::models::{
    canonical_name, InstalledModelSet, OnStatus, OperationId, PullPhase, PullProgressEvent,
};

/// Capacity of a pull's event channel.
const EVENT_BUFFER: usize = 64;

/// One progress record as sent by the runtime.
#[derive(Debug, Default, Deserialize)]
struct PullRecord {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

/// A pull running in the background, publishing typed progress events.
///
/// The channel carries exactly one terminal event (`Success` or `Failed`) and
/// is closed right after it. Dropping `events` or calling [`PullHandle::cancel`]
/// severs the download; the presence check still runs.
pub struct PullHandle {
    pub operation_id: OperationId,
    pub events: mpsc::Receiver<PullProgressEvent>,
    cancel: CancellationToken,
    task: JoinHandle<bool>,
}

impl PullHandle {
    /// A handle for a pull that never started, carrying one `Failed` event.
    pub(crate) fn failed(status: String) -> Self {
        let operation_id = OperationId::new();
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(PullProgressEvent {
            operation_id,
            phase: PullPhase::Failed,
            status,
            percent: None,
        });

        PullHandle {
            operation_id,
            events: rx,
            cancel: CancellationToken::new(),
            task: tokio::spawn(async { false }),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the pull to end and return whether the model is now installed.
    ///
    /// Drain `events` first: dropping the handle with undelivered events cancels the pull.
    pub async fn finish(self) -> bool {
        let PullHandle { events, task, .. } = self;
        drop(events);
        task.await.unwrap_or(false)
    }
}

/// Drives pulls; at most one per model id at a time.
#[derive(Clone)]
pub struct PullOrchestrator {
    api: Arc<dyn RuntimeApi>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Marks a model id as being pulled until dropped.
struct InFlight {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl PullOrchestrator {
    pub fn new(api: Arc<dyn RuntimeApi>) -> Self {
        Self {
            api,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether a pull of `model` is currently running.
    pub fn is_pulling(&self, model: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&canonical_name(model))
    }

    fn reserve(&self, model: &str) -> Option<InFlight> {
        let key = canonical_name(model);
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(key.clone()) {
            return None;
        }
        Some(InFlight {
            set: self.in_flight.clone(),
            key,
        })
    }

    /// Pull `model`, forwarding each record's status text to `on_status`.
    ///
    /// A second pull of a model already in flight is rejected with `false`.
    pub async fn pull(&self, model: &str, on_status: OnStatus<'_>) -> bool {
        let Some(_guard) = self.reserve(model) else {
            on_status(&already_pulling(model));
            return false;
        };
        let cancel = CancellationToken::new();
        self.drive(model, OperationId::new(), &cancel, None, on_status)
            .await
    }

    /// Start a pull in the background and return its event stream.
    pub fn pull_with_events(&self, model: &str) -> PullHandle {
        let operation_id = OperationId::new();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let guard = self.reserve(model);

        let this = self.clone();
        let model = model.to_string();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let Some(_guard) = guard else {
                let _ = tx
                    .send(PullProgressEvent {
                        operation_id,
                        phase: PullPhase::Failed,
                        status: already_pulling(&model),
                        percent: None,
                    })
                    .await;
                return false;
            };
            let quiet = |_: &str| {};
            this.drive(&model, operation_id, &token, Some(&tx), &quiet)
                .await
        });

        PullHandle {
            operation_id,
            events: rx,
            cancel,
            task,
        }
    }

    async fn drive(
        &self,
        model: &str,
        operation_id: OperationId,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<PullProgressEvent>>,
        on_status: OnStatus<'_>,
    ) -> bool {
        info!("Pull {} started for {}", operation_id, model);
        let mut last_status: Option<String> = None;

        match self.api.pull(model).await {
            Ok(mut lines) => loop {
                let receiver_gone = async {
                    match events {
                        Some(tx) => tx.closed().await,
                        None => std::future::pending().await,
                    }
                };

                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Pull {} cancelled", operation_id);
                        break;
                    }
                    _ = receiver_gone => {
                        info!("Pull {} abandoned by its listener", operation_id);
                        break;
                    }
                    line = lines.next() => line,
                };

                let line = match next {
                    None => break,
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        warn!("Pull stream for {} ended early: {}", model, e);
                        break;
                    }
                };

                let Some(event) = parse_record(&line, operation_id) else {
                    warn!("Skipping unparseable pull record: {}", line);
                    continue;
                };

                on_status(&event.status);
                last_status = Some(event.status.clone());

                if let Some(tx) = events {
                    if tx.send(event).await.is_err() {
                        debug!("Pull {} listener dropped", operation_id);
                        break;
                    }
                }
            },
            Err(e) => {
                warn!("Pull request for {} failed: {}", model, e);
                let status = format!("Pull failed: {}", e);
                on_status(&status);
                last_status = Some(status);
            }
        }

        let present = self.is_present(model).await;
        let terminal = if present {
            info!("Pull {} finished: {} installed", operation_id, model);
            PullProgressEvent {
                operation_id,
                phase: PullPhase::Success,
                status: "success".to_string(),
                percent: Some(100.0),
            }
        } else {
            warn!("Pull {} finished without {} installed", operation_id, model);
            let status = match last_status {
                Some(last) => format!("{} was not installed (last status: {})", model, last),
                None => format!("{} was not installed", model),
            };
            on_status(&status);
            PullProgressEvent {
                operation_id,
                phase: PullPhase::Failed,
                status,
                percent: None,
            }
        };

        if let Some(tx) = events {
            let _ = tx.send(terminal).await;
        }
        present
    }

    async fn is_present(&self, model: &str) -> bool {
        match self.api.list_models().await {
            Ok(models) => models.into_iter().collect::<InstalledModelSet>().contains(model),
            Err(e) => {
                warn!("Could not list installed models after pull: {}", e);
                false
            }
        }
    }
}

fn already_pulling(model: &str) -> String {
    format!("A pull of {} is already in progress", model)
}

/// Turn one raw record into a non-terminal progress event.
fn parse_record(line: &str, operation_id: OperationId) -> Option<PullProgressEvent> {
    let record: PullRecord = serde_json::from_str(line).ok()?;

    let status = match (&record.error, &record.status, &record.digest) {
        (Some(error), _, _) => format!("error: {}", error),
        (None, Some(status), _) => status.clone(),
        (None, None, Some(digest)) => digest.clone(),
        (None, None, None) => return None,
    };

    let percent = match (record.completed, record.total) {
        (Some(completed), Some(total)) if total > 0 => {
            Some((completed as f64 / total as f64 * 100.0).min(100.0))
        }
        _ => percent_in_prose(&status),
    };

    Some(PullProgressEvent {
        operation_id,
        phase: classify(&status),
        status,
        percent,
    })
}

fn classify(status: &str) -> PullPhase {
    let status = status.trim().to_lowercase();
    if status.starts_with("pulling manifest") {
        PullPhase::Manifest
    } else if status.starts_with("pulling ") || status.starts_with("downloading") {
        PullPhase::Downloading
    } else if status.starts_with("verifying") {
        PullPhase::Verifying
    } else if status.starts_with("writing") {
        PullPhase::Writing
    } else {
        PullPhase::Other
    }
}

/// Percentage written inside prose, e.g. "downloading: 42%".
fn percent_in_prose(text: &str) -> Option<f64> {
    let head = &text[..text.find('%')?];
    let start = head
        .char_indices()
        .rev()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    head[start..]
        .parse::<f64>()
        .ok()
        .filter(|p| (0.0..=100.0).contains(p))
}
