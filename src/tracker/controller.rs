use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::state::{GenerateRejected, GenerationTracker, Observation, Ticket, SUBMIT_FAILED_MESSAGE};
use super::timer::{PollTimer, TickFlow};
use crate::api::SummaryBackend;
use crate::config::Config;
use crate::models::{Language, Style, Summary, SummaryFilter};
use crate::notify::{NoticeKind, Notifier};

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub ceiling: Duration,
    pub resume_skew: Duration,
    /// Page size used when re-fetching a PDF's summaries.
    pub summary_limit: u32,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            ceiling: config.poll_ceiling(),
            resume_skew: config.resume_skew(),
            summary_limit: config.page_limit,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Raw results from background tasks, tagged with the request they belong to.
#[derive(Debug)]
enum GenerationEvent {
    Submitted {
        ticket: Ticket,
        pdf_id: String,
        result: Result<Summary, String>,
    },
    Polled {
        ticket: Ticket,
        pdf_id: String,
        result: Result<Vec<Summary>, String>,
    },
    /// `at` is when the ceiling passed, which may be well before the
    /// event is drained.
    CeilingReached {
        ticket: Ticket,
        pdf_id: String,
        at: Instant,
    },
}

/// What changed after an event was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerUpdate {
    Started { pdf_id: String, summary_id: String },
    SubmitFailed(String),
    /// Latest summary list while the job is still running.
    Progress { pdf_id: String, summaries: Vec<Summary> },
    Completed(Summary),
    Failed { message: String, timed_out: bool },
    /// The polling ceiling passed with the job still processing.
    Stalled { pdf_id: String, summary_id: String },
}

/// Drives a [`GenerationTracker`]: submits generate requests, runs the poll
/// loop and feeds results back through a channel. Call [`try_drain`] from a
/// UI loop or [`next_update`] to wait.
///
/// [`try_drain`]: GenerationController::try_drain
/// [`next_update`]: GenerationController::next_update
pub struct GenerationController {
    backend: Arc<dyn SummaryBackend>,
    notifier: Arc<dyn Notifier>,
    tracker: GenerationTracker,
    timer: PollTimer,
    settings: PollSettings,
    events_tx: mpsc::Sender<GenerationEvent>,
    events_rx: mpsc::Receiver<GenerationEvent>,
}

impl GenerationController {
    pub fn new(backend: Arc<dyn SummaryBackend>, notifier: Arc<dyn Notifier>, settings: PollSettings) -> Self {
        let (events_tx, events_rx) = mpsc::channel(16);
        Self {
            backend,
            notifier,
            tracker: GenerationTracker::new(settings.resume_skew),
            timer: PollTimer::new(),
            settings,
            events_tx,
            events_rx,
        }
    }

    pub fn tracker(&self) -> &GenerationTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut GenerationTracker {
        &mut self.tracker
    }

    /// Request a new summary for `pdf_id` in the background.
    pub fn generate(
        &mut self,
        pdf_id: Option<&str>,
        language: Language,
        style: Option<Style>,
    ) -> Result<Ticket, GenerateRejected> {
        let pdf_id = pdf_id.ok_or(GenerateRejected::NoTarget)?;
        let style = style.ok_or(GenerateRejected::NoStyle)?;
        let ticket = self.tracker.begin(Some(pdf_id), Some(style))?;

        // a finished loop may still hold its handle
        self.timer.cancel();

        let backend = Arc::clone(&self.backend);
        let tx = self.events_tx.clone();
        let pdf_id = pdf_id.to_string();
        tracing::info!("Requesting {} summary ({}) for {}", style, language, pdf_id);

        tokio::spawn(async move {
            let result = backend
                .generate_summary(&pdf_id, language, style)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(GenerationEvent::Submitted { ticket, pdf_id, result }).await;
        });

        Ok(ticket)
    }

    /// Resume polling if `summaries` (freshly loaded for `pdf_id`) contain a
    /// job that is still processing.
    pub fn resume(&mut self, pdf_id: &str, summaries: &[Summary]) -> bool {
        match self.tracker.resume(pdf_id, summaries, Instant::now()) {
            Some((ticket, summary_id)) => {
                tracing::info!("Resuming summary {} for {}", summary_id, pdf_id);
                self.start_polling(ticket, pdf_id.to_string(), summary_id);
                true
            }
            None => false,
        }
    }

    /// Stop polling and forget the current job, e.g. when the active PDF
    /// changes. Anything still in flight is dropped when it arrives.
    pub fn cancel(&mut self) {
        if self.tracker.is_in_flight() {
            tracing::debug!("Cancelling generation tracking");
        }
        self.timer.cancel();
        self.tracker.reset();
    }

    /// Apply every event that has already arrived, without waiting.
    pub fn try_drain(&mut self) -> Vec<TrackerUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            if let Some(update) = self.apply(event) {
                updates.push(update);
            }
        }
        updates
    }

    /// Wait for the next event that changes something.
    pub async fn next_update(&mut self) -> Option<TrackerUpdate> {
        loop {
            let event = self.events_rx.recv().await?;
            if let Some(update) = self.apply(event) {
                return Some(update);
            }
        }
    }

    fn start_polling(&mut self, ticket: Ticket, pdf_id: String, summary_id: String) {
        let backend = Arc::clone(&self.backend);
        let tx = self.events_tx.clone();
        let ceiling_tx = self.events_tx.clone();
        let limit = self.settings.summary_limit;
        let ceiling_pdf = pdf_id.clone();

        let on_tick = move || {
            let backend = Arc::clone(&backend);
            let tx = tx.clone();
            let pdf_id = pdf_id.clone();
            let summary_id = summary_id.clone();
            async move {
                let result = backend
                    .list_summaries(&pdf_id, &SummaryFilter::default(), 1, limit)
                    .await
                    .map(|page| page.data)
                    .map_err(|e| e.to_string());

                let resolved = result.as_ref().is_ok_and(|list| {
                    list.iter()
                        .any(|s| s.id == summary_id && !s.is_processing())
                });
                let _ = tx.send(GenerationEvent::Polled { ticket, pdf_id, result }).await;

                if resolved {
                    TickFlow::Stop
                } else {
                    TickFlow::Continue
                }
            }
        };

        // waits for room rather than dropping the notice when nobody drained
        let on_ceiling = move || async move {
            let event = GenerationEvent::CeilingReached {
                ticket,
                pdf_id: ceiling_pdf,
                at: Instant::now(),
            };
            if ceiling_tx.send(event).await.is_err() {
                tracing::debug!("Generation controller gone before the polling ceiling");
            }
        };

        self.timer
            .start(self.settings.interval, self.settings.ceiling, on_tick, on_ceiling);
    }

    fn apply(&mut self, event: GenerationEvent) -> Option<TrackerUpdate> {
        match event {
            GenerationEvent::Submitted { ticket, pdf_id, result: Ok(summary) } => {
                if !self.tracker.submitted(ticket, &pdf_id, &summary, Instant::now()) {
                    tracing::debug!("Ignoring stale generate response for {}", pdf_id);
                    return None;
                }
                let summary_id = summary.id.clone();
                self.start_polling(ticket, pdf_id.clone(), summary_id.clone());
                Some(TrackerUpdate::Started { pdf_id, summary_id })
            }

            GenerationEvent::Submitted { ticket, pdf_id, result: Err(e) } => {
                if !self.tracker.submit_failed(ticket, &pdf_id) {
                    return None;
                }
                tracing::error!("Failed to generate summary: {}", e);
                self.notifier.notify(SUBMIT_FAILED_MESSAGE, NoticeKind::Error);
                Some(TrackerUpdate::SubmitFailed(SUBMIT_FAILED_MESSAGE.to_string()))
            }

            GenerationEvent::Polled { ticket, pdf_id, result: Ok(summaries) } => {
                match self.tracker.observe(ticket, &pdf_id, &summaries) {
                    Observation::Ignored => None,
                    Observation::NotMaterialized | Observation::Processing => {
                        Some(TrackerUpdate::Progress { pdf_id, summaries })
                    }
                    Observation::Completed(summary) => {
                        self.timer.cancel();
                        self.notifier
                            .notify("Summary generated successfully", NoticeKind::Success);
                        Some(TrackerUpdate::Completed(summary))
                    }
                    Observation::Failed(message) => {
                        self.timer.cancel();
                        self.notifier.notify(&message, NoticeKind::Error);
                        Some(TrackerUpdate::Failed { message, timed_out: false })
                    }
                    Observation::TimedOut(message) => {
                        self.timer.cancel();
                        self.notifier.notify(&message, NoticeKind::Error);
                        Some(TrackerUpdate::Failed { message, timed_out: true })
                    }
                }
            }

            GenerationEvent::Polled { ticket, pdf_id, result: Err(e) } => {
                if self.tracker.accepts(ticket, &pdf_id) {
                    tracing::warn!("Failed to check summary status: {}", e);
                }
                None
            }

            GenerationEvent::CeilingReached { ticket, pdf_id, at } => {
                if !self.tracker.ceiling_reached(ticket, &pdf_id, at) {
                    return None;
                }
                let summary_id = self
                    .tracker
                    .session()
                    .map(|s| s.summary_id.clone())
                    .unwrap_or_default();
                tracing::warn!(
                    "Stopped polling summary {} after {:?}; it is still processing",
                    summary_id,
                    self.settings.ceiling
                );
                Some(TrackerUpdate::Stalled { pdf_id, summary_id })
            }
        }
    }
}
