//! Generation state machine.
//!
//! `Idle -> Requesting -> Polling -> {Completed, Failed, TimedOut}`, and any
//! terminal phase may start a new request. The tracker does no I/O and
//! never reads the clock; callers pass `now`. Every request gets a fresh
//! ticket, and events carrying any other ticket (or another PDF) are
//! ignored, which is how late responses for an abandoned target are
//! discarded.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::time::Instant;

use crate::models::{Style, Summary, SummaryStatus};

pub const NO_TEXT_MESSAGE: &str =
    "This PDF contains no readable text. Please upload a PDF with text content, not just images or scans.";
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to generate summary";
const FAILED_FALLBACK: &str = "Summary generation failed";
const TIMEOUT_FALLBACK: &str = "Summary generation timed out";

pub type Ticket = u64;

/// Case-insensitive "no text" or "no extractable text" anywhere in the detail.
fn no_text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)no (extractable )?text").expect("valid regex"))
}

/// Message shown for a job the backend resolved as failed or timed out.
pub fn failure_message(detail: Option<&str>, fallback: &str) -> String {
    match detail {
        Some(detail) if no_text_pattern().is_match(detail) => NO_TEXT_MESSAGE.to_string(),
        Some(detail) => detail.to_string(),
        None => fallback.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Requesting,
    Polling,
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSession {
    pub pdf_id: String,
    pub summary_id: String,
    pub started_at: Instant,
    /// Set when the polling ceiling stopped the loop before resolution.
    pub abandoned_at: Option<Instant>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateRejected {
    #[error("Select a PDF first")]
    NoTarget,
    #[error("Select a writing style first")]
    NoStyle,
    #[error("A summary is already being generated")]
    InFlight,
}

/// Result of inspecting a polled summary list.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Not for the current request.
    Ignored,
    /// The tracked summary is not in the list yet.
    NotMaterialized,
    Processing,
    Completed(Summary),
    Failed(String),
    TimedOut(String),
}

#[derive(Debug)]
pub struct GenerationTracker {
    phase: Phase,
    ticket: Ticket,
    next_ticket: Ticket,
    target: Option<String>,
    session: Option<GenerationSession>,
    result: Option<Summary>,
    error: Option<String>,
    resume_skew: Duration,
}

impl GenerationTracker {
    pub fn new(resume_skew: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            ticket: 0,
            next_ticket: 1,
            target: None,
            session: None,
            result: None,
            error: None,
            resume_skew,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<&GenerationSession> {
        self.session.as_ref()
    }

    /// The summary currently shown as the generation result.
    pub fn result(&self) -> Option<&Summary> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase, Phase::Requesting | Phase::Polling)
    }

    /// True once the ceiling stopped polling a still-processing job.
    pub fn is_stalled(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.abandoned_at.is_some())
    }

    /// Seconds shown in the progress display; frozen once polling stopped.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        if self.phase != Phase::Polling {
            return None;
        }
        self.session.as_ref().map(|s| {
            s.abandoned_at
                .unwrap_or(now)
                .saturating_duration_since(s.started_at)
        })
    }

    fn issue_ticket(&mut self) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.ticket = ticket;
        ticket
    }

    fn is_current(&self, ticket: Ticket, pdf_id: &str) -> bool {
        ticket == self.ticket && self.target.as_deref() == Some(pdf_id)
    }

    /// Whether an event for `(ticket, pdf_id)` would still be acted on.
    pub fn accepts(&self, ticket: Ticket, pdf_id: &str) -> bool {
        self.is_in_flight() && self.is_current(ticket, pdf_id)
    }

    pub fn begin(
        &mut self,
        pdf_id: Option<&str>,
        style: Option<Style>,
    ) -> Result<Ticket, GenerateRejected> {
        let pdf_id = pdf_id.ok_or(GenerateRejected::NoTarget)?;
        if style.is_none() {
            return Err(GenerateRejected::NoStyle);
        }
        // a stalled job no longer blocks a new request
        if self.is_in_flight() && !self.is_stalled() {
            return Err(GenerateRejected::InFlight);
        }

        let ticket = self.issue_ticket();
        self.phase = Phase::Requesting;
        self.target = Some(pdf_id.to_string());
        self.session = None;
        self.result = None;
        self.error = None;
        Ok(ticket)
    }

    /// The generate call returned `summary`; start tracking it.
    pub fn submitted(&mut self, ticket: Ticket, pdf_id: &str, summary: &Summary, now: Instant) -> bool {
        if self.phase != Phase::Requesting || !self.is_current(ticket, pdf_id) {
            return false;
        }
        self.session = Some(GenerationSession {
            pdf_id: pdf_id.to_string(),
            summary_id: summary.id.clone(),
            started_at: now,
            abandoned_at: None,
        });
        self.phase = Phase::Polling;
        true
    }

    pub fn submit_failed(&mut self, ticket: Ticket, pdf_id: &str) -> bool {
        if self.phase != Phase::Requesting || !self.is_current(ticket, pdf_id) {
            return false;
        }
        self.phase = Phase::Failed;
        self.error = Some(SUBMIT_FAILED_MESSAGE.to_string());
        true
    }

    pub fn observe(&mut self, ticket: Ticket, pdf_id: &str, summaries: &[Summary]) -> Observation {
        if self.phase != Phase::Polling || !self.is_current(ticket, pdf_id) {
            return Observation::Ignored;
        }
        let Some(session) = self.session.as_ref() else {
            return Observation::Ignored;
        };
        let Some(summary) = summaries.iter().find(|s| s.id == session.summary_id) else {
            return Observation::NotMaterialized;
        };

        let observation = match summary.status {
            SummaryStatus::Processing => return Observation::Processing,
            SummaryStatus::Completed => {
                self.phase = Phase::Completed;
                self.result = Some(summary.clone());
                Observation::Completed(summary.clone())
            }
            SummaryStatus::Timeout => {
                let message = failure_message(summary.error_detail(), TIMEOUT_FALLBACK);
                self.phase = Phase::TimedOut;
                self.error = Some(message.clone());
                Observation::TimedOut(message)
            }
            SummaryStatus::Failed | SummaryStatus::Unknown => {
                let message = failure_message(summary.error_detail(), FAILED_FALLBACK);
                self.phase = Phase::Failed;
                self.error = Some(message.clone());
                Observation::Failed(message)
            }
        };
        self.session = None;
        observation
    }

    /// The polling ceiling fired. The phase is left alone.
    pub fn ceiling_reached(&mut self, ticket: Ticket, pdf_id: &str, now: Instant) -> bool {
        if self.phase != Phase::Polling || !self.is_current(ticket, pdf_id) {
            return false;
        }
        match self.session.as_mut() {
            Some(session) if session.abandoned_at.is_none() => {
                session.abandoned_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Pick up a job that was already processing when `pdf_id` was loaded.
    /// The start time is backdated by the resume skew since the real one
    /// is unknown.
    pub fn resume(&mut self, pdf_id: &str, summaries: &[Summary], now: Instant) -> Option<(Ticket, String)> {
        if self.is_in_flight() {
            return None;
        }
        let processing = summaries.iter().find(|s| s.is_processing())?;

        let ticket = self.issue_ticket();
        self.phase = Phase::Polling;
        self.target = Some(pdf_id.to_string());
        self.error = None;
        self.session = Some(GenerationSession {
            pdf_id: pdf_id.to_string(),
            summary_id: processing.id.clone(),
            started_at: now.checked_sub(self.resume_skew).unwrap_or(now),
            abandoned_at: None,
        });
        Some((ticket, processing.id.clone()))
    }

    /// Drop any request or session, e.g. when the active PDF changes.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.ticket = 0;
        self.target = None;
        self.session = None;
        self.result = None;
        self.error = None;
    }

    /// Show `summary` as the result without touching an in-flight job.
    pub fn set_result(&mut self, summary: Option<Summary>) {
        self.result = summary;
    }

    /// Apply a local edit to the shown result.
    pub fn update_result_content(&mut self, summary_id: &str, content: &str) {
        if let Some(result) = self.result.as_mut().filter(|r| r.id == summary_id) {
            result.content = content.to_string();
            result.is_edited = true;
        }
    }
}
