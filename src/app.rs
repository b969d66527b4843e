use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;

use crate::api::{ApiClient, SummaryBackend};
use crate::config::Config;
use crate::error::Result;
use crate::history::{OptimisticRemoval, PdfHistory, SummaryHistory};
use crate::models::{
    parse_date, ExportFormat, Language, Page, PdfRecord, Style, Summary, SummaryStatus,
};
use crate::notify::{NoticeKind, Notifier, ToastBoard};
use crate::tracker::{GenerationController, PollSettings, TrackerUpdate};
use crate::tui::{AppAction, KeyMode};
use crate::upload::{self, PdfValidator, UploadStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Pdfs,
    Summaries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    UploadPath,
    Search,
    DateRange,
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::UploadPath => " Upload PDF - path to file ",
            PromptKind::Search => " Search ",
            PromptKind::DateRange => " Date range - YYYY-MM-DD..YYYY-MM-DD (empty clears) ",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub pane: Pane,
    pub buffer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingDelete {
    Pdf { id: String, name: String },
    Summary { id: String },
}

impl PendingDelete {
    pub fn question(&self) -> String {
        match self {
            PendingDelete::Pdf { name, .. } => {
                format!("Delete \"{name}\" and all of its summaries?")
            }
            PendingDelete::Summary { .. } => "Delete this summary?".to_string(),
        }
    }
}

// Results of background requests
enum TaskOutcome {
    Pdfs {
        seq: u64,
        result: Result<Page<PdfRecord>>,
    },
    Summaries {
        seq: u64,
        pdf_id: String,
        result: Result<Page<Summary>>,
    },
    UploadProgress(UploadStage),
    Uploaded(Result<PdfRecord>),
    PdfDeleted(Result<()>),
    SummaryDeleted(Result<()>),
    SummaryEdited {
        id: String,
        content: String,
        result: Result<()>,
    },
    Exported {
        label: String,
        result: Result<PathBuf>,
    },
}

impl TaskOutcome {
    fn is_progress(&self) -> bool {
        matches!(self, TaskOutcome::UploadProgress(_))
    }
}

/// A PDF delete waiting on the backend. `list_seq` is the PDF list's
/// request number when the row was removed.
struct PdfRemoval {
    removal: OptimisticRemoval<PdfRecord>,
    list_seq: u64,
}

/// A summary delete waiting on the backend, with the PDF it belonged to
/// and the result shown before the delete.
struct SummaryRemoval {
    removal: OptimisticRemoval<Summary>,
    pdf_id: Option<String>,
    list_seq: u64,
    previous_result: Option<Summary>,
}

pub struct App {
    pub config: Config,
    backend: Arc<dyn SummaryBackend>,
    pub toasts: Arc<ToastBoard>,
    validator: PdfValidator,

    // Data
    pub pdfs: PdfHistory,
    pub summaries: SummaryHistory,
    active_pdf: Option<String>,
    active_record: Option<PdfRecord>,
    load_result_on_sync: bool,

    // Generation
    pub generation: GenerationController,
    pub language: Language,
    pub style: Option<Style>,

    // UI State
    pub focus: Pane,
    pub show_help: bool,
    pub prompt: Option<Prompt>,
    pub confirm: Option<PendingDelete>,
    pub upload_stage: Option<UploadStage>,
    edit_request: Option<Summary>,
    spinner_frame: usize,

    // Async state
    pdf_removal: Option<PdfRemoval>,
    summary_removal: Option<SummaryRemoval>,
    tasks_tx: mpsc::Sender<TaskOutcome>,
    tasks_rx: mpsc::Receiver<TaskOutcome>,
    in_flight: usize,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let backend = ApiClient::new(&config.backend_url, config.request_timeout())?;
        Ok(Self::with_backend(
            config,
            Arc::new(backend),
            Arc::new(ToastBoard::default()),
        ))
    }

    pub fn with_backend(
        config: Config,
        backend: Arc<dyn SummaryBackend>,
        toasts: Arc<ToastBoard>,
    ) -> Self {
        let generation = GenerationController::new(
            Arc::clone(&backend),
            toasts.clone(),
            PollSettings::from_config(&config),
        );
        let (tasks_tx, tasks_rx) = mpsc::channel(32);

        Self {
            validator: PdfValidator::from_config(&config),
            pdfs: PdfHistory::new(config.page_limit),
            summaries: SummaryHistory::new(config.page_limit),
            active_pdf: None,
            active_record: None,
            load_result_on_sync: false,
            generation,
            language: config.default_language,
            style: None,
            focus: Pane::Pdfs,
            show_help: false,
            prompt: None,
            confirm: None,
            upload_stage: None,
            edit_request: None,
            spinner_frame: 0,
            pdf_removal: None,
            summary_removal: None,
            tasks_tx,
            tasks_rx,
            in_flight: 0,
            backend,
            toasts,
            config,
        }
    }

    pub fn key_mode(&self) -> KeyMode {
        if self.show_help {
            KeyMode::Help
        } else if self.confirm.is_some() {
            KeyMode::Confirm
        } else if self.prompt.is_some() {
            KeyMode::Input
        } else {
            KeyMode::Normal
        }
    }

    pub fn active_pdf(&self) -> Option<&PdfRecord> {
        let id = self.active_pdf.as_deref()?;
        self.pdfs
            .items()
            .iter()
            .find(|p| p.id == id)
            .or(self.active_record.as_ref())
    }

    /// The summary shown in the result pane.
    pub fn active_summary(&self) -> Option<&Summary> {
        self.generation.tracker().result()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn spinner(&self) -> &'static str {
        const FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
        FRAMES[self.spinner_frame % FRAMES.len()]
    }

    pub fn tick_spinner(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
    }

    pub fn handle_action(&mut self, action: AppAction) -> bool {
        match action {
            AppAction::Quit => {
                self.generation.cancel();
                return true;
            }

            AppAction::MoveUp => match self.focus {
                Pane::Pdfs => self.pdfs.select_prev(),
                Pane::Summaries => self.summaries.select_prev(),
            },

            AppAction::MoveDown => match self.focus {
                Pane::Pdfs => self.pdfs.select_next(),
                Pane::Summaries => self.summaries.select_next(),
            },

            AppAction::MoveToTop => match self.focus {
                Pane::Pdfs => self.pdfs.select_first(),
                Pane::Summaries => self.summaries.select_first(),
            },

            AppAction::MoveToBottom => match self.focus {
                Pane::Pdfs => self.pdfs.select_last(),
                Pane::Summaries => self.summaries.select_last(),
            },

            AppAction::NextPane => {
                self.focus = match self.focus {
                    Pane::Pdfs if self.active_pdf.is_some() => Pane::Summaries,
                    _ => Pane::Pdfs,
                };
            }

            AppAction::Select => match self.focus {
                Pane::Pdfs => {
                    if let Some(pdf) = self.pdfs.selected().cloned() {
                        self.activate_pdf(pdf);
                        self.focus = Pane::Summaries;
                    }
                }
                Pane::Summaries => {
                    if let Some(summary) = self.summaries.selected().cloned() {
                        self.generation.tracker_mut().set_result(Some(summary));
                    }
                }
            },

            AppAction::Refresh => self.refresh(),

            AppAction::NextPage => {
                match self.focus {
                    Pane::Pdfs => self.pdfs.next_page(),
                    Pane::Summaries => self.summaries.next_page(),
                };
            }

            AppAction::PrevPage => {
                match self.focus {
                    Pane::Pdfs => self.pdfs.prev_page(),
                    Pane::Summaries => self.summaries.prev_page(),
                };
            }

            AppAction::Generate => self.generate(),

            AppAction::NewSummary => {
                let tracker = self.generation.tracker();
                if tracker.is_in_flight() && !tracker.is_stalled() {
                    self.toasts
                        .notify("A summary is already being generated", NoticeKind::Error);
                } else {
                    self.generation.cancel();
                    self.style = None;
                }
            }

            AppAction::CycleLanguage => self.language = self.language.cycle(),

            AppAction::CycleStyle => self.style = Style::cycle(self.style),

            AppAction::SearchStart => {
                let buffer = match self.focus {
                    Pane::Pdfs => self.pdfs.filter().search.clone(),
                    Pane::Summaries => self.summaries.filter().search.clone(),
                };
                self.open_prompt(PromptKind::Search, buffer);
            }

            AppAction::DateRangeStart => {
                let (from, to) = match self.focus {
                    Pane::Pdfs => (self.pdfs.filter().date_from, self.pdfs.filter().date_to),
                    Pane::Summaries => (
                        self.summaries.filter().date_from,
                        self.summaries.filter().date_to,
                    ),
                };
                self.open_prompt(PromptKind::DateRange, format_date_range(from, to));
            }

            AppAction::CycleSort => {
                let result = match self.focus {
                    Pane::Pdfs => {
                        let next = self.pdfs.filter().sort.cycle();
                        self.pdfs.set_sort(next)
                    }
                    Pane::Summaries => {
                        let next = self.summaries.filter().sort.cycle();
                        self.summaries.set_sort(next)
                    }
                };
                self.report_filter_result(result);
            }

            AppAction::CycleStatusFilter => {
                let next = cycle_option(&SummaryStatus::FILTERABLE, self.summaries.filter().status);
                let result = self.summaries.set_status(next);
                self.report_filter_result(result);
            }

            AppAction::CycleLanguageFilter => {
                let next = cycle_option(&Language::ALL, self.summaries.filter().language);
                let result = self.summaries.set_language(next);
                self.report_filter_result(result);
            }

            AppAction::CycleStyleFilter => {
                let next = Style::cycle(self.summaries.filter().style);
                let result = self.summaries.set_style(next);
                self.report_filter_result(result);
            }

            AppAction::ClearFilters => {
                match self.focus {
                    Pane::Pdfs => self.pdfs.clear_filters(),
                    Pane::Summaries => self.summaries.clear_filters(),
                };
            }

            AppAction::UploadStart => self.open_prompt(PromptKind::UploadPath, String::new()),

            AppAction::EditSummary => {
                let editable = self
                    .active_summary()
                    .filter(|s| s.status == SummaryStatus::Completed)
                    .cloned();
                match editable {
                    Some(summary) => self.edit_request = Some(summary),
                    None => self
                        .toasts
                        .notify("Select a completed summary to edit", NoticeKind::Info),
                }
            }

            AppAction::Delete => {
                self.confirm = match self.focus {
                    Pane::Pdfs => self.pdfs.selected().map(|pdf| PendingDelete::Pdf {
                        id: pdf.id.clone(),
                        name: pdf.display_name().to_string(),
                    }),
                    Pane::Summaries => self
                        .summaries
                        .selected()
                        .map(|s| PendingDelete::Summary { id: s.id.clone() }),
                };
            }

            AppAction::ConfirmYes => match self.confirm.take() {
                Some(PendingDelete::Pdf { id, .. }) => self.delete_pdf(&id),
                Some(PendingDelete::Summary { id }) => self.delete_summary(&id),
                None => {}
            },

            AppAction::ConfirmNo => self.confirm = None,

            AppAction::SaveSummary => self.save_summary(),

            AppAction::OpenPreview => {
                let pdf = self.active_pdf().or(self.pdfs.selected());
                if let Some(pdf) = pdf {
                    let url = pdf.preview_url(&self.config.backend_url);
                    if let Err(e) = open::that(&url) {
                        tracing::error!("Failed to open {}: {}", url, e);
                        self.toasts.notify("Failed to open PDF preview", NoticeKind::Error);
                    }
                }
            }

            AppAction::Export(format) => self.export(format),

            AppAction::ShowHelp => self.show_help = true,

            AppAction::HideHelp => self.show_help = false,

            AppAction::InputChar(c) => {
                if let Some(prompt) = self.prompt.as_mut() {
                    prompt.buffer.push(c);
                }
            }

            AppAction::InputBackspace => {
                if let Some(prompt) = self.prompt.as_mut() {
                    prompt.buffer.pop();
                }
            }

            AppAction::InputConfirm => {
                if let Some(prompt) = self.prompt.take() {
                    self.submit_prompt(prompt);
                }
            }

            AppAction::InputCancel => self.prompt = None,
        }

        false
    }

    fn open_prompt(&mut self, kind: PromptKind, buffer: String) {
        self.prompt = Some(Prompt {
            kind,
            pane: self.focus,
            buffer,
        });
    }

    fn submit_prompt(&mut self, prompt: Prompt) {
        match prompt.kind {
            PromptKind::UploadPath => {
                let raw = prompt.buffer.trim();
                if !raw.is_empty() {
                    self.start_upload(expand_home(raw));
                }
            }

            PromptKind::Search => {
                let result = match prompt.pane {
                    Pane::Pdfs => self.pdfs.set_search(&prompt.buffer),
                    Pane::Summaries => self.summaries.set_search(&prompt.buffer),
                };
                self.report_filter_result(result);
            }

            PromptKind::DateRange => match parse_date_range(&prompt.buffer) {
                Ok((from, to)) => {
                    let result = match prompt.pane {
                        Pane::Pdfs => self.pdfs.set_date_range(from, to),
                        Pane::Summaries => self.summaries.set_date_range(from, to),
                    };
                    self.report_filter_result(result);
                }
                Err(e) => self.toasts.notify(&e, NoticeKind::Error),
            },
        }
    }

    fn report_filter_result(&self, result: Result<bool>) {
        if let Err(e) = result {
            self.toasts.notify(&e.to_string(), NoticeKind::Error);
        }
    }

    fn refresh(&mut self) {
        self.pdfs.mark_dirty();
        if self.active_pdf.is_some() {
            self.summaries.mark_dirty();
            // a stalled job gets picked up again by the next summary load
            if self.generation.tracker().is_stalled() {
                self.generation.cancel();
                self.load_result_on_sync = true;
            }
        }
    }

    /// Make `pdf` the generation target. Switching away stops any polling
    /// for the previous PDF.
    fn activate_pdf(&mut self, pdf: PdfRecord) {
        if self.active_pdf.as_deref() == Some(pdf.id.as_str()) {
            self.active_record = Some(pdf);
            return;
        }
        tracing::debug!("Switching to PDF {}", pdf.id);
        self.generation.cancel();
        self.active_pdf = Some(pdf.id.clone());
        self.active_record = Some(pdf);
        self.summaries.reset();
        self.load_result_on_sync = true;
    }

    fn deactivate_pdf(&mut self) {
        self.generation.cancel();
        self.active_pdf = None;
        self.active_record = None;
        self.summaries.reset();
        self.load_result_on_sync = false;
        self.focus = Pane::Pdfs;
    }

    fn generate(&mut self) {
        let result = self
            .generation
            .generate(self.active_pdf.as_deref(), self.language, self.style);
        if let Err(rejected) = result {
            self.toasts.notify(&rejected.to_string(), NoticeKind::Error);
        }
    }

    pub fn start_upload(&mut self, path: PathBuf) {
        // a new upload abandons whatever was being tracked
        self.generation.cancel();
        self.upload_stage = Some(UploadStage::Validating);

        let backend = Arc::clone(&self.backend);
        let validator = self.validator;
        let language = self.language;
        let style = self.style;
        let progress_tx = self.tasks_tx.clone();

        self.spawn_task(async move {
            let result = upload::upload_pdf(&*backend, &validator, &path, language, style, |stage| {
                let _ = progress_tx.try_send(TaskOutcome::UploadProgress(stage));
            })
            .await;
            TaskOutcome::Uploaded(result)
        });
    }

    /// Summary waiting to be opened in the external editor.
    pub fn take_edit_request(&mut self) -> Option<Summary> {
        self.edit_request.take()
    }

    pub fn submit_edit(&mut self, id: &str, content: String) {
        let backend = Arc::clone(&self.backend);
        let id = id.to_string();
        self.spawn_task(async move {
            let result = backend.update_summary(&id, &content).await;
            TaskOutcome::SummaryEdited {
                id,
                content,
                result,
            }
        });
    }

    fn delete_pdf(&mut self, id: &str) {
        if self.pdf_removal.is_some() {
            self.toasts
                .notify("Wait for the previous delete to finish", NoticeKind::Info);
            return;
        }

        let mut active = self.active_pdf.clone();
        let removal = OptimisticRemoval::apply(self.pdfs.items_mut(), &mut active, id);
        self.pdfs.clamp_selection();
        if removal.was_active() {
            self.deactivate_pdf();
        }
        self.pdf_removal = Some(PdfRemoval {
            removal,
            list_seq: self.pdfs.request_seq(),
        });

        let backend = Arc::clone(&self.backend);
        let id = id.to_string();
        self.spawn_task(async move { TaskOutcome::PdfDeleted(backend.delete_pdf(&id).await) });
    }

    fn delete_summary(&mut self, id: &str) {
        if self.summary_removal.is_some() {
            self.toasts
                .notify("Wait for the previous delete to finish", NoticeKind::Info);
            return;
        }

        let previous_result = self.active_summary().cloned();
        let mut active = previous_result.as_ref().map(|s| s.id.clone());
        let removal = OptimisticRemoval::apply(self.summaries.items_mut(), &mut active, id);
        self.summaries.clamp_selection();
        if removal.was_active() {
            self.generation.tracker_mut().set_result(None);
        }
        let tracked = self.generation.tracker().session().map(|s| s.summary_id.as_str());
        if tracked == Some(id) {
            self.generation.cancel();
        }
        self.summary_removal = Some(SummaryRemoval {
            removal,
            pdf_id: self.active_pdf.clone(),
            list_seq: self.summaries.request_seq(),
            previous_result,
        });

        let backend = Arc::clone(&self.backend);
        let id = id.to_string();
        self.spawn_task(async move {
            TaskOutcome::SummaryDeleted(backend.delete_summary(&id).await)
        });
    }

    fn save_summary(&mut self) {
        let Some(summary) = self.active_summary() else {
            self.toasts.notify("No summary to save", NoticeKind::Info);
            return;
        };
        let stem = self
            .active_pdf()
            .map(|pdf| pdf.stem().to_string())
            .unwrap_or_else(|| summary.pdf_id.clone());

        match write_summary_file(&self.config.download_dir(), &stem, &summary.content) {
            Ok(path) => self.toasts.notify(
                &format!("Summary saved to {}", path.display()),
                NoticeKind::Success,
            ),
            Err(e) => {
                tracing::error!("Failed to save summary: {}", e);
                self.toasts.notify("Failed to save summary", NoticeKind::Error);
            }
        }
    }

    fn export(&mut self, format: ExportFormat) {
        let backend = Arc::clone(&self.backend);
        let dir = self.config.download_dir();
        let upper = format.as_str().to_uppercase();

        match self.focus {
            Pane::Pdfs => {
                let filter = self.pdfs.export_filter();
                self.spawn_task(async move {
                    let result = match backend.export_pdfs(filter.as_ref(), format).await {
                        Ok(file) => file.save_in(&dir),
                        Err(e) => Err(e),
                    };
                    TaskOutcome::Exported {
                        label: format!("Exported as {upper}"),
                        result,
                    }
                });
            }
            Pane::Summaries => {
                let Some(pdf_id) = self.active_pdf.clone() else {
                    return;
                };
                let filter = self.summaries.export_filter();
                self.spawn_task(async move {
                    let result = match backend
                        .export_summaries(&pdf_id, filter.as_ref(), format)
                        .await
                    {
                        Ok(file) => file.save_in(&dir),
                        Err(e) => Err(e),
                    };
                    TaskOutcome::Exported {
                        label: format!("Summaries exported as {upper}"),
                        result,
                    }
                });
            }
        }
    }

    fn spawn_task<Fut>(&mut self, task: Fut)
    where
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tasks_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(task.await).await;
        });
    }

    /// Start fetches for any list whose filters or page changed.
    fn sync_lists(&mut self) {
        if let Some(request) = self.pdfs.take_request() {
            let backend = Arc::clone(&self.backend);
            self.spawn_task(async move {
                let result = backend
                    .list_pdfs(&request.filter, request.page, request.limit)
                    .await;
                TaskOutcome::Pdfs {
                    seq: request.seq,
                    result,
                }
            });
        }

        let Some(pdf_id) = self.active_pdf.clone() else {
            return;
        };
        if let Some(request) = self.summaries.take_request() {
            let backend = Arc::clone(&self.backend);
            self.spawn_task(async move {
                let result = backend
                    .list_summaries(&pdf_id, &request.filter, request.page, request.limit)
                    .await;
                TaskOutcome::Summaries {
                    seq: request.seq,
                    pdf_id,
                    result,
                }
            });
        }
    }

    /// Called once per frame: apply finished background work and kick off
    /// any fetches it made necessary. Never blocks.
    pub fn poll_background(&mut self) {
        while let Ok(outcome) = self.tasks_rx.try_recv() {
            self.apply_outcome(outcome);
        }
        for update in self.generation.try_drain() {
            self.apply_tracker_update(update);
        }
        self.sync_lists();
    }

    fn apply_outcome(&mut self, outcome: TaskOutcome) {
        if !outcome.is_progress() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }

        match outcome {
            TaskOutcome::Pdfs { seq, result } => match result {
                Ok(page) => {
                    self.pdfs.apply_page(seq, page);
                }
                Err(e) => {
                    tracing::error!("Failed to load PDFs: {}", e);
                    self.toasts.notify(
                        &format!("Failed to load PDFs: {}", e.user_message()),
                        NoticeKind::Error,
                    );
                }
            },

            TaskOutcome::Summaries { seq, pdf_id, result } => {
                // only for the PDF that is still active
                if self.active_pdf.as_deref() != Some(pdf_id.as_str()) {
                    return;
                }
                match result {
                    Ok(page) => {
                        if self.summaries.apply_page(seq, page) {
                            self.on_summaries_loaded(&pdf_id);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to load summaries: {}", e);
                        self.toasts.notify(
                            &format!("Failed to load summaries: {}", e.user_message()),
                            NoticeKind::Error,
                        );
                    }
                }
            }

            TaskOutcome::UploadProgress(stage) => self.upload_stage = Some(stage),

            TaskOutcome::Uploaded(Ok(pdf)) => {
                self.upload_stage = Some(UploadStage::Complete);
                self.toasts
                    .notify("PDF uploaded successfully", NoticeKind::Success);
                self.pdfs.items_mut().insert(0, pdf.clone());
                self.pdfs.select_first();
                self.activate_pdf(pdf);
            }

            TaskOutcome::Uploaded(Err(e)) => {
                self.upload_stage = None;
                tracing::error!("Upload failed: {}", e);
                self.toasts.notify(&e.user_message(), NoticeKind::Error);
            }

            TaskOutcome::PdfDeleted(result) => {
                let Some(PdfRemoval { removal, list_seq }) = self.pdf_removal.take() else {
                    return;
                };
                match result {
                    Ok(()) => {
                        self.toasts.notify("PDF deleted", NoticeKind::Success);
                        self.pdfs.mark_dirty();
                    }
                    Err(e) => {
                        tracing::error!("Failed to delete PDF {}: {}", removal.removed_id(), e);
                        self.rollback_pdf_removal(removal, list_seq);
                        self.toasts.notify("Failed to delete PDF", NoticeKind::Error);
                    }
                }
            }

            TaskOutcome::SummaryDeleted(result) => {
                let Some(pending) = self.summary_removal.take() else {
                    return;
                };
                match result {
                    Ok(()) => {
                        self.toasts.notify("Summary deleted", NoticeKind::Success);
                        self.summaries.mark_dirty();
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to delete summary {}: {}",
                            pending.removal.removed_id(),
                            e
                        );
                        self.rollback_summary_removal(pending);
                        self.toasts
                            .notify("Failed to delete summary", NoticeKind::Error);
                    }
                }
            }

            TaskOutcome::SummaryEdited { id, content, result } => match result {
                Ok(()) => {
                    self.generation
                        .tracker_mut()
                        .update_result_content(&id, &content);
                    if let Some(item) = self.summaries.items_mut().iter_mut().find(|s| s.id == id) {
                        item.content = content;
                        item.is_edited = true;
                    }
                    self.summaries.mark_dirty();
                    self.toasts.notify("Summary saved", NoticeKind::Success);
                }
                Err(e) => {
                    tracing::error!("Failed to save summary {}: {}", id, e);
                    self.toasts.notify("Failed to save summary", NoticeKind::Error);
                }
            },

            TaskOutcome::Exported { label, result } => match result {
                Ok(path) => {
                    tracing::info!("Export written to {}", path.display());
                    self.toasts.notify(&label, NoticeKind::Success);
                }
                Err(e) => {
                    tracing::error!("Export failed: {}", e);
                    self.toasts.notify("Export failed", NoticeKind::Error);
                }
            },
        }
    }

    /// Undo a refused PDF delete. A list that has been refetched since the
    /// delete is left alone and reloaded instead, and the selection is only
    /// restored when nothing else was picked in the meantime.
    fn rollback_pdf_removal(&mut self, removal: OptimisticRemoval<PdfRecord>, list_seq: u64) {
        if self.pdfs.request_seq() != list_seq {
            self.pdfs.mark_dirty();
            return;
        }
        let reselect = self.active_pdf.is_none();
        let mut restored = None;
        let was_active = removal.rollback(self.pdfs.items_mut(), &mut restored);
        self.pdfs.clamp_selection();
        if was_active && reselect {
            let pdf = restored.and_then(|id| self.pdfs.items().iter().find(|p| p.id == id).cloned());
            if let Some(pdf) = pdf {
                self.activate_pdf(pdf);
            }
        }
    }

    /// Undo a refused summary delete, but only into the PDF it came from.
    fn rollback_summary_removal(&mut self, pending: SummaryRemoval) {
        let SummaryRemoval {
            removal,
            pdf_id,
            list_seq,
            previous_result,
        } = pending;
        if self.active_pdf != pdf_id {
            tracing::debug!("Dropping summary rollback for a PDF that is no longer active");
            return;
        }

        let was_active = removal.was_active();
        if self.summaries.request_seq() == list_seq {
            removal.rollback(self.summaries.items_mut(), &mut None);
            self.summaries.clamp_selection();
        } else {
            self.summaries.mark_dirty();
        }
        if was_active && self.active_summary().is_none() {
            self.generation.tracker_mut().set_result(previous_result);
        }
    }

    fn on_summaries_loaded(&mut self, pdf_id: &str) {
        if std::mem::take(&mut self.load_result_on_sync) && !self.generation.tracker().is_in_flight() {
            let latest = self
                .summaries
                .items()
                .iter()
                .find(|s| s.status == SummaryStatus::Completed)
                .cloned();
            self.generation.tracker_mut().set_result(latest);
        }
        let items = self.summaries.items().to_vec();
        self.generation.resume(pdf_id, &items);
    }

    fn apply_tracker_update(&mut self, update: TrackerUpdate) {
        match update {
            TrackerUpdate::Started { .. }
            | TrackerUpdate::Completed(_)
            | TrackerUpdate::Failed { .. } => self.summaries.mark_dirty(),

            TrackerUpdate::Progress { pdf_id, summaries } => {
                if self.active_pdf.as_deref() != Some(pdf_id.as_str()) {
                    return;
                }
                for item in self.summaries.items_mut().iter_mut() {
                    if let Some(fresh) = summaries.iter().find(|s| s.id == item.id) {
                        *item = fresh.clone();
                    }
                }
            }

            TrackerUpdate::Stalled { .. } => self.toasts.notify(
                "Summary is still processing. Press r to check again.",
                NoticeKind::Info,
            ),

            TrackerUpdate::SubmitFailed(_) => {}
        }
    }
}

fn cycle_option<T: Copy + PartialEq>(all: &[T], current: Option<T>) -> Option<T> {
    match current {
        None => all.first().copied(),
        Some(value) => all
            .iter()
            .position(|v| *v == value)
            .and_then(|idx| all.get(idx + 1))
            .copied(),
    }
}

fn format_date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> String {
    if from.is_none() && to.is_none() {
        return String::new();
    }
    let fmt = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
    format!("{}..{}", fmt(from), fmt(to))
}

/// `FROM..TO` where either side may be empty; a bare date means that single
/// day.
pub fn parse_date_range(raw: &str) -> std::result::Result<(Option<NaiveDate>, Option<NaiveDate>), String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok((None, None));
    }
    let parse = |s: &str| {
        let s = s.trim();
        if s.is_empty() {
            Ok(None)
        } else {
            parse_date(s).map(Some)
        }
    };
    match raw.split_once("..") {
        Some((from, to)) => Ok((parse(from)?, parse(to)?)),
        None => {
            let day = parse(raw)?;
            Ok((day, day))
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    match (raw.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

/// Write `content` as `<stem>_summary.txt` under `dir`.
pub fn write_summary_file(dir: &Path, stem: &str, content: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}_summary.txt"));
    std::fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{pdf_fixture, summary_fixture, FakeBackend};
    use crate::models::PdfStatus;
    use crate::tracker::Phase;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Fixture {
        app: App,
        backend: Arc<FakeBackend>,
        dir: tempfile::TempDir,
    }

    fn fixture(backend: FakeBackend) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            download_dir: Some(dir.path().to_string_lossy().to_string()),
            ..Config::default()
        };
        let backend = Arc::new(backend);
        let app = App::with_backend(config, backend.clone(), Arc::new(ToastBoard::default()));
        Fixture { app, backend, dir }
    }

    /// Run background work until nothing is left in flight.
    async fn settle(app: &mut App) {
        loop {
            app.sync_lists();
            if app.in_flight == 0 {
                break;
            }
            let outcome = app.tasks_rx.recv().await.unwrap();
            app.apply_outcome(outcome);
        }
    }

    async fn next_tracker_update(app: &mut App) -> TrackerUpdate {
        let update = app.generation.next_update().await.unwrap();
        app.apply_tracker_update(update.clone());
        update
    }

    fn toast_messages(app: &App) -> Vec<String> {
        app.toasts
            .visible(std::time::Instant::now())
            .into_iter()
            .map(|t| t.message)
            .collect()
    }

    fn write_pdf(dir: &Path, name: &str, size: usize) -> PathBuf {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(size, b' ');
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    async fn select_first_pdf(app: &mut App) {
        settle(app).await;
        app.handle_action(AppAction::Select);
        settle(app).await;
    }

    #[tokio::test(start_paused = true)]
    async fn upload_generate_complete_end_to_end() {
        let Fixture { mut app, backend, dir } = fixture(FakeBackend::new());
        let path = write_pdf(dir.path(), "report.pdf", 2 * 1024 * 1024);

        app.start_upload(path);
        settle(&mut app).await;
        assert_eq!(app.upload_stage, Some(UploadStage::Complete));
        let pdf = app.active_pdf().unwrap().clone();
        assert_eq!(pdf.status, PdfStatus::Pending);
        assert_eq!(pdf.file_size, 2 * 1024 * 1024);
        assert!(toast_messages(&app).contains(&"PDF uploaded successfully".to_string()));

        app.handle_action(AppAction::CycleStyle);
        app.handle_action(AppAction::CycleStyle);
        assert_eq!(app.style, Some(Style::Simple));
        app.handle_action(AppAction::Generate);

        let summary_id = match next_tracker_update(&mut app).await {
            TrackerUpdate::Started { summary_id, .. } => summary_id,
            other => panic!("expected Started, got {:?}", other),
        };
        assert_eq!(
            backend.count_calls(&format!("generate {} EN simple", pdf.id)),
            1
        );

        backend.resolve(&summary_id, SummaryStatus::Completed, "X", None);
        loop {
            if let TrackerUpdate::Completed(_) = next_tracker_update(&mut app).await {
                break;
            }
        }

        assert_eq!(app.active_summary().unwrap().content, "X");
        assert_eq!(app.generation.tracker().phase(), Phase::Completed);
        assert_eq!(app.generation.tracker().elapsed(Instant::now()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_upload_never_reaches_backend() {
        let Fixture { mut app, backend, dir } = fixture(FakeBackend::new());
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        app.start_upload(path);
        settle(&mut app).await;

        assert_eq!(app.upload_stage, None);
        assert_eq!(backend.count_calls("upload"), 0);
        assert!(toast_messages(&app)
            .contains(&"File is not a valid PDF. The file content does not match PDF format.".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn generate_requires_style() {
        let Fixture { mut app, backend, .. } = fixture(FakeBackend::with_pdfs(vec![pdf_fixture("a")]));
        select_first_pdf(&mut app).await;

        app.handle_action(AppAction::Generate);
        assert_eq!(backend.count_calls("generate"), 0);
        assert!(toast_messages(&app).contains(&"Select a writing style first".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn switching_pdf_stops_old_polling() {
        let Fixture { mut app, backend, .. } =
            fixture(FakeBackend::with_pdfs(vec![pdf_fixture("a"), pdf_fixture("b")]));
        select_first_pdf(&mut app).await;
        app.style = Some(Style::Professional);
        app.handle_action(AppAction::Generate);
        let summary_id = match next_tracker_update(&mut app).await {
            TrackerUpdate::Started { summary_id, .. } => summary_id,
            other => panic!("expected Started, got {:?}", other),
        };

        app.focus = Pane::Pdfs;
        app.handle_action(AppAction::MoveDown);
        app.handle_action(AppAction::Select);
        assert_eq!(app.active_pdf().unwrap().id, "b");
        let polls_for_a = backend.count_calls("list_summaries a");

        backend.resolve(&summary_id, SummaryStatus::Completed, "late", None);
        tokio::time::sleep(Duration::from_secs(30)).await;
        app.poll_background();
        settle(&mut app).await;

        assert_eq!(backend.count_calls("list_summaries a"), polls_for_a);
        assert_eq!(app.generation.tracker().phase(), Phase::Idle);
        assert!(app.active_summary().is_none());
        assert!(app.summaries.items().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_pdf_loads_latest_result_and_resumes() {
        let backend = FakeBackend::with_pdfs(vec![pdf_fixture("a")]);
        let mut done = summary_fixture("done", "a", SummaryStatus::Completed);
        done.content = "Earlier summary".to_string();
        backend.add_summary(done);
        backend.add_summary(summary_fixture("running", "a", SummaryStatus::Processing));
        let Fixture { mut app, .. } = fixture(backend);

        select_first_pdf(&mut app).await;

        assert_eq!(app.active_summary().unwrap().id, "done");
        assert_eq!(app.generation.tracker().phase(), Phase::Polling);
        assert_eq!(
            app.generation.tracker().session().unwrap().summary_id,
            "running"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn search_prompt_refetches_once() {
        let Fixture { mut app, backend, .. } = fixture(FakeBackend::with_pdfs(vec![pdf_fixture("a")]));
        settle(&mut app).await;

        app.handle_action(AppAction::SearchStart);
        for c in "invoice".chars() {
            app.handle_action(AppAction::InputChar(c));
        }
        app.handle_action(AppAction::InputConfirm);
        settle(&mut app).await;

        assert_eq!(backend.count_calls("list_pdfs"), 2);
        assert_eq!(
            backend.calls().last().unwrap(),
            "list_pdfs search=invoice&sort_by=uploaded_at&sort_order=desc&page=1&limit=10"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pdf_delete_rolls_back_active_selection() {
        let Fixture { mut app, backend, .. } =
            fixture(FakeBackend::with_pdfs(vec![pdf_fixture("a"), pdf_fixture("b")]));
        select_first_pdf(&mut app).await;
        backend.fail("delete_pdf");

        app.focus = Pane::Pdfs;
        app.handle_action(AppAction::Delete);
        assert!(matches!(app.confirm, Some(PendingDelete::Pdf { ref id, .. }) if id == "a"));
        app.handle_action(AppAction::ConfirmYes);
        assert!(app.active_pdf().is_none());
        assert_eq!(app.pdfs.items().len(), 1);

        settle(&mut app).await;
        assert_eq!(app.active_pdf().unwrap().id, "a");
        assert_eq!(app.pdfs.items().len(), 2);
        assert!(toast_messages(&app).contains(&"Failed to delete PDF".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn summary_delete_and_edit_notify() {
        let backend = FakeBackend::with_pdfs(vec![pdf_fixture("a")]);
        let mut done = summary_fixture("s1", "a", SummaryStatus::Completed);
        done.content = "Draft".to_string();
        backend.add_summary(done);
        backend.add_summary(summary_fixture("s2", "a", SummaryStatus::Completed));
        let Fixture { mut app, backend, .. } = fixture(backend);
        select_first_pdf(&mut app).await;

        app.handle_action(AppAction::EditSummary);
        let request = app.take_edit_request().unwrap();
        app.submit_edit(&request.id, "Final".to_string());
        settle(&mut app).await;
        assert_eq!(app.active_summary().unwrap().content, "Final");
        assert!(app.active_summary().unwrap().is_edited);

        app.handle_action(AppAction::MoveDown);
        app.handle_action(AppAction::Delete);
        app.handle_action(AppAction::ConfirmYes);
        settle(&mut app).await;

        assert_eq!(backend.count_calls("delete_summary s2"), 1);
        assert_eq!(app.summaries.items().len(), 1);
        let toasts = toast_messages(&app);
        assert!(toasts.contains(&"Summary saved".to_string()));
        assert!(toasts.contains(&"Summary deleted".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn refused_pdf_delete_keeps_a_newer_page() {
        let Fixture { mut app, backend, .. } =
            fixture(FakeBackend::with_pdfs(vec![pdf_fixture("a"), pdf_fixture("b")]));
        settle(&mut app).await;
        backend.fail("delete_pdf");

        app.focus = Pane::Pdfs;
        app.handle_action(AppAction::MoveDown);
        app.handle_action(AppAction::Delete);
        app.handle_action(AppAction::ConfirmYes);
        assert_eq!(app.pdfs.items().len(), 1);

        backend
            .upload_pdf("fresh.pdf", b"%PDF-1.7".to_vec(), Language::En, None)
            .await
            .unwrap();
        app.handle_action(AppAction::Refresh);
        settle(&mut app).await;

        assert_eq!(app.pdfs.items().len(), 3);
        assert!(app.active_pdf().is_none());
        assert!(toast_messages(&app).contains(&"Failed to delete PDF".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn refused_summary_delete_restores_list_and_result() {
        let backend = FakeBackend::with_pdfs(vec![pdf_fixture("a")]);
        backend.add_summary(summary_fixture("s1", "a", SummaryStatus::Completed));
        backend.add_summary(summary_fixture("s2", "a", SummaryStatus::Completed));
        let Fixture { mut app, backend, .. } = fixture(backend);
        select_first_pdf(&mut app).await;
        assert_eq!(app.active_summary().unwrap().id, "s1");
        backend.fail("delete_summary");

        app.handle_action(AppAction::Delete);
        app.handle_action(AppAction::ConfirmYes);
        assert!(app.active_summary().is_none());
        assert_eq!(app.summaries.items().len(), 1);

        settle(&mut app).await;
        let ids: Vec<&str> = app.summaries.items().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(app.active_summary().unwrap().id, "s1");
        assert!(toast_messages(&app).contains(&"Failed to delete summary".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn refused_summary_delete_leaves_other_pdf_alone() {
        let backend = FakeBackend::with_pdfs(vec![pdf_fixture("a"), pdf_fixture("b")]);
        backend.add_summary(summary_fixture("s1", "a", SummaryStatus::Completed));
        let Fixture { mut app, backend, .. } = fixture(backend);
        select_first_pdf(&mut app).await;
        assert_eq!(app.active_summary().unwrap().id, "s1");
        backend.fail("delete_summary");

        app.handle_action(AppAction::Delete);
        app.handle_action(AppAction::ConfirmYes);
        app.focus = Pane::Pdfs;
        app.handle_action(AppAction::MoveDown);
        app.handle_action(AppAction::Select);
        settle(&mut app).await;

        assert_eq!(app.active_pdf().unwrap().id, "b");
        assert!(app.summaries.items().iter().all(|s| s.pdf_id == "b"));
        assert!(app.active_summary().is_none());
        assert!(toast_messages(&app).contains(&"Failed to delete summary".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn refused_edit_keeps_old_content() {
        let backend = FakeBackend::with_pdfs(vec![pdf_fixture("a")]);
        let mut done = summary_fixture("s1", "a", SummaryStatus::Completed);
        done.content = "Draft".to_string();
        backend.add_summary(done);
        let Fixture { mut app, backend, .. } = fixture(backend);
        select_first_pdf(&mut app).await;
        backend.fail("update_summary");

        app.handle_action(AppAction::EditSummary);
        let request = app.take_edit_request().unwrap();
        app.submit_edit(&request.id, "Final".to_string());
        settle(&mut app).await;

        assert_eq!(app.active_summary().unwrap().content, "Draft");
        assert!(!app.active_summary().unwrap().is_edited);
        assert!(toast_messages(&app).contains(&"Failed to save summary".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn refused_upload_shows_backend_message() {
        let Fixture { mut app, backend, dir } = fixture(FakeBackend::new());
        backend.fail("upload");
        let path = write_pdf(dir.path(), "report.pdf", 4096);

        app.start_upload(path);
        settle(&mut app).await;

        assert_eq!(backend.count_calls("upload report.pdf"), 1);
        assert_eq!(app.upload_stage, None);
        assert!(app.active_pdf().is_none());
        assert!(toast_messages(&app).contains(&"upload failed".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn save_summary_writes_named_file() {
        let backend = FakeBackend::with_pdfs(vec![pdf_fixture("thesis")]);
        let mut done = summary_fixture("s1", "thesis", SummaryStatus::Completed);
        done.content = "Key findings".to_string();
        backend.add_summary(done);
        let Fixture { mut app, dir, .. } = fixture(backend);
        select_first_pdf(&mut app).await;

        app.handle_action(AppAction::SaveSummary);
        let saved = std::fs::read_to_string(dir.path().join("thesis_summary.txt")).unwrap();
        assert_eq!(saved, "Key findings");
    }

    #[tokio::test(start_paused = true)]
    async fn export_saves_into_download_dir() {
        let Fixture { mut app, backend, dir } = fixture(FakeBackend::new());
        settle(&mut app).await;

        app.handle_action(AppAction::Export(ExportFormat::Csv));
        settle(&mut app).await;

        assert!(dir.path().join("pdfs.csv").exists());
        assert_eq!(backend.calls().last().unwrap(), "export_pdfs csv ");
        assert!(toast_messages(&app).contains(&"Exported as CSV".to_string()));
    }

    #[test]
    fn date_range_input() {
        let day = |s| parse_date(s).unwrap();
        assert_eq!(parse_date_range(""), Ok((None, None)));
        assert_eq!(
            parse_date_range("2025-01-01..2025-01-31"),
            Ok((Some(day("2025-01-01")), Some(day("2025-01-31"))))
        );
        assert_eq!(parse_date_range("..2025-01-31"), Ok((None, Some(day("2025-01-31")))));
        assert_eq!(
            parse_date_range("2025-03-04"),
            Ok((Some(day("2025-03-04")), Some(day("2025-03-04"))))
        );
        assert!(parse_date_range("yesterday").is_err());
        assert_eq!(
            format_date_range(Some(day("2025-01-01")), None),
            "2025-01-01.."
        );
    }

    #[test]
    fn status_filter_cycles_through_none() {
        let all = SummaryStatus::FILTERABLE;
        assert_eq!(cycle_option(&all, None), Some(SummaryStatus::Processing));
        assert_eq!(cycle_option(&all, Some(SummaryStatus::Timeout)), None);
    }
}
