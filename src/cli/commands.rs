use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Local;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::{DateArgs, SummaryFilterArgs};
use crate::api::SummaryBackend;
use crate::config::Config;
use crate::editor;
use crate::history::{PdfHistory, SummaryHistory};
use crate::models::{
    ExportFormat, Language, PaginationMeta, PdfFilter, PdfRecord, PdfSort, Style, Summary,
    SummaryFilter, SummarySort,
};
use crate::notify::ConsoleNotifier;
use crate::tracker::{GenerationController, PollSettings, TrackerUpdate};
use crate::upload::{self, format_file_size, PdfValidator};

pub fn pdf_filter(search: Option<String>, sort: PdfSort, dates: &DateArgs) -> PdfFilter {
    PdfFilter {
        search: search.unwrap_or_default(),
        sort,
        date_from: dates.from,
        date_to: dates.to,
    }
}

pub fn summary_filter(
    search: Option<String>,
    sort: SummarySort,
    filter: &SummaryFilterArgs,
    dates: &DateArgs,
) -> SummaryFilter {
    SummaryFilter {
        search: search.unwrap_or_default(),
        sort,
        status: filter.status,
        language: filter.language,
        style: filter.style,
        date_from: dates.from,
        date_to: dates.to,
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(template);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_pdf_row(pdf: &PdfRecord) {
    println!(
        "  {:<24} {:<40} {:>10}  {}  {}",
        style(&pdf.id).cyan(),
        pdf.display_name(),
        format_file_size(pdf.file_size),
        pdf.uploaded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        pdf.status.as_str(),
    );
}

fn print_summary_row(summary: &Summary) {
    let status = match summary.status.as_str() {
        "completed" => style(summary.status.as_str()).green(),
        "processing" => style(summary.status.as_str()).yellow(),
        other => style(other).red(),
    };
    let edited = if summary.is_edited { " (edited)" } else { "" };
    println!(
        "  {:<24} {:<11} {} {:<13} {}{}",
        style(&summary.id).cyan(),
        status,
        summary.language,
        summary.style,
        summary.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        edited,
    );
}

fn print_page_footer(meta: &PaginationMeta) {
    let total_pages = meta.total_pages.max(1);
    match meta.total_results {
        Some(total) => println!("\nPage {} of {} ({} total)", meta.page, total_pages, total),
        None => println!("\nPage {} of {}", meta.page, total_pages),
    }
}

/// Validate and upload a PDF.
pub async fn cmd_upload(
    backend: &dyn SummaryBackend,
    config: &Config,
    path: &Path,
    language: Language,
    style_choice: Option<Style>,
) -> anyhow::Result<PdfRecord> {
    let validator = PdfValidator::from_config(config);
    let pb = spinner("Validating PDF file...");

    let result = upload::upload_pdf(backend, &validator, path, language, style_choice, |stage| {
        pb.set_message(stage.message());
    })
    .await;
    pb.finish_and_clear();

    let pdf = result.map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!(
        "{} Uploaded '{}' ({})",
        style("✓").green(),
        pdf.display_name(),
        format_file_size(pdf.file_size)
    );
    println!("  ID: {}", style(&pdf.id).cyan());
    Ok(pdf)
}

pub async fn cmd_list(
    backend: &dyn SummaryBackend,
    filter: PdfFilter,
    page: u32,
    limit: u32,
) -> anyhow::Result<()> {
    let mut list = PdfHistory::with_filter(filter, page, limit)?;
    list.sync_from(backend).await?;

    if list.items().is_empty() {
        println!("No PDFs found.");
        return Ok(());
    }

    println!("\n{}", style("PDFs").bold());
    println!("{}", "-".repeat(100));
    for pdf in list.items() {
        print_pdf_row(pdf);
    }
    print_page_footer(list.meta());
    Ok(())
}

pub async fn cmd_show(backend: &dyn SummaryBackend, config: &Config, id: &str) -> anyhow::Result<()> {
    let pdf = backend.get_pdf(id).await?;

    println!("\n{}", style(pdf.display_name()).bold());
    println!("{}", "-".repeat(60));
    println!("  ID:       {}", pdf.id);
    println!("  Size:     {}", format_file_size(pdf.file_size));
    println!("  Type:     {}", pdf.mime_type);
    println!("  Status:   {}", pdf.status.as_str());
    println!(
        "  Uploaded: {}",
        pdf.uploaded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    println!("  Preview:  {}", pdf.preview_url(&config.backend_url));
    Ok(())
}

pub async fn cmd_summaries(
    backend: &dyn SummaryBackend,
    pdf_id: &str,
    filter: SummaryFilter,
    page: u32,
    limit: u32,
) -> anyhow::Result<()> {
    let mut list = SummaryHistory::with_filter(filter, page, limit)?;
    list.sync_from(backend, pdf_id).await?;

    if list.items().is_empty() {
        println!("No summaries found.");
        return Ok(());
    }

    println!("\n{}", style(format!("Summaries for {}", pdf_id)).bold());
    println!("{}", "-".repeat(90));
    for summary in list.items() {
        print_summary_row(summary);
    }
    print_page_footer(list.meta());
    Ok(())
}

/// Request a summary and, when `wait` is set, poll until it resolves.
/// Returns the finished summary, or `None` when not waiting or when the
/// job outlived the polling window.
pub async fn cmd_generate(
    backend: Arc<dyn SummaryBackend>,
    config: &Config,
    pdf_id: &str,
    language: Language,
    style_choice: Style,
    wait: bool,
) -> anyhow::Result<Option<Summary>> {
    let mut controller = GenerationController::new(
        backend,
        Arc::new(ConsoleNotifier),
        PollSettings::from_config(config),
    );
    controller.generate(Some(pdf_id), language, Some(style_choice))?;

    let pb = spinner("Submitting request...");
    let outcome = loop {
        let Some(update) = controller.next_update().await else {
            break Err(anyhow::anyhow!("generation stopped unexpectedly"));
        };
        match update {
            TrackerUpdate::Started { summary_id, .. } => {
                if !wait {
                    pb.finish_and_clear();
                    controller.cancel();
                    println!(
                        "{} Generation started: {}",
                        style("✓").green(),
                        style(&summary_id).cyan()
                    );
                    return Ok(None);
                }
                pb.set_message(format!("Generating summary {}...", summary_id));
            }
            TrackerUpdate::Progress { .. } => {
                if let Some(elapsed) = controller.tracker().elapsed(tokio::time::Instant::now()) {
                    pb.set_message(format!("Generating summary... {}s", elapsed.as_secs()));
                }
            }
            TrackerUpdate::Completed(summary) => break Ok(Some(summary)),
            TrackerUpdate::SubmitFailed(message) | TrackerUpdate::Failed { message, .. } => {
                break Err(anyhow::anyhow!(message));
            }
            TrackerUpdate::Stalled { summary_id, .. } => {
                pb.finish_and_clear();
                println!(
                    "{} Summary {} is still processing. Check again later with `pdfsum summaries {}`.",
                    style("!").yellow(),
                    summary_id,
                    pdf_id
                );
                return Ok(None);
            }
        }
    };
    pb.finish_and_clear();

    let summary = outcome?;
    if let Some(summary) = &summary {
        println!("\n{}\n", summary.content);
    }
    Ok(summary)
}

/// Replace a summary's content. Without `content` the current text is
/// opened in the user's editor.
pub async fn cmd_edit(
    backend: &dyn SummaryBackend,
    summary_id: &str,
    content: Option<String>,
) -> anyhow::Result<bool> {
    let content = match content {
        Some(content) => content,
        None => {
            let summary = backend.get_summary(summary_id).await?;
            match editor::edit_text(&summary.content)? {
                Some(edited) => edited,
                None => {
                    println!("{} No changes", style("!").yellow());
                    return Ok(false);
                }
            }
        }
    };

    if content.trim().is_empty() {
        bail!("Summary content cannot be empty");
    }

    backend.update_summary(summary_id, &content).await?;
    println!("{} Summary {} updated", style("✓").green(), summary_id);
    Ok(true)
}

pub async fn cmd_delete_pdf(backend: &dyn SummaryBackend, id: &str) -> anyhow::Result<()> {
    backend
        .delete_pdf(id)
        .await
        .with_context(|| format!("Failed to delete PDF {}", id))?;
    println!("{} Deleted PDF {}", style("✓").green(), id);
    Ok(())
}

pub async fn cmd_delete_summary(backend: &dyn SummaryBackend, id: &str) -> anyhow::Result<()> {
    backend
        .delete_summary(id)
        .await
        .with_context(|| format!("Failed to delete summary {}", id))?;
    println!("{} Deleted summary {}", style("✓").green(), id);
    Ok(())
}

/// Export every PDF matching `filter`; an all-default filter exports
/// everything unfiltered.
pub async fn cmd_export_pdfs(
    backend: &dyn SummaryBackend,
    filter: PdfFilter,
    format: ExportFormat,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let list = PdfHistory::with_filter(filter, 1, 1)?;
    let path = list.export_from(backend, format, dir).await?;
    println!(
        "{} Exported as {} to {}",
        style("✓").green(),
        format.as_str().to_uppercase(),
        path.display()
    );
    Ok(path)
}

pub async fn cmd_export_summaries(
    backend: &dyn SummaryBackend,
    pdf_id: &str,
    filter: SummaryFilter,
    format: ExportFormat,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let list = SummaryHistory::with_filter(filter, 1, 1)?;
    let path = list.export_from(backend, pdf_id, format, dir).await?;
    println!(
        "{} Summaries exported as {} to {}",
        style("✓").green(),
        format.as_str().to_uppercase(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{pdf_fixture, FakeBackend};
    use crate::models::SummaryStatus;
    use chrono::NaiveDate;

    fn dates(from: &str, to: &str) -> DateArgs {
        DateArgs {
            from: Some(NaiveDate::parse_from_str(from, "%Y-%m-%d").unwrap()),
            to: Some(NaiveDate::parse_from_str(to, "%Y-%m-%d").unwrap()),
        }
    }

    #[tokio::test]
    async fn inverted_date_range_is_rejected_before_fetching() {
        let fake = FakeBackend::new();
        let filter = pdf_filter(None, PdfSort::Newest, &dates("2025-03-10", "2025-03-01"));

        let err = cmd_list(&fake, filter, 1, 10).await.unwrap_err();
        assert!(err.to_string().contains("after end date"));
        assert_eq!(fake.call_count(), 0);

        let filter = summary_filter(
            Some("ml".into()),
            SummarySort::Oldest,
            &SummaryFilterArgs::default(),
            &dates("2025-03-01", "2025-03-01"),
        );
        cmd_summaries(&fake, "p1", filter, 2, 5).await.unwrap();
        assert_eq!(
            fake.calls(),
            vec!["list_summaries p1 search=ml&sort_by=created_at&sort_order=asc\
                  &date_from=2025-03-01&date_to=2025-03-01&page=2&limit=5"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn generate_waits_for_completion() {
        let fake = Arc::new(FakeBackend::with_pdfs(vec![pdf_fixture("p1")]));
        let backend: Arc<dyn SummaryBackend> = fake.clone();

        let worker = fake.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            worker.resolve("sum-1", SummaryStatus::Completed, "Short and sweet", None);
        });

        let summary = cmd_generate(backend, &Config::default(), "p1", Language::En, Style::Simple, true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.content, "Short and sweet");
        assert_eq!(fake.count_calls("generate p1 EN simple"), 1);
        assert!(fake.count_calls("list_summaries p1") >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn generate_failure_is_an_error() {
        let fake = Arc::new(FakeBackend::with_pdfs(vec![pdf_fixture("p1")]));
        let backend: Arc<dyn SummaryBackend> = fake.clone();

        let worker = fake.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            worker.resolve("sum-1", SummaryStatus::Failed, "", Some("model overloaded"));
        });

        let err = cmd_generate(backend, &Config::default(), "p1", Language::En, Style::Professional, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model overloaded"));
    }

    #[tokio::test(start_paused = true)]
    async fn generate_without_wait_returns_after_submit() {
        let fake = Arc::new(FakeBackend::with_pdfs(vec![pdf_fixture("p1")]));
        let backend: Arc<dyn SummaryBackend> = fake.clone();

        let summary = cmd_generate(backend, &Config::default(), "p1", Language::Id, Style::Simple, false)
            .await
            .unwrap();

        assert!(summary.is_none());
        assert_eq!(fake.calls(), vec!["generate p1 ID simple".to_string()]);
    }

    #[tokio::test]
    async fn edit_rejects_blank_content() {
        let fake = FakeBackend::new();
        assert!(cmd_edit(&fake, "s1", Some("   ".into())).await.is_err());
        assert_eq!(fake.call_count(), 0);

        assert!(cmd_edit(&fake, "s1", Some("Revised".into())).await.unwrap());
        assert_eq!(fake.calls(), vec!["update_summary s1".to_string()]);
    }

    #[tokio::test]
    async fn export_sends_filters_only_when_set() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeBackend::new();

        let path = cmd_export_pdfs(&fake, PdfFilter::default(), ExportFormat::Csv, dir.path())
            .await
            .unwrap();
        assert!(path.ends_with("pdfs.csv"));

        let filter = PdfFilter {
            search: "thesis".into(),
            ..Default::default()
        };
        cmd_export_pdfs(&fake, filter, ExportFormat::Json, dir.path())
            .await
            .unwrap();

        assert_eq!(
            fake.calls(),
            vec![
                "export_pdfs csv ".to_string(),
                "export_pdfs json search=thesis&sort_by=uploaded_at&sort_order=desc".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failed_delete_is_reported() {
        let fake = FakeBackend::with_pdfs(vec![pdf_fixture("p1")]);
        fake.fail("delete_pdf");

        let err = cmd_delete_pdf(&fake, "p1").await.unwrap_err();
        assert!(err.to_string().contains("Failed to delete PDF p1"));
        assert_eq!(fake.pdf_ids(), vec!["p1".to_string()]);
    }
}
