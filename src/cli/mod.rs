//! Headless commands. Running without a subcommand starts the TUI.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::api::{ApiClient, SummaryBackend};
use crate::config::Config;
use crate::models::{
    parse_date, ExportFormat, Language, PdfSort, Style, SummarySort, SummaryStatus,
};

pub use commands::*;

#[derive(Parser)]
#[command(name = "pdfsum")]
#[command(about = "Upload PDFs and manage their AI summaries")]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "PDFSUM_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct DateArgs {
    /// Only records on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Only records on or before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct SummaryFilterArgs {
    /// Filter by status (processing, completed, failed, timeout)
    #[arg(long)]
    pub status: Option<SummaryStatus>,

    /// Filter by language code
    #[arg(long)]
    pub language: Option<Language>,

    /// Filter by style
    #[arg(long)]
    pub style: Option<Style>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a PDF locally and upload it
    Upload {
        path: PathBuf,
        /// Summary language (EN, ID, CN, JP, KR)
        #[arg(short, long)]
        language: Option<Language>,
        /// Writing style (professional, simple)
        #[arg(short, long)]
        style: Option<Style>,
    },

    /// List uploaded PDFs
    List {
        #[arg(short, long)]
        search: Option<String>,
        /// newest, oldest, name_asc or name_desc
        #[arg(long, default_value = "newest")]
        sort: PdfSort,
        #[command(flatten)]
        dates: DateArgs,
        #[arg(short, long, default_value = "1")]
        page: u32,
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Show one PDF
    Show { id: String },

    /// List the summaries of a PDF
    Summaries {
        pdf_id: String,
        #[arg(short, long)]
        search: Option<String>,
        /// newest or oldest
        #[arg(long, default_value = "newest")]
        sort: SummarySort,
        #[command(flatten)]
        filter: SummaryFilterArgs,
        #[command(flatten)]
        dates: DateArgs,
        #[arg(short, long, default_value = "1")]
        page: u32,
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Generate a summary and wait for it
    Generate {
        pdf_id: String,
        #[arg(short, long)]
        style: Style,
        #[arg(short, long)]
        language: Option<Language>,
        /// Return as soon as the job is accepted
        #[arg(long)]
        no_wait: bool,
    },

    /// Replace a summary's content (opens $EDITOR without --content/--file)
    Edit {
        summary_id: String,
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Delete a PDF and its summaries
    DeletePdf {
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete a summary
    DeleteSummary {
        id: String,
        #[arg(short, long)]
        yes: bool,
    },

    /// Export PDFs, or one PDF's summaries with --pdf
    Export {
        /// csv or json
        format: ExportFormat,
        #[arg(long)]
        pdf: Option<String>,
        #[arg(short, long)]
        search: Option<String>,
        #[command(flatten)]
        filter: SummaryFilterArgs,
        #[command(flatten)]
        dates: DateArgs,
        /// Directory to write into (defaults to the download directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    let backend: Arc<dyn SummaryBackend> =
        Arc::new(ApiClient::new(&config.backend_url, config.request_timeout())?);

    match command {
        Commands::Upload {
            path,
            language,
            style,
        } => {
            let language = language.unwrap_or(config.default_language);
            cmd_upload(backend.as_ref(), config, &path, language, style).await?;
        }

        Commands::List {
            search,
            sort,
            dates,
            page,
            limit,
        } => {
            let filter = pdf_filter(search, sort, &dates);
            let limit = limit.unwrap_or(config.page_limit);
            cmd_list(backend.as_ref(), filter, page, limit).await?;
        }

        Commands::Show { id } => cmd_show(backend.as_ref(), config, &id).await?,

        Commands::Summaries {
            pdf_id,
            search,
            sort,
            filter,
            dates,
            page,
            limit,
        } => {
            let filter = summary_filter(search, sort, &filter, &dates);
            let limit = limit.unwrap_or(config.page_limit);
            cmd_summaries(backend.as_ref(), &pdf_id, filter, page, limit).await?;
        }

        Commands::Generate {
            pdf_id,
            style,
            language,
            no_wait,
        } => {
            let language = language.unwrap_or(config.default_language);
            cmd_generate(backend, config, &pdf_id, language, style, !no_wait).await?;
        }

        Commands::Edit {
            summary_id,
            content,
            file,
        } => {
            let content = match (content, file) {
                (Some(content), _) => Some(content),
                (None, Some(path)) => Some(std::fs::read_to_string(path)?),
                (None, None) => None,
            };
            cmd_edit(backend.as_ref(), &summary_id, content).await?;
        }

        Commands::DeletePdf { id, yes } => {
            if yes || confirm(&format!("Delete PDF '{id}' and all of its summaries?"))? {
                cmd_delete_pdf(backend.as_ref(), &id).await?;
            }
        }

        Commands::DeleteSummary { id, yes } => {
            if yes || confirm(&format!("Delete summary '{id}'?"))? {
                cmd_delete_summary(backend.as_ref(), &id).await?;
            }
        }

        Commands::Export {
            format,
            pdf,
            search,
            filter,
            dates,
            output,
        } => {
            let dir = output.unwrap_or_else(|| config.download_dir());
            match pdf {
                Some(pdf_id) => {
                    let filter = summary_filter(search, SummarySort::default(), &filter, &dates);
                    cmd_export_summaries(backend.as_ref(), &pdf_id, filter, format, &dir).await?;
                }
                None => {
                    let filter = pdf_filter(search, PdfSort::default(), &dates);
                    cmd_export_pdfs(backend.as_ref(), filter, format, &dir).await?;
                }
            }
        }
    }

    Ok(())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    use std::io::{self, Write};

    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if input.trim().eq_ignore_ascii_case("y") {
        Ok(true)
    } else {
        println!("{} Cancelled", console::style("!").yellow());
        Ok(false)
    }
}
