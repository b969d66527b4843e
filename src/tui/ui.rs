use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Pane};
use crate::models::{ListFilter, SummaryStatus};
use crate::notify::NoticeKind;
use crate::tracker::Phase;
use crate::upload::format_file_size;

pub fn draw(frame: &mut Frame, app: &App) {
    // 1/3 lists, 2/3 result
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
        .split(frame.area());

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),    // Header
            Constraint::Percentage(55), // PDFs
            Constraint::Min(0),       // Summaries
            Constraint::Length(1),    // Key hints
        ])
        .split(main_chunks[0]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // PDF details
            Constraint::Min(0),    // Result
            Constraint::Length(1), // Generation status
        ])
        .split(main_chunks[1]);

    render_header(frame, app, left_chunks[0]);
    render_pdf_list(frame, app, left_chunks[1]);
    render_summary_list(frame, app, left_chunks[2]);
    render_left_status(frame, app, left_chunks[3]);

    render_pdf_details(frame, app, right_chunks[0]);
    render_result(frame, app, right_chunks[1]);
    render_right_status(frame, app, right_chunks[2]);

    render_toasts(frame, app, main_chunks[1]);

    if let Some(prompt) = &app.prompt {
        render_input(frame, prompt.kind.title(), &prompt.buffer);
    }

    if let Some(pending) = &app.confirm {
        render_confirm(frame, &pending.question());
    }

    if app.show_help {
        render_help(frame);
    }
}

fn pane_border(app: &App, pane: Pane, color: Color) -> Style {
    if app.focus == pane {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let style_label = app.style.map(|s| s.as_str()).unwrap_or("none");
    let title = " PDF Summarizer ";
    let stats = format!(
        " {} | style: {} | {}",
        app.language.label(),
        style_label,
        app.config.backend_url
    );

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paragraph = Paragraph::new(stats).style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, inner);
}

fn list_title<F: ListFilter>(name: &str, page: u32, total_pages: u32, filter: &F, sort: &str) -> String {
    let marker = if filter.is_active() { " *" } else { "" };
    format!(" {name} [{sort}] {page}/{total_pages}{marker} ")
}

fn render_pdf_list(frame: &mut Frame, app: &App, area: Rect) {
    let active_id = app.active_pdf().map(|p| p.id.as_str());

    let items: Vec<ListItem> = app
        .pdfs
        .items()
        .iter()
        .map(|pdf| {
            let marker = if Some(pdf.id.as_str()) == active_id { "● " } else { "  " };
            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::styled(pdf.display_name().to_string(), Style::default().fg(Color::White)),
                Span::styled(
                    format!("  {}", pdf.uploaded_at.format("%Y-%m-%d")),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
            ListItem::new(line)
        })
        .collect();

    let filter = app.pdfs.filter();
    let title = list_title(
        "PDFs",
        app.pdfs.page(),
        app.pdfs.total_pages(),
        filter,
        filter.sort.label(),
    );

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(pane_border(app, Pane::Pdfs, Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app.pdfs.items().is_empty() {
        state.select(Some(app.pdfs.selected_index()));
    }

    frame.render_stateful_widget(list, area, &mut state);
}

fn status_color(status: SummaryStatus) -> Color {
    match status {
        SummaryStatus::Completed => Color::Green,
        SummaryStatus::Processing => Color::Yellow,
        SummaryStatus::Failed | SummaryStatus::Timeout => Color::Red,
        SummaryStatus::Unknown => Color::DarkGray,
    }
}

fn render_summary_list(frame: &mut Frame, app: &App, area: Rect) {
    let shown_id = app.active_summary().map(|s| s.id.as_str());

    let items: Vec<ListItem> = app
        .summaries
        .items()
        .iter()
        .map(|summary| {
            let marker = if Some(summary.id.as_str()) == shown_id { "● " } else { "  " };
            let edited = if summary.is_edited { " (edited)" } else { "" };
            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::styled(
                    format!("{:<10} ", summary.status.as_str()),
                    Style::default().fg(status_color(summary.status)),
                ),
                Span::styled(
                    format!("{} {}", summary.language.code(), summary.style),
                    Style::default().fg(Color::Blue),
                ),
                Span::styled(
                    format!("  {}{}", summary.created_at.format("%m-%d %H:%M"), edited),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
            ListItem::new(line)
        })
        .collect();

    let filter = app.summaries.filter();
    let title = list_title(
        "Summaries",
        app.summaries.page(),
        app.summaries.total_pages(),
        filter,
        filter.sort.label(),
    );

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(pane_border(app, Pane::Summaries, Color::Magenta)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app.summaries.items().is_empty() {
        state.select(Some(app.summaries.selected_index()));
    }

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_left_status(frame: &mut Frame, app: &App, area: Rect) {
    let status = match app.upload_stage {
        Some(stage) if app.is_busy() => format!("{} {}", app.spinner(), stage.message()),
        _ if app.is_busy() => format!("{} Loading...", app.spinner()),
        _ => "u:upload  tab:pane  /:search  g:generate  ?:help  q:quit".to_string(),
    };

    let paragraph = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_pdf_details(frame: &mut Frame, app: &App, area: Rect) {
    let text = match app.active_pdf() {
        Some(pdf) => vec![
            Line::from(Span::styled(
                pdf.display_name().to_string(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!(
                    "{} | {} | uploaded {}",
                    format_file_size(pdf.file_size),
                    pdf.status.as_str(),
                    pdf.uploaded_at.format("%Y-%m-%d %H:%M")
                ),
                Style::default().fg(Color::DarkGray),
            )),
        ],
        None => vec![Line::from("No PDF selected. Press u to upload or Enter to pick one.")],
    };

    let block = Block::default()
        .title(" PDF ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_result(frame: &mut Frame, app: &App, area: Rect) {
    let tracker = app.generation.tracker();

    let content = match (tracker.phase(), tracker.error(), app.active_summary()) {
        (Phase::Requesting, _, _) => "Requesting summary...".to_string(),
        (Phase::Polling, _, _) if tracker.is_stalled() => {
            "The summary is still processing.\n\nPress r to check again, or g to start a new one."
                .to_string()
        }
        (Phase::Polling, _, _) => "Generating summary...".to_string(),
        (Phase::Failed | Phase::TimedOut, Some(error), _) => {
            format!("{error}\n\nPress g to try again.")
        }
        (_, _, Some(summary)) => summary.content.clone(),
        _ if app.active_pdf().is_some() => {
            "Choose a style with s (and a language with l), then press g to generate.".to_string()
        }
        _ => String::new(),
    };

    let title = match app.active_summary() {
        Some(summary) if summary.is_edited => " Summary (edited) ",
        _ => " Summary ",
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn render_right_status(frame: &mut Frame, app: &App, area: Rect) {
    let tracker = app.generation.tracker();
    let status = match tracker.elapsed(tokio::time::Instant::now()) {
        Some(elapsed) if tracker.is_stalled() => {
            format!("⏸ Stopped checking after {}s", elapsed.as_secs())
        }
        Some(elapsed) => format!("{} Processing... {}s", app.spinner(), elapsed.as_secs()),
        None => match tracker.phase() {
            Phase::Requesting => format!("{} Requesting...", app.spinner()),
            Phase::Completed => "✓ Completed".to_string(),
            Phase::Failed => "❌ Failed".to_string(),
            Phase::TimedOut => "⌛ Timed out".to_string(),
            _ => String::new(),
        },
    };

    let hints = if app.active_summary().is_some() {
        " | e:edit  w:save  n:new"
    } else {
        ""
    };

    let text = format!("{status}{hints}");
    let paragraph = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_toasts(frame: &mut Frame, app: &App, area: Rect) {
    let toasts = app.toasts.visible(Instant::now());
    if toasts.is_empty() {
        return;
    }

    let width = area.width.min(60);
    let height = toasts.len() as u16 + 2;
    let toast_area = Rect {
        x: area.x + area.width.saturating_sub(width),
        y: area.y,
        width,
        height: height.min(area.height),
    };

    let lines: Vec<Line> = toasts
        .iter()
        .map(|toast| {
            let (icon, color) = match toast.kind {
                NoticeKind::Success => ("✓", Color::Green),
                NoticeKind::Error => ("✗", Color::Red),
                NoticeKind::Info => ("•", Color::Cyan),
            };
            Line::from(vec![
                Span::styled(format!("{icon} "), Style::default().fg(color)),
                Span::raw(toast.message.clone()),
            ])
        })
        .collect();

    frame.render_widget(Clear, toast_area);
    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: true }),
        toast_area,
    );
}

fn render_input(frame: &mut Frame, title: &str, buffer: &str) {
    let area = centered_rect(60, 20, frame.area());

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(area);

    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let input_text = format!("> {buffer}_");
    let paragraph = Paragraph::new(input_text).style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, inner);
}

fn render_confirm(frame: &mut Frame, question: &str) {
    let area = centered_rect(50, 20, frame.area());

    let block = Block::default()
        .title(" Confirm ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let text = format!("{question}\n\ny: delete   n: cancel");
    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 80, frame.area());

    let help_text = vec![
        "",
        " Navigation:",
        "   j / ↓    Move down",
        "   k / ↑    Move up",
        "   Tab      Switch between PDFs and summaries",
        "   [ / ]    Previous / next page",
        "   Enter    Open PDF / show summary",
        "",
        " Summaries:",
        "   u        Upload a PDF",
        "   l        Cycle language",
        "   s        Cycle style",
        "   g        Generate summary",
        "   n        New summary for this PDF",
        "   e        Edit summary",
        "   w        Save summary to a file",
        "   p        Open PDF preview",
        "   d        Delete",
        "",
        " Filters:",
        "   /        Search",
        "   t        Date range",
        "   o        Cycle sort",
        "   f L S    Status / language / style",
        "   c        Clear filters",
        "   x / X    Export CSV / JSON",
        "",
        " General:",
        "   r        Refresh",
        "   ?        Toggle this help",
        "   q        Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
