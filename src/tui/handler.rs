use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::models::ExportFormat;

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    Quit,
    MoveUp,
    MoveDown,
    MoveToTop,
    MoveToBottom,
    NextPane,
    Select,
    Refresh,
    NextPage,
    PrevPage,
    // Generation
    Generate,
    NewSummary,
    CycleLanguage,
    CycleStyle,
    // Filters
    SearchStart,
    DateRangeStart,
    CycleSort,
    CycleStatusFilter,
    CycleLanguageFilter,
    CycleStyleFilter,
    ClearFilters,
    // Records
    UploadStart,
    EditSummary,
    Delete,
    SaveSummary,
    OpenPreview,
    Export(ExportFormat),
    ConfirmYes,
    ConfirmNo,
    ShowHelp,
    HideHelp,
    // Text prompt
    InputChar(char),
    InputBackspace,
    InputConfirm,
    InputCancel,
}

/// Which overlay, if any, currently owns the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Normal,
    Help,
    Confirm,
    Input,
}

pub fn handle_key_event(key: KeyEvent, mode: KeyMode) -> Option<AppAction> {
    match mode {
        // any key closes help
        KeyMode::Help => return Some(AppAction::HideHelp),

        KeyMode::Confirm => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    Some(AppAction::ConfirmYes)
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(AppAction::ConfirmNo),
                _ => None,
            };
        }

        KeyMode::Input => {
            return match key.code {
                KeyCode::Enter => Some(AppAction::InputConfirm),
                KeyCode::Esc => Some(AppAction::InputCancel),
                KeyCode::Backspace => Some(AppAction::InputBackspace),
                KeyCode::Char(c) => Some(AppAction::InputChar(c)),
                _ => None,
            };
        }

        KeyMode::Normal => {}
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) => Some(AppAction::Quit),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(AppAction::Quit),

        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(AppAction::MoveDown),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(AppAction::MoveUp),
        (KeyCode::Char('<'), _) => Some(AppAction::MoveToTop),
        (KeyCode::Char('>'), _) => Some(AppAction::MoveToBottom),
        (KeyCode::Tab, _) => Some(AppAction::NextPane),
        (KeyCode::Char(']'), _) => Some(AppAction::NextPage),
        (KeyCode::Char('['), _) => Some(AppAction::PrevPage),

        (KeyCode::Enter, _) => Some(AppAction::Select),
        (KeyCode::Char('r'), _) => Some(AppAction::Refresh),

        (KeyCode::Char('g'), _) => Some(AppAction::Generate),
        (KeyCode::Char('n'), _) => Some(AppAction::NewSummary),
        (KeyCode::Char('l'), _) => Some(AppAction::CycleLanguage),
        (KeyCode::Char('s'), _) => Some(AppAction::CycleStyle),

        (KeyCode::Char('/'), _) => Some(AppAction::SearchStart),
        (KeyCode::Char('t'), _) => Some(AppAction::DateRangeStart),
        (KeyCode::Char('o'), _) => Some(AppAction::CycleSort),
        (KeyCode::Char('f'), _) => Some(AppAction::CycleStatusFilter),
        (KeyCode::Char('L'), _) => Some(AppAction::CycleLanguageFilter),
        (KeyCode::Char('S'), _) => Some(AppAction::CycleStyleFilter),
        (KeyCode::Char('c'), _) => Some(AppAction::ClearFilters),

        (KeyCode::Char('u'), _) => Some(AppAction::UploadStart),
        (KeyCode::Char('e'), _) => Some(AppAction::EditSummary),
        (KeyCode::Char('d'), _) => Some(AppAction::Delete),
        (KeyCode::Char('w'), _) => Some(AppAction::SaveSummary),
        (KeyCode::Char('p'), _) => Some(AppAction::OpenPreview),
        (KeyCode::Char('x'), _) => Some(AppAction::Export(ExportFormat::Csv)),
        (KeyCode::Char('X'), _) => Some(AppAction::Export(ExportFormat::Json)),

        (KeyCode::Char('?'), _) => Some(AppAction::ShowHelp),

        _ => None,
    }
}
