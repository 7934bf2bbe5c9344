use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::app::Mode;
use crate::model::Page;
use crate::ui::{AppState, ToastLevel};
use crate::widgets::preview::SPINNER;

/// Key hints for whatever currently has the keyboard.
pub fn help_text(state: &AppState) -> &'static str {
    match &state.mode {
        Mode::Busy { .. } => "Esc/Ctrl+C cancel",
        Mode::Palette { .. } => "↑/↓ select  Enter run  Esc close",
        Mode::Confirm { .. } => "y run  n cancel",
        Mode::Collecting { .. } => "↑/↓ field  Enter edit  Ctrl+S submit  Esc cancel",
        Mode::Browse => match state.stack.top().map(|f| &*f.page) {
            Some(Page::List(_)) => "↑/↓ move  type to filter  Enter run  Tab actions  Esc back",
            Some(Page::Form(_)) => "↑/↓ field  Enter edit  Ctrl+S submit  Esc back",
            _ => "Enter run  Tab actions  Ctrl+R refresh  Esc back",
        },
    }
}

pub fn draw_status(f: &mut Frame, area: Rect, state: &AppState) {
    let mut spans: Vec<Span> = Vec::new();
    if let Mode::Busy { title, .. } = &state.mode {
        let spinner = SPINNER[state.tick as usize % SPINNER.len()];
        spans.push(Span::styled(
            format!(" {spinner} {title}"),
            state.theme.text_editing_bold(),
        ));
        spans.push(Span::raw("  |  "));
    }
    if let Some(t) = &state.toast {
        let color = state.theme.toast_color(t.level);
        let tag = match t.level {
            ToastLevel::Success => "[OK]",
            ToastLevel::Error => "[ERROR]",
            ToastLevel::Info => "[INFO]",
        };
        spans.push(Span::styled(
            format!("{tag} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!("{}  |  ", t.text),
            Style::default().fg(color),
        ));
    }
    if state.stack.depth() > 1 {
        spans.push(Span::styled(
            format!("depth {}  |  ", state.stack.depth()),
            state.theme.text_muted(),
        ));
    }
    spans.push(Span::styled(help_text(state), state.theme.text_muted()));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
