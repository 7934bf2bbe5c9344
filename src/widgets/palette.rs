use crate::model::Action;
use crate::theme::Theme;
use crate::widgets::chrome::{centered_rect, panel_block};
use ratatui::prelude::*;
use ratatui::widgets::*;

/// Overlay listing the actions of the current item; the first one is what Enter runs.
pub fn draw_palette(f: &mut Frame, area: Rect, actions: &[Action], selected: usize, theme: &Theme) {
    let rect = centered_rect(60, 50, area);
    let lines: Vec<Line> = actions
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let is_sel = i == selected;
            let marker = if is_sel { "› " } else { "  " };
            let mut spans = vec![Span::styled(
                format!("{marker}{}", a.display_title()),
                if is_sel {
                    theme.list_cursor_style()
                } else {
                    Style::default().fg(theme.fg)
                },
            )];
            if i == 0 {
                spans.push(Span::styled("  ↵", theme.text_muted()));
            }
            if let Some(k) = a.key() {
                spans.push(Span::styled(
                    format!("  Ctrl+{}", k.to_uppercase()),
                    theme.accessory_style(),
                ));
            }
            spans.push(Span::styled(format!("  {}", a.kind()), theme.text_muted()));
            Line::from(spans)
        })
        .collect();
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(lines).block(panel_block("Actions", true, theme)),
        rect,
    );
}

pub fn draw_confirm(f: &mut Frame, area: Rect, title: &str, command: &str, theme: &Theme) {
    let rect = centered_rect(60, 30, area);
    let lines = vec![
        Line::from(Span::styled(format!("Run '{title}'?"), theme.title_style())),
        Line::from(""),
        Line::from(Span::styled(command.to_string(), theme.text_muted())),
        Line::from(""),
        Line::from(vec![
            Span::styled("[y] run", theme.text_active_bold()),
            Span::raw("   "),
            Span::styled("[n] cancel", theme.text_muted()),
        ]),
    ];
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(lines)
            .block(panel_block("Confirm", true, theme))
            .wrap(Wrap { trim: false }),
        rect,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decode_action_value;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use serde_json::json;

    #[test]
    fn palette_lists_titles_and_shortcuts() {
        let actions = vec![
            decode_action_value(json!({"type": "open", "target": "https://x", "title": "Browse"}))
                .unwrap(),
            decode_action_value(json!({"type": "copy", "text": "id", "key": "c"})).unwrap(),
        ];
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal
            .draw(|f| draw_palette(f, f.area(), &actions, 1, &Theme::default()))
            .unwrap();
        let s: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(s.contains("Actions"));
        assert!(s.contains("Browse"));
        assert!(s.contains("› Copy"));
        assert!(s.contains("Ctrl+C"));
    }
}
