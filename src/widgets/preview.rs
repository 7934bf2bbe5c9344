use crate::model::Detail;
use crate::services::preview::{PreviewStatus, SlotState};
use crate::theme::Theme;
use crate::widgets::chrome::panel_block;
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::sync::OnceLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SynStyle, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

pub const SPINNER: [&str; 6] = ["⠋", "⠙", "⠸", "⠴", "⠦", "⠇"];

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

fn syn_to_tui_color(c: syntect::highlighting::Color) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

/// Preview text as lines, highlighted when `language` names a known syntax.
pub fn highlight(text: &str, language: Option<&str>, syntax_theme: &str) -> Vec<Line<'static>> {
    let ps = syntax_set();
    let syntax = language
        .filter(|l| !l.is_empty())
        .and_then(|l| ps.find_syntax_by_token(l));
    let ts = theme_set();
    let (Some(syntax), Some(theme)) = (syntax, ts.themes.get(syntax_theme)) else {
        return text.lines().map(|l| Line::from(l.to_string())).collect();
    };
    let mut high = HighlightLines::new(syntax, theme);
    let mut out: Vec<Line<'static>> = Vec::new();
    for line in LinesWithEndings::from(text) {
        let regions: Vec<(SynStyle, &str)> = match high.highlight_line(line, ps) {
            Ok(r) => r,
            Err(_) => {
                out.push(Line::from(line.trim_end_matches(['\n', '\r']).to_string()));
                continue;
            }
        };
        let spans: Vec<Span<'static>> = regions
            .into_iter()
            .map(|(st, seg)| {
                let mut style = Style::default().fg(syn_to_tui_color(st.foreground));
                if st.font_style.contains(FontStyle::BOLD) {
                    style = style.add_modifier(Modifier::BOLD);
                }
                if st.font_style.contains(FontStyle::ITALIC) {
                    style = style.add_modifier(Modifier::ITALIC);
                }
                Span::styled(seg.trim_end_matches(['\n', '\r']).to_string(), style)
            })
            .collect();
        out.push(Line::from(spans));
    }
    out
}

#[allow(clippy::too_many_arguments)]
pub fn draw_preview(
    f: &mut Frame,
    area: Rect,
    title: &str,
    slot: Option<&SlotState>,
    language: Option<&str>,
    focused: bool,
    tick: u64,
    theme: &Theme,
) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut title = title.to_string();
    match slot {
        None => lines.push(Line::from(Span::styled("No preview", theme.text_muted()))),
        Some(s) => {
            if let PreviewStatus::Loading = s.status {
                title = format!("{title} {} loading", SPINNER[tick as usize % SPINNER.len()]);
            }
            lines = highlight(&s.text, language, theme.syntax_theme());
            if let PreviewStatus::Failed(msg) = &s.status {
                if !lines.is_empty() {
                    lines.push(Line::from(""));
                }
                for l in msg.lines() {
                    lines.push(Line::from(Span::styled(l.to_string(), theme.text_error())));
                }
            }
        }
    }
    let p = Paragraph::new(lines)
        .block(panel_block(&title, focused, theme))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

/// Detail page: the preview fills the area, the page actions sit underneath.
pub fn draw_detail(
    f: &mut Frame,
    area: Rect,
    detail: &Detail,
    slot: Option<&SlotState>,
    tick: u64,
    theme: &Theme,
) {
    let actions = detail.actions();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(if actions.is_empty() { 0 } else { 1 }),
        ])
        .split(area);
    let title = detail.title.as_deref().unwrap_or("Detail");
    draw_preview(
        f,
        chunks[0],
        title,
        slot,
        detail.preview.language(),
        true,
        tick,
        theme,
    );
    if !actions.is_empty() {
        let mut spans: Vec<Span> = Vec::new();
        for (i, a) in actions.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw("  "));
            }
            let label = match a.key() {
                Some(k) => format!("{} (^{})", a.display_title(), k.to_uppercase()),
                None => a.display_title(),
            };
            let style = if i == 0 {
                theme.text_active_bold()
            } else {
                theme.accessory_style()
            };
            spans.push(Span::styled(label, style));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), chunks[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{decode_page, Page};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn plain_text_without_language() {
        let lines = highlight("a\nb\n", None, "base16-ocean.dark");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].spans[0].content, "b");
    }

    #[test]
    fn known_language_gets_colours() {
        let lines = highlight("{\"a\": 1}\n", Some("json"), "base16-ocean.dark");
        assert_eq!(lines.len(), 1);
        let text: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "{\"a\": 1}");
        assert!(lines[0]
            .spans
            .iter()
            .any(|s| matches!(s.style.fg, Some(Color::Rgb(..)))));
    }

    #[test]
    fn unknown_language_falls_back_to_plain() {
        let lines = highlight("x", Some("no-such-lang"), "base16-ocean.dark");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans[0].style, Style::default());
    }

    #[test]
    fn detail_renders_preview_and_actions() {
        let page = decode_page(
            r#"{"type":"detail","title":"Readme",
                "preview":{"type":"static","text":"hello body"},
                "actions":[{"type":"copy","title":"Copy","text":"x","key":"c"}]}"#,
        )
        .unwrap();
        let Page::Detail(detail) = page else {
            unreachable!()
        };
        let slot = SlotState::with_status(
            "detail",
            "hello body",
            PreviewStatus::Failed("exit 2: boom".into()),
        );
        let mut terminal = Terminal::new(TestBackend::new(50, 10)).unwrap();
        terminal
            .draw(|f| draw_detail(f, f.area(), &detail, Some(&slot), 0, &Theme::default()))
            .unwrap();
        let s = screen(&terminal);
        assert!(s.contains("Readme"));
        assert!(s.contains("hello body"));
        assert!(s.contains("exit 2: boom"));
        assert!(s.contains("Copy (^C)"));
    }
}
