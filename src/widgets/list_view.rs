use crate::model::List as PageList;
use crate::nav::flatten::{clamp_selection, visible_items};
use crate::theme::Theme;
use crate::widgets::chrome::panel_block;
use ratatui::prelude::*;
use ratatui::widgets::*;

/// Rows `[start, end)` to draw so that `selected` stays inside `inner_h` lines.
pub(crate) fn compute_scroll_window(total: usize, selected: usize, inner_h: u16) -> (usize, usize) {
    if inner_h == 0 || total == 0 {
        return (0, 0);
    }
    let sel = selected.min(total.saturating_sub(1));
    let ih = inner_h as usize;
    let start = sel.saturating_sub(ih - 1);
    let end = (start + ih).min(total);
    (start, end)
}

pub fn draw_list(
    f: &mut Frame,
    area: Rect,
    list: &PageList,
    filter: &str,
    selected: usize,
    focused: bool,
    theme: &Theme,
) {
    let base = list.title.as_deref().unwrap_or("Items");
    let title = if filter.is_empty() {
        base.to_string()
    } else {
        format!("{base} [/{filter}]")
    };
    let block = panel_block(&title, focused, theme);
    let rows = visible_items(list, filter);
    if rows.is_empty() {
        let msg = if list.items().is_empty() {
            list.empty_view
                .as_ref()
                .map(|ev| ev.text.clone())
                .unwrap_or_else(|| "Nothing here".into())
        } else {
            format!("No items match '{filter}'")
        };
        let p = Paragraph::new(Span::styled(msg, theme.text_muted()))
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(p, area);
        return;
    }
    let selected = clamp_selection(selected, rows.len());
    let (start, end) = compute_scroll_window(rows.len(), selected, area.height.saturating_sub(2));
    let items = list.items();
    let lines: Vec<ListItem> = rows[start..end]
        .iter()
        .enumerate()
        .filter_map(|(off, row)| {
            let item = items.get(row.idx)?;
            let is_sel = start + off == selected;
            let marker = if is_sel { "› " } else { "  " };
            let mut spans = vec![Span::styled(
                format!("{marker}{}", item.title),
                if is_sel {
                    theme.list_cursor_style()
                } else {
                    Style::default().fg(theme.fg)
                },
            )];
            if let Some(sub) = &item.subtitle {
                spans.push(Span::styled(format!("  {sub}"), theme.text_muted()));
            }
            for acc in item.accessories() {
                spans.push(Span::styled(format!("  [{acc}]"), theme.accessory_style()));
            }
            Some(ListItem::new(Line::from(spans)))
        })
        .collect();
    f.render_widget(List::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{decode_page, Page};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn page(json: &str) -> PageList {
        match decode_page(json).unwrap() {
            Page::List(l) => l,
            _ => unreachable!(),
        }
    }

    fn render(list: &PageList, filter: &str, selected: usize, h: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, h)).unwrap();
        terminal
            .draw(|f| draw_list(f, f.area(), list, filter, selected, true, &Theme::default()))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn window_keeps_selected_visible() {
        assert_eq!(compute_scroll_window(0, 0, 5), (0, 0));
        assert_eq!(compute_scroll_window(3, 1, 5), (0, 3));
        assert_eq!(compute_scroll_window(10, 9, 4), (6, 10));
        assert_eq!(compute_scroll_window(10, 2, 4), (0, 4));
    }

    #[test]
    fn rows_show_subtitle_and_accessories() {
        let l = page(
            r##"{"type":"list","title":"PRs","items":[
                {"title":"Fix tests","subtitle":"#12","accessories":["open","ci"]},
                {"title":"Bump deps"}
            ]}"##,
        );
        let s = render(&l, "", 0, 8);
        assert!(s.contains("PRs"));
        assert!(s.contains("› Fix tests"));
        assert!(s.contains("#12"));
        assert!(s.contains("[open]"));
        assert!(s.contains("[ci]"));
        assert!(s.contains("Bump deps"));
    }

    #[test]
    fn filter_appears_in_title_and_hides_rows() {
        let l = page(r#"{"type":"list","items":[{"title":"alpha"},{"title":"beta"}]}"#);
        let s = render(&l, "bet", 0, 6);
        assert!(s.contains("Items [/bet]"));
        assert!(s.contains("beta"));
        assert!(!s.contains("alpha"));
        let none = render(&l, "zzz", 0, 6);
        assert!(none.contains("No items match 'zzz'"));
    }

    #[test]
    fn empty_list_shows_empty_view() {
        let l = page(r#"{"type":"list","emptyView":{"text":"No pull requests"}}"#);
        assert!(render(&l, "", 0, 5).contains("No pull requests"));
    }
}
