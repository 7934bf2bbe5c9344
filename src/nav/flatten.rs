use crate::model::{List, ListItem};
use crate::nav::keys::item_key;

/// A list row as shown after filtering; `idx` points into the page's `items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleItem {
    pub idx: usize,
    pub key: String,
}

pub fn visible_items(list: &List, filter: &str) -> Vec<VisibleItem> {
    list.items()
        .iter()
        .enumerate()
        .filter(|(_, item)| item.matches(filter))
        .map(|(idx, item)| VisibleItem {
            idx,
            key: item_key(item, idx),
        })
        .collect()
}

/// Item under the cursor, if the filtered list has any rows.
pub fn selected_item<'a>(
    list: &'a List,
    filter: &str,
    selected: usize,
) -> Option<(VisibleItem, &'a ListItem)> {
    let rows = visible_items(list, filter);
    let row = rows.get(selected.min(rows.len().saturating_sub(1)))?.clone();
    let item = list.items().get(row.idx)?;
    Some((row, item))
}

pub fn clamp_selection(selected: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        selected.min(total - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{decode_page, Page};

    fn list() -> List {
        let page = decode_page(
            r#"{"type":"list","items":[
                {"title":"Alpha","id":"a"},
                {"title":"Beta"},
                {"title":"Gamma","subtitle":"alphabet soup"}
            ]}"#,
        )
        .unwrap();
        match page {
            Page::List(l) => l,
            _ => unreachable!(),
        }
    }

    #[test]
    fn filter_keeps_original_indices() {
        let l = list();
        let all = visible_items(&l, "");
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].key, "#1");
        let rows = visible_items(&l, "alpha");
        assert_eq!(
            rows,
            vec![
                VisibleItem {
                    idx: 0,
                    key: "a".into()
                },
                VisibleItem {
                    idx: 2,
                    key: "#2".into()
                },
            ]
        );
    }

    #[test]
    fn selection_clamps_to_filtered_rows() {
        let l = list();
        let (row, item) = selected_item(&l, "alpha", 9).unwrap();
        assert_eq!(row.idx, 2);
        assert_eq!(item.title, "Gamma");
        assert!(selected_item(&l, "zzz", 0).is_none());
        assert_eq!(clamp_selection(5, 0), 0);
        assert_eq!(clamp_selection(5, 3), 2);
    }
}
