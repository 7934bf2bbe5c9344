use crate::model::ListItem;

/// Key of a list item within its page: its `id`, or its position when it has none.
pub fn item_key(item: &ListItem, idx: usize) -> String {
    match item.id.as_deref() {
        Some(id) => id.to_string(),
        None => format!("#{idx}"),
    }
}

/// Key for the preview cache. Positional keys are not stable across reloads, so
/// items without an `id` have none.
pub fn cache_key(item: &ListItem) -> Option<&str> {
    item.id.as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_wins_over_position() {
        let mut item = ListItem {
            title: "t".into(),
            ..Default::default()
        };
        assert_eq!(item_key(&item, 4), "#4");
        assert!(cache_key(&item).is_none());
        item.id = Some("pr-12".into());
        assert_eq!(item_key(&item, 4), "pr-12");
        assert_eq!(cache_key(&item), Some("pr-12"));
    }
}
