//! Keyboard rendering for paginated search results.

use super::PageView;

/// Titles longer than this are truncated with an ellipsis.
const TITLE_TRUNCATE_CHARS: usize = 35;

/// Callback token for the inert page indicator.
const PAGE_INDICATOR_ACTION: &str = "pages";

/// One selectable control with its callback action token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label.
    pub label: String,
    /// Underscore-delimited callback token (see [`super::parse_callback`]).
    pub action: String,
}

impl Button {
    fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Rows of buttons attached to a rendered message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    /// Button rows, top to bottom.
    pub rows: Vec<Vec<Button>>,
}

/// Builds the keyboard for one result page: one selectable row per
/// record labeled with extension and size, then a navigation row with
/// Back / `page/total` / Next as applicable.
#[must_use]
pub fn result_keyboard(view: &PageView, key: &str) -> Keyboard {
    let mut rows = Vec::with_capacity(view.records.len() + 1);

    for (offset, record) in view.records.iter().enumerate() {
        let global_index = view.start_index + offset;
        let title = truncate_title(&record.title);
        rows.push(vec![Button::new(
            format!(
                "{} ~{} - {}",
                record.extension.to_uppercase(),
                record.size,
                title
            ),
            format!("lgdl_{key}_{global_index}"),
        )]);
    }

    let mut navigation = Vec::new();
    if view.page > 1 {
        navigation.push(Button::new(
            "Back",
            format!("lgpage_{key}_{}", view.page - 1),
        ));
    }
    navigation.push(Button::new(
        format!("{}/{}", view.page, view.total_pages),
        PAGE_INDICATOR_ACTION,
    ));
    if view.page < view.total_pages {
        navigation.push(Button::new(
            "Next",
            format!("lgpage_{key}_{}", view.page + 1),
        ));
    }
    rows.push(navigation);

    Keyboard { rows }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_TRUNCATE_CHARS {
        let truncated: String = title.chars().take(TITLE_TRUNCATE_CHARS).collect();
        format!("{truncated}...")
    } else {
        title.to_string()
    }
}
