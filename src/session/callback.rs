//! Parsing of underscore-delimited callback action tokens.
//!
//! Two token shapes are understood:
//! `lgdl_<sessionKey>_<index>` selects a result for download and
//! `lgpage_<sessionKey>_<page>` changes the rendered page.

/// A decoded callback action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Select the result at a global index for download.
    Download {
        /// Session key the selection belongs to.
        key: String,
        /// Global (session-wide) result index.
        index: usize,
    },
    /// Render a different page of the session.
    Page {
        /// Session key the page belongs to.
        key: String,
        /// 1-indexed page number to render.
        page: usize,
    },
}

/// Parses a callback token; returns `None` for inert or foreign tokens.
///
/// Session keys are uuid-shaped and never contain underscores, so a
/// plain split is unambiguous.
#[must_use]
pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    let mut parts = data.split('_');
    let prefix = parts.next()?;
    let key = parts.next()?.to_string();
    let number = parts.next()?;
    if parts.next().is_some() || key.is_empty() {
        return None;
    }

    match prefix {
        "lgdl" => Some(CallbackAction::Download {
            key,
            index: number.parse().ok()?,
        }),
        "lgpage" => Some(CallbackAction::Page {
            key,
            page: number.parse().ok()?,
        }),
        _ => None,
    }
}
