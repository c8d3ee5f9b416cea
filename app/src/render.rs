//! Text forms of the shared page states.

use pagination::{PageControl, PaginationView};

pub fn loading(things: &str) -> String {
    format!("Loading {}...", things)
}

pub fn empty(things: &str) -> String {
    format!("No {} found.", things)
}

pub fn error(message: &str) -> String {
    format!("Error: {}", message)
}

/// One line of page controls, e.g. `(Previous) <1> 2 3 4 ... 10 [Next]`.
///
/// Enabled arrows are bracketed, disabled ones parenthesized and the current
/// page is marked with angle brackets.
pub fn pagination(view: &PaginationView) -> String {
    view.controls()
        .into_iter()
        .map(|control| match control {
            PageControl::Previous { enabled: true } => "[Previous]".to_string(),
            PageControl::Previous { enabled: false } => "(Previous)".to_string(),
            PageControl::Next { enabled: true } => "[Next]".to_string(),
            PageControl::Next { enabled: false } => "(Next)".to_string(),
            PageControl::Page { number, current: true } => format!("<{}>", number),
            PageControl::Page { number, current: false } => number.to_string(),
            PageControl::Ellipsis => "...".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn page_status(view: &PaginationView) -> String {
    format!("Page {} of {}", view.current_page, view.total_pages)
}
