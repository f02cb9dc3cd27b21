//! `class` attribute manipulation on whitespace-separated token strings.

pub fn contains(class_attr: &str, class: &str) -> bool {
    class_attr.split_ascii_whitespace().any(|token| token == class)
}

/// Returns the new attribute value, or `None` when `class` was already there.
pub fn with_added(class_attr: &str, class: &str) -> Option<String> {
    if contains(class_attr, class) {
        return None;
    }
    let trimmed = class_attr.trim();
    Some(if trimmed.is_empty() {
        class.to_string()
    } else {
        format!("{trimmed} {class}")
    })
}

/// Returns the new attribute value, or `None` when `class` was absent.
pub fn with_removed(class_attr: &str, class: &str) -> Option<String> {
    if !contains(class_attr, class) {
        return None;
    }
    Some(
        class_attr
            .split_ascii_whitespace()
            .filter(|token| *token != class)
            .collect::<Vec<_>>()
            .join(" "),
    )
}
