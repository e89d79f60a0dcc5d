//! CSS selector helpers over a parsed document
//!
//! Uses the scraper crate to select elements by CSS selectors. A selector that
//! fails to parse or matches nothing yields `None`/empty, never an error: a
//! missing field must not abort the record it belongs to.

use scraper::{ElementRef, Html, Selector};

/// Parse a selector, treating an invalid one like a selector with no match
pub fn selector(selector_str: &str) -> Option<Selector> {
    Selector::parse(selector_str).ok()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Extract first matching element's text
pub fn first_text(document: &Html, selector_str: &str) -> Option<String> {
    let selector = selector(selector_str)?;
    document.select(&selector).next().map(element_text)
}

/// Extract first matching element's attribute
pub fn first_attr(document: &Html, selector_str: &str, attr_name: &str) -> Option<String> {
    let selector = selector(selector_str)?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr_name).map(String::from))
}

/// Extract text content from elements matching a CSS selector
pub fn all_text(document: &Html, selector_str: &str) -> Vec<String> {
    let Some(selector) = selector(selector_str) else {
        return vec![];
    };
    document.select(&selector).map(element_text).collect()
}

/// Text of the first descendant of `el` matching the selector
pub fn child_text(el: ElementRef<'_>, selector_str: &str) -> Option<String> {
    let selector = selector(selector_str)?;
    el.select(&selector).next().map(element_text)
}

/// Attribute of the first descendant of `el` matching the selector
pub fn child_attr(el: ElementRef<'_>, selector_str: &str, attr_name: &str) -> Option<String> {
    let selector = selector(selector_str)?;
    el.select(&selector)
        .next()
        .and_then(|c| c.value().attr(attr_name).map(String::from))
}

/// Number of descendants of `el` matching the selector
pub fn child_count(el: ElementRef<'_>, selector_str: &str) -> usize {
    selector(selector_str)
        .map(|s| el.select(&s).count())
        .unwrap_or(0)
}

/// Value cell following a label cell, as in
/// `<div><div>Size</div><div>45M</div></div>` or `<tr><td>File Size</td><td>8 MB</td></tr>`.
///
/// The label must match the cell's whole trimmed text, case-insensitively.
pub fn labelled_value(document: &Html, label: &str) -> Option<String> {
    let cells = selector("div, td, th, dt, span")?;
    document
        .select(&cells)
        .filter(|el| element_text(*el).eq_ignore_ascii_case(label))
        .find_map(|el| {
            el.next_siblings()
                .filter_map(ElementRef::wrap)
                .next()
                .map(element_text)
                .filter(|text| !text.is_empty())
        })
}
