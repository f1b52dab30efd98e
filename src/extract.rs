//! Multi-candidate CSS selector cascades.
//!
//! Upstream fan sites drift between theme variants, so every extraction
//! point takes an ordered list of selector alternatives and the first
//! non-empty match wins. Absence of all candidates yields `None`, never an
//! error.

use scraper::{ElementRef, Html, Selector};

fn parse_candidates(candidates: &[&str]) -> Vec<Selector> {
    candidates
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

/// First element matching any candidate, in candidate order.
pub fn doc_first<'a>(doc: &'a Html, candidates: &[&str]) -> Option<ElementRef<'a>> {
    for sel in parse_candidates(candidates) {
        if let Some(el) = doc.select(&sel).next() {
            return Some(el);
        }
    }
    None
}

/// All elements from the first candidate that matches anything.
///
/// Candidates describe the same container in different theme variants, so
/// mixing matches across candidates would duplicate cards.
pub fn doc_all<'a>(doc: &'a Html, candidates: &[&str]) -> Vec<ElementRef<'a>> {
    for sel in parse_candidates(candidates) {
        let found: Vec<ElementRef<'a>> = doc.select(&sel).collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// First descendant of `el` matching any candidate.
pub fn child_first<'a>(el: ElementRef<'a>, candidates: &[&str]) -> Option<ElementRef<'a>> {
    for sel in parse_candidates(candidates) {
        if let Some(found) = el.select(&sel).next() {
            return Some(found);
        }
    }
    None
}

/// Trimmed text content of an element.
pub fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// First candidate under `el` whose text is non-empty.
pub fn child_text(el: ElementRef, candidates: &[&str]) -> Option<String> {
    for sel in parse_candidates(candidates) {
        for found in el.select(&sel) {
            let text = text_of(found);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First candidate in the document whose text is non-empty.
pub fn doc_text(doc: &Html, candidates: &[&str]) -> Option<String> {
    for sel in parse_candidates(candidates) {
        for found in doc.select(&sel) {
            let text = text_of(found);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First non-empty attribute of `el` among `names` (e.g. `src`, `data-src`).
pub fn attr_of(el: ElementRef, names: &[&str]) -> Option<String> {
    for name in names {
        if let Some(value) = el.value().attr(name) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// First candidate under `el` carrying any of the named attributes.
pub fn child_attr(el: ElementRef, candidates: &[&str], names: &[&str]) -> Option<String> {
    for sel in parse_candidates(candidates) {
        for found in el.select(&sel) {
            if let Some(value) = attr_of(found, names) {
                return Some(value);
            }
        }
    }
    None
}
