//! Parsers for the human-readable badges a listing carries.

use serde_json::Value;

use crate::parser::lookup::Lookup;

const REVIEW_SUFFIX: &str = "条评价";
const RATING_SUFFIX: &str = "好评率";
const WANT_MARKER: &str = "人想要";
const FREE_SHIPPING_TOKEN: &str = "freeship";
const CURRENCY_GLYPH: char = '¥';

/// `exContent.price` is `[{"text": "¥"}, {"text": "2999"}]`; only the
/// second token carries the number.
pub fn price(ex_content: Lookup) -> f64 {
    ex_content
        .key("price")
        .at(1)
        .key("text")
        .float()
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
}

/// Tag 0 of the seller label list, e.g. "42条评价" → 42.
pub fn review_count(tags: &[Value]) -> i64 {
    let content = tags
        .first()
        .map(|t| Lookup::new(t).path("data.content"))
        .and_then(|l| l.text())
        .unwrap_or_default();
    let digits = content.replace(REVIEW_SUFFIX, "");
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().unwrap_or(0)
    } else {
        0
    }
}

/// Tag 1 of the seller label list, e.g. "98%好评率" → "98%".
pub fn rating_label(tags: &[Value]) -> Option<String> {
    let tag = tags.get(1)?;
    let content = Lookup::new(tag)
        .path("data.content")
        .text()
        .unwrap_or_else(|| "0%".to_string());
    Some(content.replace(RATING_SUFFIX, ""))
}

/// "128人想要" → "128"; anything without the marker → "0".
pub fn want_count(content: Option<&str>) -> String {
    match content {
        Some(c) if c.contains(WANT_MARKER) => c.replace(WANT_MARKER, ""),
        _ => "0".to_string(),
    }
}

pub fn is_free_shipping(tag: Option<&str>) -> bool {
    tag.unwrap_or("").contains(FREE_SHIPPING_TOKEN)
}

pub fn strip_currency(raw: &str) -> String {
    raw.replace(CURRENCY_GLYPH, "")
}
