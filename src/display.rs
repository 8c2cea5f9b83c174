//! Formatting shared by the meal views.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/400x240?text=No+Image";

/// `May 1, 2024, 10:05 AM` style timestamp; "Unknown" when absent.
pub fn format_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return "Unknown".into();
    };
    let fmt = format_description!(
        "[month repr:long] [day padding:none], [year], [hour repr:12]:[minute] [period]"
    );
    match parse_instant(raw).and_then(|t| t.format(&fmt).ok()) {
        Some(s) => s,
        None => "Invalid Date".into(),
    }
}

/// `5/1/2024` style date; "No date" when absent or unreadable.
pub fn format_date(raw: Option<&str>) -> String {
    let fmt = format_description!("[month padding:none]/[day padding:none]/[year]");
    raw.and_then(parse_instant)
        .and_then(|t| t.date().format(&fmt).ok())
        .unwrap_or_else(|| "No date".into())
}

/// Accepts full RFC 3339 instants and bare `YYYY-MM-DD` dates.
fn parse_instant(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(t);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

/// Five-slot star bar for a 0–5 rating, rounded to the nearest star.
pub fn star_rating(rating: f64) -> String {
    let full = if rating.is_finite() {
        rating.round().clamp(0.0, 5.0) as usize
    } else {
        0
    };
    format!("{}{}", "★".repeat(full), "☆".repeat(5 - full))
}

pub fn format_price(price: f64) -> String {
    format!("${price:.2}")
}

pub fn image_or_placeholder(image: Option<&str>) -> &str {
    image.filter(|i| !i.trim().is_empty()).unwrap_or(PLACEHOLDER_IMAGE)
}
