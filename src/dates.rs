//! Review date normalization.
//!
//! Listing pages show recent visits relatively ("Dined 3 days ago") and older
//! ones as "Jul 12, 2023". Anything else maps to `None` and is dropped by the
//! trend charts.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};

/// Normalizes a review date relative to the local clock.
pub fn normalize_review_date(text: &str) -> Option<NaiveDate> {
    normalize_review_date_at(text, Local::now().naive_local())
}

/// Normalizes a review date relative to `now`.
pub fn normalize_review_date_at(text: &str, now: NaiveDateTime) -> Option<NaiveDate> {
    let trimmed = text.trim();
    let lowered = trimmed.to_lowercase();

    if lowered == "dined today" {
        return Some(now.date());
    }

    if lowered.contains("dined") {
        if lowered.contains("hours ago") {
            let hours = count_token(&lowered)?;
            return now.checked_sub_signed(Duration::try_hours(hours)?).map(|t| t.date());
        }
        if lowered.contains("days ago") {
            let days = count_token(&lowered)?;
            return now.date().checked_sub_signed(Duration::try_days(days)?);
        }
        if lowered.contains("weeks ago") {
            let weeks = count_token(&lowered)?;
            return now.date().checked_sub_signed(Duration::try_weeks(weeks)?);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%b %d, %Y").ok()
}

// "dined 3 days ago" -> 3. A non-numeric second token is a format error, not a panic.
fn count_token(text: &str) -> Option<i64> {
    text.split_whitespace().nth(1)?.parse().ok()
}
