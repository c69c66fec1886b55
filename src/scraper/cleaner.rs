//! Fallback table and field normalization.
//!
//! Everything here is pure: raw scraped text in, normalized field out, with
//! `now` passed explicitly where time is involved.

use crate::models::PinStatus;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

pub const FALLBACK_PRICE: &str = "0 KWD";
pub const FALLBACK_ADDRESS: &str = "Not Mentioned";
pub const FALLBACK_BEDS: &str = "0 Bed";
pub const FALLBACK_AREA: &str = "0 m2";
pub const FALLBACK_ADS: &str = "0 ads";

static AD_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Ad ID: \d+$").unwrap());
static ADS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\d+\s+ads$").unwrap());
static MEMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Member since .+$").unwrap());
static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s+([a-z]+)").unwrap());

// ── Literal fallbacks ─────────────────────────────────────────────────────────

pub fn price_or_default(raw: Option<String>) -> String {
    raw.unwrap_or_else(|| FALLBACK_PRICE.to_string())
}

pub fn beds_or_default(raw: Option<String>) -> String {
    raw.unwrap_or_else(|| FALLBACK_BEDS.to_string())
}

pub fn area_or_default(raw: Option<String>) -> String {
    raw.unwrap_or_else(|| FALLBACK_AREA.to_string())
}

/// "Ad ID: <digits>" is the ad's own id leaking into the address slot, not an
/// address; it gets the same fallback as a missing element.
pub fn address_or_default(raw: Option<String>) -> String {
    match raw {
        Some(text) if !AD_ID_RE.is_match(&text) => text,
        _ => FALLBACK_ADDRESS.to_string(),
    }
}

/// The badge has to literally read "Pinned today"; anything else in that slot
/// does not count.
pub fn pin_status(badge: Option<&str>) -> PinStatus {
    match badge {
        Some("Pinned today") => PinStatus::PinnedToday,
        _ => PinStatus::NotPinned,
    }
}

// ── Submitter details ─────────────────────────────────────────────────────────

/// Apply the ads/membership precedence rules to the submitter detail strings:
/// ads is the first element when it matches `<n> ads`, otherwise "0 ads";
/// membership is the second element when it matches `Member since …`,
/// otherwise the first element, otherwise null.
pub fn ads_and_membership(details: &[String]) -> (String, Option<String>) {
    let ads = match details.first() {
        Some(first) if ADS_RE.is_match(first) => first.clone(),
        _ => FALLBACK_ADS.to_string(),
    };

    let membership = match (details.first(), details.get(1)) {
        (_, Some(second)) if MEMBER_RE.is_match(second) => Some(second.clone()),
        (Some(first), Some(_)) => Some(first.clone()),
        (Some(first), None) => Some(first.clone()),
        (None, _) => None,
    };

    (ads, membership)
}

// ── Relative time ─────────────────────────────────────────────────────────────

/// Strip the trailing " ago" from a relative-date phrase.
pub fn strip_ago(raw: &str) -> String {
    raw.replace(" ago", "").trim().to_string()
}

/// Outcome of resolving a relative phrase against `now`. The two sentinel
/// cases are distinct from a missing input, which callers keep as None.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedDate {
    Resolved(NaiveDateTime),
    /// No `<integer> <unit>` shape found at all.
    Unparseable,
    /// Shape found, but the unit is not second/minute/hour/day.
    UnsupportedUnit,
}

impl fmt::Display for ResolvedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedDate::Resolved(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            ResolvedDate::Unparseable => write!(f, "Invalid Relative Time"),
            ResolvedDate::UnsupportedUnit => write!(f, "Unsupported time unit found."),
        }
    }
}

/// Resolve "5 Hours", "30 Minutes ago", "1 day" etc. into the absolute
/// publish time `now - duration`.
pub fn resolve_relative_date(raw: &str, now: NaiveDateTime) -> ResolvedDate {
    let Some(caps) = RELATIVE_RE.captures(raw) else {
        return ResolvedDate::Unparseable;
    };

    let Ok(amount) = caps[1].parse::<i64>() else {
        return ResolvedDate::Unparseable;
    };
    let unit = caps[2].to_lowercase();
    let unit = unit.strip_suffix('s').unwrap_or(&unit);

    let duration = match unit {
        "second" => Duration::try_seconds(amount),
        "minute" => Duration::try_minutes(amount),
        "hour" => Duration::try_hours(amount),
        "day" => Duration::try_days(amount),
        _ => return ResolvedDate::UnsupportedUnit,
    };

    duration
        .and_then(|d| now.checked_sub_signed(d))
        .map(ResolvedDate::Resolved)
        .unwrap_or(ResolvedDate::Unparseable)
}

// ── Publish-date filter ───────────────────────────────────────────────────────

/// Parse a filter target: "today", "yesterday", or an explicit YYYY-MM-DD.
pub fn parse_filter_target(raw: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    match raw.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => today
            .pred_opt()
            .ok_or_else(|| anyhow::anyhow!("no day before {today}")),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("invalid filter date `{other}`: {e}")),
    }
}

/// Whether a record's `date_published` falls on the target day. Sentinel
/// strings and missing dates never match.
pub fn published_on(date_published: Option<&str>, target: NaiveDate) -> bool {
    date_published
        .and_then(|s| s.get(..10))
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .is_some_and(|day| day == target)
}
