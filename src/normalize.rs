use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::{Salary, VacancyRecord};

#[derive(Debug, Default, Deserialize)]
struct RawItem {
    id: Option<Value>,
    name: Option<String>,
    alternate_url: Option<String>,
    published_at: Option<String>,
    salary: Option<RawSalary>,
    employer: Option<RawNamed>,
    area: Option<RawNamed>,
    snippet: Option<RawSnippet>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSalary {
    from: Option<i64>,
    to: Option<i64>,
    currency: Option<String>,
    gross: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNamed {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSnippet {
    requirement: Option<String>,
    responsibility: Option<String>,
}

#[derive(Debug, Error)]
pub enum NormalizeSkip {
    #[error("item is not a JSON object")]
    NotAnObject,
    #[error("malformed item: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Converts one raw search item into a record.
pub fn normalize_item(item: Value) -> Result<VacancyRecord, NormalizeSkip> {
    if !item.is_object() {
        return Err(NormalizeSkip::NotAnObject);
    }
    let raw: RawItem = serde_json::from_value(item)?;

    let id = raw.id.and_then(|id| match id {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    // A salary object is present only when the source carried one.
    let salary = raw.salary.map(|s| Salary {
        from: s.from,
        to: s.to,
        currency: s.currency,
        is_gross: s.gross,
    });

    let snippet = raw.snippet.unwrap_or_default();
    let published_at = raw.published_at.as_deref().and_then(parse_published);

    Ok(VacancyRecord {
        id,
        title: raw.name.unwrap_or_default(),
        url: raw.alternate_url.unwrap_or_default(),
        published_raw: raw.published_at,
        published_at,
        salary,
        employer_name: raw.employer.and_then(|e| e.name).unwrap_or_default(),
        city_name: raw.area.and_then(|a| a.name).unwrap_or_default(),
        snippet_requirement: snippet.requirement.unwrap_or_default(),
        snippet_responsibility: snippet.responsibility.unwrap_or_default(),
    })
}

/// Normalizes a page worth of items, logging and dropping the ones that fail.
pub fn normalize_items(items: Vec<Value>) -> (Vec<VacancyRecord>, usize) {
    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for (index, item) in items.into_iter().enumerate() {
        match normalize_item(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                warn!(index, error = %e, "Skipping vacancy item");
            }
        }
    }
    (records, skipped)
}

/// Parses publication timestamps as the search API emits them.
///
/// Accepts RFC 3339 (`Z` or `+03:00`), compact offsets (`+0300`) and naive
/// timestamps, which are taken to be UTC.
pub fn parse_published(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}
