use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{AcceptedVacancy, SearchPeriod, VacancyRecord};

pub const TARGET_CITIES: &[&str] = &[
    "Москва",
    "Санкт-Петербург",
    "Москва и Московская область",
    "Санкт-Петербург и область",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterSkip {
    #[error("publication date missing")]
    MissingDate,
    #[error("unparseable publication date '{0}'")]
    InvalidDate(String),
    #[error("published outside the search period")]
    OutsidePeriod,
    #[error("city missing")]
    MissingCity,
    #[error("city '{0}' is not a target city")]
    OtherCity(String),
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub kept: Vec<AcceptedVacancy>,
    pub skipped: Vec<(String, FilterSkip)>,
}

impl FilterOutcome {
    /// Count of records rejected for reasons other than window or city.
    pub fn defects(&self) -> usize {
        self.skipped
            .iter()
            .filter(|(_, reason)| {
                matches!(reason, FilterSkip::MissingDate | FilterSkip::InvalidDate(_))
            })
            .count()
    }
}

pub fn is_target_city(city: &str) -> bool {
    let city = city.to_lowercase();
    TARGET_CITIES
        .iter()
        .any(|target| city.contains(&target.to_lowercase()))
}

pub fn evaluate(record: &VacancyRecord, period: &SearchPeriod) -> Result<AcceptedVacancy, FilterSkip> {
    let published_at = match (record.published_at, record.published_raw.as_deref()) {
        (Some(at), _) => at,
        (None, Some(raw)) => return Err(FilterSkip::InvalidDate(raw.to_string())),
        (None, None) => return Err(FilterSkip::MissingDate),
    };

    if !period.contains(published_at) {
        return Err(FilterSkip::OutsidePeriod);
    }

    let city = record.city_name.trim();
    if city.is_empty() {
        return Err(FilterSkip::MissingCity);
    }
    if !is_target_city(city) {
        return Err(FilterSkip::OtherCity(city.to_string()));
    }

    Ok(AcceptedVacancy {
        published_at,
        record: record.clone(),
    })
}

/// Keeps in-window vacancies from target cities, newest first.
///
/// Ties keep their arrival order.
pub fn filter_vacancies(records: &[VacancyRecord], period: &SearchPeriod) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for record in records {
        match evaluate(record, period) {
            Ok(accepted) => outcome.kept.push(accepted),
            Err(reason) => {
                match &reason {
                    FilterSkip::MissingDate | FilterSkip::InvalidDate(_) => {
                        warn!(id = record.display_id(), reason = %reason, "Error filtering vacancy")
                    }
                    _ => debug!(id = record.display_id(), reason = %reason, "Vacancy filtered out"),
                }
                outcome.skipped.push((record.display_id().to_string(), reason));
            }
        }
    }

    outcome
        .kept
        .sort_by(|a, b| b.published_at.cmp(&a.published_at));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn period() -> SearchPeriod {
        SearchPeriod {
            start: utc("2024-01-10T17:00:00Z"),
            end: utc("2024-01-11T17:00:00Z"),
        }
    }

    fn record(id: &str, published_at: Option<DateTime<Utc>>, city: &str) -> VacancyRecord {
        VacancyRecord {
            id: Some(id.to_string()),
            title: format!("Vacancy {}", id),
            url: format!("https://hh.ru/vacancy/{}", id),
            published_raw: published_at.map(|at| at.to_rfc3339()),
            published_at,
            salary: None,
            employer_name: "Acme".to_string(),
            city_name: city.to_string(),
            snippet_requirement: String::new(),
            snippet_responsibility: String::new(),
        }
    }

    fn kept_ids(outcome: &FilterOutcome) -> Vec<String> {
        outcome
            .kept
            .iter()
            .map(|v| v.record.display_id().to_string())
            .collect()
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let p = period();
        let one = Duration::seconds(1);
        let records = vec![
            record("at-start", Some(p.start), "Москва"),
            record("at-end", Some(p.end), "Москва"),
            record("before-start", Some(p.start - one), "Москва"),
            record("after-end", Some(p.end + one), "Москва"),
        ];
        let outcome = filter_vacancies(&records, &p);
        assert_eq!(kept_ids(&outcome), vec!["at-end", "at-start"]);
        assert_eq!(outcome.skipped.len(), 2);
        assert!(outcome
            .skipped
            .iter()
            .all(|(_, reason)| *reason == FilterSkip::OutsidePeriod));
    }

    #[test]
    fn test_city_match_is_case_insensitive_substring() {
        assert!(is_target_city("Москва"));
        assert!(is_target_city("МОСКВА"));
        assert!(is_target_city("г. Санкт-Петербург"));
        assert!(is_target_city("Москва и Московская область"));
        assert!(!is_target_city("Казань"));
        assert!(!is_target_city(""));
    }

    #[test]
    fn test_missing_and_foreign_cities_are_skipped() {
        let at = utc("2024-01-11T10:00:00Z");
        let records = vec![
            record("no-city", Some(at), ""),
            record("kazan", Some(at), "Казань"),
            record("spb", Some(at), "Санкт-Петербург"),
        ];
        let outcome = filter_vacancies(&records, &period());
        assert_eq!(kept_ids(&outcome), vec!["spb"]);
        assert_eq!(outcome.skipped[0].1, FilterSkip::MissingCity);
        assert_eq!(outcome.skipped[1].1, FilterSkip::OtherCity("Казань".to_string()));
    }

    #[test]
    fn test_sorted_newest_first_and_stable_on_ties() {
        let tie = utc("2024-01-11T09:00:00Z");
        let records = vec![
            record("old", Some(utc("2024-01-10T18:00:00Z")), "Москва"),
            record("tie-1", Some(tie), "Москва"),
            record("new", Some(utc("2024-01-11T16:00:00Z")), "Москва"),
            record("tie-2", Some(tie), "Санкт-Петербург"),
        ];
        let outcome = filter_vacancies(&records, &period());
        assert_eq!(kept_ids(&outcome), vec!["new", "tie-1", "tie-2", "old"]);
        for pair in outcome.kept.windows(2) {
            assert!(pair[0].published_at >= pair[1].published_at);
        }
    }

    #[test]
    fn test_bad_dates_count_as_defects() {
        let mut broken = record("broken", None, "Москва");
        broken.published_raw = Some("31.02.2024".to_string());
        let records = vec![
            broken,
            record("undated", None, "Москва"),
            record("ok", Some(utc("2024-01-11T00:00:00Z")), "Москва"),
        ];
        let outcome = filter_vacancies(&records, &period());
        assert_eq!(kept_ids(&outcome), vec!["ok"]);
        assert_eq!(outcome.defects(), 2);
        assert_eq!(
            outcome.skipped[0].1,
            FilterSkip::InvalidDate("31.02.2024".to_string())
        );
        assert_eq!(outcome.skipped[1].1, FilterSkip::MissingDate);
    }

    #[test]
    fn test_window_scenario_from_one_page() {
        use crate::normalize::normalize_items;
        use serde_json::json;

        let items = vec![
            json!({"id": "A", "name": "Python dev", "published_at": "2024-01-10T18:00:00Z", "area": {"name": "Москва"}}),
            json!({"id": "B", "name": "Java dev", "published_at": "2024-01-09T10:00:00Z", "area": {"name": "Москва"}}),
        ];
        let (records, _) = normalize_items(items);
        let outcome = filter_vacancies(&records, &period());
        assert_eq!(kept_ids(&outcome), vec!["A"]);
    }
}
