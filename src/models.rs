use chrono::{DateTime, Utc};

/// Inclusive publication window `[start, end]` used to accept vacancies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SearchPeriod {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Salary {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub currency: Option<String>,
    pub is_gross: Option<bool>,
}

/// Canonical vacancy built from one search API item.
#[derive(Debug, Clone, PartialEq)]
pub struct VacancyRecord {
    pub id: Option<String>,
    pub title: String,
    pub url: String,
    pub published_raw: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub salary: Option<Salary>,
    pub employer_name: String,
    pub city_name: String,
    pub snippet_requirement: String,
    pub snippet_responsibility: String,
}

impl VacancyRecord {
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("unknown")
    }
}

/// A record that passed the window/city filter, so its timestamp is known.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedVacancy {
    pub published_at: DateTime<Utc>,
    pub record: VacancyRecord,
}
