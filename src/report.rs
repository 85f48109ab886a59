use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::classify::{Category, classify};
use crate::markup::{strip_markup, truncate_chars};
use crate::models::{AcceptedVacancy, Salary, SearchPeriod};
use crate::period::{format_local, format_period};

pub const SNIPPET_MAX_CHARS: usize = 120;
const SNIPPET_MIN_CHARS: usize = 5;
const HEAVY_RULE: &str = "══════════════════════════════";

/// Clock and zone a report is rendered against.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub now: DateTime<Utc>,
    pub tz: Tz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    New,
    Hot,
    Today,
    Older,
}

impl Freshness {
    pub fn of(published_at: DateTime<Utc>, ctx: &RenderContext) -> Self {
        let age = ctx.now - published_at;
        if age <= Duration::hours(1) {
            Freshness::New
        } else if age <= Duration::hours(6) {
            Freshness::Hot
        } else if is_same_local_day(published_at, ctx) {
            Freshness::Today
        } else {
            Freshness::Older
        }
    }

    fn marker(&self) -> &'static str {
        match self {
            Freshness::New => " 🆕",
            Freshness::Hot => " 🔥",
            Freshness::Today => " ⭐",
            Freshness::Older => "",
        }
    }
}

fn is_same_local_day(at: DateTime<Utc>, ctx: &RenderContext) -> bool {
    at.with_timezone(&ctx.tz).date_naive() == ctx.now.with_timezone(&ctx.tz).date_naive()
}

/// Counts in order of first appearance, then sorted by count descending.
///
/// The sort is stable, so equal counts keep first-appearance order.
pub fn tally<I, K>(keys: I) -> Vec<(K, usize)>
where
    I: IntoIterator<Item = K>,
    K: PartialEq,
{
    let mut counts: Vec<(K, usize)> = Vec::new();
    for key in keys {
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1,
            None => counts.push((key, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

pub fn currency_symbol(code: &str) -> &str {
    match code {
        "RUR" | "RUB" => "₽",
        "USD" => "$",
        "EUR" => "€",
        other => other,
    }
}

pub fn format_salary(salary: Option<&Salary>) -> String {
    let Some(salary) = salary else {
        return "💰 не указана".to_string();
    };
    let parts: Vec<String> = [salary.from, salary.to]
        .into_iter()
        .flatten()
        .filter(|v| *v != 0)
        .map(group_thousands)
        .collect();
    let currency = salary.currency.as_deref().unwrap_or("RUR");
    format!("💰 {} {}", parts.join(" - "), currency_symbol(currency))
}

fn snippet_line(label: &str, raw: &str) -> Option<String> {
    let text = strip_markup(raw);
    if text.chars().count() <= SNIPPET_MIN_CHARS {
        return None;
    }
    Some(format!("{} {}", label, truncate_chars(&text, SNIPPET_MAX_CHARS)))
}

fn category_of(vacancy: &AcceptedVacancy) -> Category {
    let record = &vacancy.record;
    classify(
        &record.title,
        &record.snippet_requirement,
        &record.snippet_responsibility,
    )
}

fn join_counts<K: AsRef<str>>(counts: &[(K, usize)]) -> String {
    counts
        .iter()
        .map(|(k, n)| format!("{} ({})", k.as_ref(), n))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn empty_report(period: &SearchPeriod, tz: Tz) -> String {
    format!(
        "❌ За указанный период ({}) IT-вакансии не найдены.",
        format_period(period, tz)
    )
}

/// Renders the digest for already filtered, sorted and capped vacancies.
pub fn render_report(
    vacancies: &[AcceptedVacancy],
    total_found: u64,
    period: &SearchPeriod,
    ctx: &RenderContext,
) -> String {
    if vacancies.is_empty() {
        return empty_report(period, ctx.tz);
    }

    let categories: Vec<Category> = vacancies.iter().map(category_of).collect();
    let category_counts = tally(categories.iter().map(|c| c.short_name()));
    let city_counts = tally(vacancies.iter().map(|v| v.record.city_name.as_str()));
    let with_salary = vacancies.iter().filter(|v| v.record.salary.is_some()).count();

    let mut out: Vec<String> = Vec::new();

    out.push("💻 **ОБЗОР IT-ВАКАНСИЙ**".to_string());
    out.push(HEAVY_RULE.to_string());
    out.push(String::new());

    out.push("📈 **СТАТИСТИКА:**".to_string());
    out.push(format!("• Всего IT-вакансий найдено: **{}**", total_found));
    out.push(format!("• Подходит под фильтры: **{}**", vacancies.len()));
    out.push(format!("• Указана зарплата: **{}**", with_salary));
    out.push(format!("• Период: **{}**", format_period(period, ctx.tz)));
    out.push(format!("• Распределение: {}", join_counts(&category_counts)));
    out.push(String::new());

    out.push("📋 **ВАКАНСИИ:**".to_string());
    out.push(HEAVY_RULE.to_string());
    out.push(String::new());

    for (rank, (vacancy, category)) in vacancies.iter().zip(&categories).enumerate() {
        let record = &vacancy.record;
        out.push(format!("**{}. {}**", rank + 1, category));
        out.push(format!("**{}**", record.title));
        out.push("─".repeat(30));
        out.push(format!("🔗 {}", record.url));
        out.push(format!(
            "📅 {}{}",
            format_local(vacancy.published_at, ctx.tz),
            Freshness::of(vacancy.published_at, ctx).marker()
        ));
        out.push(format_salary(record.salary.as_ref()));
        out.push(format!("🏢 **Компания:** {}", record.employer_name));
        out.push(format!("📍 **Город:** {}", record.city_name));
        if let Some(line) = snippet_line("📝 **Требования:**", &record.snippet_requirement) {
            out.push(line);
        }
        if let Some(line) = snippet_line("💼 **Обязанности:**", &record.snippet_responsibility) {
            out.push(line);
        }
        out.push(String::new());
        out.push(HEAVY_RULE.to_string());
        out.push(String::new());
    }

    out.push("📊 **ИТОГИ ПОИСКА:**".to_string());
    out.push("─".repeat(25));

    // Input is newest first.
    let newest = vacancies[0].published_at;
    let oldest = vacancies[vacancies.len() - 1].published_at;
    out.push(format!(
        "• Диапазон дат: {} - {}",
        format_local(newest, ctx.tz),
        format_local(oldest, ctx.tz)
    ));

    let today = vacancies
        .iter()
        .filter(|v| is_same_local_day(v.published_at, ctx))
        .count();
    let recent = vacancies
        .iter()
        .filter(|v| ctx.now - v.published_at <= Duration::hours(6))
        .count();
    if today > 0 {
        out.push(format!("• Опубликовано сегодня: **{}**", today));
    }
    if recent > 0 {
        out.push(format!("• За последние 6 часов: **{}**", recent));
    }

    out.push(format!("• Города: {}", join_counts(&city_counts)));
    out.push(format!("• Специализации: {}", join_counts(&category_counts)));
    out.push(String::new());
    out.push(format!(
        "🕒 **Отчет обновлен:** {}",
        ctx.now.with_timezone(&ctx.tz).format("%d.%m.%Y в %H:%M")
    ));
    out.push("🔍 **Источник:** hh.ru".to_string());

    out.join("\n")
}
