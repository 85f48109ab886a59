use anyhow::{Context, Result};
use chrono::{DateTime, Duration, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::SearchPeriod;

/// Window ending at `cutoff_hour` on the current civil date in `tz` and
/// starting 24 hours earlier.
pub fn period_ending_today(now: DateTime<Utc>, tz: Tz, cutoff_hour: u32) -> Result<SearchPeriod> {
    let local_date = now.with_timezone(&tz).date_naive();
    let cutoff = NaiveTime::from_hms_opt(cutoff_hour, 0, 0)
        .with_context(|| format!("Invalid cutoff hour: {}", cutoff_hour))?;
    let naive_end = local_date.and_time(cutoff);

    // A cutoff falling into a DST gap resolves to the first valid instant after it.
    let end = match tz.from_local_datetime(&naive_end) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(naive_end + Duration::hours(1)))
            .earliest()
            .with_context(|| format!("Cannot resolve {} in {}", naive_end, tz))?,
    }
    .with_timezone(&Utc);

    Ok(SearchPeriod {
        start: end - Duration::hours(24),
        end,
    })
}

pub fn format_local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%d.%m.%Y %H:%M").to_string()
}

pub fn format_period(period: &SearchPeriod, tz: Tz) -> String {
    format!(
        "{} - {}",
        format_local(period.start, tz),
        format_local(period.end, tz)
    )
}
