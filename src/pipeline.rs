use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::collector::{Collection, collect};
use crate::dispatch::{ChannelSession, DispatchOutcome, MessageChannel, dispatch};
use crate::filter::filter_vacancies;
use crate::hh::{SearchClient, SearchTransport};
use crate::models::{AcceptedVacancy, SearchPeriod};
use crate::output::save_or_print;
use crate::period::{format_period, period_ending_today};
use crate::report::{RenderContext, render_report};

/// Inputs of one collection run.
pub struct RunParams<'a> {
    pub limit: usize,
    pub now: DateTime<Utc>,
    pub tz: Tz,
    pub cutoff_hour: u32,
    pub out_path: &'a Path,
}

pub struct RunOutcome {
    pub collection: Collection,
    pub period: SearchPeriod,
    pub filtered_count: usize,
    pub final_set: Vec<AcceptedVacancy>,
    pub report: String,
    pub saved: bool,
    pub dispatch: DispatchOutcome,
}

/// Collects, filters, caps, renders, saves and dispatches one report.
///
/// The cap applies to the filtered, sorted set. A collection cut short by a
/// fetch failure still produces and dispatches a report from what was gathered.
pub async fn run_once<T, C>(
    client: &SearchClient<T>,
    session: Option<&ChannelSession<C>>,
    params: &RunParams<'_>,
) -> Result<RunOutcome>
where
    T: SearchTransport,
    C: MessageChannel,
{
    let period = period_ending_today(params.now, params.tz, params.cutoff_hour)
        .context("Failed to compute search period")?;
    info!(period = %format_period(&period, params.tz), timezone = %params.tz, "Filter period");

    let collection = collect(client, params.limit).await;

    let outcome = filter_vacancies(&collection.records, &period);
    let filtered_count = outcome.kept.len();
    info!(
        kept = filtered_count,
        skipped = outcome.skipped.len(),
        defects = outcome.defects(),
        "Filtered vacancies"
    );
    let mut final_set = outcome.kept;
    final_set.truncate(params.limit);

    let ctx = RenderContext {
        now: params.now,
        tz: params.tz,
    };
    let report = render_report(&final_set, collection.total_found, &period, &ctx);

    let saved = save_or_print(params.out_path, &report);
    let dispatch = dispatch(session, &report, final_set.len()).await;

    Ok(RunOutcome {
        collection,
        period,
        filtered_count,
        final_set,
        report,
        saved,
        dispatch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::StopReason;
    use crate::dispatch::testing::RecordingChannel;
    use crate::hh::TransportError;
    use crate::hh::testing::*;
    use serde_json::{Value, json};

    fn item(id: &str, published_at: &str, city: &str) -> Value {
        json!({
            "id": id,
            "name": format!("Python developer {}", id),
            "alternate_url": format!("https://hh.ru/vacancy/{}", id),
            "published_at": published_at,
            "employer": {"name": "Acme"},
            "area": {"name": city},
        })
    }

    fn page(items: Vec<Value>, found: u64, pages: u32) -> String {
        json!({"items": items, "found": found, "pages": pages}).to_string()
    }

    fn ids(final_set: &[AcceptedVacancy]) -> Vec<&str> {
        final_set.iter().map(|v| v.record.display_id()).collect()
    }

    fn scratch_report(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("it-vacancies-pipeline-{}-{}", name, std::process::id()))
            .join("report.txt")
    }

    // 21:00 Moscow, so the window is 10.01 20:00 - 11.01 20:00 Moscow time.
    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-11T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_applies_after_filtering() {
        // Newest first on arrival, the first three would win a cap applied
        // before filtering; none of them belongs in the report.
        let items = vec![
            item("late-1", "2024-01-11T17:45:00Z", "Москва"),
            item("late-2", "2024-01-11T17:30:00Z", "Москва"),
            item("kazan", "2024-01-11T16:50:00Z", "Казань"),
            item("a", "2024-01-11T16:00:00Z", "Москва"),
            item("b", "2024-01-11T09:00:00Z", "Санкт-Петербург"),
            item("c", "2024-01-11T12:00:00Z", "Москва"),
            item("d", "2024-01-10T18:00:00Z", "Москва"),
        ];
        let client = SearchClient::new(ScriptedTransport::new(vec![reply(200, &page(items, 7, 1))]));
        let session = ChannelSession::new(RecordingChannel::default(), "@it_jobs".to_string());
        let out_path = scratch_report("limit");
        let params = RunParams {
            limit: 3,
            now: now(),
            tz: chrono_tz::Europe::Moscow,
            cutoff_hour: 20,
            out_path: &out_path,
        };

        let run = run_once(&client, Some(&session), &params).await.unwrap();

        assert_eq!(run.collection.records.len(), 7);
        assert_eq!(run.filtered_count, 4);
        assert_eq!(ids(&run.final_set), vec!["a", "c", "b"]);
        assert!(run.saved);
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(), run.report);
        assert!(run.report.contains("• Подходит под фильтры: **3**"));
        assert!(!run.report.contains("late-1"));
        assert_eq!(run.dispatch, DispatchOutcome::Sent { chunks: 1 });
        assert_eq!(session.channel().texts(), vec![run.report.clone()]);

        std::fs::remove_dir_all(out_path.parent().unwrap()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_collection_is_still_reported_and_sent() {
        let mut replies = vec![reply(
            200,
            &page(
                vec![
                    item("1", "2024-01-11T10:00:00Z", "Москва"),
                    item("2", "2024-01-11T11:00:00Z", "Москва"),
                ],
                500,
                10,
            ),
        )];
        replies.extend((0..6).map(|_| Err(TransportError::Timeout)));
        let client = SearchClient::new(ScriptedTransport::new(replies));
        let session = ChannelSession::new(RecordingChannel::default(), "@it_jobs".to_string());
        let out_path = scratch_report("partial");
        let params = RunParams {
            limit: 15,
            now: now(),
            tz: chrono_tz::Europe::Moscow,
            cutoff_hour: 20,
            out_path: &out_path,
        };

        let run = run_once(&client, Some(&session), &params).await.unwrap();

        assert_eq!(run.collection.stop_reason, StopReason::FetchFailed);
        assert_eq!(ids(&run.final_set), vec!["2", "1"]);
        assert!(run.report.contains("• Всего IT-вакансий найдено: **500**"));
        assert_eq!(run.dispatch, DispatchOutcome::Sent { chunks: 1 });
        assert_eq!(session.channel().texts(), vec![run.report.clone()]);

        std::fs::remove_dir_all(out_path.parent().unwrap()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_in_window_renders_empty_report() {
        let items = vec![item("old", "2024-01-09T10:00:00Z", "Москва")];
        let client = SearchClient::new(ScriptedTransport::new(vec![reply(200, &page(items, 1, 1))]));
        let out_path = scratch_report("empty");
        let params = RunParams {
            limit: 15,
            now: now(),
            tz: chrono_tz::Europe::Moscow,
            cutoff_hour: 20,
            out_path: &out_path,
        };

        let run = run_once::<_, RecordingChannel>(&client, None, &params).await.unwrap();

        assert!(run.final_set.is_empty());
        assert!(run.report.starts_with("❌ За указанный период (10.01.2024 20:00 - 11.01.2024 20:00)"));
        assert!(matches!(run.dispatch, DispatchOutcome::Skipped(_)));

        std::fs::remove_dir_all(out_path.parent().unwrap()).unwrap();
    }
}
