use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use std::fmt::Display;
use std::future::Future;
use tracing::info;

/// First instant strictly after `now` whose local wall-clock time is `at`.
/// Days on which `at` does not exist (DST gaps) are skipped.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    for offset in 0..=3 {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
    }

    now.clone() + chrono::Duration::days(1)
}

/// Runs `job` every day at local time `at`, forever.
pub async fn run_daily<F, Fut>(at: NaiveTime, job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    run_daily_on(Local::now, at, job).await
}

/// Same as [`run_daily`], reading wall-clock time from `clock`.
pub async fn run_daily_on<Tz, C, F, Fut>(clock: C, at: NaiveTime, mut job: F)
where
    Tz: TimeZone,
    Tz::Offset: Display,
    C: Fn() -> DateTime<Tz>,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let now = clock();
        let next = next_occurrence(&now, at);
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!("Next daily summary at {}", next.format("%Y-%m-%d %H:%M %Z"));

        tokio::time::sleep(wait).await;
        job().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn later_today() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        assert_eq!(
            next_occurrence(&now, at(23, 42)),
            Utc.with_ymd_and_hms(2024, 5, 2, 23, 42, 0).unwrap()
        );
    }

    #[test]
    fn already_passed_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 50, 0).unwrap();
        assert_eq!(
            next_occurrence(&now, at(23, 42)),
            Utc.with_ymd_and_hms(2025, 1, 1, 23, 42, 0).unwrap()
        );
    }

    #[test]
    fn exact_time_waits_a_full_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 23, 42, 0).unwrap();
        assert_eq!(
            next_occurrence(&now, at(23, 42)),
            Utc.with_ymd_and_hms(2024, 5, 3, 23, 42, 0).unwrap()
        );
    }

    #[test]
    fn respects_the_local_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        let next = next_occurrence(&now, at(9, 30));

        assert_eq!(next, tz.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap());
        assert_eq!(next.with_timezone(&Utc).format("%H:%M").to_string(), "07:30");
    }

    #[tokio::test(start_paused = true)]
    async fn runs_job_once_per_day_at_the_configured_time() {
        use std::sync::{Arc, Mutex};
        use tokio::time::{Duration, Instant};

        let origin = Instant::now();
        let start = Utc.with_ymd_and_hms(2024, 5, 2, 23, 40, 0).unwrap();
        let clock = move || {
            start + chrono::Duration::from_std(origin.elapsed()).unwrap_or_default()
        };

        let runs = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&runs);
        let task = tokio::spawn(run_daily_on(clock, at(23, 42), move || {
            seen.lock().unwrap().push(clock().format("%Y-%m-%d %H:%M").to_string());
            async {}
        }));

        tokio::time::sleep(Duration::from_secs(3 * 24 * 3600)).await;
        task.abort();

        assert_eq!(
            *runs.lock().unwrap(),
            vec!["2024-05-02 23:42", "2024-05-03 23:42", "2024-05-04 23:42"]
        );
    }
}
