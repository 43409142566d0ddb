use super::*;
use chrono::{Days, Local};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use tracing::info;

/// Results of one aggregation run, in fetch order, keyed by resolved account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    pub as_of: NaiveDate,
    pub mode: ReportMode,
    entries: Vec<ContributionResult>,
}

impl Leaderboard {
    pub fn new(as_of: NaiveDate, mode: ReportMode) -> Self {
        Self {
            as_of,
            mode,
            entries: Vec::new(),
        }
    }

    /// A repeated account replaces the earlier result in place.
    pub fn record(&mut self, result: ContributionResult) {
        match self.entries.iter_mut().find(|e| e.account == result.account) {
            Some(existing) => *existing = result,
            None => self.entries.push(result),
        }
    }

    /// Resolved accounts in fetch order; both mappings below are keyed by them.
    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.account.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contributions(&self) -> HashMap<String, u32> {
        self.entries
            .iter()
            .map(|e| (e.account.clone(), e.contributions))
            .collect()
    }

    pub fn last_commits(&self) -> HashMap<String, (Option<NaiveDate>, Option<String>)> {
        self.entries
            .iter()
            .map(|e| (e.account.clone(), (e.last_active_date, e.last_commit_display())))
            .collect()
    }
}

pub struct BatchAggregator {
    source: ContributionSource,
    show_progress: bool,
}

impl BatchAggregator {
    pub fn new(source: ContributionSource) -> Self {
        Self {
            source,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn mode(&self) -> ReportMode {
        self.source.mode()
    }

    /// Aggregates over yesterday, local time.
    pub async fn aggregate(&self, accounts: &[String]) -> Leaderboard {
        self.aggregate_at(accounts, current_window()).await
    }

    pub async fn aggregate_at(&self, accounts: &[String], window: ReportWindow) -> Leaderboard {
        info!(
            "Fetching {:?} contributions of {} account(s) as of {}",
            self.mode(),
            accounts.len(),
            window.as_of
        );

        let pb = if self.show_progress {
            ProgressBar::new(accounts.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} accounts {msg}",
        ) {
            pb.set_style(style.progress_chars("=>-"));
        }

        let mut leaderboard = Leaderboard::new(window.as_of, self.mode());
        for account in accounts {
            pb.set_message(account.clone());
            let result = self.source.fetch(account, &window).await;
            leaderboard.record(result);
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!("Collected contributions of {} account(s)", leaderboard.len());
        leaderboard
    }
}

/// The day before the run started, in the process's local timezone.
pub fn current_window() -> ReportWindow {
    let today = Local::now().date_naive();
    ReportWindow {
        as_of: previous_day(today),
        now: Utc::now(),
    }
}

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}
