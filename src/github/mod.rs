use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod fetcher;
pub mod rest;

pub use aggregator::{BatchAggregator, Leaderboard};
pub use fetcher::ContributionFetcher;
pub use rest::WeeklyCommitFetcher;

/// Media type every GitHub API request asks for.
pub const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Contribution activity of one account for one report cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionResult {
    pub account: String,
    pub contributions: u32,
    pub last_active_date: Option<NaiveDate>,
    pub last_commit_at: Option<DateTime<Utc>>,
}

impl ContributionResult {
    /// What a failed or unusable fetch degrades to.
    pub fn empty(account: &str) -> Self {
        Self {
            account: account.to_string(),
            contributions: 0,
            last_active_date: None,
            last_commit_at: None,
        }
    }

    pub fn last_commit_display(&self) -> Option<String> {
        self.last_commit_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Contributions on the as-of day, from the GraphQL contribution calendar
    #[default]
    Daily,
    /// Commits in the last six days, from the REST commit activity stats
    Weekly,
}

impl From<&str> for ReportMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "weekly" | "rest" => ReportMode::Weekly,
            _ => ReportMode::Daily,
        }
    }
}

/// The moment a batch is evaluated against. Computed once per run so every
/// account in the batch is compared over the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub as_of: NaiveDate,
    pub now: DateTime<Utc>,
}

/// Where contribution numbers come from, selected by [`ReportMode`].
pub enum ContributionSource {
    Calendar(ContributionFetcher),
    CommitActivity(WeeklyCommitFetcher),
}

impl ContributionSource {
    pub fn mode(&self) -> ReportMode {
        match self {
            ContributionSource::Calendar(_) => ReportMode::Daily,
            ContributionSource::CommitActivity(_) => ReportMode::Weekly,
        }
    }

    pub async fn fetch(&self, account: &str, window: &ReportWindow) -> ContributionResult {
        match self {
            ContributionSource::Calendar(fetcher) => fetcher.fetch(account, window.as_of).await,
            ContributionSource::CommitActivity(fetcher) => fetcher.fetch(account, window.now).await,
        }
    }
}
