use super::*;
use crate::retry::RetryingClient;
use chrono::Duration;
use reqwest::StatusCode;
use tracing::{debug, error, warn};

const WINDOW_DAYS: i64 = 6;

#[derive(Debug, Deserialize)]
struct RepoSummary {
    name: String,
    owner: RepoOwner,
}

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

/// One entry of `/repos/{owner}/{repo}/stats/commit_activity`.
#[derive(Debug, Clone, Deserialize)]
pub struct WeekActivity {
    pub total: u32,
    /// Start of the week, Unix seconds
    pub week: i64,
}

/// Counts recent commits per account from the REST statistics endpoints.
pub struct WeeklyCommitFetcher {
    client: RetryingClient,
    base_url: String,
    token: String,
}

impl WeeklyCommitFetcher {
    pub fn new(client: RetryingClient, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub async fn fetch(&self, account: &str, now: DateTime<Utc>) -> ContributionResult {
        let mut result = ContributionResult::empty(account);

        let repos = match self.list_repos(account).await {
            Some(repos) => repos,
            None => return result,
        };
        debug!("{} owns {} repositories", account, repos.len());

        let cutoff = (now - Duration::days(WINDOW_DAYS)).timestamp();
        for repo in &repos {
            let weeks = self.commit_activity(repo).await;
            let (commits, latest) = summarize_weeks(&weeks, cutoff);
            result.contributions = result.contributions.saturating_add(commits);
            result.last_active_date = result.last_active_date.max(latest);
        }

        result
    }

    async fn list_repos(&self, account: &str) -> Option<Vec<RepoSummary>> {
        let url = format!("{}/users/{}/repos", self.base_url, account);
        let response = match self
            .client
            .send(account, |http| {
                http.get(&url)
                    .query(&[("per_page", "100")])
                    .bearer_auth(&self.token)
                    .header("Accept", GITHUB_MEDIA_TYPE)
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("All attempts failed for {}: {}", account, e);
                return None;
            }
        };

        match response.json().await {
            Ok(repos) => Some(repos),
            Err(e) => {
                warn!("Unexpected repository listing for user {}: {}", account, e);
                None
            }
        }
    }

    async fn commit_activity(&self, repo: &RepoSummary) -> Vec<WeekActivity> {
        let label = format!("{}/{}", repo.owner.login, repo.name);
        let url = format!("{}/repos/{}/stats/commit_activity", self.base_url, label);

        let response = match self
            .client
            .send(&label, |http| {
                http.get(&url)
                    .bearer_auth(&self.token)
                    .header("Accept", GITHUB_MEDIA_TYPE)
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Skipping commit activity of {}: {}", label, e);
                return Vec::new();
            }
        };

        // GitHub answers 202 while it is still computing the statistics
        if response.status() == StatusCode::ACCEPTED {
            debug!("Commit activity of {} not ready yet", label);
            return Vec::new();
        }

        response.json().await.unwrap_or_else(|e| {
            warn!("Unexpected commit activity payload for {}: {}", label, e);
            Vec::new()
        })
    }
}

/// Sums the weeks starting strictly after `cutoff` and returns the start date
/// of the latest week with any commits.
pub fn summarize_weeks(weeks: &[WeekActivity], cutoff: i64) -> (u32, Option<NaiveDate>) {
    let commits = weeks
        .iter()
        .filter(|w| w.week > cutoff)
        .fold(0u32, |sum, w| sum.saturating_add(w.total));

    let latest = weeks
        .iter()
        .filter(|w| w.total > 0)
        .filter_map(|w| DateTime::from_timestamp(w.week, 0))
        .map(|start| start.date_naive())
        .max();

    (commits, latest)
}
