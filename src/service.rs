use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::github::{
    BatchAggregator, ContributionFetcher, ContributionSource, Leaderboard, ReportMode,
    ReportWindow, WeeklyCommitFetcher,
};
use crate::output::{formatter, Embed, ReportEntry};
use crate::registry::{self, AccountMap, AccountRegistry, AccountStore, JsonFileStore};
use crate::retry::RetryingClient;

pub fn file_registry(config: &Config) -> AccountRegistry<JsonFileStore> {
    let store = JsonFileStore::new(&config.storage.data_file)
        .with_lock_timeout(config.lock_timeout())
        .with_poll_interval(config.lock_poll_interval());
    AccountRegistry::new(store)
}

pub fn contribution_source(
    config: &Config,
    client: &RetryingClient,
    mode: ReportMode,
) -> Result<ContributionSource> {
    let token = config.github_token()?;
    Ok(match mode {
        ReportMode::Daily => ContributionSource::Calendar(ContributionFetcher::new(
            client.clone(),
            &config.github.graphql_url,
            token,
        )),
        ReportMode::Weekly => ContributionSource::CommitActivity(WeeklyCommitFetcher::new(
            client.clone(),
            &config.github.rest_url,
            token,
        )),
    })
}

/// Everything a trigger needs: the registry, the aggregator, and how results
/// are worded. Holds no state of its own.
pub struct LeaderboardService<S> {
    registry: Arc<AccountRegistry<S>>,
    aggregator: BatchAggregator,
    embed_color: u32,
}

impl<S: AccountStore + 'static> LeaderboardService<S> {
    pub fn new(registry: AccountRegistry<S>, aggregator: BatchAggregator, embed_color: u32) -> Self {
        Self {
            registry: Arc::new(registry),
            aggregator,
            embed_color,
        }
    }

    /// Registry calls block on file I/O and lock polling.
    async fn with_registry<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&AccountRegistry<S>) -> registry::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let result = tokio::task::spawn_blocking(move || op(&registry))
            .await
            .context("Registry task failed")?;
        Ok(result?)
    }

    pub async fn add_account(&self, identity: &str, account: &str) -> Result<String> {
        let (id, name) = (identity.to_string(), account.to_string());
        self.with_registry(move |registry| registry.add(&id, &name))
            .await?;
        Ok(formatter::linked_message(identity, account))
    }

    pub async fn remove_account(&self, identity: &str) -> Result<String> {
        let id = identity.to_string();
        self.with_registry(move |registry| registry.remove(&id))
            .await?;
        Ok(formatter::unlinked_message(identity))
    }

    pub async fn accounts(&self) -> Result<AccountMap> {
        self.with_registry(|registry| registry.list()).await
    }

    /// Listing of every link, or only `identity`'s when given.
    pub async fn list_accounts(&self, identity: Option<&str>) -> Result<String> {
        let mut accounts = self.accounts().await?;
        if let Some(identity) = identity {
            accounts.retain(|id, _| id == identity);
        }
        Ok(formatter::format_accounts(&accounts))
    }

    pub async fn leaderboard(&self, window: Option<ReportWindow>) -> Result<(Leaderboard, Vec<ReportEntry>)> {
        let accounts = self.accounts().await?;
        let tracked = tracked_accounts(&accounts);

        let leaderboard = match window {
            Some(window) => self.aggregator.aggregate_at(&tracked, window).await,
            None => self.aggregator.aggregate(&tracked).await,
        };
        let entries = formatter::entries_for(&leaderboard, &accounts);
        info!(
            "Leaderboard as of {} ranks {} account(s)",
            leaderboard.as_of,
            entries.len()
        );
        Ok((leaderboard, entries))
    }

    pub async fn report(&self) -> Result<String> {
        let (_, entries) = self.leaderboard(None).await?;
        Ok(formatter::format_report(&entries))
    }

    pub async fn daily_summary(&self) -> Result<String> {
        let (_, entries) = self.leaderboard(None).await?;
        Ok(formatter::daily_summary(&entries))
    }

    pub fn summary_embed(&self, leaderboard: &Leaderboard, entries: &[ReportEntry]) -> Embed {
        let title = match leaderboard.mode {
            ReportMode::Daily => format!("GitHub contributions on {}", leaderboard.as_of),
            ReportMode::Weekly => format!("GitHub commits in the week up to {}", leaderboard.as_of),
        };
        formatter::embed(&title, &formatter::format_report(entries), self.embed_color)
    }
}

/// Accounts to fetch, in registry order, each once.
fn tracked_accounts(accounts: &AccountMap) -> Vec<String> {
    let mut tracked: Vec<String> = Vec::with_capacity(accounts.len());
    for account in accounts.values() {
        if !tracked.iter().any(|seen| seen.eq_ignore_ascii_case(account)) {
            tracked.push(account.clone());
        }
    }
    tracked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryStore;
    use crate::retry::RetryPolicy;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn window() -> ReportWindow {
        ReportWindow {
            as_of: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            now: Utc.with_ymd_and_hms(2024, 5, 3, 6, 0, 0).unwrap(),
        }
    }

    async fn mount_user(server: &MockServer, login: &str, count: u32) {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "variables": { "username": login } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "user": {
                    "login": login,
                    "contributionsCollection": {
                        "contributionCalendar": { "totalContributions": count, "weeks": [
                            { "contributionDays": [{ "date": "2024-05-02", "contributionCount": count }] }
                        ]},
                        "commitContributionsByRepository": []
                    }
                }}
            })))
            .mount(server)
            .await;
    }

    fn service(server: &MockServer, accounts: AccountMap) -> LeaderboardService<MemoryStore> {
        let mut config = Config::default();
        config.github.token = Some("ghp_test".to_string());
        config.github.graphql_url = format!("{}/graphql", server.uri());

        let client = RetryingClient::new(RetryPolicy {
            max_attempts: 1,
            backoff: Duration::ZERO,
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let source = contribution_source(&config, &client, ReportMode::Daily).unwrap();

        LeaderboardService::new(
            AccountRegistry::new(MemoryStore::with_accounts(accounts)),
            BatchAggregator::new(source),
            config.discord.embed_color,
        )
    }

    #[tokio::test]
    async fn ranks_linked_accounts_with_mentions() {
        let server = MockServer::start().await;
        mount_user(&server, "alice-gh", 3).await;
        mount_user(&server, "bob-gh", 7).await;
        mount_user(&server, "carol-gh", 5).await;

        let mut accounts = AccountMap::new();
        accounts.insert("1".to_string(), "alice-gh".to_string());
        accounts.insert("2".to_string(), "bob-gh".to_string());
        accounts.insert("@carol".to_string(), "carol-gh".to_string());
        let service = service(&server, accounts);

        let (board, entries) = service.leaderboard(Some(window())).await.unwrap();
        assert_eq!(board.len(), 3);
        assert_eq!(
            formatter::format_report(&entries),
            "<@2>: 7 contributions\n@carol: 5 contributions\n<@1>: 3 contributions"
        );

        let embed = service.summary_embed(&board, &entries);
        assert_eq!(embed.title, "GitHub contributions on 2024-05-02");
        assert_eq!(embed.color, 0x2ECC71);
    }

    #[tokio::test]
    async fn administrative_commands_confirm() {
        let server = MockServer::start().await;
        let service = service(&server, AccountMap::new());

        assert_eq!(
            service.add_account("42", "octocat").await.unwrap(),
            "Account \"octocat\" has been linked to <@42>"
        );
        service.add_account("7", "hubot").await.unwrap();
        assert_eq!(
            service.list_accounts(Some("42")).await.unwrap(),
            "Linked accounts:\n<@42>: octocat"
        );
        assert_eq!(
            service.remove_account("42").await.unwrap(),
            "Account has been unlinked from <@42>"
        );
        assert_eq!(
            service.remove_account("42").await.unwrap(),
            "Account has been unlinked from <@42>"
        );
        assert_eq!(service.accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_account_is_an_error() {
        let server = MockServer::start().await;
        let service = service(&server, AccountMap::new());
        assert!(service.add_account("42", "").await.is_err());
        assert!(service.add_account("42", "legacy--login").await.is_ok());
        assert_eq!(service.accounts().await.unwrap()["42"], "legacy--login");
    }

    #[tokio::test]
    async fn empty_registry_reports_no_data() {
        let server = MockServer::start().await;
        let service = service(&server, AccountMap::new());

        let (board, entries) = service.leaderboard(Some(window())).await.unwrap();
        assert_eq!(board.len(), 0);
        assert_eq!(formatter::format_report(&entries), formatter::NO_DATA);
    }

    #[test]
    fn shared_accounts_are_fetched_once() {
        let mut accounts = AccountMap::new();
        accounts.insert("1".to_string(), "Octocat".to_string());
        accounts.insert("2".to_string(), "octocat".to_string());
        accounts.insert("3".to_string(), "hubot".to_string());

        assert_eq!(tracked_accounts(&accounts), vec!["Octocat", "hubot"]);
    }
}
