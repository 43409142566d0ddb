use super::*;
use crate::retry::RetryingClient;
use serde_json::json;
use tracing::{debug, error, warn};

const CONTRIBUTIONS_QUERY: &str = r#"
query($username: String!, $today: DateTime!) {
  user(login: $username) {
    login
    contributionsCollection(to: $today) {
      contributionCalendar {
        totalContributions
        weeks {
          contributionDays {
            date
            contributionCount
          }
        }
      }
      commitContributionsByRepository(maxRepositories: 1) {
        contributions(first: 1) {
          nodes {
            occurredAt
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    login: String,
    contributions_collection: Option<ContributionsCollection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    contribution_calendar: Option<ContributionCalendar>,
    commit_contributions_by_repository: Option<Vec<RepositoryContributions>>,
}

#[derive(Debug, Deserialize)]
struct ContributionCalendar {
    weeks: Vec<CalendarWeek>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarWeek {
    pub contribution_days: Vec<ContributionDay>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub contribution_count: u32,
}

#[derive(Debug, Deserialize)]
struct RepositoryContributions {
    contributions: CommitContributionConnection,
}

#[derive(Debug, Deserialize)]
struct CommitContributionConnection {
    nodes: Option<Vec<CommitContribution>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitContribution {
    occurred_at: DateTime<Utc>,
}

/// Reads one account's contribution calendar through the GraphQL API.
pub struct ContributionFetcher {
    client: RetryingClient,
    endpoint: String,
    token: String,
}

impl ContributionFetcher {
    pub fn new(client: RetryingClient, endpoint: &str, token: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            token: token.to_string(),
        }
    }

    /// Never fails: exhausted retries and unusable payloads both degrade to
    /// [`ContributionResult::empty`] for the requested account.
    pub async fn fetch(&self, account: &str, as_of: NaiveDate) -> ContributionResult {
        let body = json!({
            "query": CONTRIBUTIONS_QUERY,
            "variables": {
                "username": account,
                "today": format!("{}T23:59:59Z", as_of.format("%Y-%m-%d")),
            },
        });

        let response = match self
            .client
            .send(account, |http| {
                http.post(&self.endpoint)
                    .bearer_auth(&self.token)
                    .header("Accept", GITHUB_MEDIA_TYPE)
                    .json(&body)
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("All attempts failed for {}: {}", account, e);
                return ContributionResult::empty(account);
            }
        };

        let payload: GraphQlResponse = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Unexpected response format for user {}: {}", account, e);
                return ContributionResult::empty(account);
            }
        };

        match payload.data.and_then(|data| data.user) {
            Some(user) => {
                let result = user.into_result(as_of);
                debug!(
                    "{} has {} contribution(s) on {}",
                    result.account, result.contributions, as_of
                );
                result
            }
            None => {
                let messages: Vec<_> = payload.errors.iter().map(|e| e.message.as_str()).collect();
                warn!(
                    "Unexpected response format or no data for user {}: {}",
                    account,
                    messages.join("; ")
                );
                ContributionResult::empty(account)
            }
        }
    }
}

impl UserNode {
    fn into_result(self, as_of: NaiveDate) -> ContributionResult {
        let mut result = ContributionResult::empty(&self.login);
        let Some(collection) = self.contributions_collection else {
            return result;
        };

        if let Some(calendar) = &collection.contribution_calendar {
            let (today, last_active) = summarize_calendar(&calendar.weeks, as_of);
            result.contributions = today;
            result.last_active_date = last_active;
        }

        result.last_commit_at = collection
            .commit_contributions_by_repository
            .as_deref()
            .and_then(|repos| repos.first())
            .and_then(|repo| repo.contributions.nodes.as_deref())
            .and_then(|nodes| nodes.first())
            .map(|node| node.occurred_at);

        result
    }
}

/// Sums the counts of every day equal to `as_of` and finds the latest day with
/// a strictly positive count.
pub fn summarize_calendar(weeks: &[CalendarWeek], as_of: NaiveDate) -> (u32, Option<NaiveDate>) {
    let mut today = 0u32;
    let mut last_active: Option<NaiveDate> = None;

    for day in weeks.iter().flat_map(|week| &week.contribution_days) {
        if day.contribution_count > 0 {
            last_active = Some(last_active.map_or(day.date, |seen| seen.max(day.date)));
        }
        if day.date == as_of {
            today = today.saturating_add(day.contribution_count);
        }
    }

    (today, last_active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use chrono::TimeZone;
    use serde_json::Value;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day(date: NaiveDate, count: u32) -> ContributionDay {
        ContributionDay {
            date,
            contribution_count: count,
        }
    }

    fn fetcher(server: &MockServer, max_attempts: u32) -> ContributionFetcher {
        let client = RetryingClient::new(RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        ContributionFetcher::new(client, &format!("{}/graphql", server.uri()), "ghp_test")
    }

    fn user_payload(login: &str, days: &[(&str, u32)], occurred_at: Option<&str>) -> Value {
        let days: Vec<Value> = days
            .iter()
            .map(|(date, count)| json!({ "date": date, "contributionCount": count }))
            .collect();
        let nodes: Vec<Value> = occurred_at
            .into_iter()
            .map(|at| json!({ "occurredAt": at }))
            .collect();

        json!({
            "data": {
                "user": {
                    "login": login,
                    "contributionsCollection": {
                        "contributionCalendar": {
                            "totalContributions": 0,
                            "weeks": [{ "contributionDays": days }]
                        },
                        "commitContributionsByRepository": [
                            { "contributions": { "nodes": nodes } }
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn single_matching_day_is_counted() {
        let as_of = date(2024, 5, 2);
        let weeks = vec![CalendarWeek {
            contribution_days: vec![day(date(2024, 5, 1), 0), day(as_of, 6)],
        }];

        let (today, last_active) = summarize_calendar(&weeks, as_of);
        assert_eq!(today, 6);
        assert_eq!(last_active, Some(as_of));
    }

    #[test]
    fn last_active_is_latest_positive_day() {
        let as_of = date(2024, 5, 10);
        let weeks = vec![
            CalendarWeek {
                contribution_days: vec![day(date(2024, 5, 1), 3), day(date(2024, 5, 4), 1)],
            },
            CalendarWeek {
                contribution_days: vec![day(date(2024, 5, 8), 0), day(as_of, 0)],
            },
        ];

        let (today, last_active) = summarize_calendar(&weeks, as_of);
        assert_eq!(today, 0);
        assert_eq!(last_active, Some(date(2024, 5, 4)));
    }

    #[test]
    fn no_positive_days_means_no_last_active() {
        let as_of = date(2024, 5, 10);
        let weeks = vec![CalendarWeek {
            contribution_days: vec![day(date(2024, 5, 9), 0), day(as_of, 0)],
        }];

        assert_eq!(summarize_calendar(&weeks, as_of), (0, None));
        assert_eq!(summarize_calendar(&[], as_of), (0, None));
    }

    #[tokio::test]
    async fn octocat_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer ghp_test"))
            .and(header("accept", GITHUB_MEDIA_TYPE))
            .and(body_partial_json(json!({
                "variables": { "username": "octocat", "today": "2024-05-02T23:59:59Z" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_payload(
                "octocat",
                &[("2024-05-01", 0), ("2024-05-02", 4)],
                None,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let as_of = date(2024, 5, 2);
        let result = fetcher(&server, 3).fetch("octocat", as_of).await;

        assert_eq!(
            result,
            ContributionResult {
                account: "octocat".to_string(),
                contributions: 4,
                last_active_date: Some(as_of),
                last_commit_at: None,
            }
        );
    }

    #[tokio::test]
    async fn resolves_login_and_last_commit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_payload(
                "Octocat",
                &[("2024-05-02", 2)],
                Some("2024-05-02T21:15:00Z"),
            )))
            .mount(&server)
            .await;

        let result = fetcher(&server, 3).fetch("octocat", date(2024, 5, 2)).await;

        assert_eq!(result.account, "Octocat");
        assert_eq!(
            result.last_commit_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 21, 15, 0).unwrap())
        );
        assert_eq!(result.last_commit_display().as_deref(), Some("2024-05-02 21:15:00"));
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = fetcher(&server, 3).fetch("ghost", date(2024, 5, 2)).await;
        assert_eq!(result, ContributionResult::empty("ghost"));
    }

    #[tokio::test]
    async fn missing_user_degrades_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "user": null },
                "errors": [{ "message": "Could not resolve to a User with the login of 'nobody'." }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetcher(&server, 3).fetch("nobody", date(2024, 5, 2)).await;
        assert_eq!(result, ContributionResult::empty("nobody"));
    }

    #[tokio::test]
    async fn garbage_body_degrades_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetcher(&server, 3).fetch("octocat", date(2024, 5, 2)).await;
        assert_eq!(result, ContributionResult::empty("octocat"));
    }
}
