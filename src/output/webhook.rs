use super::*;
use crate::retry::RetryingClient;
use anyhow::Context;
use tracing::{error, info};

/// One-shot delivery of an embed to a Discord incoming webhook.
pub struct WebhookNotifier {
    client: RetryingClient,
    url: String,
}

impl WebhookNotifier {
    /// Delivery is attempted once; failures are reported, never retried.
    pub fn new(client: &RetryingClient, url: &str) -> Self {
        Self {
            client: client.with_policy(client.policy().once()),
            url: url.to_string(),
        }
    }

    pub async fn send(&self, embed: Embed) -> Result<()> {
        let payload = WebhookPayload {
            embeds: vec![embed],
        };

        let result = self
            .client
            .send("webhook", |http| http.post(&self.url).json(&payload))
            .await
            .context("Failed to deliver webhook message");

        match &result {
            Ok(_) => info!("Webhook message delivered"),
            Err(e) => error!("{:#}", e),
        }
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter;
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> RetryingClient {
        RetryingClient::new(RetryPolicy::default()).unwrap()
    }

    #[tokio::test]
    async fn posts_embed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/1/token"))
            .and(body_json(json!({
                "embeds": [{ "title": "Leaderboard", "description": "B: 7 contributions", "color": 3066993 }]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/api/webhooks/1/token", server.uri());
        let notifier = WebhookNotifier::new(&client(), &url);
        notifier
            .send(formatter::embed("Leaderboard", "B: 7 contributions", 0x2ECC71))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_delivery_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&client(), &server.uri());
        let result = notifier.send(formatter::embed("t", "d", 0)).await;
        assert!(result.is_err());
    }
}
