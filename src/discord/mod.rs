use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use twilight_gateway::{Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt as _};
use twilight_http::client::ClientBuilder;
use twilight_http::Client as HttpClient;
use twilight_model::application::interaction::{Interaction, InteractionData};
use twilight_model::http::interaction::{
    InteractionResponse, InteractionResponseData, InteractionResponseType,
};
use twilight_model::id::marker::{ApplicationMarker, ChannelMarker, GuildMarker};
use twilight_model::id::Id;

pub mod commands;
pub mod scheduler;

pub use commands::BotCommand;

use crate::config::BotSettings;
use crate::output::formatter::{truncate_message, MESSAGE_LIMIT};
use crate::registry::AccountStore;
use crate::service::LeaderboardService;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway bot: answers slash commands in one guild and posts the daily
/// summary to one channel.
pub struct DiscordBot<S> {
    http: Arc<HttpClient>,
    service: Arc<LeaderboardService<S>>,
    settings: BotSettings,
}

struct InteractionContext<S> {
    http: Arc<HttpClient>,
    application_id: Id<ApplicationMarker>,
    guild_id: Id<GuildMarker>,
    service: Arc<LeaderboardService<S>>,
}

impl<S: AccountStore + 'static> DiscordBot<S> {
    pub fn new(settings: BotSettings, service: LeaderboardService<S>) -> Self {
        let http = ClientBuilder::new()
            .token(settings.token.clone())
            .timeout(HTTP_TIMEOUT)
            .build();

        Self {
            http: Arc::new(http),
            service: Arc::new(service),
            settings,
        }
    }

    pub async fn run(self) -> Result<()> {
        let guild_id = Id::<GuildMarker>::new_checked(self.settings.guild_id)
            .context("Guild id must not be zero")?;
        let channel_id = Id::<ChannelMarker>::new_checked(self.settings.channel_id)
            .context("Channel id must not be zero")?;

        let application_id = self
            .http
            .current_user_application()
            .await
            .context("Failed to look up the bot application")?
            .model()
            .await
            .context("Failed to decode the bot application")?
            .id;

        self.http
            .interaction(application_id)
            .set_guild_commands(guild_id, &commands::definitions())
            .await
            .context("Failed to register guild slash commands")?;
        info!("Registered slash commands in guild {}", guild_id);

        let daily = tokio::spawn(daily_summary_task(
            Arc::clone(&self.http),
            Arc::clone(&self.service),
            channel_id,
            self.settings.daily_at,
        ));

        let ctx = Arc::new(InteractionContext {
            http: Arc::clone(&self.http),
            application_id,
            guild_id,
            service: Arc::clone(&self.service),
        });

        let mut shard = Shard::new(ShardId::ONE, self.settings.token.clone(), Intents::GUILDS);
        let wanted = EventTypeFlags::READY | EventTypeFlags::INTERACTION_CREATE;

        loop {
            let item = tokio::select! {
                item = shard.next_event(wanted) => item,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
            };

            let event = match item {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    warn!("Error receiving gateway event: {}", e);
                    continue;
                }
                None => {
                    warn!("Gateway connection closed");
                    break;
                }
            };

            match event {
                Event::Ready(ready) => {
                    info!("Logged in as {}#{}", ready.user.name, ready.user.discriminator);
                }
                Event::InteractionCreate(create) => {
                    let interaction = (*create).0;
                    let ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        if let Err(e) = ctx.handle(interaction).await {
                            error!("Failed to answer interaction: {:#}", e);
                        }
                    });
                }
                other => debug!("Ignoring {:?}", other.kind()),
            }
        }

        daily.abort();
        Ok(())
    }
}

async fn daily_summary_task<S: AccountStore + 'static>(
    http: Arc<HttpClient>,
    service: Arc<LeaderboardService<S>>,
    channel_id: Id<ChannelMarker>,
    at: chrono::NaiveTime,
) {
    scheduler::run_daily(at, || {
        let http = Arc::clone(&http);
        let service = Arc::clone(&service);
        async move {
            info!("Gathering the daily summary");
            let summary = match service.daily_summary().await {
                Ok(summary) => summary,
                Err(e) => {
                    error!("Daily summary failed: {:#}", e);
                    return;
                }
            };

            let content = truncate_message(&summary, MESSAGE_LIMIT);
            match http.create_message(channel_id).content(&content).await {
                Ok(_) => info!("Daily summary posted to channel {}", channel_id),
                Err(e) => error!("Failed to post the daily summary: {}", e),
            }
        }
    })
    .await;
}

impl<S: AccountStore + 'static> InteractionContext<S> {
    async fn handle(&self, interaction: Interaction) -> Result<()> {
        let Some(InteractionData::ApplicationCommand(data)) = &interaction.data else {
            return Ok(());
        };

        if interaction.guild_id != Some(self.guild_id) {
            return self
                .respond(&interaction, "This bot only answers in its configured server.")
                .await;
        }

        let command = match BotCommand::parse(&data.name, &data.options) {
            Ok(command) => command,
            Err(e) => return self.respond(&interaction, &e.to_string()).await,
        };
        debug!("Handling {:?}", command);

        match command {
            BotCommand::Ping => self.respond(&interaction, "Pong!").await,
            BotCommand::AddAccount { account, user } => {
                let reply = self
                    .service
                    .add_account(&user.to_string(), &account)
                    .await
                    .unwrap_or_else(|e| format!("Failed to update accounts: {:#}", e));
                self.respond(&interaction, &reply).await
            }
            BotCommand::RemoveAccount { user } => {
                let reply = self
                    .service
                    .remove_account(&user.to_string())
                    .await
                    .unwrap_or_else(|e| format!("Failed to update accounts: {:#}", e));
                self.respond(&interaction, &reply).await
            }
            BotCommand::ListAccounts { user } => {
                let identity = user.map(|id| id.to_string());
                let reply = self
                    .service
                    .list_accounts(identity.as_deref())
                    .await
                    .unwrap_or_else(|e| format!("Failed to read accounts: {:#}", e));
                self.respond(&interaction, &reply).await
            }
            BotCommand::FetchStats => {
                // Fetching takes longer than the interaction deadline allows
                self.defer(&interaction).await?;
                let reply = self
                    .service
                    .report()
                    .await
                    .unwrap_or_else(|e| format!("Failed to fetch stats: {:#}", e));
                self.follow_up(&interaction, &reply).await
            }
        }
    }

    async fn respond(&self, interaction: &Interaction, content: &str) -> Result<()> {
        let response = InteractionResponse {
            kind: InteractionResponseType::ChannelMessageWithSource,
            data: Some(InteractionResponseData {
                content: Some(truncate_message(content, MESSAGE_LIMIT)),
                ..Default::default()
            }),
        };

        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &response)
            .await
            .context("Failed to send interaction response")?;
        Ok(())
    }

    async fn defer(&self, interaction: &Interaction) -> Result<()> {
        let response = InteractionResponse {
            kind: InteractionResponseType::DeferredChannelMessageWithSource,
            data: None,
        };

        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &response)
            .await
            .context("Failed to defer interaction response")?;
        Ok(())
    }

    async fn follow_up(&self, interaction: &Interaction, content: &str) -> Result<()> {
        let content = truncate_message(content, MESSAGE_LIMIT);

        self.http
            .interaction(self.application_id)
            .update_response(&interaction.token)
            .content(Some(content.as_str()))
            .await
            .context("Failed to update deferred response")?;
        Ok(())
    }
}
