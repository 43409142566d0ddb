use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

mod config;
mod discord;
mod github;
mod output;
mod registry;
mod retry;
mod service;

use config::Config;
use discord::DiscordBot;
use github::{aggregator, BatchAggregator, ReportMode, ReportWindow};
use output::{formatter, Reporter, WebhookNotifier};
use retry::RetryingClient;
use service::LeaderboardService;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./contribot.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Account registry file
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    github_token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Discord bot and its daily summary
    Bot {
        /// Discord bot token
        #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
        discord_token: Option<String>,

        /// Guild the slash commands are registered in
        #[arg(long, env = "GUILD_ID")]
        guild_id: Option<u64>,

        /// Channel the daily summary is posted to
        #[arg(long, env = "CHANNEL_ID")]
        channel_id: Option<u64>,

        /// Local time of the daily summary (HH:MM)
        #[arg(long)]
        daily_at: Option<String>,

        /// Report mode (daily, weekly)
        #[arg(short, long)]
        mode: Option<String>,
    },

    /// Fetch the leaderboard once and print it
    Report {
        /// Report mode (daily, weekly)
        #[arg(short, long)]
        mode: Option<String>,

        /// Day to count contributions for (defaults to yesterday)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: String,

        /// Write the report to this file instead of stdout
        #[arg(long)]
        output_file: Option<String>,

        /// Also post the report to the Discord webhook
        #[arg(long)]
        webhook: bool,

        /// Discord webhook URL
        #[arg(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
        webhook_url: Option<String>,
    },

    /// Fetch a single account's contributions
    Fetch {
        account: String,

        /// Report mode (daily, weekly)
        #[arg(short, long)]
        mode: Option<String>,

        /// Day to count contributions for (defaults to yesterday)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Link a GitHub account to a Discord user
    Add {
        /// Discord user id or handle
        user: String,
        /// GitHub login
        account: String,
    },

    /// Unlink a Discord user's account
    Remove {
        /// Discord user id or handle
        user: String,
    },

    /// List linked accounts
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_file) = &cli.data_file {
        config.storage.data_file = data_file.clone();
    }
    if let Some(token) = &cli.github_token {
        config.github.token = Some(token.clone());
    }

    match cli.command {
        Command::Bot {
            discord_token,
            guild_id,
            channel_id,
            daily_at,
            mode,
        } => {
            if discord_token.is_some() {
                config.discord.token = discord_token;
            }
            if guild_id.is_some() {
                config.discord.guild_id = guild_id;
            }
            if channel_id.is_some() {
                config.discord.channel_id = channel_id;
            }
            if let Some(daily_at) = daily_at {
                config.schedule.daily_at = daily_at;
            }
            run_bot(&config, resolve_mode(&config, mode.as_deref())).await
        }
        Command::Report {
            mode,
            date,
            output,
            output_file,
            webhook,
            webhook_url,
        } => {
            if webhook_url.is_some() {
                config.discord.webhook_url = webhook_url;
            }
            let mode = resolve_mode(&config, mode.as_deref());
            run_report(&config, mode, date, &output, output_file.as_deref(), webhook).await
        }
        Command::Fetch {
            account,
            mode,
            date,
        } => run_fetch(&config, resolve_mode(&config, mode.as_deref()), &account, date).await,
        Command::Add { user, account } => {
            let registry = service::file_registry(&config);
            registry.add(&user, &account)?;
            println!(
                "{}",
                formatter::linked_message(&user, &account).bright_green()
            );
            Ok(())
        }
        Command::Remove { user } => {
            let registry = service::file_registry(&config);
            match registry.remove(&user)? {
                Some(account) => info!("Removed link to {}", account),
                None => info!("{} had no linked account", user),
            }
            println!("{}", formatter::unlinked_message(&user).bright_green());
            Ok(())
        }
        Command::List => {
            let registry = service::file_registry(&config);
            let accounts = registry.list()?;
            info!("Reading {}", registry.store().path().display());
            println!("{}", formatter::format_accounts(&accounts));
            Ok(())
        }
    }
}

fn resolve_mode(config: &Config, flag: Option<&str>) -> ReportMode {
    flag.map(ReportMode::from).unwrap_or(config.github.mode)
}

fn window_for(date: Option<NaiveDate>) -> ReportWindow {
    match date {
        Some(as_of) => ReportWindow {
            as_of,
            now: Utc::now(),
        },
        None => aggregator::current_window(),
    }
}

fn build_service(
    config: &Config,
    mode: ReportMode,
    show_progress: bool,
) -> Result<LeaderboardService<registry::JsonFileStore>> {
    let client = RetryingClient::new(config.retry_policy()).context("Failed to set up HTTP client")?;
    let source = service::contribution_source(config, &client, mode)?;
    let aggregator = BatchAggregator::new(source).with_progress(show_progress);

    Ok(LeaderboardService::new(
        service::file_registry(config),
        aggregator,
        config.discord.embed_color,
    ))
}

async fn run_bot(config: &Config, mode: ReportMode) -> Result<()> {
    let settings = config.validate_for_bot()?;
    let service = build_service(config, mode, false)?;

    println!("{}", "Contribot - GitHub contribution leaderboard".bright_cyan().bold());
    info!(
        "Daily {:?} summary at {} local time (now {})",
        mode,
        settings.daily_at.format("%H:%M"),
        Local::now().format("%H:%M")
    );

    DiscordBot::new(settings, service).run().await
}

async fn run_report(
    config: &Config,
    mode: ReportMode,
    date: Option<NaiveDate>,
    output: &str,
    output_file: Option<&str>,
    webhook: bool,
) -> Result<()> {
    let webhook_url = if webhook {
        Some(config.validate_for_webhook()?.to_string())
    } else {
        None
    };

    let service = build_service(config, mode, std::io::stderr().is_terminal())?;
    let (leaderboard, entries) = service.leaderboard(Some(window_for(date))).await?;

    Reporter::new(output, output_file).generate_report(leaderboard.as_of, mode, &entries)?;

    if let Some(url) = webhook_url {
        let client = RetryingClient::new(config.retry_policy())?;
        let notifier = WebhookNotifier::new(&client, &url);
        if notifier
            .send(service.summary_embed(&leaderboard, &entries))
            .await
            .is_err()
        {
            error!("The report was not delivered to the webhook");
        }
    }

    Ok(())
}

async fn run_fetch(
    config: &Config,
    mode: ReportMode,
    account: &str,
    date: Option<NaiveDate>,
) -> Result<()> {
    let client = RetryingClient::new(config.retry_policy())?;
    let source = service::contribution_source(config, &client, mode)?;
    let window = window_for(date);

    let result = source.fetch(account, &window).await;

    println!("{}", result.account.bright_white().bold());
    println!("  contributions:    {}", result.contributions);
    println!(
        "  last active:      {}",
        result
            .last_active_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  last commit (UTC): {}",
        result.last_commit_display().unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}
