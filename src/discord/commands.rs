use thiserror::Error;
use twilight_model::application::command::{Command, CommandType};
use twilight_model::application::interaction::application_command::{
    CommandDataOption, CommandOptionValue,
};
use twilight_model::id::marker::UserMarker;
use twilight_model::id::Id;
use twilight_util::builder::command::{CommandBuilder, StringBuilder, UserBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Ping,
    AddAccount {
        account: String,
        user: Id<UserMarker>,
    },
    RemoveAccount {
        user: Id<UserMarker>,
    },
    ListAccounts {
        user: Option<Id<UserMarker>>,
    },
    FetchStats,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unrecognized command: {0}")]
    Unknown(String),

    #[error("Missing option `{0}`")]
    MissingOption(&'static str),
}

/// Slash commands registered in the configured guild.
pub fn definitions() -> Vec<Command> {
    vec![
        CommandBuilder::new("ping", "Replies with Pong!", CommandType::ChatInput).build(),
        CommandBuilder::new(
            "add_account",
            "Adds an account with a name and a user.",
            CommandType::ChatInput,
        )
        .option(StringBuilder::new("account_name", "GitHub login to track").required(true))
        .option(UserBuilder::new("user", "Member the account belongs to").required(true))
        .build(),
        CommandBuilder::new(
            "remove_account",
            "Removes an account for a user.",
            CommandType::ChatInput,
        )
        .option(UserBuilder::new("user", "Member to unlink").required(true))
        .build(),
        CommandBuilder::new(
            "list_accounts",
            "Lists all the accounts linked to users.",
            CommandType::ChatInput,
        )
        .option(UserBuilder::new("user", "Only show this member's account").required(false))
        .build(),
        CommandBuilder::new(
            "fetch_stats",
            "Fetches the GitHub stats of every linked account.",
            CommandType::ChatInput,
        )
        .build(),
    ]
}

impl BotCommand {
    pub fn parse(name: &str, options: &[CommandDataOption]) -> Result<Self, CommandError> {
        match name {
            "ping" => Ok(BotCommand::Ping),
            "add_account" => Ok(BotCommand::AddAccount {
                account: string_option(options, "account_name")
                    .ok_or(CommandError::MissingOption("account_name"))?,
                user: user_option(options, "user").ok_or(CommandError::MissingOption("user"))?,
            }),
            "remove_account" => Ok(BotCommand::RemoveAccount {
                user: user_option(options, "user").ok_or(CommandError::MissingOption("user"))?,
            }),
            "list_accounts" => Ok(BotCommand::ListAccounts {
                user: user_option(options, "user"),
            }),
            "fetch_stats" => Ok(BotCommand::FetchStats),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn string_option(options: &[CommandDataOption], name: &str) -> Option<String> {
    options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.value {
            CommandOptionValue::String(value) => Some(value.clone()),
            _ => None,
        })
}

fn user_option(options: &[CommandDataOption], name: &str) -> Option<Id<UserMarker>> {
    options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| match o.value {
            CommandOptionValue::User(id) => Some(id),
            _ => None,
        })
}
