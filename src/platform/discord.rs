use super::{ChatPlatform, ChatPlatformError, Permissions, PlatformContext};
use crate::command_handler::{
    BotCommand, CommandError, CommandHandler, CommandKind, CommandResponse, RoleUpdate,
};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use futures::StreamExt;
use std::{env, str::FromStr, sync::Arc};
use strum::IntoEnumIterator;
use twilight_gateway::{Event, Intents, Shard};
use twilight_http::Client;
use twilight_model::{
    application::{
        command::{Command, CommandType},
        interaction::{
            application_command::{CommandData, CommandDataOption, CommandOptionValue},
            Interaction, InteractionData,
        },
    },
    channel::message::MessageFlags,
    guild::Permissions as DiscordPermissions,
    http::interaction::{InteractionResponse, InteractionResponseType},
    id::{
        marker::{ApplicationMarker, GuildMarker, RoleMarker, UserMarker},
        Id,
    },
};
use twilight_util::builder::{
    command::{CommandBuilder, IntegerBuilder, RoleBuilder, StringBuilder, UserBuilder},
    InteractionResponseDataBuilder,
};

pub struct Discord {
    token: String,
    http: Arc<Client>,
    command_handler: CommandHandler,
}

#[async_trait]
impl ChatPlatform for Discord {
    async fn init(command_handler: CommandHandler) -> Result<Box<Self>, ChatPlatformError> {
        let token = env::var("DISCORD_TOKEN")?;

        if token.trim().is_empty() {
            return Err(ChatPlatformError::MissingAuthentication);
        }

        Ok(Box::new(Self {
            http: Arc::new(Client::new(token.clone())),
            token,
            command_handler,
        }))
    }

    async fn run(self) -> anyhow::Result<()> {
        let application_id = self
            .http
            .current_user_application()
            .exec()
            .await?
            .model()
            .await?
            .id;

        let handler = InteractionHandler {
            http: self.http.clone(),
            application_id,
            command_handler: self.command_handler,
        };

        match handler.register_commands().await {
            Ok(count) => tracing::info!("Registered {} application commands", count),
            Err(e) => tracing::error!("Error registering commands: {:#}", e),
        }

        let (shard, mut events) = Shard::new(self.token, Intents::GUILDS);
        shard
            .start()
            .await
            .context("Failed to connect to the Discord gateway")?;

        while let Some(event) = events.next().await {
            match event {
                Event::Ready(ready) => tracing::info!(
                    "Connected to discord as {}, in {} guild(s)",
                    ready.user.name,
                    ready.guilds.len()
                ),
                Event::InteractionCreate(interaction) => {
                    let handler = handler.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handler.handle_interaction(interaction.0).await {
                            tracing::error!("Error handling interaction: {:#}", e);
                        }
                    });
                }
                _ => (),
            }
        }

        Ok(())
    }
}

#[derive(Clone)]
struct InteractionHandler {
    http: Arc<Client>,
    application_id: Id<ApplicationMarker>,
    command_handler: CommandHandler,
}

impl InteractionHandler {
    async fn register_commands(&self) -> anyhow::Result<usize> {
        let commands = command_definitions();

        self.http
            .interaction(self.application_id)
            .set_global_commands(&commands)
            .exec()
            .await?;

        Ok(commands.len())
    }

    async fn handle_interaction(&self, interaction: Interaction) -> anyhow::Result<()> {
        let data = match &interaction.data {
            Some(InteractionData::ApplicationCommand(data)) => data,
            _ => return Ok(()),
        };

        let ctx = DiscordContext::from_interaction(self.http.clone(), &interaction)?;
        let client = self.http.interaction(self.application_id);

        let deferred = InteractionResponse {
            kind: InteractionResponseType::DeferredChannelMessageWithSource,
            data: Some(
                InteractionResponseDataBuilder::new()
                    .flags(MessageFlags::EPHEMERAL)
                    .build(),
            ),
        };
        client
            .create_response(interaction.id, &interaction.token, &deferred)
            .exec()
            .await?;

        let response = match parse_command(data) {
            Ok(command) => self.command_handler.handle_command(command, &ctx).await,
            Err(e) => CommandResponse::text(format!("❌ {}", e)),
        };

        if let (Some(update), Some(guild_id)) = (&response.role_update, interaction.guild_id) {
            if let Err(e) = self.apply_role_update(guild_id, ctx.user_id, update).await {
                tracing::warn!("Failed to update roles of {}: {:#}", ctx.user_name, e);
            }
        }

        client
            .update_response(&interaction.token)
            .content(Some(response.content.as_str()))?
            .exec()
            .await?;

        Ok(())
    }

    async fn apply_role_update(
        &self,
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
        update: &RoleUpdate,
    ) -> anyhow::Result<()> {
        match update {
            RoleUpdate::Grant(role) => {
                let role_id = parse_id::<RoleMarker>(role)?;
                self.http
                    .add_guild_member_role(guild_id, user_id, role_id)
                    .exec()
                    .await?;
                tracing::info!("Assigned role {} to {}", role_id, user_id);
            }
            RoleUpdate::Revoke(role) => {
                let role_id = parse_id::<RoleMarker>(role)?;
                self.http
                    .remove_guild_member_role(guild_id, user_id, role_id)
                    .exec()
                    .await?;
                tracing::info!("Removed role {} from {}", role_id, user_id);
            }
        }

        Ok(())
    }
}

struct DiscordContext {
    http: Arc<Client>,
    user_id: Id<UserMarker>,
    user_identifier: String,
    user_name: String,
    permissions: Option<DiscordPermissions>,
    roles: Vec<Id<RoleMarker>>,
}

impl DiscordContext {
    fn from_interaction(http: Arc<Client>, interaction: &Interaction) -> anyhow::Result<Self> {
        let member = interaction.member.as_ref();

        let user = member
            .and_then(|member| member.user.as_ref())
            .or(interaction.user.as_ref())
            .ok_or_else(|| anyhow!("Interaction {} has no user", interaction.id))?;

        Ok(Self {
            http,
            user_id: user.id,
            user_identifier: user.id.to_string(),
            user_name: user.name.clone(),
            permissions: member.and_then(|member| member.permissions),
            roles: member
                .map(|member| member.roles.clone())
                .unwrap_or_default(),
        })
    }
}

#[async_trait]
impl PlatformContext for DiscordContext {
    fn get_user_identifier(&self) -> &str {
        &self.user_identifier
    }

    fn get_display_name(&self) -> &str {
        &self.user_name
    }

    fn is_administrator(&self) -> bool {
        self.permissions
            .map_or(false, |permissions| {
                permissions.contains(DiscordPermissions::ADMINISTRATOR)
            })
    }

    fn has_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|role| role.to_string() == role_id)
    }

    async fn get_user_name(&self, user_id: &str) -> Option<String> {
        let user_id = parse_id::<UserMarker>(user_id).ok()?;
        let user = self.http.user(user_id).exec().await.ok()?.model().await.ok()?;

        Some(user.name)
    }
}

fn command_definitions() -> Vec<Command> {
    CommandKind::iter()
        .map(|kind| {
            let builder = CommandBuilder::new(
                kind.to_string(),
                kind.description().to_owned(),
                CommandType::ChatInput,
            );

            let builder = match kind {
                CommandKind::Link => builder.option(
                    StringBuilder::new("username".to_owned(), "Your Minecraft username".to_owned())
                        .required(true),
                ),
                CommandKind::ConfigServer => builder
                    .option(
                        StringBuilder::new(
                            "host".to_owned(),
                            "Minecraft server IP address".to_owned(),
                        )
                        .required(true),
                    )
                    .option(
                        StringBuilder::new("password".to_owned(), "RCON password".to_owned())
                            .required(true),
                    )
                    .option(
                        IntegerBuilder::new(
                            "port".to_owned(),
                            "RCON port (default: 25575)".to_owned(),
                        )
                        .required(false),
                    ),
                CommandKind::ConfigRole => builder.option(
                    RoleBuilder::new(
                        "role".to_owned(),
                        "Role to assign when users link their account".to_owned(),
                    )
                    .required(true),
                ),
                CommandKind::ConfigAdminRole => builder.option(
                    RoleBuilder::new("role".to_owned(), "Admin role for bot commands".to_owned())
                        .required(true),
                ),
                CommandKind::Check => builder.option(
                    UserBuilder::new("user".to_owned(), "The user to check".to_owned())
                        .required(true),
                ),
                CommandKind::Unlink | CommandKind::Status | CommandKind::LinkDb => builder,
            };

            match kind.get_permissions() {
                Permissions::Admin => builder
                    .default_member_permissions(DiscordPermissions::ADMINISTRATOR)
                    .build(),
                Permissions::Default => builder.build(),
            }
        })
        .collect()
}

fn parse_command(data: &CommandData) -> Result<BotCommand, CommandError> {
    let kind = CommandKind::from_str(&data.name)
        .map_err(|_| CommandError::UnknownCommand(data.name.clone()))?;
    let options = &data.options;

    let command = match kind {
        CommandKind::Link => BotCommand::Link {
            username: string_option(options, "username")?,
        },
        CommandKind::Unlink => BotCommand::Unlink,
        CommandKind::Status => BotCommand::Status,
        CommandKind::ConfigServer => BotCommand::ConfigServer {
            host: string_option(options, "host")?,
            password: string_option(options, "password")?,
            port: match find_option(options, "port") {
                Some(CommandOptionValue::Integer(port)) => {
                    let port = u16::try_from(*port)?;
                    if port == 0 {
                        return Err(CommandError::InvalidArgument(
                            "port must be between 1 and 65535".to_owned(),
                        ));
                    }
                    Some(port)
                }
                _ => None,
            },
        },
        CommandKind::ConfigRole => {
            let (role_id, role_name) = role_option(data)?;
            BotCommand::ConfigRole { role_id, role_name }
        }
        CommandKind::ConfigAdminRole => {
            let (role_id, role_name) = role_option(data)?;
            BotCommand::ConfigAdminRole { role_id, role_name }
        }
        CommandKind::LinkDb => BotCommand::LinkDb,
        CommandKind::Check => {
            let user_id = match find_option(options, "user") {
                Some(CommandOptionValue::User(user_id)) => *user_id,
                _ => return Err(CommandError::MissingArgument("user".to_owned())),
            };

            let user_name = data
                .resolved
                .as_ref()
                .and_then(|resolved| resolved.users.get(&user_id))
                .map(|user| user.name.clone())
                .unwrap_or_else(|| "Unknown User".to_owned());

            BotCommand::Check {
                user_id: user_id.to_string(),
                user_name,
            }
        }
    };

    Ok(command)
}

fn find_option<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a CommandOptionValue> {
    options
        .iter()
        .find(|option| option.name == name)
        .map(|option| &option.value)
}

fn string_option(options: &[CommandDataOption], name: &str) -> Result<String, CommandError> {
    match find_option(options, name) {
        Some(CommandOptionValue::String(value)) => Ok(value.trim().to_owned()),
        _ => Err(CommandError::MissingArgument(name.to_owned())),
    }
}

fn role_option(data: &CommandData) -> Result<(String, String), CommandError> {
    let role_id = match find_option(&data.options, "role") {
        Some(CommandOptionValue::Role(role_id)) => *role_id,
        _ => return Err(CommandError::MissingArgument("role".to_owned())),
    };

    let role_name = data
        .resolved
        .as_ref()
        .and_then(|resolved| resolved.roles.get(&role_id))
        .map(|role| role.name.clone())
        .unwrap_or_else(|| role_id.to_string());

    Ok((role_id.to_string(), role_name))
}

fn parse_id<T>(raw: &str) -> anyhow::Result<Id<T>> {
    let value: u64 = raw.parse()?;
    Id::new_checked(value).ok_or_else(|| anyhow!("invalid Discord id `{}`", raw))
}
