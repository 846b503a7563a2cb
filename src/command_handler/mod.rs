pub mod commands;
pub mod error;

pub use self::commands::{BotCommand, CommandKind, CommandResponse, RoleUpdate};
pub use self::error::CommandError;

use crate::config::{ConfigHandle, DEFAULT_RCON_PORT};
use crate::database::models::LinkRecord;
use crate::link_service::{LinkError, LinkService};
use crate::minecraft::{Console, RconError};
use crate::platform::PlatformContext;
use std::sync::Arc;

const MESSAGE_LENGTH_LIMIT: usize = 1900;

/// Turns platform-neutral commands into link operations and user-facing replies.
#[derive(Clone)]
pub struct CommandHandler {
    link_service: Arc<LinkService>,
    console: Arc<dyn Console>,
    config: ConfigHandle,
}

impl CommandHandler {
    pub fn new(link_service: Arc<LinkService>, console: Arc<dyn Console>, config: ConfigHandle) -> Self {
        Self {
            link_service,
            console,
            config,
        }
    }

    /// Always produces exactly one reply, failures included.
    pub async fn handle_command<C: PlatformContext>(
        &self,
        command: BotCommand,
        ctx: &C,
    ) -> CommandResponse {
        let kind = command.kind();

        tracing::debug!(
            "Executing {} for {} ({})",
            kind,
            ctx.get_display_name(),
            ctx.get_user_identifier()
        );

        match self.execute(command, ctx).await {
            Ok(response) => response,
            Err(e) => {
                tracing::info!("Command {} failed: {}", kind, e);
                CommandResponse::text(format!("❌ {}", e))
            }
        }
    }

    async fn execute<C: PlatformContext>(
        &self,
        command: BotCommand,
        ctx: &C,
    ) -> Result<CommandResponse, CommandError> {
        if command.kind().get_permissions() > ctx.get_permissions(self.config.discord().admin_role())
        {
            return Err(CommandError::NoPermissions);
        }

        let response = match command {
            BotCommand::Link { username } => self.link(&username, ctx).await,
            BotCommand::Unlink => self.unlink(ctx).await,
            BotCommand::Status => {
                let record = self
                    .link_service
                    .status(ctx.get_user_identifier())
                    .await;

                CommandResponse::text(match record {
                    Some(record) => format!(
                        "✅ **Linked Account Status**\nMinecraft Username: **{}**\nLinked At: {}",
                        record.minecraft_username,
                        record.display_linked_at()
                    ),
                    None => "❌ Your Discord account is not linked to any Minecraft account.\nUse /link to link your account.".to_owned(),
                })
            }
            BotCommand::ConfigServer {
                host,
                password,
                port,
            } => {
                let port = port.unwrap_or(DEFAULT_RCON_PORT);
                self.config.set_server(host.clone(), port, password)?;
                tracing::info!("Minecraft server set to {}:{}", host, port);

                CommandResponse::text(match self.console.execute("list").await {
                    Ok(_) => format!(
                        "✅ Minecraft server configured successfully!\nHost: {}\nPort: {}\nConnection test: ✅ Success",
                        host, port
                    ),
                    Err(e) => format!(
                        "⚠️ Server configuration saved, but connection test failed:\n{}\nPlease verify your RCON settings.",
                        describe_rcon_error(&e)
                    ),
                })
            }
            BotCommand::ConfigRole { role_id, role_name } => {
                self.config.set_linked_role(role_id)?;
                CommandResponse::text(format!("✅ Linked role set to: {}", role_name))
            }
            BotCommand::ConfigAdminRole { role_id, role_name } => {
                self.config.set_admin_role(role_id)?;
                CommandResponse::text(format!("✅ Admin role set to: {}", role_name))
            }
            BotCommand::LinkDb => {
                let accounts = self.link_service.list_all().await;
                let mut entries = Vec::with_capacity(accounts.len());

                for (user_id, record) in accounts {
                    let user_name = ctx
                        .get_user_name(&user_id)
                        .await
                        .unwrap_or_else(|| "Unknown User".to_owned());
                    entries.push((user_id, user_name, record));
                }

                CommandResponse::text(format_link_db(&entries))
            }
            BotCommand::Check { user_id, user_name } => {
                CommandResponse::text(match self.link_service.check_account(&user_id).await {
                    Some(record) => format!(
                        "✅ **Account Check**\n\n**User:** {} ({})\n**Minecraft Username:** {}\n**Linked At:** {}",
                        user_name,
                        user_id,
                        record.minecraft_username,
                        record.display_linked_at()
                    ),
                    None => format!(
                        "❌ **Account Check**\n\n**User:** {} ({})\n**Status:** Not linked to any Minecraft account.",
                        user_name, user_id
                    ),
                })
            }
        };

        Ok(response)
    }

    async fn link<C: PlatformContext>(&self, username: &str, ctx: &C) -> CommandResponse {
        match self
            .link_service
            .link(ctx.get_user_identifier(), username)
            .await
        {
            Ok(record) => {
                tracing::info!(
                    "Linked {} to Discord user {} ({})",
                    record.minecraft_username,
                    ctx.get_display_name(),
                    ctx.get_user_identifier()
                );

                CommandResponse {
                    content: format!(
                        "✅ Successfully linked your Minecraft account **{}**!\nYou have been whitelisted on the server and granted access.",
                        record.minecraft_username
                    ),
                    role_update: self
                        .config
                        .discord()
                        .linked_role()
                        .map(|role| RoleUpdate::Grant(role.to_owned())),
                }
            }
            Err(e) => {
                if let LinkError::WhitelistFailed(cause) = &e {
                    tracing::error!("Error linking account {}: {}", username, cause);
                }
                CommandResponse::text(link_failure_message(&e))
            }
        }
    }

    async fn unlink<C: PlatformContext>(&self, ctx: &C) -> CommandResponse {
        match self.link_service.unlink(ctx.get_user_identifier()).await {
            Ok(record) => {
                tracing::info!(
                    "Unlinked {} from Discord user {} ({})",
                    record.minecraft_username,
                    ctx.get_display_name(),
                    ctx.get_user_identifier()
                );

                CommandResponse {
                    content: format!(
                        "✅ Successfully unlinked your Minecraft account **{}**.\nYou have been removed from the whitelist.",
                        record.minecraft_username
                    ),
                    role_update: self
                        .config
                        .discord()
                        .linked_role()
                        .map(|role| RoleUpdate::Revoke(role.to_owned())),
                }
            }
            Err(LinkError::NotLinked) => CommandResponse::text(
                "❌ Your Discord account is not linked to any Minecraft account.",
            ),
            Err(e) => {
                tracing::error!("Error unlinking account: {}", e);
                CommandResponse::text(format!("❌ Failed to unlink account: {}", describe_link_error(&e)))
            }
        }
    }
}

fn link_failure_message(e: &LinkError) -> String {
    match e {
        LinkError::InvalidUsername(_) => "❌ Invalid Minecraft username. Username must be 3-16 characters and contain only letters, numbers, and underscores.".to_owned(),
        LinkError::AlreadyLinked { username } => format!(
            "❌ Your Discord account is already linked to Minecraft account: **{}**\nUse /unlink to unlink your account first.",
            username
        ),
        LinkError::UsernameTaken(_) => {
            "❌ This Minecraft account is already linked to another Discord account.".to_owned()
        }
        LinkError::NotLinked => {
            "❌ Your Discord account is not linked to any Minecraft account.".to_owned()
        }
        LinkError::WhitelistFailed(cause) => format!(
            "❌ Failed to link account: {}\nPlease make sure the server is configured correctly and RCON is enabled.",
            describe_rcon_error(cause)
        ),
    }
}

fn describe_link_error(e: &LinkError) -> String {
    match e {
        LinkError::WhitelistFailed(cause) => describe_rcon_error(cause),
        e => e.to_string(),
    }
}

fn describe_rcon_error(e: &RconError) -> String {
    match e {
        RconError::NotConfigured => {
            "Minecraft server not configured. Please use /config-server to set it up.".to_owned()
        }
        e => e.to_string(),
    }
}

fn format_link_db(entries: &[(String, String, LinkRecord)]) -> String {
    if entries.is_empty() {
        return "📋 **Linked Accounts Database**\n\nNo accounts are currently linked.".to_owned();
    }

    let mut response = format!(
        "📋 **Linked Accounts Database**\n\n**Total Linked:** {}\n\n",
        entries.len()
    );

    for (index, (user_id, user_name, record)) in entries.iter().enumerate() {
        let entry = format!(
            "{}. **{}**\n   Discord: {} ({})\n   Linked: {}\n\n",
            index + 1,
            record.minecraft_username,
            user_name,
            user_id,
            record.display_linked_at()
        );

        if response.chars().count() + entry.chars().count() > MESSAGE_LENGTH_LIMIT {
            response.push_str("... (too many entries to display in one message)");
            break;
        }

        response.push_str(&entry);
    }

    response
}
