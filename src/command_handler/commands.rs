use crate::platform::Permissions;
use strum::{AsRefStr, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, AsRefStr, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CommandKind {
    Link,
    Unlink,
    Status,
    ConfigServer,
    ConfigRole,
    ConfigAdminRole,
    #[strum(serialize = "linkdb")]
    LinkDb,
    Check,
}

impl CommandKind {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Link => "Link your Minecraft account to your Discord account",
            Self::Unlink => "Unlink your Minecraft account from your Discord account",
            Self::Status => "Check your linked account status",
            Self::ConfigServer => "Configure the Minecraft server connection (Admin only)",
            Self::ConfigRole => {
                "Configure the role assigned when users link their account (Admin only)"
            }
            Self::ConfigAdminRole => "Set the admin role for bot commands (Admin only)",
            Self::LinkDb => "Display all linked accounts (Admin only)",
            Self::Check => "Check a user's linked Minecraft account (Admin only)",
        }
    }

    pub fn get_permissions(&self) -> Permissions {
        match self {
            Self::Link | Self::Unlink | Self::Status => Permissions::Default,
            Self::ConfigServer
            | Self::ConfigRole
            | Self::ConfigAdminRole
            | Self::LinkDb
            | Self::Check => Permissions::Admin,
        }
    }
}

/// A parsed command invocation, independent of the chat platform it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Link {
        username: String,
    },
    Unlink,
    Status,
    ConfigServer {
        host: String,
        password: String,
        port: Option<u16>,
    },
    ConfigRole {
        role_id: String,
        role_name: String,
    },
    ConfigAdminRole {
        role_id: String,
        role_name: String,
    },
    LinkDb,
    Check {
        user_id: String,
        user_name: String,
    },
}

impl BotCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Link { .. } => CommandKind::Link,
            Self::Unlink => CommandKind::Unlink,
            Self::Status => CommandKind::Status,
            Self::ConfigServer { .. } => CommandKind::ConfigServer,
            Self::ConfigRole { .. } => CommandKind::ConfigRole,
            Self::ConfigAdminRole { .. } => CommandKind::ConfigAdminRole,
            Self::LinkDb => CommandKind::LinkDb,
            Self::Check { .. } => CommandKind::Check,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleUpdate {
    Grant(String),
    Revoke(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub content: String,
    /// Applied by the platform to the invoking user after a successful link/unlink.
    pub role_update: Option<RoleUpdate>,
}

impl CommandResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role_update: None,
        }
    }
}
