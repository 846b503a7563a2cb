pub mod discord;

use crate::command_handler::CommandHandler;
use async_trait::async_trait;
use std::env::VarError;

#[async_trait]
pub trait ChatPlatform {
    async fn init(command_handler: CommandHandler) -> Result<Box<Self>, ChatPlatformError>;

    async fn run(self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Permissions {
    Default,
    Admin,
}

/// What the command layer needs to know about the invoking user.
#[async_trait]
pub trait PlatformContext: Send + Sync {
    fn get_user_identifier(&self) -> &str;

    fn get_display_name(&self) -> &str;

    /// Whether the platform itself grants the user administrator rights.
    fn is_administrator(&self) -> bool;

    fn has_role(&self, role_id: &str) -> bool;

    async fn get_user_name(&self, user_id: &str) -> Option<String>;

    fn get_permissions(&self, admin_role: Option<&str>) -> Permissions {
        if self.is_administrator() {
            return Permissions::Admin;
        }

        match admin_role {
            Some(role_id) if self.has_role(role_id) => Permissions::Admin,
            _ => Permissions::Default,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatPlatformError {
    #[error("missing authentication")]
    MissingAuthentication,
}

impl From<VarError> for ChatPlatformError {
    fn from(_e: VarError) -> Self {
        ChatPlatformError::MissingAuthentication
    }
}

#[cfg(test)]
pub mod testing {
    use super::PlatformContext;
    use async_trait::async_trait;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MockContext {
        pub user_id: String,
        pub display_name: String,
        pub administrator: bool,
        pub roles: Vec<String>,
        pub known_users: HashMap<String, String>,
    }

    impl MockContext {
        pub fn user(user_id: &str, display_name: &str) -> Self {
            Self {
                user_id: user_id.to_owned(),
                display_name: display_name.to_owned(),
                ..Default::default()
            }
        }

        pub fn admin(user_id: &str, display_name: &str) -> Self {
            Self {
                administrator: true,
                ..Self::user(user_id, display_name)
            }
        }
    }

    #[async_trait]
    impl PlatformContext for MockContext {
        fn get_user_identifier(&self) -> &str {
            &self.user_id
        }

        fn get_display_name(&self) -> &str {
            &self.display_name
        }

        fn is_administrator(&self) -> bool {
            self.administrator
        }

        fn has_role(&self, role_id: &str) -> bool {
            self.roles.iter().any(|role| role == role_id)
        }

        async fn get_user_name(&self, user_id: &str) -> Option<String> {
            self.known_users.get(user_id).cloned()
        }
    }
}
