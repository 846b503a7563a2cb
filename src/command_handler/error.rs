use crate::config::ConfigError;
use std::{fmt, num::TryFromIntError};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    MissingArgument(String),
    InvalidArgument(String),
    UnknownCommand(String),
    NoPermissions,
    ConfigurationError(#[from] ConfigError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::MissingArgument(arg) => {
                f.write_str(&format!("missing argument: {}", arg))
            }
            CommandError::InvalidArgument(arg) => {
                f.write_str(&format!("invalid argument: {}", arg))
            }
            CommandError::UnknownCommand(name) => {
                f.write_str(&format!("unknown command: {}", name))
            }
            CommandError::NoPermissions => {
                f.write_str("You do not have permission to use this command.")
            }
            CommandError::ConfigurationError(e) => {
                f.write_str(&format!("could not save configuration: {}", e))
            }
        }
    }
}

impl From<TryFromIntError> for CommandError {
    fn from(_: TryFromIntError) -> Self {
        Self::InvalidArgument("port must be between 1 and 65535".to_string())
    }
}
