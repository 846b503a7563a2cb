use crate::minecraft::RconError;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid Minecraft username `{0}`")]
    InvalidUsername(String),
    #[error("account is already linked to `{username}`")]
    AlreadyLinked { username: String },
    #[error("Minecraft account `{0}` is already linked to another account")]
    UsernameTaken(String),
    #[error("account is not linked")]
    NotLinked,
    #[error("{0}")]
    WhitelistFailed(#[from] RconError),
}
