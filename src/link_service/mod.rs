pub mod error;

pub use self::error::LinkError;

use crate::database::{
    models::{LinkRecord, LinkedAccounts},
    LinkStore,
};
use crate::minecraft::Console;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::Mutex;

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,16}$").expect("Failed to compile username regex"));

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// Links external accounts to Minecraft usernames, keeping the server whitelist
/// and the link store in step. The store is only written after the whitelist
/// change has gone through.
pub struct LinkService {
    store: LinkStore,
    console: Arc<dyn Console>,
    // Serializes reload → modify → save of the store; never held across a console call
    mutation_lock: Mutex<()>,
}

impl LinkService {
    pub fn new(store: LinkStore, console: Arc<dyn Console>) -> Self {
        Self {
            store,
            console,
            mutation_lock: Mutex::new(()),
        }
    }

    pub async fn link(&self, account_id: &str, username: &str) -> Result<LinkRecord, LinkError> {
        if !is_valid_username(username) {
            return Err(LinkError::InvalidUsername(username.to_owned()));
        }

        check_available(&self.store.load().await, account_id, username)?;

        let response = self
            .console
            .execute(&format!("whitelist add {}", username))
            .await?;
        tracing::info!("Player whitelisted: {} ({}): {}", username, account_id, response);

        let _guard = self.mutation_lock.lock().await;
        let mut accounts = self.store.load().await;

        // Another link may have landed while the console call was in flight
        if let Err(e) = check_available(&accounts, account_id, username) {
            tracing::warn!(
                "{} was whitelisted for {} but the link was claimed concurrently: {}",
                username,
                account_id,
                e
            );
            return Err(e);
        }

        let record = LinkRecord::new(username.to_owned());
        accounts.insert(account_id.to_owned(), record.clone());
        self.persist(&accounts).await;

        Ok(record)
    }

    /// Returns the removed record.
    pub async fn unlink(&self, account_id: &str) -> Result<LinkRecord, LinkError> {
        let record = self
            .store
            .load()
            .await
            .remove(account_id)
            .ok_or(LinkError::NotLinked)?;

        let response = self
            .console
            .execute(&format!("whitelist remove {}", record.minecraft_username))
            .await?;
        tracing::info!(
            "Player removed from whitelist: {} ({}): {}",
            record.minecraft_username,
            account_id,
            response
        );

        let _guard = self.mutation_lock.lock().await;
        let mut accounts = self.store.load().await;

        if accounts.get(account_id) == Some(&record) {
            accounts.remove(account_id);
            self.persist(&accounts).await;
        }

        Ok(record)
    }

    pub async fn status(&self, account_id: &str) -> Option<LinkRecord> {
        self.store.load().await.remove(account_id)
    }

    pub async fn check_account(&self, account_id: &str) -> Option<LinkRecord> {
        self.status(account_id).await
    }

    pub async fn list_all(&self) -> LinkedAccounts {
        self.store.load().await
    }

    async fn persist(&self, accounts: &LinkedAccounts) {
        if let Err(e) = self.store.save(accounts).await {
            tracing::warn!(
                "Error saving linked accounts to {}: {}",
                self.store.path().display(),
                e
            );
        }
    }
}

fn check_available(
    accounts: &LinkedAccounts,
    account_id: &str,
    username: &str,
) -> Result<(), LinkError> {
    if let Some(existing) = accounts.get(account_id) {
        return Err(LinkError::AlreadyLinked {
            username: existing.minecraft_username.clone(),
        });
    }

    if accounts
        .values()
        .any(|record| record.minecraft_username.eq_ignore_ascii_case(username))
    {
        return Err(LinkError::UsernameTaken(username.to_owned()));
    }

    Ok(())
}
