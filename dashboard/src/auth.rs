//! Credential check against a static demo map or a Pocket ID allow-list.
//!
//! Neither verifier is a security boundary: the demo secrets are plaintext and
//! the allow-list is a public JSON file.

use crate::config::{AuthMode, DashboardConfig};
use crate::fetcher::{FetchError, JsonFetcher};
use crate::session::Identity;
use crate::types::Role;
use crate::whitelist::AllowList;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What the login form submits.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: String,
    /// Password for the static map; ignored by the allow-list.
    pub secret: Option<String>,
    pub claimed_role: Role,
}

impl Credentials {
    pub fn new(id: &str, secret: Option<&str>, claimed_role: Role) -> Self {
        Self {
            id: id.trim().to_string(),
            secret: secret.map(str::to_string),
            claimed_role,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Enter a user ID")]
    MissingId,
    #[error("Enter a password")]
    MissingSecret,
}

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("ID {0} is not on the access list")]
    NotFound(String),
    #[error("Access for ID {0} is not active")]
    Inactive(String),
    #[error("Wrong password")]
    SecretMismatch,
    #[error("Account is not registered as {claimed}")]
    RoleMismatch { claimed: Role },
    #[error("Access list unavailable: {0}")]
    Unavailable(#[from] FetchError),
}

#[derive(Debug, Error, PartialEq)]
pub enum LoginError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Variant (a): id -> {secret, role}; all three must match exactly.
#[derive(Debug, Clone)]
pub struct StaticVerifier {
    accounts: HashMap<String, (String, Role)>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
        }
    }

    /// Demo accounts offered on the login page.
    pub fn demo() -> Self {
        Self::new()
            .with_account(r"D:\user\23", "password", Role::User)
            .with_account(r"D:\admin", r"admin\123", Role::Admin)
    }

    pub fn with_account(mut self, id: &str, secret: &str, role: Role) -> Self {
        self.accounts.insert(id.to_string(), (secret.to_string(), role));
        self
    }

    pub fn verify(&self, creds: &Credentials) -> Result<Identity, LoginError> {
        let secret = match creds.secret.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => return Err(ValidationError::MissingSecret.into()),
        };
        let (expected, role) = self
            .accounts
            .get(&creds.id)
            .ok_or_else(|| AuthError::NotFound(creds.id.clone()))?;
        if expected != secret {
            return Err(AuthError::SecretMismatch.into());
        }
        if *role != creds.claimed_role {
            return Err(AuthError::RoleMismatch {
                claimed: creds.claimed_role,
            }
            .into());
        }
        Ok(Identity {
            id: creds.id.clone(),
            name: "Demo user".to_string(),
            role: *role,
        })
    }
}

impl Default for StaticVerifier {
    fn default() -> Self {
        Self::demo()
    }
}

/// Where the allow-list comes from.
#[derive(Clone)]
pub enum AllowListSource {
    /// Fetched on every check so edits to the served file apply immediately.
    /// `fallback` answers while the served file cannot be read.
    Remote {
        fetcher: JsonFetcher,
        url: String,
        fallback: Option<AllowList>,
    },
    Local(AllowList),
}

/// Variant (b): id must be listed with `active` status; role comes from the entry.
#[derive(Clone)]
pub struct AllowListVerifier {
    source: AllowListSource,
}

impl AllowListVerifier {
    pub fn remote(fetcher: JsonFetcher, url: &str) -> Self {
        Self {
            source: AllowListSource::Remote {
                fetcher,
                url: url.to_string(),
                fallback: None,
            },
        }
    }

    /// Remote list that degrades to `fallback` when the fetch fails.
    pub fn remote_or(fetcher: JsonFetcher, url: &str, fallback: AllowList) -> Self {
        Self {
            source: AllowListSource::Remote {
                fetcher,
                url: url.to_string(),
                fallback: Some(fallback),
            },
        }
    }

    pub fn local(list: AllowList) -> Self {
        Self {
            source: AllowListSource::Local(list),
        }
    }

    pub async fn load(&self) -> Result<AllowList, AuthError> {
        match &self.source {
            AllowListSource::Local(list) => Ok(list.clone()),
            AllowListSource::Remote {
                fetcher,
                url,
                fallback,
            } => match fetcher.fetch_json::<AllowList>(url).await {
                Ok(list) => {
                    debug!("Allow-list loaded: {} entries", list.len());
                    Ok(list)
                }
                Err(e) => match fallback {
                    Some(list) => {
                        warn!("Allow-list fetch failed: {e}; using built-in list");
                        Ok(list.clone())
                    }
                    None => {
                        warn!("Allow-list fetch failed: {e}");
                        Err(AuthError::Unavailable(e))
                    }
                },
            },
        }
    }

    pub async fn verify(&self, creds: &Credentials) -> Result<Identity, LoginError> {
        let list = self.load().await?;
        let entry = list
            .get(&creds.id)
            .ok_or_else(|| AuthError::NotFound(creds.id.clone()))?;
        if !entry.is_active() {
            return Err(AuthError::Inactive(creds.id.clone()).into());
        }
        Ok(Identity {
            id: entry.id.clone(),
            name: entry.name.clone(),
            role: entry.role,
        })
    }
}

/// Credential check selected by configuration.
#[derive(Clone)]
pub enum CredentialCheck {
    Static(StaticVerifier),
    AllowList(AllowListVerifier),
}

impl CredentialCheck {
    pub fn from_config(cfg: &DashboardConfig, fetcher: &JsonFetcher) -> Self {
        match cfg.auth_mode {
            AuthMode::Demo => CredentialCheck::Static(StaticVerifier::demo()),
            AuthMode::AllowList => CredentialCheck::AllowList(AllowListVerifier::remote_or(
                fetcher.clone(),
                &cfg.users_url(),
                AllowList::seeded(),
            )),
            AuthMode::Seeded => {
                CredentialCheck::AllowList(AllowListVerifier::local(AllowList::seeded()))
            }
        }
    }

    pub async fn check(&self, creds: &Credentials) -> Result<Identity, LoginError> {
        if creds.id.is_empty() {
            return Err(ValidationError::MissingId.into());
        }
        let outcome = match self {
            CredentialCheck::Static(v) => v.verify(creds),
            CredentialCheck::AllowList(v) => v.verify(creds).await,
        };
        match &outcome {
            Ok(identity) => info!("Credential check passed for {} ({})", identity.id, identity.role),
            Err(e) => info!("Credential check failed for {}: {e}", creds.id),
        }
        outcome
    }
}
