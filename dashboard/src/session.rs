//! Persisted login session and the page guard built on it.

use crate::storage::KvStore;
use crate::types::Role;
use anyhow::Result;
use std::fmt;
use tracing::{info, warn};

pub const KEY_TOKEN: &str = "auth_token";
pub const KEY_ROLE: &str = "user_role";
pub const KEY_NAME: &str = "user_name";
pub const KEY_ID: &str = "user_id";

const SESSION_KEYS: [&str; 4] = [KEY_TOKEN, KEY_ROLE, KEY_NAME, KEY_ID];

/// Page surface. Selection is driven by the stored role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Standard,
    Admin,
}

impl Route {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Route::Admin,
            Role::User => Route::Standard,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "login.html",
            Route::Standard => "trading.html",
            Route::Admin => "admin.html",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Who passed the credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub pocket_id: String,
    pub role: Role,
    pub name: String,
    pub authenticated: bool,
}

impl Session {
    /// Admins may open every view; users only standard ones.
    pub fn satisfies(&self, required: Role) -> bool {
        self.authenticated && (self.role == Role::Admin || required == Role::User)
    }
}

/// Result of the page guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted(Session),
    Redirect(Route),
}

/// Yes/no prompt shown before destructive actions.
pub trait Confirm {
    fn confirm(&self, question: &str) -> bool;
}

/// Answers every prompt the same way (`--yes` flags, tests).
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, _question: &str) -> bool {
        self.0
    }
}

pub struct SessionStore {
    kv: KvStore,
}

impl SessionStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self::new(KvStore::open(db_path)?))
    }

    /// Persist the identity and return where the role lands.
    pub fn login(&self, identity: &Identity) -> Result<Route> {
        let token = uuid::Uuid::new_v4().to_string();
        self.kv.set(KEY_TOKEN, &token)?;
        self.kv.set(KEY_ROLE, identity.role.as_str())?;
        self.kv.set(KEY_NAME, &identity.name)?;
        self.kv.set(KEY_ID, &identity.id)?;

        let route = Route::for_role(identity.role);
        info!("Logged in {} ({}) -> {}", identity.id, identity.role, route);
        Ok(route)
    }

    /// Clear the session after confirmation. `None` means the user declined.
    pub fn logout(&self, confirm: &dyn Confirm) -> Result<Option<Route>> {
        if !confirm.confirm("Log out of the dashboard?") {
            return Ok(None);
        }
        for key in SESSION_KEYS {
            self.kv.remove(key)?;
        }
        info!("Session cleared");
        Ok(Some(Route::Login))
    }

    /// The stored session, if all of its keys are present and valid.
    pub fn current(&self) -> Result<Option<Session>> {
        let token = self.kv.get(KEY_TOKEN)?;
        let role = self.kv.get(KEY_ROLE)?;
        let id = self.kv.get(KEY_ID)?;
        let name = self.kv.get(KEY_NAME)?;

        let (Some(token), Some(role), Some(id)) = (token, role, id) else {
            return Ok(None);
        };
        if token.is_empty() || id.is_empty() {
            return Ok(None);
        }
        let role = match role.parse::<Role>() {
            Ok(r) => r,
            Err(e) => {
                warn!("Stored session has {e}; treating as logged out");
                return Ok(None);
            }
        };

        Ok(Some(Session {
            pocket_id: id,
            role,
            name: name.unwrap_or_default(),
            authenticated: true,
        }))
    }

    /// Page guard. No session -> login; insufficient role -> standard dashboard.
    pub fn require_session(&self, required: Option<Role>) -> Result<Access> {
        let Some(session) = self.current()? else {
            return Ok(Access::Redirect(Route::Login));
        };
        match required {
            Some(role) if !session.satisfies(role) => {
                warn!(
                    "{} ({}) may not open the {} view",
                    session.pocket_id, session.role, role
                );
                Ok(Access::Redirect(Route::Standard))
            }
            _ => Ok(Access::Granted(session)),
        }
    }

    /// Where the login entry point should send a visitor right away.
    pub fn entry_route(&self) -> Result<Route> {
        Ok(match self.current()? {
            Some(s) => Route::for_role(s.role),
            None => Route::Login,
        })
    }
}
