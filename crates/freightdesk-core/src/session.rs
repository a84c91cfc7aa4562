//! Authentication state for the running client.
//!
//! The manager owns the current user and a loading flag, mirrors the user and
//! tokens into a [`SessionStore`], and publishes every change on a watch
//! channel. Authentication is derived from the user record alone.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::{AuthApi, LoginResult, User};
use crate::error::ApiError;
use crate::storage::SessionStore;

pub const USER_KEY: &str = "@freightdesk:user:v1";
pub const ACCESS_TOKEN_KEY: &str = "@freightdesk:access_token:v1";
pub const REFRESH_TOKEN_KEY: &str = "@freightdesk:refresh_token:v1";

const SESSION_KEYS: [&str; 3] = [USER_KEY, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY];

pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub loading: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        // loading until initialize() has looked at the store
        Self {
            user: None,
            loading: true,
        }
    }
}

pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            api,
            store,
            navigator,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            state,
        }
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Restores the user persisted by a previous run. A stored user that does
    /// not parse wipes every session key.
    pub fn initialize(&self) {
        let user = match self.store.get(USER_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!(error = %err, "stored session is corrupted, clearing it");
                    self.clear_persisted();
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "could not read stored session");
                None
            }
        };
        if let Some(user) = &user {
            info!(user = user.display_name(), "session restored");
        }
        self.state.send_modify(|s| {
            s.user = user;
            s.loading = false;
        });
    }

    /// Single login attempt. Explicit failures from the server come back
    /// verbatim; a faulted call comes back as [`LoginResult::invalid_credentials`].
    pub async fn login(&self, identifier: &str, secret: &str) -> LoginResult {
        self.set_loading(true);
        let result = match self.api.login(identifier, secret).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "login request failed");
                self.set_loading(false);
                return LoginResult::invalid_credentials();
            }
        };
        if let LoginResult::Success(payload) = &result {
            let user = payload.user.clone();
            self.state.send_modify(|s| s.user = Some(user));
            self.persist(
                &payload.user,
                payload.access_token.as_deref(),
                payload.refresh_token.as_deref(),
            );
            info!(user = payload.user.display_name(), "logged in");
        } else {
            info!("login rejected by server");
        }
        self.set_loading(false);
        result
    }

    pub fn logout(&self) {
        self.state.send_modify(|s| s.user = None);
        self.clear_persisted();
        info!("logged out");
        self.navigator.navigate(&self.login_route);
    }

    pub fn access_token(&self) -> Option<String> {
        self.read_token(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_token(REFRESH_TOKEN_KEY)
    }

    /// Logs out when the backend no longer accepts the session, then hands the
    /// result back unchanged.
    pub fn expire_on_unauthorized<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(ApiError::Unauthorized) = &result {
            warn!("session rejected by server");
            self.logout();
        }
        result
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_modify(|s| s.loading = loading);
    }

    fn read_token(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(err) => {
                warn!(error = %err, key, "could not read token");
                None
            }
        }
    }

    /// Stored keys always mirror the latest login: a token the server did not
    /// return is removed rather than left over from a previous session.
    fn persist(&self, user: &User, access_token: Option<&str>, refresh_token: Option<&str>) {
        match serde_json::to_string(user) {
            Ok(raw) => self.store_value(USER_KEY, &raw),
            Err(err) => {
                warn!(error = %err, "could not serialise user");
                self.remove_value(USER_KEY);
            }
        }
        for (key, token) in [(ACCESS_TOKEN_KEY, access_token), (REFRESH_TOKEN_KEY, refresh_token)] {
            match token {
                Some(token) => self.store_value(key, token),
                None => self.remove_value(key),
            }
        }
    }

    fn store_value(&self, key: &str, value: &str) {
        if let Err(err) = self.store.set(key, value) {
            warn!(error = %err, key, "could not persist session value");
        }
    }

    fn remove_value(&self, key: &str) {
        if let Err(err) = self.store.remove(key) {
            warn!(error = %err, key, "could not remove session value");
        }
    }

    fn clear_persisted(&self) {
        for key in SESSION_KEYS {
            self.remove_value(key);
        }
    }
}
