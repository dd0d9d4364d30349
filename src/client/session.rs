//! Client-side session state.
//!
//! A [`SessionContext`] is created by the front end and handed to the
//! [`ApiClient`](super::ApiClient); UIs subscribe to it to learn when to show
//! the login view. State lives in a `watch` channel so readers always see a
//! consistent snapshot and are woken on every change.

use std::sync::Arc;

use tokio::sync::watch;

/// What the UI should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Restoring the session on startup; hold protected requests.
    Loading,
    Authenticated,
    /// Show the login view, with `notice` if the logout was forced.
    LoggedOut { notice: Option<String> },
}

/// Snapshot of the session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub access_token: Option<String>,
    pub is_auth_loading: bool,
    pub is_refreshing: bool,
    /// Bumped on login and logout. Async work started under an older
    /// generation must not touch the session.
    pub generation: u64,
    pub status: SessionStatus,
}

/// Shared, injectable session handle. Cloning is cheap.
#[derive(Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// A fresh session in the `Loading` state. Protected requests wait until
    /// bootstrap, login or logout settles it.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState {
            access_token: None,
            is_auth_loading: true,
            is_refreshing: false,
            generation: 0,
            status: SessionStatus::Loading,
        });
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn is_auth_loading(&self) -> bool {
        self.state.borrow().is_auth_loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.borrow().is_refreshing
    }

    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Wait until the session is no longer loading.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|s| !s.is_auth_loading).await;
    }

    /// Enter `Loading` for a bootstrap attempt and return its generation.
    pub(crate) fn begin_bootstrap(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.is_auth_loading = true;
            s.status = SessionStatus::Loading;
            generation = s.generation;
        });
        generation
    }

    /// Mark an existing token as ready without touching the network.
    pub(crate) fn finish_loading(&self) {
        self.state.send_if_modified(|s| {
            if !s.is_auth_loading {
                return false;
            }
            s.is_auth_loading = false;
            if s.access_token.is_some() {
                s.status = SessionStatus::Authenticated;
            }
            true
        });
    }

    /// Store a token obtained by login. Starts a new generation.
    pub(crate) fn set_authenticated(&self, token: String) {
        self.state.send_modify(|s| {
            s.generation += 1;
            s.access_token = Some(token);
            s.is_auth_loading = false;
            s.is_refreshing = false;
            s.status = SessionStatus::Authenticated;
        });
    }

    /// Store a refreshed token if no login or logout happened since
    /// `generation` was read. Returns whether it was applied.
    pub(crate) fn apply_refreshed(&self, generation: u64, token: &str) -> bool {
        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.access_token = Some(token.to_string());
            s.is_auth_loading = false;
            s.status = SessionStatus::Authenticated;
            true
        })
    }

    /// Drop the token and show the login view. Starts a new generation so
    /// late results of earlier work are ignored.
    pub fn force_logout(&self, notice: Option<String>) {
        self.state.send_modify(|s| logout(s, notice));
    }

    /// [`force_logout`](Self::force_logout), unless a login or logout already
    /// happened since `generation` was read. Returns whether it was applied.
    pub(crate) fn force_logout_if_current(&self, generation: u64, notice: Option<String>) -> bool {
        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            logout(s, notice);
            true
        })
    }

    /// Flag a refresh started under `generation` as running or settled.
    /// Ignored once a login or logout has moved the session on.
    pub(crate) fn set_refreshing_if_current(&self, generation: u64, refreshing: bool) {
        self.state.send_if_modified(|s| {
            if s.generation != generation || s.is_refreshing == refreshing {
                return false;
            }
            s.is_refreshing = refreshing;
            true
        });
    }
}

fn logout(s: &mut SessionState, notice: Option<String>) {
    s.generation += 1;
    s.access_token = None;
    s.is_auth_loading = false;
    s.is_refreshing = false;
    s.status = SessionStatus::LoggedOut { notice };
}
