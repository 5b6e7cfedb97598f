//! Single-flight token refresh
//!
//! [`RefreshCoordinator`] is the only component that moves the refresh state
//! between idle and refreshing. The first authentication failure starts one
//! refresh as its own task; every failure observed while it runs awaits that
//! same outcome. The refresh is a spawned task, so dropping a waiter never
//! cancels it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::auth_client::{missing_refresh_token, TokenRefresher};
use crate::endpoint::is_refresh_endpoint;
use crate::error::{ApiError, ErrorDetails, Result};
use crate::token_store::TokenStore;
use crate::types::RequestDescriptor;

/// Callback fired when a refresh fails and the session is cleared
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

type SharedRefresh = Shared<BoxFuture<'static, Result<()>>>;

enum RefreshState {
    Idle,
    Refreshing { id: u64, outcome: SharedRefresh },
}

pub struct RefreshCoordinator<R: TokenRefresher> {
    refresher: Arc<R>,
    tokens: TokenStore,
    refresh_path: String,
    state: Arc<Mutex<RefreshState>>,
    next_id: AtomicU64,
    on_session_expired: Arc<RwLock<Option<SessionExpiredHook>>>,
}

impl<R: TokenRefresher> RefreshCoordinator<R> {
    pub fn new(refresher: Arc<R>, tokens: TokenStore, refresh_path: impl Into<String>) -> Self {
        Self {
            refresher,
            tokens,
            refresh_path: refresh_path.into(),
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            next_id: AtomicU64::new(1),
            on_session_expired: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set_session_expired_hook(&self, hook: SessionExpiredHook) {
        *self.on_session_expired.write() = Some(hook);
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Decide what happens to a request that failed with `error`.
    ///
    /// Returns the descriptor to replay once, or the error the caller should
    /// see. Only authentication failures on first attempts that carry a
    /// refresh token can produce a replay.
    pub async fn recover(&self, request: &RequestDescriptor, error: ApiError) -> Result<RequestDescriptor> {
        if !error.is_authentication() {
            return Err(error);
        }
        if request.retry_count >= 1 {
            debug!(url = %request.url, retry_count = request.retry_count, "Replay rejected again, giving up");
            return Err(error);
        }
        if !request.requires_auth || is_refresh_endpoint(&request.url, &self.refresh_path) {
            return Err(error);
        }

        let outcome = {
            let mut state = self.state.lock();
            let in_flight = match &*state {
                RefreshState::Refreshing { outcome, .. } => Some(outcome.clone()),
                RefreshState::Idle => None,
            };
            match in_flight {
                Some(outcome) => {
                    debug!(url = %request.url, "Waiting on in-flight token refresh");
                    outcome
                }
                None => {
                    if self.credentials_rotated(request) {
                        debug!(url = %request.url, "Credentials already rotated, replaying");
                        return Ok(request.for_replay());
                    }
                    let Some(refresh_token) = self.tokens.refresh_token() else {
                        warn!(url = %request.url, "Authentication failed with no refresh token available");
                        return Err(with_response_data(missing_refresh_token(), &error));
                    };
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let outcome = self.start_refresh(id, refresh_token);
                    *state = RefreshState::Refreshing {
                        id,
                        outcome: outcome.clone(),
                    };
                    outcome
                }
            }
        };

        outcome.await?;
        Ok(request.for_replay())
    }

    /// A completed refresh already replaced the token this request carried
    fn credentials_rotated(&self, request: &RequestDescriptor) -> bool {
        if !self.tokens.is_valid() {
            return false;
        }
        match self.tokens.access_token() {
            Some(current) => request.bearer_token() != Some(current.as_str()),
            None => false,
        }
    }

    fn start_refresh(&self, id: u64, refresh_token: String) -> SharedRefresh {
        info!(refresh_id = id, "Starting token refresh");

        let refresher = Arc::clone(&self.refresher);
        let tokens = self.tokens.clone();
        let state = Arc::clone(&self.state);
        let session_hook = Arc::clone(&self.on_session_expired);

        let task = {
            let tokens = tokens.clone();
            let session_hook = Arc::clone(&session_hook);
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let outcome = match refresher.refresh(&refresh_token).await {
                    Ok(new_tokens) => {
                        tokens.store_refreshed(&new_tokens);
                        Ok(())
                    }
                    Err(e) => {
                        error!(refresh_id = id, error = %e, "Token refresh failed, clearing session");
                        end_session(&tokens, &session_hook);
                        Err(refresh_failed(e.to_string()))
                    }
                };
                settle(&state, id);
                outcome
            })
        };

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(refresh_id = id, error = %e, "Token refresh task aborted, clearing session");
                    end_session(&tokens, &session_hook);
                    settle(&state, id);
                    Err(refresh_failed(e.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Return to idle unless a newer refresh already took over
fn settle(state: &Mutex<RefreshState>, id: u64) {
    let mut state = state.lock();
    if matches!(&*state, RefreshState::Refreshing { id: current, .. } if *current == id) {
        *state = RefreshState::Idle;
    }
}

fn end_session(tokens: &TokenStore, hook: &RwLock<Option<SessionExpiredHook>>) {
    tokens.clear_all();
    let hook = hook.read().clone();
    if let Some(hook) = hook {
        hook();
    }
}

fn refresh_failed(original: String) -> ApiError {
    ApiError::authentication(
        ErrorDetails::new("Authentication failed - token refresh error").with_original(original),
    )
}

fn with_response_data(terminal: ApiError, cause: &ApiError) -> ApiError {
    match terminal {
        ApiError::Authentication(details) => ApiError::Authentication(ErrorDetails {
            data: cause.details().data.clone(),
            ..details
        }),
        other => other,
    }
}
