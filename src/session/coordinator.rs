use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::envelope::{ApiResponse, RequestEnvelope};
use super::error::{Result, SessionError};
use super::transport::HttpTransport;
use crate::config::ApiConfig;
use crate::models::claims::{decode_claims, Claims, SessionStatus};
use crate::models::credentials::{
    CredentialPair, LoginRequest, RefreshRequest, RefreshResponse, TokenResponse,
};
use crate::store::{TokenStore, ACCESS_KEY, REFRESH_KEY};

/// What every request queued behind a refresh is eventually told:
/// the new access token, or why there is none.
type RefreshOutcome = Result<String>;

/// Mutable session state. Only ever touched with the mutex held, and the
/// mutex is never held across an `.await`.
struct SessionState {
    credentials: Option<CredentialPair>,
    refreshing: bool,
    pending: VecDeque<oneshot::Sender<RefreshOutcome>>,
    /// Bumped on every login/logout so a refresh that settles late cannot
    /// write into a session that has since been replaced.
    generation: u64,
}

/// How a request that hit 401/403 gets its next token.
enum Ticket {
    /// A newer token than the one the request carried is already current.
    Ready(String),
    /// Another request is refreshing; wait for its outcome.
    Wait(oneshot::Receiver<RefreshOutcome>),
    /// This request performs the refresh.
    Lead {
        refresh: Option<String>,
        generation: u64,
    },
    /// Nobody is signed in.
    Expired,
}

impl SessionState {
    /// Observe-and-set in one synchronous step: of all the requests that see
    /// the same stale token, exactly one becomes the leader.
    fn ticket(&mut self, stale: Option<&str>) -> Ticket {
        let pair = match &self.credentials {
            None => return Ticket::Expired,
            Some(pair) => pair,
        };
        if stale != Some(pair.access.as_str()) {
            return Ticket::Ready(pair.access.clone());
        }
        if self.refreshing {
            let (tx, rx) = oneshot::channel();
            self.pending.push_back(tx);
            return Ticket::Wait(rx);
        }
        self.refreshing = true;
        Ticket::Lead {
            refresh: pair.refresh.clone(),
            generation: self.generation,
        }
    }
}

fn release(waiters: VecDeque<oneshot::Sender<RefreshOutcome>>, outcome: &RefreshOutcome) {
    // FIFO; a waiter that went away simply misses the message.
    for tx in waiters {
        let _ = tx.send(outcome.clone());
    }
}

/// Owns the credential pair and performs authorized requests on behalf of
/// the rest of the application.
///
/// Construct once at startup and share it (`Arc<SessionCoordinator>`) with
/// every component that talks to the backend.
pub struct SessionCoordinator {
    transport: HttpTransport,
    store: Arc<dyn TokenStore>,
    token_path: String,
    refresh_path: String,
    state: Mutex<SessionState>,
}

impl SessionCoordinator {
    /// Creates the coordinator and restores whatever credentials the store holds.
    pub fn new(config: &ApiConfig, store: Arc<dyn TokenStore>) -> Self {
        let credentials = store
            .get(ACCESS_KEY)
            .map(|access| CredentialPair::new(access, store.get(REFRESH_KEY)));
        if credentials.is_some() {
            info!(
                durable = store.is_durable(),
                "Restored credentials from token store"
            );
        }

        Self {
            transport: HttpTransport::new(config),
            store,
            token_path: config.token_path.clone(),
            refresh_path: config.refresh_path.clone(),
            state: Mutex::new(SessionState {
                credentials,
                refreshing: false,
                pending: VecDeque::new(),
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state mutex poisoned")
    }

    /// Write-through of the credential pair. Failures are logged; the
    /// in-memory session stays authoritative for this process.
    ///
    /// Called with the state mutex held so the store sees changes in the same
    /// order as memory. A file store blocks the calling task for one small
    /// write, which is fine for a CLI-sized session.
    fn persist(&self, credentials: Option<&CredentialPair>) {
        let result = match credentials {
            Some(pair) => self.store.set(ACCESS_KEY, &pair.access).and_then(|_| {
                match &pair.refresh {
                    Some(refresh) => self.store.set(REFRESH_KEY, refresh),
                    None => self.store.remove(REFRESH_KEY),
                }
            }),
            None => self
                .store
                .remove(ACCESS_KEY)
                .and_then(|_| self.store.remove(REFRESH_KEY)),
        };
        if let Err(e) = result {
            warn!("Failed to persist credentials: {}", e);
        }
    }

    /// Exchange username and password for a token pair and make it current.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Claims> {
        let envelope =
            RequestEnvelope::post(&self.token_path).json(&LoginRequest { username, password })?;
        let response = self.transport.send(&envelope, None).await?;
        if !response.status.is_success() {
            warn!(
                event_name = "session.login.rejected",
                event_domain = "session",
                username,
                status = response.status.as_u16(),
                "Login rejected by backend"
            );
            return Err(SessionError::InvalidCredentials);
        }

        let tokens: TokenResponse = response.json()?;
        let claims = decode_claims(&tokens.access).map_err(SessionError::MalformedResponse)?;

        let waiters = {
            let mut state = self.lock();
            state.generation += 1;
            state.refreshing = false;
            state.credentials = Some(CredentialPair::new(tokens.access, Some(tokens.refresh)));
            self.persist(state.credentials.as_ref());
            std::mem::take(&mut state.pending)
        };
        // Anything still queued belongs to the previous session.
        release(waiters, &Err(SessionError::SessionExpired));

        info!(
            event_name = "session.login.succeeded",
            event_domain = "session",
            username,
            role = ?claims.role(),
            "Signed in"
        );
        Ok(claims)
    }

    /// Drop the credential pair and everything waiting on it. Safe to call
    /// when nobody is signed in.
    pub fn deauthenticate(&self) {
        let waiters = {
            let mut state = self.lock();
            let was_signed_in = state.credentials.is_some();
            state.generation += 1;
            state.refreshing = false;
            state.credentials = None;
            self.persist(None);
            if was_signed_in {
                info!(
                    event_name = "session.logout",
                    event_domain = "session",
                    "Signed out"
                );
            }
            std::mem::take(&mut state.pending)
        };
        release(waiters, &Err(SessionError::SessionExpired));
    }

    /// The bearer token the next request would carry.
    pub fn access_token(&self) -> Option<String> {
        self.lock().credentials.as_ref().map(|pair| pair.access.clone())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.lock()
            .credentials
            .as_ref()
            .is_some_and(|pair| pair.refresh.is_some())
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Synchronous view of the session for the UI.
    ///
    /// An expired access token still counts as signed in while a refresh token
    /// is around: the next request will refresh it.
    pub fn current_session(&self) -> SessionStatus {
        let state = self.lock();
        let pair = match &state.credentials {
            Some(pair) => pair,
            None => return SessionStatus::anonymous(),
        };
        match decode_claims(&pair.access) {
            Ok(claims) if claims.is_expired() && pair.refresh.is_none() => {
                SessionStatus::anonymous()
            }
            Ok(claims) => SessionStatus::signed_in(claims.role()),
            Err(e) => {
                debug!("Stored access token is unreadable: {}", e);
                SessionStatus::anonymous()
            }
        }
    }

    /// Send a request with the current credentials. On 401/403 the token is
    /// refreshed (once, shared with every other request failing at the same
    /// time) and the request is replayed a single time.
    pub async fn dispatch(&self, mut envelope: RequestEnvelope) -> Result<ApiResponse> {
        let sent_with = self.access_token();
        let response = self.transport.send(&envelope, sent_with.as_deref()).await?;
        if !response.is_auth_failure() {
            return response.error_for_status();
        }

        if envelope.is_retried() {
            warn!(
                request_id = %envelope.id,
                status = response.status.as_u16(),
                "Authorization failed on an already retried request"
            );
            return Err(SessionError::SessionExpired);
        }
        envelope.mark_retried();

        let token = self.fresh_token(sent_with.as_deref()).await?;
        debug!(request_id = %envelope.id, "Replaying request with refreshed token");
        let response = self.transport.send(&envelope, Some(&token)).await?;
        if response.is_auth_failure() {
            warn!(
                request_id = %envelope.id,
                status = response.status.as_u16(),
                "Authorization failed again after refresh"
            );
            return Err(SessionError::SessionExpired);
        }
        response.error_for_status()
    }

    /// Get a token newer than `stale`, refreshing if nobody else is.
    async fn fresh_token(&self, stale: Option<&str>) -> Result<String> {
        let ticket = self.lock().ticket(stale);
        match ticket {
            Ticket::Expired => Err(SessionError::SessionExpired),
            Ticket::Ready(token) => Ok(token),
            Ticket::Wait(rx) => {
                debug!("Refresh already in flight, queued behind it");
                rx.await.unwrap_or_else(|_| {
                    Err(SessionError::NetworkUnavailable(
                        "token refresh was abandoned".to_string(),
                    ))
                })
            }
            Ticket::Lead {
                refresh,
                generation,
            } => {
                let mut guard = LeaderGuard {
                    coordinator: self,
                    generation,
                    armed: true,
                };
                let outcome = match refresh {
                    Some(refresh) => self.request_refresh(&refresh).await,
                    None => Err(SessionError::SessionExpired),
                };
                guard.armed = false;
                self.settle(generation, outcome)
            }
        }
    }

    async fn request_refresh(&self, refresh: &str) -> Result<RefreshResponse> {
        info!(
            event_name = "session.refresh.started",
            event_domain = "session",
            "Refreshing access token"
        );
        let envelope = RequestEnvelope::post(&self.refresh_path).json(&RefreshRequest { refresh })?;
        let response = self.transport.send(&envelope, None).await?;
        response.error_for_status()?.json()
    }

    /// Apply the refresh outcome once and hand the same answer to every waiter.
    fn settle(&self, generation: u64, outcome: Result<RefreshResponse>) -> RefreshOutcome {
        let (waiters, result) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if state.generation != generation {
                debug!("Session changed while refreshing, discarding refresh outcome");
                return Err(SessionError::SessionExpired);
            }
            state.refreshing = false;

            let result = match (outcome, state.credentials.as_mut()) {
                (Ok(tokens), Some(pair)) => {
                    pair.access = tokens.access;
                    if let Some(rotated) = tokens.refresh {
                        pair.refresh = Some(rotated);
                    }
                    info!(
                        event_name = "session.refresh.succeeded",
                        event_domain = "session",
                        waiters = state.pending.len(),
                        "Access token refreshed"
                    );
                    Ok(pair.access.clone())
                }
                (Ok(_), None) => Err(SessionError::SessionExpired),
                // No answer from the backend says nothing about the refresh
                // token; the pair stays for a later attempt.
                (Err(SessionError::NetworkUnavailable(reason)), _) => {
                    warn!(
                        event_name = "session.refresh.unreachable",
                        event_domain = "session",
                        waiters = state.pending.len(),
                        "Token refresh got no answer, keeping session: {}",
                        reason
                    );
                    Err(SessionError::NetworkUnavailable(reason))
                }
                (Err(e), _) => {
                    warn!(
                        event_name = "session.refresh.failed",
                        event_domain = "session",
                        waiters = state.pending.len(),
                        "Token refresh failed, clearing session: {}",
                        e
                    );
                    Err(SessionError::SessionExpired)
                }
            };
            match &result {
                Ok(_) => self.persist(state.credentials.as_ref()),
                Err(SessionError::NetworkUnavailable(_)) => {}
                Err(_) => {
                    state.credentials = None;
                    self.persist(None);
                }
            }
            (std::mem::take(&mut state.pending), result)
        };

        release(waiters, &result);
        result
    }

    /// Called when the leading request is dropped before its refresh settled.
    fn abandon_refresh(&self, generation: u64) {
        let waiters = {
            let mut state = self.lock();
            if state.generation != generation || !state.refreshing {
                return;
            }
            state.refreshing = false;
            std::mem::take(&mut state.pending)
        };
        warn!(
            waiters = waiters.len(),
            "Token refresh cancelled before it settled"
        );
        release(
            waiters,
            &Err(SessionError::NetworkUnavailable(
                "token refresh was cancelled".to_string(),
            )),
        );
    }
}

/// Makes sure a cancelled leader does not leave the flag set and its
/// followers waiting forever.
struct LeaderGuard<'a> {
    coordinator: &'a SessionCoordinator,
    generation: u64,
    armed: bool,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.abandon_refresh(self.generation);
        }
    }
}
