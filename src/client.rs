// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Authenticated Garmin Connect client
//!
//! Holds one session and refreshes it lazily: a call that finds the bearer
//! token expired refreshes it once, under the session lock, before sending
//! anything. Concurrent callers wait for that refresh instead of starting
//! their own.

use std::sync::Arc;
use std::time::Instant;

use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::session::expiry_after;
use crate::auth::{Clock, FileSessionStore, Session, SystemClock, TokenRefresher};
use crate::config::GarminConfig;
use crate::error::{DenialReason, GarminError, Result};
use crate::logging::AppLogger;

/// Where a fresh bearer token comes from once the current one expires
#[derive(Clone)]
pub enum RefreshSource {
    /// Re-read the session file, for processes that share a session another
    /// process keeps fresh
    ReloadFromStore(FileSessionStore),
    /// Exchange the session's OAuth1 credentials for a new OAuth2 token
    Exchange(Arc<dyn TokenRefresher>),
}

pub struct GarminClient {
    http: reqwest::Client,
    base_url: String,
    session: Mutex<Option<Session>>,
    refresh: Option<RefreshSource>,
    store: Option<FileSessionStore>,
    clock: Arc<dyn Clock>,
    token_lifetime: chrono::TimeDelta,
}

impl GarminClient {
    pub fn new(config: &GarminConfig, session: Option<Session>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GarminError::transport("HTTP client setup", e))?;

        Ok(Self {
            http,
            base_url: config.connect_api_url.trim_end_matches('/').to_string(),
            session: Mutex::new(session),
            refresh: None,
            store: None,
            clock: Arc::new(SystemClock),
            token_lifetime: config.token_lifetime(),
        })
    }

    /// Client for the session persisted in `store`, which is also where
    /// refreshed sessions are written back
    pub fn from_store(config: &GarminConfig, store: FileSessionStore) -> Result<Self> {
        let session = store.load()?;
        Ok(Self::new(config, session)?.with_store(store))
    }

    pub fn with_refresh_source(mut self, source: RefreshSource) -> Self {
        self.refresh = Some(source);
        self
    }

    pub fn with_refresher(self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.with_refresh_source(RefreshSource::Exchange(refresher))
    }

    /// Persist sessions obtained by refresh to `store`
    pub fn with_store(mut self, store: FileSessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Snapshot of the held session
    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    pub async fn set_session(&self, session: Session) {
        *self.session.lock().await = Some(session);
    }

    pub async fn clear_session(&self) {
        *self.session.lock().await = None;
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .send(Method::GET, path, |request| {
                request.header(ACCEPT, "application/json").query(query)
            })
            .await?;
        decode(path, response).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::POST, path, |request| {
                request.header(ACCEPT, "application/json").json(body)
            })
            .await?;
        decode(path, response).await
    }

    /// Raw response body, for file downloads
    pub async fn get_bytes(&self, path: &str, accept: &str) -> Result<Vec<u8>> {
        let response = self
            .send(Method::GET, path, |request| request.header(ACCEPT, accept))
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GarminError::transport(format!("GET {path}"), e))?;
        Ok(bytes.to_vec())
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let response = self
            .send(Method::POST, path, |request| {
                request.header(ACCEPT, "application/json").multipart(form)
            })
            .await?;
        decode(path, response).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        customize: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response> {
        let token = self.bearer_token().await?;
        let url = format!("{}{}", self.base_url, path);
        let context = format!("{method} {path}");

        let started = Instant::now();
        let request = customize(
            self.http
                .request(method.clone(), url.as_str())
                .bearer_auth(token),
        );
        let response = request
            .send()
            .await
            .map_err(|e| GarminError::transport(context.clone(), e))?;
        let status = response.status();
        AppLogger::log_api_request(
            method.as_str(),
            path,
            status.as_u16(),
            started.elapsed().as_millis() as u64,
        );

        if status == StatusCode::UNAUTHORIZED {
            self.clear_session().await;
            warn!(path = %path, "Bearer token rejected, session cleared");
            return Err(GarminError::reauthenticate(format!(
                "{context} was rejected with 401 Unauthorized"
            )));
        }
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(path = %path, error = %e, "Failed to read error response body");
                    String::new()
                }
            };
            return Err(api_error(status, &body));
        }
        Ok(response)
    }

    /// The current bearer token, refreshed first if it has expired
    async fn bearer_token(&self) -> Result<String> {
        let mut guard = self.session.lock().await;
        let session = match guard.as_ref() {
            Some(session) if session.is_complete() => session,
            _ => return Err(GarminError::reauthenticate("no session; log in first")),
        };

        let now = self.clock.now();
        if !session.is_expired_at(now) {
            return Ok(session.oauth2_token.clone());
        }

        debug!(expires_at = %session.expires_at, "Session expired, refreshing");
        let refreshed = self.refresh(session).await?;
        let token = refreshed.oauth2_token.clone();
        *guard = Some(refreshed);
        Ok(token)
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        match &self.refresh {
            None => Err(GarminError::reauthenticate(
                "session expired and no refresh source is configured",
            )),
            Some(RefreshSource::ReloadFromStore(store)) => {
                let reloaded = store.load().map_err(|e| {
                    GarminError::reauthenticate(format!("could not reload session: {e}"))
                })?;
                match reloaded {
                    Some(stored) if stored.is_valid_at(self.clock.now()) => {
                        info!(path = %store.path().display(), "Reloaded session from store");
                        Ok(stored)
                    }
                    _ => Err(GarminError::reauthenticate("stored session has expired")),
                }
            }
            Some(RefreshSource::Exchange(refresher)) => {
                let token = match refresher
                    .refresh_token(&session.oauth1_token, &session.oauth1_secret)
                    .await
                {
                    Ok(token) => token,
                    Err(e) => {
                        AppLogger::log_auth_event("session", "refresh", false, Some(&e.to_string()));
                        return Err(if e.is_authentication_denied() {
                            GarminError::denied(DenialReason::RefreshRejected)
                        } else {
                            GarminError::reauthenticate(format!("token refresh failed: {e}"))
                        });
                    }
                };

                let expires_at = expiry_after(self.clock.now(), self.token_lifetime)?;
                let refreshed = session.refreshed(token, expires_at);
                AppLogger::log_auth_event("session", "refresh", true, None);
                if let Some(store) = &self.store {
                    if let Err(e) = store.save(&refreshed) {
                        warn!(path = %store.path().display(), error = %e, "Failed to persist refreshed session");
                    }
                }
                Ok(refreshed)
            }
        }
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| GarminError::transport(format!("reading {path}"), e))?;
    // Some endpoints answer 204 or an empty 200
    let text = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(text).map_err(|source| GarminError::ResponseParsing {
        path: path.to_string(),
        source,
    })
}

/// Build an API error from the `{code, message}` or `{error}` envelope, or
/// from the status line when the body has neither
fn api_error(status: StatusCode, body: &str) -> GarminError {
    let envelope = serde_json::from_str::<Value>(body).ok();
    let field = |name: &str| envelope.as_ref().and_then(|v| v.get(name));

    let code = field("code").and_then(Value::as_i64).filter(|code| *code != 0);
    let message = field("message")
        .or_else(|| field("error"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let reason = status.canonical_reason().unwrap_or("unexpected status");
            let body = body.trim();
            if body.is_empty() || envelope.is_some() {
                reason.to_string()
            } else {
                let excerpt: String = body.chars().take(200).collect();
                format!("{reason}: {excerpt}")
            }
        });

    GarminError::Api {
        status: status.as_u16(),
        code,
        message,
    }
}
