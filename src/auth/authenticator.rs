// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! SSO login state machine
//!
//! ```text
//! Start -> RequestTokenObtained -> CredentialsSubmitted
//!       -> [MfaRequired -> MfaSubmitted] -> TicketExchanged -> SessionEstablished
//! ```
//!
//! Any step may end in `Failed`. With [`ExchangeStrategy::DirectTicket`] the
//! request token step is skipped and the sign-in response carries a service
//! ticket instead of an OAuth verifier.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::extractor::{require, SsoExtractors};
use super::mfa::MfaPrompter;
use super::oauth1::{OAuth1Signer, TokenCredentials};
use super::session::{expiry_after, Clock, FileSessionStore, Session, SystemClock};
use crate::config::GarminConfig;
use crate::constants::{auth_endpoints, urls};
use crate::error::{DenialReason, GarminError, LoginStep, Result};
use crate::logging::AppLogger;

/// How the sign-in result is turned into OAuth1 credentials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStrategy {
    /// Request token, sign-in yields a verifier, verifier buys an access token
    #[default]
    RequestToken,
    /// Sign-in yields a service ticket, exchanged at the pre-authorized endpoint
    DirectTicket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Start,
    RequestTokenObtained,
    CredentialsSubmitted,
    MfaRequired,
    MfaSubmitted,
    TicketExchanged,
    SessionEstablished,
    Failed(String),
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginState::Start => f.write_str("start"),
            LoginState::RequestTokenObtained => f.write_str("request_token_obtained"),
            LoginState::CredentialsSubmitted => f.write_str("credentials_submitted"),
            LoginState::MfaRequired => f.write_str("mfa_required"),
            LoginState::MfaSubmitted => f.write_str("mfa_submitted"),
            LoginState::TicketExchanged => f.write_str("ticket_exchanged"),
            LoginState::SessionEstablished => f.write_str("session_established"),
            LoginState::Failed(reason) => write!(f, "failed({reason})"),
        }
    }
}

/// A successful login.
///
/// `persist_error` is set when the session could not be written to the
/// configured store; the session itself is still usable.
#[derive(Debug)]
pub struct LoginOutcome {
    pub session: Session,
    pub persist_error: Option<GarminError>,
    /// Every state the flow passed through, from `Start` to `SessionEstablished`
    pub states: Vec<LoginState>,
}

impl LoginOutcome {
    /// Whether the account asked for a second factor
    pub fn used_mfa(&self) -> bool {
        self.states.contains(&LoginState::MfaRequired)
    }
}

/// Exchanges long-lived OAuth1 credentials for a fresh bearer token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh_token(&self, oauth1_token: &str, oauth1_secret: &str) -> Result<String>;
}

struct SsoResponse {
    status: StatusCode,
    body: String,
}

struct RequestToken {
    token: String,
    secret: String,
}

/// What the sign-in (and optional MFA) step produced
enum SignInResult {
    Verifier(String),
    Ticket(String),
}

pub struct Authenticator {
    http: reqwest::Client,
    config: GarminConfig,
    signer: OAuth1Signer,
    extractors: SsoExtractors,
    prompter: Option<Arc<dyn MfaPrompter>>,
    store: Option<FileSessionStore>,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    /// Build an authenticator with its own cookie-keeping HTTP client.
    ///
    /// No prompter and no store are configured; MFA-protected accounts fail
    /// with `MfaUnavailable` until [`Self::with_prompter`] is used.
    pub fn new(config: GarminConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GarminError::transport("HTTP client setup", e))?;
        let extractors = SsoExtractors::with_patterns(&config.extractor_patterns)?;
        let signer = OAuth1Signer::new(config.consumer_key.clone(), config.consumer_secret.clone());

        Ok(Self {
            http,
            config,
            signer,
            extractors,
            prompter: None,
            store: None,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn MfaPrompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    pub fn with_store(mut self, store: FileSessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_extractors(mut self, extractors: SsoExtractors) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &GarminConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&FileSessionStore> {
        self.store.as_ref()
    }

    /// Run the full login flow.
    ///
    /// Steps run strictly in order and are not retried. Every step races
    /// `cancel`; a cancelled login returns [`GarminError::Cancelled`] naming
    /// the step that was interrupted.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<LoginOutcome> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(GarminError::InvalidInput(
                "username and password are required".to_string(),
            ));
        }
        if self.config.consumer_key.is_empty() {
            return Err(GarminError::InvalidInput(
                "OAuth consumer key is not configured".to_string(),
            ));
        }

        let mut states = vec![LoginState::Start];
        match self.run_login(username, password, cancel, &mut states).await {
            Ok(session) => {
                advance(&mut states, LoginState::SessionEstablished);
                AppLogger::log_auth_event(username, "login", true, None);

                let persist_error = self.persist(&session).err();
                Ok(LoginOutcome {
                    session,
                    persist_error,
                    states,
                })
            }
            Err(e) => {
                advance(&mut states, LoginState::Failed(e.to_string()));
                AppLogger::log_auth_event(username, "login", false, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    /// Delete the persisted session, if a store is configured
    pub fn logout(&self) -> Result<()> {
        if let Some(store) = &self.store {
            store.delete()?;
            info!(path = %store.path().display(), "Session removed");
        }
        Ok(())
    }

    async fn run_login(
        &self,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
        states: &mut Vec<LoginState>,
    ) -> Result<Session> {
        let request_token = match self.config.exchange_strategy {
            ExchangeStrategy::RequestToken => {
                let token = cancellable(cancel, LoginStep::RequestToken, self.request_token()).await?;
                advance(states, LoginState::RequestTokenObtained);
                Some(token)
            }
            ExchangeStrategy::DirectTicket => None,
        };

        let signin = cancellable(
            cancel,
            LoginStep::SubmitCredentials,
            self.submit_credentials(username, password, request_token.as_ref()),
        )
        .await?;
        advance(states, LoginState::CredentialsSubmitted);

        let result = if self.mfa_required(&signin) {
            advance(states, LoginState::MfaRequired);
            let mfa_context = require(
                self.extractors.mfa_context.as_ref(),
                &signin.body,
                LoginStep::SubmitCredentials,
                "MFA context",
            )?;
            let code = self.prompt_mfa_code(cancel).await?;
            let response = cancellable(
                cancel,
                LoginStep::SubmitMfa,
                self.submit_mfa(&mfa_context, &code, request_token.as_ref()),
            )
            .await?;
            advance(states, LoginState::MfaSubmitted);
            self.sign_in_result(&response.body, LoginStep::SubmitMfa)?
        } else {
            self.sign_in_result(&signin.body, LoginStep::SubmitCredentials)?
        };

        let (oauth1_token, oauth1_secret) = match (result, request_token) {
            (SignInResult::Verifier(verifier), Some(request_token)) => {
                cancellable(
                    cancel,
                    LoginStep::TicketExchange,
                    self.access_token(&request_token, &verifier),
                )
                .await?
            }
            (SignInResult::Ticket(ticket), _) => {
                cancellable(cancel, LoginStep::TicketExchange, self.preauthorized(&ticket)).await?
            }
            (SignInResult::Verifier(_), None) => {
                return Err(GarminError::protocol(
                    LoginStep::TicketExchange,
                    "verifier received without a request token",
                ));
            }
        };
        advance(states, LoginState::TicketExchanged);

        let oauth2_token = cancellable(
            cancel,
            LoginStep::OAuth2Exchange,
            self.exchange_oauth2(&oauth1_token, &oauth1_secret),
        )
        .await?;

        Ok(Session {
            oauth1_token,
            oauth1_secret,
            oauth2_token,
            expires_at: expiry_after(self.clock.now(), self.config.token_lifetime())?,
        })
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store.save(session).map_err(|e| {
            warn!(path = %store.path().display(), error = %e, "Failed to persist session");
            e
        })
    }

    async fn request_token(&self) -> Result<RequestToken> {
        let step = LoginStep::RequestToken;
        let url = self.endpoint(&self.config.connect_api_url, auth_endpoints::REQUEST_TOKEN)?;
        let authorization =
            self.signer
                .authorization_header("POST", &url, &[], None, &[("oauth_callback", "oob")])?;

        let response = self
            .send(step, self.http.post(url).header("Authorization", authorization))
            .await?;
        check_status(step, response.status)?;

        Ok(RequestToken {
            token: require(
                self.extractors.request_token.as_ref(),
                &response.body,
                step,
                "request token",
            )?,
            secret: require(
                self.extractors.request_secret.as_ref(),
                &response.body,
                step,
                "request token secret",
            )?,
        })
    }

    async fn submit_credentials(
        &self,
        username: &str,
        password: &str,
        request_token: Option<&RequestToken>,
    ) -> Result<SsoResponse> {
        let step = LoginStep::SubmitCredentials;
        let mut url = self.endpoint(&self.config.sso_url, auth_endpoints::SIGNIN)?;
        url.query_pairs_mut()
            .append_pair("service", urls::SIGNIN_SERVICE);

        let mut form = vec![
            ("username", username),
            ("password", password),
            ("embed", "false"),
            ("_eventId", "submit"),
            ("displayName", "Service"),
        ];
        if let Some(request_token) = request_token {
            form.push(("oauth_token", request_token.token.as_str()));
        }

        let response = self.send(step, self.http.post(url).form(&form)).await?;
        // 412 is how the JSON sign-in flavour asks for a second factor
        if response.status != StatusCode::PRECONDITION_FAILED {
            check_status(step, response.status)?;
        }
        Ok(response)
    }

    fn mfa_required(&self, response: &SsoResponse) -> bool {
        response.status == StatusCode::PRECONDITION_FAILED
            || self.extractors.mfa_required.extract(&response.body).is_some()
    }

    async fn prompt_mfa_code(&self, cancel: &CancellationToken) -> Result<String> {
        let Some(prompter) = &self.prompter else {
            return Err(GarminError::denied(DenialReason::MfaUnavailable));
        };

        info!("MFA code required");
        let code = cancellable(cancel, LoginStep::MfaPrompt, prompter.mfa_code(cancel)).await?;
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(GarminError::denied(DenialReason::MfaUnavailable));
        }
        Ok(code)
    }

    async fn submit_mfa(
        &self,
        mfa_context: &str,
        code: &str,
        request_token: Option<&RequestToken>,
    ) -> Result<SsoResponse> {
        let step = LoginStep::SubmitMfa;
        let url = self.endpoint(&self.config.sso_url, auth_endpoints::VERIFY_MFA)?;

        let mut form = vec![
            ("mfaContext", mfa_context),
            ("code", code),
            ("verify", "Verify"),
            ("embed", "false"),
        ];
        if let Some(request_token) = request_token {
            form.push(("oauth_token", request_token.token.as_str()));
        }

        let response = self.send(step, self.http.post(url).form(&form)).await?;

        // A wrong code re-issues the challenge, as a form or as another 412
        if self.mfa_required(&response) {
            return Err(GarminError::denied(DenialReason::MfaCodeRejected));
        }
        check_status(step, response.status)?;
        Ok(response)
    }

    fn sign_in_result(&self, body: &str, step: LoginStep) -> Result<SignInResult> {
        match self.config.exchange_strategy {
            ExchangeStrategy::RequestToken => Ok(SignInResult::Verifier(require(
                self.extractors.verifier.as_ref(),
                body,
                step,
                "OAuth verifier",
            )?)),
            ExchangeStrategy::DirectTicket => Ok(SignInResult::Ticket(require(
                self.extractors.ticket.as_ref(),
                body,
                step,
                "service ticket",
            )?)),
        }
    }

    async fn access_token(
        &self,
        request_token: &RequestToken,
        verifier: &str,
    ) -> Result<(String, String)> {
        let step = LoginStep::TicketExchange;
        let url = self.endpoint(&self.config.connect_api_url, auth_endpoints::ACCESS_TOKEN)?;
        let authorization = self.signer.authorization_header(
            "POST",
            &url,
            &[],
            Some(TokenCredentials {
                token: &request_token.token,
                secret: &request_token.secret,
            }),
            &[("oauth_verifier", verifier)],
        )?;

        let response = self
            .send(step, self.http.post(url).header("Authorization", authorization))
            .await?;
        check_status(step, response.status)?;
        self.oauth1_pair(&response.body, step)
    }

    async fn preauthorized(&self, ticket: &str) -> Result<(String, String)> {
        let step = LoginStep::TicketExchange;
        let mut url = self.endpoint(&self.config.connect_api_url, auth_endpoints::PREAUTHORIZED)?;
        url.query_pairs_mut()
            .append_pair("ticket", ticket)
            .append_pair("accepts-mfa-tokens", "true");
        let authorization = self
            .signer
            .authorization_header("GET", &url, &[], None, &[])?;

        let response = self
            .send(step, self.http.get(url).header("Authorization", authorization))
            .await?;
        check_status(step, response.status)?;
        self.oauth1_pair(&response.body, step)
    }

    fn oauth1_pair(&self, body: &str, step: LoginStep) -> Result<(String, String)> {
        let token = require(self.extractors.access_token.as_ref(), body, step, "OAuth1 token")?;
        let secret = require(
            self.extractors.access_secret.as_ref(),
            body,
            step,
            "OAuth1 token secret",
        )?;
        Ok((token, secret))
    }

    async fn exchange_oauth2(&self, oauth1_token: &str, oauth1_secret: &str) -> Result<String> {
        let step = LoginStep::OAuth2Exchange;
        let url = self.endpoint(&self.config.connect_api_url, auth_endpoints::OAUTH2_EXCHANGE)?;
        let authorization = self.signer.authorization_header(
            "POST",
            &url,
            &[],
            Some(TokenCredentials {
                token: oauth1_token,
                secret: oauth1_secret,
            }),
            &[],
        )?;

        let response = self
            .send(step, self.http.post(url).header("Authorization", authorization))
            .await?;
        check_status(step, response.status)?;
        require(
            self.extractors.oauth2_token.as_ref(),
            &response.body,
            step,
            "OAuth2 access token",
        )
    }

    async fn send(&self, step: LoginStep, request: reqwest::RequestBuilder) -> Result<SsoResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| GarminError::transport(step.to_string(), e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GarminError::transport(step.to_string(), e))?;

        if self.config.debug_logging {
            debug!(step = %step, status = %status, body = %body, "SSO response");
        } else {
            debug!(step = %step, status = %status, "SSO response");
        }
        Ok(SsoResponse { status, body })
    }

    fn endpoint(&self, base: &str, path: &str) -> Result<Url> {
        let raw = format!("{}{}", base.trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| GarminError::InvalidInput(format!("invalid URL {raw}: {e}")))
    }
}

#[async_trait]
impl TokenRefresher for Authenticator {
    async fn refresh_token(&self, oauth1_token: &str, oauth1_secret: &str) -> Result<String> {
        let result = self.exchange_oauth2(oauth1_token, oauth1_secret).await;
        if let Err(e) = &result {
            warn!(error = %e, "OAuth2 token refresh failed");
        }
        result
    }
}

fn advance(states: &mut Vec<LoginState>, next: LoginState) {
    if let Some(current) = states.last() {
        debug!(from = %current, to = %next, "Login state transition");
    }
    states.push(next);
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    step: LoginStep,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GarminError::Cancelled { step }),
        result = future => result,
    }
}

/// Map a non-success status to the error the caller can act on
fn check_status(step: LoginStep, status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status.is_server_error() {
        return Err(GarminError::ServiceUnavailable {
            context: step.to_string(),
            status: status.as_u16(),
        });
    }

    let rejected = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
    match (step, rejected) {
        (LoginStep::SubmitCredentials, true) => {
            Err(GarminError::denied(DenialReason::InvalidCredentials))
        }
        (LoginStep::SubmitMfa, true) => Err(GarminError::denied(DenialReason::MfaCodeRejected)),
        (LoginStep::OAuth2Exchange, true) => {
            Err(GarminError::denied(DenialReason::RefreshRejected))
        }
        _ => Err(GarminError::protocol(
            step,
            format!("unexpected HTTP status {status}"),
        )),
    }
}
