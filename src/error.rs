// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error taxonomy shared by the authenticator, the client and the REST wrappers

use std::fmt;
use std::path::PathBuf;

use crate::fit::FitError;

/// Login steps, used to say where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    RequestToken,
    SubmitCredentials,
    MfaPrompt,
    SubmitMfa,
    TicketExchange,
    OAuth2Exchange,
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginStep::RequestToken => "request token",
            LoginStep::SubmitCredentials => "credential submission",
            LoginStep::MfaPrompt => "MFA prompt",
            LoginStep::SubmitMfa => "MFA submission",
            LoginStep::TicketExchange => "ticket exchange",
            LoginStep::OAuth2Exchange => "OAuth2 exchange",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    InvalidCredentials,
    MfaCodeRejected,
    /// MFA was required but no prompter was configured or it returned nothing
    MfaUnavailable,
    /// The provider refused to exchange stored OAuth1 credentials
    RefreshRejected,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DenialReason::InvalidCredentials => "invalid username or password",
            DenialReason::MfaCodeRejected => "MFA code rejected",
            DenialReason::MfaUnavailable => "MFA required but no code available",
            DenialReason::RefreshRejected => "stored credentials rejected during refresh",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GarminError {
    #[error("Network error during {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Garmin service unavailable during {context} (HTTP {status})")]
    ServiceUnavailable { context: String, status: u16 },

    #[error("Unexpected response during {step}: {message}")]
    Protocol { step: LoginStep, message: String },

    #[error("Authentication denied: {reason}")]
    AuthenticationDenied { reason: DenialReason },

    #[error("Session expired, reauthentication required: {reason}")]
    ReauthenticationRequired { reason: String },

    #[error("Cancelled during {step}")]
    Cancelled { step: LoginStep },

    #[error("API error {status}{}: {message}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Failed to parse response from {path}: {source}")]
    ResponseParsing {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Session store error at {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("FIT error: {0}")]
    Fit(#[from] FitError),
}

pub type Result<T> = std::result::Result<T, GarminError>;

impl GarminError {
    pub(crate) fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        GarminError::Transport {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn protocol(step: LoginStep, message: impl Into<String>) -> Self {
        GarminError::Protocol {
            step,
            message: message.into(),
        }
    }

    pub(crate) fn denied(reason: DenialReason) -> Self {
        GarminError::AuthenticationDenied { reason }
    }

    pub(crate) fn not_found(resource: impl Into<String>) -> Self {
        GarminError::NotFound {
            resource: resource.into(),
        }
    }

    pub(crate) fn reauthenticate(reason: impl Into<String>) -> Self {
        GarminError::ReauthenticationRequired {
            reason: reason.into(),
        }
    }

    /// Whether repeating the same call unchanged may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            GarminError::Transport { .. } | GarminError::ServiceUnavailable { .. } => true,
            GarminError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn is_authentication_denied(&self) -> bool {
        matches!(self, GarminError::AuthenticationDenied { .. })
    }

    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, GarminError::ReauthenticationRequired { .. })
    }

    /// One-line advice for people running the CLI
    pub fn user_hint(&self) -> &'static str {
        match self {
            GarminError::Transport { .. } | GarminError::ServiceUnavailable { .. } => {
                "Network problem talking to Garmin Connect. Check your connection and try again."
            }
            GarminError::Protocol { .. } => {
                "Garmin Connect answered in an unexpected format. The login flow may have changed; \
                 retrying will not help until the client is updated."
            }
            GarminError::AuthenticationDenied {
                reason: DenialReason::MfaCodeRejected,
            } => "The MFA code was not accepted. Request a new code and log in again.",
            GarminError::AuthenticationDenied {
                reason: DenialReason::MfaUnavailable,
            } => "This account requires an MFA code. Run the login interactively or pass --mfa-code.",
            GarminError::AuthenticationDenied { .. } => {
                "Garmin Connect rejected the credentials. Check username and password."
            }
            GarminError::ReauthenticationRequired { .. } => {
                "Your session is no longer valid. Run `garmin-cli auth login`."
            }
            GarminError::Cancelled { .. } => "Login was cancelled.",
            GarminError::Api { .. } => "Garmin Connect returned an error for this request.",
            GarminError::NotFound { .. } => "Garmin Connect has no data for this request.",
            GarminError::ResponseParsing { .. } => {
                "Garmin Connect returned data this client does not understand."
            }
            GarminError::Persistence { .. } | GarminError::Serialization(_) => {
                "Could not read or write the session file. Check its path and permissions."
            }
            GarminError::InvalidInput(_) => "Check the command arguments.",
            GarminError::Fit(_) => "The FIT file is invalid or could not be written.",
        }
    }
}
