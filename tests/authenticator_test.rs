// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Integration tests for the SSO login flow
//!
//! Every provider endpoint is served by a mockito server; both the SSO and
//! the Connect API base URLs point at it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mockito::{Matcher, Mock, Server, ServerGuard};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use garmin_connect::auth::{
    Authenticator, Clock, ExchangeStrategy, FileSessionStore, LoginState, MfaPrompter,
    StaticPrompter, TokenRefresher,
};
use garmin_connect::config::GarminConfig;
use garmin_connect::error::{DenialReason, GarminError, LoginStep, Result};

const USERNAME: &str = "athlete@example.com";
const PASSWORD: &str = "correct horse";

const MFA_FORM: &str = r#"<html><body><form id="mfa-required" method="post">
<input type="hidden" name="mfaContext" value="ctx-42" />
<input type="text" name="code" />
</form></body></html>"#;

const VERIFIER_PAGE: &str = r#"<html><body>
<input type="hidden" name="oauth_verifier" value="verifier-123" />
</body></html>"#;

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Simulates the user interrupting the login while the prompt is shown
struct InterruptingPrompter;

#[async_trait]
impl MfaPrompter for InterruptingPrompter {
    async fn mfa_code(&self, cancel: &CancellationToken) -> Result<String> {
        cancel.cancel();
        std::future::pending::<Result<String>>().await
    }
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 17, 6, 0, 0).unwrap()
}

fn authenticator(server: &ServerGuard) -> Authenticator {
    Authenticator::new(GarminConfig::for_base_url(&server.url()))
        .expect("authenticator should build")
        .with_clock(Arc::new(FixedClock(fixed_now())))
}

async fn mock_request_token(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/oauth-service/oauth/request_token")
        .match_header("authorization", Matcher::Regex(r#"^OAuth .*oauth_callback="oob""#.into()))
        .with_status(200)
        .with_body("oauth_token=req-token&oauth_token_secret=req-secret")
        .create_async()
        .await
}

async fn mock_signin(server: &mut ServerGuard, status: usize, body: &str) -> Mock {
    server
        .mock("POST", "/sso/signin")
        .match_query(Matcher::Any)
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("username".into(), USERNAME.into()),
            Matcher::UrlEncoded("password".into(), PASSWORD.into()),
        ]))
        .with_status(status)
        .with_body(body)
        .create_async()
        .await
}

async fn mock_access_token(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/oauth-service/oauth/access_token")
        .match_header(
            "authorization",
            Matcher::AllOf(vec![
                Matcher::Regex(r#"oauth_token="req-token""#.into()),
                Matcher::Regex(r#"oauth_verifier="verifier-123""#.into()),
            ]),
        )
        .with_status(200)
        .with_body("oauth_token=oauth1-token&oauth_token_secret=oauth1-secret")
        .create_async()
        .await
}

async fn mock_exchange(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/oauth-service/oauth/exchange/user/2.0")
        .match_header("authorization", Matcher::Regex(r#"oauth_token="oauth1-token""#.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"bearer-abc","token_type":"Bearer","expires_in":3600}"#)
        .create_async()
        .await
}

#[tokio::test]
async fn test_login_without_mfa() {
    let mut server = Server::new_async().await;
    let request_token = mock_request_token(&mut server).await;
    let signin = mock_signin(&mut server, 200, VERIFIER_PAGE).await;
    let access_token = mock_access_token(&mut server).await;
    let exchange = mock_exchange(&mut server).await;

    let outcome = authenticator(&server)
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await
        .expect("login should succeed");

    assert_eq!(outcome.session.oauth1_token, "oauth1-token");
    assert_eq!(outcome.session.oauth1_secret, "oauth1-secret");
    assert_eq!(outcome.session.oauth2_token, "bearer-abc");
    assert_eq!(
        outcome.session.expires_at,
        fixed_now() + chrono::Duration::hours(8)
    );
    assert!(outcome.persist_error.is_none());
    assert_eq!(
        outcome.states,
        vec![
            LoginState::Start,
            LoginState::RequestTokenObtained,
            LoginState::CredentialsSubmitted,
            LoginState::TicketExchanged,
            LoginState::SessionEstablished,
        ]
    );
    assert!(!outcome.used_mfa());

    request_token.assert_async().await;
    signin.assert_async().await;
    access_token.assert_async().await;
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_login_with_mfa_code() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 200, MFA_FORM).await;
    let verify = server
        .mock("POST", "/sso/verifyMFA")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("mfaContext".into(), "ctx-42".into()),
            Matcher::UrlEncoded("code".into(), "654321".into()),
        ]))
        .with_status(200)
        .with_body(VERIFIER_PAGE)
        .expect(1)
        .create_async()
        .await;
    let _access_token = mock_access_token(&mut server).await;
    let _exchange = mock_exchange(&mut server).await;

    let outcome = authenticator(&server)
        .with_prompter(Arc::new(StaticPrompter::new(" 654321 ")))
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await
        .expect("login with MFA should succeed");

    assert_eq!(outcome.session.oauth2_token, "bearer-abc");
    assert!(outcome.used_mfa());
    assert_eq!(
        &outcome.states[2..5],
        &[
            LoginState::CredentialsSubmitted,
            LoginState::MfaRequired,
            LoginState::MfaSubmitted,
        ]
    );
    verify.assert_async().await;
}

#[tokio::test]
async fn test_mfa_signalled_by_status_412() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 412, r#"{"mfaContext":"ctx-json"}"#).await;
    let verify = server
        .mock("POST", "/sso/verifyMFA")
        .match_body(Matcher::UrlEncoded("mfaContext".into(), "ctx-json".into()))
        .with_status(200)
        .with_body(VERIFIER_PAGE)
        .create_async()
        .await;
    let _access_token = mock_access_token(&mut server).await;
    let _exchange = mock_exchange(&mut server).await;

    authenticator(&server)
        .with_prompter(Arc::new(StaticPrompter::new("111111")))
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await
        .expect("login should succeed after the 412 challenge");

    verify.assert_async().await;
}

#[tokio::test]
async fn test_mfa_code_rejected() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 200, MFA_FORM).await;
    let _verify = server
        .mock("POST", "/sso/verifyMFA")
        .with_status(200)
        .with_body(MFA_FORM)
        .create_async()
        .await;
    let access_token = server
        .mock("POST", "/oauth-service/oauth/access_token")
        .expect(0)
        .create_async()
        .await;

    let result = authenticator(&server)
        .with_prompter(Arc::new(StaticPrompter::new("000000")))
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(GarminError::AuthenticationDenied {
            reason: DenialReason::MfaCodeRejected
        })
    ));
    access_token.assert_async().await;
}

#[tokio::test]
async fn test_mfa_code_rejected_with_repeated_412() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 412, r#"{"mfaContext":"ctx-json"}"#).await;
    let verify = server
        .mock("POST", "/sso/verifyMFA")
        .match_body(Matcher::UrlEncoded("code".into(), "000000".into()))
        .with_status(412)
        .with_body(r#"{"mfaContext":"ctx-json"}"#)
        .expect(1)
        .create_async()
        .await;

    let result = authenticator(&server)
        .with_prompter(Arc::new(StaticPrompter::new("000000")))
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(GarminError::AuthenticationDenied {
            reason: DenialReason::MfaCodeRejected
        })
    ));
    verify.assert_async().await;
}

#[tokio::test]
async fn test_mfa_without_prompter() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 200, MFA_FORM).await;
    let verify = server
        .mock("POST", "/sso/verifyMFA")
        .expect(0)
        .create_async()
        .await;

    let result = authenticator(&server)
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await;

    let err = result.expect_err("login should fail without a prompter");
    assert!(matches!(
        err,
        GarminError::AuthenticationDenied {
            reason: DenialReason::MfaUnavailable
        }
    ));
    assert!(err.user_hint().contains("--mfa-code"));
    verify.assert_async().await;
}

#[tokio::test]
async fn test_blank_mfa_code_is_unavailable() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 200, MFA_FORM).await;

    let result = authenticator(&server)
        .with_prompter(Arc::new(StaticPrompter::new("   ")))
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(GarminError::AuthenticationDenied {
            reason: DenialReason::MfaUnavailable
        })
    ));
}

#[tokio::test]
async fn test_cancel_during_mfa_prompt() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 200, MFA_FORM).await;
    let verify = server
        .mock("POST", "/sso/verifyMFA")
        .expect(0)
        .create_async()
        .await;

    let authenticator = authenticator(&server).with_prompter(Arc::new(InterruptingPrompter));
    let cancel = CancellationToken::new();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        authenticator.login(USERNAME, PASSWORD, &cancel),
    )
    .await
    .expect("cancelled login must return promptly");

    assert!(matches!(
        result,
        Err(GarminError::Cancelled {
            step: LoginStep::MfaPrompt
        })
    ));
    verify.assert_async().await;
}

#[tokio::test]
async fn test_invalid_credentials() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 401, "<html>Invalid sign in</html>").await;
    let access_token = server
        .mock("POST", "/oauth-service/oauth/access_token")
        .expect(0)
        .create_async()
        .await;

    let result = authenticator(&server)
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(GarminError::AuthenticationDenied {
            reason: DenialReason::InvalidCredentials
        })
    ));
    access_token.assert_async().await;
}

#[tokio::test]
async fn test_missing_verifier_is_protocol_error() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 200, "<html><body>Welcome back</body></html>").await;

    let result = authenticator(&server)
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await;

    match result {
        Err(GarminError::Protocol { step, message }) => {
            assert_eq!(step, LoginStep::SubmitCredentials);
            assert!(message.contains("OAuth verifier"));
        }
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_service_unavailable() {
    let mut server = Server::new_async().await;
    let _request_token = server
        .mock("POST", "/oauth-service/oauth/request_token")
        .with_status(503)
        .create_async()
        .await;
    let signin = server
        .mock("POST", "/sso/signin")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = authenticator(&server)
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await
        .expect_err("login should fail");

    assert!(matches!(
        err,
        GarminError::ServiceUnavailable { status: 503, .. }
    ));
    assert!(err.is_retryable());
    signin.assert_async().await;
}

#[tokio::test]
async fn test_direct_ticket_strategy() {
    let mut server = Server::new_async().await;
    let request_token = server
        .mock("POST", "/oauth-service/oauth/request_token")
        .expect(0)
        .create_async()
        .await;
    let _signin = mock_signin(&mut server, 200, r#"{"ticket":"ST-0001-cas"}"#).await;
    let preauthorized = server
        .mock("GET", "/oauth-service/oauth/preauthorized")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ticket".into(), "ST-0001-cas".into()),
            Matcher::UrlEncoded("accepts-mfa-tokens".into(), "true".into()),
        ]))
        .match_header("authorization", Matcher::Regex("^OAuth ".into()))
        .with_status(200)
        .with_body("oauth_token=oauth1-token&oauth_token_secret=oauth1-secret")
        .create_async()
        .await;
    let _exchange = mock_exchange(&mut server).await;

    let mut config = GarminConfig::for_base_url(&server.url());
    config.exchange_strategy = ExchangeStrategy::DirectTicket;
    let outcome = Authenticator::new(config)
        .unwrap()
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await
        .expect("ticket login should succeed");

    assert_eq!(outcome.session.oauth1_token, "oauth1-token");
    assert_eq!(outcome.session.oauth2_token, "bearer-abc");
    assert_eq!(outcome.states[1], LoginState::CredentialsSubmitted);
    request_token.assert_async().await;
    preauthorized.assert_async().await;
}

#[tokio::test]
async fn test_login_persists_session() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 200, VERIFIER_PAGE).await;
    let _access_token = mock_access_token(&mut server).await;
    let _exchange = mock_exchange(&mut server).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = FileSessionStore::new(temp_dir.path().join("garmin").join("session.json"));

    let authenticator = authenticator(&server).with_store(store.clone());
    let outcome = authenticator
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.persist_error.is_none());
    assert_eq!(store.load().unwrap(), Some(outcome.session));

    authenticator.logout().unwrap();
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_persist_failure_keeps_session() {
    let mut server = Server::new_async().await;
    let _request_token = mock_request_token(&mut server).await;
    let _signin = mock_signin(&mut server, 200, VERIFIER_PAGE).await;
    let _access_token = mock_access_token(&mut server).await;
    let _exchange = mock_exchange(&mut server).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let blocker = temp_dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"file").unwrap();
    let store = FileSessionStore::new(blocker.join("session.json"));

    let outcome = authenticator(&server)
        .with_store(store)
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await
        .expect("login succeeds even when the session cannot be saved");

    assert_eq!(outcome.session.oauth2_token, "bearer-abc");
    assert!(matches!(
        outcome.persist_error,
        Some(GarminError::Persistence { .. })
    ));
}

#[tokio::test]
async fn test_refresh_token_exchange() {
    let mut server = Server::new_async().await;
    let exchange = mock_exchange(&mut server).await;

    let token = authenticator(&server)
        .refresh_token("oauth1-token", "oauth1-secret")
        .await
        .expect("refresh should succeed");

    assert_eq!(token, "bearer-abc");
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_refresh_rejected() {
    let mut server = Server::new_async().await;
    let _exchange = server
        .mock("POST", "/oauth-service/oauth/exchange/user/2.0")
        .with_status(401)
        .create_async()
        .await;

    let result = authenticator(&server)
        .refresh_token("revoked-token", "revoked-secret")
        .await;

    assert!(matches!(
        result,
        Err(GarminError::AuthenticationDenied {
            reason: DenialReason::RefreshRejected
        })
    ));
}

#[tokio::test]
async fn test_missing_consumer_key_is_rejected() {
    let server = Server::new_async().await;
    let mut config = GarminConfig::for_base_url(&server.url());
    config.consumer_key.clear();

    let result = Authenticator::new(config)
        .unwrap()
        .login(USERNAME, PASSWORD, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GarminError::InvalidInput(_))));
}
