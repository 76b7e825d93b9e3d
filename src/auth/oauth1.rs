// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! OAuth 1.0a HMAC-SHA1 request signing (RFC 5849)

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

use crate::error::{GarminError, Result};

type HmacSha1 = Hmac<Sha1>;

/// Token half of the signing key
#[derive(Debug, Clone, Copy)]
pub struct TokenCredentials<'a> {
    pub token: &'a str,
    pub secret: &'a str,
}

/// Signs requests on behalf of one OAuth consumer
#[derive(Debug, Clone)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
}

impl OAuth1Signer {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// `Authorization` header value with a fresh nonce and timestamp.
    ///
    /// `params` are the form body parameters; query parameters are read from
    /// `url`. `extra` holds additional `oauth_*` protocol parameters such as
    /// `oauth_verifier` or `oauth_callback`.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &Url,
        params: &[(&str, &str)],
        token: Option<TokenCredentials<'_>>,
        extra: &[(&str, &str)],
    ) -> Result<String> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, token, extra, &nonce, &timestamp)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &Url,
        params: &[(&str, &str)],
        token: Option<TokenCredentials<'_>>,
        extra: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = token {
            oauth_params.push(("oauth_token".to_string(), token.token.to_string()));
        }
        oauth_params.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let signature = self.signature(method, url, params, &oauth_params, token)?;
        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let fields: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!(r#"{}="{}""#, encode(k), encode(v)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    fn signature(
        &self,
        method: &str,
        url: &Url,
        params: &[(&str, &str)],
        oauth_params: &[(String, String)],
        token: Option<TokenCredentials<'_>>,
    ) -> Result<String> {
        let base = signature_base_string(method, url, params, oauth_params);
        let key = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(token.map(|t| t.secret).unwrap_or(""))
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| GarminError::InvalidInput(format!("HMAC init failed: {e}")))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

pub(crate) fn signature_base_string(
    method: &str,
    url: &Url,
    params: &[(&str, &str)],
    oauth_params: &[(String, String)],
) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(params.iter().map(|(k, v)| (encode(k), encode(v))))
        .chain(oauth_params.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort();

    let normalized: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(&base_url(url)),
        encode(&normalized.join("&"))
    )
}
