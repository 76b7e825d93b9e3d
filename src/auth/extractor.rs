// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Value extraction from SSO responses
//!
//! The sign-in pages are not a documented API. Every value the login flow
//! pulls out of a response body goes through a [`ResponseExtractor`], so a
//! changed page only needs a new extractor, not a new state machine.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GarminError, LoginStep, Result};

pub trait ResponseExtractor: Send + Sync {
    /// The extracted value, or `None` when the body does not contain it
    fn extract(&self, body: &str) -> Option<String>;
}

/// First capture group of a regular expression
#[derive(Debug, Clone)]
pub struct RegexExtractor {
    regex: Regex,
}

impl RegexExtractor {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| GarminError::InvalidInput(format!("invalid extractor pattern: {e}")))?;
        Ok(Self { regex })
    }
}

impl ResponseExtractor for RegexExtractor {
    fn extract(&self, body: &str) -> Option<String> {
        self.regex
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// `<input name="{name}" value="...">` hidden form fields
#[derive(Debug, Clone)]
pub struct HiddenInputExtractor {
    needle: String,
}

impl HiddenInputExtractor {
    pub fn new(name: &str) -> Self {
        Self {
            needle: format!(r#"name="{name}""#),
        }
    }
}

impl ResponseExtractor for HiddenInputExtractor {
    fn extract(&self, body: &str) -> Option<String> {
        let mut rest = body;
        while let Some(idx) = rest.find(&self.needle) {
            rest = &rest[idx + self.needle.len()..];
            let value = rest
                .trim_start()
                .strip_prefix("value=\"")
                .and_then(|v| v.split('"').next())
                .filter(|v| !v.is_empty());
            if let Some(value) = value {
                return Some(value.to_string());
            }
        }
        None
    }
}

/// A field of an `application/x-www-form-urlencoded` body
#[derive(Debug, Clone)]
pub struct FormFieldExtractor {
    field: String,
}

impl FormFieldExtractor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl ResponseExtractor for FormFieldExtractor {
    fn extract(&self, body: &str) -> Option<String> {
        url::form_urlencoded::parse(body.trim().as_bytes())
            .find(|(key, _)| key == self.field.as_str())
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }
}

/// A string (or number) at a JSON pointer such as `/ticket`
#[derive(Debug, Clone)]
pub struct JsonFieldExtractor {
    pointer: String,
}

impl JsonFieldExtractor {
    pub fn new(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
        }
    }
}

impl ResponseExtractor for JsonFieldExtractor {
    fn extract(&self, body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        match value.pointer(&self.pointer)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Yields the marker itself when the body contains it
#[derive(Debug, Clone)]
pub struct MarkerExtractor {
    marker: String,
}

impl MarkerExtractor {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl ResponseExtractor for MarkerExtractor {
    fn extract(&self, body: &str) -> Option<String> {
        body.contains(&self.marker).then(|| self.marker.clone())
    }
}

/// Tries each extractor in order
#[derive(Clone, Default)]
pub struct FirstMatch {
    extractors: Vec<Arc<dyn ResponseExtractor>>,
}

impl FirstMatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn or(mut self, extractor: impl ResponseExtractor + 'static) -> Self {
        self.extractors.push(Arc::new(extractor));
        self
    }
}

impl ResponseExtractor for FirstMatch {
    fn extract(&self, body: &str) -> Option<String> {
        self.extractors.iter().find_map(|e| e.extract(body))
    }
}

/// Everything the login flow reads out of provider responses
#[derive(Clone)]
pub struct SsoExtractors {
    pub request_token: Arc<dyn ResponseExtractor>,
    pub request_secret: Arc<dyn ResponseExtractor>,
    pub mfa_required: Arc<dyn ResponseExtractor>,
    pub mfa_context: Arc<dyn ResponseExtractor>,
    pub verifier: Arc<dyn ResponseExtractor>,
    pub ticket: Arc<dyn ResponseExtractor>,
    pub access_token: Arc<dyn ResponseExtractor>,
    pub access_secret: Arc<dyn ResponseExtractor>,
    pub oauth2_token: Arc<dyn ResponseExtractor>,
}

impl Default for SsoExtractors {
    fn default() -> Self {
        Self {
            request_token: Arc::new(FormFieldExtractor::new("oauth_token")),
            request_secret: Arc::new(FormFieldExtractor::new("oauth_token_secret")),
            mfa_required: Arc::new(
                FirstMatch::new()
                    .or(MarkerExtractor::new("mfa-required"))
                    .or(MarkerExtractor::new("MFA_REQUIRED")),
            ),
            mfa_context: Arc::new(
                FirstMatch::new()
                    .or(HiddenInputExtractor::new("mfaContext"))
                    .or(JsonFieldExtractor::new("/mfaContext")),
            ),
            verifier: Arc::new(
                FirstMatch::new()
                    .or(HiddenInputExtractor::new("oauth_verifier"))
                    .or(FormFieldExtractor::new("oauth_verifier")),
            ),
            ticket: Arc::new(
                FirstMatch::new()
                    .or(JsonFieldExtractor::new("/ticket"))
                    .or(HiddenInputExtractor::new("ticket"))
                    .or(HiddenInputExtractor::new("serviceTicket")),
            ),
            access_token: Arc::new(FormFieldExtractor::new("oauth_token")),
            access_secret: Arc::new(FormFieldExtractor::new("oauth_token_secret")),
            oauth2_token: Arc::new(JsonFieldExtractor::new("/access_token")),
        }
    }
}

/// Regex overrides for the most fragile extraction points
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorPatterns {
    pub mfa_context: Option<String>,
    pub verifier: Option<String>,
    pub ticket: Option<String>,
}

impl SsoExtractors {
    /// Defaults, with any configured pattern taking precedence
    pub fn with_patterns(patterns: &ExtractorPatterns) -> Result<Self> {
        let mut extractors = Self::default();
        if let Some(pattern) = &patterns.mfa_context {
            extractors.mfa_context = Arc::new(RegexExtractor::new(pattern)?);
        }
        if let Some(pattern) = &patterns.verifier {
            extractors.verifier = Arc::new(RegexExtractor::new(pattern)?);
        }
        if let Some(pattern) = &patterns.ticket {
            extractors.ticket = Arc::new(RegexExtractor::new(pattern)?);
        }
        Ok(extractors)
    }
}

/// Run `extractor` or fail with a protocol error naming what was missing
pub(crate) fn require(
    extractor: &dyn ResponseExtractor,
    body: &str,
    step: LoginStep,
    what: &str,
) -> Result<String> {
    extractor
        .extract(body)
        .ok_or_else(|| GarminError::protocol(step, format!("{what} not found in response")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_input() {
        let extractor = HiddenInputExtractor::new("oauth_verifier");
        let body = r#"<input type="hidden" name="oauth_verifier" value="test_verifier" />"#;
        assert_eq!(extractor.extract(body), Some("test_verifier".to_string()));
        assert_eq!(extractor.extract("<html></html>"), None);
    }

    #[test]
    fn test_form_field() {
        let extractor = FormFieldExtractor::new("oauth_token_secret");
        let body = "oauth_token=abc&oauth_token_secret=s%2Fecret\n";
        assert_eq!(extractor.extract(body), Some("s/ecret".to_string()));
        assert_eq!(FormFieldExtractor::new("missing").extract(body), None);
    }

    #[test]
    fn test_json_field() {
        let extractor = JsonFieldExtractor::new("/ticket");
        assert_eq!(
            extractor.extract(r#"{"ticket":"ST-123"}"#),
            Some("ST-123".to_string())
        );
        assert_eq!(extractor.extract(r#"{"ticket":""}"#), None);
        assert_eq!(extractor.extract("not json"), None);
    }

    #[test]
    fn test_marker_and_first_match() {
        let mfa = SsoExtractors::default();
        let body = r#"<div class="mfa-required"><input type="hidden" name="mfaContext" value="context123" /></div>"#;

        assert!(mfa.mfa_required.extract(body).is_some());
        assert_eq!(mfa.mfa_context.extract(body), Some("context123".to_string()));
        assert!(mfa.mfa_required.extract("<html>welcome</html>").is_none());
    }

    #[test]
    fn test_require_reports_protocol_error() {
        let extractor = HiddenInputExtractor::new("oauth_verifier");
        let err = require(&extractor, "<html/>", LoginStep::SubmitCredentials, "verifier")
            .unwrap_err();
        assert!(matches!(
            err,
            GarminError::Protocol {
                step: LoginStep::SubmitCredentials,
                ..
            }
        ));
    }

    #[test]
    fn test_pattern_overrides() {
        let patterns = ExtractorPatterns {
            verifier: Some(r#"verifier:([a-z_]+)"#.to_string()),
            ..Default::default()
        };
        let extractors = SsoExtractors::with_patterns(&patterns).unwrap();

        assert_eq!(
            extractors.verifier.extract("verifier:from_config"),
            Some("from_config".to_string())
        );
        assert_eq!(
            extractors
                .mfa_context
                .extract(r#"<input name="mfaContext" value="ctx" />"#),
            Some("ctx".to_string())
        );

        let invalid = ExtractorPatterns {
            ticket: Some("(".to_string()),
            ..Default::default()
        };
        assert!(SsoExtractors::with_patterns(&invalid).is_err());
    }

    #[test]
    fn test_custom_regex_pattern() {
        let extractor = RegexExtractor::new(r"ticket=([A-Za-z0-9\-]+)").unwrap();
        assert_eq!(
            extractor.extract("embed?ticket=ST-0042-abc\""),
            Some("ST-0042-abc".to_string())
        );
        assert!(RegexExtractor::new("(unclosed").is_err());
    }
}
