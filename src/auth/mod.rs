// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Authentication: SSO login, OAuth1 signing, MFA and session persistence

pub mod authenticator;
pub mod extractor;
pub mod mfa;
pub mod oauth1;
pub mod session;

pub use authenticator::{
    Authenticator, ExchangeStrategy, LoginOutcome, LoginState, TokenRefresher,
};
pub use extractor::{
    ExtractorPatterns, FirstMatch, FormFieldExtractor, HiddenInputExtractor, JsonFieldExtractor,
    MarkerExtractor, RegexExtractor, ResponseExtractor, SsoExtractors,
};
pub use mfa::{ConsolePrompter, MfaPrompter, StaticPrompter};
pub use oauth1::{OAuth1Signer, TokenCredentials};
pub use session::{Clock, FileSessionStore, Session, SystemClock};
