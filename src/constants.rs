// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Constants Module
//!
//! Service URLs, endpoint paths, environment variable names and defaults.
//! Nothing here reads the environment; [`crate::config::GarminConfig`] does.

/// Service identity
pub mod service {
    pub const NAME: &str = "garmin-connect";

    /// Client version from Cargo.toml
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Base URLs
pub mod urls {
    /// REST and OAuth service host
    pub const CONNECT_API_URL: &str = "https://connectapi.garmin.com";

    /// Single sign-on host
    pub const SSO_URL: &str = "https://sso.garmin.com";

    /// Value of the `service` parameter the sign-in form expects
    pub const SIGNIN_SERVICE: &str = "https://connect.garmin.com/modern";
}

/// Authentication endpoints (relative to the SSO or API base URL)
pub mod auth_endpoints {
    /// OAuth1 request token (API host)
    pub const REQUEST_TOKEN: &str = "/oauth-service/oauth/request_token";

    /// Credential form (SSO host)
    pub const SIGNIN: &str = "/sso/signin";

    /// MFA code form (SSO host)
    pub const VERIFY_MFA: &str = "/sso/verifyMFA";

    /// OAuth1 access token from a verified request token (API host)
    pub const ACCESS_TOKEN: &str = "/oauth-service/oauth/access_token";

    /// OAuth1 access token from a service ticket (API host)
    pub const PREAUTHORIZED: &str = "/oauth-service/oauth/preauthorized";

    /// OAuth1 to OAuth2 exchange (API host)
    pub const OAUTH2_EXCHANGE: &str = "/oauth-service/oauth/exchange/user/2.0";
}

/// REST endpoints (relative to the API base URL)
pub mod api_endpoints {
    pub const ACTIVITIES_SEARCH: &str = "/activitylist-service/activities/search";
    pub const ACTIVITY: &str = "/activity-service/activity";
    pub const UPLOAD_FIT: &str = "/upload-service/upload/.fit";
    pub const DOWNLOAD_ACTIVITY: &str = "/download-service/export/activity";

    pub const SOCIAL_PROFILE: &str = "/userprofile-service/socialProfile";
    pub const DAILY_STATS: &str = "/stats-service/stats/daily";

    pub const SLEEP_DAILY: &str = "/wellness-service/sleep/daily";
    pub const STRESS_DAILY: &str = "/wellness-service/stress/daily";
    pub const STEPS_DAILY: &str = "/wellness-service/steps/daily";
    pub const HRV: &str = "/hrv-service/hrv";
    pub const BODY_BATTERY: &str = "/bodybattery-service/bodybattery";

    pub const BODY_COMPOSITION: &str = "/body-composition";

    pub const GEAR_FILTER: &str = "/gear-service/gear/filterGear";
    pub const GEAR_STATS: &str = "/gear-service/stats";
    pub const GEAR_ACTIVITIES: &str = "/gear-service/activities";
}

/// Environment variables read by `GarminConfig::load`
pub mod env_vars {
    pub const USERNAME: &str = "GARMIN_USERNAME";
    pub const PASSWORD: &str = "GARMIN_PASSWORD";
    pub const SESSION_PATH: &str = "GARMIN_SESSION_PATH";
    pub const API_URL: &str = "GARMIN_API_URL";
    pub const SSO_URL: &str = "GARMIN_SSO_URL";
    pub const DEBUG_AUTH: &str = "GARMIN_DEBUG_AUTH";
    pub const TOKEN_LIFETIME_HOURS: &str = "GARMIN_TOKEN_LIFETIME_HOURS";
    pub const CONSUMER_KEY: &str = "GARMIN_CONSUMER_KEY";
    pub const CONSUMER_SECRET: &str = "GARMIN_CONSUMER_SECRET";
}

/// Configuration defaults
pub mod defaults {
    /// Bearer token validity assumed after login or refresh. The provider does
    /// not report it.
    pub const TOKEN_LIFETIME_HOURS: i64 = 8;

    /// Upper bound accepted for `token_lifetime_hours` (one year)
    pub const MAX_TOKEN_LIFETIME_HOURS: i64 = 24 * 365;

    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    pub const USER_AGENT: &str = concat!("garmin-connect/", env!("CARGO_PKG_VERSION"));

    /// Session file, relative to the home directory
    pub const SESSION_FILE: &str = ".garmin/session.json";

    /// Config file, relative to the platform config directory
    pub const CONFIG_FILE: &str = "garmin-connect/config.toml";

    pub const ACTIVITIES_PAGE_SIZE: u32 = 20;
}

/// Date format used in REST paths and query strings
pub const DATE_FORMAT: &str = "%Y-%m-%d";
