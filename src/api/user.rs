// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::{string_or_number, GarminTime};
use crate::client::GarminClient;
use crate::constants::{api_endpoints, DATE_FORMAT};
use crate::error::{GarminError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub profile_id: Option<String>,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub user_name: Option<String>,
    pub email_address: Option<String>,
    #[serde(rename = "profileImageUrlLarge")]
    pub profile_image: Option<String>,
    pub location: Option<String>,
    pub fitness_level: Option<String>,
    /// Centimeters
    pub height: Option<f64>,
    /// Grams
    pub weight: Option<f64>,
    pub birth_date: Option<String>,
}

/// Daily totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    #[serde(alias = "date")]
    pub calendar_date: Option<GarminTime>,
    pub total_steps: Option<i64>,
    /// Meters
    #[serde(alias = "totalDistance")]
    pub total_distance_meters: Option<f64>,
    #[serde(alias = "totalCalories")]
    pub total_kilocalories: Option<f64>,
    pub active_minutes: Option<i64>,
    pub resting_heart_rate: Option<i64>,
}

impl GarminClient {
    /// Profile of the logged-in user
    pub async fn get_user_profile(&self) -> Result<UserProfile> {
        let profile: Option<UserProfile> = self.get(api_endpoints::SOCIAL_PROFILE).await?;

        match profile {
            Some(profile) if profile.profile_id.as_deref().is_some_and(|id| !id.is_empty()) => {
                Ok(profile)
            }
            _ => Err(GarminError::not_found("user profile")),
        }
    }

    pub async fn get_user_stats(&self, date: NaiveDate) -> Result<UserStats> {
        let path = format!("{}/{}", api_endpoints::DAILY_STATS, date.format(DATE_FORMAT));
        let stats: Option<UserStats> = self.get(&path).await?;
        Ok(stats.unwrap_or_default())
    }
}
