// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Gear (shoes, bikes) and its usage totals

use serde::{Deserialize, Serialize};

use super::types::GarminTime;
use crate::client::GarminClient;
use crate::constants::api_endpoints;
use crate::error::{GarminError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GearItem {
    pub uuid: Option<String>,
    pub display_name: Option<String>,
    pub custom_make_model: Option<String>,
    pub gear_type_name: Option<String>,
    pub gear_status_name: Option<String>,
    pub date_begin: Option<GarminTime>,
    /// Meters; 0 when no retirement distance is set
    pub maximum_meters: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GearStats {
    pub uuid: Option<String>,
    pub name: Option<String>,
    /// Meters
    pub distance: Option<f64>,
    pub total_activities: Option<i64>,
    /// Seconds
    pub total_time: Option<i64>,
    pub calories: Option<f64>,
    pub elevation_gain: Option<f64>,
    pub elevation_loss: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GearActivity {
    pub activity_id: i64,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub start_time_local: Option<GarminTime>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl GarminClient {
    /// All gear registered to a user profile
    pub async fn get_gear(&self, user_profile_pk: i64) -> Result<Vec<GearItem>> {
        let gear: Option<Vec<GearItem>> = self
            .get_with_query(
                api_endpoints::GEAR_FILTER,
                &[("userProfilePk", user_profile_pk.to_string())],
            )
            .await?;
        Ok(gear.unwrap_or_default())
    }

    pub async fn get_gear_stats(&self, gear_uuid: &str) -> Result<GearStats> {
        let path = format!("{}/{}", api_endpoints::GEAR_STATS, gear_path_segment(gear_uuid)?);
        let stats: Option<GearStats> = self.get(&path).await?;
        stats.ok_or_else(|| GarminError::not_found(format!("stats for gear {gear_uuid}")))
    }

    /// Activities recorded with a piece of gear, `limit` at a time from `start`
    pub async fn get_gear_activities(
        &self,
        gear_uuid: &str,
        start: u32,
        limit: u32,
    ) -> Result<Vec<GearActivity>> {
        let path = format!(
            "{}/{}",
            api_endpoints::GEAR_ACTIVITIES,
            gear_path_segment(gear_uuid)?
        );
        let activities: Option<Vec<GearActivity>> = self
            .get_with_query(
                &path,
                &[("start", start.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(activities.unwrap_or_default())
    }
}

fn gear_path_segment(gear_uuid: &str) -> Result<String> {
    let gear_uuid = gear_uuid.trim();
    if gear_uuid.is_empty() {
        return Err(GarminError::InvalidInput(
            "gear UUID must not be empty".to_string(),
        ));
    }
    Ok(urlencoding::encode(gear_uuid).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gear_path_segment() {
        assert_eq!(gear_path_segment(" abc-123 ").unwrap(), "abc-123");
        assert_eq!(gear_path_segment("a/b").unwrap(), "a%2Fb");
        assert!(matches!(
            gear_path_segment("  "),
            Err(GarminError::InvalidInput(_))
        ));
    }
}
