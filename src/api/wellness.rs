// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Daily health summaries: sleep, stress, steps, HRV and Body Battery

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::types::GarminTime;
use crate::client::GarminClient;
use crate::constants::{api_endpoints, DATE_FORMAT};
use crate::error::{GarminError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SleepScores {
    pub overall: Option<i64>,
    pub duration: Option<i64>,
    pub deep: Option<i64>,
    pub rem: Option<i64>,
    pub light: Option<i64>,
    pub awake: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SleepData {
    pub calendar_date: Option<GarminTime>,
    pub sleep_time_seconds: Option<i64>,
    pub deep_sleep_seconds: Option<i64>,
    pub light_sleep_seconds: Option<i64>,
    pub rem_sleep_seconds: Option<i64>,
    pub awake_seconds: Option<i64>,
    pub sleep_score: Option<i64>,
    pub sleep_scores: Option<SleepScores>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyStress {
    pub calendar_date: Option<GarminTime>,
    /// 0-100
    pub overall_stress_level: Option<i64>,
    pub rest_stress_duration: Option<i64>,
    pub low_stress_duration: Option<i64>,
    pub medium_stress_duration: Option<i64>,
    pub high_stress_duration: Option<i64>,
    pub stress_qualifier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailySteps {
    pub calendar_date: Option<GarminTime>,
    pub total_steps: Option<i64>,
    pub goal: Option<i64>,
    pub active_minutes: Option<i64>,
    pub distance_meters: Option<f64>,
    pub calories_burned: Option<f64>,
    pub steps_to_goal: Option<i64>,
    pub step_goal_achieved: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HrvData {
    pub date: Option<GarminTime>,
    pub resting_hrv: Option<f64>,
    pub weekly_avg: Option<f64>,
    pub last_night_avg: Option<f64>,
    pub hrv_status: Option<String>,
    pub hrv_status_message: Option<String>,
    pub baseline_hrv: Option<i64>,
    pub change_from_baseline: Option<i64>,
}

/// Body Battery values are on a 0-100 scale
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BodyBatteryData {
    pub date: Option<GarminTime>,
    pub charged: Option<i64>,
    pub drained: Option<i64>,
    pub highest: Option<i64>,
    pub lowest: Option<i64>,
}

impl GarminClient {
    pub async fn get_sleep_data(&self, date: NaiveDate) -> Result<SleepData> {
        self.daily(api_endpoints::SLEEP_DAILY, date, "sleep data").await
    }

    pub async fn get_stress_data(&self, date: NaiveDate) -> Result<DailyStress> {
        self.daily(api_endpoints::STRESS_DAILY, date, "stress data").await
    }

    pub async fn get_steps_data(&self, date: NaiveDate) -> Result<DailySteps> {
        self.daily(api_endpoints::STEPS_DAILY, date, "steps data").await
    }

    pub async fn get_hrv_data(&self, date: NaiveDate) -> Result<HrvData> {
        self.daily(api_endpoints::HRV, date, "HRV data").await
    }

    pub async fn get_body_battery(&self, date: NaiveDate) -> Result<BodyBatteryData> {
        self.daily(api_endpoints::BODY_BATTERY, date, "Body Battery data")
            .await
    }

    /// `GET {endpoint}/{date}`; an empty answer means the device recorded
    /// nothing that day
    async fn daily<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        date: NaiveDate,
        what: &str,
    ) -> Result<T> {
        let path = format!("{}/{}", endpoint, date.format(DATE_FORMAT));
        let data: Option<T> = self.get(&path).await?;
        data.ok_or_else(|| GarminError::not_found(format!("{what} for {date}")))
    }
}
