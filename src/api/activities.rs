// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Activity listing, details, upload and download

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::types::{GarminTime, Pagination};
use crate::client::GarminClient;
use crate::constants::api_endpoints;
use crate::error::{GarminError, Result};
use crate::fit;
use crate::logging::AppLogger;

/// Activity type, sent either as a bare key or as a `{typeKey, typeId}` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ActivityTypeRepr", rename_all = "camelCase")]
pub struct ActivityType {
    pub type_key: String,
    pub type_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ActivityTypeRepr {
    Key(String),
    #[serde(rename_all = "camelCase")]
    Object {
        type_key: String,
        #[serde(default)]
        type_id: Option<i64>,
    },
}

impl From<ActivityTypeRepr> for ActivityType {
    fn from(repr: ActivityTypeRepr) -> Self {
        match repr {
            ActivityTypeRepr::Key(type_key) => Self {
                type_key,
                type_id: None,
            },
            ActivityTypeRepr::Object { type_key, type_id } => Self { type_key, type_id },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub activity_id: i64,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
    #[serde(default)]
    pub start_time_local: Option<GarminTime>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// Meters
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Weather {
    pub condition: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// Gear summary embedded in activity details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityGear {
    #[serde(rename = "gearId")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsTrackPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub ele: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<GarminTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetail {
    #[serde(flatten)]
    pub activity: Activity,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default, rename = "averageHR")]
    pub average_hr: Option<f64>,
    #[serde(default, rename = "maxHR")]
    pub max_hr: Option<f64>,
    #[serde(default, rename = "averageTemperature")]
    pub average_temperature: Option<f64>,
    #[serde(default)]
    pub elevation_gain: Option<f64>,
    #[serde(default)]
    pub elevation_loss: Option<f64>,
    #[serde(default)]
    pub weather: Option<Weather>,
    #[serde(default)]
    pub gear: Option<ActivityGear>,
    #[serde(default)]
    pub gps_tracks: Vec<GpsTrackPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitiesPage {
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl GarminClient {
    /// One page of the activity list, newest first.
    ///
    /// An empty page is reported as [`GarminError::NotFound`].
    pub async fn get_activities(&self, page: u32, page_size: u32) -> Result<ActivitiesPage> {
        if page_size == 0 {
            return Err(GarminError::InvalidInput(
                "page size must be at least 1".to_string(),
            ));
        }

        let page_data: ActivitiesPage = self
            .get_with_query(
                api_endpoints::ACTIVITIES_SEARCH,
                &[("page", page.to_string()), ("pageSize", page_size.to_string())],
            )
            .await?;

        if page_data.activities.is_empty() {
            return Err(GarminError::not_found(format!("activities on page {page}")));
        }
        Ok(page_data)
    }

    pub async fn get_activity_details(&self, activity_id: i64) -> Result<ActivityDetail> {
        let path = format!("{}/{}", api_endpoints::ACTIVITY, activity_id);
        let detail: Option<ActivityDetail> = self.get(&path).await?;

        match detail {
            Some(detail) if detail.activity.activity_id != 0 => Ok(detail),
            _ => Err(GarminError::not_found(format!("activity {activity_id}"))),
        }
    }

    /// Upload a FIT file and return the new activity's id.
    ///
    /// The container is validated locally first, so a corrupt file never
    /// reaches the network.
    pub async fn upload_activity(&self, fit_bytes: Vec<u8>) -> Result<i64> {
        let summary = fit::validate(&fit_bytes)?;
        AppLogger::log_fit_event("upload", u64::from(summary.data_size()), summary.file_crc);

        let part = Part::bytes(fit_bytes)
            .file_name("activity.fit")
            .mime_str("application/octet-stream")
            .map_err(|e| GarminError::InvalidInput(format!("invalid upload part: {e}")))?;
        let form = Form::new().part("file", part);

        let response: Value = self.post_multipart(api_endpoints::UPLOAD_FIT, form).await?;
        let activity_id = upload_activity_id(&response)
            .ok_or_else(|| GarminError::not_found("activity id in upload response"))?;

        info!(activity_id, "Activity uploaded");
        Ok(activity_id)
    }

    /// Original FIT export of an activity
    pub async fn download_activity(&self, activity_id: i64) -> Result<Vec<u8>> {
        let path = format!("{}/{}", api_endpoints::DOWNLOAD_ACTIVITY, activity_id);
        self.get_bytes(&path, "application/fit, application/octet-stream")
            .await
    }
}

/// `{"activityId": n}` or the import-result shape the upload service uses
fn upload_activity_id(response: &Value) -> Option<i64> {
    response
        .get("activityId")
        .and_then(Value::as_i64)
        .or_else(|| {
            response
                .pointer("/detailedImportResult/successes/0/internalId")
                .and_then(Value::as_i64)
        })
        .filter(|id| *id != 0)
}
