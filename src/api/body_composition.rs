// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::GarminTime;
use crate::client::GarminClient;
use crate::constants::{api_endpoints, DATE_FORMAT};
use crate::error::{GarminError, Result};

/// One scale measurement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BodyComposition {
    /// Grams
    pub bone_mass: Option<f64>,
    /// Grams
    pub muscle_mass: Option<f64>,
    /// Percent
    pub body_fat: Option<f64>,
    /// Percent
    pub hydration: Option<f64>,
    pub timestamp: Option<GarminTime>,
}

impl GarminClient {
    /// Measurements between `start` and `end`, both inclusive
    pub async fn get_body_composition(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BodyComposition>> {
        if start > end {
            return Err(GarminError::InvalidInput(format!(
                "invalid date range: start {start} is after end {end}"
            )));
        }

        let measurements: Option<Vec<BodyComposition>> = self
            .get_with_query(
                api_endpoints::BODY_COMPOSITION,
                &[
                    ("startDate", start.format(DATE_FORMAT).to_string()),
                    ("endDate", end.format(DATE_FORMAT).to_string()),
                ],
            )
            .await?;
        Ok(measurements.unwrap_or_default())
    }
}
