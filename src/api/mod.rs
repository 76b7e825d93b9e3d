// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Typed wrappers over Garmin Connect REST endpoints
//!
//! Each submodule adds methods to [`crate::client::GarminClient`]. Response
//! structs keep every field optional: the service omits fields freely and the
//! shapes are not documented.

pub mod activities;
pub mod body_composition;
pub mod gear;
pub mod types;
pub mod user;
pub mod wellness;

pub use activities::{
    ActivitiesPage, Activity, ActivityDetail, ActivityGear, ActivityType, GpsTrackPoint, Weather,
};
pub use body_composition::BodyComposition;
pub use gear::{GearActivity, GearItem, GearStats};
pub use types::{GarminTime, Pagination};
pub use user::{UserProfile, UserStats};
pub use wellness::{BodyBatteryData, DailySteps, DailyStress, HrvData, SleepData, SleepScores};
