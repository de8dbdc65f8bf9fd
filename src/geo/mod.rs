//! Location handling for check-ins: great-circle distance, geofence checks
//! and the accuracy-driven acquisition session.

pub mod acquisition;
pub mod distance;
pub mod sensor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use acquisition::{AcquisitionConfig, LocationResult, settle_samples};
pub use distance::distance_km;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = 23.0225)]
    pub latitude: f64,
    #[schema(example = 72.5714)]
    pub longitude: f64,
}

/// One fix from a location sensor. `accuracy` is the error radius in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    #[schema(example = 25.0)]
    pub accuracy: f64,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
}

impl LocationReading {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn is_reliable(&self, required_accuracy_m: f64) -> bool {
        self.accuracy <= required_accuracy_m
    }
}
