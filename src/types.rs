use geo::{MultiLineString, MultiPolygon};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationRecord {
    pub fips: u32,
    pub state: String,
    pub area_name: String,
    #[serde(rename = "bachelorsOrHigher")]
    pub bachelors_or_higher: f64,
}

#[derive(Debug, Clone)]
pub struct County {
    pub fips: u32,
    pub geometry: MultiPolygon<f64>,
}

/// Borders shared by two different states. Stroke only, no per-feature data.
pub type StateMesh = MultiLineString<f64>;
