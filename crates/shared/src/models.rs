use serde::{Deserialize, Serialize};

/// Centimeters in one inch.
pub const CM_PER_INCH: f64 = 2.54;

/// A coordinate in native image pixel space.
///
/// Serialized as a `[x, y]` array. Arrays with extra trailing values
/// (detectors append a radius) are accepted and the extras dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PointError {
    #[error("a point needs at least 2 coordinates, got {0}")]
    TooShort(usize),
}

impl TryFrom<Vec<f64>> for Point {
    type Error = PointError;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        match v.as_slice() {
            [x, y, ..] => Ok(Point { x: *x, y: *y }),
            _ => Err(PointError::TooShort(v.len())),
        }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point { x, y }
    }
}

/// Unit the user declares a calibration distance in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Inches,
    Centimeters,
}

impl DistanceUnit {
    pub const ALL: [DistanceUnit; 2] = [DistanceUnit::Inches, DistanceUnit::Centimeters];

    pub fn to_inches(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Inches => value,
            DistanceUnit::Centimeters => value / CM_PER_INCH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DistanceUnit::Inches => "inches",
            DistanceUnit::Centimeters => "centimeters",
        }
    }
}

impl std::fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DistanceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inches" => Ok(DistanceUnit::Inches),
            "centimeters" => Ok(DistanceUnit::Centimeters),
            other => Err(format!("Unknown distance unit: {}", other)),
        }
    }
}

/// Measurement of one uploaded target, as returned by upload and update-shots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: String,
    pub shot_count: usize,
    pub moa_value: Option<f64>,
    /// URL of the rendered target image.
    pub annotated_image: String,
    #[serde(default)]
    pub shots: Vec<Point>,
    /// Scale the MOA was measured at: the entry's calibration, or the server
    /// default before any calibration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixels_per_inch: Option<f64>,
}

impl AnalysisResult {
    /// Copy of this result re-measured at a new scale. Shots are unchanged.
    pub fn with_calibration(&self, moa_value: Option<f64>, pixels_per_inch: f64) -> Self {
        AnalysisResult {
            moa_value,
            pixels_per_inch: Some(pixels_per_inch),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub filename: String,
    pub annotated_filename: String,
    pub upload_time: String,
    pub shot_count: usize,
    pub moa_value: Option<f64>,
    #[serde(default)]
    pub shots: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrateRequest {
    pub point1: Point,
    pub point2: Point,
    pub distance_inches: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrateResponse {
    pub moa_value: Option<f64>,
    pub pixels_per_inch: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateShotsRequest {
    #[serde(default)]
    pub manual_shots: Vec<Point>,
}

/// Body of every non-success response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(12.5, 40.0)).unwrap();
        assert_eq!(json, "[12.5,40.0]");
    }

    #[test]
    fn test_point_drops_detector_radius() {
        let p: Point = serde_json::from_str("[100.0, 200.0, 10.0]").unwrap();
        assert_eq!(p, Point::new(100.0, 200.0));
    }

    #[test]
    fn test_point_rejects_single_value() {
        let res: Result<Point, _> = serde_json::from_str("[1.0]");
        assert!(res.is_err());
    }

    #[test]
    fn test_distance_to() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_centimeters_to_inches() {
        let inches = DistanceUnit::Centimeters.to_inches(2.54);
        assert!((inches - 1.0).abs() < 1e-12);
        assert_eq!(DistanceUnit::Inches.to_inches(3.0), 3.0);
    }

    #[test]
    fn test_distance_unit_round_trips_through_str() {
        for unit in DistanceUnit::ALL {
            assert_eq!(unit.as_str().parse::<DistanceUnit>().unwrap(), unit);
        }
        assert!("furlongs".parse::<DistanceUnit>().is_err());
    }

    #[test]
    fn test_analysis_result_ignores_extra_fields() {
        let json = r#"{"success":true,"id":"20240101_120000","shot_count":2,"moa_value":1.5,"annotated_image":"/api/image/a.jpg","shots":[[1,2],[3,4,10]],"manual_shots":[]}"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.id, "20240101_120000");
        assert_eq!(result.shots, vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
        assert_eq!(result.moa_value, Some(1.5));
        assert!(result.pixels_per_inch.is_none());
    }

    #[test]
    fn test_analysis_result_null_moa() {
        let json = r#"{"id":"x","shot_count":0,"moa_value":null,"annotated_image":"","shots":[]}"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert!(result.moa_value.is_none());
    }

    #[test]
    fn test_with_calibration_keeps_shots() {
        let result = AnalysisResult {
            id: "a".to_string(),
            shot_count: 1,
            moa_value: None,
            annotated_image: String::new(),
            shots: vec![Point::new(1.0, 1.0)],
            pixels_per_inch: Some(100.0),
        };
        let updated = result.with_calibration(Some(2.0), 42.5);
        assert_eq!(updated.moa_value, Some(2.0));
        assert_eq!(updated.pixels_per_inch, Some(42.5));
        assert_eq!(updated.shots, result.shots);
    }

    #[test]
    fn test_analysis_result_scale_on_the_wire() {
        let json = r#"{"id":"x","shot_count":0,"moa_value":null,"annotated_image":"","shots":[],"pixels_per_inch":96.5}"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.pixels_per_inch, Some(96.5));
    }

    #[test]
    fn test_calibrate_request_wire_shape() {
        let req = CalibrateRequest {
            point1: Point::new(10.0, 20.0),
            point2: Point::new(30.0, 20.0),
            distance_inches: 1.0,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["point1"][0], 10.0);
        assert_eq!(json["point2"][1], 20.0);
        assert_eq!(json["distance_inches"], 1.0);
    }

    #[test]
    fn test_update_shots_request_wire_shape() {
        let req = UpdateShotsRequest {
            manual_shots: vec![Point::new(5.0, 6.0)],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"manual_shots":[[5.0,6.0]]}"#);
    }
}
