use crate::models::Point;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScaleError {
    #[error("calibration distance must be positive, got {0}")]
    NonPositiveDistance(f64),
    #[error("calibration points cannot be the same")]
    DegenerateLine,
}

/// Pixels per inch for a calibration line of known physical length.
///
/// Rejects a zero-length line and any distance that is not strictly
/// positive (NaN included) instead of dividing through.
pub fn pixels_per_inch(point1: Point, point2: Point, distance_inches: f64) -> Result<f64, ScaleError> {
    if distance_inches.is_nan() || distance_inches <= 0.0 || distance_inches.is_infinite() {
        return Err(ScaleError::NonPositiveDistance(distance_inches));
    }
    let pixel_distance = point1.distance_to(point2);
    if pixel_distance == 0.0 || !pixel_distance.is_finite() {
        return Err(ScaleError::DegenerateLine);
    }
    Ok(pixel_distance / distance_inches)
}
