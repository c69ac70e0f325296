use crate::models::Point;

/// Scale assumed for a target that has never been calibrated.
pub const DEFAULT_PIXELS_PER_INCH: f64 = 100.0;

/// Sight distance every measurement assumes.
pub const DEFAULT_DISTANCE_YARDS: f64 = 100.0;

/// Inches subtended by one minute of angle at 100 yards.
pub const INCHES_PER_MOA_AT_100_YARDS: f64 = 1.047;

/// Largest pairwise distance in the set, in pixels.
/// `None` for fewer than two shots.
pub fn extreme_spread_px(shots: &[Point]) -> Option<f64> {
    if shots.len() < 2 {
        return None;
    }
    let mut max = 0.0_f64;
    for (i, a) in shots.iter().enumerate() {
        for b in &shots[i + 1..] {
            max = max.max(a.distance_to(*b));
        }
    }
    Some(max)
}

/// Mean position of the set. `None` when empty.
pub fn group_center(shots: &[Point]) -> Option<Point> {
    if shots.is_empty() {
        return None;
    }
    let n = shots.len() as f64;
    let (sx, sy) = shots
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Convert a physical spread to minutes of angle at the given distance.
pub fn inches_to_moa(inches: f64, distance_yards: f64) -> f64 {
    inches / (INCHES_PER_MOA_AT_100_YARDS * distance_yards / 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub shot_count: usize,
    pub extreme_spread_moa: Option<f64>,
    pub center_to_center_moa: Option<f64>,
    pub group_center: Option<Point>,
    pub group_size_inches: Option<f64>,
}

/// Extreme-spread group measurement for one scale and sight distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementCalculator {
    pub pixels_per_inch: f64,
    pub distance_yards: f64,
}

impl Default for MeasurementCalculator {
    fn default() -> Self {
        MeasurementCalculator {
            pixels_per_inch: DEFAULT_PIXELS_PER_INCH,
            distance_yards: DEFAULT_DISTANCE_YARDS,
        }
    }
}

impl MeasurementCalculator {
    /// Calculator at the default sight distance using `pixels_per_inch`,
    /// or the default scale when the target was never calibrated.
    pub fn with_scale(pixels_per_inch: Option<f64>) -> Self {
        MeasurementCalculator {
            pixels_per_inch: pixels_per_inch.unwrap_or(DEFAULT_PIXELS_PER_INCH),
            ..Default::default()
        }
    }

    /// Extreme spread in inches. `None` for fewer than two shots.
    pub fn group_size_inches(&self, shots: &[Point]) -> Option<f64> {
        extreme_spread_px(shots).map(|px| px / self.pixels_per_inch)
    }

    /// Extreme-spread MOA. `None` (never zero) for fewer than two shots.
    pub fn moa(&self, shots: &[Point]) -> Option<f64> {
        self.group_size_inches(shots)
            .map(|inches| inches_to_moa(inches, self.distance_yards))
    }

    /// MOA of the largest distance from the group center to any shot.
    pub fn center_to_center_moa(&self, shots: &[Point]) -> Option<f64> {
        if shots.len() < 2 {
            return None;
        }
        let center = group_center(shots)?;
        let max_px = shots
            .iter()
            .map(|p| center.distance_to(*p))
            .fold(0.0_f64, f64::max);
        Some(inches_to_moa(max_px / self.pixels_per_inch, self.distance_yards))
    }

    pub fn group_stats(&self, shots: &[Point]) -> GroupStats {
        GroupStats {
            shot_count: shots.len(),
            extreme_spread_moa: self.moa(shots),
            center_to_center_moa: self.center_to_center_moa(shots),
            group_center: group_center(shots),
            group_size_inches: self.group_size_inches(shots),
        }
    }
}
