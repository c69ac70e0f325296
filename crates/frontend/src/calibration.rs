use photomoa_shared::models::{CalibrateRequest, DistanceUnit, Point};
use photomoa_shared::scale::{self, ScaleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationState {
    #[default]
    Idle,
    FirstPoint,
    Dragging,
    Complete,
}

/// Pointer input already mapped to native image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration line is not complete")]
    NotComplete,
    #[error("distance can only be changed once both points are set")]
    InputsLocked,
    #[error(transparent)]
    Scale(#[from] ScaleError),
}

/// Transition table for the two-point pick. `None` means the event is
/// ignored in that state.
pub fn next_state(state: CalibrationState, event: PointerEvent) -> Option<CalibrationState> {
    use CalibrationState::*;
    match (state, event) {
        (Idle, PointerEvent::Down(_)) => Some(FirstPoint),
        (FirstPoint, PointerEvent::Move(_)) => Some(Dragging),
        (Dragging, PointerEvent::Move(_)) => Some(Dragging),
        (Dragging, PointerEvent::Down(_)) => Some(Complete),
        _ => None,
    }
}

/// Click, drag, click: picks a reference line and its physical length.
///
/// `point2` only exists while dragging or complete. Distance and unit are
/// locked until the line is frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSession {
    state: CalibrationState,
    point1: Option<Point>,
    point2: Option<Point>,
    distance_value: f64,
    distance_unit: DistanceUnit,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        CalibrationSession {
            state: CalibrationState::Idle,
            point1: None,
            point2: None,
            distance_value: 1.0,
            distance_unit: DistanceUnit::Inches,
        }
    }
}

impl CalibrationSession {
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn point1(&self) -> Option<Point> {
        self.point1
    }

    pub fn point2(&self) -> Option<Point> {
        self.point2
    }

    pub fn distance_value(&self) -> f64 {
        self.distance_value
    }

    pub fn distance_unit(&self) -> DistanceUnit {
        self.distance_unit
    }

    pub fn is_complete(&self) -> bool {
        self.state == CalibrationState::Complete
    }

    /// Apply a pointer event. Returns whether the session changed.
    pub fn handle(&mut self, event: PointerEvent) -> bool {
        let Some(next) = next_state(self.state, event) else {
            return false;
        };
        match (self.state, event) {
            (CalibrationState::Idle, PointerEvent::Down(p)) => {
                self.point1 = Some(p);
                self.point2 = None;
            }
            (_, PointerEvent::Move(p)) | (_, PointerEvent::Down(p)) => {
                self.point2 = Some(p);
            }
        }
        self.state = next;
        true
    }

    /// Back to idle with both points cleared and default inputs.
    pub fn reset(&mut self) {
        *self = CalibrationSession::default();
    }

    pub fn set_distance(&mut self, value: f64) -> Result<(), CalibrationError> {
        if !self.is_complete() {
            return Err(CalibrationError::InputsLocked);
        }
        self.distance_value = value;
        Ok(())
    }

    pub fn set_unit(&mut self, unit: DistanceUnit) -> Result<(), CalibrationError> {
        if !self.is_complete() {
            return Err(CalibrationError::InputsLocked);
        }
        self.distance_unit = unit;
        Ok(())
    }

    pub fn distance_inches(&self) -> f64 {
        self.distance_unit.to_inches(self.distance_value)
    }

    /// Build the submission for a completed line, rejecting a zero-length
    /// line or a non-positive distance before anything is sent.
    pub fn request(&self) -> Result<CalibrateRequest, CalibrationError> {
        let (Some(point1), Some(point2), true) = (self.point1, self.point2, self.is_complete())
        else {
            return Err(CalibrationError::NotComplete);
        };
        let distance_inches = self.distance_inches();
        scale::pixels_per_inch(point1, point2, distance_inches)?;
        Ok(CalibrateRequest {
            point1,
            point2,
            distance_inches,
        })
    }

    pub fn cancel_label(&self) -> &'static str {
        if self.is_complete() {
            "Reset"
        } else {
            "Cancel"
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self.state {
            CalibrationState::Idle => {
                "Click on the first point of a known distance (e.g. the edge of a 1-inch square)."
            }
            CalibrationState::FirstPoint => "Now drag to the second point and click to set it.",
            CalibrationState::Dragging => "Click to set the second point.",
            CalibrationState::Complete => "Enter the distance between the points and apply.",
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self.state {
            CalibrationState::Idle => "Ready for first point",
            CalibrationState::FirstPoint => "Drag to second point",
            CalibrationState::Dragging => "Click to confirm second point",
            CalibrationState::Complete => "Ready to calibrate",
        }
    }
}
