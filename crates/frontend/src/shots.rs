use photomoa_shared::models::{Point, UpdateShotsRequest};

/// Shots the user added by hand, in click order and native pixel space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualShotSet {
    shots: Vec<Point>,
}

impl ManualShotSet {
    pub fn append(&mut self, point: Point) {
        self.shots.push(point);
    }

    /// Remove the most recent shot. Empty sets stay empty.
    pub fn undo(&mut self) -> Option<Point> {
        self.shots.pop()
    }

    pub fn clear(&mut self) {
        self.shots.clear();
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.shots
    }

    pub fn to_request(&self) -> UpdateShotsRequest {
        UpdateShotsRequest {
            manual_shots: self.shots.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_on_empty() {
        let mut set = ManualShotSet::default();
        assert_eq!(set.undo(), None);
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_undo_after_appends() {
        let mut set = ManualShotSet::default();
        for i in 0..5 {
            set.append(Point::new(i as f64, 0.0));
        }
        assert_eq!(set.undo(), Some(Point::new(4.0, 0.0)));
        assert_eq!(set.len(), 4);
        assert_eq!(set.as_slice().last(), Some(&Point::new(3.0, 0.0)));
    }

    #[test]
    fn test_clear() {
        let mut set = ManualShotSet::default();
        set.append(Point::new(1.0, 2.0));
        set.append(Point::new(3.0, 4.0));
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_request_keeps_order() {
        let mut set = ManualShotSet::default();
        set.append(Point::new(5.0, 6.0));
        set.append(Point::new(1.0, 2.0));
        let json = serde_json::to_value(set.to_request()).unwrap();
        assert_eq!(json, serde_json::json!({"manual_shots": [[5.0, 6.0], [1.0, 2.0]]}));
    }
}
