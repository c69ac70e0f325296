use photomoa_shared::models::{
    AnalysisResult, CalibrateRequest, CalibrateResponse, DistanceUnit, Point, UpdateShotsRequest,
};

use crate::api::{ApiError, ResultSyncClient};
use crate::calibration::{CalibrationError, CalibrationSession, PointerEvent};
use crate::shots::ManualShotSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Shots,
    Calibrating,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// The held result changed after a successful submission.
    ResultReplaced(AnalysisResult),
    Calibrated {
        pixels_per_inch: f64,
        moa_value: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("Calibration failed: {0}")]
    CalibrationRequest(ApiError),
    #[error("Failed to update shots: {0}")]
    ShotUpdate(ApiError),
    #[error("No manual shots to submit")]
    NoManualShots,
    #[error("A {0} is already in progress")]
    Pending(&'static str),
    #[error("Shots cannot be added while calibrating")]
    CalibrationActive,
    #[error("Calibration mode is not active")]
    NotCalibrating,
}

const CALIBRATION: &str = "calibration";
const SHOT_UPDATE: &str = "shot update";

type Observer = Box<dyn FnMut(&ViewerEvent)>;

/// Controller for one displayed result: routes pointer input to either the
/// calibration session or the manual shot set, and merges server responses
/// back into the held result.
///
/// Submissions are split into `begin_*` and `finish_*` so a UI can release
/// its borrow across the network call. A failed submission leaves the result,
/// session and shot set exactly as they were.
pub struct ResultViewer {
    result: AnalysisResult,
    mode: EditMode,
    session: CalibrationSession,
    manual: ManualShotSet,
    calibration_pending: bool,
    shots_pending: bool,
    observers: Vec<Observer>,
}

impl ResultViewer {
    pub fn new(result: AnalysisResult) -> Self {
        ResultViewer {
            result,
            mode: EditMode::Shots,
            session: CalibrationSession::default(),
            manual: ManualShotSet::default(),
            calibration_pending: false,
            shots_pending: false,
            observers: Vec::new(),
        }
    }

    pub fn result(&self) -> &AnalysisResult {
        &self.result
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn is_calibrating(&self) -> bool {
        self.mode == EditMode::Calibrating
    }

    pub fn session(&self) -> &CalibrationSession {
        &self.session
    }

    pub fn manual_shots(&self) -> &ManualShotSet {
        &self.manual
    }

    pub fn calibration_pending(&self) -> bool {
        self.calibration_pending
    }

    pub fn shots_pending(&self) -> bool {
        self.shots_pending
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ViewerEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: ViewerEvent) {
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
    }

    fn guard_shots(&self) -> Result<(), ViewerError> {
        if self.shots_pending {
            return Err(ViewerError::Pending(SHOT_UPDATE));
        }
        Ok(())
    }

    fn guard_calibration(&self) -> Result<(), ViewerError> {
        if !self.is_calibrating() {
            return Err(ViewerError::NotCalibrating);
        }
        if self.calibration_pending {
            return Err(ViewerError::Pending(CALIBRATION));
        }
        Ok(())
    }

    /// Start a fresh calibration. Unsubmitted manual shots are dropped.
    pub fn enter_calibration(&mut self) -> Result<(), ViewerError> {
        self.guard_shots()?;
        if self.calibration_pending {
            return Err(ViewerError::Pending(CALIBRATION));
        }
        self.manual.clear();
        self.session.reset();
        self.mode = EditMode::Calibrating;
        Ok(())
    }

    pub fn cancel_calibration(&mut self) -> Result<(), ViewerError> {
        if self.calibration_pending {
            return Err(ViewerError::Pending(CALIBRATION));
        }
        self.session.reset();
        self.mode = EditMode::Shots;
        Ok(())
    }

    /// Returns whether anything changed.
    pub fn pointer_down(&mut self, point: Point) -> Result<bool, ViewerError> {
        match self.mode {
            EditMode::Calibrating => Ok(self.session.handle(PointerEvent::Down(point))),
            EditMode::Shots => self.add_shot(point).map(|_| true),
        }
    }

    pub fn pointer_move(&mut self, point: Point) -> bool {
        match self.mode {
            EditMode::Calibrating => self.session.handle(PointerEvent::Move(point)),
            EditMode::Shots => false,
        }
    }

    pub fn add_shot(&mut self, point: Point) -> Result<(), ViewerError> {
        if self.is_calibrating() {
            return Err(ViewerError::CalibrationActive);
        }
        self.guard_shots()?;
        self.manual.append(point);
        Ok(())
    }

    pub fn undo_shot(&mut self) -> Result<Option<Point>, ViewerError> {
        self.guard_shots()?;
        Ok(self.manual.undo())
    }

    pub fn clear_shots(&mut self) -> Result<(), ViewerError> {
        self.guard_shots()?;
        self.manual.clear();
        Ok(())
    }

    pub fn set_distance(&mut self, value: f64) -> Result<(), ViewerError> {
        self.guard_calibration()?;
        Ok(self.session.set_distance(value)?)
    }

    pub fn set_unit(&mut self, unit: DistanceUnit) -> Result<(), ViewerError> {
        self.guard_calibration()?;
        Ok(self.session.set_unit(unit)?)
    }

    pub fn begin_calibration(&mut self) -> Result<(String, CalibrateRequest), ViewerError> {
        self.guard_calibration()?;
        let request = self.session.request()?;
        self.calibration_pending = true;
        Ok((self.result.id.clone(), request))
    }

    /// Apply the outcome of a calibration request. Success replaces the MOA
    /// value and the scale; failure keeps the completed line for a retry.
    pub fn finish_calibration(
        &mut self,
        outcome: Result<CalibrateResponse, ApiError>,
    ) -> Result<(), ViewerError> {
        self.calibration_pending = false;
        let response = outcome.map_err(ViewerError::CalibrationRequest)?;

        self.result = self
            .result
            .with_calibration(response.moa_value, response.pixels_per_inch);
        self.session.reset();
        self.mode = EditMode::Shots;

        self.emit(ViewerEvent::Calibrated {
            pixels_per_inch: response.pixels_per_inch,
            moa_value: response.moa_value,
        });
        self.emit(ViewerEvent::ResultReplaced(self.result.clone()));
        Ok(())
    }

    pub fn begin_shot_update(&mut self) -> Result<(String, UpdateShotsRequest), ViewerError> {
        if self.is_calibrating() {
            return Err(ViewerError::CalibrationActive);
        }
        self.guard_shots()?;
        if self.manual.is_empty() {
            return Err(ViewerError::NoManualShots);
        }
        self.shots_pending = true;
        Ok((self.result.id.clone(), self.manual.to_request()))
    }

    /// Apply the outcome of a shot update. The server's result becomes the
    /// held result in full.
    pub fn finish_shot_update(
        &mut self,
        outcome: Result<AnalysisResult, ApiError>,
    ) -> Result<(), ViewerError> {
        self.shots_pending = false;
        let result = outcome.map_err(ViewerError::ShotUpdate)?;

        self.result = result;
        self.manual.clear();
        self.emit(ViewerEvent::ResultReplaced(self.result.clone()));
        Ok(())
    }

    pub async fn submit_calibration<C: ResultSyncClient>(
        &mut self,
        client: &C,
    ) -> Result<(), ViewerError> {
        let (id, request) = self.begin_calibration()?;
        let outcome = client.calibrate(&id, &request).await;
        self.finish_calibration(outcome)
    }

    pub async fn submit_manual_shots<C: ResultSyncClient>(
        &mut self,
        client: &C,
    ) -> Result<(), ViewerError> {
        let (id, request) = self.begin_shot_update()?;
        let outcome = client.update_shots(&id, &request).await;
        self.finish_shot_update(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photomoa_shared::calc::MeasurementCalculator;
    use photomoa_shared::scale;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// In-memory server: appends submitted shots and recomputes like the
    /// backend does, or fails every call when `fail` is set.
    struct FakeClient {
        shots: RefCell<Vec<Point>>,
        fail: bool,
        calls: RefCell<Vec<String>>,
    }

    impl FakeClient {
        fn new(shots: Vec<Point>) -> Self {
            FakeClient {
                shots: RefCell::new(shots),
                fail: false,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            FakeClient {
                fail: true,
                ..FakeClient::new(Vec::new())
            }
        }

        fn error() -> ApiError {
            ApiError::Status {
                status: 500,
                message: "boom".to_string(),
            }
        }
    }

    impl ResultSyncClient for FakeClient {
        async fn calibrate(
            &self,
            id: &str,
            request: &CalibrateRequest,
        ) -> Result<CalibrateResponse, ApiError> {
            self.calls.borrow_mut().push(format!("calibrate/{id}"));
            if self.fail {
                return Err(Self::error());
            }
            let ppi = scale::pixels_per_inch(request.point1, request.point2, request.distance_inches)
                .map_err(|e| ApiError::Status {
                    status: 400,
                    message: e.to_string(),
                })?;
            Ok(CalibrateResponse {
                moa_value: MeasurementCalculator::with_scale(Some(ppi)).moa(&self.shots.borrow()),
                pixels_per_inch: ppi,
            })
        }

        async fn update_shots(
            &self,
            id: &str,
            request: &UpdateShotsRequest,
        ) -> Result<AnalysisResult, ApiError> {
            self.calls.borrow_mut().push(format!("update-shots/{id}"));
            if self.fail {
                return Err(Self::error());
            }
            let mut shots = self.shots.borrow_mut();
            shots.extend(request.manual_shots.iter().copied());
            Ok(AnalysisResult {
                id: id.to_string(),
                shot_count: shots.len(),
                moa_value: MeasurementCalculator::default().moa(&shots),
                annotated_image: "/api/image/annotated_x.jpg".to_string(),
                shots: shots.clone(),
                pixels_per_inch: Some(100.0),
            })
        }
    }

    fn detected() -> Vec<Point> {
        vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(0.0, 10.0)]
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            id: "20240101_120000".to_string(),
            shot_count: 3,
            moa_value: Some(0.135),
            annotated_image: "/api/image/annotated_x.jpg".to_string(),
            shots: detected(),
            pixels_per_inch: Some(100.0),
        }
    }

    fn record_events(viewer: &mut ResultViewer) -> Rc<RefCell<Vec<ViewerEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        viewer.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    /// Viewer in calibration mode with a 20px line declared as 2 inches.
    fn calibrating_viewer() -> ResultViewer {
        let mut viewer = ResultViewer::new(result());
        viewer.enter_calibration().unwrap();
        viewer.pointer_down(Point::new(0.0, 0.0)).unwrap();
        viewer.pointer_move(Point::new(15.0, 0.0));
        viewer.pointer_down(Point::new(20.0, 0.0)).unwrap();
        viewer.set_distance(2.0).unwrap();
        viewer
    }

    #[test]
    fn test_entering_calibration_clears_manual_shots() {
        let mut viewer = ResultViewer::new(result());
        viewer.pointer_down(Point::new(5.0, 5.0)).unwrap();
        viewer.pointer_down(Point::new(6.0, 6.0)).unwrap();
        assert_eq!(viewer.manual_shots().len(), 2);

        viewer.enter_calibration().unwrap();
        assert!(viewer.manual_shots().is_empty());
        assert_eq!(viewer.mode(), EditMode::Calibrating);
    }

    #[test]
    fn test_add_shot_rejected_while_calibrating() {
        let mut viewer = ResultViewer::new(result());
        viewer.enter_calibration().unwrap();
        assert_eq!(
            viewer.add_shot(Point::new(1.0, 1.0)),
            Err(ViewerError::CalibrationActive)
        );
        // pointer input goes to the session instead
        assert!(viewer.pointer_down(Point::new(1.0, 1.0)).unwrap());
        assert!(viewer.manual_shots().is_empty());
        assert_eq!(viewer.session().point1(), Some(Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_cancel_calibration_discards_line() {
        let mut viewer = ResultViewer::new(result());
        viewer.enter_calibration().unwrap();
        viewer.pointer_down(Point::new(1.0, 1.0)).unwrap();
        viewer.pointer_move(Point::new(9.0, 1.0));
        viewer.cancel_calibration().unwrap();
        assert_eq!(viewer.mode(), EditMode::Shots);
        assert_eq!(viewer.session().point1(), None);
        assert_eq!(viewer.session().point2(), None);
        assert!(!viewer.pointer_move(Point::new(2.0, 2.0)));
    }

    #[test]
    fn test_begin_calibration_twice_is_refused() {
        let mut viewer = calibrating_viewer();
        viewer.begin_calibration().unwrap();
        assert!(viewer.calibration_pending());
        assert_eq!(
            viewer.begin_calibration(),
            Err(ViewerError::Pending("calibration"))
        );
        assert_eq!(viewer.set_distance(3.0), Err(ViewerError::Pending("calibration")));
        assert_eq!(viewer.cancel_calibration(), Err(ViewerError::Pending("calibration")));
    }

    #[test]
    fn test_begin_shot_update_twice_is_refused() {
        let mut viewer = ResultViewer::new(result());
        viewer.add_shot(Point::new(3.0, 3.0)).unwrap();
        viewer.begin_shot_update().unwrap();
        assert_eq!(
            viewer.begin_shot_update(),
            Err(ViewerError::Pending("shot update"))
        );
        assert_eq!(
            viewer.add_shot(Point::new(4.0, 4.0)),
            Err(ViewerError::Pending("shot update"))
        );
        assert_eq!(viewer.undo_shot(), Err(ViewerError::Pending("shot update")));
        assert_eq!(viewer.manual_shots().len(), 1);
    }

    #[test]
    fn test_refused_edits_explain_themselves() {
        let mut viewer = ResultViewer::new(result());
        let err = viewer.set_unit(DistanceUnit::Centimeters).unwrap_err();
        assert_eq!(err.to_string(), "Calibration mode is not active");

        viewer.enter_calibration().unwrap();
        viewer.pointer_down(Point::new(0.0, 0.0)).unwrap();
        let err = viewer.set_distance(3.0).unwrap_err();
        assert_eq!(err.to_string(), "distance can only be changed once both points are set");
        viewer.cancel_calibration().unwrap();

        viewer.add_shot(Point::new(3.0, 3.0)).unwrap();
        viewer.begin_shot_update().unwrap();
        let err = viewer.clear_shots().unwrap_err();
        assert_eq!(err.to_string(), "A shot update is already in progress");
        assert_eq!(viewer.manual_shots().len(), 1);
    }

    #[test]
    fn test_shot_update_needs_manual_shots() {
        let mut viewer = ResultViewer::new(result());
        assert_eq!(viewer.begin_shot_update(), Err(ViewerError::NoManualShots));
        assert!(!viewer.shots_pending());
    }

    #[tokio::test]
    async fn test_calibration_success_replaces_moa_and_scale() {
        let client = FakeClient::new(detected());
        let mut viewer = calibrating_viewer();
        let events = record_events(&mut viewer);

        viewer.submit_calibration(&client).await.unwrap();

        let moa = viewer.result().moa_value.unwrap();
        assert!((moa - 1.351).abs() < 1e-3);
        assert_eq!(viewer.result().shots, detected());
        assert_eq!(viewer.result().shot_count, 3);
        assert_eq!(viewer.result().pixels_per_inch, Some(10.0));
        assert_eq!(viewer.mode(), EditMode::Shots);
        assert_eq!(viewer.session().point1(), None);
        assert!(!viewer.calibration_pending());
        assert_eq!(client.calls.borrow().as_slice(), ["calibrate/20240101_120000"]);

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            ViewerEvent::Calibrated {
                pixels_per_inch: 10.0,
                moa_value: viewer.result().moa_value,
            }
        );
        assert_eq!(events[1], ViewerEvent::ResultReplaced(viewer.result().clone()));
    }

    #[tokio::test]
    async fn test_calibration_failure_keeps_state() {
        let client = FakeClient::failing();
        let mut viewer = calibrating_viewer();
        let events = record_events(&mut viewer);
        let session_before = viewer.session().clone();

        let err = viewer.submit_calibration(&client).await.unwrap_err();
        assert!(matches!(err, ViewerError::CalibrationRequest(_)));
        assert_eq!(viewer.result(), &result());
        assert_eq!(viewer.session(), &session_before);
        assert!(viewer.session().is_complete());
        assert_eq!(viewer.mode(), EditMode::Calibrating);
        assert!(!viewer.calibration_pending());
        assert!(events.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_degenerate_line_never_sent() {
        let client = FakeClient::new(detected());
        let mut viewer = ResultViewer::new(result());
        viewer.enter_calibration().unwrap();
        viewer.pointer_down(Point::new(4.0, 4.0)).unwrap();
        viewer.pointer_move(Point::new(4.0, 4.0));
        viewer.pointer_down(Point::new(4.0, 4.0)).unwrap();

        let err = viewer.submit_calibration(&client).await.unwrap_err();
        assert!(matches!(err, ViewerError::Calibration(CalibrationError::Scale(_))));
        assert!(client.calls.borrow().is_empty());
        assert!(!viewer.calibration_pending());
    }

    #[tokio::test]
    async fn test_shot_update_success_replaces_result() {
        let client = FakeClient::new(vec![Point::new(0.0, 0.0)]);
        let mut viewer = ResultViewer::new(AnalysisResult {
            shot_count: 1,
            moa_value: None,
            shots: vec![Point::new(0.0, 0.0)],
            ..result()
        });
        let events = record_events(&mut viewer);

        viewer.add_shot(Point::new(104.7, 0.0)).unwrap();
        viewer.submit_manual_shots(&client).await.unwrap();

        assert_eq!(viewer.result().shot_count, 2);
        assert!((viewer.result().moa_value.unwrap() - 1.0).abs() < 1e-9);
        assert!(viewer.manual_shots().is_empty());
        assert!(!viewer.shots_pending());
        assert_eq!(
            events.borrow().as_slice(),
            [ViewerEvent::ResultReplaced(viewer.result().clone())]
        );
    }

    #[tokio::test]
    async fn test_shot_update_failure_keeps_manual_shots() {
        let client = FakeClient::failing();
        let mut viewer = ResultViewer::new(result());
        viewer.add_shot(Point::new(7.0, 7.0)).unwrap();
        viewer.add_shot(Point::new(8.0, 8.0)).unwrap();

        let err = viewer.submit_manual_shots(&client).await.unwrap_err();
        assert!(matches!(err, ViewerError::ShotUpdate(_)));
        assert_eq!(err.to_string(), "Failed to update shots: boom");
        assert_eq!(viewer.manual_shots().len(), 2);
        assert_eq!(viewer.result(), &result());
        assert!(!viewer.shots_pending());

        // retry goes through once the server recovers
        let client = FakeClient::new(detected());
        viewer.submit_manual_shots(&client).await.unwrap();
        assert_eq!(viewer.result().shot_count, 5);
    }
}
