// Scan session controller
//
// Owns the capture session lifecycle:
// Idle --start--> Scanning --supported code--> Detected --teardown--> Stopped
// and Stopped --start--> Scanning again.

use futures::StreamExt;
use std::collections::BTreeSet;
use tokio::sync::mpsc;

use super::{
    BoundingRegion, CameraCapability, CameraHandle, CameraResult, DecodedFrame, DetectedCode,
    FrameOutcome, FrameSubscription, ScanSession, SessionEvent, SessionStatus, Symbology,
};

struct ActiveCapture {
    handle: CameraHandle,
    frames: FrameSubscription,
}

/// Drives one screen's scan session.
///
/// Frame processing and teardown are synchronous, so a detection always
/// releases the camera before another frame can be pulled from the stream.
pub struct ScanSessionController {
    camera: Box<dyn CameraCapability>,
    supported: BTreeSet<Symbology>,
    session: ScanSession,
    capture: Option<ActiveCapture>,
    overlay: Option<BoundingRegion>,
    observers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl ScanSessionController {
    /// Controller listening for QR and Code 128
    pub fn new(camera: Box<dyn CameraCapability>) -> Self {
        Self::with_symbologies(camera, Symbology::default_supported())
    }

    pub fn with_symbologies(
        camera: Box<dyn CameraCapability>,
        supported: BTreeSet<Symbology>,
    ) -> Self {
        Self {
            camera,
            session: ScanSession::new(supported.clone()),
            supported,
            capture: None,
            overlay: None,
            observers: Vec::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Current detection overlay bounds, `None` when nothing is framed
    pub fn overlay(&self) -> Option<BoundingRegion> {
        self.overlay
    }

    pub fn is_scanning(&self) -> bool {
        self.session.status == SessionStatus::Scanning
    }

    /// Receive every status and overlay change from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Open the rear camera and begin scanning.
    ///
    /// Calling this while a session is already running does nothing. On failure
    /// the camera is released and the status is left untouched.
    pub fn start(&mut self) -> CameraResult<()> {
        if self.session.status.is_active() {
            log::debug!("Scan session {} already running", self.session.id);
            return Ok(());
        }

        let handle = self.camera.open_rear_camera()?;
        let frames = match self.camera.begin_capture(&handle, &self.supported) {
            Ok(frames) => frames,
            Err(e) => {
                self.camera.end_capture(handle);
                return Err(e);
            }
        };

        let previous = self.session.status;
        self.session = ScanSession::new(self.supported.clone());
        self.capture = Some(ActiveCapture { handle, frames });
        self.set_overlay(None);
        self.transition(previous, SessionStatus::Scanning);

        log::info!(
            "Scan session {} started for {:?}",
            self.session.id,
            self.supported
        );
        Ok(())
    }

    /// Wait for the next analyzed frame.
    ///
    /// Returns `None` when no capture is running or the camera closed the feed.
    pub async fn next_frame(&mut self) -> Option<DecodedFrame> {
        match self.capture.as_mut() {
            Some(capture) => capture.frames.next().await,
            None => None,
        }
    }

    /// Apply one analyzed frame to the session.
    ///
    /// Only the first candidate of a frame is considered. A supported code with a
    /// non-empty value ends the session before this returns.
    pub fn on_frame_decoded(&mut self, frame: DecodedFrame) -> FrameOutcome {
        if !self.is_scanning() {
            return FrameOutcome::Ignored;
        }

        let Some(candidate) = frame.codes.into_iter().next() else {
            log::trace!("No code found");
            self.set_overlay(None);
            return FrameOutcome::Cleared;
        };

        if !self.session.supports(candidate.symbology) {
            log::trace!("Ignoring unsupported {} code", candidate.symbology);
            return FrameOutcome::Ignored;
        }
        if candidate.value.is_empty() {
            log::trace!("Ignoring {} code with no value", candidate.symbology);
            return FrameOutcome::Ignored;
        }

        log::info!("Code value is {:?} ({})", candidate.value, candidate.symbology);

        self.set_overlay(candidate.bounds);
        self.transition(SessionStatus::Scanning, SessionStatus::Detected);

        let detected = DetectedCode {
            session_id: self.session.id,
            symbology: candidate.symbology,
            value: candidate.value,
            bounds: candidate.bounds,
        };
        self.stop();
        FrameOutcome::Detected(detected)
    }

    /// Release the camera and remove the preview. A no-op when nothing is running.
    pub fn stop(&mut self) {
        if let Some(ActiveCapture { handle, frames }) = self.capture.take() {
            frames.unsubscribe();
            self.camera.end_capture(handle);
        }

        if !self.session.status.is_active() {
            return;
        }

        let previous = self.session.status;
        self.transition(previous, SessionStatus::Stopped);
        self.set_overlay(None);
        log::info!("Scan session {} stopped", self.session.id);
    }

    fn set_overlay(&mut self, bounds: Option<BoundingRegion>) {
        if self.overlay == bounds {
            return;
        }
        self.overlay = bounds;
        self.emit(SessionEvent::OverlayChanged(bounds));
    }

    fn transition(&mut self, from: SessionStatus, to: SessionStatus) {
        self.session.status = to;
        log::debug!("Scan session {}: {:?} -> {:?}", self.session.id, from, to);
        self.emit(SessionEvent::StatusChanged {
            session_id: self.session.id,
            from,
            to,
        });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Drop for ScanSessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{CameraError, CameraFault, DecodedCode, ScriptedCamera};
    use std::time::Duration;

    fn camera() -> ScriptedCamera {
        ScriptedCamera::new(Vec::new(), Duration::from_millis(50))
    }

    fn controller(camera: &ScriptedCamera) -> ScanSessionController {
        ScanSessionController::new(Box::new(camera.clone()))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn statuses(events: &[SessionEvent]) -> Vec<(SessionStatus, SessionStatus)> {
        events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::StatusChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_start_enters_scanning() {
        let camera = camera();
        let mut controller = controller(&camera);
        assert_eq!(controller.status(), SessionStatus::Idle);

        controller.start().unwrap();
        assert_eq!(controller.status(), SessionStatus::Scanning);
        assert!(camera.is_capturing());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let camera = camera();
        let mut controller = controller(&camera);
        controller.start().unwrap();
        let session_id = controller.session().id;

        controller.start().unwrap();
        assert_eq!(controller.session().id, session_id);
        assert_eq!(camera.open_count(), 1);
        assert_eq!(camera.capture_count(), 1);
    }

    #[test]
    fn test_start_failure_leaves_idle() {
        let camera = camera().with_fault(CameraFault::NoDevice);
        let mut controller = controller(&camera);
        let mut events = controller.subscribe();

        assert!(matches!(controller.start(), Err(CameraError::DeviceUnavailable)));
        assert_eq!(controller.status(), SessionStatus::Idle);
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn test_configuration_failure_releases_camera() {
        let camera = camera().with_fault(CameraFault::BrokenOutput);
        let mut controller = controller(&camera);

        assert!(matches!(controller.start(), Err(CameraError::Configuration(_))));
        assert_eq!(controller.status(), SessionStatus::Idle);
        assert!(!camera.is_open());
    }

    #[tokio::test]
    async fn test_unsupported_codes_never_detect() {
        let camera = camera();
        let mut controller = controller(&camera);
        controller.start().unwrap();

        let unsupported = [Symbology::Ean13, Symbology::Pdf417, Symbology::Aztec];
        for _ in 0..50 {
            for symbology in unsupported {
                let frame = DecodedFrame::single(DecodedCode::new(symbology, "https://x.example/a.mp4"));
                assert_eq!(controller.on_frame_decoded(frame), FrameOutcome::Ignored);
            }
        }
        assert_eq!(controller.status(), SessionStatus::Scanning);
        assert!(camera.is_capturing());
    }

    #[tokio::test]
    async fn test_empty_frame_clears_overlay() {
        let camera = camera();
        let mut controller = controller(&camera);
        controller.start().unwrap();
        let mut events = controller.subscribe();

        // An unsupported code does not move the overlay.
        let frame = DecodedFrame::single(
            DecodedCode::new(Symbology::Ean8, "96385074")
                .with_bounds(BoundingRegion::new(1.0, 1.0, 5.0, 5.0)),
        );
        controller.on_frame_decoded(frame);
        assert_eq!(controller.overlay(), None);

        controller.overlay = Some(BoundingRegion::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(
            controller.on_frame_decoded(DecodedFrame::empty()),
            FrameOutcome::Cleared
        );
        assert_eq!(controller.overlay(), None);
        assert_eq!(controller.status(), SessionStatus::Scanning);
        assert_eq!(drain(&mut events), vec![SessionEvent::OverlayChanged(None)]);
    }

    #[tokio::test]
    async fn test_first_supported_code_detects_once() {
        let camera = camera();
        let mut controller = controller(&camera);
        controller.start().unwrap();
        let session_id = controller.session().id;

        let frame = DecodedFrame {
            codes: vec![
                DecodedCode::new(Symbology::Qr, "https://cdn.example/first.mp4")
                    .with_bounds(BoundingRegion::new(10.0, 10.0, 100.0, 100.0)),
                DecodedCode::new(Symbology::Code128, "https://cdn.example/second.mp4"),
            ],
        };

        let outcome = controller.on_frame_decoded(frame.clone());
        assert_eq!(
            outcome,
            FrameOutcome::Detected(DetectedCode {
                session_id,
                symbology: Symbology::Qr,
                value: "https://cdn.example/first.mp4".to_string(),
                bounds: Some(BoundingRegion::new(10.0, 10.0, 100.0, 100.0)),
            })
        );
        assert_eq!(controller.status(), SessionStatus::Stopped);

        // Same frame again, or the second candidate alone, must not re-trigger.
        assert_eq!(controller.on_frame_decoded(frame), FrameOutcome::Ignored);
        let second = DecodedFrame::single(DecodedCode::new(Symbology::Code128, "again"));
        assert_eq!(controller.on_frame_decoded(second), FrameOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_detection_transitions_and_releases_camera() {
        let camera = camera();
        let mut controller = controller(&camera);
        let mut events = controller.subscribe();
        controller.start().unwrap();

        let bounds = BoundingRegion::new(5.0, 6.0, 70.0, 80.0);
        let frame = DecodedFrame::single(
            DecodedCode::new(Symbology::Code128, "https://cdn.example/a.mp4").with_bounds(bounds),
        );
        assert!(matches!(
            controller.on_frame_decoded(frame),
            FrameOutcome::Detected(_)
        ));

        let events = drain(&mut events);
        assert_eq!(
            statuses(&events),
            vec![
                (SessionStatus::Idle, SessionStatus::Scanning),
                (SessionStatus::Scanning, SessionStatus::Detected),
                (SessionStatus::Detected, SessionStatus::Stopped),
            ]
        );
        assert!(events.contains(&SessionEvent::OverlayChanged(Some(bounds))));
        assert_eq!(events.last(), Some(&SessionEvent::OverlayChanged(None)));
        assert!(!camera.is_open());
        assert!(!camera.is_capturing());
        assert!(controller.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_value_is_ignored() {
        let camera = camera();
        let mut controller = controller(&camera);
        controller.start().unwrap();

        let frame = DecodedFrame::single(DecodedCode::new(Symbology::Qr, ""));
        assert_eq!(controller.on_frame_decoded(frame), FrameOutcome::Ignored);
        assert_eq!(controller.status(), SessionStatus::Scanning);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let camera = camera();
        let mut controller = controller(&camera);
        controller.start().unwrap();
        let mut events = controller.subscribe();

        controller.stop();
        let after_first = drain(&mut events);
        let status_after_first = controller.status();

        controller.stop();
        assert!(drain(&mut events).is_empty());
        assert_eq!(controller.status(), status_after_first);
        assert_eq!(statuses(&after_first), vec![(SessionStatus::Scanning, SessionStatus::Stopped)]);
        assert!(!camera.is_open());
    }

    #[test]
    fn test_stop_from_idle_is_noop() {
        let camera = camera();
        let mut controller = controller(&camera);
        let mut events = controller.subscribe();

        controller.stop();
        assert_eq!(controller.status(), SessionStatus::Idle);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let camera = camera();
        let mut controller = controller(&camera);
        controller.start().unwrap();
        let first = controller.session().id;
        controller.stop();

        controller.start().unwrap();
        assert_eq!(controller.status(), SessionStatus::Scanning);
        assert_ne!(controller.session().id, first);
        assert_eq!(camera.open_count(), 2);
    }

    #[tokio::test]
    async fn test_next_frame_reads_camera_feed() {
        let code = DecodedCode::new(Symbology::Qr, "https://cdn.example/movie.mp4");
        let camera = ScriptedCamera::new(
            vec![DecodedFrame::empty(), DecodedFrame::single(code.clone())],
            Duration::from_millis(1),
        );
        let mut controller = controller(&camera);
        controller.start().unwrap();

        let mut detected = None;
        while let Some(frame) = controller.next_frame().await {
            if let FrameOutcome::Detected(code) = controller.on_frame_decoded(frame) {
                detected = Some(code);
            }
        }
        assert_eq!(detected.map(|d| d.value), Some(code.value));
        assert_eq!(controller.status(), SessionStatus::Stopped);
    }
}
