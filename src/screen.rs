// Home screen
//
// Composes the scan controller and the playback handoff behind the four user
// actions the screen offers. Renderers never touch either component; they
// watch `ScreenView` snapshots.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

use crate::playback::PlaybackHandoff;
use crate::scanner::{BoundingRegion, DecodedFrame, FrameOutcome, ScanSessionController};

pub const SCREEN_TITLE: &str = "QuickPlay";
pub const SCAN_ACTION_LABEL: &str = "Scan and play a video";

/// User input the screen reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenAction {
    ScanPressed,
    ClosePressed,
    AlertAcknowledged,
    PlayerDismissed,
}

/// Modal alert with a single dismissal action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: &'static str,
    pub message: &'static str,
    pub action: &'static str,
}

impl Alert {
    pub fn something_went_wrong() -> Self {
        Self {
            title: "Error",
            message: "Something Went Wrong",
            action: "Ok",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenState {
    Idle,
    Scanning,
    Resolving,
    Playing { url: Url },
    Alert(Alert),
}

/// Everything a renderer needs to draw the screen
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenView {
    pub title: &'static str,
    pub state: ScreenState,
    /// Label of the primary button, `None` while it is hidden
    pub primary_action: Option<&'static str>,
    pub preview_visible: bool,
    pub close_visible: bool,
    /// Bounds of the detected code while its payload is being resolved
    pub overlay: Option<BoundingRegion>,
    pub alert: Option<Alert>,
    pub now_playing: Option<Url>,
}

impl ScreenView {
    fn idle() -> Self {
        Self {
            title: SCREEN_TITLE,
            state: ScreenState::Idle,
            primary_action: Some(SCAN_ACTION_LABEL),
            preview_visible: false,
            close_visible: false,
            overlay: None,
            alert: None,
            now_playing: None,
        }
    }
}

enum LoopEvent {
    Action(Option<ScreenAction>),
    Frame(Option<DecodedFrame>),
    Presented(bool),
}

pub struct HomeScreen {
    controller: ScanSessionController,
    handoff: PlaybackHandoff,
    state: ScreenState,
    view: watch::Sender<ScreenView>,
    detected_bounds: Option<BoundingRegion>,
    presentation: Option<JoinHandle<bool>>,
    alerts_shown: usize,
}

impl HomeScreen {
    pub fn new(controller: ScanSessionController, handoff: PlaybackHandoff) -> Self {
        let (view, _) = watch::channel(ScreenView::idle());
        Self {
            controller,
            handoff,
            state: ScreenState::Idle,
            view,
            detected_bounds: None,
            presentation: None,
            alerts_shown: 0,
        }
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    pub fn controller(&self) -> &ScanSessionController {
        &self.controller
    }

    pub fn handoff(&self) -> &PlaybackHandoff {
        &self.handoff
    }

    /// Number of alerts presented since the screen was created
    pub fn alerts_shown(&self) -> usize {
        self.alerts_shown
    }

    /// Watch the rendered view; the receiver starts at the current snapshot
    pub fn subscribe(&self) -> watch::Receiver<ScreenView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> ScreenView {
        self.view.borrow().clone()
    }

    pub fn handle_action(&mut self, action: ScreenAction) {
        match action {
            ScreenAction::ScanPressed if self.state == ScreenState::Idle => self.start_scanning(),
            ScreenAction::ClosePressed if self.state == ScreenState::Scanning => {
                log::info!("Scan cancelled");
                self.controller.stop();
                self.set_state(ScreenState::Idle);
            }
            ScreenAction::AlertAcknowledged if matches!(self.state, ScreenState::Alert(_)) => {
                self.set_state(ScreenState::Idle);
            }
            ScreenAction::PlayerDismissed if matches!(self.state, ScreenState::Playing { .. }) => {
                self.handoff.dismiss();
                self.set_state(ScreenState::Idle);
            }
            action => {
                log::debug!("Ignoring {:?} while {:?}", action, self.state);
            }
        }
    }

    /// Feed one analyzed camera frame through the controller and, on
    /// detection, through the handoff
    pub async fn handle_frame(&mut self, frame: DecodedFrame) {
        match self.controller.on_frame_decoded(frame) {
            FrameOutcome::Detected(code) => {
                self.detected_bounds = code.bounds;
                self.hand_off(&code.value).await;
            }
            FrameOutcome::Cleared => self.publish(),
            FrameOutcome::Ignored => {}
        }
    }

    /// Wait for the player handed off last to come up and apply the result.
    ///
    /// Returns immediately when no presentation is pending.
    pub async fn finish_presentation(&mut self) {
        if self.presentation.is_some() {
            let started = wait_presented(&mut self.presentation).await;
            self.presentation_finished(started);
        }
    }

    /// Process user actions, camera frames and player presentation until the
    /// action channel closes, then leave the screen.
    pub async fn run(&mut self, mut actions: mpsc::UnboundedReceiver<ScreenAction>) {
        loop {
            let scanning = self.controller.is_scanning();
            let presenting = self.presentation.is_some();
            let event = tokio::select! {
                biased;
                action = actions.recv() => LoopEvent::Action(action),
                started = wait_presented(&mut self.presentation), if presenting => {
                    LoopEvent::Presented(started)
                }
                frame = self.controller.next_frame(), if scanning => LoopEvent::Frame(frame),
            };

            match event {
                LoopEvent::Action(Some(action)) => self.handle_action(action),
                LoopEvent::Action(None) => break,
                LoopEvent::Frame(Some(frame)) => self.handle_frame(frame).await,
                LoopEvent::Frame(None) => {
                    log::warn!("Camera feed ended unexpectedly");
                    self.controller.stop();
                    self.set_state(ScreenState::Idle);
                }
                LoopEvent::Presented(started) => self.presentation_finished(started),
            }
        }
        self.leave();
    }

    /// Release every resource the screen holds
    pub fn leave(&mut self) {
        self.controller.stop();
        self.presentation = None;
        self.handoff.dismiss();
        self.set_state(ScreenState::Idle);
    }

    fn start_scanning(&mut self) {
        match self.controller.start() {
            Ok(()) => self.set_state(ScreenState::Scanning),
            Err(e) => log::error!("Failed to start scanning: {}", e),
        }
    }

    async fn hand_off(&mut self, value: &str) {
        self.set_state(ScreenState::Resolving);
        match self.handoff.resolve(value).await {
            Ok(request) => {
                let url = request.source_url.clone();
                self.presentation = Some(self.handoff.present(request));
                self.set_state(ScreenState::Playing { url });
            }
            Err(e) => {
                log::warn!("Cannot play scanned code: {}", e);
                self.alerts_shown += 1;
                self.set_state(ScreenState::Alert(Alert::something_went_wrong()));
            }
        }
    }

    fn presentation_finished(&mut self, started: bool) {
        if !started && matches!(self.state, ScreenState::Playing { .. }) {
            log::warn!("Player did not start; returning to the home screen");
            self.handoff.dismiss();
            self.set_state(ScreenState::Idle);
        } else {
            self.publish();
        }
    }

    fn set_state(&mut self, state: ScreenState) {
        if state != ScreenState::Resolving {
            self.detected_bounds = None;
        }
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        let view = self.render();
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn render(&self) -> ScreenView {
        let mut view = ScreenView::idle();
        view.state = self.state.clone();
        view.primary_action = None;
        match &self.state {
            ScreenState::Idle => view.primary_action = Some(SCAN_ACTION_LABEL),
            ScreenState::Scanning => {
                view.preview_visible = true;
                view.close_visible = true;
            }
            ScreenState::Resolving => view.overlay = self.detected_bounds,
            ScreenState::Playing { .. } => view.now_playing = self.handoff.now_playing(),
            ScreenState::Alert(alert) => view.alert = Some(alert.clone()),
        }
        view
    }
}

/// Resolve the pending presentation and clear it; a panicked presentation
/// counts as not started.
async fn wait_presented(presentation: &mut Option<JoinHandle<bool>>) -> bool {
    let Some(handle) = presentation.as_mut() else {
        return false;
    };
    let started = handle.await.unwrap_or(false);
    *presentation = None;
    started
}
