// Camera capability and frame subscription
//
// The camera hardware and its frame analyzer are an external collaborator. The
// controller only sees a handle, a filtered stream of decoded frames, and a way
// to release both.

use futures::Stream;
use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use super::{CameraError, CameraResult, DecodedFrame, Symbology};

/// Exclusive handle on an opened rear camera
#[derive(Debug, PartialEq, Eq)]
pub struct CameraHandle {
    id: u64,
}

impl CameraHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Platform-agnostic camera interface
///
/// Implementations must refuse to open or capture twice; the controller relies
/// on that as a second line of defence around its own guards.
pub trait CameraCapability: Send {
    /// Open the rear-facing camera
    fn open_rear_camera(&self) -> CameraResult<CameraHandle>;

    /// Start continuous frame analysis limited to `symbologies`
    fn begin_capture(
        &self,
        handle: &CameraHandle,
        symbologies: &BTreeSet<Symbology>,
    ) -> CameraResult<FrameSubscription>;

    /// Stop capture (if running) and release the camera
    fn end_capture(&self, handle: CameraHandle);
}

/// Subscription to the decoded-frame stream of one capture session.
///
/// The stream is lazy and never restarts: once unsubscribed or dropped, a new
/// capture has to be started to receive frames again.
#[derive(Debug)]
pub struct FrameSubscription {
    frames: mpsc::Receiver<DecodedFrame>,
    producer: Option<JoinHandle<()>>,
}

impl FrameSubscription {
    pub fn new(frames: mpsc::Receiver<DecodedFrame>, producer: Option<JoinHandle<()>>) -> Self {
        Self { frames, producer }
    }

    /// Stop delivery. Frames already queued are discarded.
    pub fn unsubscribe(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.frames.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl Stream for FrameSubscription {
    type Item = DecodedFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.frames.poll_recv(cx)
    }
}

impl Drop for FrameSubscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Failure a [`ScriptedCamera`] should simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFault {
    NoDevice,
    PermissionDenied,
    BrokenOutput,
}

#[derive(Debug, Default)]
struct CameraState {
    next_handle: u64,
    open: Option<u64>,
    producer: Option<AbortHandle>,
    opens: usize,
    captures: usize,
}

/// Camera that replays a fixed script of decoded frames.
///
/// Each scripted frame is delivered once per `frame_interval`; after the script
/// runs out the camera keeps producing empty frames until the subscription is
/// dropped, like a live feed pointed at nothing, unless the feed is set to end
/// with the script. Clones share state, so a test can keep one copy to inspect
/// while the controller owns another.
#[derive(Debug, Clone)]
pub struct ScriptedCamera {
    script: Arc<Vec<DecodedFrame>>,
    frame_interval: Duration,
    fault: Option<CameraFault>,
    ends_with_script: bool,
    state: Arc<Mutex<CameraState>>,
}

impl ScriptedCamera {
    pub fn new(script: Vec<DecodedFrame>, frame_interval: Duration) -> Self {
        Self {
            script: Arc::new(script),
            frame_interval: frame_interval.max(Duration::from_millis(1)),
            fault: None,
            ends_with_script: false,
            state: Arc::new(Mutex::new(CameraState::default())),
        }
    }

    /// Parse a script from a JSON array of frames
    pub fn from_json(json: &str, frame_interval: Duration) -> serde_json::Result<Self> {
        let script: Vec<DecodedFrame> = serde_json::from_str(json)?;
        Ok(Self::new(script, frame_interval))
    }

    pub fn with_fault(mut self, fault: CameraFault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Close the frame stream once the script has been delivered, as a camera
    /// that disconnects mid-session would
    pub fn ending_with_script(mut self) -> Self {
        self.ends_with_script = true;
        self
    }

    /// Whether a handle is currently held
    pub fn is_open(&self) -> bool {
        self.state().open.is_some()
    }

    /// Whether frames are currently being produced
    pub fn is_capturing(&self) -> bool {
        self.state().producer.is_some()
    }

    /// Number of successful `open_rear_camera` calls so far
    pub fn open_count(&self) -> usize {
        self.state().opens
    }

    /// Number of successful `begin_capture` calls so far
    pub fn capture_count(&self) -> usize {
        self.state().captures
    }

    fn state(&self) -> MutexGuard<'_, CameraState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CameraCapability for ScriptedCamera {
    fn open_rear_camera(&self) -> CameraResult<CameraHandle> {
        match self.fault {
            Some(CameraFault::NoDevice) => return Err(CameraError::DeviceUnavailable),
            Some(CameraFault::PermissionDenied) => {
                return Err(CameraError::permission("camera access was refused"));
            }
            _ => {}
        }

        let mut state = self.state();
        if state.open.is_some() {
            return Err(CameraError::CaptureInProgress);
        }
        state.next_handle += 1;
        state.open = Some(state.next_handle);
        state.opens += 1;
        log::debug!("Opened scripted rear camera (handle {})", state.next_handle);
        Ok(CameraHandle::new(state.next_handle))
    }

    /// Must be called from within a tokio runtime; frames are produced by a
    /// spawned task.
    fn begin_capture(
        &self,
        handle: &CameraHandle,
        symbologies: &BTreeSet<Symbology>,
    ) -> CameraResult<FrameSubscription> {
        if self.fault == Some(CameraFault::BrokenOutput) {
            return Err(CameraError::configuration("could not attach metadata output"));
        }

        let mut state = self.state();
        if state.open != Some(handle.id()) {
            return Err(CameraError::configuration("camera handle is not open"));
        }
        if state.producer.is_some() {
            return Err(CameraError::CaptureInProgress);
        }

        // Capacity 1 keeps delivery serial: the next frame is analyzed only
        // after the previous one has been taken.
        let (tx, rx) = mpsc::channel(1);
        let script = Arc::clone(&self.script);
        let filter = symbologies.clone();
        let interval = self.frame_interval;
        let ends_with_script = self.ends_with_script;

        let producer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut scripted = script.iter().cloned();
            loop {
                ticker.tick().await;
                let mut frame = match scripted.next() {
                    Some(frame) => frame,
                    None if ends_with_script => break,
                    None => DecodedFrame::default(),
                };
                frame.retain_symbologies(&filter);
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        state.producer = Some(producer.abort_handle());
        state.captures += 1;
        log::debug!(
            "Capture started on handle {} for {:?}",
            handle.id(),
            symbologies
        );
        Ok(FrameSubscription::new(rx, Some(producer)))
    }

    fn end_capture(&self, handle: CameraHandle) {
        let mut state = self.state();
        if state.open != Some(handle.id()) {
            log::debug!("Ignoring release of stale camera handle {}", handle.id());
            return;
        }
        if let Some(producer) = state.producer.take() {
            producer.abort();
        }
        state.open = None;
        log::debug!("Released scripted rear camera (handle {})", handle.id());
    }
}
