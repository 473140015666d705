// Scanner data structures: symbologies, decoded codes and session state

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::SessionId;

/// Barcode encoding scheme reported by the camera's frame analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    Qr,
    Code128,
    Code39,
    Code93,
    Ean8,
    Ean13,
    Upce,
    Pdf417,
    Aztec,
    DataMatrix,
}

impl Symbology {
    /// Lowercase tag used in configuration and frame scripts
    pub fn name(&self) -> &'static str {
        match self {
            Symbology::Qr => "qr",
            Symbology::Code128 => "code128",
            Symbology::Code39 => "code39",
            Symbology::Code93 => "code93",
            Symbology::Ean8 => "ean8",
            Symbology::Ean13 => "ean13",
            Symbology::Upce => "upce",
            Symbology::Pdf417 => "pdf417",
            Symbology::Aztec => "aztec",
            Symbology::DataMatrix => "datamatrix",
        }
    }

    /// Symbologies a scan session listens for unless configured otherwise
    pub fn default_supported() -> BTreeSet<Symbology> {
        [Symbology::Qr, Symbology::Code128].into_iter().collect()
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qr" => Ok(Symbology::Qr),
            "code128" => Ok(Symbology::Code128),
            "code39" => Ok(Symbology::Code39),
            "code93" => Ok(Symbology::Code93),
            "ean8" => Ok(Symbology::Ean8),
            "ean13" => Ok(Symbology::Ean13),
            "upce" => Ok(Symbology::Upce),
            "pdf417" => Ok(Symbology::Pdf417),
            "aztec" => Ok(Symbology::Aztec),
            "datamatrix" => Ok(Symbology::DataMatrix),
            other => Err(format!("unknown symbology '{}'", other)),
        }
    }
}

/// Rectangle in view coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A single code recognized in a camera frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedCode {
    pub symbology: Symbology,
    pub value: String,
    #[serde(default)]
    pub bounds: Option<BoundingRegion>,
}

impl DecodedCode {
    pub fn new(symbology: Symbology, value: impl Into<String>) -> Self {
        Self {
            symbology,
            value: value.into(),
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: BoundingRegion) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// One analyzed camera frame and every code found in it, in detection order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecodedFrame {
    #[serde(default)]
    pub codes: Vec<DecodedCode>,
}

impl DecodedFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(code: DecodedCode) -> Self {
        Self { codes: vec![code] }
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Drop codes whose symbology is not in `symbologies`
    pub fn retain_symbologies(&mut self, symbologies: &BTreeSet<Symbology>) {
        self.codes.retain(|code| symbologies.contains(&code.symbology));
    }
}

/// Lifecycle state of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    Scanning,
    Detected,
    Stopped,
}

impl SessionStatus {
    /// Whether the camera is held in this state. `Idle` and `Stopped` are
    /// interchangeable for re-entry.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Scanning | SessionStatus::Detected)
    }
}

/// The screen's one scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: SessionId,
    pub status: SessionStatus,
    pub supported: BTreeSet<Symbology>,
}

impl ScanSession {
    pub fn new(supported: BTreeSet<Symbology>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Idle,
            supported,
        }
    }

    pub fn supports(&self, symbology: Symbology) -> bool {
        self.supported.contains(&symbology)
    }
}

/// Payload of the code that ended a session
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedCode {
    pub session_id: SessionId,
    pub symbology: Symbology,
    pub value: String,
    /// Where the code was framed when it was detected
    pub bounds: Option<BoundingRegion>,
}

/// Result of feeding one frame to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Frame had no codes; the detection overlay was cleared
    Cleared,
    /// Frame was not relevant (no active session, wrong symbology, empty value)
    Ignored,
    /// A supported code was found and the session has been torn down
    Detected(DetectedCode),
}

/// State transitions published to passive observers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged {
        session_id: SessionId,
        from: SessionStatus,
        to: SessionStatus,
    },
    OverlayChanged(Option<BoundingRegion>),
}
