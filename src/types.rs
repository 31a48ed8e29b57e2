use std::{fmt, str::FromStr, time::Instant};

use serde::{Deserialize, Serialize};

use crate::error::SkeletonError;

pub const KEYPOINT_COUNT: usize = 21;

/// MediaPipe hand landmark indices.
pub mod landmark {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// Camera frame kept only so the verifier can crop the hand out of it.
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// A single normalized keypoint. `x`/`y` are fractions of the frame, `z` is
/// depth relative to the wrist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Keypoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One hand as reported by the upstream landmark extractor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSkeleton", into = "RawSkeleton")]
pub struct HandSkeleton {
    keypoints: [Keypoint; KEYPOINT_COUNT],
    handedness_confidence: f32,
}

impl HandSkeleton {
    pub fn new(keypoints: [Keypoint; KEYPOINT_COUNT], handedness_confidence: f32) -> Self {
        Self {
            keypoints,
            handedness_confidence: handedness_confidence.clamp(0.0, 1.0),
        }
    }

    pub fn from_points(points: Vec<Keypoint>, handedness_confidence: f32) -> Result<Self, SkeletonError> {
        let found = points.len();
        let keypoints: [Keypoint; KEYPOINT_COUNT] = points
            .try_into()
            .map_err(|_| SkeletonError::KeypointCount { found })?;
        Ok(Self::new(keypoints, handedness_confidence))
    }

    pub fn point(&self, index: usize) -> Keypoint {
        self.keypoints[index]
    }

    pub fn keypoints(&self) -> &[Keypoint; KEYPOINT_COUNT] {
        &self.keypoints
    }

    pub fn handedness_confidence(&self) -> f32 {
        self.handedness_confidence
    }

    /// Normalized `[min_x, min_y, max_x, max_y]` of all keypoints.
    pub fn bounds(&self) -> [f32; 4] {
        self.keypoints.iter().fold(
            [f32::MAX, f32::MAX, f32::MIN, f32::MIN],
            |acc, p| [acc[0].min(p.x), acc[1].min(p.y), acc[2].max(p.x), acc[3].max(p.y)],
        )
    }
}

#[derive(Serialize, Deserialize)]
struct RawSkeleton {
    keypoints: Vec<Keypoint>,
    #[serde(default = "full_confidence")]
    handedness_confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl TryFrom<RawSkeleton> for HandSkeleton {
    type Error = SkeletonError;

    fn try_from(raw: RawSkeleton) -> Result<Self, Self::Error> {
        HandSkeleton::from_points(raw.keypoints, raw.handedness_confidence)
    }
}

impl From<HandSkeleton> for RawSkeleton {
    fn from(skeleton: HandSkeleton) -> Self {
        RawSkeleton {
            keypoints: skeleton.keypoints.to_vec(),
            handedness_confidence: skeleton.handedness_confidence,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    OpenPalm,
    PeaceSign,
    ThumbsUp,
    ThumbsDown,
    Pointing,
    OkSign,
    RockSign,
    Shaka,
    ThreeFingers,
    FourFingers,
}

impl GestureKind {
    pub const ALL: [GestureKind; 10] = [
        GestureKind::OpenPalm,
        GestureKind::PeaceSign,
        GestureKind::ThumbsUp,
        GestureKind::ThumbsDown,
        GestureKind::Pointing,
        GestureKind::OkSign,
        GestureKind::RockSign,
        GestureKind::Shaka,
        GestureKind::ThreeFingers,
        GestureKind::FourFingers,
    ];

    /// Most visually specific first. General shapes (all fingers out) overlap
    /// with almost everything, so they are consulted last.
    pub const PRIORITY: [GestureKind; 10] = [
        GestureKind::OkSign,
        GestureKind::RockSign,
        GestureKind::Shaka,
        GestureKind::ThumbsUp,
        GestureKind::ThumbsDown,
        GestureKind::Pointing,
        GestureKind::PeaceSign,
        GestureKind::ThreeFingers,
        GestureKind::FourFingers,
        GestureKind::OpenPalm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GestureKind::OpenPalm => "open_palm",
            GestureKind::PeaceSign => "peace_sign",
            GestureKind::ThumbsUp => "thumbs_up",
            GestureKind::ThumbsDown => "thumbs_down",
            GestureKind::Pointing => "pointing",
            GestureKind::OkSign => "ok_sign",
            GestureKind::RockSign => "rock_sign",
            GestureKind::Shaka => "shaka",
            GestureKind::ThreeFingers => "three_fingers",
            GestureKind::FourFingers => "four_fingers",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GestureKind::OpenPalm => "Open Palm",
            GestureKind::PeaceSign => "Peace Sign",
            GestureKind::ThumbsUp => "Thumbs Up",
            GestureKind::ThumbsDown => "Thumbs Down",
            GestureKind::Pointing => "Pointing",
            GestureKind::OkSign => "OK Sign",
            GestureKind::RockSign => "Rock Sign",
            GestureKind::Shaka => "Shaka",
            GestureKind::ThreeFingers => "Three Fingers",
            GestureKind::FourFingers => "Four Fingers",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            GestureKind::OpenPalm => "🖐 ",
            GestureKind::PeaceSign => "✌️ ",
            GestureKind::ThumbsUp => "👍 ",
            GestureKind::ThumbsDown => "👎 ",
            GestureKind::Pointing => "☝️ ",
            GestureKind::OkSign => "👌 ",
            GestureKind::RockSign => "🤘 ",
            GestureKind::Shaka => "🤙 ",
            GestureKind::ThreeFingers => "🤟 ",
            GestureKind::FourFingers => "🖖 ",
        }
    }

    /// Shape description used when asking the verifier to confirm a gesture.
    pub fn shape_description(&self) -> &'static str {
        match self {
            GestureKind::OpenPalm => "all 5 fingers extended, palm facing forward",
            GestureKind::PeaceSign => {
                "index and middle finger extended in a V-shape, other fingers closed"
            }
            GestureKind::ThumbsUp => "thumb pointing up, other fingers closed in a fist",
            GestureKind::ThumbsDown => "thumb pointing down, other fingers closed in a fist",
            GestureKind::Pointing => "index finger extended, other fingers closed",
            GestureKind::OkSign => {
                "thumb and index fingertips touching in a circle, other fingers extended"
            }
            GestureKind::RockSign => "index and pinky extended, middle and ring fingers closed",
            GestureKind::Shaka => "thumb and pinky extended, other fingers closed",
            GestureKind::ThreeFingers => "index, middle and ring fingers extended, pinky closed",
            GestureKind::FourFingers => "four fingers extended with the thumb folded across the palm",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GestureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GestureKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown gesture '{s}'"))
    }
}

pub fn gesture_label(gesture: Option<GestureKind>) -> &'static str {
    gesture.map(|g| g.as_str()).unwrap_or("none")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Local,
    Verified,
}

impl DetectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionSource::Local => "local",
            DetectionSource::Verified => "verified",
        }
    }
}

/// Best single-frame guess from the template scorer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Recognition {
    pub gesture: Option<GestureKind>,
    pub confidence: f32,
}

impl Recognition {
    pub const NONE: Recognition = Recognition {
        gesture: None,
        confidence: 0.0,
    };
}

/// A gesture that held for its whole stability window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StableCandidate {
    pub gesture: GestureKind,
    pub confidence: f32,
}

/// An accepted trigger leaving the arbiter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trigger {
    pub gesture: GestureKind,
    pub confidence: f32,
    pub source: DetectionSource,
}

/// Everything the engine needs to process one frame.
#[derive(Clone, Debug)]
pub struct FrameInput {
    pub timestamp: Instant,
    pub clutch_hand: Option<HandSkeleton>,
    pub command_hand: Option<HandSkeleton>,
    pub image: Option<std::sync::Arc<Frame>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClutchReport {
    pub engaged: bool,
    #[serde(rename = "stableFrames")]
    pub window_fill: usize,
    pub window_size: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GestureReport {
    pub gesture: &'static str,
    pub confidence: f32,
    pub source: DetectionSource,
    pub triggered: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionReport {
    pub gesture: &'static str,
    pub description: String,
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DictationReport {
    pub active: bool,
}

/// What the engine exposes to the UI/streaming layer after each frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub clutch: ClutchReport,
    pub gesture: Option<GestureReport>,
    pub action: Option<ActionReport>,
    pub dictation: DictationReport,
}

impl FrameReport {
    pub fn triggered(&self) -> bool {
        self.gesture.as_ref().is_some_and(|g| g.triggered)
    }

    pub fn display_text(&self) -> Option<String> {
        let gesture = self.gesture.as_ref()?;
        let kind: GestureKind = gesture.gesture.parse().ok()?;
        Some(format!(
            "{}{} ({:.0}%)",
            kind.emoji(),
            kind.display_name(),
            gesture.confidence * 100.0
        ))
    }
}
