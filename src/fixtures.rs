//! Synthetic upright hand skeletons and scripted collaborators for tests.
//!
//! Wrist at (0.5, 0.8), finger MCPs on y = 0.6, so the hand scale
//! (wrist to middle MCP) is 0.2.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::{
    action::{Key, KeyInjector},
    dictation::Transcriber,
    error::{ActionError, VerifyError},
    geometry::Finger,
    types::{HandSkeleton, KEYPOINT_COUNT, Keypoint, landmark},
    verifier::{GestureVerifier, VerificationRequest},
};

const MCP_Y: f32 = 0.6;
const EXTENDED_TIP_Y: f32 = 0.40;

#[derive(Clone, Copy, Debug)]
pub enum ThumbPose {
    Tucked,
    Out,
    Up,
    Down,
}

pub struct PoseBuilder {
    points: [Keypoint; KEYPOINT_COUNT],
    handedness: f32,
}

fn base_x(finger: Finger) -> f32 {
    match finger {
        Finger::Index => 0.44,
        Finger::Middle => 0.50,
        Finger::Ring => 0.56,
        Finger::Pinky => 0.62,
    }
}

impl PoseBuilder {
    /// Closed fist: every finger folded, thumb tucked.
    pub fn fist() -> Self {
        let mut builder = Self {
            points: [Keypoint::default(); KEYPOINT_COUNT],
            handedness: 1.0,
        };
        builder.points[landmark::WRIST] = Keypoint::new(0.5, 0.8, 0.0);
        for finger in Finger::ALL {
            builder = builder.fold(finger);
        }
        builder.thumb(ThumbPose::Tucked)
    }

    /// Straight finger from its MCP to a tip at y = 0.40, tip shifted by `dx`.
    pub fn extend(mut self, finger: Finger, dx: f32) -> Self {
        let [mcp, pip, dip, tip] = finger.joints();
        let x = base_x(finger);
        let rise = MCP_Y - EXTENDED_TIP_Y;
        self.points[mcp] = Keypoint::new(x, MCP_Y, 0.0);
        self.points[pip] = Keypoint::new(x + dx * 0.5, MCP_Y - rise * 0.5, 0.0);
        self.points[dip] = Keypoint::new(x + dx * 0.75, MCP_Y - rise * 0.75, 0.0);
        self.points[tip] = Keypoint::new(x + dx, EXTENDED_TIP_Y, 0.0);
        self
    }

    pub fn fold(mut self, finger: Finger) -> Self {
        let [mcp, pip, dip, tip] = finger.joints();
        let x = base_x(finger);
        self.points[mcp] = Keypoint::new(x, MCP_Y, 0.0);
        self.points[pip] = Keypoint::new(x, 0.55, 0.0);
        self.points[dip] = Keypoint::new(x, 0.60, 0.0);
        self.points[tip] = Keypoint::new(x, 0.63, 0.0);
        self
    }

    pub fn thumb(mut self, pose: ThumbPose) -> Self {
        let [mcp, ip, tip] = match pose {
            ThumbPose::Tucked => [(0.42, 0.70), (0.45, 0.66), (0.47, 0.68)],
            ThumbPose::Out => [(0.38, 0.72), (0.33, 0.70), (0.28, 0.69)],
            ThumbPose::Up => [(0.40, 0.68), (0.40, 0.60), (0.40, 0.52)],
            ThumbPose::Down => [(0.40, 0.72), (0.40, 0.80), (0.40, 0.88)],
        };
        self.points[landmark::THUMB_CMC] = Keypoint::new(0.45, 0.75, 0.0);
        self.points[landmark::THUMB_MCP] = Keypoint::new(mcp.0, mcp.1, 0.0);
        self.points[landmark::THUMB_IP] = Keypoint::new(ip.0, ip.1, 0.0);
        self.points[landmark::THUMB_TIP] = Keypoint::new(tip.0, tip.1, 0.0);
        self
    }

    pub fn set(mut self, index: usize, x: f32, y: f32) -> Self {
        self.points[index] = Keypoint::new(x, y, self.points[index].z);
        self
    }

    pub fn handedness(mut self, confidence: f32) -> Self {
        self.handedness = confidence;
        self
    }

    pub fn build(self) -> HandSkeleton {
        HandSkeleton::new(self.points, self.handedness)
    }
}

pub fn closed_fist() -> HandSkeleton {
    PoseBuilder::fist().build()
}

pub fn open_palm() -> HandSkeleton {
    PoseBuilder::fist()
        .extend(Finger::Index, -0.03)
        .extend(Finger::Middle, 0.0)
        .extend(Finger::Ring, 0.02)
        .extend(Finger::Pinky, 0.04)
        .thumb(ThumbPose::Out)
        .build()
}

pub fn peace_sign() -> HandSkeleton {
    PoseBuilder::fist()
        .extend(Finger::Index, -0.04)
        .extend(Finger::Middle, 0.04)
        .build()
}

pub fn thumbs_up() -> HandSkeleton {
    PoseBuilder::fist().thumb(ThumbPose::Up).build()
}

/// Thumb barely clear of the extension threshold, poor tracking quality.
/// Scores in the medium band.
pub fn weak_thumbs_up() -> HandSkeleton {
    PoseBuilder::fist()
        .thumb(ThumbPose::Up)
        .set(landmark::THUMB_IP, 0.40, 0.65)
        .set(landmark::THUMB_TIP, 0.40, 0.62)
        .handedness(0.0)
        .build()
}

/// Weak thumb over loosely folded fingers. Scores below the medium band.
pub fn loose_thumbs_up() -> HandSkeleton {
    let mut builder = PoseBuilder::fist()
        .thumb(ThumbPose::Up)
        .set(landmark::THUMB_IP, 0.40, 0.65)
        .set(landmark::THUMB_TIP, 0.40, 0.62)
        .handedness(0.0);
    for finger in Finger::ALL {
        let [_, _, _, tip] = finger.joints();
        builder = builder.set(tip, base_x(finger), 0.555);
    }
    builder.build()
}

pub fn thumbs_down() -> HandSkeleton {
    PoseBuilder::fist().thumb(ThumbPose::Down).build()
}

pub fn pointing() -> HandSkeleton {
    PoseBuilder::fist().extend(Finger::Index, 0.0).build()
}

pub fn ok_sign() -> HandSkeleton {
    PoseBuilder::fist()
        .extend(Finger::Middle, 0.0)
        .extend(Finger::Ring, 0.01)
        .extend(Finger::Pinky, 0.03)
        .set(landmark::INDEX_PIP, 0.40, 0.55)
        .set(landmark::INDEX_DIP, 0.37, 0.60)
        .set(landmark::INDEX_TIP, 0.36, 0.64)
        .set(landmark::THUMB_MCP, 0.40, 0.72)
        .set(landmark::THUMB_IP, 0.37, 0.68)
        .set(landmark::THUMB_TIP, 0.36, 0.65)
        .build()
}

pub fn rock_sign() -> HandSkeleton {
    PoseBuilder::fist()
        .extend(Finger::Index, -0.02)
        .extend(Finger::Pinky, 0.02)
        .build()
}

pub fn shaka() -> HandSkeleton {
    PoseBuilder::fist()
        .extend(Finger::Pinky, 0.03)
        .thumb(ThumbPose::Out)
        .build()
}

pub fn three_fingers() -> HandSkeleton {
    PoseBuilder::fist()
        .extend(Finger::Index, -0.02)
        .extend(Finger::Middle, 0.0)
        .extend(Finger::Ring, 0.02)
        .build()
}

pub fn four_fingers() -> HandSkeleton {
    PoseBuilder::fist()
        .extend(Finger::Index, -0.03)
        .extend(Finger::Middle, 0.0)
        .extend(Finger::Ring, 0.02)
        .extend(Finger::Pinky, 0.04)
        .build()
}

/// Verifier with a fixed answer. `hold` makes it block until the returned
/// sender is dropped.
pub struct ScriptedVerifier {
    answer: Option<bool>,
    calls: Arc<AtomicUsize>,
    gate: Option<Receiver<()>>,
}

impl ScriptedVerifier {
    pub fn new(answer: bool) -> (Self, Arc<AtomicUsize>) {
        Self::build(Some(answer))
    }

    pub fn failing() -> (Self, Arc<AtomicUsize>) {
        Self::build(None)
    }

    fn build(answer: Option<bool>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let verifier = Self {
            answer,
            calls: calls.clone(),
            gate: None,
        };
        (verifier, calls)
    }

    pub fn hold(&mut self) -> Sender<()> {
        let (tx, rx) = crossbeam_channel::bounded(0);
        self.gate = Some(rx);
        tx
    }
}

impl GestureVerifier for ScriptedVerifier {
    fn verify(&mut self, _request: &VerificationRequest) -> Result<bool, VerifyError> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.ok_or(VerifyError::EmptyResponse)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Keystroke {
    Text(String),
    Key(Key),
}

/// Injector that records keystrokes into a shared log.
#[derive(Clone, Default)]
pub struct RecordingInjector {
    pub log: Arc<Mutex<Vec<Keystroke>>>,
    pub fail: bool,
}

impl RecordingInjector {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn strokes(&self) -> Vec<Keystroke> {
        self.log.lock().clone()
    }
}

impl KeyInjector for RecordingInjector {
    fn type_text(&mut self, text: &str) -> Result<(), ActionError> {
        if self.fail {
            return Err(ActionError::Injection("scripted failure".to_string()));
        }
        self.log.lock().push(Keystroke::Text(text.to_string()));
        Ok(())
    }

    fn press(&mut self, key: Key) -> Result<(), ActionError> {
        if self.fail {
            return Err(ActionError::Injection("scripted failure".to_string()));
        }
        self.log.lock().push(Keystroke::Key(key));
        Ok(())
    }
}

/// Transcriber whose text chunks are pushed by the test.
pub struct ScriptedTranscriber {
    pub recording: Arc<AtomicBool>,
    text_rx: Receiver<String>,
}

impl ScriptedTranscriber {
    pub fn new() -> (Self, Sender<String>, Arc<AtomicBool>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let recording = Arc::new(AtomicBool::new(false));
        let transcriber = Self {
            recording: recording.clone(),
            text_rx: rx,
        };
        (transcriber, tx, recording)
    }
}

impl Transcriber for ScriptedTranscriber {
    fn start(&mut self) -> Result<(), ActionError> {
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActionError> {
        self.recording.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn transcripts(&self) -> &Receiver<String> {
        &self.text_rx
    }
}
