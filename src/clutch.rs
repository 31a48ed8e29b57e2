use std::collections::VecDeque;

use crate::{geometry, types::HandSkeleton};

pub const DEFAULT_STABLE_FRAMES: usize = 5;

/// Closed-fist gate on the clutch hand. Engaged only once the last
/// `stable_frames` detections were all fists; one open frame drops it.
pub struct ClutchGate {
    history: VecDeque<bool>,
    stable_frames: usize,
    engaged: bool,
}

impl ClutchGate {
    pub fn new(stable_frames: usize) -> Self {
        let stable_frames = stable_frames.max(1);
        Self {
            history: VecDeque::with_capacity(stable_frames),
            stable_frames,
            engaged: false,
        }
    }

    pub fn update(&mut self, closed_fist: bool) -> bool {
        if self.history.len() == self.stable_frames {
            self.history.pop_front();
        }
        self.history.push_back(closed_fist);

        let engaged = self.history.len() == self.stable_frames && self.history.iter().all(|f| *f);
        self.set_engaged(engaged);
        engaged
    }

    pub fn update_pose(&mut self, pose: &HandSkeleton) -> bool {
        self.update(geometry::closed_fist(pose))
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.set_engaged(false);
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Number of closed-fist frames at the tail of the window.
    pub fn window_fill(&self) -> usize {
        self.history.iter().rev().take_while(|f| **f).count()
    }

    pub fn window_size(&self) -> usize {
        self.stable_frames
    }

    pub fn stability(&self) -> f32 {
        self.window_fill() as f32 / self.stable_frames as f32
    }

    fn set_engaged(&mut self, engaged: bool) {
        if engaged == self.engaged {
            return;
        }
        self.engaged = engaged;
        if engaged {
            log::info!("clutch ENGAGED");
        } else {
            log::info!("clutch DISENGAGED");
        }
    }
}

impl Default for ClutchGate {
    fn default() -> Self {
        Self::new(DEFAULT_STABLE_FRAMES)
    }
}
