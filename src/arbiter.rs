use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    config::DetectionConfig,
    types::{
        DetectionSource, Frame, GestureKind, HandSkeleton, Recognition, StableCandidate, Trigger,
    },
    verifier::{VerificationOutcome, VerificationRequest, VerifierWorker},
};

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Cooldown and "gesture must change" bookkeeping. Survives clutch cycles.
#[derive(Clone, Debug, Default)]
pub struct TriggerState {
    last_triggered: Option<GestureKind>,
    last_trigger_time: Option<Instant>,
    repeat_blocked: bool,
}

impl TriggerState {
    pub fn last_triggered(&self) -> Option<GestureKind> {
        self.last_triggered
    }

    pub fn last_trigger_time(&self) -> Option<Instant> {
        self.last_trigger_time
    }

    pub fn allows(&self, gesture: GestureKind, now: Instant, cooldown: Duration) -> bool {
        let cooled = self
            .last_trigger_time
            .is_none_or(|at| now.saturating_duration_since(at) >= cooldown);
        let repeat = self.repeat_blocked && self.last_triggered == Some(gesture);
        cooled && !repeat
    }

    /// A different gesture (or no gesture) was observed since the last trigger.
    fn release(&mut self) {
        self.repeat_blocked = false;
    }

    fn record(&mut self, gesture: GestureKind, now: Instant) {
        self.last_triggered = Some(gesture);
        self.last_trigger_time = Some(now);
        self.repeat_blocked = true;
    }
}

/// One frame's worth of evidence for [`FallbackArbiter::evaluate`].
pub struct Observation<'a> {
    pub recognition: Recognition,
    pub stable: Option<StableCandidate>,
    pub frame: Option<&'a Arc<Frame>>,
    pub hand: Option<&'a HandSkeleton>,
    pub now: Instant,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArbiterStatus {
    pub current_gesture: Option<GestureKind>,
    pub current_confidence: f32,
    pub last_triggered: Option<GestureKind>,
    pub verifier_enabled: bool,
    pub verification_pending: bool,
}

/// Decides whether a stable candidate fires, and from which source.
///
/// Confidence at or above the gesture's `skip_verifier_above` fires locally.
/// The medium band is confirmed by the verifier when one is available; the
/// request runs off-thread and its answer is picked up on a later frame.
/// Anything below the medium threshold never fires.
pub struct FallbackArbiter {
    detection: DetectionConfig,
    cooldown: Duration,
    sample_interval: Duration,
    verifier: Option<VerifierWorker>,
    verifier_enabled: bool,
    last_submission: Option<Instant>,
    epoch: u64,
    current: Recognition,
    trigger: TriggerState,
}

impl FallbackArbiter {
    pub fn new(detection: DetectionConfig) -> Self {
        Self {
            cooldown: Duration::from_millis(detection.cooldown_ms),
            detection,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            verifier: None,
            verifier_enabled: false,
            last_submission: None,
            epoch: 0,
            current: Recognition::NONE,
            trigger: TriggerState::default(),
        }
    }

    pub fn with_verifier(mut self, worker: VerifierWorker, sample_interval: Duration) -> Self {
        self.verifier = Some(worker);
        self.verifier_enabled = true;
        self.sample_interval = sample_interval;
        self
    }

    pub fn set_verifier_enabled(&mut self, enabled: bool) {
        if self.verifier.is_none() && enabled {
            log::warn!("no verifier configured, fallback stays disabled");
            return;
        }
        self.verifier_enabled = enabled;
        log::info!(
            "verifier fallback {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn evaluate(&mut self, observation: Observation<'_>) -> Option<Trigger> {
        let outcome = self.take_outcome();
        let Observation {
            recognition,
            stable,
            frame,
            hand,
            now,
        } = observation;

        self.current = match recognition.gesture {
            Some(_) if recognition.confidence >= self.detection.low_confidence => recognition,
            _ => Recognition::NONE,
        };
        if self.current.gesture.is_none() {
            self.trigger.release();
        }

        let candidate = stable?;
        if self.trigger.last_triggered() != Some(candidate.gesture) {
            self.trigger.release();
        }

        if candidate.confidence < self.detection.medium_confidence {
            log::debug!(
                "{} stable at {:.2}, below medium band",
                candidate.gesture,
                candidate.confidence
            );
            return None;
        }

        let skip_above = self.detection.skip_verifier_above(candidate.gesture);
        if candidate.confidence >= skip_above || !self.verifier_active() {
            return self.try_accept(candidate, DetectionSource::Local, now);
        }

        if let Some(outcome) = outcome.filter(|o| o.gesture == candidate.gesture) {
            if outcome.confirmed {
                return self.try_accept(candidate, DetectionSource::Verified, now);
            }
            log::debug!(
                "verifier rejected {} at {:.2}",
                candidate.gesture,
                candidate.confidence
            );
        }

        self.request_verification(candidate, frame, hand, now);
        None
    }

    /// Clutch released: forget the current gesture and invalidate any
    /// verification still in flight. Cooldown, last trigger and the
    /// verifier sampling interval are kept.
    pub fn reset(&mut self) {
        self.current = Recognition::NONE;
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn current(&self) -> Recognition {
        self.current
    }

    pub fn trigger_state(&self) -> &TriggerState {
        &self.trigger
    }

    pub fn is_verifying(&self) -> bool {
        self.verifier.as_ref().is_some_and(VerifierWorker::is_pending)
    }

    pub fn status(&self) -> ArbiterStatus {
        ArbiterStatus {
            current_gesture: self.current.gesture,
            current_confidence: self.current.confidence,
            last_triggered: self.trigger.last_triggered(),
            verifier_enabled: self.verifier_active(),
            verification_pending: self.is_verifying(),
        }
    }

    fn verifier_active(&self) -> bool {
        self.verifier_enabled && self.verifier.is_some()
    }

    fn take_outcome(&mut self) -> Option<VerificationOutcome> {
        let outcome = self.verifier.as_ref()?.poll()?;
        if outcome.epoch != self.epoch {
            log::debug!("discarding stale verification of {}", outcome.gesture);
            return None;
        }
        Some(outcome)
    }

    fn try_accept(
        &mut self,
        candidate: StableCandidate,
        source: DetectionSource,
        now: Instant,
    ) -> Option<Trigger> {
        if !self.trigger.allows(candidate.gesture, now, self.cooldown) {
            return None;
        }
        self.trigger.record(candidate.gesture, now);
        self.current = Recognition {
            gesture: Some(candidate.gesture),
            confidence: candidate.confidence,
        };
        log::info!(
            "triggered {} ({:.2}, {})",
            candidate.gesture,
            candidate.confidence,
            source.as_str()
        );
        Some(Trigger {
            gesture: candidate.gesture,
            confidence: candidate.confidence,
            source,
        })
    }

    fn request_verification(
        &mut self,
        candidate: StableCandidate,
        frame: Option<&Arc<Frame>>,
        hand: Option<&HandSkeleton>,
        now: Instant,
    ) {
        let Some(worker) = self.verifier.as_ref() else {
            return;
        };
        if worker.is_pending() {
            log::debug!("verification pending, skipping {}", candidate.gesture);
            return;
        }
        if !self.trigger.allows(candidate.gesture, now, self.cooldown) {
            return;
        }
        if self
            .last_submission
            .is_some_and(|at| now.saturating_duration_since(at) < self.sample_interval)
        {
            return;
        }
        let (Some(frame), Some(hand)) = (frame, hand) else {
            log::debug!("no frame to verify {} against", candidate.gesture);
            return;
        };

        let request = VerificationRequest {
            gesture: candidate.gesture,
            epoch: self.epoch,
            frame: frame.clone(),
            hand_bounds: hand.bounds(),
        };
        if worker.try_submit(request) {
            self.last_submission = Some(now);
            log::debug!(
                "submitted {} at {:.2} for verification",
                candidate.gesture,
                candidate.confidence
            );
        }
    }
}
