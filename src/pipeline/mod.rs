pub mod input;
pub mod output;

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::{
    action::ActionDispatcher,
    arbiter::{ArbiterStatus, FallbackArbiter, Observation},
    clutch::ClutchGate,
    config::{ConfigStore, Settings},
    gesture::TemplateScorer,
    stability::StabilityTracker,
    types::{
        ActionReport, ClutchReport, DetectionSource, DictationReport, FrameInput, FrameReport,
        GestureKind, GestureReport, Recognition, gesture_label,
    },
    verifier::VerifierWorker,
};

use self::{input::InputEvent, output::OutputEvent};

const RECORDING_TEXT: &str = "Recording...";

/// Snapshot of the whole decision chain.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineStatus {
    pub clutch_engaged: bool,
    pub clutch_stability: f32,
    pub arbiter: ArbiterStatus,
    /// `(gesture, entries)` for every non-empty stability history.
    pub active_histories: Vec<(Option<GestureKind>, usize)>,
    pub dictation_active: bool,
}

/// The per-frame decision engine: clutch gate, template scorer, stability
/// tracker, arbiter and dispatcher, driven one frame at a time.
pub struct Engine {
    clutch: ClutchGate,
    scorer: TemplateScorer,
    tracker: StabilityTracker,
    arbiter: FallbackArbiter,
    dispatcher: ActionDispatcher,
    previous_gesture: Option<GestureKind>,
}

impl Engine {
    pub fn new(settings: &Settings, dispatcher: ActionDispatcher) -> Self {
        Self {
            clutch: ClutchGate::new(settings.clutch.stable_frames),
            scorer: TemplateScorer::new(settings.detection.low_confidence),
            tracker: StabilityTracker::new(&settings.detection),
            arbiter: FallbackArbiter::new(settings.detection.clone()),
            dispatcher,
            previous_gesture: None,
        }
    }

    pub fn with_verifier(mut self, worker: VerifierWorker, sample_interval: Duration) -> Self {
        self.arbiter = self.arbiter.with_verifier(worker, sample_interval);
        self
    }

    pub fn clutch(&self) -> &ClutchGate {
        &self.clutch
    }

    pub fn arbiter(&self) -> &FallbackArbiter {
        &self.arbiter
    }

    pub fn set_verifier_enabled(&mut self, enabled: bool) {
        self.arbiter.set_verifier_enabled(enabled);
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            clutch_engaged: self.clutch.is_engaged(),
            clutch_stability: self.clutch.stability(),
            arbiter: self.arbiter.status(),
            active_histories: self.tracker.active_histories(),
            dictation_active: self.dispatcher.is_dictation_active(),
        }
    }

    pub fn process(&mut self, input: FrameInput) -> FrameReport {
        let engaged = match &input.clutch_hand {
            Some(hand) => self.clutch.update_pose(hand),
            None => {
                self.clutch.reset();
                false
            }
        };

        let recognition = input
            .command_hand
            .as_ref()
            .map_or(Recognition::NONE, |hand| {
                self.scorer.recognize_with_confidence(hand)
            });

        let mut gesture = None;
        let mut action = None;
        if engaged {
            let stable = self.tracker.record(recognition);
            let trigger = self.arbiter.evaluate(Observation {
                recognition,
                stable,
                frame: input.image.as_ref(),
                hand: input.command_hand.as_ref(),
                now: input.timestamp,
            });
            let current = self.arbiter.current();

            action = self.update_push_to_talk(current.gesture);
            if let Some(trigger) = trigger {
                if !self.dispatcher.is_voice_gesture(Some(trigger.gesture)) {
                    if let Some(dispatch) = self.dispatcher.dispatch(trigger.gesture) {
                        action = Some(ActionReport {
                            gesture: trigger.gesture.as_str(),
                            description: dispatch.description,
                            success: dispatch.success,
                        });
                    }
                }
            }

            gesture = Some(GestureReport {
                gesture: gesture_label(current.gesture),
                confidence: current.confidence,
                source: trigger.map_or(DetectionSource::Local, |t| t.source),
                triggered: trigger.is_some(),
            });
        } else {
            self.tracker.clear();
            self.arbiter.reset();
            if let Err(err) = self.dispatcher.stop_dictation() {
                log::error!("failed to stop dictation: {err}");
            }
            self.previous_gesture = None;
        }

        self.dispatcher.drain_transcripts();

        FrameReport {
            clutch: ClutchReport {
                engaged,
                window_fill: self.clutch.window_fill(),
                window_size: self.clutch.window_size(),
            },
            gesture,
            action,
            dictation: DictationReport {
                active: self.dispatcher.is_dictation_active(),
            },
        }
    }

    /// Start dictation on the rising edge of the voice gesture and stop it on
    /// the falling edge.
    fn update_push_to_talk(&mut self, current: Option<GestureKind>) -> Option<ActionReport> {
        let was_voice = self.dispatcher.is_voice_gesture(self.previous_gesture);
        let is_voice = self.dispatcher.is_voice_gesture(current);
        self.previous_gesture = current;

        if is_voice && !was_voice {
            match self.dispatcher.start_dictation() {
                Ok(()) => {
                    return Some(ActionReport {
                        gesture: gesture_label(current),
                        description: RECORDING_TEXT.to_string(),
                        success: true,
                    });
                }
                Err(err) => log::error!("failed to start dictation: {err}"),
            }
        } else if was_voice && !is_voice {
            if let Err(err) = self.dispatcher.stop_dictation() {
                log::error!("failed to stop dictation: {err}");
            }
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameMode {
    /// Only the newest queued frame is processed.
    Live,
    /// Every frame is processed in arrival order.
    Replay,
}

/// Drive `engine` until the input channel closes. Control messages are
/// always handled; in live mode stale frames are skipped.
pub fn run_frame_loop(
    engine: &mut Engine,
    config: &ConfigStore,
    input_rx: Receiver<InputEvent>,
    output_tx: Sender<OutputEvent>,
    mode: FrameMode,
) {
    while let Ok(event) = input_rx.recv() {
        let mut latest = handle_event(event, config, &output_tx);
        if mode == FrameMode::Live {
            while let Ok(newer) = input_rx.try_recv() {
                if let Some(frame) = handle_event(newer, config, &output_tx) {
                    latest = Some(frame);
                }
            }
        }

        let Some(frame) = latest else {
            continue;
        };
        let report = engine.process(frame);
        if let Some(text) = report.display_text().filter(|_| report.triggered()) {
            log::debug!("{text}");
        }
        output::publish(&output_tx, OutputEvent::Status(report));
    }
}

fn handle_event(
    event: InputEvent,
    config: &ConfigStore,
    output_tx: &Sender<OutputEvent>,
) -> Option<FrameInput> {
    match event {
        InputEvent::Frame(frame) => return Some(frame),
        InputEvent::UpdateGesture {
            gesture,
            command,
            description,
        } => {
            config.set_command(gesture, &command, description.as_deref());
            if let Err(err) = config.save() {
                log::error!("failed to save config: {err}");
            }
            output::publish(output_tx, OutputEvent::config(config));
        }
        InputEvent::GetConfig => output::publish(output_tx, OutputEvent::config(config)),
    }
    None
}
