use std::collections::{BTreeMap, VecDeque};

use crate::{
    config::DetectionConfig,
    types::{GestureKind, Recognition, StableCandidate},
};

const NONE_WINDOW: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Entry {
    gesture: Option<GestureKind>,
    confidence: f32,
}

/// Per-gesture rolling histories. A gesture becomes stable once its window
/// is full and every entry in it names that gesture.
///
/// A confident frame (at or above `exclusive_above`) wipes every other
/// history. A weaker frame instead appends itself to the other non-empty
/// histories, so an interrupted streak has to rebuild from scratch.
pub struct StabilityTracker {
    histories: BTreeMap<Option<GestureKind>, VecDeque<Entry>>,
    windows: BTreeMap<GestureKind, usize>,
    exclusive_above: f32,
}

impl StabilityTracker {
    pub fn new(detection: &DetectionConfig) -> Self {
        let windows = GestureKind::ALL
            .into_iter()
            .map(|kind| (kind, detection.stability_frames(kind)))
            .collect();
        Self {
            histories: BTreeMap::new(),
            windows,
            exclusive_above: detection.medium_confidence,
        }
    }

    pub fn window(&self, gesture: Option<GestureKind>) -> usize {
        match gesture {
            Some(kind) => self.windows.get(&kind).copied().unwrap_or(3),
            None => NONE_WINDOW,
        }
    }

    pub fn record(&mut self, recognition: Recognition) -> Option<StableCandidate> {
        let entry = Entry {
            gesture: recognition.gesture,
            confidence: recognition.confidence,
        };

        if entry.gesture.is_some() && entry.confidence >= self.exclusive_above {
            self.histories.retain(|key, _| *key == entry.gesture);
        } else {
            for (key, history) in self.histories.iter_mut() {
                if *key != entry.gesture && !history.is_empty() {
                    let window = match key {
                        Some(kind) => self.windows.get(kind).copied().unwrap_or(3),
                        None => NONE_WINDOW,
                    };
                    push_bounded(history, entry, window);
                }
            }
        }

        let window = self.window(entry.gesture);
        let history = self.histories.entry(entry.gesture).or_default();
        push_bounded(history, entry, window);

        let gesture = entry.gesture?;
        let stable = history.len() == window && history.iter().all(|e| e.gesture == Some(gesture));
        if !stable {
            return None;
        }
        let confidence = history.iter().map(|e| e.confidence).sum::<f32>() / window as f32;
        Some(StableCandidate {
            gesture,
            confidence,
        })
    }

    pub fn clear(&mut self) {
        self.histories.clear();
    }

    pub fn history_len(&self, gesture: Option<GestureKind>) -> usize {
        self.histories.get(&gesture).map_or(0, VecDeque::len)
    }

    /// `(gesture, entries)` for every history holding at least one entry.
    pub fn active_histories(&self) -> Vec<(Option<GestureKind>, usize)> {
        self.histories
            .iter()
            .filter(|(_, h)| !h.is_empty())
            .map(|(key, h)| (*key, h.len()))
            .collect()
    }
}

fn push_bounded(history: &mut VecDeque<Entry>, entry: Entry, window: usize) {
    history.push_back(entry);
    while history.len() > window {
        history.pop_front();
    }
}
