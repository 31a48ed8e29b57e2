//! Gesture decision engine: turns per-frame hand skeletons into debounced
//! commands for a terminal coding assistant.

pub mod action;
pub mod arbiter;
pub mod clutch;
pub mod config;
pub mod dictation;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod pipeline;
pub mod stability;
pub mod types;
pub mod verifier;

#[cfg(test)]
mod fixtures;
