use std::{
    collections::BTreeMap,
    io::Write,
    thread,
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;

use crate::{
    config::{ConfigStore, GestureBinding},
    types::{FrameReport, GestureKind},
};

const OUTPUT_QUEUE: usize = 32;

/// One JSON line on the output stream.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutputEvent {
    Status(FrameReport),
    Config(BTreeMap<GestureKind, GestureBinding>),
}

impl OutputEvent {
    pub fn config(config: &ConfigStore) -> Self {
        OutputEvent::Config(config.read(|s| s.gestures.clone()))
    }
}

/// Queue an event without blocking. Status lines are dropped when the writer
/// falls behind.
pub fn publish(output_tx: &Sender<OutputEvent>, event: OutputEvent) {
    match output_tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(OutputEvent::Status(_))) => {
            log::debug!("output writer busy, dropping status line");
        }
        Err(TrySendError::Full(event)) => {
            let _ = output_tx.send(event);
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

pub fn start_output_writer<W>(writer: W) -> (Sender<OutputEvent>, thread::JoinHandle<()>)
where
    W: Write + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(OUTPUT_QUEUE);
    let handle = thread::spawn(move || writer_loop(rx, writer));
    (tx, handle)
}

fn writer_loop<W: Write>(events: Receiver<OutputEvent>, mut writer: W) {
    while let Ok(event) = events.recv() {
        if let Err(err) = write_event(&mut writer, &event) {
            log::error!("failed to write output: {err}");
            return;
        }
    }
}

fn write_event<W: Write>(writer: &mut W, event: &OutputEvent) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, event)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
