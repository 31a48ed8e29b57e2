//! Off-thread gesture confirmation.
//!
//! A [`VerifierWorker`] owns one background thread running a
//! [`GestureVerifier`]. At most one request is in flight: `try_submit` claims
//! the in-flight flag and the worker releases it after publishing the outcome,
//! so the frame loop never waits on the network.

pub mod crop;
pub mod gemini;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::{
    error::VerifyError,
    types::{Frame, GestureKind},
};

pub use gemini::GeminiVerifier;

pub trait GestureVerifier: Send + 'static {
    /// True when the frame confirms `request.gesture`.
    fn verify(&mut self, request: &VerificationRequest) -> Result<bool, VerifyError>;
}

#[derive(Clone, Debug)]
pub struct VerificationRequest {
    pub gesture: GestureKind,
    /// Arbiter epoch the request was issued in. Outcomes from an older epoch
    /// are discarded.
    pub epoch: u64,
    pub frame: Arc<Frame>,
    /// Normalized `[min_x, min_y, max_x, max_y]` of the command hand.
    pub hand_bounds: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub gesture: GestureKind,
    pub epoch: u64,
    pub confirmed: bool,
}

pub struct VerifierWorker {
    job_tx: Option<Sender<VerificationRequest>>,
    outcome_rx: Receiver<VerificationOutcome>,
    in_flight: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl VerifierWorker {
    pub fn spawn<V: GestureVerifier>(verifier: V) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::bounded(1);
        let (outcome_tx, outcome_rx) = crossbeam_channel::bounded(1);
        let in_flight = Arc::new(AtomicBool::new(false));
        let flag = in_flight.clone();

        let handle = thread::spawn(move || run_worker_loop(verifier, job_rx, outcome_tx, flag));

        Self {
            job_tx: Some(job_tx),
            outcome_rx,
            in_flight,
            handle: Some(handle),
        }
    }

    /// Hand a request to the worker. Returns false without queueing anything
    /// when a request is already in flight.
    pub fn try_submit(&self, request: VerificationRequest) -> bool {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return false;
        }
        let Some(job_tx) = self.job_tx.as_ref() else {
            self.in_flight.store(false, Ordering::Release);
            return false;
        };
        match job_tx.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.in_flight.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Latest finished outcome, if any arrived since the last poll.
    pub fn poll(&self) -> Option<VerificationOutcome> {
        let mut latest = self.outcome_rx.try_recv().ok()?;
        while let Ok(newer) = self.outcome_rx.try_recv() {
            latest = newer;
        }
        Some(latest)
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl Drop for VerifierWorker {
    fn drop(&mut self) {
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker_loop<V: GestureVerifier>(
    mut verifier: V,
    job_rx: Receiver<VerificationRequest>,
    outcome_tx: Sender<VerificationOutcome>,
    in_flight: Arc<AtomicBool>,
) {
    log::info!("gesture verifier ready");

    while let Ok(request) = job_rx.recv() {
        let confirmed = match verifier.verify(&request) {
            Ok(confirmed) => confirmed,
            Err(err) => {
                log::warn!("verification of {} failed: {err}", request.gesture);
                false
            }
        };
        log::debug!(
            "verifier answered {} for {} (epoch {})",
            if confirmed { "yes" } else { "no" },
            request.gesture,
            request.epoch
        );

        let outcome = VerificationOutcome {
            gesture: request.gesture,
            epoch: request.epoch,
            confirmed,
        };
        if outcome_tx.try_send(outcome).is_err() {
            log::debug!("dropping verifier outcome, previous one not consumed");
        }
        in_flight.store(false, Ordering::Release);
    }
}
