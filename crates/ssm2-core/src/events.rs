//! Event system for UI decoupling.
//!
//! Allows CLI/TUI/GUI to subscribe to session events without
//! tight coupling to the core logic.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::definitions::{CuType, DiagnosticCode};
use crate::protocol::DcGroups;
use crate::query::{DtcStatus, LiveValue};
use crate::state::SessionState;

/// Events emitted by an SSM2 session.
///
/// State is always updated before the event announcing it is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsmEvent {
    /// Session state changed.
    StateChanged { from: SessionState, to: SessionState },
    /// Control unit identified and definitions loaded.
    SetupSucceeded { cu_type: CuType, description: String },
    SetupFailed { reason: String },
    DiagnosticCodeReadingStarted { groups: DcGroups },
    DiagnosticCodeReadingStopped,
    /// Decoded codes of one group. `status` is set for the engine
    /// current/temporary group.
    DiagnosticCodes {
        group: DcGroups,
        codes: Vec<DiagnosticCode>,
        status: Option<DtcStatus>,
        elapsed: Duration,
    },
    LiveDataReadingStarted { selectors: usize },
    LiveDataReadingStopped,
    /// Raw values in selector order.
    LiveData {
        values: Vec<LiveValue>,
        elapsed: Duration,
    },
    ActuatorTestStarted { index: usize },
    ActuatorTestStopped,
    /// Turning actuators off failed; some may still be active.
    SafetySweepFailed { address: u32 },
    /// Communication with the control unit failed; the session was reset.
    CommunicationError { message: String },
}

/// Observer trait for receiving session events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait SsmObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &SsmEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl SsmObserver for NullObserver {
    fn on_event(&self, _event: &SsmEvent) {}
}

/// Observer that forwards events into a channel, in emission order.
pub struct ChannelObserver {
    sender: Sender<SsmEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<SsmEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl SsmObserver for ChannelObserver {
    fn on_event(&self, event: &SsmEvent) {
        // Receiver gone: nobody is listening anymore.
        let _ = self.sender.send(event.clone());
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl SsmObserver for TracingObserver {
    fn on_event(&self, event: &SsmEvent) {
        match event {
            SsmEvent::StateChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "State changed");
            }
            SsmEvent::SetupSucceeded {
                cu_type,
                description,
            } => {
                tracing::info!(cu = %cu_type, description = %description, "Control unit set up");
            }
            SsmEvent::SetupFailed { reason } => {
                tracing::warn!(reason = %reason, "Setup failed");
            }
            SsmEvent::DiagnosticCodeReadingStarted { groups } => {
                tracing::info!(groups = %groups, "Diagnostic-code reading started");
            }
            SsmEvent::DiagnosticCodeReadingStopped => {
                tracing::info!("Diagnostic-code reading stopped");
            }
            SsmEvent::DiagnosticCodes {
                group,
                codes,
                status,
                elapsed,
            } => {
                tracing::debug!(
                    group = %group,
                    count = codes.len(),
                    test_mode = ?status.map(|s| s.test_mode),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Diagnostic codes"
                );
            }
            SsmEvent::LiveDataReadingStarted { selectors } => {
                tracing::info!(selectors, "Live-data reading started");
            }
            SsmEvent::LiveDataReadingStopped => {
                tracing::info!("Live-data reading stopped");
            }
            SsmEvent::LiveData { values, elapsed } => {
                tracing::trace!(
                    values = values.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Live data"
                );
            }
            SsmEvent::ActuatorTestStarted { index } => {
                tracing::info!(index, "Actuator test started");
            }
            SsmEvent::ActuatorTestStopped => {
                tracing::info!("Actuator test stopped");
            }
            SsmEvent::SafetySweepFailed { address } => {
                tracing::error!(address = %format!("0x{:06X}", address), "Failed to switch actuators off");
            }
            SsmEvent::CommunicationError { message } => {
                tracing::error!("Communication error: {}", message);
            }
        }
    }
}
