//! Session states.

use std::fmt;

use super::control_unit::ControlUnit;
use crate::query::{DcReadPlan, MbSwReadPlan};
use crate::transport::RepeatingOperation;

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No control unit data; `setup` required.
    NeedsSetup,
    /// Set up, no operation in progress.
    Normal,
    ReadingDiagnosticCodes,
    ReadingLiveData,
    ActuatorTesting,
    WaitingForIgnitionOff,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::NeedsSetup
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::NeedsSetup => write!(f, "NEEDS_SETUP"),
            SessionState::Normal => write!(f, "NORMAL"),
            SessionState::ReadingDiagnosticCodes => write!(f, "READING_DIAGNOSTIC_CODES"),
            SessionState::ReadingLiveData => write!(f, "READING_LIVE_DATA"),
            SessionState::ActuatorTesting => write!(f, "ACTUATOR_TESTING"),
            SessionState::WaitingForIgnitionOff => write!(f, "WAITING_FOR_IGNITION_OFF"),
        }
    }
}

impl SessionState {
    /// Check if the transport is busy on behalf of the session.
    pub fn is_polling(&self) -> bool {
        matches!(
            self,
            SessionState::ReadingDiagnosticCodes
                | SessionState::ReadingLiveData
                | SessionState::ActuatorTesting
                | SessionState::WaitingForIgnitionOff
        )
    }
}

/// What a set-up session is doing. Polling variants own their operation.
#[derive(Debug)]
pub(crate) enum Activity {
    Idle,
    ReadingDiagnosticCodes {
        operation: RepeatingOperation,
        plan: DcReadPlan,
    },
    ReadingLiveData {
        operation: RepeatingOperation,
        plan: MbSwReadPlan,
    },
    ActuatorTesting {
        operation: RepeatingOperation,
        actuator: usize,
    },
    /// Blocking poll of the ignition switch bit. The poll loop is the
    /// operation, so there is no handle to own.
    PollingIgnitionSwitch,
    /// Repeating read that runs until the link drops.
    WaitingForIgnitionOff { operation: RepeatingOperation },
}

impl Activity {
    pub(crate) fn state(&self) -> SessionState {
        match self {
            Activity::Idle => SessionState::Normal,
            Activity::ReadingDiagnosticCodes { .. } => SessionState::ReadingDiagnosticCodes,
            Activity::ReadingLiveData { .. } => SessionState::ReadingLiveData,
            Activity::ActuatorTesting { .. } => SessionState::ActuatorTesting,
            Activity::PollingIgnitionSwitch | Activity::WaitingForIgnitionOff { .. } => {
                SessionState::WaitingForIgnitionOff
            }
        }
    }

    pub(crate) fn operation(&self) -> Option<&RepeatingOperation> {
        match self {
            Activity::Idle | Activity::PollingIgnitionSwitch => None,
            Activity::ReadingDiagnosticCodes { operation, .. }
            | Activity::ReadingLiveData { operation, .. }
            | Activity::ActuatorTesting { operation, .. }
            | Activity::WaitingForIgnitionOff { operation } => Some(operation),
        }
    }
}

/// Session state together with the resources it owns.
#[derive(Debug)]
pub(crate) enum Phase {
    NeedsSetup,
    Ready {
        cu: Box<ControlUnit>,
        activity: Activity,
    },
}

impl Phase {
    pub(crate) fn state(&self) -> SessionState {
        match self {
            Phase::NeedsSetup => SessionState::NeedsSetup,
            Phase::Ready { activity, .. } => activity.state(),
        }
    }

    pub(crate) fn control_unit(&self) -> Option<&ControlUnit> {
        match self {
            Phase::NeedsSetup => None,
            Phase::Ready { cu, .. } => Some(&**cu),
        }
    }

    pub(crate) fn operation(&self) -> Option<&RepeatingOperation> {
        match self {
            Phase::NeedsSetup => None,
            Phase::Ready { activity, .. } => activity.operation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_states() {
        assert!(!SessionState::NeedsSetup.is_polling());
        assert!(!SessionState::Normal.is_polling());
        assert!(SessionState::ReadingDiagnosticCodes.is_polling());
        assert!(SessionState::ReadingLiveData.is_polling());
        assert!(SessionState::ActuatorTesting.is_polling());
        assert!(SessionState::WaitingForIgnitionOff.is_polling());
    }

    #[test]
    fn test_idle_phase() {
        assert_eq!(Phase::NeedsSetup.state(), SessionState::NeedsSetup);
        assert!(Phase::NeedsSetup.control_unit().is_none());
        assert!(Activity::Idle.operation().is_none());
        assert_eq!(Activity::Idle.state(), SessionState::Normal);
    }

    #[test]
    fn test_ignition_switch_poll_is_waiting_state() {
        let activity = Activity::PollingIgnitionSwitch;
        assert_eq!(activity.state(), SessionState::WaitingForIgnitionOff);
        assert!(activity.state().is_polling());
        assert!(activity.operation().is_none());
    }
}
