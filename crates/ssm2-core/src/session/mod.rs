//! SSM2 Session - stateful driver for one control unit.
//!
//! A session identifies the control unit, resolves its definitions and then
//! runs one operation at a time on the transport. Every failure funnels
//! through [`Ssm2Session::reset`], which is also run when the session drops.

mod actuators;
mod helpers;
mod reading;


pub use helpers::{ClearMemoryLevel, ImmobilizerLineStatus};

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::definitions::{
    Capabilities, Capability, CuDefinitions, CuIdentity, CuType, DefinitionProvider,
};
use crate::error::SsmError;
use crate::events::{SsmEvent, SsmObserver, TracingObserver};
use crate::protocol::DcGroups;
use crate::protocol::constants::{
    ACTUATOR_OFF, ACTUATOR_REFRESH_MS, ADDR_IGNITION, ADDR_STATUS, DEFAULT_RETRIES_ON_ERROR,
    ENGINE_ADDR_ISO14230, ENGINE_ADDR_ISO15765, ENGINE_RUNNING_THRESHOLD, FALLBACK_ADDR_ANY_CU,
    FALLBACK_ADDR_ENGINE, IGNITION_ON_BIT, IGNITION_POLL_RETRIES, STATUS_TEST_MODE_BIT,
    TRANSMISSION_ADDR_ISO14230, TRANSMISSION_ADDR_ISO15765,
};
use crate::state::{Activity, ControlUnit, Phase, SessionState};
use crate::transport::{Protocol, Ssm2Transport, TransportError};

/// Configuration for an SSM2 session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Transport retries for single-shot requests.
    pub retries_on_error: u8,
    /// Transport retries while polling the ignition switch.
    pub ignition_poll_retries: u8,
    /// Refresh interval of an active actuator, in milliseconds.
    pub actuator_refresh_ms: u64,
    /// Engine speed bytes above this count as a running engine.
    pub engine_running_threshold: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retries_on_error: DEFAULT_RETRIES_ON_ERROR,
            ignition_poll_retries: IGNITION_POLL_RETRIES,
            actuator_refresh_ms: ACTUATOR_REFRESH_MS,
            engine_running_threshold: ENGINE_RUNNING_THRESHOLD,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// SSM2 Session - owns the transport and the state of one control unit.
pub struct Ssm2Session<T: Ssm2Transport, O: SsmObserver> {
    transport: T,
    provider: Box<dyn DefinitionProvider>,
    observer: Arc<O>,
    config: SessionConfig,
    phase: Phase,
}

impl<T: Ssm2Transport> Ssm2Session<T, TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(
        transport: T,
        provider: impl DefinitionProvider + 'static,
        config: SessionConfig,
    ) -> Self {
        Self::with_observer(transport, provider, config, Arc::new(TracingObserver))
    }
}

impl<T: Ssm2Transport, O: SsmObserver> Ssm2Session<T, O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(
        transport: T,
        provider: impl DefinitionProvider + 'static,
        config: SessionConfig,
        observer: Arc<O>,
    ) -> Self {
        Self {
            transport,
            provider: Box::new(provider),
            observer,
            config,
            phase: Phase::NeedsSetup,
        }
    }

    pub fn state(&self) -> SessionState {
        self.phase.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Index of the actuator under test.
    pub fn active_actuator(&self) -> Option<usize> {
        match &self.phase {
            Phase::Ready {
                activity: Activity::ActuatorTesting { actuator, .. },
                ..
            } => Some(*actuator),
            _ => None,
        }
    }

    /// Identify the control unit and load its definitions.
    ///
    /// Any previous session data is discarded first. On failure the session
    /// stays in `NeedsSetup`.
    #[instrument(skip(self))]
    pub fn setup(&mut self, cu_type: CuType, ignore_ignition: bool) -> Result<(), SsmError> {
        let protocol = self.transport.protocol();
        let base_address = cu_base_address(cu_type, protocol)?;
        self.reset();

        let (cu_address, identity) = match self.identify(cu_type, protocol, base_address) {
            Ok(found) => found,
            Err(e) => return Err(self.setup_failed(e.into())),
        };
        self.transport.set_retry_count(self.config.retries_on_error);

        let resolved = self.provider.resolve(cu_type, &identity);
        if !ignore_ignition
            && resolved.capabilities.has(Capability::IgnitionSwitch)
            && let Err(e) = self.check_ignition_on()
        {
            return Err(self.setup_failed(e));
        }

        let cu = ControlUnit::new(cu_type, cu_address, identity, resolved);
        info!(
            cu = %cu_type,
            address = format!("0x{:X}", cu_address),
            identity = %cu.identity(),
            capabilities = cu.capabilities().list().len(),
            "Control unit set up"
        );
        let description = cu.description().to_string();
        self.set_phase(Phase::Ready {
            cu: Box::new(cu),
            activity: Activity::Idle,
        });
        self.observer.on_event(&SsmEvent::SetupSucceeded {
            cu_type,
            description,
        });
        Ok(())
    }

    fn identify(
        &mut self,
        cu_type: CuType,
        protocol: Protocol,
        base_address: u32,
    ) -> Result<(u32, CuIdentity), TransportError> {
        let mut last_error = match self.transport.identify(base_address) {
            Ok(identity) => return Ok((base_address, identity)),
            Err(e) => e,
        };
        for &address in fallback_addresses(cu_type, protocol) {
            debug!(
                error = %last_error,
                fallback = format!("0x{:X}", address),
                "Identity query failed, trying fallback address"
            );
            match self.transport.identify(address) {
                Ok(identity) => return Ok((address, identity)),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    fn check_ignition_on(&mut self) -> Result<(), SsmError> {
        let bytes = self.transport.read_bytes(&[ADDR_IGNITION])?;
        match bytes.first() {
            Some(byte) if byte & IGNITION_ON_BIT != 0 => Ok(()),
            Some(_) => Err(SsmError::Comm(TransportError::ReadFailed(
                "ignition switch is off".into(),
            ))),
            None => Err(SsmError::Comm(TransportError::UnexpectedLength {
                expected: 1,
                actual: 0,
            })),
        }
    }

    fn setup_failed(&self, error: SsmError) -> SsmError {
        warn!(error = %error, "Setup failed");
        self.observer.on_event(&SsmEvent::SetupFailed {
            reason: error.to_string(),
        });
        error
    }

    /// Stop whatever runs on the transport and discard all control unit data.
    ///
    /// Idempotent. Talks to the transport directly and never calls other
    /// session operations. The state is `NeedsSetup` before any event is
    /// emitted.
    pub fn reset(&mut self) {
        let Phase::Ready { cu, activity } = std::mem::replace(&mut self.phase, Phase::NeedsSetup)
        else {
            return;
        };
        let previous = activity.state();
        info!(from = %previous, "Resetting session");

        let mut sweep_failure = None;
        if let Some(operation) = activity.operation() {
            match self.transport.stop(operation) {
                Ok(()) if previous == SessionState::ActuatorTesting => {
                    sweep_failure = self.sweep_if_test_mode(cu.actuator_addresses());
                }
                Ok(()) => {}
                Err(e) => warn!(error = %e, "Failed to stop repeating operation"),
            }
        }
        drop(activity);
        drop(cu);

        self.observer.on_event(&SsmEvent::StateChanged {
            from: previous,
            to: SessionState::NeedsSetup,
        });
        if let Some(address) = sweep_failure {
            self.observer
                .on_event(&SsmEvent::SafetySweepFailed { address });
        }
        match previous {
            SessionState::ReadingDiagnosticCodes => {
                self.observer.on_event(&SsmEvent::DiagnosticCodeReadingStopped)
            }
            SessionState::ReadingLiveData => {
                self.observer.on_event(&SsmEvent::LiveDataReadingStopped)
            }
            SessionState::ActuatorTesting => {
                self.observer.on_event(&SsmEvent::ActuatorTestStopped)
            }
            _ => {}
        }
    }

    /// Switch actuators off if the control unit still reports test mode.
    /// Returns the address of a failed write.
    fn sweep_if_test_mode(&mut self, addresses: &[u32]) -> Option<u32> {
        match self.transport.read_bytes(&[ADDR_STATUS]) {
            Ok(bytes) if bytes.first().is_some_and(|b| b & STATUS_TEST_MODE_BIT != 0) => {
                sweep_off(&mut self.transport, addresses)
                    .err()
                    .map(|(address, error)| {
                        warn!(
                            error = %error,
                            address = format!("0x{:06X}", address),
                            "Actuator sweep failed during reset"
                        );
                        address
                    })
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Could not read test mode status during reset");
                None
            }
        }
    }

    /// Reset after a transport failure and report it.
    fn comm_failure(&mut self, error: TransportError) -> SsmError {
        warn!(error = %error, state = %self.state(), "Communication failure");
        let message = error.to_string();
        self.reset();
        self.observer
            .on_event(&SsmEvent::CommunicationError { message });
        SsmError::Comm(error)
    }

    fn set_phase(&mut self, phase: Phase) {
        let from = self.phase.state();
        self.phase = phase;
        self.announce_transition(from);
    }

    /// Replace the current activity, returning the previous one.
    fn set_activity(&mut self, activity: Activity) -> Activity {
        let from = self.phase.state();
        let previous = match &mut self.phase {
            Phase::Ready {
                activity: current, ..
            } => std::mem::replace(current, activity),
            Phase::NeedsSetup => return activity,
        };
        self.announce_transition(from);
        previous
    }

    fn announce_transition(&self, from: SessionState) {
        let to = self.phase.state();
        if from != to {
            info!(from = %from, to = %to, "State transition");
            self.observer.on_event(&SsmEvent::StateChanged { from, to });
        }
    }

    /// Control unit of an idle, set-up session.
    fn ready(&self, operation: &'static str) -> Result<&ControlUnit, SsmError> {
        match &self.phase {
            Phase::Ready {
                cu,
                activity: Activity::Idle,
            } => Ok(&**cu),
            phase => Err(SsmError::InvalidState {
                state: phase.state(),
                operation,
            }),
        }
    }

    fn read(&mut self, addresses: &[u32]) -> Result<Vec<u8>, SsmError> {
        match self.transport.read_bytes(addresses) {
            Ok(bytes) if bytes.len() == addresses.len() => Ok(bytes),
            Ok(bytes) => Err(self.comm_failure(TransportError::UnexpectedLength {
                expected: addresses.len(),
                actual: bytes.len(),
            })),
            Err(e) => Err(self.comm_failure(e)),
        }
    }

    fn read_byte(&mut self, address: u32) -> Result<u8, SsmError> {
        let bytes = self.read(&[address])?;
        Ok(bytes[0])
    }

    /// Write one byte, returning the value the control unit reports.
    fn write(&mut self, address: u32, value: u8) -> Result<u8, SsmError> {
        self.transport
            .write_byte(address, value)
            .map_err(|e| self.comm_failure(e))
    }

    // --- Control unit data; unavailable while `NeedsSetup` ---

    pub fn control_unit(&self) -> Result<&ControlUnit, SsmError> {
        self.phase.control_unit().ok_or(SsmError::NotSetUp)
    }

    pub fn cu_type(&self) -> Result<CuType, SsmError> {
        Ok(self.control_unit()?.cu_type())
    }

    pub fn description(&self) -> Result<&str, SsmError> {
        Ok(self.control_unit()?.description())
    }

    pub fn system_id(&self) -> Result<String, SsmError> {
        Ok(self.control_unit()?.identity().system_id_hex())
    }

    pub fn rom_id(&self) -> Result<String, SsmError> {
        Ok(self.control_unit()?.identity().rom_id_hex())
    }

    pub fn capabilities(&self) -> Result<Capabilities, SsmError> {
        Ok(self.control_unit()?.capabilities())
    }

    pub fn has(&self, capability: Capability) -> Result<bool, SsmError> {
        Ok(self.control_unit()?.has(capability))
    }

    pub fn has_vin_support(&self) -> Result<bool, SsmError> {
        self.has(Capability::Vin)
    }

    pub fn has_integrated_cc(&self) -> Result<bool, SsmError> {
        self.has(Capability::IntegratedCruiseControl)
    }

    pub fn has_clear_memory(&self) -> Result<bool, SsmError> {
        self.has(Capability::ClearMemory)
    }

    pub fn has_clear_memory2(&self) -> Result<bool, SsmError> {
        self.has(Capability::ClearMemory2)
    }

    pub fn supported_dc_groups(&self) -> Result<DcGroups, SsmError> {
        Ok(self.control_unit()?.supported_dc_groups())
    }

    pub fn definitions(&self) -> Result<&CuDefinitions, SsmError> {
        Ok(self.control_unit()?.definitions())
    }
}

impl<T: Ssm2Transport, O: SsmObserver> Drop for Ssm2Session<T, O> {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Write the off value to every address, stopping at the first failure.
fn sweep_off<T: Ssm2Transport>(
    transport: &mut T,
    addresses: &[u32],
) -> Result<(), (u32, TransportError)> {
    for &address in addresses {
        transport
            .write_byte(address, ACTUATOR_OFF)
            .map_err(|e| (address, e))?;
    }
    Ok(())
}

/// Type-specific control unit address for the interface protocol.
fn cu_base_address(cu_type: CuType, protocol: Protocol) -> Result<u32, SsmError> {
    match (protocol, cu_type) {
        (Protocol::Ssm1, _) => Err(SsmError::InvalidInterfaceConfig),
        (Protocol::Ssm2Iso14230, CuType::Engine) => Ok(ENGINE_ADDR_ISO14230),
        (Protocol::Ssm2Iso14230, CuType::Transmission) => Ok(TRANSMISSION_ADDR_ISO14230),
        (Protocol::Ssm2Iso15765, CuType::Engine) => Ok(ENGINE_ADDR_ISO15765),
        (Protocol::Ssm2Iso15765, CuType::Transmission) => Ok(TRANSMISSION_ADDR_ISO15765),
        _ => Err(SsmError::InvalidCuType),
    }
}

/// Addresses tried when the type-specific one does not answer.
fn fallback_addresses(cu_type: CuType, protocol: Protocol) -> &'static [u32] {
    match (protocol, cu_type) {
        (Protocol::Ssm2Iso14230, CuType::Engine) => &[FALLBACK_ADDR_ANY_CU, FALLBACK_ADDR_ENGINE],
        (Protocol::Ssm2Iso14230, _) => &[FALLBACK_ADDR_ANY_CU],
        _ => &[],
    }
}
