//! Single-shot diagnostics: clear memory, immobilizer line, VIN, probes.

use std::fmt;

use tracing::{debug, info, instrument};

use super::Ssm2Session;
use crate::definitions::Capability;
use crate::error::SsmError;
use crate::events::SsmObserver;
use crate::protocol::constants::{
    ADDR_CLEAR_MEMORY, ADDR_ENGINE_SPEED, ADDR_IGNITION, ADDR_IMMO_TEST_RESULT,
    ADDR_IMMO_TEST_WRITE, ADDR_STATUS, ADDR_VIN_POINTER, CLEAR_MEMORY_LEVEL1,
    CLEAR_MEMORY_LEVEL2, IGNITION_ON_BIT, IMMO_SHORTED_TO_BATTERY, IMMO_SHORTED_TO_GROUND,
    IMMO_TEST_PATTERN, STATUS_TEST_MODE_BIT,
};
use crate::protocol::vin::vin_addresses;
use crate::protocol::{validate_vin, vin_start_address};
use crate::state::Activity;
use crate::transport::{LinkEvent, Ssm2Transport};

/// Extent of a memory clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMemoryLevel {
    /// Diagnostic codes and learned values.
    Level1,
    Level2,
}

impl ClearMemoryLevel {
    fn value(self) -> u8 {
        match self {
            ClearMemoryLevel::Level1 => CLEAR_MEMORY_LEVEL1,
            ClearMemoryLevel::Level2 => CLEAR_MEMORY_LEVEL2,
        }
    }

    fn capability(self) -> Capability {
        match self {
            ClearMemoryLevel::Level1 => Capability::ClearMemory,
            ClearMemoryLevel::Level2 => Capability::ClearMemory2,
        }
    }
}

/// Result of the immobilizer communication line test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmobilizerLineStatus {
    NotShorted,
    ShortedToGround,
    ShortedToBattery,
}

impl ImmobilizerLineStatus {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            IMMO_SHORTED_TO_GROUND => ImmobilizerLineStatus::ShortedToGround,
            IMMO_SHORTED_TO_BATTERY => ImmobilizerLineStatus::ShortedToBattery,
            _ => ImmobilizerLineStatus::NotShorted,
        }
    }
}

impl fmt::Display for ImmobilizerLineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImmobilizerLineStatus::NotShorted => write!(f, "not shorted"),
            ImmobilizerLineStatus::ShortedToGround => write!(f, "shorted to ground"),
            ImmobilizerLineStatus::ShortedToBattery => write!(f, "shorted to battery"),
        }
    }
}

impl<T: Ssm2Transport, O: SsmObserver> Ssm2Session<T, O> {
    /// Clear the control unit memory.
    ///
    /// Returns whether the control unit confirmed the written value.
    #[instrument(skip(self))]
    pub fn clear_memory(&mut self, level: ClearMemoryLevel) -> Result<bool, SsmError> {
        self.ready("clear memory")?.require(level.capability())?;
        let value = level.value();
        let written = self.write(ADDR_CLEAR_MEMORY, value)?;
        info!(
            value = format!("0x{:02X}", value),
            confirmed = written == value,
            "Memory cleared"
        );
        Ok(written == value)
    }

    #[instrument(skip(self))]
    pub fn test_immobilizer_line(&mut self) -> Result<ImmobilizerLineStatus, SsmError> {
        self.ready("test immobilizer line")?
            .require(Capability::Immobilizer)?;
        self.write(ADDR_IMMO_TEST_WRITE, IMMO_TEST_PATTERN)?;
        let result = self.read_byte(ADDR_IMMO_TEST_RESULT)?;
        Ok(ImmobilizerLineStatus::from_byte(result))
    }

    /// Read and validate the vehicle identification number.
    ///
    /// An invalid VIN is a data error and leaves the session set up.
    #[instrument(skip(self))]
    pub fn vin(&mut self) -> Result<String, SsmError> {
        self.ready("read VIN")?.require(Capability::Vin)?;
        let pointer = self.read(&ADDR_VIN_POINTER)?;
        let start = vin_start_address(&[pointer[0], pointer[1], pointer[2]]);
        debug!(start = format!("0x{:06X}", start), "Reading VIN");
        let raw = self.read(&vin_addresses(start))?;
        if !validate_vin(&raw) {
            return Err(SsmError::DataValidation(format!(
                "malformed VIN {:?}",
                String::from_utf8_lossy(&raw)
            )));
        }
        String::from_utf8(raw).map_err(|e| SsmError::DataValidation(e.to_string()))
    }

    /// Check the engine speed against the running threshold.
    pub fn is_engine_running(&mut self) -> Result<bool, SsmError> {
        self.ready("read engine speed")?
            .require(Capability::EngineSpeedBlock)?;
        let speed = self.read_byte(ADDR_ENGINE_SPEED)?;
        Ok(speed > self.config.engine_running_threshold)
    }

    pub fn is_in_test_mode(&mut self) -> Result<bool, SsmError> {
        self.ready("read test mode")?.require(Capability::TestMode)?;
        let status = self.read_byte(ADDR_STATUS)?;
        Ok(status & STATUS_TEST_MODE_BIT != 0)
    }

    /// Block until the ignition is switched off, then reset the session.
    ///
    /// With an ignition switch bit the status byte is polled until the bit
    /// clears or reads fail. Otherwise a repeating read runs until the link
    /// drops, which is how switching the ignition off shows up.
    #[instrument(skip(self))]
    pub fn wait_for_ignition_off(&mut self) -> Result<(), SsmError> {
        let has_switch = self
            .ready("wait for ignition off")?
            .has(Capability::IgnitionSwitch);
        self.transport
            .set_retry_count(self.config.ignition_poll_retries);

        if has_switch {
            self.set_activity(Activity::PollingIgnitionSwitch);
            loop {
                match self.transport.read_bytes(&[ADDR_IGNITION]) {
                    Ok(bytes) if bytes.first().is_some_and(|b| b & IGNITION_ON_BIT != 0) => {}
                    Ok(_) => break,
                    Err(e) => {
                        debug!(error = %e, "Ignition poll failed");
                        break;
                    }
                }
            }
        } else {
            let operation = match self.transport.start_repeating_read(&[ADDR_IGNITION]) {
                Ok(op) => op,
                Err(e) => {
                    self.transport.set_retry_count(self.config.retries_on_error);
                    return Err(self.comm_failure(e));
                }
            };
            self.set_activity(Activity::WaitingForIgnitionOff { operation });
            if let Some(op) = self.phase.operation() {
                while op.next_blocking() != LinkEvent::CommError {}
            }
        }

        info!("Ignition switched off");
        self.transport.set_retry_count(self.config.retries_on_error);
        self.reset();
        Ok(())
    }
}
