//! Actuator tests and adjustment values.

use std::time::Duration;

use tracing::{info, instrument, warn};

use super::{Ssm2Session, sweep_off};
use crate::definitions::Capability;
use crate::error::SsmError;
use crate::events::{SsmEvent, SsmObserver};
use crate::protocol::{AdjustmentRange, decode_adjustment, encode_adjustment};
use crate::state::{Activity, SessionState};
use crate::transport::Ssm2Transport;

impl<T: Ssm2Transport, O: SsmObserver> Ssm2Session<T, O> {
    /// Drive one actuator until [`Self::stop_actuator_test`] is called.
    ///
    /// Requires test mode and a stopped engine. All actuators are switched
    /// off before the selected one is activated.
    #[instrument(skip(self))]
    pub fn start_actuator_test(&mut self, index: usize) -> Result<(), SsmError> {
        let (address, pattern, sweep) = {
            let cu = self.ready("start actuator test")?;
            cu.require(Capability::ActuatorTest)?;
            let actuator = cu.definitions().actuators.get(index).ok_or_else(|| {
                SsmError::InvalidArgument(format!("unknown actuator {}", index))
            })?;
            let pattern = actuator.pattern().ok_or_else(|| {
                SsmError::InvalidArgument(format!(
                    "actuator {} has invalid bit {}",
                    index, actuator.bit
                ))
            })?;
            (actuator.address, pattern, cu.actuator_addresses().to_vec())
        };
        self.check_actuator_interlocks()?;
        self.sweep_or_reset(&sweep)?;

        let interval = Duration::from_millis(self.config.actuator_refresh_ms);
        let operation = self
            .transport
            .start_repeating_write(address, pattern, interval)
            .map_err(|e| self.comm_failure(e))?;
        info!(
            index,
            address = format!("0x{:06X}", address),
            pattern = format!("0x{:02X}", pattern),
            "Actuator activated"
        );
        self.set_activity(Activity::ActuatorTesting {
            operation,
            actuator: index,
        });
        self.observer
            .on_event(&SsmEvent::ActuatorTestStarted { index });
        Ok(())
    }

    /// Stop the running actuator test and switch all actuators off.
    ///
    /// The session stays in `ActuatorTesting` until the sweep succeeds, so a
    /// failed sweep resets from there and the reset sweeps once more.
    /// Succeeds without I/O if no test runs.
    #[instrument(skip(self))]
    pub fn stop_actuator_test(&mut self) -> Result<(), SsmError> {
        let state = self.state();
        match state {
            SessionState::NeedsSetup | SessionState::Normal => return Ok(()),
            SessionState::ActuatorTesting => {}
            _ => {
                return Err(SsmError::InvalidState {
                    state,
                    operation: "stop actuator test",
                });
            }
        }
        let stopped = match self.phase.operation() {
            Some(op) => self.transport.stop(op),
            None => Ok(()),
        };
        if let Err(e) = stopped {
            return Err(self.comm_failure(e));
        }
        let sweep = match self.phase.control_unit() {
            Some(cu) => cu.actuator_addresses().to_vec(),
            None => Vec::new(),
        };
        self.sweep_or_reset(&sweep)?;
        self.set_activity(Activity::Idle);
        self.observer.on_event(&SsmEvent::ActuatorTestStopped);
        Ok(())
    }

    /// Switch all actuators off without a running test.
    ///
    /// Some control units activate actuators on their own when the ignition
    /// is switched on in test mode.
    #[instrument(skip(self))]
    pub fn stop_all_actuators(&mut self) -> Result<(), SsmError> {
        let sweep = {
            let cu = self.ready("stop all actuators")?;
            cu.require(Capability::ActuatorTest)?;
            cu.actuator_addresses().to_vec()
        };
        self.check_actuator_interlocks()?;
        self.sweep_or_reset(&sweep)
    }

    fn check_actuator_interlocks(&mut self) -> Result<(), SsmError> {
        if !self.is_in_test_mode()? {
            return Err(SsmError::Interlock("control unit is not in test mode"));
        }
        if self.is_engine_running()? {
            return Err(SsmError::Interlock("engine is running"));
        }
        Ok(())
    }

    fn sweep_or_reset(&mut self, addresses: &[u32]) -> Result<(), SsmError> {
        match sweep_off(&mut self.transport, addresses) {
            Ok(()) => Ok(()),
            Err((address, error)) => {
                warn!(
                    address = format!("0x{:06X}", address),
                    "Failed to switch actuator off"
                );
                self.observer
                    .on_event(&SsmEvent::SafetySweepFailed { address });
                Err(self.comm_failure(error))
            }
        }
    }

    /// Read the raw value of one adjustment.
    pub fn adjustment_value(&mut self, index: usize) -> Result<u32, SsmError> {
        let addresses = {
            let cu = self.ready("read adjustment")?;
            cu.definitions()
                .adjustments
                .get(index)
                .ok_or_else(|| SsmError::InvalidArgument(format!("unknown adjustment {}", index)))?
                .addresses()
        };
        let bytes = self.read(&addresses)?;
        Ok(decode_adjustment(&bytes))
    }

    /// Read the raw values of all adjustments with one request.
    pub fn all_adjustment_values(&mut self) -> Result<Vec<u32>, SsmError> {
        let layout: Vec<Vec<u32>> = {
            let cu = self.ready("read adjustments")?;
            cu.definitions()
                .adjustments
                .iter()
                .map(|adj| adj.addresses())
                .collect()
        };
        if layout.is_empty() {
            return Ok(Vec::new());
        }
        let addresses: Vec<u32> = layout.iter().flatten().copied().collect();
        let bytes = self.read(&addresses)?;
        let mut offset = 0;
        Ok(layout
            .iter()
            .map(|addrs| {
                let value = decode_adjustment(&bytes[offset..offset + addrs.len()]);
                offset += addrs.len();
                value
            })
            .collect())
    }

    /// Write the raw value of one adjustment, high byte first.
    ///
    /// Out-of-range values are rejected without any write.
    #[instrument(skip(self))]
    pub fn set_adjustment_value(&mut self, index: usize, raw: u32) -> Result<(), SsmError> {
        let (address_low, address_high, low, high) = {
            let cu = self.ready("write adjustment")?;
            let adj = cu.definitions().adjustments.get(index).ok_or_else(|| {
                SsmError::InvalidArgument(format!("unknown adjustment {}", index))
            })?;
            // TODO: confirm the wrap-around rule (min > max) against real control units.
            if !AdjustmentRange::new(adj.raw_min, adj.raw_max).accepts(raw) {
                return Err(SsmError::InvalidArgument(format!(
                    "value {} outside {}..={} of adjustment {}",
                    raw, adj.raw_min, adj.raw_max, index
                )));
            }
            let (low, high) = encode_adjustment(raw, adj.is_two_bytes()).ok_or_else(|| {
                SsmError::InvalidArgument(format!(
                    "value {} too wide for adjustment {}",
                    raw, index
                ))
            })?;
            (adj.address_low, adj.address_high, low, high)
        };
        if let (Some(address), Some(value)) = (address_high, high) {
            self.write(address, value)?;
        }
        self.write(address_low, low)?;
        info!(index, raw, "Adjustment written");
        Ok(())
    }
}
