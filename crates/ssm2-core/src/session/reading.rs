//! Diagnostic-code and live-data polling.

use std::time::Duration;

use tracing::{debug, instrument};

use super::Ssm2Session;
use crate::error::SsmError;
use crate::events::{SsmEvent, SsmObserver};
use crate::protocol::DcGroups;
use crate::query::{DcReadPlan, DcReadout, MbSwReadPlan, MbSwSelector};
use crate::state::{Activity, Phase, SessionState};
use crate::transport::{LinkEvent, Ssm2Transport, TransportError};

impl<T: Ssm2Transport, O: SsmObserver> Ssm2Session<T, O> {
    /// Start polling the selected diagnostic-code groups.
    #[instrument(skip(self))]
    pub fn start_dc_reading(&mut self, groups: DcGroups) -> Result<(), SsmError> {
        let plan = {
            let cu = self.ready("start diagnostic-code reading")?;
            DcReadPlan::build(groups, cu.cu_type(), cu.capabilities(), cu.definitions())?
        };
        let operation = self
            .transport
            .start_repeating_read(plan.addresses())
            .map_err(|e| self.comm_failure(e))?;
        self.set_activity(Activity::ReadingDiagnosticCodes { operation, plan });
        self.observer
            .on_event(&SsmEvent::DiagnosticCodeReadingStarted { groups });
        Ok(())
    }

    /// Stop diagnostic-code polling. Succeeds without I/O if nothing runs.
    #[instrument(skip(self))]
    pub fn stop_dc_reading(&mut self) -> Result<(), SsmError> {
        if self.stop_polling(SessionState::ReadingDiagnosticCodes, "stop diagnostic-code reading")? {
            self.observer
                .on_event(&SsmEvent::DiagnosticCodeReadingStopped);
        }
        Ok(())
    }

    /// Start polling measuring blocks and switches, reported in selector order.
    #[instrument(skip(self, selectors), fields(selectors = selectors.len()))]
    pub fn start_live_data_reading(&mut self, selectors: &[MbSwSelector]) -> Result<(), SsmError> {
        let plan = {
            let cu = self.ready("start live-data reading")?;
            MbSwReadPlan::build(selectors, cu.definitions())?
        };
        let operation = self
            .transport
            .start_repeating_read(plan.addresses())
            .map_err(|e| self.comm_failure(e))?;
        self.set_activity(Activity::ReadingLiveData { operation, plan });
        self.observer.on_event(&SsmEvent::LiveDataReadingStarted {
            selectors: selectors.len(),
        });
        Ok(())
    }

    /// Stop live-data polling. Succeeds without I/O if nothing runs.
    #[instrument(skip(self))]
    pub fn stop_live_data_reading(&mut self) -> Result<(), SsmError> {
        if self.stop_polling(SessionState::ReadingLiveData, "stop live-data reading")? {
            self.observer.on_event(&SsmEvent::LiveDataReadingStopped);
        }
        Ok(())
    }

    /// Halt the repeating read of `polling` and return to `Normal`.
    ///
    /// Returns `false` if there was nothing to stop. Another polling state
    /// is an error.
    fn stop_polling(
        &mut self,
        polling: SessionState,
        operation: &'static str,
    ) -> Result<bool, SsmError> {
        let state = self.state();
        if matches!(state, SessionState::NeedsSetup | SessionState::Normal) {
            return Ok(false);
        }
        if state != polling {
            return Err(SsmError::InvalidState { state, operation });
        }
        let stopped = match self.phase.operation() {
            Some(op) => self.transport.stop(op),
            None => Ok(()),
        };
        if let Err(e) = stopped {
            return Err(self.comm_failure(e));
        }
        self.set_activity(Activity::Idle);
        Ok(true)
    }

    /// Handle all deliveries already queued by the running read.
    ///
    /// Returns the number of deliveries handled.
    pub fn process_events(&mut self) -> Result<usize, SsmError> {
        let mut handled = 0;
        while let Some(event) = self.phase.operation().and_then(|op| op.try_next()) {
            self.handle_link_event(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Wait up to `timeout` for a delivery, then handle everything queued.
    pub fn wait_for_events(&mut self, timeout: Duration) -> Result<usize, SsmError> {
        let first = match self.phase.operation() {
            Some(op) => op.next_timeout(timeout),
            None => return Ok(0),
        };
        match first {
            Some(event) => {
                self.handle_link_event(event)?;
                Ok(1 + self.process_events()?)
            }
            None => Ok(0),
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) -> Result<(), SsmError> {
        let (bytes, elapsed) = match event {
            LinkEvent::Data { bytes, elapsed } => (bytes, elapsed),
            LinkEvent::CommError => return Err(self.comm_failure(TransportError::LinkLost)),
        };
        let decoded: Result<Vec<SsmEvent>, TransportError> = match &self.phase {
            Phase::Ready {
                cu,
                activity: Activity::ReadingDiagnosticCodes { plan, .. },
            } => plan
                .decode(cu.definitions(), &bytes)
                .map(|readout| readout_events(readout, elapsed)),
            Phase::Ready {
                activity: Activity::ReadingLiveData { plan, .. },
                ..
            } => plan
                .decode(&bytes)
                .map(|values| vec![SsmEvent::LiveData { values, elapsed }]),
            // Write refreshes and ignition polls carry nothing to decode.
            _ => Ok(Vec::new()),
        };
        match decoded {
            Ok(events) => {
                for event in &events {
                    self.observer.on_event(event);
                }
                Ok(())
            }
            Err(e) => Err(self.comm_failure(e)),
        }
    }
}

fn readout_events(readout: DcReadout, elapsed: Duration) -> Vec<SsmEvent> {
    debug!(
        groups = readout.groups.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Decoded diagnostic codes"
    );
    let status = readout.status;
    readout
        .groups
        .into_iter()
        .map(|group| SsmEvent::DiagnosticCodes {
            status: if group.group.intersects(DcGroups::CURRENT_FAMILY) {
                status
            } else {
                None
            },
            group: group.group,
            codes: group.codes,
            elapsed,
        })
        .collect()
}
