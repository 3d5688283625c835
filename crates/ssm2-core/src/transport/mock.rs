//! Mock SSM2 transport for testing.
//!
//! Simulates a control unit as a byte memory map. Clones share state, so a
//! test can keep one clone for scripting while the session owns another.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::traits::{
    LinkEvent, OperationKind, Protocol, RepeatingOperation, Ssm2Transport, TransportError,
};
use crate::definitions::CuIdentity;

/// Repeating operation as requested by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedOperation {
    pub kind: OperationKind,
    pub addresses: Vec<u32>,
    pub value: Option<u8>,
    pub interval: Option<Duration>,
}

#[derive(Debug)]
struct MockState {
    protocol: Protocol,
    identities: HashMap<u32, CuIdentity>,
    target: Option<u32>,
    memory: HashMap<u32, u8>,
    /// Values returned by successive reads before falling back to memory.
    read_script: HashMap<u32, VecDeque<u8>>,
    failing_reads: HashSet<u32>,
    failing_writes: HashSet<u32>,
    write_echo: HashMap<u32, u8>,
    fail_stop: bool,
    fail_repeating: bool,
    link_up: bool,
    identify_log: Vec<u32>,
    read_log: Vec<Vec<u32>>,
    write_log: Vec<(u32, u8)>,
    retry_log: Vec<u8>,
    started: Vec<StartedOperation>,
    active: Option<(u64, Sender<LinkEvent>)>,
    next_id: u64,
    stop_count: usize,
}

/// Mock transport for unit testing session logic.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                protocol,
                identities: HashMap::new(),
                target: None,
                memory: HashMap::new(),
                read_script: HashMap::new(),
                failing_reads: HashSet::new(),
                failing_writes: HashSet::new(),
                write_echo: HashMap::new(),
                fail_stop: false,
                fail_repeating: false,
                link_up: true,
                identify_log: Vec::new(),
                read_log: Vec::new(),
                write_log: Vec::new(),
                retry_log: Vec::new(),
                started: Vec::new(),
                active: None,
                next_id: 1,
                stop_count: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Answer identity queries at `cu_address`.
    pub fn add_identity(&self, cu_address: u32, identity: CuIdentity) {
        self.lock().identities.insert(cu_address, identity);
    }

    /// Set a byte of the simulated memory.
    pub fn set_byte(&self, address: u32, value: u8) {
        self.lock().memory.insert(address, value);
    }

    pub fn byte(&self, address: u32) -> Option<u8> {
        self.lock().memory.get(&address).copied()
    }

    /// Return `values` on successive reads of `address`, then fall back to memory.
    pub fn script_reads(&self, address: u32, values: &[u8]) {
        self.lock()
            .read_script
            .entry(address)
            .or_default()
            .extend(values.iter().copied());
    }

    /// Make any read including `address` fail.
    pub fn fail_reads_at(&self, address: u32) {
        self.lock().failing_reads.insert(address);
    }

    pub fn fail_writes_at(&self, address: u32) {
        self.lock().failing_writes.insert(address);
    }

    /// Report `echo` as the written value for writes to `address`.
    pub fn set_write_echo(&self, address: u32, echo: u8) {
        self.lock().write_echo.insert(address, echo);
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.lock().fail_stop = fail;
    }

    pub fn set_fail_repeating(&self, fail: bool) {
        self.lock().fail_repeating = fail;
    }

    /// Deliver one cycle of data to the active repeating operation.
    pub fn deliver(&self, bytes: &[u8], elapsed: Duration) -> bool {
        let state = self.lock();
        match &state.active {
            Some((_, tx)) => tx
                .send(LinkEvent::Data {
                    bytes: bytes.to_vec(),
                    elapsed,
                })
                .is_ok(),
            None => false,
        }
    }

    /// Simulate the link dropping (e.g. ignition switched off).
    pub fn drop_link(&self) {
        let mut state = self.lock();
        state.link_up = false;
        if let Some((_, tx)) = &state.active {
            let _ = tx.send(LinkEvent::CommError);
        }
    }

    pub fn restore_link(&self) {
        self.lock().link_up = true;
    }

    pub fn identify_attempts(&self) -> Vec<u32> {
        self.lock().identify_log.clone()
    }

    /// Address lists of all single-shot reads.
    pub fn reads(&self) -> Vec<Vec<u32>> {
        self.lock().read_log.clone()
    }

    pub fn writes(&self) -> Vec<(u32, u8)> {
        self.lock().write_log.clone()
    }

    pub fn clear_logs(&self) {
        let mut state = self.lock();
        state.read_log.clear();
        state.write_log.clear();
        state.started.clear();
    }

    pub fn retry_counts(&self) -> Vec<u8> {
        self.lock().retry_log.clone()
    }

    pub fn started_operations(&self) -> Vec<StartedOperation> {
        self.lock().started.clone()
    }

    pub fn has_active_operation(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn stop_count(&self) -> usize {
        self.lock().stop_count
    }

    fn start(&self, operation: StartedOperation) -> Result<RepeatingOperation, TransportError> {
        let mut state = self.lock();
        if !state.link_up || state.fail_repeating {
            return Err(TransportError::LinkLost);
        }
        let (tx, rx) = mpsc::channel();
        let id = state.next_id;
        state.next_id += 1;
        let kind = operation.kind;
        state.started.push(operation);
        state.active = Some((id, tx));
        Ok(RepeatingOperation::new(id, kind, rx))
    }
}

impl Ssm2Transport for MockTransport {
    fn protocol(&self) -> Protocol {
        self.lock().protocol
    }

    fn identify(&mut self, cu_address: u32) -> Result<CuIdentity, TransportError> {
        let mut state = self.lock();
        state.identify_log.push(cu_address);
        if !state.link_up {
            return Err(TransportError::LinkLost);
        }
        match state.identities.get(&cu_address).cloned() {
            Some(identity) => {
                state.target = Some(cu_address);
                Ok(identity)
            }
            None => Err(TransportError::NoResponse {
                address: cu_address,
            }),
        }
    }

    fn read_bytes(&mut self, addresses: &[u32]) -> Result<Vec<u8>, TransportError> {
        let mut state = self.lock();
        state.read_log.push(addresses.to_vec());
        if !state.link_up {
            return Err(TransportError::LinkLost);
        }
        if addresses.iter().any(|a| state.failing_reads.contains(a)) {
            return Err(TransportError::NoResponse {
                address: state.target.unwrap_or_default(),
            });
        }
        let mut data = Vec::with_capacity(addresses.len());
        for address in addresses {
            let scripted = state
                .read_script
                .get_mut(address)
                .and_then(|queue| queue.pop_front());
            let value = scripted.unwrap_or_else(|| state.memory.get(address).copied().unwrap_or(0));
            data.push(value);
        }
        Ok(data)
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<u8, TransportError> {
        let mut state = self.lock();
        if !state.link_up {
            return Err(TransportError::LinkLost);
        }
        if state.failing_writes.contains(&address) {
            return Err(TransportError::WriteFailed { address });
        }
        state.write_log.push((address, value));
        state.memory.insert(address, value);
        Ok(state.write_echo.get(&address).copied().unwrap_or(value))
    }

    fn start_repeating_read(
        &mut self,
        addresses: &[u32],
    ) -> Result<RepeatingOperation, TransportError> {
        self.start(StartedOperation {
            kind: OperationKind::Read,
            addresses: addresses.to_vec(),
            value: None,
            interval: None,
        })
    }

    fn start_repeating_write(
        &mut self,
        address: u32,
        value: u8,
        interval: Duration,
    ) -> Result<RepeatingOperation, TransportError> {
        self.start(StartedOperation {
            kind: OperationKind::Write,
            addresses: vec![address],
            value: Some(value),
            interval: Some(interval),
        })
    }

    fn stop(&mut self, operation: &RepeatingOperation) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.stop_count += 1;
        if state.fail_stop {
            return Err(TransportError::StopFailed("mock stop failure".into()));
        }
        if state
            .active
            .as_ref()
            .is_some_and(|(id, _)| *id == operation.id())
        {
            state.active = None;
        }
        Ok(())
    }

    fn set_retry_count(&mut self, retries: u8) {
        self.lock().retry_log.push(retries);
    }
}
