//! In-memory register bus.
//!
//! Used for dry runs and tests. Clones share the same register map, so a test
//! can keep a handle, move a clone into a worker, and still change register
//! contents or inject faults afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::TransportError;
use crate::transport::BusTransport;

/// Fault to return instead of register contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    NoResponse,
    Timeout,
    ConnectionReset,
    /// Reply with one word fewer than requested.
    ShortReply,
}

#[derive(Debug, Default)]
struct BusState {
    registers: HashMap<u16, u16>,
    faults: HashMap<u16, VecDeque<InjectedFault>>,
    offline: bool,
    reads: u64,
    reconnects: u64,
}

/// Shared register map implementing [`BusTransport`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn set_register(&self, address: u16, word: u16) {
        self.with_state(|s| {
            s.registers.insert(address, word);
        });
    }

    /// Store a 32-bit value across two registers, high word first.
    pub fn set_u32(&self, address: u16, value: u32) {
        self.with_state(|s| {
            s.registers.insert(address, (value >> 16) as u16);
            s.registers.insert(address.wrapping_add(1), value as u16);
        });
    }

    /// Queue `fault` for the next `times` reads starting at `address`.
    pub fn inject(&self, address: u16, fault: InjectedFault, times: usize) {
        self.with_state(|s| {
            let queue = s.faults.entry(address).or_default();
            queue.extend(std::iter::repeat_n(fault, times));
        });
    }

    /// While offline every read times out.
    pub fn set_offline(&self, offline: bool) {
        self.with_state(|s| s.offline = offline);
    }

    pub fn read_count(&self) -> u64 {
        self.with_state(|s| s.reads)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.with_state(|s| s.reconnects)
    }
}

impl BusTransport for MemoryBus {
    fn read_registers(&mut self, address: u16, word_count: u16) -> Result<Vec<u16>, TransportError> {
        self.with_state(|s| {
            s.reads += 1;
            if s.offline {
                return Err(TransportError::Timeout);
            }
            let fault = s.faults.get_mut(&address).and_then(VecDeque::pop_front);
            let count = match fault {
                Some(InjectedFault::NoResponse) => return Err(TransportError::NoResponse),
                Some(InjectedFault::Timeout) => return Err(TransportError::Timeout),
                Some(InjectedFault::ConnectionReset) => return Err(TransportError::ConnectionReset),
                Some(InjectedFault::ShortReply) => word_count.saturating_sub(1),
                None => word_count,
            };
            (0..count)
                .map(|i| {
                    let reg = address.wrapping_add(i);
                    s.registers
                        .get(&reg)
                        .copied()
                        .ok_or_else(|| TransportError::Protocol {
                            message: format!("illegal data address {reg}"),
                        })
                })
                .collect()
        })
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.with_state(|s| s.reconnects += 1);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory bus".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_words_high_first() {
        let mut bus = MemoryBus::new();
        bus.set_u32(1052, 0x0001_0002);
        assert_eq!(bus.read_registers(1052, 2).unwrap(), vec![0x0001, 0x0002]);
        assert_eq!(bus.read_count(), 1);
    }

    #[test]
    fn unknown_register_is_protocol_error() {
        let mut bus = MemoryBus::new();
        let err = bus.read_registers(7, 1).unwrap_err();
        assert!(matches!(err, TransportError::Protocol { .. }));
    }

    #[test]
    fn injected_faults_are_consumed_in_order() {
        let mut bus = MemoryBus::new();
        bus.set_register(10, 42);
        bus.inject(10, InjectedFault::Timeout, 1);
        bus.inject(10, InjectedFault::ShortReply, 1);

        assert!(matches!(bus.read_registers(10, 1), Err(TransportError::Timeout)));
        assert_eq!(bus.read_registers(10, 1).unwrap(), Vec::<u16>::new());
        assert_eq!(bus.read_registers(10, 1).unwrap(), vec![42]);
    }

    #[test]
    fn clones_share_state() {
        let bus = MemoryBus::new();
        let mut worker_side = bus.clone();
        bus.set_register(1, 5);
        assert_eq!(worker_side.read_registers(1, 1).unwrap(), vec![5]);
        worker_side.reconnect().unwrap();
        assert_eq!(bus.reconnect_count(), 1);
        bus.set_offline(true);
        assert!(worker_side.read_registers(1, 1).is_err());
    }
}
