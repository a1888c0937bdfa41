//! Bus transport abstraction.

use crate::error::TransportError;

/// Request/response access to holding registers.
///
/// Implementations own their socket or serial port and bound every read with
/// a timeout. The telemetry source never manages the link itself; it only asks
/// for a reconnect after repeated failures.
pub trait BusTransport: Send {
    /// Read `word_count` consecutive registers starting at `address`.
    fn read_registers(&mut self, address: u16, word_count: u16) -> Result<Vec<u16>, TransportError>;

    /// Drop and reopen the underlying link.
    fn reconnect(&mut self) -> Result<(), TransportError>;

    /// Short description for log records.
    fn describe(&self) -> String {
        "bus".to_string()
    }
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn read_registers(&mut self, address: u16, word_count: u16) -> Result<Vec<u16>, TransportError> {
        (**self).read_registers(address, word_count)
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        (**self).reconnect()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
