//! Register telemetry for the generator controller.
//!
//! This crate turns an externally defined list of measurements into a
//! continuously refreshed table of engineering-unit values:
//!
//! - [`descriptor`]: what to read (address, width, scaling, poll period)
//! - [`decoder`]: raw register words to engineering units
//! - [`scheduler`]: when each measurement is due
//! - [`table`]: the shared current-value table
//! - [`transport`] / [`modbus`] / [`memory`]: how words come off the bus
//! - [`source`]: the polling worker tying the above together
//!
//! Failures never produce numeric sentinels: a measurement that cannot be read
//! keeps its last good value and simply ages.

pub mod decoder;
pub mod descriptor;
pub mod error;
pub mod memory;
pub mod modbus;
pub mod scheduler;
pub mod signed;
pub mod snapshot;
pub mod source;
pub mod table;
pub mod transport;

pub use decoder::{decode, decode_response};
pub use descriptor::{
    DEFAULT_PERIOD_S, MeasurementDescriptor, RegisterWidth, load_descriptors, parse_descriptors,
};
pub use error::{DecodeFailure, DescriptorError, TelemetryError, TelemetryResult, TransportError};
pub use memory::{InjectedFault, MemoryBus};
pub use modbus::{Connector, ModbusTransport, RtuConnector, TcpConnector};
pub use scheduler::PollScheduler;
pub use signed::{SIGNED_ADDRESSES, is_signed_address};
pub use snapshot::{NO_DATA, Snapshot, SnapshotRow};
pub use source::{PollSummary, SourceConfig, TelemetrySource};
pub use table::{CurrentValueTable, EntryState, Freshness};
pub use transport::BusTransport;
