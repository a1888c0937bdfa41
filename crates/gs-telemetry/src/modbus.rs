//! Modbus TCP and RTU transports built on `rmodbus` frame handling.
//!
//! `rmodbus` only builds and parses frames; the byte stream comes from a
//! [`Connector`], which opens a TCP socket or a serial port. The link is opened
//! lazily on first use and dropped after any failure so that the next read
//! starts from a clean connection.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use rmodbus::client::ModbusRequest;
use rmodbus::{ModbusProto, guess_response_frame_len};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::transport::BusTransport;

/// Byte stream a Modbus frame travels over.
pub trait Link: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Link for T {}

/// Opens links for a [`ModbusTransport`].
pub trait Connector: Send {
    fn connect(&self) -> Result<Box<dyn Link>, TransportError>;

    /// Framing used on this link.
    fn proto(&self) -> ModbusProto;

    fn describe(&self) -> String;
}

/// Modbus TCP connector.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> Result<Box<dyn Link>, TransportError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TransportError::Protocol {
                message: format!("could not resolve {}", self.host),
            })?;
        let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    fn proto(&self) -> ModbusProto {
        ModbusProto::TcpUdp
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// Modbus RTU connector over a serial device.
#[derive(Debug, Clone)]
pub struct RtuConnector {
    pub dev: String,
    pub baudrate: u32,
    pub timeout: Duration,
}

impl RtuConnector {
    pub fn new(dev: impl Into<String>, baudrate: u32, timeout: Duration) -> Self {
        Self {
            dev: dev.into(),
            baudrate,
            timeout,
        }
    }
}

impl Connector for RtuConnector {
    fn connect(&self) -> Result<Box<dyn Link>, TransportError> {
        let port = serialport::new(&self.dev, self.baudrate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::Io(kind) => TransportError::from(std::io::Error::new(kind, e.description)),
                _ => TransportError::Protocol {
                    message: format!("cannot open {}: {}", self.dev, e.description),
                },
            })?;
        Ok(Box::new(port))
    }

    fn proto(&self) -> ModbusProto {
        ModbusProto::Rtu
    }

    fn describe(&self) -> String {
        format!("rtu://{}@{}", self.dev, self.baudrate)
    }
}

/// Holding-register reader for one Modbus unit.
pub struct ModbusTransport<C: Connector> {
    connector: C,
    unit_id: u8,
    link: Option<Box<dyn Link>>,
}

impl<C: Connector> std::fmt::Debug for ModbusTransport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTransport")
            .field("link", &self.connector.describe())
            .field("unit_id", &self.unit_id)
            .field("connected", &self.link.is_some())
            .finish()
    }
}

impl<C: Connector> ModbusTransport<C> {
    /// Create a transport; the link is not opened until the first read.
    pub fn new(connector: C, unit_id: u8) -> Self {
        Self {
            connector,
            unit_id,
            link: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    fn header_len(&self) -> usize {
        match self.connector.proto() {
            // MBAP header plus unit id.
            ModbusProto::TcpUdp => 7,
            _ => 3,
        }
    }

    fn exchange(&mut self, address: u16, word_count: u16) -> Result<Vec<u16>, TransportError> {
        let proto = self.connector.proto();
        let header_len = self.header_len();
        if self.link.is_none() {
            debug!(link = %self.connector.describe(), "opening link");
            self.link = Some(self.connector.connect()?);
        }
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;

        let mut request = ModbusRequest::new(self.unit_id, proto);
        let mut frame: Vec<u8> = Vec::new();
        request
            .generate_get_holdings(address, word_count, &mut frame)
            .map_err(protocol)?;
        link.write_all(&frame)?;
        link.flush()?;

        let mut response = vec![0u8; header_len];
        link.read_exact(&mut response)?;
        let total = guess_response_frame_len(&response, proto).map_err(protocol)? as usize;
        if total < header_len {
            return Err(TransportError::Protocol {
                message: format!("response frame length {total} shorter than header"),
            });
        }
        response.resize(total, 0);
        link.read_exact(&mut response[header_len..])?;

        let mut words: Vec<u16> = Vec::new();
        request.parse_u16(&response, &mut words).map_err(protocol)?;
        if words.is_empty() {
            return Err(TransportError::NoResponse);
        }
        Ok(words)
    }
}

fn protocol(err: rmodbus::ErrorKind) -> TransportError {
    TransportError::Protocol {
        message: format!("{err:?}"),
    }
}

impl<C: Connector> BusTransport for ModbusTransport<C> {
    fn read_registers(&mut self, address: u16, word_count: u16) -> Result<Vec<u16>, TransportError> {
        let result = self.exchange(address, word_count);
        if result.is_err() {
            // A half-read frame leaves the stream out of sync.
            self.link = None;
        }
        result
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.link = None;
        info!(link = %self.connector.describe(), "reconnecting");
        self.link = Some(self.connector.connect()?);
        Ok(())
    }

    fn describe(&self) -> String {
        self.connector.describe()
    }
}
