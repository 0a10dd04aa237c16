//! USB-serial transport

use super::Transport;
use crate::error::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Serial transport for the device's USB-serial port
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `path` as 8N1 without flow control
    ///
    /// `timeout` bounds a blocking read; the firmware runs at 250000 baud.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        log::debug!("Opened {} at {} baud", path, baud_rate);
        Ok(Self {
            name: path.to_string(),
            port,
        })
    }

    /// Names of every serial port the OS currently enumerates
    pub fn enumerate() -> Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        for port in &ports {
            match &port.port_type {
                SerialPortType::UsbPort(usb) => log::debug!(
                    "Found {} (USB {:04x}:{:04x} {})",
                    port.port_name,
                    usb.vid,
                    usb.pid,
                    usb.product.as_deref().unwrap_or("unknown")
                ),
                other => log::debug!("Found {} ({:?})", port.port_name, other),
            }
        }
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Transport for SerialTransport {
    /// Returns 0 when nothing arrived before the timeout
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => Ok(0),
            other => Ok(other?),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.port.flush()?)
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }
}
