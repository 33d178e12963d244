// SPDX-License-Identifier: MIT OR Apache-2.0
//! Contracts consumed from the platform HID/serial transport layer.
//!
//! Actually performing raw reads/writes/feature reports over USB is out of scope; this module
//! only defines the handle shape the HalfKay protocol engine and serial pass-through drive
//! against. The host application is responsible for opening the correct handle for whichever
//! interface it wants to operate on.

use thiserror::Error;

/// Error surfaced by a transport implementation, translated to [`crate::error::Error`] exactly
/// once at the call site that invoked it.
#[derive(Debug, Error)]
pub enum TransportError
{
    #[error("transient I/O error")]
    Io(#[from] std::io::Error),

    #[error("device disconnected")]
    Disconnected,

    #[error("access denied")]
    Access,
}

#[derive(Debug, Clone, Copy)]
pub struct SerialConfig
{
    pub baudrate: u32,
}

/// An already-open HID handle for one interface.
pub trait HidPort: Send + Sync
{
    fn write(&self, report: &[u8]) -> Result<usize, TransportError>;
    fn read(&self, buf: &mut [u8], timeout_ms: i64) -> Result<usize, TransportError>;
    fn send_feature_report(&self, report: &[u8]) -> Result<usize, TransportError>;
}

/// An already-open serial (CDC-ACM) handle for one interface.
pub trait SerialPort: Send + Sync
{
    fn read(&self, buf: &mut [u8], timeout_ms: i64) -> Result<usize, TransportError>;
    fn write(&self, buf: &[u8]) -> Result<usize, TransportError>;
    fn set_config(&self, config: SerialConfig) -> Result<(), TransportError>;
}
