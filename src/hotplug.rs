// SPDX-License-Identifier: MIT OR Apache-2.0
//! Contracts consumed from the platform hotplug layer.
//!
//! Raw USB/HID/serial enumeration is out of scope for this crate; everything in this module is a
//! trait the host application implements against its own platform backend (nusb, rusb, libusb,
//! WinUSB, IOKit, ...). The monitor only ever calls through these contracts.

use std::sync::Arc;

use crate::error::Error;

/// The physical transport class of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType
{
    Serial,
    Hid,
}

/// Hotplug transition reported for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus
{
    Online,
    Disconnected,
}

/// An opaque, stable handle to one attached device, as seen by the platform hotplug backend.
///
/// Identity for aggregation purposes is the pointer identity of the `Arc` wrapping this trait
/// object, not any field of the descriptor itself (see [`crate::aggregator`]).
pub trait DeviceDescriptor: Send + Sync
{
    /// Stable location string (e.g. a USB topology path). Two interfaces with the same location
    /// are considered part of the same physical board.
    fn location(&self) -> &str;

    fn vid(&self) -> u16;
    fn pid(&self) -> u16;
    fn device_type(&self) -> DeviceType;

    fn serial_number_string(&self) -> Option<&str>;
    fn product_string(&self) -> Option<&str>;

    /// Only meaningful when `device_type() == Hid`.
    fn hid_usage_page(&self) -> Option<u16>;
    /// Only meaningful when `device_type() == Hid`.
    fn hid_usage(&self) -> Option<u16>;
}

/// Callback invoked once per reported device during [`HotplugSource::list`] or
/// [`HotplugSource::refresh`].
///
/// Mirrors the event dispatcher's three-way contract is not used here: this callback instead
/// returns a plain `Result`, and a negative/error result aborts the enumeration just like the
/// source's `device_callback` stashing `callback_ret` for propagation.
pub type DeviceCallback<'a> = dyn FnMut(Arc<dyn DeviceDescriptor>, DeviceStatus) -> Result<(), Error> + 'a;

/// Platform hotplug backend contract.
pub trait HotplugSource: Send
{
    fn start(&mut self) -> Result<(), Error>;

    /// Synchronous enumeration of already-present devices, replayed as `Online` notifications.
    fn list(&mut self, cb: &mut DeviceCallback<'_>) -> Result<(), Error>;

    /// Drains pending hotplug notifications since the last call.
    fn refresh(&mut self, cb: &mut DeviceCallback<'_>) -> Result<(), Error>;

    /// A platform-specific pollable handle for this source, tagged with `id`.
    fn descriptor(&self, id: i32) -> crate::platform::Descriptor;
}
