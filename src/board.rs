// SPDX-License-Identifier: MIT OR Apache-2.0
//! The logical board: the union of all USB interfaces currently attached at one physical location.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::capabilities::{self, Capability};
use crate::error::{Error, ErrorKind};
use crate::firmware;
use crate::halfkay;
use crate::interface::Interface;
use crate::model::Model;
use crate::transport::{HidPort, SerialConfig, SerialPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State
{
    Online,
    Missing,
    Dropped,
}

/// Flags accepted by [`Board::upload`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadFlags
{
    /// Skip the firmware-signature compatibility check.
    pub nocheck: bool,
}

/// Progress callback invoked before and after each uploaded block. Returning `Err` aborts the
/// upload and is propagated to the caller.
pub type ProgressCallback<'a> = dyn FnMut(u64) -> Result<(), Error> + 'a;

pub(crate) struct Inner
{
    pub(crate) model: &'static Model,
    pub(crate) serial: u64,
    pub(crate) vid: u16,
    pub(crate) pid: u16,
    pub(crate) state: State,
    pub(crate) cap2iface: [Option<Arc<Interface>>; capabilities::COUNT],
    pub(crate) capabilities: Capability,
    pub(crate) interfaces: Vec<Arc<Interface>>,
    pub(crate) missing_since: Option<Instant>,
    pub(crate) description: String,
    pub(crate) tag: String,
}

pub struct Board
{
    id: String,
    location: String,
    pub(crate) inner: Mutex<Inner>,
}

impl Board
{
    pub(crate) fn new(location: String, model: &'static Model, serial: u64, vid: u16, pid: u16) -> Arc<Self>
    {
        let family = "Teensy";
        let id = format!("{}-{}", serial, family);
        let tag = id.clone();
        Arc::new(Self {
            id,
            location,
            inner: Mutex::new(Inner {
                model,
                serial,
                vid,
                pid,
                state: State::Missing,
                cap2iface: Default::default(),
                capabilities: Capability::none(),
                interfaces: Vec::new(),
                missing_since: None,
                description: String::from("Teensy"),
                tag,
            }),
        })
    }

    pub fn id(&self) -> &str
    {
        &self.id
    }

    pub fn location(&self) -> &str
    {
        &self.location
    }

    pub fn tag(&self) -> String
    {
        self.inner.lock().unwrap().tag.clone()
    }

    pub fn set_tag(&self, tag: impl Into<String>)
    {
        self.inner.lock().unwrap().tag = tag.into();
    }

    pub fn model(&self) -> &'static Model
    {
        self.inner.lock().unwrap().model
    }

    pub fn serial(&self) -> u64
    {
        self.inner.lock().unwrap().serial
    }

    pub fn vid_pid(&self) -> (u16, u16)
    {
        let inner = self.inner.lock().unwrap();
        (inner.vid, inner.pid)
    }

    pub fn state(&self) -> State
    {
        self.inner.lock().unwrap().state
    }

    pub fn description(&self) -> String
    {
        self.inner.lock().unwrap().description.clone()
    }

    pub fn capabilities(&self) -> Capability
    {
        self.inner.lock().unwrap().capabilities
    }

    pub fn has_capability(&self, cap: Capability) -> bool
    {
        self.inner.lock().unwrap().capabilities.contains(cap)
    }

    pub fn missing_since(&self) -> Option<Instant>
    {
        self.inner.lock().unwrap().missing_since
    }

    pub fn interfaces(&self) -> Vec<Arc<Interface>>
    {
        self.inner.lock().unwrap().interfaces.clone()
    }

    fn interface_for(&self, cap: Capability) -> Option<Arc<Interface>>
    {
        let idx = capabilities::index_of(cap);
        self.inner.lock().unwrap().cap2iface[idx].clone()
    }

    fn require_capability(&self, cap: Capability) -> Result<Arc<Interface>, Error>
    {
        self.interface_for(cap).ok_or_else(|| ErrorKind::Mode.error())
    }

    /// Uploads `firmware` via this board's HalfKay interface.
    pub fn upload(
        &self,
        hid: &dyn HidPort,
        firmware_image: &[u8],
        flags: UploadFlags,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> Result<(), Error>
    {
        let iface = self.require_capability(Capability::Upload)?;
        let model = iface.model();

        if firmware_image.len() > model.code_size {
            return Err(ErrorKind::Range.error().with_ctx(&format!("firmware is too big for {}", model.name)));
        }

        if !flags.nocheck {
            firmware::check_upload_compatibility(model, firmware_image)?;
        }

        halfkay::upload(hid, model, firmware_image, progress)
    }

    pub fn reset(&self, hid: &dyn HidPort) -> Result<(), Error>
    {
        let iface = self.require_capability(Capability::Reset)?;
        halfkay::reset(hid, iface.model())
    }

    pub fn reboot_serial(&self, serial: &dyn SerialPort) -> Result<(), Error>
    {
        self.require_capability(Capability::Reboot)?;
        halfkay::reboot_serial(serial)
    }

    pub fn reboot_hid(&self, hid: &dyn HidPort) -> Result<(), Error>
    {
        self.require_capability(Capability::Reboot)?;
        halfkay::reboot_hid(hid)
    }

    pub fn read_serial(&self, serial: &dyn SerialPort, buf: &mut [u8], timeout_ms: i64) -> Result<usize, Error>
    {
        self.require_capability(Capability::Serial)?;
        serial.read(buf, timeout_ms).map_err(|e| ErrorKind::Io.error_from(e))
    }

    pub fn write_serial(&self, serial: &dyn SerialPort, buf: &[u8]) -> Result<usize, Error>
    {
        self.require_capability(Capability::Serial)?;
        serial.write(buf).map_err(|e| ErrorKind::Io.error_from(e))
    }

    /// Changes the line rate on this board's serial interface, if it has one.
    pub fn set_serial_config(&self, serial: &dyn SerialPort, config: SerialConfig) -> Result<(), Error>
    {
        self.require_capability(Capability::Serial)?;
        serial.set_config(config).map_err(|e| ErrorKind::Io.error_from(e))
    }
}

// Mutators used only by the aggregator while it owns the add/remove-interface protocol. Kept as
// free functions rather than `pub(crate)` methods so `Board`'s public surface stays read-only.

pub(crate) fn set_state(board: &Arc<Board>, state: State)
{
    board.inner.lock().unwrap().state = state;
}

pub(crate) fn set_vid_pid(board: &Arc<Board>, vid: u16, pid: u16)
{
    let mut inner = board.inner.lock().unwrap();
    inner.vid = vid;
    inner.pid = pid;
}

pub(crate) fn set_model(board: &Arc<Board>, model: &'static Model)
{
    board.inner.lock().unwrap().model = model;
}

pub(crate) fn set_serial(board: &Arc<Board>, serial: u64)
{
    board.inner.lock().unwrap().serial = serial;
}

pub(crate) fn set_missing_since(board: &Arc<Board>, when: Instant)
{
    board.inner.lock().unwrap().missing_since = Some(when);
}

/// Adds `iface` to the board's interface set. Capability-to-interface ownership is first-writer-
/// wins: a capability already claimed by an earlier interface keeps its owner.
pub(crate) fn attach_interface(board: &Arc<Board>, iface: Arc<Interface>)
{
    let mut inner = board.inner.lock().unwrap();
    claim_capabilities(&mut inner, &iface);
    inner.interfaces.push(iface);
}

/// Removes `iface` from the board's interface set and rebuilds the capability map from the
/// interfaces that remain, in their current order (first-writer-wins re-applied from scratch).
pub(crate) fn detach_interface(board: &Arc<Board>, iface: &Arc<Interface>)
{
    let mut inner = board.inner.lock().unwrap();
    inner.interfaces.retain(|i| !Arc::ptr_eq(i, iface));

    inner.cap2iface = Default::default();
    inner.capabilities = Capability::none();
    let remaining = inner.interfaces.clone();
    for remaining_iface in remaining {
        claim_capabilities(&mut inner, &remaining_iface);
    }
}

/// Removes and returns every attached interface, clearing the board's capability map.
pub(crate) fn drain_interfaces(board: &Arc<Board>) -> Vec<Arc<Interface>>
{
    let mut inner = board.inner.lock().unwrap();
    inner.cap2iface = Default::default();
    inner.capabilities = Capability::none();
    std::mem::take(&mut inner.interfaces)
}

fn claim_capabilities(inner: &mut Inner, iface: &Arc<Interface>)
{
    for cap in capabilities::ALL {
        if !iface.capabilities().contains(cap) {
            continue;
        }
        let idx = capabilities::index_of(cap);
        if inner.cap2iface[idx].is_none() {
            inner.cap2iface[idx] = Some(Arc::clone(iface));
            inner.capabilities |= cap;
        }
    }
}
