// SPDX-License-Identifier: MIT OR Apache-2.0
//! One USB endpoint of a board: serial CDC, RawHID, SEREMU, or HalfKay bootloader HID.

use std::sync::{Arc, Mutex, Weak};

use crate::board::Board;
use crate::capabilities::Capability;
use crate::hotplug::DeviceDescriptor;
use crate::model::Model;

/// Opaque identity for an interface's backing device, used as the aggregator's interface-index
/// key. Two `Arc`s around the same underlying descriptor compare equal; distinct devices (even at
/// the same location, across a reboot) never do.
pub type DeviceId = usize;

pub fn device_id(descriptor: &Arc<dyn DeviceDescriptor>) -> DeviceId
{
    Arc::as_ptr(descriptor) as *const () as usize
}

pub struct Interface
{
    descriptor: Arc<dyn DeviceDescriptor>,
    name: &'static str,
    model: &'static Model,
    serial: u64,
    capabilities: Capability,

    /// Weak back-reference: the board strongly owns its attached interfaces, so this must not be
    /// a cycle.
    board: Mutex<Weak<Board>>,

    /// Guards against two callers opening a raw transport handle for this interface at once.
    /// Actually opening a handle is out of scope; callers acquire this before doing so.
    open_lock: Mutex<()>,
}

impl Interface
{
    pub(crate) fn new(
        descriptor: Arc<dyn DeviceDescriptor>,
        name: &'static str,
        model: &'static Model,
        serial: u64,
        capabilities: Capability,
    ) -> Arc<Self>
    {
        Arc::new(Self {
            descriptor,
            name,
            model,
            serial,
            capabilities,
            board: Mutex::new(Weak::new()),
            open_lock: Mutex::new(()),
        })
    }

    pub fn descriptor(&self) -> &Arc<dyn DeviceDescriptor>
    {
        &self.descriptor
    }

    pub fn id(&self) -> DeviceId
    {
        device_id(&self.descriptor)
    }

    pub fn name(&self) -> &'static str
    {
        self.name
    }

    pub fn model(&self) -> &'static Model
    {
        self.model
    }

    pub fn serial(&self) -> u64
    {
        self.serial
    }

    pub fn capabilities(&self) -> Capability
    {
        self.capabilities
    }

    pub fn board(&self) -> Option<Arc<Board>>
    {
        self.board.lock().unwrap().upgrade()
    }

    pub(crate) fn set_board(&self, board: &Arc<Board>)
    {
        *self.board.lock().unwrap() = Arc::downgrade(board);
    }

    /// Acquires this interface's open lock for the duration of `f`, so at most one caller may
    /// hold an open transport handle on it at a time.
    pub fn with_open_lock<R>(&self, f: impl FnOnce() -> R) -> R
    {
        let _guard = self.open_lock.lock().unwrap();
        f()
    }
}

impl std::fmt::Debug for Interface
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("model", &self.model.name)
            .field("serial", &self.serial)
            .finish()
    }
}
