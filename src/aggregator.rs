// SPDX-License-Identifier: MIT OR Apache-2.0
//! Groups interfaces by physical location into boards and maintains their lifecycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::board::{self, Board, State};
use crate::capabilities::Capability;
use crate::classifier::{self, ClassifiedInterface};
use crate::dispatcher::{CallbackOutcome, Dispatcher, Event};
use crate::drop_timer::DropQueue;
use crate::error::Error;
use crate::hotplug::DeviceDescriptor;
use crate::interface::{self, DeviceId, Interface};

#[derive(Default)]
pub struct Aggregator
{
    boards: Mutex<Vec<Arc<Board>>>,
    interfaces: Mutex<HashMap<DeviceId, Arc<Interface>>>,
    drop_queue: DropQueue,
}

impl Aggregator
{
    pub fn new() -> Self
    {
        Self { boards: Mutex::new(Vec::new()), interfaces: Mutex::new(HashMap::new()), drop_queue: DropQueue::new() }
    }

    pub fn boards(&self) -> Vec<Arc<Board>>
    {
        self.boards.lock().unwrap().clone()
    }

    fn find_board_by_location(&self, location: &str) -> Option<Arc<Board>>
    {
        self.boards.lock().unwrap().iter().find(|b| b.location() == location).cloned()
    }

    /// Handles an `Online` hotplug notification. Returns `Ok(())` for devices that are not ours
    /// (classification failure is not an error — see §7 "swallowed at classification").
    pub fn add_interface(&self, descriptor: Arc<dyn DeviceDescriptor>, dispatcher: &Dispatcher) -> Result<(), Error>
    {
        let Some(classified) = classifier::classify(descriptor) else { return Ok(()) };

        let location = classified.descriptor.location().to_string();
        let existing = self.find_board_by_location(&location);

        let (board, event) = if let Some(board) = existing {
            if !is_compatible(&classified, &board) {
                // Out-of-order or dropped hotplug notifications: force the stale board out and
                // start fresh, as if it never existed.
                if board.state() == State::Online {
                    self.close_board(&board, dispatcher)?;
                }
                self.drop_board(&board, dispatcher)?;
                (self.create_board(&classified, &location), Event::Added)
            } else {
                // A board already exists at this location, online or still within its grace
                // period: either way this is an update, never a fresh arrival.
                self.update_board(&board, &classified, dispatcher)?;
                (board, Event::Changed)
            }
        } else {
            (self.create_board(&classified, &location), Event::Added)
        };

        self.attach(&board, &classified);

        {
            let mut boards = self.boards.lock().unwrap();
            if !boards.iter().any(|b| Arc::ptr_eq(b, &board)) {
                boards.push(Arc::clone(&board));
            }
        }
        self.drop_queue.remove(&board);
        board::set_state(&board, State::Online);

        dispatcher.dispatch(&board, event)
    }

    /// Handles a `Disconnected` hotplug notification.
    pub fn remove_interface(&self, descriptor: &Arc<dyn DeviceDescriptor>, dispatcher: &Dispatcher) -> Result<(), Error>
    {
        let id = interface::device_id(descriptor);
        let iface = { self.interfaces.lock().unwrap().remove(&id) };
        let Some(iface) = iface else { return Ok(()) };

        let Some(board) = iface.board() else { return Ok(()) };
        board::detach_interface(&board, &iface);

        if board.interfaces().is_empty() {
            self.close_board(&board, dispatcher)?;
            self.enqueue_missing(&board);
            Ok(())
        } else {
            dispatcher.dispatch(&board, Event::Changed)
        }
    }

    fn create_board(&self, classified: &ClassifiedInterface, location: &str) -> Arc<Board>
    {
        Board::new(location.to_string(), classified.model, classified.serial, classified.descriptor.vid(), classified.descriptor.pid())
    }

    fn update_board(&self, board: &Arc<Board>, classified: &ClassifiedInterface, dispatcher: &Dispatcher) -> Result<(), Error>
    {
        let (vid, pid) = board.vid_pid();
        if (vid, pid) != (classified.descriptor.vid(), classified.descriptor.pid()) {
            if board.state() == State::Online {
                self.close_board(board, dispatcher)?;
            }
            board::set_vid_pid(board, classified.descriptor.vid(), classified.descriptor.pid());
        }

        if classified.model.is_real() {
            board::set_model(board, classified.model);
        }
        if classified.serial != 0 {
            board::set_serial(board, classified.serial);
        }

        Ok(())
    }

    fn attach(&self, board: &Arc<Board>, classified: &ClassifiedInterface)
    {
        let iface = Interface::new(
            Arc::clone(&classified.descriptor),
            classified.name,
            classified.model,
            classified.serial,
            classified.capabilities,
        );
        iface.set_board(board);

        self.interfaces.lock().unwrap().insert(iface.id(), Arc::clone(&iface));
        board::attach_interface(board, iface);
    }

    /// Drains interfaces to a local list, clears the board's capability state, marks it MISSING
    /// and dispatches `Disappeared`. Idempotent: already-MISSING boards are a no-op.
    fn close_board(&self, board: &Arc<Board>, dispatcher: &Dispatcher) -> Result<(), Error>
    {
        if board.state() != State::Online {
            return Ok(());
        }

        let drained = board::drain_interfaces(board);
        board::set_state(board, State::Missing);

        {
            let mut interfaces = self.interfaces.lock().unwrap();
            for iface in &drained {
                interfaces.remove(&iface.id());
            }
        }

        dispatcher.dispatch(board, Event::Disappeared)
    }

    fn enqueue_missing(&self, board: &Arc<Board>)
    {
        board::set_missing_since(board, Instant::now());
        self.drop_queue.push(Arc::clone(board));
    }

    fn drop_board(&self, board: &Arc<Board>, dispatcher: &Dispatcher) -> Result<(), Error>
    {
        self.drop_queue.remove(board);
        board::set_state(board, State::Dropped);
        let result = dispatcher.dispatch(board, Event::Dropped);
        self.boards.lock().unwrap().retain(|b| !Arc::ptr_eq(b, board));
        result
    }

    /// Drains every board whose grace period has elapsed, dispatching `Dropped` for each.
    ///
    /// Mirrors the source's `ty_monitor_refresh` timer branch: a callback aborting a `Dropped`
    /// dispatch here does not propagate (the original's `drop_board` return value is discarded),
    /// so failures are logged rather than surfaced.
    pub fn process_drop_queue(&self, drop_delay_ms: u64, dispatcher: &Dispatcher) -> Option<i64>
    {
        self.drop_queue.process_expired(drop_delay_ms, |board| {
            if let Err(err) = self.drop_board(&board, dispatcher) {
                log::warn!("subscriber aborted drop notification for board {}: {err}", board.id());
            }
        })
    }
}

fn is_compatible(classified: &ClassifiedInterface, board: &Arc<Board>) -> bool
{
    let board_model = board.model();
    if board_model.is_real() && classified.model.is_real() && board_model != classified.model {
        return false;
    }

    let board_serial = board.serial();
    if board_serial != 0 && classified.serial != 0 && board_serial != classified.serial {
        return false;
    }

    true
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::hotplug::DeviceType;
    use std::sync::Mutex as StdMutex;

    struct FakeDescriptor
    {
        location: String,
        vid: u16,
        pid: u16,
        device_type: DeviceType,
        serial: Option<String>,
        product: Option<String>,
        usage_page: Option<u16>,
        usage: Option<u16>,
    }

    impl DeviceDescriptor for FakeDescriptor
    {
        fn location(&self) -> &str
        {
            &self.location
        }
        fn vid(&self) -> u16
        {
            self.vid
        }
        fn pid(&self) -> u16
        {
            self.pid
        }
        fn device_type(&self) -> DeviceType
        {
            self.device_type
        }
        fn serial_number_string(&self) -> Option<&str>
        {
            self.serial.as_deref()
        }
        fn product_string(&self) -> Option<&str>
        {
            self.product.as_deref()
        }
        fn hid_usage_page(&self) -> Option<u16>
        {
            self.usage_page
        }
        fn hid_usage(&self) -> Option<u16>
        {
            self.usage
        }
    }

    fn serial_device(loc: &str, serial: &str) -> Arc<dyn DeviceDescriptor>
    {
        Arc::new(FakeDescriptor {
            location: loc.to_string(),
            vid: 0x16C0,
            pid: 0x483,
            device_type: DeviceType::Serial,
            serial: Some(serial.to_string()),
            product: None,
            usage_page: None,
            usage: None,
        })
    }

    fn halfkay_device(loc: &str, usage: u16, serial: &str) -> Arc<dyn DeviceDescriptor>
    {
        Arc::new(FakeDescriptor {
            location: loc.to_string(),
            vid: 0x16C0,
            pid: 0x478,
            device_type: DeviceType::Hid,
            serial: Some(serial.to_string()),
            product: None,
            usage_page: Some(0xFF9C),
            usage: Some(usage),
        })
    }

    fn events_sink() -> (Dispatcher, Arc<StdMutex<Vec<Event>>>)
    {
        let dispatcher = Dispatcher::new();
        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        dispatcher.register(Box::new(move |_board, event| {
            sink.lock().unwrap().push(event);
            CallbackOutcome::Keep
        }));
        (dispatcher, events)
    }

    #[test]
    fn scenario_s1_serial_then_bootloader() -> Result<(), Error>
    {
        let aggregator = Aggregator::new();
        let (dispatcher, events) = events_sink();

        aggregator.add_interface(serial_device("usb1", "12345678"), &dispatcher)?;
        assert_eq!(events.lock().unwrap().as_slice(), &[Event::Added]);

        let board = aggregator.boards().into_iter().next().unwrap();
        assert_eq!(board.id(), "12345678-Teensy");
        assert!(board.has_capability(Capability::Run));
        assert!(board.has_capability(Capability::Serial));
        assert!(board.has_capability(Capability::Reboot));

        // 0x00BC614E == 12_345_678, which is >= 10_000_000 so the bootloader value is taken as-is.
        aggregator.add_interface(halfkay_device("usb1", 0x1D, "00BC614E"), &dispatcher)?;
        assert_eq!(events.lock().unwrap().as_slice(), &[Event::Added, Event::Changed]);
        assert_eq!(board.model().name, "Teensy 3.0");
        assert_eq!(board.serial(), 12345678);
        assert!(board.has_capability(Capability::Upload));
        assert!(board.has_capability(Capability::Reset));

        Ok(())
    }

    #[test]
    fn scenario_s2_reappears_within_grace_period() -> Result<(), Error>
    {
        let aggregator = Aggregator::new();
        let (dispatcher, events) = events_sink();

        aggregator.add_interface(serial_device("usb1", "1234567"), &dispatcher)?;
        let descriptor = serial_device("usb1", "1234567");
        aggregator.remove_interface(&descriptor_placeholder(&aggregator, "usb1"), &dispatcher)?;

        assert_eq!(events.lock().unwrap().as_slice(), &[Event::Added, Event::Disappeared]);

        aggregator.add_interface(descriptor, &dispatcher)?;
        assert_eq!(events.lock().unwrap().as_slice(), &[Event::Added, Event::Disappeared, Event::Changed]);

        let board = aggregator.boards().into_iter().next().unwrap();
        assert_eq!(board.state(), State::Online);

        Ok(())
    }

    #[test]
    fn scenario_s6_identity_conflict_drops_old_board() -> Result<(), Error>
    {
        let aggregator = Aggregator::new();
        let (dispatcher, events) = events_sink();

        aggregator.add_interface(halfkay_device("usb1", 0x1D, "00000064"), &dispatcher)?;
        let first = aggregator.boards().into_iter().next().unwrap();
        board::set_serial(&first, 100);

        aggregator.add_interface(halfkay_device("usb1", 0x1D, "000000C8"), &dispatcher)?;

        let logged = events.lock().unwrap().clone();
        assert_eq!(logged[0], Event::Added);
        assert_eq!(*logged.last().unwrap(), Event::Added);

        Ok(())
    }

    /// Recovers the live descriptor currently attached to the board at `location`, so tests can
    /// simulate a REMOVED notification for a device they only retain indirectly.
    fn descriptor_placeholder(aggregator: &Aggregator, location: &str) -> Arc<dyn DeviceDescriptor>
    {
        let board = aggregator.find_board_by_location(location).unwrap();
        Arc::clone(board.interfaces()[0].descriptor())
    }
}
