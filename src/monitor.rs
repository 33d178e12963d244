// SPDX-License-Identifier: MIT OR Apache-2.0
//! Top-level entry point: wires the hotplug backend, the aggregator, and the event dispatcher
//! into the refresh/wait loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::aggregator::Aggregator;
use crate::board::{Board, State};
use crate::capabilities::Capability;
use crate::dispatcher::{self, Dispatcher, Event};
use crate::drop_timer::{self, DEFAULT_DROP_DELAY_MS};
use crate::error::{Error, ErrorKind};
use crate::hotplug::{DeviceDescriptor, DeviceStatus, HotplugSource};
use crate::platform::{Descriptor, DescriptorSet, Poller, TimerSource};

/// Tuning knobs for a [`Monitor`].
///
/// `drop_delay_ms` is the grace period a board is kept around as `MISSING` after its last
/// interface disappears, before it is finalized `DROPPED`. The source also ships a historical
/// 3000 ms variant behind a build flag; expose it the same way here if a caller ever needs it:
/// `MonitorConfig::default().drop_delay(3_000)`.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig
{
    drop_delay_ms: u64,
    parallel_wait: bool,
}

impl Default for MonitorConfig
{
    fn default() -> Self
    {
        Self { drop_delay_ms: DEFAULT_DROP_DELAY_MS, parallel_wait: false }
    }
}

impl MonitorConfig
{
    #[must_use]
    pub fn drop_delay(mut self, ms: u64) -> Self
    {
        self.drop_delay_ms = ms;
        self
    }

    /// Selects the wait loop's concurrency model: `false` (default) is "serial" — `wait()` drives
    /// its own refresh/poll cycle on the caller's thread. `true` is "parallel" — `wait()` instead
    /// blocks on a condition variable that some other, caller-owned thread signals by calling
    /// [`Monitor::refresh`] in a loop.
    #[must_use]
    pub fn parallel_wait(mut self, enable: bool) -> Self
    {
        self.parallel_wait = enable;
        self
    }
}

pub struct Monitor
{
    aggregator: Aggregator,
    dispatcher: Dispatcher,
    hotplug: Mutex<Box<dyn HotplugSource>>,
    timer: Mutex<Box<dyn TimerSource>>,
    poller: Option<Arc<dyn Poller>>,
    config: MonitorConfig,
    enumerated: AtomicBool,

    /// Serializes calls to [`Monitor::refresh`] itself (the aggregator's own state is already
    /// single-writer from the aggregator's perspective, but the hotplug backend and timer are not
    /// safe to drive from two threads at once).
    refresh_lock: Mutex<()>,

    /// Paired with `refresh_cond` for parallel-mode waiters; holds no state of its own.
    wait_lock: Mutex<()>,
    refresh_cond: Condvar,
}

impl Monitor
{
    pub fn new(
        mut hotplug: Box<dyn HotplugSource>,
        timer: Box<dyn TimerSource>,
        poller: Option<Arc<dyn Poller>>,
        config: MonitorConfig,
    ) -> Result<Arc<Self>, Error>
    {
        hotplug.start()?;

        Ok(Arc::new(Self {
            aggregator: Aggregator::new(),
            dispatcher: Dispatcher::new(),
            hotplug: Mutex::new(hotplug),
            timer: Mutex::new(timer),
            poller,
            config,
            enumerated: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
            wait_lock: Mutex::new(()),
            refresh_cond: Condvar::new(),
        }))
    }

    pub fn boards(&self) -> Vec<Arc<Board>>
    {
        self.aggregator.boards()
    }

    pub fn register_callback(&self, callback: Box<dispatcher::Callback>) -> u64
    {
        self.dispatcher.register(callback)
    }

    pub fn deregister_callback(&self, id: u64)
    {
        self.dispatcher.deregister(id)
    }

    /// Replays an `Added` notification for every currently `ONLINE` board, in aggregator order.
    pub fn list(&self, mut cb: impl FnMut(&Arc<Board>) -> Result<(), Error>) -> Result<(), Error>
    {
        for board in self.aggregator.boards() {
            if board.state() == State::Online {
                cb(&board)?;
            }
        }
        Ok(())
    }

    /// Drains pending hotplug notifications (or, on the very first call, enumerates devices
    /// already present) and finalizes any board whose grace period has elapsed.
    ///
    /// A subscriber callback aborting dispatch takes precedence over any error the hotplug
    /// backend itself reports for the same refresh cycle, mirroring the source's `callback_ret`.
    pub fn refresh(&self) -> Result<(), Error>
    {
        let _guard = self.refresh_lock.lock().unwrap();

        if self.timer.lock().unwrap().rearm() {
            if let Some(remaining) = self.aggregator.process_drop_queue(self.config.drop_delay_ms, &self.dispatcher) {
                self.timer.lock().unwrap().set(remaining)?;
            }
        }

        let stashed: Mutex<Option<Error>> = Mutex::new(None);
        let aggregator = &self.aggregator;
        let dispatcher = &self.dispatcher;

        let mut record_or_swallow = |descriptor: Arc<dyn DeviceDescriptor>, status: DeviceStatus| -> Result<(), Error> {
            let result = match status {
                DeviceStatus::Online => aggregator.add_interface(descriptor, dispatcher),
                DeviceStatus::Disconnected => aggregator.remove_interface(&descriptor, dispatcher),
            };
            if let Err(err) = result {
                let mut slot = stashed.lock().unwrap();
                if slot.is_none() {
                    *slot = Some(err);
                }
            }
            Ok(())
        };

        let backend_result = {
            let mut hotplug = self.hotplug.lock().unwrap();
            if self.enumerated.swap(true, Ordering::SeqCst) {
                hotplug.refresh(&mut record_or_swallow)
            } else {
                hotplug.list(&mut record_or_swallow)
            }
        };

        self.refresh_cond.notify_all();

        match stashed.into_inner().unwrap() {
            Some(err) => Err(err),
            None => backend_result,
        }
    }

    /// Blocks until `predicate` returns `Ok(true)`, `timeout_ms` elapses (returning `Ok(false)`),
    /// or `predicate`/the refresh cycle returns an error. `timeout_ms < 0` waits indefinitely.
    pub fn wait(&self, timeout_ms: i64, mut predicate: impl FnMut(&Self) -> Result<bool, Error>) -> Result<bool, Error>
    {
        let start = Instant::now();

        if self.config.parallel_wait {
            let mut guard = self.wait_lock.lock().unwrap();
            loop {
                if predicate(self)? {
                    return Ok(true);
                }

                let remaining = drop_timer::adjust_timeout(timeout_ms, start);
                if timeout_ms >= 0 && remaining == 0 {
                    return Ok(false);
                }

                let wait_for = if remaining < 0 { Duration::from_secs(3600) } else { Duration::from_millis(remaining as u64) };
                let (next_guard, timeout_result) = self.refresh_cond.wait_timeout(guard, wait_for).unwrap();
                guard = next_guard;

                if timeout_result.timed_out() && timeout_ms >= 0 && drop_timer::adjust_timeout(timeout_ms, start) == 0 {
                    return predicate(self);
                }
            }
        } else {
            loop {
                self.refresh()?;
                if predicate(self)? {
                    return Ok(true);
                }

                let remaining = drop_timer::adjust_timeout(timeout_ms, start);
                if timeout_ms >= 0 && remaining == 0 {
                    return Ok(false);
                }

                let poller = self
                    .poller
                    .as_ref()
                    .ok_or_else(|| ErrorKind::Unsupported.error().with_ctx("serial-mode wait requires a poller"))?;
                let mut set = DescriptorSet::default();
                set.add(self.hotplug.lock().unwrap().descriptor(0));
                set.add(self.timer.lock().unwrap().descriptor(1));
                poller.poll(&set, remaining)?;
            }
        }
    }

    /// Waits for `board` to gain `capability`, or reports `NotFound` as soon as it disappears for
    /// good. Mirrors `ty_board_wait_for`'s predicate in the source.
    pub fn wait_for_capability(&self, board: &Arc<Board>, capability: Capability, timeout_ms: i64) -> Result<bool, Error>
    {
        self.wait(timeout_ms, |_monitor| {
            if board.state() == State::Dropped {
                return Err(ErrorKind::NotFound.error().with_ctx("board has disappeared"));
            }
            Ok(board.has_capability(capability))
        })
    }

    pub fn get_descriptors(&self, base_id: i32) -> DescriptorSet
    {
        let mut set = DescriptorSet::default();
        set.add(self.hotplug.lock().unwrap().descriptor(base_id));
        set.add(self.timer.lock().unwrap().descriptor(base_id + 1));
        set
    }
}
