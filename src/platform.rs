// SPDX-License-Identifier: MIT OR Apache-2.0
//! Platform descriptor/poll primitives consumed by the wait loop.
//!
//! The wait loop's serial mode needs to block on "something is ready" without busy-looping; on a
//! real platform that is a poll/select/epoll/WaitForMultipleObjects call over a handful of opaque
//! handles (device-change notifications, a timer). Constructing and interpreting those handles is
//! platform-specific and out of scope here: this module only defines the shape the monitor hands
//! to, and reads back from, the caller-supplied implementation.

use crate::error::Error;

/// An opaque platform handle (file descriptor, `HANDLE`, ...) tagged with a caller-chosen id so
/// the poll result can be attributed back to whichever source became ready.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor
{
    pub id: i32,
    pub handle: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorSet
{
    pub descriptors: Vec<Descriptor>,
}

impl DescriptorSet
{
    pub fn add(&mut self, descriptor: Descriptor)
    {
        self.descriptors.push(descriptor);
    }
}

/// Blocks until one of `set`'s descriptors is ready, `timeout_ms` elapses, or an error occurs.
///
/// Returns the number of ready descriptors (0 on timeout). `timeout_ms < 0` means "wait
/// indefinitely" (mirrors [`crate::drop_timer::adjust_timeout`]'s special value).
pub trait Poller: Send + Sync
{
    fn poll(&self, set: &DescriptorSet, timeout_ms: i64) -> Result<i32, Error>;
}

/// One-shot deadline timer consumed by the drop timer / refresh cycle.
///
/// `rearm` is edge-triggered: it returns `true` exactly once per fire, and `false` on every other
/// call (including when the timer was never armed).
pub trait TimerSource: Send
{
    fn set(&mut self, timeout_ms: i64) -> Result<(), Error>;
    fn rearm(&mut self) -> bool;
    fn descriptor(&self, id: i32) -> Descriptor;
}
