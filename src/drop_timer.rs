// SPDX-License-Identifier: MIT OR Apache-2.0
//! Delayed finalization of disappeared boards.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::board::Board;

/// Default grace period between a board's last interface disappearing and it being finalized
/// (`DROPPED`). The source also shows a historical 3000 ms variant; callers that need it can set
/// [`crate::monitor::MonitorConfig::drop_delay`] explicitly.
pub const DEFAULT_DROP_DELAY_MS: u64 = 15_000;

/// `max(0, start + timeout_ms - now)` for `timeout_ms >= 0`; `-1` ("infinite") propagates as-is.
pub fn adjust_timeout(timeout_ms: i64, start: Instant) -> i64
{
    if timeout_ms < 0 {
        return -1;
    }
    let elapsed = start.elapsed().as_millis() as i64;
    (timeout_ms - elapsed).max(0)
}

/// Boards awaiting finalization, ordered by `missing_since` ascending (the "drop queue").
#[derive(Default)]
pub struct DropQueue
{
    boards: Mutex<VecDeque<Arc<Board>>>,
}

impl DropQueue
{
    pub fn new() -> Self
    {
        Self { boards: Mutex::new(VecDeque::new()) }
    }

    /// Enqueues `board`, or moves it to the tail if already present (mirrors the source's
    /// re-link-to-tail behavior when a board goes missing again after reappearing).
    pub fn push(&self, board: Arc<Board>)
    {
        let mut boards = self.boards.lock().unwrap();
        boards.retain(|b| !Arc::ptr_eq(b, &board));
        boards.push_back(board);
    }

    /// Removes `board` if present (e.g. it reappeared before its grace period elapsed).
    pub fn remove(&self, board: &Arc<Board>)
    {
        let mut boards = self.boards.lock().unwrap();
        boards.retain(|b| !Arc::ptr_eq(b, board));
    }

    /// Pops and returns every board whose grace period has elapsed, calling `on_expired` for
    /// each in queue order. Returns the deadline (in ms from now) to rearm the timer for, or
    /// `None` if the queue is now empty.
    pub fn process_expired(&self, drop_delay_ms: u64, mut on_expired: impl FnMut(Arc<Board>)) -> Option<i64>
    {
        loop {
            let head = { self.boards.lock().unwrap().front().cloned() };
            let Some(board) = head else { return None };

            let missing_since = board.missing_since().expect("queued board has a missing_since");
            let remaining = adjust_timeout(drop_delay_ms as i64, missing_since);
            if remaining > 0 {
                return Some(remaining);
            }

            self.boards.lock().unwrap().pop_front();
            on_expired(board);
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn adjust_timeout_caps_at_zero_once_elapsed()
    {
        let start = Instant::now();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(adjust_timeout(0, start), 0);
    }

    #[test]
    fn adjust_timeout_negative_is_infinite()
    {
        assert_eq!(adjust_timeout(-1, Instant::now()), -1);
    }

    #[test]
    fn adjust_timeout_counts_down()
    {
        let start = Instant::now();
        let remaining = adjust_timeout(10_000, start);
        assert!(remaining > 9_000 && remaining <= 10_000);
    }
}
