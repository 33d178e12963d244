// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registration and fan-out of board state-change callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::board::Board;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event
{
    Added,
    Changed,
    Disappeared,
    Dropped,
}

/// The three-way return contract a subscriber's callback drives.
pub enum CallbackOutcome
{
    /// Keep the subscription; continue dispatching to the remaining subscribers.
    Keep,
    /// Drop this subscription after this call; continue dispatching.
    DropSubscription,
    /// Abort dispatch entirely and propagate `err` to the caller of the triggering action.
    Abort(Error),
}

pub type Callback = dyn FnMut(&Arc<Board>, Event) -> CallbackOutcome + Send;

struct Subscription
{
    id: u64,
    callback: Box<Callback>,
}

#[derive(Default)]
pub struct Dispatcher
{
    subscriptions: Mutex<Vec<Option<Subscription>>>,
    next_id: AtomicU64,
}

impl Dispatcher
{
    pub fn new() -> Self
    {
        Self { subscriptions: Mutex::new(Vec::new()), next_id: AtomicU64::new(0) }
    }

    pub fn register(&self, callback: Box<Callback>) -> u64
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.lock().unwrap().push(Some(Subscription { id, callback }));
        id
    }

    /// Idempotent: deregistering an id that is already gone (or was never registered) is a no-op.
    pub fn deregister(&self, id: u64)
    {
        let mut subs = self.subscriptions.lock().unwrap();
        if let Some(slot) = subs.iter_mut().find(|slot| slot.as_ref().is_some_and(|s| s.id == id)) {
            *slot = None;
        }
    }

    /// Dispatches `event` to every subscription present at the start of this call (a snapshot by
    /// length: subscriptions registered by a running callback are not visited this round).
    ///
    /// On [`CallbackOutcome::Abort`], the callback's own slot is restored (the three-way contract
    /// only auto-drops on `DropSubscription`) and dispatch stops immediately.
    pub fn dispatch(&self, board: &Arc<Board>, event: Event) -> Result<(), Error>
    {
        let len = self.subscriptions.lock().unwrap().len();

        for idx in 0..len {
            let taken = {
                let mut subs = self.subscriptions.lock().unwrap();
                subs.get_mut(idx).and_then(|slot| slot.take())
            };
            let Some(mut sub) = taken else { continue };

            match (sub.callback)(board, event) {
                CallbackOutcome::Keep => {
                    let mut subs = self.subscriptions.lock().unwrap();
                    if let Some(slot) = subs.get_mut(idx) {
                        *slot = Some(sub);
                    }
                },
                CallbackOutcome::DropSubscription => {},
                CallbackOutcome::Abort(err) => {
                    let mut subs = self.subscriptions.lock().unwrap();
                    if let Some(slot) = subs.get_mut(idx) {
                        *slot = Some(sub);
                    }
                    return Err(err);
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::model::UNKNOWN;
    use std::sync::atomic::AtomicUsize;

    fn fake_board() -> Arc<Board>
    {
        Board::new("loc".into(), &UNKNOWN, 0, 0, 0)
    }

    #[test]
    fn keep_runs_every_dispatch()
    {
        let dispatcher = Dispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        dispatcher.register(Box::new(move |_board, _event| {
            counted.fetch_add(1, Ordering::SeqCst);
            CallbackOutcome::Keep
        }));

        let board = fake_board();
        dispatcher.dispatch(&board, Event::Added).unwrap();
        dispatcher.dispatch(&board, Event::Changed).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn auto_drop_only_fires_once()
    {
        let dispatcher = Dispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        dispatcher.register(Box::new(move |_board, _event| {
            counted.fetch_add(1, Ordering::SeqCst);
            CallbackOutcome::DropSubscription
        }));

        let board = fake_board();
        dispatcher.dispatch(&board, Event::Added).unwrap();
        dispatcher.dispatch(&board, Event::Changed).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deregister_is_idempotent()
    {
        let dispatcher = Dispatcher::new();
        let id = dispatcher.register(Box::new(|_board, _event| CallbackOutcome::Keep));
        dispatcher.deregister(id);
        dispatcher.deregister(id);
    }

    #[test]
    fn abort_stops_dispatch_and_propagates()
    {
        let dispatcher = Dispatcher::new();
        let second_ran = Arc::new(AtomicUsize::new(0));
        let ran = Arc::clone(&second_ran);

        dispatcher.register(Box::new(|_board, _event| {
            CallbackOutcome::Abort(crate::error::ErrorKind::System.error())
        }));
        dispatcher.register(Box::new(move |_board, _event| {
            ran.fetch_add(1, Ordering::SeqCst);
            CallbackOutcome::Keep
        }));

        let board = fake_board();
        let result = dispatcher.dispatch(&board, Event::Added);

        assert!(result.is_err());
        assert_eq!(second_ran.load(Ordering::SeqCst), 0);
    }
}
