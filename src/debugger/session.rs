//! State shared between the engine notification thread and the command
//! thread for one debug session.

use crate::debugger::engine::Process;
use std::sync::{Arc, Condvar, Mutex};

/// Synchronized slot holding the live debugee process handle.
///
/// The handle exists exactly between the process-created and process-exited
/// notifications, unless the controller forcibly clears it on detach or
/// terminate. A paired condition lets a caller block until the slot becomes
/// empty.
#[derive(Default)]
pub struct ProcessSlot {
    slot: Mutex<Option<Arc<dyn Process>>>,
    emptied: Condvar,
}

impl ProcessSlot {
    pub fn set(&self, process: Arc<dyn Process>) {
        *self.slot.lock().unwrap() = Some(process);
    }

    pub fn get(&self) -> Option<Arc<dyn Process>> {
        self.slot.lock().unwrap().clone()
    }

    pub fn is_occupied(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    /// Drop the handle and wake every waiter.
    ///
    /// The condition is notified while the lock is still held: the empty
    /// slot is visible to the next lock acquirer before any waiter re-checks
    /// the predicate, so a waiter that has not yet started waiting cannot
    /// miss the transition.
    pub fn clear_and_signal(&self) {
        let mut slot = self.slot.lock().unwrap();
        *slot = None;
        self.emptied.notify_all();
    }

    /// Block until the slot is empty. Returns immediately if it already is.
    pub fn wait_until_empty(&self) {
        let mut slot = self.slot.lock().unwrap();
        while slot.is_some() {
            slot = self.emptied.wait(slot).unwrap();
        }
    }
}

/// Session-lifetime context shared by the controller and the event
/// dispatcher. Created at session start, dropped at session end.
#[derive(Default)]
pub struct SessionContext {
    process: ProcessSlot,
    last_stopped_thread: Mutex<Option<u32>>,
}

impl SessionContext {
    /// Slot with the live debugee process handle.
    pub fn process(&self) -> &ProcessSlot {
        &self.process
    }

    pub fn set_last_stopped_thread(&self, thread_id: u32) {
        *self.last_stopped_thread.lock().unwrap() = Some(thread_id);
    }

    /// Forget the stop marker. A fresh session starts before any stop.
    pub(crate) fn clear_last_stopped_thread(&self) {
        *self.last_stopped_thread.lock().unwrap() = None;
    }

    /// Thread that caused the most recent stop. `None` until the first
    /// stop-class notification arrives (distinct from thread 0).
    pub fn last_stopped_thread(&self) -> Option<u32> {
        *self.last_stopped_thread.lock().unwrap()
    }
}
