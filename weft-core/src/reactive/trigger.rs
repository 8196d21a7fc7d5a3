//! Trigger Pipes
//!
//! [`Runtime::trigger`] evaluates an expression and calls back once, on the
//! first later change of anything the expression read. The callback is a
//! trigger-class listener layered on top of whatever is tracking the caller,
//! so reads inside the pipe still register with the enclosing computation.
//!
//! Nested pipes around the same read fire innermost first.
//!
//! A pipe lives no longer than the tracked region that created it: its
//! entries are also recorded with every enclosing listener, so a re-run or
//! disposal of the enclosing computation frees them.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use super::runtime::Runtime;
use super::subscriber::{Callback, Listener, Registrations};

impl Runtime {
    /// Evaluate `expr`, arranging for `on_change` to run once when any value
    /// it read changes.
    ///
    /// The callback runs during the notification drain, ahead of ordinary
    /// watchers. A pipe whose expression reads nothing never fires.
    pub fn trigger<T, F>(&self, expr: impl FnOnce() -> T, on_change: F) -> T
    where
        F: FnOnce() + 'static,
    {
        let registrations: Registrations = Rc::default();
        let pending = RefCell::new(Some(on_change));
        let owned = Rc::clone(&registrations);
        let runtime = self.downgrade();

        let callback: Callback = Rc::new(move |_: u64| {
            let Some(on_change) = pending.borrow_mut().take() else {
                return;
            };
            trace!("trigger pipe fired");
            if let Some(runtime) = runtime.upgrade() {
                runtime.release(&owned);
            }
            on_change();
        });

        let outer = self.context().current_frame();
        let owners = outer
            .triggers()
            .iter()
            .chain(outer.dependant())
            .map(|listener| Rc::clone(listener.owned()));
        let listener = Listener::new(callback, 0, registrations).owned_by(owners);

        let _frame = self.context().enter_frame(outer.with_trigger(listener));
        expr()
    }
}
