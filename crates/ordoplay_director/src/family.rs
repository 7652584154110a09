// SPDX-License-Identifier: MIT OR Apache-2.0
//! State shared by every script of a director family.
//!
//! A family is a root director plus all of its imported and child scripts.
//! Only the root owns the thread forest; everything the nested scripts
//! need to reach the root without a back pointer lives here.

use crate::globals::GlobalValueRegistry;
use crate::notifier::DirectorNotifier;
use crate::thread::ThreadRequest;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Shared family state
#[derive(Default)]
pub struct ScriptFamily {
    pub(crate) globals: GlobalValueRegistry,
    notifier: RefCell<Option<Rc<dyn DirectorNotifier>>>,
    debugging: Cell<bool>,
    should_step: Cell<bool>,
    queueing: Cell<bool>,
    queue: RefCell<Vec<ThreadRequest>>,
    queue_front: Cell<usize>,
    deferred: RefCell<Vec<ThreadRequest>>,
    player: Cell<Option<Uuid>>,
}

impl ScriptFamily {
    /// Create a fresh family
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Global value registry
    pub fn globals(&self) -> &GlobalValueRegistry {
        &self.globals
    }

    /// Attached notifier
    pub fn notifier(&self) -> Option<Rc<dyn DirectorNotifier>> {
        self.notifier.borrow().clone()
    }

    pub(crate) fn set_notifier(&self, notifier: Option<Rc<dyn DirectorNotifier>>) {
        *self.notifier.borrow_mut() = notifier;
    }

    /// Whether the family is paused for debugging
    pub fn is_debugging(&self) -> bool {
        self.debugging.get()
    }

    pub(crate) fn set_debugging(&self, debugging: bool) {
        self.debugging.set(debugging);
    }

    /// Whether a debugger step is armed
    pub fn should_step(&self) -> bool {
        self.should_step.get()
    }

    pub(crate) fn set_should_step(&self, step: bool) {
        self.should_step.set(step);
    }

    /// Player actor shared by the family
    pub fn player(&self) -> Option<Uuid> {
        self.player.get()
    }

    pub(crate) fn set_player(&self, player: Option<Uuid>) {
        self.player.set(player);
    }

    /// Whether thread requests are being captured
    pub(crate) fn is_queueing(&self) -> bool {
        self.queueing.get()
    }

    pub(crate) fn set_queueing(&self, queueing: bool) {
        self.queueing.set(queueing);
    }

    /// Capture a thread request.
    ///
    /// Reverse requests go to a front segment that stays in arrival order,
    /// so the downstream targets of a node's outputs run before anything
    /// the node queued itself, in declaration order.
    pub(crate) fn enqueue(&self, request: ThreadRequest, reverse: bool) {
        let mut queue = self.queue.borrow_mut();
        if reverse {
            let front = self.queue_front.get().min(queue.len());
            queue.insert(front, request);
            self.queue_front.set(front + 1);
        } else {
            queue.push(request);
        }
    }

    /// Take every captured request, leaving the queue empty
    pub(crate) fn take_queue(&self) -> Vec<ThreadRequest> {
        self.queue_front.set(0);
        std::mem::take(&mut *self.queue.borrow_mut())
    }

    /// Hold a request made on a nested script until the root next updates
    pub(crate) fn defer(&self, request: ThreadRequest) {
        self.deferred.borrow_mut().push(request);
    }

    pub(crate) fn take_deferred(&self) -> Vec<ThreadRequest> {
        std::mem::take(&mut *self.deferred.borrow_mut())
    }

    /// Move pending requests and settings from a family being merged in
    pub(crate) fn absorb(&self, other: &ScriptFamily) {
        self.deferred.borrow_mut().extend(other.take_deferred());
        if self.player.get().is_none() {
            self.player.set(other.player.get());
        }
    }
}

impl fmt::Debug for ScriptFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFamily")
            .field("globals", &self.globals.keys())
            .field("notifier", &self.notifier.borrow().is_some())
            .field("debugging", &self.debugging.get())
            .field("queueing", &self.queueing.get())
            .field("queued", &self.queue.borrow().len())
            .field("deferred", &self.deferred.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{DirectorId, Id, NodeRef};

    fn request() -> ThreadRequest {
        ThreadRequest::thread(NodeRef::new(DirectorId::new(), Id::new()), 0)
    }

    #[test]
    fn test_reverse_requests_keep_arrival_order() {
        let family = ScriptFamily::new();
        let queued = request();
        let (a, b) = (request(), request());

        family.enqueue(queued, false);
        family.enqueue(a, true);
        family.enqueue(b, true);

        assert_eq!(family.take_queue(), vec![a, b, queued]);
        assert!(family.take_queue().is_empty());

        // The front segment resets with each drain.
        let c = request();
        family.enqueue(queued, false);
        family.enqueue(c, true);
        assert_eq!(family.take_queue(), vec![c, queued]);
    }

    #[test]
    fn test_absorb_moves_deferred() {
        let family = ScriptFamily::new();
        let other = ScriptFamily::new();
        other.defer(request());
        other.set_player(Some(Uuid::new_v4()));

        family.absorb(&other);

        assert_eq!(family.take_deferred().len(), 1);
        assert!(other.take_deferred().is_empty());
        assert_eq!(family.player(), other.player());
    }
}
