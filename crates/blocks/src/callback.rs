//! Call-stable callback slots.
//!
//! A [`StableCallback`] is handed out once and subscribed to for a long time;
//! the owner swaps the function behind it whenever it re-renders. Clones share
//! the slot, so every holder sees the latest function.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub struct StableCallback<A> {
    slot: Rc<RefCell<Option<Rc<dyn Fn(A)>>>>,
}

impl<A> Clone for StableCallback<A> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<A> Default for StableCallback<A> {
    fn default() -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
        }
    }
}

impl<A> fmt::Debug for StableCallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StableCallback")
            .field("set", &self.is_set())
            .finish()
    }
}

impl<A> StableCallback<A> {
    /// An empty slot; calling it does nothing until a function is supplied.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fn(f: impl Fn(A) + 'static) -> Self {
        let callback = Self::new();
        callback.replace(f);
        callback
    }

    pub fn replace(&self, f: impl Fn(A) + 'static) {
        *self.slot.borrow_mut() = Some(Rc::new(f));
    }

    pub fn clear(&self) {
        self.slot.borrow_mut().take();
    }

    pub fn is_set(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Invokes the latest function. The slot is released before the call, so
    /// the function may replace itself.
    pub fn call(&self, arg: A) {
        let current = self.slot.borrow().clone();
        if let Some(f) = current {
            f(arg);
        }
    }

    pub fn same_slot(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}
