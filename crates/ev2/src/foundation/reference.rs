//! Shared ownership handles
//!
//! `Ref<T>` is the strong, counted handle used for every downward edge of the
//! scene graph (parent owns child, scene owns root and active camera).
//! `WeakRef<T>` is the only way to point back up the tree: it never keeps its
//! target alive and must be upgraded, fallibly, before use.
//!
//! The last `Ref` to be dropped destroys the value synchronously on the
//! dropping thread.

use std::cell::{BorrowError, BorrowMutError, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

/// Strong, reference-counted handle with interior mutability
pub struct Ref<T: ?Sized> {
    inner: Rc<RefCell<T>>,
}

impl<T> Ref<T> {
    /// Take ownership of `value`; the count starts at one
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }
}

impl<T: ?Sized> Ref<T> {
    /// Wrap an existing shared cell
    ///
    /// Use this after coercing `Rc<RefCell<Concrete>>` into
    /// `Rc<RefCell<dyn Trait>>` to get a polymorphic handle that shares the
    /// same count.
    pub fn from_rc(inner: Rc<RefCell<T>>) -> Self {
        Self { inner }
    }

    /// Give back the underlying shared cell without touching the count
    pub fn into_rc(self) -> Rc<RefCell<T>> {
        self.inner
    }

    /// Immutably borrow the value
    ///
    /// # Panics
    /// Panics if the value is currently mutably borrowed.
    pub fn borrow(&self) -> std::cell::Ref<'_, T> {
        self.inner.borrow()
    }

    /// Mutably borrow the value
    ///
    /// # Panics
    /// Panics if the value is currently borrowed.
    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    /// Immutably borrow the value, failing if it is mutably borrowed
    pub fn try_borrow(&self) -> Result<std::cell::Ref<'_, T>, BorrowError> {
        self.inner.try_borrow()
    }

    /// Mutably borrow the value, failing if it is already borrowed
    pub fn try_borrow_mut(&self) -> Result<std::cell::RefMut<'_, T>, BorrowMutError> {
        self.inner.try_borrow_mut()
    }

    /// Create a non-owning back-reference
    pub fn downgrade(&self) -> WeakRef<T> {
        WeakRef {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Ref<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live strong handles
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Address of the shared allocation, stable for the value's lifetime
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner).cast::<()>() as usize
    }
}

impl<T: ?Sized> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized> Eq for Ref<T> {}

impl<T: ?Sized> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &format_args!("{:#x}", self.id()))
            .field("strong", &self.strong_count())
            .finish()
    }
}

/// Non-owning observer of a `Ref` target
pub struct WeakRef<T: ?Sized> {
    inner: Weak<RefCell<T>>,
}

impl<T> WeakRef<T> {
    /// A weak reference that never upgrades
    pub fn new() -> Self {
        Self { inner: Weak::new() }
    }
}

impl<T> Default for WeakRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> WeakRef<T> {
    /// Obtain a strong handle if the target is still alive
    pub fn upgrade(&self) -> Option<Ref<T>> {
        self.inner.upgrade().map(Ref::from_rc)
    }

    /// Whether the target has not been dropped yet
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Whether this observes the same allocation as `strong`
    pub fn points_to(&self, strong: &Ref<T>) -> bool {
        std::ptr::eq(
            self.inner.as_ptr().cast::<()>(),
            Rc::as_ptr(&strong.inner).cast::<()>(),
        )
    }
}

impl<T: ?Sized> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Tracked {
        drops: Rc<Cell<u32>>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn test_last_drop_deletes_exactly_once() {
        let drops = Rc::new(Cell::new(0));
        let original = Ref::new(Tracked { drops: Rc::clone(&drops) });

        let mut copies: Vec<Ref<Tracked>> = (0..8).map(|_| original.clone()).collect();
        assert_eq!(original.strong_count(), 9);
        drop(original);

        // Drop in a scrambled order
        for index in [3, 0, 5, 1, 3, 0, 1] {
            copies.remove(index);
            assert_eq!(drops.get(), 0);
        }
        assert_eq!(copies.len(), 1);
        copies.clear();
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_self_assignment_keeps_value_alive() {
        let drops = Rc::new(Cell::new(0));
        let mut handle = Ref::new(Tracked { drops: Rc::clone(&drops) });
        handle = handle.clone();
        assert_eq!(handle.strong_count(), 1);
        assert_eq!(drops.get(), 0);
    }

    #[test]
    fn test_move_does_not_touch_count() {
        let handle = Ref::new(5_u32);
        let moved = handle;
        assert_eq!(moved.strong_count(), 1);
    }

    #[test]
    fn test_equality_is_identity() {
        let a = Ref::new(1_u32);
        let b = Ref::new(1_u32);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_weak_does_not_own() {
        let strong = Ref::new(String::from("parent"));
        let weak = strong.downgrade();
        assert_eq!(strong.strong_count(), 1);
        assert!(weak.points_to(&strong));
        assert_eq!(weak.upgrade().map(|r| r.borrow().clone()), Some(String::from("parent")));

        drop(strong);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
        assert!(WeakRef::<u32>::default().upgrade().is_none());
    }

    #[test]
    fn test_polymorphic_handle_shares_count() {
        trait Named {
            fn name(&self) -> &str;
        }
        struct Ship;
        impl Named for Ship {
            fn name(&self) -> &str {
                "ship"
            }
        }

        let concrete: Rc<RefCell<Ship>> = Rc::new(RefCell::new(Ship));
        let shared: Rc<RefCell<dyn Named>> = concrete.clone();
        let base = Ref::from_rc(shared);
        assert_eq!(base.borrow().name(), "ship");
        assert_eq!(base.strong_count(), 2);
        drop(concrete);
        assert_eq!(base.strong_count(), 1);
    }
}
