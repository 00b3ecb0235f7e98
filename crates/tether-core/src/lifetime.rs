//! Single-owner tracking of foreign resources.
//!
//! A [`Lifetime`] wraps one value together with the disposer that releases
//! it. The disposer runs at most once: on [`dispose`](Lifetime::dispose), or
//! on drop if the tracker is still alive. [`consume`](Lifetime::consume)
//! hands the value out without running the disposer, for values a foreign
//! call will free on its own.
//!
//! A tracker may depend on an owner (another tracker). Dependents borrow
//! from their owner: disposing a dependent never touches the owner, and the
//! owner must outlive every dependent. Disposing a dependent after its owner
//! is a programmer error and panics.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::LifetimeError;

type Disposer<V> = Rc<dyn Fn(V)>;
type Copier<V> = Rc<dyn Fn(&V) -> V>;

/// Something that holds a foreign resource and can release it.
pub trait Disposable {
    /// Whether the resource is still held.
    fn alive(&self) -> bool;

    /// Release the resource. A no-op when already released.
    fn dispose(&mut self);
}

/// An owned value with an at-most-once disposer.
///
/// State machine: `Alive -> Disposed`, terminal. Both `dispose()` and
/// `consume()` move to `Disposed`.
#[must_use = "dropping a Lifetime disposes it immediately"]
pub struct Lifetime<V> {
    value: Option<V>,
    disposer: Option<Disposer<V>>,
    copier: Option<Copier<V>>,
    owner: Option<Rc<Cell<bool>>>,
    alive: Rc<Cell<bool>>,
}

impl<V> Lifetime<V> {
    /// Track a value that needs no release.
    pub fn new(value: V) -> Self {
        Self {
            value: Some(value),
            disposer: None,
            copier: None,
            owner: None,
            alive: Rc::new(Cell::new(true)),
        }
    }

    /// Track a value released by `disposer`.
    pub fn with_disposer(value: V, disposer: impl Fn(V) + 'static) -> Self {
        let mut lifetime = Self::new(value);
        lifetime.disposer = Some(Rc::new(disposer));
        lifetime
    }

    /// Allow [`dup`](Lifetime::dup) by copying the value with `copier`.
    pub fn with_copier(mut self, copier: impl Fn(&V) -> V + 'static) -> Self {
        self.copier = Some(Rc::new(copier));
        self
    }

    /// Record that this tracker depends on `owner`.
    ///
    /// The owner is not kept alive or disposed by this tracker; it must
    /// simply be disposed after it.
    pub fn owned_by<O>(mut self, owner: &Lifetime<O>) -> Self {
        self.owner = Some(Rc::clone(&owner.alive));
        self
    }

    /// Whether the tracker has neither been disposed nor consumed.
    pub fn alive(&self) -> bool {
        self.alive.get()
    }

    /// Whether a disposer is attached.
    pub fn has_disposer(&self) -> bool {
        self.disposer.is_some()
    }

    fn owner_alive(&self) -> bool {
        self.owner.as_ref().is_none_or(|owner| owner.get())
    }

    /// Borrow the value.
    ///
    /// Fails with [`LifetimeError::UseAfterDispose`] once disposed and with
    /// [`LifetimeError::OwnerDisposed`] if the owner is gone.
    pub fn try_value(&self) -> Result<&V, LifetimeError> {
        if !self.alive() {
            return Err(LifetimeError::UseAfterDispose);
        }
        if !self.owner_alive() {
            return Err(LifetimeError::OwnerDisposed);
        }
        self.value.as_ref().ok_or(LifetimeError::UseAfterDispose)
    }

    /// Borrow the value.
    ///
    /// # Panics
    ///
    /// Panics if the tracker was disposed or consumed, or its owner was
    /// disposed. Reading a released foreign resource is never recoverable.
    pub fn value(&self) -> &V {
        match self.try_value() {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }

    /// Release the value through the disposer. Idempotent.
    ///
    /// # Panics
    ///
    /// Panics if the owner was disposed first. The tracker is marked
    /// disposed before panicking and the disposer is not run.
    pub fn dispose(&mut self) {
        if let Err(e) = self.release() {
            panic!("{e}");
        }
    }

    /// Take the value out and detach the disposer without running it.
    ///
    /// Responsibility for releasing the value passes to the caller.
    pub fn consume(&mut self) -> Result<V, LifetimeError> {
        self.try_value()?;
        let value = self.value.take().ok_or(LifetimeError::UseAfterDispose)?;
        self.disposer = None;
        self.alive.set(false);
        Ok(value)
    }

    /// A new, independently disposed tracker over a copy of the value.
    ///
    /// The copy shares this tracker's disposer, copier and owner.
    pub fn dup(&self) -> Result<Lifetime<V>, LifetimeError> {
        let copier = self.copier.as_ref().ok_or(LifetimeError::NotDuplicable)?;
        let value = copier(self.try_value()?);
        Ok(Lifetime {
            value: Some(value),
            disposer: self.disposer.clone(),
            copier: Some(Rc::clone(copier)),
            owner: self.owner.clone(),
            alive: Rc::new(Cell::new(true)),
        })
    }

    fn release(&mut self) -> Result<(), LifetimeError> {
        if !self.alive() {
            return Ok(());
        }
        self.alive.set(false);
        let value = self.value.take();
        let disposer = self.disposer.take();
        if !self.owner_alive() {
            return Err(LifetimeError::OwnerDisposed);
        }
        if let (Some(value), Some(disposer)) = (value, disposer) {
            disposer(value);
        }
        Ok(())
    }
}

impl<V> Disposable for Lifetime<V> {
    fn alive(&self) -> bool {
        Lifetime::alive(self)
    }

    fn dispose(&mut self) {
        Lifetime::dispose(self)
    }
}

impl<V> Drop for Lifetime<V> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            if std::thread::panicking() {
                tracing::error!(target: "tether", error = %e, "lifetime dropped during unwind");
            } else {
                panic!("{e}");
            }
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Lifetime<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("value", &self.value)
            .field("alive", &self.alive())
            .field("has_disposer", &self.has_disposer())
            .field("has_owner", &self.owner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(value: u32) -> (Lifetime<u32>, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let lifetime = Lifetime::with_disposer(value, move |_| seen.set(seen.get() + 1));
        (lifetime, calls)
    }

    #[test]
    fn dispose_twice_runs_disposer_once() {
        let (mut lt, calls) = counting(7);
        lt.dispose();
        lt.dispose();
        assert_eq!(calls.get(), 1);
        assert!(!lt.alive());
    }

    #[test]
    fn disposer_receives_the_value() {
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let mut lt = Lifetime::with_disposer(42u32, move |v| sink.set(v));
        lt.dispose();
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn drop_disposes_alive_tracker() {
        let (lt, calls) = counting(1);
        drop(lt);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn value_after_dispose_is_an_error() {
        let (mut lt, _) = counting(3);
        assert_eq!(lt.try_value(), Ok(&3));
        lt.dispose();
        assert_eq!(lt.try_value(), Err(LifetimeError::UseAfterDispose));
    }

    #[test]
    #[should_panic(expected = "lifetime used after dispose")]
    fn value_after_dispose_panics() {
        let (mut lt, _) = counting(3);
        lt.dispose();
        let _ = lt.value();
    }

    #[test]
    fn consume_detaches_disposer() {
        let (mut lt, calls) = counting(9);
        assert_eq!(lt.consume(), Ok(9));
        lt.dispose();
        drop(lt);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn consume_after_dispose_fails() {
        let (mut lt, calls) = counting(9);
        lt.dispose();
        assert_eq!(lt.consume(), Err(LifetimeError::UseAfterDispose));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn consume_twice_fails() {
        let (mut lt, _) = counting(9);
        assert!(lt.consume().is_ok());
        assert_eq!(lt.consume(), Err(LifetimeError::UseAfterDispose));
    }

    #[test]
    fn with_disposer_starts_alive() {
        let (lt, calls) = counting(4);
        assert!(lt.alive());
        assert!(lt.has_disposer());
        assert_eq!(lt.try_value(), Ok(&4));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn static_lifetime_has_no_disposer() {
        let mut lt = Lifetime::new("static");
        assert!(!lt.has_disposer());
        lt.dispose();
        assert!(!lt.alive());
    }

    #[test]
    fn disposing_dependent_leaves_owner_alive() {
        let (owner, owner_calls) = counting(1);
        let (dependent, dep_calls) = counting(2);
        let mut dependent = dependent.owned_by(&owner);
        dependent.dispose();
        assert!(owner.alive());
        assert_eq!(owner_calls.get(), 0);
        assert_eq!(dep_calls.get(), 1);
        drop(owner);
        assert_eq!(owner_calls.get(), 1);
    }

    #[test]
    fn dependent_of_disposed_owner_reports_owner_disposed() {
        let (mut owner, _) = counting(1);
        let (dependent, _) = counting(2);
        let mut dependent = dependent.owned_by(&owner);
        owner.dispose();
        assert_eq!(dependent.try_value(), Err(LifetimeError::OwnerDisposed));
        assert_eq!(dependent.consume(), Err(LifetimeError::OwnerDisposed));
        // Leave the dependent marked released so its drop is quiet.
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dependent.dispose()));
        assert!(!dependent.alive());
    }

    #[test]
    #[should_panic(expected = "lifetime owner was disposed before its dependent")]
    fn out_of_order_dispose_panics() {
        let (mut owner, _) = counting(1);
        let (dependent, _) = counting(2);
        let mut dependent = dependent.owned_by(&owner);
        owner.dispose();
        dependent.dispose();
    }

    #[test]
    fn out_of_order_dispose_skips_disposer() {
        let (mut owner, _) = counting(1);
        let (dependent, dep_calls) = counting(2);
        let mut dependent = dependent.owned_by(&owner);
        owner.dispose();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dependent.dispose()));
        assert!(result.is_err());
        assert_eq!(dep_calls.get(), 0);
        dependent.dispose();
    }

    #[test]
    fn dup_requires_copier() {
        let (lt, _) = counting(5);
        assert_eq!(lt.dup().err(), Some(LifetimeError::NotDuplicable));
    }

    #[test]
    fn dup_shares_disposer_but_not_state() {
        let (lt, calls) = counting(5);
        let mut lt = lt.with_copier(|v| v + 1);
        let mut copy = lt.dup().unwrap();
        assert_eq!(*copy.value(), 6);
        lt.dispose();
        assert!(copy.alive());
        copy.dispose();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn dispose_through_trait_object() {
        let (lt, calls) = counting(5);
        let mut boxed: Box<dyn Disposable> = Box::new(lt);
        assert!(boxed.alive());
        boxed.dispose();
        boxed.dispose();
        assert!(!boxed.alive());
        assert_eq!(calls.get(), 1);
    }
}
