//! Scoped disposal in reverse registration order.
//!
//! A [`Scope`] collects [`Disposable`]s and releases them last-in first-out,
//! so a dependent registered after its owner is always released first.

use crate::error::LifetimeError;
use crate::lifetime::{Disposable, Lifetime};

/// A LIFO collection of resources released together.
///
/// ```ignore
/// let len = Scope::with(|scope| -> Result<u32, MemoryError> {
///     let ptr = scope.manage(memory.encode_utf8("hello")?)?;
///     vm_call(ptr)
/// })?;
/// ```
#[derive(Default)]
pub struct Scope {
    managed: Vec<Box<dyn Disposable>>,
    disposed: bool,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with a fresh scope and dispose it afterwards.
    pub fn with<R>(f: impl FnOnce(&mut Scope) -> R) -> R {
        let mut scope = Scope::new();
        let result = f(&mut scope);
        scope.dispose();
        result
    }

    /// Keep `lifetime` until the scope is disposed and return a copy of its value.
    pub fn manage<V: Copy + 'static>(&mut self, lifetime: Lifetime<V>) -> Result<V, LifetimeError> {
        let value = *lifetime.try_value()?;
        self.managed.push(Box::new(lifetime));
        Ok(value)
    }

    /// Keep any disposable until the scope is disposed.
    pub fn defer(&mut self, disposable: impl Disposable + 'static) {
        self.managed.push(Box::new(disposable));
    }

    /// Number of resources held.
    pub fn len(&self) -> usize {
        self.managed.len()
    }

    /// Whether the scope holds nothing.
    pub fn is_empty(&self) -> bool {
        self.managed.is_empty()
    }
}

impl Disposable for Scope {
    fn alive(&self) -> bool {
        !self.disposed
    }

    fn dispose(&mut self) {
        while let Some(mut resource) = self.managed.pop() {
            resource.dispose();
        }
        self.disposed = true;
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.dispose();
    }
}
