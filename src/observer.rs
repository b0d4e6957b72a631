//! Build observers.
//!
//! Observers are notified around every component build a factory performs.
//! Cache hits are not builds and are not reported.

use std::sync::Arc;
use std::time::Duration;

use crate::error::FactoryError;
use crate::name::AnyName;

/// Observer trait for factory build events.
///
/// Calls are made synchronously under the factory's build lock. Keep
/// implementations lightweight and never resolve components from them.
///
/// # Examples
///
/// ```
/// use ferrous_factory::{AnyName, Factory, FactoryObserver, Name, Resolver, SingletonFactoryMachine};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder {
///     built: Mutex<Vec<String>>,
/// }
///
/// impl FactoryObserver for Recorder {
///     fn built(&self, name: &AnyName, _duration: Duration) {
///         self.built.lock().unwrap().push(name.name().to_string());
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let factory = Factory::builder()
///     .add_machine(SingletonFactoryMachine::of(0, Name::<u8>::of("one"), 1u8))
///     .add_observer(recorder.clone())
///     .build()
///     .unwrap();
///
/// factory.get_component(&Name::<u8>::of("one")).unwrap();
/// factory.get_component(&Name::<u8>::of("one")).unwrap();
/// assert_eq!(*recorder.built.lock().unwrap(), vec!["one".to_string()]);
/// ```
pub trait FactoryObserver: Send + Sync {
    /// A machine is about to build `name`.
    fn building(&self, _name: &AnyName, _machine: &str) {}

    /// `name` was built and checked in.
    fn built(&self, _name: &AnyName, _duration: Duration) {}

    /// Building `name` failed, including machine panics.
    fn build_failed(&self, _name: &AnyName, _error: &FactoryError) {}
}

/// Collection of observers attached to a factory.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn FactoryObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn FactoryObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn building(&self, name: &AnyName, machine: &str) {
        for observer in &self.observers {
            observer.building(name, machine);
        }
    }

    #[inline]
    pub(crate) fn built(&self, name: &AnyName, duration: Duration) {
        for observer in &self.observers {
            observer.built(name, duration);
        }
    }

    #[inline]
    pub(crate) fn build_failed(&self, name: &AnyName, error: &FactoryError) {
        for observer in &self.observers {
            observer.build_failed(name, error);
        }
    }
}

/// Observer emitting `tracing` events at debug level, one per build event.
///
/// The factory already logs builds at info level; attach this one for
/// timings and failure details under a dedicated target.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    label: String,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::with_label("factory")
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryObserver for TracingObserver {
    fn building(&self, name: &AnyName, machine: &str) {
        tracing::debug!(target: "ferrous_factory::observer", label = %self.label, name = %name, machine, "building");
    }

    fn built(&self, name: &AnyName, duration: Duration) {
        tracing::debug!(target: "ferrous_factory::observer", label = %self.label, name = %name, ?duration, "built");
    }

    fn build_failed(&self, name: &AnyName, error: &FactoryError) {
        tracing::warn!(target: "ferrous_factory::observer", label = %self.label, name = %name, %error, "build failed");
    }
}
