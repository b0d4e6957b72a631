//! Machine overlays: caller-owned lists of extra machines.
//!
//! An overlay never changes a factory that already exists. A builder takes a
//! snapshot of an overlay's machines through
//! [`FactoryBuilder::add_local_machines`](crate::FactoryBuilder::add_local_machines),
//! and the machines then compete by priority like any other machine.
//!
//! Visibility is explicit: a [`ThreadLocalMachines`] cannot leave the thread
//! that created it, and context-local overlays are reached through an
//! [`OverlayRegistry`] handed around by reference.
//!
//! ```rust
//! use ferrous_factory::*;
//!
//! let id = Name::<String>::of("id-generator");
//! let registry = OverlayRegistry::new();
//! let base = SingletonFactoryMachine::of(0, id.clone(), "random".to_string());
//!
//! registry.with_overlay(
//!     "test-run-1",
//!     SingletonFactoryMachine::of(-10000, id.clone(), "fixed".to_string()),
//!     |overlay| {
//!         let factory = Factory::builder()
//!             .add_machine(base.clone())
//!             .add_local_machines(overlay.as_ref())
//!             .build()
//!             .unwrap();
//!         assert_eq!(*factory.require(&id).unwrap(), "fixed");
//!     },
//! );
//!
//! // removed again on exit
//! let factory = Factory::builder()
//!     .add_machine(base)
//!     .add_local_machines(registry.context_local("test-run-1").as_ref())
//!     .build()
//!     .unwrap();
//! assert_eq!(*factory.require(&id).unwrap(), "random");
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::machine::{FactoryMachine, MachineRef};

/// Something a builder can take machines from.
pub trait MachineSource {
    /// Label shown as the machines' source in factory dumps.
    fn source_id(&self) -> String;

    /// The machines present right now.
    fn snapshot(&self) -> Vec<MachineRef>;
}

impl<S: MachineSource + ?Sized> MachineSource for Arc<S> {
    fn source_id(&self) -> String {
        (**self).source_id()
    }

    fn snapshot(&self) -> Vec<MachineRef> {
        (**self).snapshot()
    }
}

trait OverlayList {
    fn remove(&self, machine: &MachineRef) -> bool;
}

/// Removes an installed machine from its overlay when dropped.
#[must_use = "the machine is removed as soon as the guard is dropped"]
pub struct OverlayGuard<'a> {
    list: &'a dyn OverlayList,
    machine: MachineRef,
}

impl OverlayGuard<'_> {
    pub fn machine(&self) -> &MachineRef {
        &self.machine
    }
}

impl Drop for OverlayGuard<'_> {
    fn drop(&mut self) {
        self.list.remove(&self.machine);
    }
}

/// A shareable overlay.
///
/// Add, remove and snapshot are each atomic. Interleaving several threads'
/// add/remove calls on one overlay gives no ordering guarantee between them.
#[derive(Default)]
pub struct LocalMachines {
    id: String,
    machines: RwLock<Vec<MachineRef>>,
}

impl LocalMachines {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            machines: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Appends a machine and returns the handle that removes it.
    pub fn add_machine(&self, machine: impl FactoryMachine + 'static) -> MachineRef {
        let machine: MachineRef = Arc::new(machine);
        self.add_machine_ref(machine.clone());
        machine
    }

    pub fn add_machine_ref(&self, machine: MachineRef) {
        tracing::debug!(overlay = %self.id, machine = %machine.describe(), "overlay machine added");
        self.machines.write().push(machine);
    }

    /// Removes `machine` (compared by identity). Returns whether it was present.
    pub fn remove_machine(&self, machine: &MachineRef) -> bool {
        let mut machines = self.machines.write();
        match machines.iter().position(|m| Arc::ptr_eq(m, machine)) {
            Some(i) => {
                machines.remove(i);
                tracing::debug!(overlay = %self.id, machine = %machine.describe(), "overlay machine removed");
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.machines.write().clear();
        tracing::debug!(overlay = %self.id, "overlay cleared");
    }

    /// Appends a machine for as long as the returned guard lives.
    pub fn install(&self, machine: impl FactoryMachine + 'static) -> OverlayGuard<'_> {
        OverlayGuard {
            machine: self.add_machine(machine),
            list: self,
        }
    }

    pub fn len(&self) -> usize {
        self.machines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.read().is_empty()
    }
}

impl OverlayList for LocalMachines {
    fn remove(&self, machine: &MachineRef) -> bool {
        self.remove_machine(machine)
    }
}

impl MachineSource for LocalMachines {
    fn source_id(&self) -> String {
        format!("LocalMachines({})", self.id)
    }

    fn snapshot(&self) -> Vec<MachineRef> {
        self.machines.read().clone()
    }
}

impl std::fmt::Debug for LocalMachines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMachines")
            .field("id", &self.id)
            .field("machines", &self.len())
            .finish()
    }
}

/// An overlay bound to the thread that created it. Neither `Send` nor `Sync`.
#[derive(Default)]
pub struct ThreadLocalMachines {
    machines: RefCell<Vec<MachineRef>>,
    _not_send: PhantomData<*const ()>,
}

impl ThreadLocalMachines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_machine(&self, machine: impl FactoryMachine + 'static) -> MachineRef {
        let machine: MachineRef = Arc::new(machine);
        self.machines.borrow_mut().push(machine.clone());
        machine
    }

    pub fn remove_machine(&self, machine: &MachineRef) -> bool {
        let mut machines = self.machines.borrow_mut();
        match machines.iter().position(|m| Arc::ptr_eq(m, machine)) {
            Some(i) => {
                machines.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.machines.borrow_mut().clear();
    }

    pub fn install(&self, machine: impl FactoryMachine + 'static) -> OverlayGuard<'_> {
        OverlayGuard {
            machine: self.add_machine(machine),
            list: self,
        }
    }

    pub fn len(&self) -> usize {
        self.machines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.borrow().is_empty()
    }
}

impl OverlayList for ThreadLocalMachines {
    fn remove(&self, machine: &MachineRef) -> bool {
        self.remove_machine(machine)
    }
}

impl MachineSource for ThreadLocalMachines {
    fn source_id(&self) -> String {
        format!("ThreadLocalMachines({:?})", std::thread::current().id())
    }

    fn snapshot(&self) -> Vec<MachineRef> {
        self.machines.borrow().clone()
    }
}

/// Named context-local overlays, e.g. one per test run.
///
/// Any thread holding the registry sees the same overlay for a context name.
#[derive(Default)]
pub struct OverlayRegistry {
    contexts: RwLock<AHashMap<String, Arc<LocalMachines>>>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The overlay for `context`, created empty on first use.
    pub fn context_local(&self, context: &str) -> Arc<LocalMachines> {
        if let Some(overlay) = self.contexts.read().get(context) {
            return overlay.clone();
        }
        self.contexts
            .write()
            .entry(context.to_string())
            .or_insert_with(|| {
                tracing::debug!(context, "context overlay created");
                Arc::new(LocalMachines::new(context))
            })
            .clone()
    }

    pub fn remove_context(&self, context: &str) -> Option<Arc<LocalMachines>> {
        let removed = self.contexts.write().remove(context);
        if removed.is_some() {
            tracing::debug!(context, "context overlay removed");
        }
        removed
    }

    pub fn contexts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.contexts.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Runs `f` with `machine` installed in the overlay for `context`.
    /// The machine is removed when `f` returns or unwinds.
    pub fn with_overlay<R>(
        &self,
        context: &str,
        machine: impl FactoryMachine + 'static,
        f: impl FnOnce(&Arc<LocalMachines>) -> R,
    ) -> R {
        let overlay = self.context_local(context);
        let _installed = overlay.install(machine);
        f(&overlay)
    }
}

impl std::fmt::Debug for OverlayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRegistry")
            .field("contexts", &self.contexts())
            .finish()
    }
}
