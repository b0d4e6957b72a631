//! Link-time machine discovery.
//!
//! Crates (typically generated code) register machines by submitting a
//! [`MachineRegistration`] to the [`FACTORY_MACHINES`] distributed slice;
//! [`FactoryBuilder::add_from_registry`](crate::FactoryBuilder::add_from_registry)
//! adds one instance of each.
//!
//! ```rust
//! use ferrous_factory::registry::{MachineRegistration, FACTORY_MACHINES};
//! use ferrous_factory::{MachineRef, Name, SingletonFactoryMachine};
//! use std::sync::Arc;
//!
//! fn greeting() -> MachineRef {
//!     Arc::new(SingletonFactoryMachine::of(0, Name::<String>::of("greeting"), "hi".to_string()))
//! }
//!
//! #[linkme::distributed_slice(FACTORY_MACHINES)]
//! static GREETING: MachineRegistration = MachineRegistration {
//!     name: "greeting",
//!     create: greeting,
//! };
//! ```

use crate::machine::MachineRef;

/// Registry entry for a machine.
pub struct MachineRegistration {
    /// Unique registration name, used in dumps and logs
    pub name: &'static str,
    /// Creates the machine; called once per builder that reads the registry
    pub create: fn() -> MachineRef,
}

#[linkme::distributed_slice]
pub static FACTORY_MACHINES: [MachineRegistration] = [..];

/// Every registered machine, freshly created, with its registration name.
pub fn registered_machines() -> Vec<(&'static str, MachineRef)> {
    FACTORY_MACHINES
        .iter()
        .map(|entry| (entry.name, (entry.create)()))
        .collect()
}

/// Names of every registration, in link order.
pub fn list_registrations() -> Vec<&'static str> {
    FACTORY_MACHINES.iter().map(|e| e.name).collect()
}
