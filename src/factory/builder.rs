use std::sync::Arc;

use ahash::AHashSet;

use super::{Factory, RegisteredMachine};
use crate::customizer::ComponentCustomizerEngine;
use crate::error::FactoryResult;
use crate::machine::{FactoryMachine, MachineRef, WarehouseProvidersMachine};
use crate::name::{AnyName, ComponentType};
use crate::observer::{FactoryObserver, Observers};
use crate::overlay::MachineSource;
use crate::registry::registered_machines;
use crate::traits::{Resolver, ResolverCore};
use crate::warehouse::Warehouse;

/// Assembles a [`Factory`].
///
/// Machines come from explicit registration, overlay snapshots and the
/// link-time registry; their order of addition only matters between equal
/// priorities.
///
/// [`build`](Self::build) also picks up machines and customizer engines
/// that are themselves components: every `dyn FactoryMachine` component is
/// added as a machine, round after round, until no round finds a new one.
/// Then every `dyn ComponentCustomizerEngine` component is collected, and
/// the final factory starts with an empty warehouse. The rounds' warehouses
/// stay open, owned by the final factory, because adopted machines and
/// engines keep using what was built there; they close with it.
#[derive(Default)]
pub struct FactoryBuilder {
    machines: Vec<RegisteredMachine>,
    providers: Vec<Arc<Warehouse>>,
    customizer_engines: Vec<Arc<dyn ComponentCustomizerEngine>>,
    observers: Observers,
}

impl FactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_machine(self, machine: impl FactoryMachine + 'static) -> Self {
        self.add_machine_ref(Arc::new(machine))
    }

    pub fn add_machine_ref(mut self, machine: MachineRef) -> Self {
        self.machines.push(RegisteredMachine {
            source: "IndividualMachines".to_string(),
            machine,
        });
        self
    }

    /// Adds the machines `source` holds right now. Later changes to the
    /// overlay do not reach this builder.
    pub fn add_local_machines<S: MachineSource + ?Sized>(mut self, source: &S) -> Self {
        let id = source.source_id();
        for machine in source.snapshot() {
            self.machines.push(RegisteredMachine {
                source: id.clone(),
                machine,
            });
        }
        self
    }

    /// Adds one instance of every machine in
    /// [`FACTORY_MACHINES`](crate::registry::FACTORY_MACHINES).
    pub fn add_from_registry(mut self) -> Self {
        for (name, machine) in registered_machines() {
            tracing::debug!(registration = name, machine = %machine.describe(), "registry machine added");
            self.machines.push(RegisteredMachine {
                source: "Registry".to_string(),
                machine,
            });
        }
        self
    }

    /// Makes `provider`'s components visible without owning them. The
    /// provider is never closed by the factory.
    pub fn add_warehouse_provider(mut self, provider: Arc<Warehouse>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn add_customizer_engine(mut self, engine: impl ComponentCustomizerEngine + 'static) -> Self {
        self.customizer_engines.push(Arc::new(engine));
        self
    }

    pub fn add_observer(mut self, observer: Arc<dyn FactoryObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> FactoryResult<Factory> {
        let FactoryBuilder {
            mut machines,
            providers,
            mut customizer_engines,
            observers,
        } = self;

        if !providers.is_empty() {
            machines.push(RegisteredMachine {
                source: "WarehouseProviders".to_string(),
                machine: Arc::new(WarehouseProvidersMachine::new(providers.clone())),
            });
        }

        let machine_type = ComponentType::of::<dyn FactoryMachine>();
        let mut adopted: AHashSet<AnyName> = AHashSet::new();
        let mut bootstrap = Vec::new();
        loop {
            let round = Factory::assemble(
                machines.clone(),
                Vec::new(),
                Warehouse::with_providers(providers.clone()),
                Observers::new(),
                Vec::new(),
            );
            let mut added = Vec::new();
            let mut failures = Vec::new();
            for name in round.buildable_names(&machine_type) {
                if adopted.contains(&name) {
                    continue;
                }
                match round.resolve_any(&name) {
                    Ok(Some(component)) => {
                        let machine = component.downcast::<dyn FactoryMachine>()?.into_component();
                        tracing::debug!(name = %name, machine = %machine.describe(), "machine built by machine");
                        added.push(RegisteredMachine {
                            source: "MachineFactories".to_string(),
                            machine,
                        });
                        adopted.insert(name);
                    }
                    Ok(None) => {}
                    Err(e) => failures.push(e),
                }
            }
            if !round.warehouse().is_empty() {
                bootstrap.push(round);
            }
            if added.is_empty() {
                // retried every round until nothing new appears
                if let Some(e) = failures.into_iter().next() {
                    return Err(e);
                }
                break;
            }
            machines.extend(added);
        }

        let engine_type = ComponentType::of::<dyn ComponentCustomizerEngine>();
        let has_engine_components = machines
            .iter()
            .any(|m| !m.machine.name_buildable_components(&engine_type).is_empty());
        if has_engine_components {
            let round = Factory::assemble(
                machines.clone(),
                Vec::new(),
                Warehouse::with_providers(providers.clone()),
                Observers::new(),
                Vec::new(),
            );
            customizer_engines.extend(round.get_components::<dyn ComponentCustomizerEngine>()?);
            if !round.warehouse().is_empty() {
                bootstrap.push(round);
            }
        }

        let factory = Factory::assemble(
            machines,
            customizer_engines,
            Warehouse::with_providers(providers),
            observers,
            bootstrap,
        );
        tracing::info!(factory = %factory.id(), "factory built");
        Ok(factory)
    }
}
