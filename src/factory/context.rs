//! Build context handed to machines.

use parking_lot::Mutex;

use super::Factory;
use crate::error::FactoryResult;
use crate::name::{AnyComponent, AnyName, ComponentType};
use crate::query::SatisfiedBom;
use crate::traits::ResolverCore;

/// What a machine sees while building one component.
///
/// Declared dependencies are already resolved in [`satisfied`](Self::satisfied).
/// Lookups made through the context's [`Resolver`](crate::Resolver) methods
/// go to the same factory and are recorded as extra dependencies of the
/// component being built.
///
/// # Examples
///
/// ```
/// use ferrous_factory::*;
/// use std::sync::Arc;
///
/// let total = Name::<u32>::of("total");
/// let factory = Factory::builder()
///     .add_machine(SingletonFactoryMachine::of(0, Name::<u32>::of("a"), 1u32))
///     .add_machine(SingletonFactoryMachine::of(0, Name::<u32>::of("b"), 2u32))
///     .add_machine(SingleNameFactoryMachine::from_fn(
///         0,
///         total.clone(),
///         BoxKind::Boundless,
///         BillOfMaterials::new(),
///         |ctx| {
///             // ad-hoc lookup, not declared in the bill of materials
///             let all = ctx.get_components::<u32>()?;
///             Ok(Arc::new(all.iter().map(|v| **v).sum()))
///         },
///     ))
///     .build()
///     .unwrap();
///
/// assert_eq!(*factory.require(&total).unwrap(), 3);
/// assert_eq!(factory.warehouse().list_dependencies(total.erase()).len(), 2);
/// ```
pub struct BuildContext<'a> {
    factory: &'a Factory,
    name: &'a AnyName,
    satisfied: &'a SatisfiedBom,
    lookups: Mutex<Vec<AnyName>>,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(factory: &'a Factory, name: &'a AnyName, satisfied: &'a SatisfiedBom) -> Self {
        Self {
            factory,
            name,
            satisfied,
            lookups: Mutex::new(Vec::new()),
        }
    }

    /// Name of the component being built.
    pub fn name(&self) -> &AnyName {
        self.name
    }

    /// The bill of materials, resolved.
    pub fn satisfied(&self) -> &SatisfiedBom {
        self.satisfied
    }

    /// The factory doing the build. Lookups made directly on it are not
    /// recorded as dependencies.
    pub fn factory(&self) -> &Factory {
        self.factory
    }

    pub(crate) fn into_lookups(self) -> Vec<AnyName> {
        self.lookups.into_inner()
    }

    fn record(&self, name: &AnyName) {
        let mut lookups = self.lookups.lock();
        if !lookups.contains(name) {
            lookups.push(name.clone());
        }
    }
}

impl ResolverCore for BuildContext<'_> {
    fn resolve_any(&self, name: &AnyName) -> FactoryResult<Option<AnyComponent>> {
        let found = self.factory.resolve_any(name)?;
        if found.is_some() {
            self.record(name);
        }
        Ok(found)
    }

    fn resolve_all(&self, component_type: &ComponentType) -> FactoryResult<Vec<AnyComponent>> {
        let found = self.factory.resolve_all(component_type)?;
        for c in &found {
            self.record(c.name());
        }
        Ok(found)
    }
}
