//! Factory machines: the pluggable component providers.
//!
//! A machine declares, for exact component types, which names it can build
//! and what it needs to build them. The factory picks the lowest-priority
//! machine able to build a name, satisfies its bill of materials and asks
//! it for a [`ComponentBox`].

use std::sync::Arc;

use crate::component_box::ComponentBox;
use crate::error::FactoryResult;
use crate::factory::BuildContext;
use crate::name::{AnyName, ComponentType};
use crate::query::BillOfMaterials;

mod engine;
mod env;
mod providers;
mod singleton;
mod wrapper;

pub use engine::{DefaultFactoryMachine, MachineEngine, SingleNameFactoryMachine, StdMachineEngine};
pub use env::{EnvVarFactoryMachine, ENV_MACHINE_PRIORITY};
pub use providers::{WarehouseProvidersMachine, WAREHOUSE_PROVIDERS_PRIORITY};
pub use singleton::SingletonFactoryMachine;
pub use wrapper::{FactoryMachineWrapper, FactoryMachineWrapperBuilder};

/// A component provider.
///
/// `can_build` must be a pure, deterministic predicate, and
/// `name_buildable_components` must list exactly the names of the given
/// type for which `can_build` holds (it may be called with
/// [`ComponentType::any`] to list everything). Resolution of a machine's
/// own dependencies goes through the [`BuildContext`].
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::*;
/// use std::sync::Arc;
///
/// struct Greeter {
///     name: Name<String>,
/// }
///
/// impl FactoryMachine for Greeter {
///     fn priority(&self) -> i32 {
///         0
///     }
///
///     fn can_build(&self, name: &AnyName) -> bool {
///         name == self.name.erase()
///     }
///
///     fn name_buildable_components(&self, ty: &ComponentType) -> Vec<AnyName> {
///         if ty.matches(&self.name.component_type()) {
///             vec![self.name.erase().clone()]
///         } else {
///             vec![]
///         }
///     }
///
///     fn bill_of_materials(&self, _name: &AnyName) -> BillOfMaterials {
///         BillOfMaterials::new().with(Query::by_name(&Name::<String>::of("who")))
///     }
///
///     fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
///         let who = ctx.satisfied().one(&Query::by_name(&Name::<String>::of("who")))?;
///         let greeting = Arc::new(format!("hello {}", who));
///         Ok(Some(BoxKind::Boundless.wrap(NamedComponent::new(self.name.clone(), greeting))))
///     }
/// }
///
/// let factory = Factory::builder()
///     .add_machine(Greeter { name: Name::of("greeting") })
///     .add_machine(SingletonFactoryMachine::of(0, Name::<String>::of("who"), "world".to_string()))
///     .build()
///     .unwrap();
///
/// assert_eq!(*factory.require(&Name::<String>::of("greeting")).unwrap(), "hello world");
/// ```
pub trait FactoryMachine: Send + Sync {
    /// Lower value wins when several machines can build the same name.
    fn priority(&self) -> i32;

    fn can_build(&self, name: &AnyName) -> bool;

    /// Every name of `component_type` this machine is able to build.
    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName>;

    /// Queries to satisfy before building `name`.
    fn bill_of_materials(&self, _name: &AnyName) -> BillOfMaterials {
        BillOfMaterials::new()
    }

    /// Build the component named by `ctx.name()`.
    ///
    /// `Ok(None)` means the machine declined after all; the factory then
    /// tries the next machine.
    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>>;

    /// Label used by logs and dumps.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Shared handle to a machine, the form stored by factories and overlays.
pub type MachineRef = Arc<dyn FactoryMachine>;

/// Lists `names` filtered by a component type, honouring the wildcard.
pub(crate) fn names_of_type<'a>(
    names: impl IntoIterator<Item = &'a AnyName>,
    component_type: &ComponentType,
) -> Vec<AnyName> {
    names
        .into_iter()
        .filter(|n| component_type.matches(&n.component_type()))
        .cloned()
        .collect()
}
