//! Engine-based machines: one engine per buildable name.

use std::fmt;
use std::sync::Arc;

use super::{names_of_type, FactoryMachine};
use crate::component_box::ComponentBox;
use crate::error::FactoryResult;
use crate::factory::BuildContext;
use crate::lifetime::BoxKind;
use crate::name::{AnyName, ComponentType, Name, NamedComponent};
use crate::query::BillOfMaterials;

/// Builds one named component.
pub trait MachineEngine: Send + Sync {
    fn name(&self) -> &AnyName;

    fn bill_of_materials(&self) -> BillOfMaterials;

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Box<dyn ComponentBox>>;

    fn describe(&self) -> String {
        format!("Engine{{{}}}", self.name())
    }
}

type BuildFn<T> = dyn Fn(&BuildContext<'_>) -> FactoryResult<Arc<T>> + Send + Sync;

/// Engine backed by a closure.
///
/// The closure reads its declared dependencies from
/// [`BuildContext::satisfied`] and returns the instance; the engine boxes
/// it according to its [`BoxKind`].
pub struct StdMachineEngine<T: ?Sized> {
    name: Name<T>,
    kind: BoxKind,
    bom: BillOfMaterials,
    component_priority: i32,
    build: Box<BuildFn<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> StdMachineEngine<T> {
    pub fn new<F>(name: Name<T>, kind: BoxKind, bom: BillOfMaterials, build: F) -> Self
    where
        F: Fn(&BuildContext<'_>) -> FactoryResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            name,
            kind,
            bom,
            component_priority: 0,
            build: Box::new(build),
        }
    }

    /// Priority carried by the built [`NamedComponent`].
    pub fn with_component_priority(mut self, priority: i32) -> Self {
        self.component_priority = priority;
        self
    }
}

impl<T: ?Sized + Send + Sync + 'static> MachineEngine for StdMachineEngine<T> {
    fn name(&self) -> &AnyName {
        self.name.erase()
    }

    fn bill_of_materials(&self) -> BillOfMaterials {
        self.bom.clone()
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Box<dyn ComponentBox>> {
        let instance = (self.build)(ctx)?;
        Ok(self.kind.wrap(NamedComponent::with_priority(
            self.name.clone(),
            instance,
            self.component_priority,
        )))
    }

    fn describe(&self) -> String {
        format!("StdMachineEngine{{{}, {:?}}}", self.name, self.kind)
    }
}

/// Machine holding several engines, one per name.
pub struct DefaultFactoryMachine {
    priority: i32,
    engines: Vec<Arc<dyn MachineEngine>>,
}

impl DefaultFactoryMachine {
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            engines: Vec::new(),
        }
    }

    /// Adds an engine. A later engine for an already present name is ignored.
    pub fn with_engine(mut self, engine: impl MachineEngine + 'static) -> Self {
        if !self.engines.iter().any(|e| e.name() == engine.name()) {
            self.engines.push(Arc::new(engine));
        }
        self
    }

    fn engine(&self, name: &AnyName) -> Option<&Arc<dyn MachineEngine>> {
        self.engines.iter().find(|e| e.name() == name)
    }
}

impl FactoryMachine for DefaultFactoryMachine {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_build(&self, name: &AnyName) -> bool {
        self.engine(name).is_some()
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        names_of_type(self.engines.iter().map(|e| e.name()), component_type)
    }

    fn bill_of_materials(&self, name: &AnyName) -> BillOfMaterials {
        self.engine(name)
            .map(|e| e.bill_of_materials())
            .unwrap_or_default()
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        match self.engine(ctx.name()) {
            Some(engine) => engine.new_component(ctx).map(Some),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        let names: Vec<String> = self.engines.iter().map(|e| e.name().to_string()).collect();
        format!("DefaultFactoryMachine{{priority={}, engines=[{}]}}", self.priority, names.join(", "))
    }
}

impl fmt::Debug for DefaultFactoryMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Machine building exactly one name.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::*;
/// use std::sync::Arc;
///
/// let port = Name::<u16>::of("port");
/// let addr = Name::<String>::of("addr");
/// let port_query = Query::by_name(&port);
///
/// let factory = Factory::builder()
///     .add_machine(SingletonFactoryMachine::of(0, port.clone(), 8080u16))
///     .add_machine(SingleNameFactoryMachine::from_fn(
///         0,
///         addr.clone(),
///         BoxKind::Boundless,
///         BillOfMaterials::new().with(port_query.clone()),
///         move |ctx| Ok(Arc::new(format!("0.0.0.0:{}", ctx.satisfied().one(&port_query)?))),
///     ))
///     .build()
///     .unwrap();
///
/// assert_eq!(*factory.require(&addr).unwrap(), "0.0.0.0:8080");
/// assert_eq!(factory.warehouse().list_dependencies(addr.erase()), vec![port.into_any()]);
/// ```
pub struct SingleNameFactoryMachine {
    priority: i32,
    engine: Box<dyn MachineEngine>,
}

impl SingleNameFactoryMachine {
    pub fn new(priority: i32, engine: impl MachineEngine + 'static) -> Self {
        Self {
            priority,
            engine: Box::new(engine),
        }
    }

    /// Shorthand for a [`StdMachineEngine`] machine.
    pub fn from_fn<T, F>(priority: i32, name: Name<T>, kind: BoxKind, bom: BillOfMaterials, build: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&BuildContext<'_>) -> FactoryResult<Arc<T>> + Send + Sync + 'static,
    {
        Self::new(priority, StdMachineEngine::new(name, kind, bom, build))
    }
}

impl FactoryMachine for SingleNameFactoryMachine {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_build(&self, name: &AnyName) -> bool {
        self.engine.name() == name
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        names_of_type(std::iter::once(self.engine.name()), component_type)
    }

    fn bill_of_materials(&self, _name: &AnyName) -> BillOfMaterials {
        self.engine.bill_of_materials()
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        if !self.can_build(ctx.name()) {
            return Ok(None);
        }
        self.engine.new_component(ctx).map(Some)
    }

    fn describe(&self) -> String {
        format!("SingleNameFactoryMachine{{priority={}, {}}}", self.priority, self.engine.describe())
    }
}
