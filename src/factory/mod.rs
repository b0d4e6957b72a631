//! The factory: composition root and resolution engine.
//!
//! A [`Factory`] holds an immutable, priority-sorted list of machines and
//! one [`Warehouse`]. Resolving a name reads the warehouse first; on a miss
//! the factory takes its build lock, asks the machines in priority order,
//! satisfies the winner's bill of materials (recursively, through the same
//! factory), applies customizers and checks the result in.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ahash::AHashSet;
use parking_lot::ReentrantMutex;

use crate::activation::{activation_name, is_activation_key};
use crate::component_box::ComponentBox;
use crate::customizer::{ComponentCustomizer, ComponentCustomizerEngine};
use crate::error::{FactoryError, FactoryResult};
use crate::internal::{ChainGuard, ResolutionChain};
use crate::machine::{FactoryMachine, MachineRef};
use crate::name::{AnyComponent, AnyName, ComponentType, Name};
use crate::observer::Observers;
use crate::query::{AnyQuery, BillOfMaterials, Query, QuerySelector, SatisfiedBom};
use crate::traits::{AutoStartable, Resolver, ResolverCore};
use crate::warehouse::Warehouse;

mod bound_query;
mod builder;
mod context;

pub use bound_query::BoundQuery;
pub use builder::FactoryBuilder;
pub use context::BuildContext;

static FACTORY_ID: AtomicUsize = AtomicUsize::new(0);

/// A machine together with where it came from, for dumps.
#[derive(Clone)]
pub(crate) struct RegisteredMachine {
    pub(crate) source: String,
    pub(crate) machine: MachineRef,
}

/// Component factory.
///
/// Cloning is cheap and clones share machines, warehouse and build lock.
///
/// # Build lock
///
/// Every build, including its whole recursive dependency chain, runs under
/// one reentrant mutex per factory: builds on a factory are serialized and
/// each name is built at most once. The lock is a bootstrap-time
/// serialization point. Already built components are read from the
/// warehouse without it, and it must never be used to guard request-path
/// logic.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::{Factory, Name, Resolver, SingletonFactoryMachine};
///
/// let x = Name::<String>::of("X");
/// let factory = Factory::builder()
///     .add_machine(SingletonFactoryMachine::of(10, x.clone(), "b".to_string()))
///     .add_machine(SingletonFactoryMachine::of(0, x.clone(), "a".to_string()))
///     .build()
///     .unwrap();
///
/// // lowest priority value wins
/// assert_eq!(*factory.require(&x).unwrap(), "a");
/// ```
#[derive(Clone)]
pub struct Factory {
    inner: Arc<FactoryInner>,
}

pub(crate) struct FactoryInner {
    id: String,
    machines: Vec<RegisteredMachine>,
    customizer_engines: Vec<Arc<dyn ComponentCustomizerEngine>>,
    warehouse: Arc<Warehouse>,
    build_lock: ReentrantMutex<RefCell<ResolutionChain>>,
    observers: Observers,
    closed: AtomicBool,
    // builder rounds whose warehouses hold adopted machines, engines and
    // their dependencies
    bootstrap: Vec<Factory>,
}

impl Factory {
    pub fn builder() -> FactoryBuilder {
        FactoryBuilder::new()
    }

    pub(crate) fn assemble(
        mut machines: Vec<RegisteredMachine>,
        customizer_engines: Vec<Arc<dyn ComponentCustomizerEngine>>,
        warehouse: Warehouse,
        observers: Observers,
        bootstrap: Vec<Factory>,
    ) -> Self {
        // stable: equal priorities keep registration order
        machines.sort_by_key(|m| m.machine.priority());
        let id = format!(
            "{:03}({})",
            FACTORY_ID.fetch_add(1, Ordering::Relaxed) + 1,
            machines.len()
        );
        tracing::debug!(factory = %id, machines = machines.len(), "factory assembled");
        Self {
            inner: Arc::new(FactoryInner {
                id,
                machines,
                customizer_engines,
                warehouse: Arc::new(warehouse),
                build_lock: ReentrantMutex::new(RefCell::new(ResolutionChain::default())),
                observers,
                closed: AtomicBool::new(false),
                bootstrap,
            }),
        }
    }

    /// Identifier: a sequence number and the machine count, e.g. `007(12)`.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn machine_count(&self) -> usize {
        self.inner.machines.len()
    }

    /// Machines in priority order.
    pub fn machines(&self) -> impl Iterator<Item = &MachineRef> {
        self.inner.machines.iter().map(|m| &m.machine)
    }

    pub fn warehouse(&self) -> &Arc<Warehouse> {
        &self.inner.warehouse
    }

    /// A new factory with the same machines plus `machine`, and a fresh
    /// warehouse over the same providers.
    pub fn concat(&self, machine: impl FactoryMachine + 'static) -> Factory {
        let mut machines = self.inner.machines.clone();
        machines.push(RegisteredMachine {
            source: "IndividualMachines".to_string(),
            machine: Arc::new(machine),
        });
        Factory::assemble(
            machines,
            self.inner.customizer_engines.clone(),
            Warehouse::with_providers(self.inner.warehouse.providers().to_vec()),
            self.inner.observers.clone(),
            self.inner.bootstrap.clone(),
        )
    }

    /// Query bound to this factory, selecting one name.
    pub fn query_by_name<T: ?Sized + Send + Sync + 'static>(&self, name: &Name<T>) -> BoundQuery<'_, T> {
        BoundQuery::new(self, Query::by_name(name))
    }

    /// Query bound to this factory, selecting every component of type `T`.
    pub fn query_by_type<T: ?Sized + Send + Sync + 'static>(&self) -> BoundQuery<'_, T> {
        BoundQuery::new(self, Query::by_type())
    }

    /// Components matched by an erased query. Mandatory queries with no
    /// match are an [`FactoryError::Unsatisfied`] error.
    pub fn find(&self, query: &AnyQuery) -> FactoryResult<Vec<AnyComponent>> {
        let found = match query.selector() {
            QuerySelector::ByName(name) => self.resolve_any(name)?.into_iter().collect(),
            QuerySelector::ByType(ty) => self.resolve_all(ty)?,
        };
        if query.is_mandatory() && found.is_empty() {
            return Err(self.unsatisfied(query, None));
        }
        Ok(found)
    }

    /// Every name of `component_type` some machine can build, in priority
    /// then listing order. Nothing is built.
    pub fn buildable_names(&self, component_type: &ComponentType) -> Vec<AnyName> {
        let mut seen = AHashSet::new();
        let mut names = Vec::new();
        for m in &self.inner.machines {
            for name in m.machine.name_buildable_components(component_type) {
                if component_type.matches(&name.component_type()) && seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Starts every `dyn AutoStartable` component, in discovery order.
    pub fn start(&self) -> FactoryResult<()> {
        for startable in self.get_named_components::<dyn AutoStartable>()? {
            tracing::info!(factory = %self.inner.id, name = %startable.name(), "starting");
            startable.component().start()?;
        }
        Ok(())
    }

    /// Closes the warehouse, releasing every component this factory built,
    /// then the warehouses of the builder rounds that produced its adopted
    /// machines and customizer engines. Later calls are no-ops.
    ///
    /// Every warehouse is closed even if some fail; failures are reported
    /// together.
    pub fn close(&self) -> FactoryResult<()> {
        let mut failures = Vec::new();
        let outcomes = std::iter::once(self.inner.close())
            .chain(self.inner.bootstrap.iter().rev().map(|round| round.close()));
        for outcome in outcomes {
            match outcome {
                Ok(()) => {}
                Err(FactoryError::Close(f)) => failures.extend(f),
                Err(e) => failures.push(e.to_string()),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(FactoryError::Close(failures))
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Checks, without building anything, that `name` has a machine and
    /// that every mandatory query of its bill of materials can be met,
    /// transitively.
    pub fn check_satisfy(&self, name: &AnyName) -> FactoryResult<()> {
        let mut visited = AHashSet::new();
        self.check_satisfy_name(name, &mut visited)
    }

    fn check_satisfy_name(&self, name: &AnyName, visited: &mut AHashSet<AnyName>) -> FactoryResult<()> {
        if !visited.insert(name.clone()) || self.inner.warehouse.contains(name) {
            return Ok(());
        }
        let machine = self.machine_for(name).ok_or_else(|| FactoryError::Unsatisfied {
            query: format!("QueryByName{{{}}}", name),
            required_by: None,
            similar: self.similar_names(name.component_type(), Some(name)),
        })?;
        for query in machine.bill_of_materials(name).queries() {
            self.check_satisfy_query(query, visited).map_err(|e| match e {
                FactoryError::Unsatisfied { query, required_by: None, similar } => FactoryError::Unsatisfied {
                    query,
                    required_by: Some(name.to_string()),
                    similar,
                },
                other => other,
            })?;
        }
        Ok(())
    }

    pub(crate) fn check_satisfy_query(&self, query: &AnyQuery, visited: &mut AHashSet<AnyName>) -> FactoryResult<()> {
        if !query.is_mandatory() {
            return Ok(());
        }
        let names = match query.selector() {
            QuerySelector::ByName(name) => vec![name.clone()],
            QuerySelector::ByType(ty) => self.buildable_names(ty),
        };
        if names.is_empty() {
            return Err(self.unsatisfied(query, None));
        }
        for name in &names {
            self.check_satisfy_name(name, visited)?;
        }
        Ok(())
    }

    fn machine_for(&self, name: &AnyName) -> Option<&MachineRef> {
        self.inner
            .machines
            .iter()
            .map(|m| &m.machine)
            .find(|m| m.can_build(name))
    }

    fn unsatisfied(&self, query: &AnyQuery, required_by: Option<&AnyName>) -> FactoryError {
        let exact = match query.selector() {
            QuerySelector::ByName(name) => Some(name),
            QuerySelector::ByType(_) => None,
        };
        FactoryError::Unsatisfied {
            query: query.to_string(),
            required_by: required_by.map(ToString::to_string),
            similar: self.similar_names(query.component_type(), exact),
        }
    }

    fn similar_names(&self, component_type: ComponentType, exclude: Option<&AnyName>) -> Vec<String> {
        self.buildable_names(&component_type)
            .into_iter()
            .filter(|n| Some(n) != exclude)
            .map(|n| n.to_string())
            .collect()
    }

    /// `false` when the activation key of `name` resolves to `"false"`.
    fn is_active(&self, name: &AnyName) -> FactoryResult<bool> {
        if is_activation_key(name) {
            return Ok(true);
        }
        let key = activation_name(name);
        match self.resolve_any(key.erase())? {
            Some(value) => Ok(!value.downcast::<String>()?.component().eq_ignore_ascii_case("false")),
            None => Ok(true),
        }
    }

    fn build_and_store(
        &self,
        chain: &RefCell<ResolutionChain>,
        name: &AnyName,
        machine: &MachineRef,
    ) -> FactoryResult<Option<AnyComponent>> {
        let _entry = ChainGuard::enter(chain, name)?;

        let bom = machine.bill_of_materials(name);
        let satisfied = self.satisfy(name, bom)?;

        let description = machine.describe();
        let depth = chain.borrow().depth();
        tracing::info!(factory = %self.inner.id, name = %name, machine = %description, depth, "building");
        self.inner.observers.building(name, &description);

        let ctx = BuildContext::new(self, name, &satisfied);
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| machine.new_component(&ctx)));
        let duration = started.elapsed();

        let component_box = match outcome {
            Ok(Ok(Some(b))) => b,
            Ok(Ok(None)) => return Ok(None),
            Ok(Err(e)) => return Err(self.fail(name, wrap_machine_error(name, e))),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                return Err(self.fail(name, FactoryError::build_failed(name.to_string(), format!("panicked: {}", message))));
            }
        };
        if component_box.name() != name {
            return Err(self.fail(
                name,
                FactoryError::NameMismatch {
                    expected: name.to_string(),
                    actual: component_box.name().to_string(),
                },
            ));
        }
        let lookups = ctx.into_lookups();

        let component_box = self
            .customize(name, component_box)
            .map_err(|e| self.fail(name, e))?;
        self.inner
            .warehouse
            .check_in(component_box, satisfied.with_extra_dependencies(lookups), duration);
        self.inner.observers.built(name, duration);

        Ok(self.inner.warehouse.check_out(name))
    }

    fn fail(&self, name: &AnyName, error: FactoryError) -> FactoryError {
        tracing::warn!(factory = %self.inner.id, name = %name, error = %error, "build failed");
        self.inner.observers.build_failed(name, &error);
        error
    }

    fn satisfy(&self, name: &AnyName, bom: BillOfMaterials) -> FactoryResult<SatisfiedBom> {
        let mut materials = Vec::with_capacity(bom.queries().len());
        for query in bom.queries() {
            let found = match query.selector() {
                QuerySelector::ByName(n) => self.resolve_any(n)?.into_iter().collect(),
                QuerySelector::ByType(ty) => self.resolve_all(ty)?,
            };
            if query.is_mandatory() && found.is_empty() {
                return Err(self.unsatisfied(query, Some(name)));
            }
            materials.push((query.clone(), found));
        }
        Ok(SatisfiedBom::new(bom, materials))
    }

    fn customize(&self, name: &AnyName, mut component_box: Box<dyn ComponentBox>) -> FactoryResult<Box<dyn ComponentBox>> {
        let mut customizers: Vec<Arc<dyn ComponentCustomizer>> = self
            .inner
            .customizer_engines
            .iter()
            .filter(|e| e.can_customize(name))
            .map(|e| e.customizer(name))
            .collect();
        customizers.sort_by_key(|c| c.priority());

        for customizer in customizers {
            tracing::info!(factory = %self.inner.id, name = %name, customizer = %customizer.describe(), "customizing");
            component_box = component_box.customize(customizer.as_ref())?;
            if component_box.name() != name {
                return Err(FactoryError::NameMismatch {
                    expected: name.to_string(),
                    actual: component_box.name().to_string(),
                });
            }
        }
        Ok(component_box)
    }

    /// Diagnostic listing of machines, buildable components and warehouse content.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--------------------------------------");
        let _ = writeln!(out, "             Factory {}", self.inner.id);
        let _ = writeln!(out, "--------------------------------------");

        let _ = writeln!(out, "= MACHINES IN PRIORITY ORDER =");
        for m in &self.inner.machines {
            let _ = writeln!(out, "  {:>6}: {}", m.machine.priority(), m.machine.describe());
        }

        let _ = writeln!(out, "= MACHINES BY SOURCE =");
        let mut sources: Vec<&str> = Vec::new();
        for m in &self.inner.machines {
            if !sources.contains(&m.source.as_str()) {
                sources.push(&m.source);
            }
        }
        for source in sources {
            let _ = writeln!(out, "  {}:", source);
            for m in self.inner.machines.iter().filter(|m| m.source == source) {
                let _ = writeln!(out, "     {}", m.machine.describe());
            }
        }

        let _ = writeln!(out, "= BUILDABLE COMPONENTS =");
        for name in self.buildable_names(&ComponentType::any()) {
            let _ = writeln!(out, "  {}", name);
            let able: Vec<&MachineRef> = self.machines().filter(|m| m.can_build(&name)).collect();
            let Some((winner, overridden)) = able.split_first() else {
                let _ = writeln!(
                    out,
                    "      !! a machine lists this name in name_buildable_components() but can_build() rejects it"
                );
                continue;
            };
            let _ = writeln!(out, "      BUILD BY: {}", winner.describe());
            if !overridden.is_empty() {
                let _ = writeln!(out, "      OVERRIDING:");
                for m in overridden {
                    let _ = writeln!(out, "         {}", m.describe());
                }
            }
            let bom = winner.bill_of_materials(&name);
            if !bom.is_empty() {
                let _ = writeln!(out, "      BOM:");
                for query in bom.queries() {
                    let _ = writeln!(out, "        - {:?}", query);
                    match self.check_satisfy_query(query, &mut AHashSet::new()) {
                        Ok(()) => {
                            let names = match query.selector() {
                                QuerySelector::ByName(n) => vec![n.clone()],
                                QuerySelector::ByType(ty) => self.buildable_names(ty),
                            };
                            for n in names {
                                let _ = writeln!(out, "          -> {}", n);
                            }
                        }
                        Err(e) => {
                            let _ = writeln!(out, "          ERROR: CAN'T BE SATISFIED: {}", e);
                        }
                    }
                }
            }
        }

        let _ = writeln!(out, "= WAREHOUSE {} =", self.inner.warehouse.id());
        out.push_str(&self.inner.warehouse.dump());
        for round in &self.inner.bootstrap {
            let _ = writeln!(out, "= BOOTSTRAP WAREHOUSE {} =", round.warehouse().id());
            out.push_str(&round.warehouse().dump());
        }
        let _ = writeln!(out, "--------------------------------------");
        out
    }
}

impl ResolverCore for Factory {
    fn resolve_any(&self, name: &AnyName) -> FactoryResult<Option<AnyComponent>> {
        let warehouse = &self.inner.warehouse;
        if warehouse.contains(name) {
            tracing::debug!(factory = %self.inner.id, name = %name, "warehouse hit");
            return Ok(warehouse.check_out(name));
        }

        let chain = self.inner.build_lock.lock();
        // another thread may have built it while we waited
        if warehouse.contains(name) {
            return Ok(warehouse.check_out(name));
        }
        if !self.is_active(name)? {
            tracing::debug!(factory = %self.inner.id, name = %name, "deactivated");
            return Ok(None);
        }
        for m in &self.inner.machines {
            if m.machine.can_build(name) {
                if let Some(component) = self.build_and_store(&chain, name, &m.machine)? {
                    return Ok(Some(component));
                }
            }
        }
        Ok(None)
    }

    fn resolve_all(&self, component_type: &ComponentType) -> FactoryResult<Vec<AnyComponent>> {
        let _chain = self.inner.build_lock.lock();
        let mut claimed = AHashSet::new();
        let mut found = Vec::new();
        for m in &self.inner.machines {
            for name in m.machine.name_buildable_components(component_type) {
                if !component_type.matches(&name.component_type()) || !claimed.insert(name.clone()) {
                    continue;
                }
                if let Some(component) = self.resolve_any(&name)? {
                    found.push(component);
                }
            }
        }
        Ok(found)
    }
}

impl FactoryInner {
    fn close(&self) -> FactoryResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!(factory = %self.id, "closing factory");
        self.warehouse.close()
    }
}

// Bootstrap rounds may be shared with concatenated factories; they close
// when their own last handle drops.
impl Drop for FactoryInner {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(factory = %self.id, error = %e, "errors while closing dropped factory");
        }
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("id", &self.inner.id)
            .field("machines", &self.inner.machines.len())
            .field("warehouse", &self.inner.warehouse)
            .finish()
    }
}

/// Machine errors carrying only a message get the component name attached.
fn wrap_machine_error(name: &AnyName, error: FactoryError) -> FactoryError {
    match error {
        FactoryError::Other(message) => FactoryError::BuildFailed {
            name: name.to_string(),
            message,
        },
        other => other,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
