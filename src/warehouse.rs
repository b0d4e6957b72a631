//! The memoizing component cache.
//!
//! A [`Warehouse`] stores one box per name, together with the satisfied
//! bill of materials it was built from and how long the build took. It
//! never builds anything itself; the [`Factory`](crate::Factory) checks
//! boxes in after building them.
//!
//! Provider warehouses are read-only parents: their components are visible
//! through `check_out` and the listing methods, but they are neither owned
//! nor closed by this warehouse. A [`Warehouse::filtered`] view hides some
//! of a provider's components from a child factory.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;

use crate::component_box::ComponentBox;
use crate::error::{FactoryError, FactoryResult};
use crate::name::{AnyComponent, AnyName, ComponentType};
use crate::query::SatisfiedBom;

static WAREHOUSE_ID: AtomicUsize = AtomicUsize::new(0);

/// A checked-in box with its build record.
pub struct StoredBox {
    component_box: Box<dyn ComponentBox>,
    satisfied: SatisfiedBom,
    build_duration: Duration,
}

impl StoredBox {
    pub fn component_box(&self) -> &dyn ComponentBox {
        self.component_box.as_ref()
    }

    pub fn satisfied_bom(&self) -> &SatisfiedBom {
        &self.satisfied
    }

    pub fn build_duration(&self) -> Duration {
        self.build_duration
    }
}

/// Build record of a stored component, detached from the warehouse lock.
#[derive(Debug, Clone)]
pub struct StoredBoxInfo {
    pub name: AnyName,
    pub dependencies: Vec<AnyName>,
    pub build_duration: Duration,
    pub description: String,
}

/// Types and names a [`Warehouse::filtered`] view treats as absent.
#[derive(Debug, Clone, Default)]
pub struct WarehouseFilter {
    types: AHashSet<ComponentType>,
    names: AHashSet<AnyName>,
}

impl WarehouseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hides every component of the given types.
    pub fn for_types(types: impl IntoIterator<Item = ComponentType>) -> Self {
        Self {
            types: types.into_iter().collect(),
            names: AHashSet::new(),
        }
    }

    /// Hides exactly the given names.
    pub fn for_names(names: impl IntoIterator<Item = AnyName>) -> Self {
        Self {
            types: AHashSet::new(),
            names: names.into_iter().collect(),
        }
    }

    pub fn hide_type(mut self, component_type: ComponentType) -> Self {
        self.types.insert(component_type);
        self
    }

    pub fn hide_name(mut self, name: impl Into<AnyName>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn hides(&self, name: &AnyName) -> bool {
        self.names.contains(name) || self.types.contains(&name.component_type())
    }
}

#[derive(Default)]
struct Entries {
    boxes: AHashMap<AnyName, StoredBox>,
    // check-in order, used for listing and reverse-order close
    order: Vec<AnyName>,
}

/// Memoizing cache of built component boxes.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::{BoxKind, Name, NamedComponent, SatisfiedBom, Warehouse};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let warehouse = Warehouse::new();
/// let name = Name::<u32>::of("answer");
/// warehouse.check_in(
///     BoxKind::Boundless.wrap(NamedComponent::new(name.clone(), Arc::new(42u32))),
///     SatisfiedBom::empty(),
///     Duration::from_millis(1),
/// );
///
/// let picked = warehouse.check_out(name.erase()).unwrap().downcast::<u32>().unwrap();
/// assert_eq!(**picked.component(), 42);
/// assert_eq!(warehouse.list_names(), vec![name.into_any()]);
/// ```
pub struct Warehouse {
    id: String,
    entries: RwLock<Entries>,
    providers: Vec<Arc<Warehouse>>,
    // applies to provider lookups only
    filter: Option<WarehouseFilter>,
}

impl Warehouse {
    pub fn new() -> Self {
        Self::with_providers(Vec::new())
    }

    pub fn with_providers(providers: Vec<Arc<Warehouse>>) -> Self {
        Self {
            id: format!("{:03}", WAREHOUSE_ID.fetch_add(1, Ordering::Relaxed) + 1),
            entries: RwLock::new(Entries::default()),
            providers,
            filter: None,
        }
    }

    /// A view of `original` in which the components matched by `filter`
    /// look absent to `check_out`, `contains`, the listings and
    /// `stored_box_info`. Meant to be handed to a child factory as a
    /// provider, so the child builds its own instances of what is hidden.
    ///
    /// The view shares `original`'s id and owns nothing; closing it leaves
    /// `original` untouched.
    ///
    /// ```rust
    /// use ferrous_factory::{BoxKind, ComponentType, Name, NamedComponent, SatisfiedBom, Warehouse, WarehouseFilter};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let main = Arc::new(Warehouse::new());
    /// let port = Name::<u16>::of("port");
    /// main.check_in(
    ///     BoxKind::Boundless.wrap(NamedComponent::new(port.clone(), Arc::new(8080u16))),
    ///     SatisfiedBom::empty(),
    ///     Duration::ZERO,
    /// );
    ///
    /// let view = Warehouse::filtered(main.clone(), WarehouseFilter::for_types([ComponentType::of::<u16>()]));
    /// assert!(view.check_out(port.erase()).is_none());
    /// assert!(main.check_out(port.erase()).is_some());
    /// ```
    pub fn filtered(original: Arc<Warehouse>, filter: WarehouseFilter) -> Self {
        Self {
            id: original.id.clone(),
            entries: RwLock::new(Entries::default()),
            providers: vec![original],
            filter: Some(filter),
        }
    }

    fn hides(&self, name: &AnyName) -> bool {
        self.filter.as_ref().is_some_and(|f| f.hides(name))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn providers(&self) -> &[Arc<Warehouse>] {
        &self.providers
    }

    /// Stores `component_box` under its own name.
    ///
    /// Last write wins; a replaced box is closed, and a failure to close it
    /// is logged rather than returned.
    pub fn check_in(&self, component_box: Box<dyn ComponentBox>, satisfied: SatisfiedBom, build_duration: Duration) {
        let name = component_box.name().clone();
        let previous = {
            let mut entries = self.entries.write();
            let previous = entries.boxes.insert(
                name.clone(),
                StoredBox {
                    component_box,
                    satisfied,
                    build_duration,
                },
            );
            if previous.is_none() {
                entries.order.push(name.clone());
            }
            previous
        };

        if let Some(previous) = previous {
            tracing::debug!(warehouse = %self.id, name = %name, "replacing stored component");
            if let Err(e) = previous.component_box.close() {
                tracing::warn!(warehouse = %self.id, name = %name, error = %e, "failed to close replaced component");
            }
        }
    }

    /// Picks the component stored under `name`.
    ///
    /// Falls back to provider warehouses only when this warehouse has no
    /// entry for `name`; an exhausted disposable box yields `None`.
    pub fn check_out(&self, name: &AnyName) -> Option<AnyComponent> {
        {
            let entries = self.entries.read();
            if let Some(stored) = entries.boxes.get(name) {
                return stored.component_box.pick();
            }
        }
        if self.hides(name) {
            return None;
        }
        self.providers.iter().find_map(|p| p.check_out(name))
    }

    /// Whether this warehouse or one of its providers has an entry for `name`.
    pub fn contains(&self, name: &AnyName) -> bool {
        self.contains_own(name) || (!self.hides(name) && self.providers.iter().any(|p| p.contains(name)))
    }

    /// Whether this warehouse itself has an entry for `name`.
    pub fn contains_own(&self, name: &AnyName) -> bool {
        self.entries.read().boxes.contains_key(name)
    }

    /// Every stored name: own entries in check-in order, then providers'.
    pub fn list_names(&self) -> Vec<AnyName> {
        let mut names = self.entries.read().order.clone();
        for provider in &self.providers {
            for name in provider.list_names() {
                if !self.hides(&name) && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Names recorded as dependencies of `name` when it was built.
    pub fn list_dependencies(&self, name: &AnyName) -> Vec<AnyName> {
        {
            let entries = self.entries.read();
            if let Some(stored) = entries.boxes.get(name) {
                return stored.satisfied.dependency_names();
            }
        }
        if self.hides(name) {
            return Vec::new();
        }
        self.providers
            .iter()
            .find(|p| p.contains(name))
            .map(|p| p.list_dependencies(name))
            .unwrap_or_default()
    }

    /// Build record of `name`, looking into providers when not stored here.
    pub fn stored_box_info(&self, name: &AnyName) -> Option<StoredBoxInfo> {
        {
            let entries = self.entries.read();
            if let Some(stored) = entries.boxes.get(name) {
                return Some(StoredBoxInfo {
                    name: name.clone(),
                    dependencies: stored.satisfied.dependency_names(),
                    build_duration: stored.build_duration,
                    description: stored.component_box.describe(),
                });
            }
        }
        if self.hides(name) {
            return None;
        }
        self.providers.iter().find_map(|p| p.stored_box_info(name))
    }

    /// Runs `f` on the stored box of `name`, if stored here.
    pub fn with_stored_box<R>(&self, name: &AnyName, f: impl FnOnce(&StoredBox) -> R) -> Option<R> {
        let entries = self.entries.read();
        entries.boxes.get(name).map(f)
    }

    /// Number of boxes stored here, providers excluded.
    pub fn len(&self) -> usize {
        self.entries.read().boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes and removes every box owned by this warehouse, most recently
    /// checked in first. Providers are left untouched.
    ///
    /// Every box is closed even if some fail; failures are reported together.
    pub fn close(&self) -> FactoryResult<()> {
        let drained: Vec<StoredBox> = {
            let mut entries = self.entries.write();
            let order = std::mem::take(&mut entries.order);
            let mut boxes = std::mem::take(&mut entries.boxes);
            order.iter().rev().filter_map(|name| boxes.remove(name)).collect()
        };

        let mut failures = Vec::new();
        for stored in drained {
            if let Err(e) = stored.component_box.close() {
                tracing::warn!(warehouse = %self.id, name = %stored.component_box.name(), error = %e, "failed to close component");
                failures.push(format!("{}: {}", stored.component_box.name(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FactoryError::Close(failures))
        }
    }

    /// Human readable listing of stored boxes with dependencies and build times.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let entries = self.entries.read();
        for name in &entries.order {
            if let Some(stored) = entries.boxes.get(name) {
                let _ = writeln!(
                    out,
                    "  {} [built in {:.3} ms]",
                    name,
                    stored.build_duration.as_secs_f64() * 1000.0
                );
                for dep in stored.satisfied.dependency_names() {
                    let _ = writeln!(out, "     -> {}", dep);
                }
            }
        }
        for provider in &self.providers {
            let _ = writeln!(out, "  provider {}:", provider.id());
            if self.filter.is_some() {
                for name in provider.list_names().iter().filter(|n| !self.hides(n)) {
                    let _ = writeln!(out, "  {}", name);
                }
            } else {
                out.push_str(&provider.dump());
            }
        }
        out
    }
}

impl Default for Warehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warehouse")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("providers", &self.providers.len())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}
