//! Component keys: typed names and named component values.
//!
//! A [`Name<T>`] identifies a component slot by its [`ComponentType`] and a
//! string. Machines and the warehouse work on the erased [`AnyName`]; callers
//! use the typed form so lookups come back already downcast.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{FactoryError, FactoryResult};

/// Type-erased shared instance. Holds an `Arc<T>` boxed in another `Arc` so
/// that unsized component types (`dyn Trait`) can be stored.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Marker used by [`ComponentType::any`].
struct AnyComponentType;

/// The type half of a component key.
///
/// Equality and hashing use only the `TypeId`; the type name is carried for
/// diagnostics. Matching is exact: a machine answers for the types it
/// declares, never for "assignable" ones.
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    type_name: &'static str,
}

impl ComponentType {
    /// The component type of `T`. `T` may be a trait object.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wildcard type, matched by every machine listing. Used for diagnostics.
    pub fn any() -> Self {
        Self {
            id: TypeId::of::<AnyComponentType>(),
            type_name: "*",
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether this is the [`ComponentType::any`] wildcard.
    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<AnyComponentType>()
    }

    /// `true` if `self` is the wildcard or the exact same type as `other`.
    ///
    /// ```rust
    /// use ferrous_factory::ComponentType;
    ///
    /// assert!(ComponentType::of::<String>().matches(&ComponentType::of::<String>()));
    /// assert!(ComponentType::any().matches(&ComponentType::of::<u32>()));
    /// assert!(!ComponentType::of::<u32>().matches(&ComponentType::of::<u64>()));
    /// ```
    pub fn matches(&self, other: &ComponentType) -> bool {
        self.is_any() || self.id == other.id
    }

    /// Type name without module paths, e.g. `Vec<String>` or `dyn Route`.
    pub fn simple_name(&self) -> String {
        simplify_type_name(self.type_name)
    }
}

fn simplify_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
        } else {
            out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    out
}

impl PartialEq for ComponentType {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl Hash for ComponentType {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.simple_name())
    }
}

/// Type-erased component key: `(type, name)`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AnyName {
    component_type: ComponentType,
    name: Arc<str>,
}

impl AnyName {
    pub fn new(component_type: ComponentType, name: impl Into<Arc<str>>) -> Self {
        Self {
            component_type,
            name: name.into(),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `[type]name`, the form used in logs and dumps.
    pub fn as_id(&self) -> String {
        format!("[{}]{}", self.component_type.type_name(), self.name)
    }

    /// Short form: `name` when it already is the simple type name, else `name[Type]`.
    pub fn simple_name(&self) -> String {
        let simple_type = self.component_type.simple_name();
        if *self.name == *simple_type {
            simple_type
        } else {
            format!("{}[{}]", self.name, simple_type)
        }
    }

    /// Typed view of this name, if the type matches.
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Name<T>> {
        if self.component_type == ComponentType::of::<T>() {
            Some(Name {
                inner: self.clone(),
                _marker: PhantomData,
            })
        } else {
            None
        }
    }
}

impl fmt::Debug for AnyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name{{name={}, type={}}}", self.name, self.component_type.type_name())
    }
}

impl fmt::Display for AnyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.component_type, self.name)
    }
}

/// Typed component key.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::Name;
///
/// let a = Name::<String>::of("db.url");
/// let b = Name::<String>::of("db.url");
/// let c = Name::<u32>::of("db.url");
///
/// assert_eq!(a, b);
/// assert_ne!(a.erase(), c.erase());
/// ```
pub struct Name<T: ?Sized> {
    inner: AnyName,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> Name<T> {
    pub fn of(name: impl Into<Arc<str>>) -> Self {
        Self {
            inner: AnyName::new(ComponentType::of::<T>(), name),
            _marker: PhantomData,
        }
    }

    /// Name derived from the unqualified type name.
    pub fn simple() -> Self {
        let ty = ComponentType::of::<T>();
        Self {
            inner: AnyName::new(ty, ty.simple_name()),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn component_type(&self) -> ComponentType {
        self.inner.component_type()
    }

    /// Borrow the erased key.
    pub fn erase(&self) -> &AnyName {
        &self.inner
    }

    pub fn into_any(self) -> AnyName {
        self.inner
    }
}

impl<T: ?Sized> Clone for Name<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> PartialEq for Name<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: ?Sized> Eq for Name<T> {}

impl<T: ?Sized> Hash for Name<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl<T: ?Sized> fmt::Display for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl<T: ?Sized> From<Name<T>> for AnyName {
    fn from(name: Name<T>) -> Self {
        name.inner
    }
}

/// A built component together with its name.
///
/// `priority` orders components returned by multi-valued queries where the
/// consumer cares, e.g. configuration suppliers; it defaults to 0.
pub struct NamedComponent<T: ?Sized> {
    name: Name<T>,
    component: Arc<T>,
    priority: i32,
}

impl<T: ?Sized + Send + Sync + 'static> NamedComponent<T> {
    pub fn new(name: Name<T>, component: Arc<T>) -> Self {
        Self::with_priority(name, component, 0)
    }

    pub fn with_priority(name: Name<T>, component: Arc<T>, priority: i32) -> Self {
        Self {
            name,
            component,
            priority,
        }
    }

    pub fn name(&self) -> &Name<T> {
        &self.name
    }

    pub fn component(&self) -> &Arc<T> {
        &self.component
    }

    pub fn into_component(self) -> Arc<T> {
        self.component
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Erase the component type.
    pub fn into_any(self) -> AnyComponent {
        AnyComponent {
            name: self.name.into_any(),
            instance: Arc::new(self.component),
            priority: self.priority,
        }
    }
}

impl<T: ?Sized> Clone for NamedComponent<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            component: self.component.clone(),
            priority: self.priority,
        }
    }
}

impl<T: ?Sized> fmt::Debug for NamedComponent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedComponent")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Type-erased [`NamedComponent`], the currency of boxes and the warehouse.
#[derive(Clone)]
pub struct AnyComponent {
    name: AnyName,
    instance: AnyArc,
    priority: i32,
}

impl AnyComponent {
    pub fn name(&self) -> &AnyName {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Identity of the underlying instance, for pointer-equality checks.
    pub fn instance_ptr(&self) -> *const () {
        Arc::as_ptr(&self.instance) as *const ()
    }

    /// Recover the typed component.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> FactoryResult<NamedComponent<T>> {
        let name = self.name.downcast::<T>().ok_or_else(|| self.type_mismatch::<T>())?;
        let component = self
            .instance
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| self.type_mismatch::<T>())?;
        Ok(NamedComponent {
            name,
            component,
            priority: self.priority,
        })
    }

    fn type_mismatch<T: ?Sized + 'static>(&self) -> FactoryError {
        FactoryError::TypeMismatch {
            name: self.name.to_string(),
            expected: std::any::type_name::<T>(),
        }
    }
}

impl fmt::Debug for AnyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyComponent")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Route: Send + Sync {
        fn path(&self) -> &str;
    }

    struct Health;
    impl Route for Health {
        fn path(&self) -> &str {
            "/health"
        }
    }

    #[test]
    fn simple_names_strip_module_paths() {
        assert_eq!(ComponentType::of::<String>().simple_name(), "String");
        assert_eq!(ComponentType::of::<Vec<String>>().simple_name(), "Vec<String>");
        assert_eq!(ComponentType::of::<dyn Route>().simple_name(), "dyn Route");
    }

    #[test]
    fn simple_name_skips_redundant_type() {
        assert_eq!(Name::<String>::simple().erase().simple_name(), "String");
        assert_eq!(Name::<String>::of("url").erase().simple_name(), "url[String]");
    }

    #[test]
    fn trait_objects_round_trip_through_erasure() {
        let route: Arc<dyn Route> = Arc::new(Health);
        let nc = NamedComponent::new(Name::<dyn Route>::of("health"), route);
        let erased = nc.into_any();
        let back = erased.downcast::<dyn Route>().unwrap();
        assert_eq!(back.component().path(), "/health");
        assert!(matches!(
            erased.downcast::<String>(),
            Err(FactoryError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn erased_name_keeps_type_in_equality() {
        let s = Name::<String>::of("x").into_any();
        let n = Name::<u32>::of("x").into_any();
        assert_ne!(s, n);
        assert!(s.downcast::<String>().is_some());
        assert!(s.downcast::<u32>().is_none());
    }
}
