//! Resolver traits for component lookup.

use crate::error::{FactoryError, FactoryResult};
use crate::name::{AnyComponent, AnyName, ComponentType, Name, NamedComponent};

/// Object-safe component resolution.
///
/// Implemented by [`Factory`](crate::Factory) and by
/// [`BuildContext`](crate::BuildContext), so machine build logic and
/// application code look components up the same way. Most callers use the
/// generic [`Resolver`] methods built on top of this trait.
pub trait ResolverCore: Send + Sync {
    /// Resolves one component by exact name. `Ok(None)` when nothing can build it.
    fn resolve_any(&self, name: &AnyName) -> FactoryResult<Option<AnyComponent>>;

    /// Resolves every component of the given type, deduplicated, in
    /// machine priority order then discovery order.
    fn resolve_all(&self, component_type: &ComponentType) -> FactoryResult<Vec<AnyComponent>>;
}

/// Typed resolution helpers.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::{Factory, Name, Resolver, SingletonFactoryMachine};
///
/// let factory = Factory::builder()
///     .add_machine(SingletonFactoryMachine::of(0, Name::<String>::of("greeting"), "hello".to_string()))
///     .build()
///     .unwrap();
///
/// let greeting = factory.get_component(&Name::<String>::of("greeting")).unwrap();
/// assert_eq!(greeting.as_deref().map(String::as_str), Some("hello"));
/// assert!(factory.get_component(&Name::<String>::of("missing")).unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a component by name; absence is not an error.
    fn get_named_component<T>(&self, name: &Name<T>) -> FactoryResult<Option<NamedComponent<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_any(name.erase())?
            .map(|c| c.downcast::<T>())
            .transpose()
    }

    /// Like [`get_named_component`](Self::get_named_component) without the name.
    fn get_component<T>(&self, name: &Name<T>) -> FactoryResult<Option<std::sync::Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Ok(self.get_named_component(name)?.map(NamedComponent::into_component))
    }

    /// Every component of type `T`, deduplicated and in discovery order.
    fn get_named_components<T>(&self) -> FactoryResult<Vec<NamedComponent<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_all(&ComponentType::of::<T>())?
            .iter()
            .map(AnyComponent::downcast::<T>)
            .collect()
    }

    fn get_components<T>(&self) -> FactoryResult<Vec<std::sync::Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Ok(self
            .get_named_components::<T>()?
            .into_iter()
            .map(NamedComponent::into_component)
            .collect())
    }

    /// The only component of type `T`.
    ///
    /// Zero candidates gives `Ok(None)`; more than one is an
    /// [`FactoryError::Ambiguous`] error naming all of them.
    fn find_unique<T>(&self) -> FactoryResult<Option<NamedComponent<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut found = self.get_named_components::<T>()?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            _ => Err(FactoryError::Ambiguous {
                query: format!("QueryByType{{{}}}", ComponentType::of::<T>()),
                candidates: found
                    .iter()
                    .map(|c| candidate_line(c.name().erase()))
                    .collect(),
            }),
        }
    }

    /// Mandatory lookup by name.
    fn require<T>(&self, name: &Name<T>) -> FactoryResult<std::sync::Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_component(name)?
            .ok_or_else(|| FactoryError::NotFound(name.to_string()))
    }

    /// Mandatory unique lookup by type.
    fn require_unique<T>(&self) -> FactoryResult<std::sync::Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.find_unique::<T>()?
            .map(NamedComponent::into_component)
            .ok_or_else(|| FactoryError::NotFound(ComponentType::of::<T>().to_string()))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

/// One line of an ambiguity report: the name and the key that deactivates it.
pub(crate) fn candidate_line(name: &AnyName) -> String {
    format!(
        " - {} ({}, deactivate with key '{}')",
        name.name(),
        name.component_type().type_name(),
        crate::activation::activation_key(name)
    )
}
