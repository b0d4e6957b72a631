//! Post-build customization of components.
//!
//! A [`ComponentCustomizerEngine`] decides which names it customizes and
//! hands out a [`ComponentCustomizer`] for each. The factory applies every
//! matching customizer, in priority order, right after a machine built a
//! box and before the box is checked into the warehouse.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::FactoryResult;
use crate::name::{AnyComponent, AnyName, ComponentType, Name, NamedComponent};

/// Transforms a freshly built component.
pub trait ComponentCustomizer: Send + Sync {
    /// Lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Return the customized component. It must keep the same name and type.
    fn customize(&self, component: AnyComponent) -> FactoryResult<AnyComponent>;

    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Source of customizers, matched against component names.
pub trait ComponentCustomizerEngine: Send + Sync {
    fn can_customize(&self, name: &AnyName) -> bool;

    fn customizer(&self, name: &AnyName) -> Arc<dyn ComponentCustomizer>;
}

type CustomizeFn<T> = dyn Fn(NamedComponent<T>) -> FactoryResult<NamedComponent<T>> + Send + Sync;

/// Typed customizer backed by a closure.
///
/// Acts as its own engine, matching either one exact name or every
/// component of type `T`.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::{Factory, Name, NamedComponent, Resolver, SingletonFactoryMachine, TypedCustomizer};
/// use std::sync::Arc;
///
/// let factory = Factory::builder()
///     .add_machine(SingletonFactoryMachine::of(0, Name::<String>::of("greeting"), "hello".to_string()))
///     .add_customizer_engine(TypedCustomizer::for_name(Name::<String>::of("greeting"), 0, |c| {
///         let shouted = c.component().to_uppercase();
///         Ok(NamedComponent::new(c.name().clone(), Arc::new(shouted)))
///     }))
///     .build()
///     .unwrap();
///
/// let greeting = factory.require(&Name::<String>::of("greeting")).unwrap();
/// assert_eq!(greeting.as_str(), "HELLO");
/// ```
pub struct TypedCustomizer<T: ?Sized> {
    target: Target,
    priority: i32,
    f: Arc<CustomizeFn<T>>,
    _marker: PhantomData<fn() -> Box<T>>,
}

enum Target {
    Name(AnyName),
    Type(ComponentType),
}

impl<T: ?Sized + Send + Sync + 'static> TypedCustomizer<T> {
    /// Customizes the component with exactly this name.
    pub fn for_name<F>(name: Name<T>, priority: i32, f: F) -> Self
    where
        F: Fn(NamedComponent<T>) -> FactoryResult<NamedComponent<T>> + Send + Sync + 'static,
    {
        Self {
            target: Target::Name(name.into_any()),
            priority,
            f: Arc::new(f),
            _marker: PhantomData,
        }
    }

    /// Customizes every component of type `T`.
    pub fn for_type<F>(priority: i32, f: F) -> Self
    where
        F: Fn(NamedComponent<T>) -> FactoryResult<NamedComponent<T>> + Send + Sync + 'static,
    {
        Self {
            target: Target::Type(ComponentType::of::<T>()),
            priority,
            f: Arc::new(f),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> ComponentCustomizerEngine for TypedCustomizer<T> {
    fn can_customize(&self, name: &AnyName) -> bool {
        match &self.target {
            Target::Name(n) => n == name,
            Target::Type(t) => *t == name.component_type(),
        }
    }

    fn customizer(&self, _name: &AnyName) -> Arc<dyn ComponentCustomizer> {
        Arc::new(ClosureCustomizer::<T> {
            priority: self.priority,
            f: self.f.clone(),
        })
    }
}

struct ClosureCustomizer<T: ?Sized> {
    priority: i32,
    f: Arc<CustomizeFn<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> ComponentCustomizer for ClosureCustomizer<T> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn customize(&self, component: AnyComponent) -> FactoryResult<AnyComponent> {
        let typed = component.downcast::<T>()?;
        Ok((self.f)(typed)?.into_any())
    }

    fn describe(&self) -> String {
        format!("TypedCustomizer<{}>", ComponentType::of::<T>())
    }
}
