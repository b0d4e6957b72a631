use std::sync::Arc;

use super::{FactoryMachine, MachineRef};
use crate::component_box::{ComponentBox, ComponentBoxWrapper, ComponentTransform};
use crate::error::FactoryResult;
use crate::factory::BuildContext;
use crate::name::{AnyComponent, AnyName, ComponentType, NamedComponent};
use crate::query::{AnyQuery, BillOfMaterials};

/// Decorates another machine: different priority, extra dependencies, or a
/// transformation applied to every component it builds.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::*;
/// use std::sync::Arc;
///
/// let inner = SingletonFactoryMachine::of(0, Name::<u32>::of("answer"), 41u32);
/// let wrapped = FactoryMachineWrapper::builder(Arc::new(inner))
///     .with_priority(-5)
///     .transform_components::<u32, _>(|c| NamedComponent::new(c.name().clone(), Arc::new(**c.component() + 1)))
///     .build();
/// assert_eq!(wrapped.priority(), -5);
///
/// let factory = Factory::builder().add_machine(wrapped).build().unwrap();
/// assert_eq!(*factory.require(&Name::<u32>::of("answer")).unwrap(), 42);
/// ```
pub struct FactoryMachineWrapper {
    inner: MachineRef,
    priority: Option<i32>,
    dependencies: BillOfMaterials,
    transform: Option<ComponentTransform>,
}

impl FactoryMachineWrapper {
    pub fn builder(inner: MachineRef) -> FactoryMachineWrapperBuilder {
        FactoryMachineWrapperBuilder {
            inner,
            priority: None,
            dependencies: BillOfMaterials::new(),
            transform: None,
        }
    }
}

/// Builder for [`FactoryMachineWrapper`].
pub struct FactoryMachineWrapperBuilder {
    inner: MachineRef,
    priority: Option<i32>,
    dependencies: BillOfMaterials,
    transform: Option<ComponentTransform>,
}

impl FactoryMachineWrapperBuilder {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Queries satisfied before every build, on top of the inner machine's own.
    pub fn with_dependencies(mut self, queries: impl IntoIterator<Item = AnyQuery>) -> Self {
        for q in queries {
            self.dependencies.push(q);
        }
        self
    }

    /// Transform every picked component. Applied after any previously set transform.
    pub fn transform_any(mut self, f: impl Fn(AnyComponent) -> AnyComponent + Send + Sync + 'static) -> Self {
        let next: ComponentTransform = Arc::new(f);
        self.transform = Some(match self.transform.take() {
            Some(prev) => Arc::new(move |c: AnyComponent| next(prev(c))) as ComponentTransform,
            None => next,
        });
        self
    }

    /// Transform picked components of type `T`; other components pass through.
    pub fn transform_components<T, F>(self, f: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(NamedComponent<T>) -> NamedComponent<T> + Send + Sync + 'static,
    {
        self.transform_any(move |c| match c.downcast::<T>() {
            Ok(typed) => f(typed).into_any(),
            Err(_) => c,
        })
    }

    pub fn build(self) -> FactoryMachineWrapper {
        FactoryMachineWrapper {
            inner: self.inner,
            priority: self.priority,
            dependencies: self.dependencies,
            transform: self.transform,
        }
    }
}

impl FactoryMachine for FactoryMachineWrapper {
    fn priority(&self) -> i32 {
        self.priority.unwrap_or_else(|| self.inner.priority())
    }

    fn can_build(&self, name: &AnyName) -> bool {
        self.inner.can_build(name)
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        self.inner.name_buildable_components(component_type)
    }

    fn bill_of_materials(&self, name: &AnyName) -> BillOfMaterials {
        self.inner.bill_of_materials(name).merged(&self.dependencies)
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        let built = self.inner.new_component(ctx)?;
        Ok(match (&self.transform, built) {
            (Some(transform), Some(component_box)) => {
                Some(Box::new(ComponentBoxWrapper::new(component_box, transform.clone())) as Box<dyn ComponentBox>)
            }
            (_, built) => built,
        })
    }

    fn describe(&self) -> String {
        format!("FactoryMachineWrapper{{priority={}, {}}}", self.priority(), self.inner.describe())
    }
}
