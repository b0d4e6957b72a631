use std::sync::Arc;

use super::FactoryMachine;
use crate::component_box::{BoundlessComponentBox, ComponentBox};
use crate::error::FactoryResult;
use crate::factory::BuildContext;
use crate::name::{AnyComponent, AnyName, ComponentType, Name, NamedComponent};

/// Serves one pre-built component from a boundless box.
///
/// The usual way to override a component: install a singleton machine with
/// a lower priority than the machine it replaces.
#[derive(Clone)]
pub struct SingletonFactoryMachine {
    priority: i32,
    component: AnyComponent,
}

impl SingletonFactoryMachine {
    pub fn new<T>(priority: i32, component: NamedComponent<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            priority,
            component: component.into_any(),
        }
    }

    pub fn of<T>(priority: i32, name: Name<T>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::new(priority, NamedComponent::new(name, Arc::new(value)))
    }

    pub fn name(&self) -> &AnyName {
        self.component.name()
    }
}

impl FactoryMachine for SingletonFactoryMachine {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_build(&self, name: &AnyName) -> bool {
        self.component.name() == name
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        if component_type.matches(&self.component.name().component_type()) {
            vec![self.component.name().clone()]
        } else {
            Vec::new()
        }
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        if !self.can_build(ctx.name()) {
            return Ok(None);
        }
        Ok(Some(Box::new(BoundlessComponentBox::new(self.component.clone()))))
    }

    fn describe(&self) -> String {
        format!("SingletonFactoryMachine{{priority={}, name={}}}", self.priority, self.component.name())
    }
}
