use std::sync::Arc;

use super::FactoryMachine;
use crate::component_box::ComponentBox;
use crate::error::FactoryResult;
use crate::factory::BuildContext;
use crate::lifetime::BoxKind;
use crate::name::{AnyName, ComponentType, Name, NamedComponent};

/// Default priority: overrides ordinary machines, loses to overlays and
/// deactivations.
pub const ENV_MACHINE_PRIORITY: i32 = -1000;

/// Exposes process environment variables as `String` components named
/// after the variable.
///
/// The environment is read at build time, not captured when the machine is
/// created. With a prefix, only variables starting with it are visible and
/// components are named after the rest of the variable name.
#[derive(Debug, Clone)]
pub struct EnvVarFactoryMachine {
    priority: i32,
    prefix: Option<String>,
}

impl EnvVarFactoryMachine {
    pub fn new() -> Self {
        Self {
            priority: ENV_MACHINE_PRIORITY,
            prefix: None,
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            priority: ENV_MACHINE_PRIORITY,
            prefix: Some(prefix.into()),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn var_name(&self, component_name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, component_name),
            None => component_name.to_string(),
        }
    }

    fn lookup(&self, name: &AnyName) -> Option<String> {
        if name.component_type() != ComponentType::of::<String>() {
            return None;
        }
        std::env::var(self.var_name(name.name())).ok()
    }
}

impl Default for EnvVarFactoryMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryMachine for EnvVarFactoryMachine {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_build(&self, name: &AnyName) -> bool {
        self.lookup(name).is_some()
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        if !component_type.matches(&ComponentType::of::<String>()) {
            return Vec::new();
        }
        // names or values that are not unicode cannot be String components
        std::env::vars_os()
            .filter_map(|(key, value)| {
                let key = key.into_string().ok()?;
                value.into_string().ok()?;
                Some(key)
            })
            .filter_map(|key| match &self.prefix {
                Some(prefix) => key.strip_prefix(prefix.as_str()).map(str::to_string),
                None => Some(key),
            })
            .filter(|key| !key.is_empty())
            .map(|key| Name::<String>::of(key).into_any())
            .collect()
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        Ok(self.lookup(ctx.name()).map(|value| {
            let name = Name::<String>::of(ctx.name().name());
            BoxKind::Boundless.wrap(NamedComponent::new(name, Arc::new(value)))
        }))
    }

    fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("EnvVarFactoryMachine{{prefix={}}}", prefix),
            None => "EnvVarFactoryMachine".to_string(),
        }
    }
}
