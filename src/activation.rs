//! Activation keys: switching individual components off.
//!
//! Every component name has an activation key, a `String` component named
//! `activation::<type>::<name>`. When that key resolves to `"false"` the
//! component is deactivated: lookups by name return nothing and type
//! queries skip it.

use std::sync::Arc;

use crate::component_box::ComponentBox;
use crate::error::FactoryResult;
use crate::factory::BuildContext;
use crate::lifetime::BoxKind;
use crate::machine::FactoryMachine;
use crate::name::{AnyName, ComponentType, Name, NamedComponent};

pub const ACTIVATION_PREFIX: &str = "activation::";

/// Priority of [`DeactivationFactoryMachine`]: above every ordinary machine.
pub const DEACTIVATION_PRIORITY: i32 = -10000;

/// The activation key of `name`.
///
/// ```rust
/// use ferrous_factory::{activation_key, Name};
///
/// assert_eq!(
///     activation_key(Name::<u32>::of("port").erase()),
///     "activation::u32::port"
/// );
/// ```
pub fn activation_key(name: &AnyName) -> String {
    format!(
        "{}{}::{}",
        ACTIVATION_PREFIX,
        name.component_type().type_name(),
        name.name()
    )
}

/// The activation key of `name`, as a component name.
pub fn activation_name(name: &AnyName) -> Name<String> {
    Name::of(activation_key(name))
}

/// Whether `name` itself is an activation key. Activation keys have no
/// activation key of their own.
pub fn is_activation_key(name: &AnyName) -> bool {
    name.component_type() == ComponentType::of::<String>() && name.name().starts_with(ACTIVATION_PREFIX)
}

/// Deactivates a fixed set of components by providing `"false"` for their
/// activation keys.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::*;
///
/// let factory = Factory::builder()
///     .add_machine(SingletonFactoryMachine::of(0, Name::<u32>::of("a"), 1u32))
///     .add_machine(SingletonFactoryMachine::of(0, Name::<u32>::of("b"), 2u32))
///     .add_machine(DeactivationFactoryMachine::for_names([Name::<u32>::of("b").into_any()]))
///     .build()
///     .unwrap();
///
/// assert!(factory.get_component(&Name::<u32>::of("b")).unwrap().is_none());
/// assert_eq!(factory.get_components::<u32>().unwrap().len(), 1);
/// ```
pub struct DeactivationFactoryMachine {
    keys: Vec<Name<String>>,
}

impl DeactivationFactoryMachine {
    pub fn for_names(names: impl IntoIterator<Item = AnyName>) -> Self {
        let mut keys: Vec<Name<String>> = Vec::new();
        for name in names {
            let key = activation_name(&name);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Self { keys }
    }

    fn key(&self, name: &AnyName) -> Option<&Name<String>> {
        self.keys.iter().find(|k| k.erase() == name)
    }
}

impl FactoryMachine for DeactivationFactoryMachine {
    fn priority(&self) -> i32 {
        DEACTIVATION_PRIORITY
    }

    fn can_build(&self, name: &AnyName) -> bool {
        self.key(name).is_some()
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        crate::machine::names_of_type(self.keys.iter().map(Name::erase), component_type)
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        Ok(self.key(ctx.name()).map(|key| {
            BoxKind::Boundless.wrap(NamedComponent::new(key.clone(), Arc::new("false".to_string())))
        }))
    }

    fn describe(&self) -> String {
        let keys: Vec<&str> = self.keys.iter().map(|k| k.name()).collect();
        format!("DeactivationFactoryMachine{{{}}}", keys.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_keys_are_recognised() {
        let name = Name::<u32>::of("port").into_any();
        assert!(!is_activation_key(&name));
        assert!(is_activation_key(activation_name(&name).erase()));
        // same text, wrong type
        assert!(!is_activation_key(&Name::<u32>::of(activation_key(&name)).into_any()));
    }

    #[test]
    fn machine_lists_only_string_keys() {
        let m = DeactivationFactoryMachine::for_names([Name::<u32>::of("a").into_any()]);
        assert_eq!(m.name_buildable_components(&ComponentType::of::<String>()).len(), 1);
        assert!(m.name_buildable_components(&ComponentType::of::<u32>()).is_empty());
        assert!(m.can_build(activation_name(Name::<u32>::of("a").erase()).erase()));
    }
}
