use std::sync::Arc;

use super::FactoryMachine;
use crate::component_box::{BoundlessComponentBox, ComponentBox};
use crate::error::FactoryResult;
use crate::factory::BuildContext;
use crate::name::{AnyName, ComponentType};
use crate::warehouse::Warehouse;

/// Makes components of provider warehouses visible to type queries.
///
/// Components are served in a box without close hook: the provider
/// warehouse keeps ownership and closes them itself.
pub struct WarehouseProvidersMachine {
    providers: Vec<Arc<Warehouse>>,
}

pub const WAREHOUSE_PROVIDERS_PRIORITY: i32 = -10000;

impl WarehouseProvidersMachine {
    pub fn new(providers: Vec<Arc<Warehouse>>) -> Self {
        Self { providers }
    }
}

impl FactoryMachine for WarehouseProvidersMachine {
    fn priority(&self) -> i32 {
        WAREHOUSE_PROVIDERS_PRIORITY
    }

    fn can_build(&self, name: &AnyName) -> bool {
        self.providers.iter().any(|p| p.contains(name))
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        let mut names: Vec<AnyName> = Vec::new();
        for provider in &self.providers {
            for name in provider.list_names() {
                if component_type.matches(&name.component_type()) && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        Ok(self
            .providers
            .iter()
            .find_map(|p| p.check_out(ctx.name()))
            .map(|c| Box::new(BoundlessComponentBox::new(c)) as Box<dyn ComponentBox>))
    }

    fn describe(&self) -> String {
        let ids: Vec<&str> = self.providers.iter().map(|p| p.id()).collect();
        format!("WarehouseProvidersMachine{{providers=[{}]}}", ids.join(", "))
    }
}
