use ahash::AHashSet;

use super::Factory;
use crate::error::{FactoryError, FactoryResult};
use crate::name::{AnyComponent, AnyName, NamedComponent};
use crate::query::{Query, QuerySelector};
use crate::traits::candidate_line;

/// A [`Query`] bound to the factory that answers it.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::*;
///
/// let factory = Factory::builder()
///     .add_machine(SingletonFactoryMachine::of(0, Name::<u16>::of("http"), 80u16))
///     .add_machine(SingletonFactoryMachine::of(0, Name::<u16>::of("https"), 443u16))
///     .build()
///     .unwrap();
///
/// let ports = factory.query_by_type::<u16>();
/// assert_eq!(ports.find_names().len(), 2);
/// assert_eq!(ports.find().unwrap().len(), 2);
/// assert!(ports.find_one().is_err());
///
/// let missing = factory.query_by_name(&Name::<u16>::of("ssh"));
/// assert!(missing.check_satisfy().is_err());
/// assert!(missing.optional().find().unwrap().is_empty());
/// ```
pub struct BoundQuery<'f, T: ?Sized> {
    factory: &'f Factory,
    query: Query<T>,
}

impl<'f, T: ?Sized + Send + Sync + 'static> BoundQuery<'f, T> {
    pub(crate) fn new(factory: &'f Factory, query: Query<T>) -> Self {
        Self { factory, query }
    }

    pub fn mandatory(self) -> Self {
        Self {
            factory: self.factory,
            query: self.query.mandatory(),
        }
    }

    pub fn optional(self) -> Self {
        Self {
            factory: self.factory,
            query: self.query.optional(),
        }
    }

    pub fn query(&self) -> &Query<T> {
        &self.query
    }

    /// Builds and returns every match. A mandatory query is checked first,
    /// so an unsatisfiable one fails before anything is built.
    pub fn find(&self) -> FactoryResult<Vec<NamedComponent<T>>> {
        if self.query.is_mandatory() {
            self.check_satisfy()?;
        }
        self.factory
            .find(self.query.erase())?
            .iter()
            .map(AnyComponent::downcast::<T>)
            .collect()
    }

    /// At most one match, or [`FactoryError::Ambiguous`].
    pub fn find_one(&self) -> FactoryResult<Option<NamedComponent<T>>> {
        let mut found = self.find()?;
        if found.len() > 1 {
            return Err(FactoryError::Ambiguous {
                query: self.query.to_string(),
                candidates: found.iter().map(|c| candidate_line(c.name().erase())).collect(),
            });
        }
        Ok(found.pop())
    }

    /// Names that would match, without building anything.
    pub fn find_names(&self) -> Vec<AnyName> {
        match self.query.erase().selector() {
            QuerySelector::ByName(name) => {
                if self.factory.warehouse().contains(name) || self.factory.machine_for(name).is_some() {
                    vec![name.clone()]
                } else {
                    Vec::new()
                }
            }
            QuerySelector::ByType(ty) => self.factory.buildable_names(ty),
        }
    }

    /// Checks that the query and the bills of materials behind it can be
    /// met, without building anything. Optional queries always pass.
    pub fn check_satisfy(&self) -> FactoryResult<()> {
        self.factory
            .check_satisfy_query(self.query.erase(), &mut AHashSet::new())
    }
}
