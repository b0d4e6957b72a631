//! Dependency declarations: queries, bills of materials and their
//! resolved snapshots.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{FactoryError, FactoryResult};
use crate::name::{AnyComponent, AnyName, ComponentType, Name, NamedComponent};
use crate::traits::candidate_line;

/// What a query selects.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum QuerySelector {
    /// Exactly one name
    ByName(AnyName),
    /// Every component of the type
    ByType(ComponentType),
}

/// Type-erased query.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AnyQuery {
    selector: QuerySelector,
    mandatory: bool,
}

impl AnyQuery {
    pub fn selector(&self) -> &QuerySelector {
        &self.selector
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Whether the query can yield several components.
    pub fn is_multiple(&self) -> bool {
        matches!(self.selector, QuerySelector::ByType(_))
    }

    pub fn component_type(&self) -> ComponentType {
        match &self.selector {
            QuerySelector::ByName(name) => name.component_type(),
            QuerySelector::ByType(ty) => *ty,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }
}

impl fmt::Display for AnyQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            QuerySelector::ByName(name) => write!(f, "QueryByName{{{}}}", name),
            QuerySelector::ByType(ty) => write!(f, "QueryByType{{{}}}", ty),
        }
    }
}

impl fmt::Debug for AnyQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self, if self.mandatory { "!" } else { "?" })
    }
}

/// Typed dependency query.
///
/// By-name queries are mandatory unless made optional; by-type queries are
/// optional unless made mandatory.
///
/// ```rust
/// use ferrous_factory::{Name, Query};
///
/// let url = Query::by_name(&Name::<String>::of("db.url"));
/// assert!(url.is_mandatory());
///
/// let routes = Query::<String>::by_type();
/// assert!(!routes.is_mandatory());
/// assert!(routes.mandatory().is_mandatory());
/// ```
pub struct Query<T: ?Sized> {
    inner: AnyQuery,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> Query<T> {
    pub fn by_name(name: &Name<T>) -> Self {
        Self {
            inner: AnyQuery {
                selector: QuerySelector::ByName(name.erase().clone()),
                mandatory: true,
            },
            _marker: PhantomData,
        }
    }

    pub fn by_type() -> Self {
        Self {
            inner: AnyQuery {
                selector: QuerySelector::ByType(ComponentType::of::<T>()),
                mandatory: false,
            },
            _marker: PhantomData,
        }
    }

    pub fn mandatory(self) -> Self {
        Self {
            inner: self.inner.mandatory(),
            _marker: PhantomData,
        }
    }

    pub fn optional(self) -> Self {
        Self {
            inner: self.inner.optional(),
            _marker: PhantomData,
        }
    }

    pub fn is_mandatory(&self) -> bool {
        self.inner.mandatory
    }

    pub fn erase(&self) -> &AnyQuery {
        &self.inner
    }
}

impl<T: ?Sized> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl<T: ?Sized> fmt::Display for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl<T: ?Sized> From<Query<T>> for AnyQuery {
    fn from(query: Query<T>) -> Self {
        query.inner
    }
}

/// The queries a machine needs satisfied before it builds. Deduplicated,
/// declaration order kept.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BillOfMaterials {
    queries: Vec<AnyQuery>,
}

impl BillOfMaterials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(queries: impl IntoIterator<Item = AnyQuery>) -> Self {
        let mut bom = Self::new();
        for q in queries {
            bom.push(q);
        }
        bom
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, query: impl Into<AnyQuery>) -> Self {
        self.push(query.into());
        self
    }

    pub fn push(&mut self, query: AnyQuery) {
        if !self.queries.contains(&query) {
            self.queries.push(query);
        }
    }

    /// Union of two bills, `self` first.
    pub fn merged(mut self, other: &BillOfMaterials) -> Self {
        for q in &other.queries {
            self.push(q.clone());
        }
        self
    }

    pub fn queries(&self) -> &[AnyQuery] {
        &self.queries
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl fmt::Debug for BillOfMaterials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.queries).finish()
    }
}

/// A bill of materials with the components each query resolved to.
///
/// Handed to machines at build time and kept by the warehouse for
/// dependency introspection.
#[derive(Clone, Default)]
pub struct SatisfiedBom {
    bom: BillOfMaterials,
    materials: Vec<(AnyQuery, Vec<AnyComponent>)>,
    extra_dependencies: Vec<AnyName>,
}

impl SatisfiedBom {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(bom: BillOfMaterials, materials: Vec<(AnyQuery, Vec<AnyComponent>)>) -> Self {
        Self {
            bom,
            materials,
            extra_dependencies: Vec::new(),
        }
    }

    /// Record names looked up during the build outside of the declared queries.
    pub(crate) fn with_extra_dependencies(mut self, names: Vec<AnyName>) -> Self {
        for name in names {
            if !self.extra_dependencies.contains(&name) {
                self.extra_dependencies.push(name);
            }
        }
        self
    }

    pub fn bill_of_materials(&self) -> &BillOfMaterials {
        &self.bom
    }

    /// Raw components matched by a query.
    pub fn materials(&self, query: &AnyQuery) -> &[AnyComponent] {
        self.materials
            .iter()
            .find(|(q, _)| q.selector == query.selector)
            .map(|(_, c)| c.as_slice())
            .unwrap_or(&[])
    }

    /// Components matched by `query`, typed. Empty if the query was not declared.
    pub fn get<T>(&self, query: &Query<T>) -> FactoryResult<Vec<NamedComponent<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.materials(query.erase())
            .iter()
            .map(AnyComponent::downcast::<T>)
            .collect()
    }

    /// The single component matched by `query`. Several matches is an error.
    pub fn get_one<T>(&self, query: &Query<T>) -> FactoryResult<Option<NamedComponent<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let found = self.materials(query.erase());
        match found {
            [] => Ok(None),
            [one] => one.downcast::<T>().map(Some),
            many => Err(FactoryError::Ambiguous {
                query: query.to_string(),
                candidates: many.iter().map(|c| candidate_line(c.name())).collect(),
            }),
        }
    }

    /// The single component matched by `query`, which must be present.
    pub fn one<T>(&self, query: &Query<T>) -> FactoryResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_one(query)?
            .map(NamedComponent::into_component)
            .ok_or_else(|| FactoryError::NotFound(query.to_string()))
    }

    /// Every resolved component, query by query.
    pub fn all_components(&self) -> impl Iterator<Item = &AnyComponent> {
        self.materials.iter().flat_map(|(_, c)| c.iter())
    }

    /// Names of every dependency: resolved materials then ad-hoc lookups.
    pub fn dependency_names(&self) -> Vec<AnyName> {
        let mut names: Vec<AnyName> = Vec::new();
        for name in self
            .all_components()
            .map(AnyComponent::name)
            .chain(self.extra_dependencies.iter())
        {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

impl fmt::Debug for SatisfiedBom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SatisfiedBom")
            .field("bom", &self.bom)
            .field("dependencies", &self.dependency_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(name: &str, v: u32) -> AnyComponent {
        NamedComponent::new(Name::<u32>::of(name), Arc::new(v)).into_any()
    }

    #[test]
    fn bill_of_materials_deduplicates() {
        let q = Query::by_name(&Name::<u32>::of("a"));
        let bom = BillOfMaterials::new().with(q.clone()).with(q).with(Query::<u32>::by_type());
        assert_eq!(bom.queries().len(), 2);
    }

    #[test]
    fn get_one_rejects_multiple_matches() {
        let q = Query::<u32>::by_type();
        let bom = BillOfMaterials::new().with(q.clone());
        let sat = SatisfiedBom::new(bom, vec![(q.erase().clone(), vec![comp("a", 1), comp("b", 2)])]);

        assert_eq!(sat.get(&q).unwrap().len(), 2);
        match sat.get_one(&q) {
            Err(FactoryError::Ambiguous { candidates, .. }) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {:?}", other.map(|o| o.is_some())),
        }
    }

    #[test]
    fn lookups_ignore_mandatory_flag() {
        let q = Query::by_name(&Name::<u32>::of("a"));
        let sat = SatisfiedBom::new(
            BillOfMaterials::new().with(q.clone()),
            vec![(q.erase().clone(), vec![comp("a", 3)])],
        );
        assert_eq!(*sat.one(&q.clone().optional()).unwrap(), 3);
    }

    #[test]
    fn dependency_names_include_extra_lookups() {
        let q = Query::by_name(&Name::<u32>::of("a"));
        let sat = SatisfiedBom::new(
            BillOfMaterials::new().with(q.clone()),
            vec![(q.erase().clone(), vec![comp("a", 3)])],
        )
        .with_extra_dependencies(vec![Name::<u32>::of("b").into_any(), Name::<u32>::of("a").into_any()]);
        let names: Vec<String> = sat.dependency_names().iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
