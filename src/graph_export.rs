//! Dependency graph export of what a factory has built.
//!
//! The graph is read from the warehouse: one node per stored component and
//! one edge per recorded dependency. Nothing is built by exporting.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{FactoryError, FactoryResult};
use crate::factory::Factory;
use crate::name::AnyName;

/// A stored component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// `[full::type::Name]name`
    pub id: String,
    pub name: String,
    /// Simple type name
    pub type_name: String,
    /// Box description, e.g. `BoundlessComponentBox`
    pub lifecycle: String,
    /// Build time in microseconds; zero when durations are excluded
    pub build_micros: u64,
    /// Whether the node comes from a provider warehouse
    pub provided: bool,
    pub metadata: BTreeMap<String, String>,
}

/// `from` was built with `to` as a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub factory_id: String,
    pub warehouse_id: String,
    pub component_count: usize,
    pub edge_count: usize,
    pub total_build_micros: u64,
    pub exported_at: String,
    pub version: String,
}

/// Nodes, edges and metadata of one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub metadata: GraphMetadata,
}

impl DependencyGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Keep only these simple type names (empty keeps all)
    pub type_filter: HashSet<String>,
    pub include_durations: bool,
    /// Include components of provider warehouses
    pub include_provided: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            type_filter: HashSet::new(),
            include_durations: true,
            include_provided: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// JSON for tools and web UIs
    Json,
    Yaml,
    /// Graphviz
    Dot,
    Mermaid,
}

/// Builds and renders [`DependencyGraph`]s.
///
/// ```rust
/// use ferrous_factory::graph_export::{ExportFormat, GraphBuilder};
/// use ferrous_factory::*;
/// use std::sync::Arc;
///
/// let base = Name::<u32>::of("base");
/// let double = Name::<u32>::of("double");
/// let q = Query::by_name(&base);
/// let factory = Factory::builder()
///     .add_machine(SingletonFactoryMachine::of(0, base.clone(), 21u32))
///     .add_machine(SingleNameFactoryMachine::from_fn(
///         0,
///         double.clone(),
///         BoxKind::Boundless,
///         BillOfMaterials::new().with(q.clone()),
///         move |ctx| Ok(Arc::new(*ctx.satisfied().one(&q)? * 2)),
///     ))
///     .build()
///     .unwrap();
/// factory.require(&double).unwrap();
///
/// let graph = GraphBuilder::new().build_graph(&factory);
/// assert_eq!(graph.nodes.len(), 2);
/// assert_eq!(graph.dependencies_of(&double.erase().as_id()), vec![base.erase().as_id().as_str()]);
///
/// let dot = GraphBuilder::new().export(&graph, ExportFormat::Dot).unwrap();
/// assert!(dot.starts_with("digraph"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    options: ExportOptions,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build_graph(&self, factory: &Factory) -> DependencyGraph {
        let warehouse = factory.warehouse();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut total_micros = 0u64;

        for name in warehouse.list_names() {
            if !self.keeps(&name) {
                continue;
            }
            let provided = !warehouse.contains_own(&name);
            if provided && !self.options.include_provided {
                continue;
            }
            let Some(info) = warehouse.stored_box_info(&name) else {
                continue;
            };
            let build_micros = if self.options.include_durations {
                u64::try_from(info.build_duration.as_micros()).unwrap_or(u64::MAX)
            } else {
                0
            };
            total_micros = total_micros.saturating_add(build_micros);

            let mut metadata = BTreeMap::new();
            metadata.insert("full_type".to_string(), name.component_type().type_name().to_string());
            metadata.insert("dependency_count".to_string(), info.dependencies.len().to_string());

            for dep in &info.dependencies {
                edges.push(GraphEdge {
                    from: name.as_id(),
                    to: dep.as_id(),
                });
            }
            nodes.push(GraphNode {
                id: name.as_id(),
                name: name.name().to_string(),
                type_name: name.component_type().simple_name(),
                lifecycle: info.description,
                build_micros,
                provided,
                metadata,
            });
        }

        DependencyGraph {
            metadata: GraphMetadata {
                factory_id: factory.id().to_string(),
                warehouse_id: warehouse.id().to_string(),
                component_count: nodes.len(),
                edge_count: edges.len(),
                total_build_micros: total_micros,
                exported_at: chrono::Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            nodes,
            edges,
        }
    }

    pub fn export(&self, graph: &DependencyGraph, format: ExportFormat) -> FactoryResult<String> {
        match format {
            ExportFormat::Json => serde_json::to_string_pretty(graph).map_err(|e| FactoryError::Export(e.to_string())),
            ExportFormat::Yaml => serde_yaml::to_string(graph).map_err(|e| FactoryError::Export(e.to_string())),
            ExportFormat::Dot => Ok(to_dot(graph)),
            ExportFormat::Mermaid => Ok(to_mermaid(graph)),
        }
    }

    pub fn build_and_export(&self, factory: &Factory, format: ExportFormat) -> FactoryResult<String> {
        self.export(&self.build_graph(factory), format)
    }

    fn keeps(&self, name: &AnyName) -> bool {
        self.options.type_filter.is_empty() || self.options.type_filter.contains(&name.component_type().simple_name())
    }
}

fn to_dot(graph: &DependencyGraph) -> String {
    let mut out = String::from("digraph Factory {\n  rankdir=LR;\n  node [shape=box];\n\n");
    for node in &graph.nodes {
        let style = if node.provided { "dashed" } else { "solid" };
        out.push_str(&format!(
            "  \"{}\" [label=\"{}\\n({})\", style={}];\n",
            escape(&node.id),
            escape(&node.name),
            escape(&node.type_name),
            style
        ));
    }
    out.push('\n');
    for edge in &graph.edges {
        out.push_str(&format!("  \"{}\" -> \"{}\";\n", escape(&edge.from), escape(&edge.to)));
    }
    out.push_str("}\n");
    out
}

fn to_mermaid(graph: &DependencyGraph) -> String {
    // mermaid ids must be plain identifiers
    let index = |id: &str| graph.nodes.iter().position(|n| n.id == id);
    let mut out = String::from("graph TD\n");
    for (i, node) in graph.nodes.iter().enumerate() {
        out.push_str(&format!("  n{}[\"{}: {}\"]\n", i, node.name.replace('"', "'"), node.type_name));
    }
    for edge in &graph.edges {
        if let (Some(from), Some(to)) = (index(&edge.from), index(&edge.to)) {
            out.push_str(&format!("  n{} --> n{}\n", from, to));
        }
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// One-call exports with default options.
pub mod exports {
    use super::{ExportFormat, GraphBuilder};
    use crate::error::FactoryResult;
    use crate::factory::Factory;

    pub fn to_json(factory: &Factory) -> FactoryResult<String> {
        GraphBuilder::new().build_and_export(factory, ExportFormat::Json)
    }

    pub fn to_yaml(factory: &Factory) -> FactoryResult<String> {
        GraphBuilder::new().build_and_export(factory, ExportFormat::Yaml)
    }

    pub fn to_dot(factory: &Factory) -> FactoryResult<String> {
        GraphBuilder::new().build_and_export(factory, ExportFormat::Dot)
    }

    pub fn to_mermaid(factory: &Factory) -> FactoryResult<String> {
        GraphBuilder::new().build_and_export(factory, ExportFormat::Mermaid)
    }
}
