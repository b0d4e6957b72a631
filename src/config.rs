//! Configuration exposed as components.
//!
//! [`ConfigSupplier`] components provide [`ConfigElement`]s. The
//! [`ConsolidatedConfigMachine`] merges them into one [`Config`] component,
//! and [`ElementsFromConfigMachine`] republishes every key as a `String`
//! component (and a [`ConfigElement`] component) of the same name.
//!
//! ```rust
//! use ferrous_factory::config::*;
//! use ferrous_factory::*;
//! use std::sync::Arc;
//!
//! let defaults: Arc<dyn ConfigSupplier> = Arc::new(
//!     MapConfigSupplier::new("defaults")
//!         .with("http.port", "8080")
//!         .with_doc("db.url", "mongodb://localhost", "main database"),
//! );
//! let factory = Factory::builder()
//!     .add_machine(SingletonFactoryMachine::new(
//!         0,
//!         NamedComponent::new(Name::<dyn ConfigSupplier>::of("defaults"), defaults),
//!     ))
//!     .add_machine(ConsolidatedConfigMachine::new())
//!     .add_machine(ElementsFromConfigMachine::new())
//!     .build()
//!     .unwrap();
//!
//! let config = factory.require(&Config::component_name()).unwrap();
//! assert_eq!(config.get_as::<u16>("http.port").unwrap(), Some(8080));
//! assert_eq!(*factory.require(&Name::<String>::of("db.url")).unwrap(), "mongodb://localhost");
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::component_box::ComponentBox;
use crate::error::{FactoryError, FactoryResult};
use crate::factory::BuildContext;
use crate::lifetime::BoxKind;
use crate::machine::FactoryMachine;
use crate::name::{AnyName, ComponentType, Name, NamedComponent};
use crate::query::{BillOfMaterials, Query};

const TRUE_VALUES: [&str; 5] = ["true", "yes", "on", "1", "y"];

/// One configuration entry and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigElement {
    pub origin: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub doc: String,
}

impl ConfigElement {
    pub fn new(origin: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            key: key.into(),
            value: value.into(),
            doc: String::new(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }
}

impl fmt::Display for ConfigElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} (from {})", self.key, self.value, self.origin)
    }
}

/// Consolidated configuration.
///
/// The first element for a key wins. A later element for the same key only
/// contributes its doc, when the winner has none.
#[derive(Debug, Clone, Default)]
pub struct Config {
    elements: Vec<ConfigElement>,
    index: AHashMap<String, usize>,
}

impl Config {
    /// Name under which [`ConsolidatedConfigMachine`] publishes the config.
    pub fn component_name() -> Name<Config> {
        Name::of("config")
    }

    pub fn of(elements: impl IntoIterator<Item = ConfigElement>) -> Self {
        let mut config = Config::default();
        for element in elements {
            match config.index.get(&element.key) {
                Some(&i) => {
                    let current = &mut config.elements[i];
                    if current.doc.is_empty() && !element.doc.is_empty() {
                        current.doc = element.doc;
                    }
                }
                None => {
                    config.index.insert(element.key.clone(), config.elements.len());
                    config.elements.push(element);
                }
            }
        }
        config
    }

    /// Elements in first-seen order.
    pub fn elements(&self) -> &[ConfigElement] {
        &self.elements
    }

    pub fn element(&self, key: &str) -> Option<&ConfigElement> {
        self.index.get(key).map(|&i| &self.elements[i])
    }

    /// The value of `key`; an empty value counts as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.element(key)
            .map(|e| e.value.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parses the value of `key`. A value that does not parse is a
    /// [`FactoryError::Config`] error.
    pub fn get_as<T>(&self, key: &str) -> FactoryResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(key)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|e| FactoryError::Config(format!("can't read '{}' as {}: {}", key, std::any::type_name::<T>(), e)))
            })
            .transpose()
    }

    /// `true` for `true`, `yes`, `on`, `1` and `y`, ignoring case.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)
            .map(|v| TRUE_VALUES.iter().any(|t| t.eq_ignore_ascii_case(v.trim())))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// A source of configuration elements, registered as a
/// `dyn ConfigSupplier` component.
pub trait ConfigSupplier: Send + Sync {
    fn elements(&self) -> Vec<ConfigElement>;
}

/// Elements given in code.
#[derive(Debug, Clone)]
pub struct MapConfigSupplier {
    origin: String,
    elements: Vec<ConfigElement>,
}

impl MapConfigSupplier {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            elements: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.elements.push(ConfigElement::new(self.origin.clone(), key, value));
        self
    }

    pub fn with_doc(mut self, key: impl Into<String>, value: impl Into<String>, doc: impl Into<String>) -> Self {
        self.elements
            .push(ConfigElement::new(self.origin.clone(), key, value).with_doc(doc));
        self
    }
}

impl ConfigSupplier for MapConfigSupplier {
    fn elements(&self) -> Vec<ConfigElement> {
        self.elements.clone()
    }
}

/// Elements parsed from `key = value` lines.
///
/// Lines starting with `#` document the next key, and a value ending with
/// `\` continues on the next line.
#[derive(Debug, Clone)]
pub struct PropertiesConfigSupplier {
    elements: Vec<ConfigElement>,
}

impl PropertiesConfigSupplier {
    pub fn parse(origin: &str, source: &str) -> FactoryResult<Self> {
        let lines: Vec<&str> = source.lines().collect();
        let mut elements = Vec::new();
        let mut doc = String::new();
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if let Some(comment) = line.strip_prefix('#') {
                doc.push_str(comment.trim());
                doc.push('\n');
            } else if !line.trim().is_empty() {
                let (key, first) = line.split_once('=').ok_or_else(|| {
                    FactoryError::Config(format!(
                        "invalid config {} at line {}: line does not contain the equals sign '='",
                        origin, i
                    ))
                })?;
                let mut value = String::new();
                let mut part = first.trim();
                while let Some(continued) = part.strip_suffix('\\') {
                    if i + 1 >= lines.len() {
                        break;
                    }
                    value.push_str(continued);
                    i += 1;
                    part = lines[i].trim();
                }
                value.push_str(part);
                elements.push(ConfigElement::new(origin, key.trim(), value).with_doc(doc.trim()));
                doc.clear();
            }
            i += 1;
        }
        Ok(Self { elements })
    }

    pub fn from_file(path: impl AsRef<Path>) -> FactoryResult<Self> {
        let path = path.as_ref();
        let source = read(path)?;
        Self::parse(&path.display().to_string(), &source)
    }
}

impl ConfigSupplier for PropertiesConfigSupplier {
    fn elements(&self) -> Vec<ConfigElement> {
        self.elements.clone()
    }
}

/// Elements flattened from a JSON document: nested keys are joined with
/// `.`, array items keyed by index.
#[derive(Debug, Clone)]
pub struct JsonConfigSupplier {
    elements: Vec<ConfigElement>,
}

impl JsonConfigSupplier {
    pub fn parse(origin: &str, source: &str) -> FactoryResult<Self> {
        let value: serde_json::Value = serde_json::from_str(source)
            .map_err(|e| FactoryError::Config(format!("invalid JSON config {}: {}", origin, e)))?;
        let mut elements = Vec::new();
        flatten_json(origin, "", &value, &mut elements);
        Ok(Self { elements })
    }

    pub fn from_file(path: impl AsRef<Path>) -> FactoryResult<Self> {
        let path = path.as_ref();
        let source = read(path)?;
        Self::parse(&path.display().to_string(), &source)
    }
}

impl ConfigSupplier for JsonConfigSupplier {
    fn elements(&self) -> Vec<ConfigElement> {
        self.elements.clone()
    }
}

/// Elements flattened from a YAML document, like [`JsonConfigSupplier`].
#[derive(Debug, Clone)]
pub struct YamlConfigSupplier {
    elements: Vec<ConfigElement>,
}

impl YamlConfigSupplier {
    pub fn parse(origin: &str, source: &str) -> FactoryResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(source)
            .map_err(|e| FactoryError::Config(format!("invalid YAML config {}: {}", origin, e)))?;
        let mut elements = Vec::new();
        flatten_yaml(origin, "", &value, &mut elements);
        Ok(Self { elements })
    }

    pub fn from_file(path: impl AsRef<Path>) -> FactoryResult<Self> {
        let path = path.as_ref();
        let source = read(path)?;
        Self::parse(&path.display().to_string(), &source)
    }
}

impl ConfigSupplier for YamlConfigSupplier {
    fn elements(&self) -> Vec<ConfigElement> {
        self.elements.clone()
    }
}

fn read(path: &Path) -> FactoryResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| FactoryError::Config(format!("can't read {}: {}", path.display(), e)))
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn flatten_json(origin: &str, prefix: &str, value: &serde_json::Value, out: &mut Vec<ConfigElement>) {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_json(origin, &join(prefix, k), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_json(origin, &join(prefix, &i.to_string()), v, out);
            }
        }
        Value::String(s) => out.push(ConfigElement::new(origin, prefix, s.clone())),
        Value::Null => out.push(ConfigElement::new(origin, prefix, "")),
        other => out.push(ConfigElement::new(origin, prefix, other.to_string())),
    }
}

fn flatten_yaml(origin: &str, prefix: &str, value: &serde_yaml::Value, out: &mut Vec<ConfigElement>) {
    use serde_yaml::Value;
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                flatten_yaml(origin, &join(prefix, &key), v, out);
            }
        }
        Value::Sequence(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_yaml(origin, &join(prefix, &i.to_string()), v, out);
            }
        }
        Value::String(s) => out.push(ConfigElement::new(origin, prefix, s.clone())),
        Value::Number(n) => out.push(ConfigElement::new(origin, prefix, n.to_string())),
        Value::Bool(b) => out.push(ConfigElement::new(origin, prefix, b.to_string())),
        Value::Null => out.push(ConfigElement::new(origin, prefix, "")),
        Value::Tagged(tagged) => flatten_yaml(origin, prefix, &tagged.value, out),
    }
}

/// Builds [`Config::component_name`] from every `dyn ConfigSupplier`
/// component, lowest component priority first.
///
/// `String` components of the factory take precedence over supplier
/// elements, except those whose value is already the configured one.
pub struct ConsolidatedConfigMachine {
    priority: i32,
}

impl ConsolidatedConfigMachine {
    pub fn new() -> Self {
        Self { priority: 0 }
    }

    pub fn with_priority(priority: i32) -> Self {
        Self { priority }
    }

    fn suppliers_query() -> Query<dyn ConfigSupplier> {
        Query::by_type()
    }

    fn strings_query() -> Query<String> {
        Query::by_type()
    }
}

impl Default for ConsolidatedConfigMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryMachine for ConsolidatedConfigMachine {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_build(&self, name: &AnyName) -> bool {
        name == Config::component_name().erase()
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        let name = Config::component_name().into_any();
        if component_type.matches(&name.component_type()) {
            vec![name]
        } else {
            Vec::new()
        }
    }

    fn bill_of_materials(&self, _name: &AnyName) -> BillOfMaterials {
        BillOfMaterials::new()
            .with(Self::suppliers_query())
            .with(Self::strings_query())
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        let mut suppliers = ctx.satisfied().get(&Self::suppliers_query())?;
        suppliers.sort_by_key(|s| s.priority());
        let supplied = Config::of(suppliers.iter().flat_map(|s| s.component().elements()));

        let mut elements = Vec::new();
        for s in ctx.satisfied().get(&Self::strings_query())? {
            let key = s.name().name();
            let configured = supplied.element(key);
            if configured.is_some_and(|e| e.value == **s.component()) {
                continue;
            }
            let doc = configured.map(|e| e.doc.clone()).unwrap_or_default();
            elements.push(ConfigElement::new("factory", key, s.component().as_str()).with_doc(doc));
        }
        elements.extend(supplied.elements);

        let config = Config::of(elements);
        tracing::debug!(keys = config.len(), "configuration consolidated");
        Ok(Some(
            BoxKind::Boundless.wrap(NamedComponent::new(Config::component_name(), Arc::new(config))),
        ))
    }

    fn describe(&self) -> String {
        "ConsolidatedConfigMachine".to_string()
    }
}

/// Machine building the machine that serves config keys as components.
///
/// It builds `Name<dyn FactoryMachine>("ElementsFromConfig")` from the
/// consolidated [`Config`], so the factory builder adopts it as a machine.
/// That machine serves, for each key, a `String` component (when the value
/// is not empty) and a [`ConfigElement`] component.
pub struct ElementsFromConfigMachine {
    name: Name<dyn FactoryMachine>,
}

impl ElementsFromConfigMachine {
    pub fn new() -> Self {
        Self {
            name: Name::of("ElementsFromConfig"),
        }
    }

    fn config_query() -> Query<Config> {
        Query::by_type().mandatory()
    }
}

impl Default for ElementsFromConfigMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryMachine for ElementsFromConfigMachine {
    fn priority(&self) -> i32 {
        0
    }

    fn can_build(&self, name: &AnyName) -> bool {
        name == self.name.erase()
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        if component_type.matches(&self.name.component_type()) {
            vec![self.name.clone().into_any()]
        } else {
            Vec::new()
        }
    }

    fn bill_of_materials(&self, _name: &AnyName) -> BillOfMaterials {
        BillOfMaterials::new().with(Self::config_query())
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        let config = ctx.satisfied().one(&Self::config_query())?;
        let machine: Arc<dyn FactoryMachine> = Arc::new(ConfigElementsMachine { config });
        Ok(Some(BoxKind::Boundless.wrap(NamedComponent::new(self.name.clone(), machine))))
    }

    fn describe(&self) -> String {
        "ElementsFromConfigMachine".to_string()
    }
}

struct ConfigElementsMachine {
    config: Arc<Config>,
}

impl FactoryMachine for ConfigElementsMachine {
    fn priority(&self) -> i32 {
        0
    }

    fn can_build(&self, name: &AnyName) -> bool {
        let Some(element) = self.config.element(name.name()) else {
            return false;
        };
        let ty = name.component_type();
        ty == ComponentType::of::<ConfigElement>() || (ty == ComponentType::of::<String>() && !element.value.is_empty())
    }

    fn name_buildable_components(&self, component_type: &ComponentType) -> Vec<AnyName> {
        let mut names = Vec::new();
        if component_type.matches(&ComponentType::of::<String>()) {
            names.extend(
                self.config
                    .elements()
                    .iter()
                    .filter(|e| !e.value.is_empty())
                    .map(|e| Name::<String>::of(e.key.as_str()).into_any()),
            );
        }
        if component_type.matches(&ComponentType::of::<ConfigElement>()) {
            names.extend(
                self.config
                    .elements()
                    .iter()
                    .map(|e| Name::<ConfigElement>::of(e.key.as_str()).into_any()),
            );
        }
        names
    }

    fn new_component(&self, ctx: &BuildContext<'_>) -> FactoryResult<Option<Box<dyn ComponentBox>>> {
        let Some(element) = self.config.element(ctx.name().name()) else {
            return Ok(None);
        };
        if let Some(name) = ctx.name().downcast::<String>() {
            return Ok(Some(
                BoxKind::Boundless.wrap(NamedComponent::new(name, Arc::new(element.value.clone()))),
            ));
        }
        if let Some(name) = ctx.name().downcast::<ConfigElement>() {
            return Ok(Some(BoxKind::Boundless.wrap(NamedComponent::new(name, Arc::new(element.clone())))));
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        format!("ConfigElementsMachine({} keys)", self.config.len())
    }
}
