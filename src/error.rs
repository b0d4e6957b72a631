//! Error types for the component factory.

use thiserror::Error;

/// Component factory errors
///
/// Absence is never an error: unknown names and optional queries with no
/// match resolve to `None` or an empty vector. These variants cover the
/// failures that abort a build or a teardown.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::FactoryError;
///
/// let cyclic = FactoryError::Cyclic(vec!["[A]a".to_string(), "[B]b".to_string(), "[A]a".to_string()]);
/// assert_eq!(cyclic.to_string(), "cyclic dependency detected: [A]a -> [B]b -> [A]a");
///
/// let failed = FactoryError::build_failed("[u32]port", "not a number");
/// assert!(failed.to_string().contains("[u32]port"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    /// A mandatory query resolved to nothing
    #[error("component satisfying {query} not found{}{}", required_by_suffix(.required_by), similar_suffix(.similar))]
    Unsatisfied {
        query: String,
        required_by: Option<String>,
        similar: Vec<String>,
    },
    /// A unique-result query matched several components
    #[error("more than one component is available for {query}. Available components:\n{}", .candidates.join("\n"))]
    Ambiguous { query: String, candidates: Vec<String> },
    /// A name was requested while already being built on the same chain
    #[error("cyclic dependency detected: {}", .0.join(" -> "))]
    Cyclic(Vec<String>),
    /// Resolution chain grew past the depth guard
    #[error("max resolution depth {0} exceeded")]
    DepthExceeded(usize),
    /// A machine's own build logic failed
    #[error("error while building {name}: {message}")]
    BuildFailed { name: String, message: String },
    /// A component could not be downcast to the requested type
    #[error("type mismatch for {name}: expected {expected}")]
    TypeMismatch { name: String, expected: &'static str },
    /// A machine produced a box under another name than the one requested
    #[error("machine asked to build {expected} produced {actual}")]
    NameMismatch { expected: String, actual: String },
    /// A mandatory accessor found nothing
    #[error("component not found: {0}")]
    NotFound(String),
    /// One or more boxes failed to close
    #[error("failed to close components:\n{}", .0.join("\n"))]
    Close(Vec<String>),
    /// Configuration could not be loaded or parsed
    #[error("configuration error: {0}")]
    Config(String),
    /// Graph export failed
    #[error("export error: {0}")]
    Export(String),
    /// Free-form failure raised by user code inside a machine
    #[error("{0}")]
    Other(String),
}

impl FactoryError {
    /// Wraps a build failure for the named component.
    pub fn build_failed(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        FactoryError::BuildFailed {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Free-form failure, wrapped by the factory with the component name.
    pub fn other(message: impl std::fmt::Display) -> Self {
        FactoryError::Other(message.to_string())
    }
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    match required_by {
        Some(name) => format!(" (required by {})", name),
        None => String::new(),
    }
}

fn similar_suffix(similar: &[String]) -> String {
    if similar.is_empty() {
        String::new()
    } else {
        format!(". similar components found: {}", similar.join(", "))
    }
}

/// Result type for factory operations
pub type FactoryResult<T> = Result<T, FactoryError>;
