//! Core traits shared by the factory, its machines and its components.

mod dispose;
mod resolver;

pub use dispose::{AutoStartable, Dispose};
pub use resolver::{Resolver, ResolverCore};
pub(crate) use resolver::candidate_line;
