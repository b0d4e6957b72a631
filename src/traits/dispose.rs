//! Lifecycle traits for components held by a warehouse.

use crate::error::FactoryResult;

/// Trait for releasing resources when the owning warehouse closes.
///
/// Boxes built with [`BoxKind::wrap_disposing`](crate::BoxKind::wrap_disposing)
/// call `dispose` once from their `close`. Errors are collected by
/// [`Warehouse::close`](crate::Warehouse::close) rather than stopping teardown.
///
/// # Examples
///
/// ```
/// use ferrous_factory::{BoxKind, Dispose, FactoryResult, Name, NamedComponent};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Pool {
///     open: AtomicBool,
/// }
///
/// impl Dispose for Pool {
///     fn dispose(&self) -> FactoryResult<()> {
///         self.open.store(false, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let pool = Arc::new(Pool { open: AtomicBool::new(true) });
/// let component_box = BoxKind::Boundless
///     .wrap_disposing(NamedComponent::new(Name::<Pool>::of("pool"), pool.clone()));
/// component_box.close().unwrap();
/// assert!(!pool.open.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self) -> FactoryResult<()>;
}

/// Components started by [`Factory::start`](crate::Factory::start).
///
/// Register them under the `dyn AutoStartable` type; they are started in
/// discovery order.
pub trait AutoStartable: Send + Sync {
    fn start(&self) -> FactoryResult<()>;
}
