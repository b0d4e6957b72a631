//! Box kinds controlling how a built component is handed out.

use crate::component_box::{BoundlessComponentBox, ComponentBox, DisposableComponentBox};
use crate::internal::CloseHook;
use crate::name::NamedComponent;
use crate::traits::Dispose;

/// How a built component may be picked from its box.
///
/// # Examples
///
/// ```rust
/// use ferrous_factory::{BoxKind, Name, NamedComponent};
/// use std::sync::Arc;
///
/// let singleton = BoxKind::Boundless.wrap(NamedComponent::new(Name::<u32>::of("port"), Arc::new(8080)));
/// assert!(singleton.pick().is_some());
/// assert!(singleton.pick().is_some());
///
/// let one_shot = BoxKind::Disposable.wrap(NamedComponent::new(Name::<u32>::of("token"), Arc::new(7)));
/// assert!(one_shot.pick().is_some());
/// assert!(one_shot.pick().is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxKind {
    /// Every pick returns the same instance
    ///
    /// Models long-lived singletons. The box never becomes empty.
    #[default]
    Boundless,
    /// Exactly one pick returns the instance
    ///
    /// Models a resource handed off to a single holder. Later picks, even
    /// concurrent ones, return nothing.
    Disposable,
}

impl BoxKind {
    /// Box `component` without a close hook.
    pub fn wrap<T>(self, component: NamedComponent<T>) -> Box<dyn ComponentBox>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.wrap_with_hook(component, CloseHook::none())
    }

    /// Box `component`; closing the box calls its [`Dispose::dispose`].
    pub fn wrap_disposing<T>(self, component: NamedComponent<T>) -> Box<dyn ComponentBox>
    where
        T: Dispose,
    {
        let instance = component.component().clone();
        self.wrap_with_hook(component, CloseHook::new(move || instance.dispose()))
    }

    /// Box `component`; closing the box runs `on_close` once.
    pub fn wrap_closing<T, F>(self, component: NamedComponent<T>, on_close: F) -> Box<dyn ComponentBox>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> crate::FactoryResult<()> + Send + 'static,
    {
        self.wrap_with_hook(component, CloseHook::new(on_close))
    }

    fn wrap_with_hook<T>(self, component: NamedComponent<T>, hook: CloseHook) -> Box<dyn ComponentBox>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self {
            BoxKind::Boundless => Box::new(BoundlessComponentBox::with_hook(component.into_any(), hook)),
            BoxKind::Disposable => Box::new(DisposableComponentBox::with_hook(component.into_any(), hook)),
        }
    }
}
