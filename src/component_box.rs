//! Lifecycle boxes wrapping built components.
//!
//! A machine hands the factory a [`ComponentBox`]; the warehouse stores it
//! and every later resolution of the same name reads `pick()`. Boundless
//! boxes always return their component; disposable boxes return it once.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::customizer::ComponentCustomizer;
use crate::error::FactoryResult;
use crate::internal::CloseHook;
use crate::name::{AnyComponent, AnyName};

/// Lifecycle wrapper around a built component.
pub trait ComponentBox: Send + Sync {
    /// Name of the boxed component. Stable for the box's whole life.
    fn name(&self) -> &AnyName;

    /// The component, or `None` once a disposable box has been consumed.
    fn pick(&self) -> Option<AnyComponent>;

    /// Release the underlying resources. Runs the close hook at most once.
    fn close(&self) -> FactoryResult<()>;

    /// Apply `customizer` to the boxed component, keeping the box kind and
    /// close hook.
    fn customize(self: Box<Self>, customizer: &dyn ComponentCustomizer) -> FactoryResult<Box<dyn ComponentBox>>;

    /// Short label used by dumps.
    fn describe(&self) -> String {
        format!("{}", self.name())
    }
}

impl fmt::Debug for dyn ComponentBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Always returns the same component.
pub struct BoundlessComponentBox {
    component: AnyComponent,
    hook: CloseHook,
}

impl BoundlessComponentBox {
    pub fn new(component: AnyComponent) -> Self {
        Self::with_hook(component, CloseHook::none())
    }

    pub(crate) fn with_hook(component: AnyComponent, hook: CloseHook) -> Self {
        Self { component, hook }
    }
}

impl ComponentBox for BoundlessComponentBox {
    fn name(&self) -> &AnyName {
        self.component.name()
    }

    fn pick(&self) -> Option<AnyComponent> {
        Some(self.component.clone())
    }

    fn close(&self) -> FactoryResult<()> {
        self.hook.run()
    }

    fn customize(self: Box<Self>, customizer: &dyn ComponentCustomizer) -> FactoryResult<Box<dyn ComponentBox>> {
        let BoundlessComponentBox { component, hook } = *self;
        let customized = customizer.customize(component)?;
        Ok(Box::new(BoundlessComponentBox::with_hook(customized, hook)))
    }

    fn describe(&self) -> String {
        format!("BoundlessComponentBox{{{}}}", self.component.name())
    }
}

/// Returns its component exactly once.
///
/// `pick` is serialized by an internal mutex, so among concurrent callers
/// exactly one receives the component.
pub struct DisposableComponentBox {
    name: AnyName,
    slot: Mutex<Option<AnyComponent>>,
    hook: CloseHook,
}

impl DisposableComponentBox {
    pub fn new(component: AnyComponent) -> Self {
        Self::with_hook(component, CloseHook::none())
    }

    pub(crate) fn with_hook(component: AnyComponent, hook: CloseHook) -> Self {
        Self {
            name: component.name().clone(),
            slot: Mutex::new(Some(component)),
            hook,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl ComponentBox for DisposableComponentBox {
    fn name(&self) -> &AnyName {
        &self.name
    }

    fn pick(&self) -> Option<AnyComponent> {
        self.slot.lock().take()
    }

    fn close(&self) -> FactoryResult<()> {
        self.hook.run()
    }

    fn customize(self: Box<Self>, customizer: &dyn ComponentCustomizer) -> FactoryResult<Box<dyn ComponentBox>> {
        let DisposableComponentBox { name, slot, hook } = *self;
        match slot.into_inner() {
            Some(component) => {
                let customized = customizer.customize(component)?;
                Ok(Box::new(DisposableComponentBox::with_hook(customized, hook)))
            }
            // already consumed: nothing to customize
            None => Ok(Box::new(DisposableComponentBox {
                name,
                slot: Mutex::new(None),
                hook,
            })),
        }
    }

    fn describe(&self) -> String {
        format!("DisposableComponentBox{{{}}}", self.name)
    }
}

/// Transformation applied to components picked through a [`ComponentBoxWrapper`].
pub type ComponentTransform = Arc<dyn Fn(AnyComponent) -> AnyComponent + Send + Sync>;

/// Decorates another box, transforming each picked component.
///
/// `close` and the box name are delegated, so the wrapper keeps the
/// identity of the box it wraps. The transformed value is cached per picked
/// instance: a boundless inner box keeps yielding one identical component.
pub struct ComponentBoxWrapper {
    inner: Box<dyn ComponentBox>,
    transform: ComponentTransform,
    // (picked, transformed); holding the picked instance keeps its address
    // from being reused while it serves as the cache key
    last: Mutex<Option<(AnyComponent, AnyComponent)>>,
}

impl ComponentBoxWrapper {
    pub fn new(inner: Box<dyn ComponentBox>, transform: ComponentTransform) -> Self {
        Self {
            inner,
            transform,
            last: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &dyn ComponentBox {
        self.inner.as_ref()
    }
}

impl ComponentBox for ComponentBoxWrapper {
    fn name(&self) -> &AnyName {
        self.inner.name()
    }

    fn pick(&self) -> Option<AnyComponent> {
        let picked = self.inner.pick()?;
        let mut last = self.last.lock();
        if let Some((cached_picked, cached)) = last.as_ref() {
            if cached_picked.instance_ptr() == picked.instance_ptr() {
                return Some(cached.clone());
            }
        }
        let transformed = (self.transform)(picked.clone());
        *last = Some((picked, transformed.clone()));
        Some(transformed)
    }

    fn close(&self) -> FactoryResult<()> {
        self.inner.close()
    }

    fn customize(self: Box<Self>, customizer: &dyn ComponentCustomizer) -> FactoryResult<Box<dyn ComponentBox>> {
        let ComponentBoxWrapper { inner, transform, .. } = *self;
        Ok(Box::new(ComponentBoxWrapper::new(inner.customize(customizer)?, transform)))
    }

    fn describe(&self) -> String {
        format!("ComponentBoxWrapper{{{}}}", self.inner.describe())
    }
}
