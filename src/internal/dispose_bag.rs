//! Close hooks attached to component boxes.

use parking_lot::Mutex;

use crate::error::FactoryResult;

type HookFn = Box<dyn FnOnce() -> FactoryResult<()> + Send>;

/// A release action that runs at most once.
///
/// Boxes keep their hook across customization so the resource of the
/// originally built instance is released even when a customizer replaced
/// the component.
#[derive(Default)]
pub(crate) struct CloseHook {
    hook: Mutex<Option<HookFn>>,
}

impl CloseHook {
    pub(crate) fn new(f: impl FnOnce() -> FactoryResult<()> + Send + 'static) -> Self {
        Self {
            hook: Mutex::new(Some(Box::new(f))),
        }
    }

    pub(crate) fn none() -> Self {
        Self::default()
    }

    /// Run the hook if it has not run yet.
    pub(crate) fn run(&self) -> FactoryResult<()> {
        let hook = self.hook.lock().take();
        match hook {
            Some(f) => f(),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.hook.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn hook_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let hook = CloseHook::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        hook.run().unwrap();
        hook.run().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!hook.is_pending());
    }
}
