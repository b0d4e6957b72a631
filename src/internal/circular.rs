//! Cyclic dependency detection for one factory's build chain.

use std::cell::RefCell;

use smallvec::SmallVec;

use crate::error::{FactoryError, FactoryResult};
use crate::name::AnyName;

/// Longest build chain. Every level costs several frames, so this stays
/// well inside a default 2 MiB thread stack in debug builds.
pub(crate) const MAX_DEPTH: usize = 128;

/// Names currently being built, outermost first.
///
/// Lives inside the factory's reentrant build lock, so only the thread
/// holding the lock ever touches it.
#[derive(Default)]
pub(crate) struct ResolutionChain {
    stack: SmallVec<[AnyName; 8]>,
}

impl ResolutionChain {
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> Option<&AnyName> {
        self.stack.last()
    }
}

/// Keeps a name on the chain for the duration of its build.
pub(crate) struct ChainGuard<'a> {
    chain: &'a RefCell<ResolutionChain>,
}

impl<'a> ChainGuard<'a> {
    /// Pushes `name`, failing if it is already being built or the chain is too deep.
    pub(crate) fn enter(chain: &'a RefCell<ResolutionChain>, name: &AnyName) -> FactoryResult<Self> {
        let mut c = chain.borrow_mut();

        // Cycle check BEFORE pushing the new name
        if let Some(start) = c.stack.iter().position(|n| n == name) {
            let mut path: Vec<String> = c.stack[start..].iter().map(ToString::to_string).collect();
            path.push(name.to_string());
            return Err(FactoryError::Cyclic(path));
        }

        if c.stack.len() >= MAX_DEPTH {
            return Err(FactoryError::DepthExceeded(c.stack.len()));
        }

        c.stack.push(name.clone());
        Ok(Self { chain })
    }
}

impl Drop for ChainGuard<'_> {
    fn drop(&mut self) {
        self.chain.borrow_mut().stack.pop();
    }
}
