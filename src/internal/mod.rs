//! Internal implementation modules.

pub(crate) mod circular;
pub(crate) mod dispose_bag;

pub(crate) use circular::{ChainGuard, ResolutionChain};
pub(crate) use dispose_bag::CloseHook;
