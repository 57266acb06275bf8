//! Match assembly strategies.
//!
//! A strategy walks the pass's outer tickets, pulls candidates through the
//! [`PassContext`] and commits the groups it forms. The context enforces
//! that a ticket or session is used at most once per pass.

mod custom;
mod default;

pub use custom::{CustomStrategy, MatchmakerOverride, ProposedGroup};
pub use default::DefaultStrategy;

use matchmaker_types::MatchedGroup;

use crate::error::MatchmakerError;
use crate::pass::PassContext;

pub trait AssemblyStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Form groups for one pass.
    ///
    /// An error fails the whole pass: no groups are dispatched and every
    /// ticket stays where it was.
    fn assemble(&self, ctx: &mut PassContext<'_>) -> Result<Vec<MatchedGroup>, MatchmakerError>;
}
