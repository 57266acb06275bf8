//! Delivery of formed groups.

use matchmaker_types::MatchedGroup;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Receives every group a pass forms, after the matched tickets have left
/// the index and registry.
pub trait MatchDispatcher: Send + Sync {
    fn dispatch(&self, group: &MatchedGroup);
}

impl<F> MatchDispatcher for F
where
    F: Fn(&MatchedGroup) + Send + Sync,
{
    fn dispatch(&self, group: &MatchedGroup) {
        self(group)
    }
}

impl MatchDispatcher for UnboundedSender<MatchedGroup> {
    fn dispatch(&self, group: &MatchedGroup) {
        if self.send(group.clone()).is_err() {
            warn!(token = %group.token, size = group.size(), "Match receiver dropped");
        }
    }
}

/// Discards groups.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl MatchDispatcher for NoopDispatcher {
    fn dispatch(&self, _group: &MatchedGroup) {}
}
