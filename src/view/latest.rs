use crate::analysis::RequestId;

/// Tracks the newest request a view has issued so older responses can be dropped.
#[derive(Debug, Default)]
pub struct LatestTracker {
    latest: Option<RequestId>,
}

impl LatestTracker {
    pub fn issued(&mut self, id: RequestId) {
        self.latest = Some(id);
    }

    /// Forget any outstanding request; every later response is stale.
    pub fn reset(&mut self) {
        self.latest = None;
    }

    pub fn pending(&self) -> Option<RequestId> {
        self.latest
    }

    pub fn accept(&self, id: RequestId) -> bool {
        self.latest == Some(id)
    }
}
