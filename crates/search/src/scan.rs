//! Scan backend: visits every message, newest first

use std::sync::Arc;
use std::time::Instant;

use boardsearch_core::{ApiResult, ForumStore, Result, SearchCriteria};
use tracing::debug;

use crate::api::{unavailable, CandidateCollector, SearchApi};

/// Substring-style backend over a full message scan
pub struct StandardApi {
    forum: Arc<dyn ForumStore>,
}

impl StandardApi {
    /// Create a scan backend over the store
    pub fn new(forum: Arc<dyn ForumStore>) -> Self {
        StandardApi { forum }
    }
}

impl SearchApi for StandardApi {
    fn execute(&self, criteria: &SearchCriteria) -> Result<ApiResult> {
        let started = Instant::now();
        let mut collector = CandidateCollector::new(criteria, self.forum.as_ref())?;
        self.forum
            .scan_messages(&mut |message| collector.offer(message))
            .map_err(unavailable)?;
        let result = collector.finish()?;

        debug!(
            target: "boardsearch::api",
            backend = "standard",
            candidates = result.candidates.len(),
            total = result.total_count,
            elapsed_us = started.elapsed().as_micros() as u64,
            "scan complete"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "standard"
    }
}
