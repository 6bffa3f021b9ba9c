//! Timed notice board. Each posted notice stays visible until its ttl runs out.

use std::time::Instant;

use crate::controller::events::Notice;

#[derive(Debug, Default)]
pub struct NoticeBoard {
    posted: Vec<(Instant, Notice)>,
}

impl NoticeBoard {
    pub fn post(&mut self, notice: Notice, now: Instant) {
        self.posted.push((now, notice));
    }

    pub fn prune(&mut self, now: Instant) {
        self.posted
            .retain(|(posted_at, notice)| now.duration_since(*posted_at) < notice.ttl);
    }

    /// Live notices, newest first.
    pub fn visible(&mut self, now: Instant) -> Vec<&Notice> {
        self.prune(now);
        self.posted.iter().rev().map(|(_, notice)| notice).collect()
    }
}

#[cfg(test)]
#[path = "../tests/notices_tests.rs"]
mod tests;
