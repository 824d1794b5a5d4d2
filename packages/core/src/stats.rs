//! Aggregate job counts.

use serde::{Deserialize, Serialize};

use crate::JobState;

/// Statistics for the queue's current contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStats {
    /// Number of pending jobs (including those waiting out a backoff).
    pub pending: u64,
    /// Number of jobs held by a worker.
    pub processing: u64,
    /// Number of completed jobs.
    pub completed: u64,
    /// Number of jobs in the reserved `failed` state.
    pub failed: u64,
    /// Number of dead-lettered jobs.
    pub dead: u64,
    /// Sum of all of the above.
    pub total: u64,
}

impl JobStats {
    /// Add `count` jobs observed in `state`.
    pub fn record(&mut self, state: JobState, count: u64) {
        *self.slot(state) += count;
        self.total += count;
    }

    /// Count of jobs in `state`.
    pub fn get(&self, state: JobState) -> u64 {
        match state {
            JobState::Pending => self.pending,
            JobState::Processing => self.processing,
            JobState::Completed => self.completed,
            JobState::Failed => self.failed,
            JobState::Dead => self.dead,
        }
    }

    /// Jobs that still need a worker (pending + processing).
    pub fn active(&self) -> u64 {
        self.pending + self.processing
    }

    fn slot(&mut self, state: JobState) -> &mut u64 {
        match state {
            JobState::Pending => &mut self.pending,
            JobState::Processing => &mut self.processing,
            JobState::Completed => &mut self.completed,
            JobState::Failed => &mut self.failed,
            JobState::Dead => &mut self.dead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_total_in_step() {
        let mut stats = JobStats::default();
        stats.record(JobState::Pending, 2);
        stats.record(JobState::Dead, 1);
        stats.record(JobState::Completed, 4);

        assert_eq!(stats.total, 7);
        assert_eq!(stats.active(), 2);
        let summed: u64 = JobState::ALL.iter().map(|s| stats.get(*s)).sum();
        assert_eq!(summed, stats.total);
    }
}
