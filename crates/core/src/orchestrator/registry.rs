//! Set of job ids the orchestrator is still waiting on.

use std::collections::HashSet;

use parking_lot::{Mutex, MutexGuard};

use crate::job::JobId;

#[derive(Debug, Default)]
struct RegistryState {
    tracked: HashSet<JobId>,
    added: Vec<JobId>,
    removed: Vec<JobId>,
}

/// Shared, lock-guarded registry of in-flight jobs.
///
/// Every check-then-act sequence must go through [`JobRegistry::lock`] so the
/// membership test and the mutation happen under the same lock. The single-call
/// helpers take the lock for one operation only.
///
/// The registry also keeps a log of effective additions and removals, so a run
/// can prove that each tracked id left the registry exactly once.
#[derive(Debug, Default)]
pub struct JobRegistry {
    state: Mutex<RegistryState>,
}

/// Exclusive access to the registry for a compound operation.
///
/// Must not be held across an `.await`.
pub struct RegistryGuard<'a> {
    state: MutexGuard<'a, RegistryState>,
}

impl RegistryGuard<'_> {
    /// Start tracking a job. Returns false if it was already tracked.
    pub fn add(&mut self, job_id: JobId) -> bool {
        let inserted = self.state.tracked.insert(job_id);
        if inserted {
            self.state.added.push(job_id);
        }
        inserted
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.state.tracked.contains(&job_id)
    }

    /// Stop tracking a job. Removing an untracked id is a no-op and returns false.
    pub fn remove(&mut self, job_id: JobId) -> bool {
        let removed = self.state.tracked.remove(&job_id);
        if removed {
            self.state.removed.push(job_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.state.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.tracked.is_empty()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the registry lock for a compound check-then-act sequence.
    pub fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            state: self.state.lock(),
        }
    }

    pub fn add(&self, job_id: JobId) -> bool {
        self.lock().add(job_id)
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.lock().contains(job_id)
    }

    pub fn remove(&self, job_id: JobId) -> bool {
        self.lock().remove(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ids in the order they started being tracked.
    pub fn additions(&self) -> Vec<JobId> {
        self.state.lock().added.clone()
    }

    /// Ids in the order they stopped being tracked.
    pub fn removals(&self) -> Vec<JobId> {
        self.state.lock().removed.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_add_contains_remove() {
        let registry = JobRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.add(55));
        assert!(!registry.add(55));
        assert!(registry.contains(55));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(55));
        assert!(!registry.contains(55));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = JobRegistry::new();
        assert!(!registry.remove(7));

        registry.add(7);
        registry.remove(7);
        assert!(!registry.remove(7));
        assert_eq!(registry.removals(), vec![7]);
    }

    #[test]
    fn test_guard_check_then_act() {
        let registry = JobRegistry::new();
        registry.add(1);

        let mut guard = registry.lock();
        if guard.contains(1) {
            guard.remove(1);
        }
        assert!(guard.is_empty());
        drop(guard);

        assert_eq!(registry.additions(), vec![1]);
        assert_eq!(registry.removals(), vec![1]);
    }

    #[test]
    fn test_concurrent_removal_happens_once() {
        let registry = Arc::new(JobRegistry::new());
        for id in 0..50 {
            registry.add(id);
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for id in 0..50 {
                        registry.remove(id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut removed = registry.removals();
        removed.sort_unstable();
        assert_eq!(removed, (0..50).collect::<Vec<_>>());
        assert!(registry.is_empty());
    }
}
