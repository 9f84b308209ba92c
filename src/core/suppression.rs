//! Suppression window tracker
//!
//! After the dispatcher acts on a device or group, polled state for that
//! identity is ignored until the board has had time to report the new value.
//! Marks are counted, so two overlapping operations on the same identity keep
//! it suppressed until both have released it.

use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};

use super::{catalog::IdentityKey, task_manager::spawn_delayed_task};

#[derive(Debug, Default)]
pub struct SuppressionTracker {
    active: Mutex<HashMap<IdentityKey, usize>>,
}

impl SuppressionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mark_active(&self, keys: &[IdentityKey]) {
        let mut active = self.active.lock();
        for key in keys {
            *active.entry(key.clone()).or_insert(0) += 1;
        }
    }

    pub fn is_suppressed(&self, key: &IdentityKey) -> bool {
        self.active.lock().contains_key(key)
    }

    /// Drop one mark from each key; a key is released once no marks remain.
    pub fn release(&self, keys: &[IdentityKey]) {
        let mut active = self.active.lock();
        for key in keys {
            if let Some(count) = active.get_mut(key) {
                *count -= 1;
                if *count == 0 {
                    active.remove(key);
                }
            }
        }
    }

    /// Schedule [`release`](Self::release) once `delay` has elapsed.
    pub fn release_after(
        self: &Arc<Self>,
        keys: Vec<IdentityKey>,
        delay: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(self);
        spawn_delayed_task(delay, move || {
            tracker.release(&keys);
            log::debug!("Released suppression for {} identities", keys.len());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_marks_need_matching_releases() {
        let tracker = SuppressionTracker::default();
        let lamp = IdentityKey::device("a", 1);
        let lights = IdentityKey::group("a", "Lights");

        tracker.mark_active(&[lamp.clone(), lights.clone()]);
        tracker.mark_active(&[lamp.clone()]);
        assert!(tracker.is_suppressed(&lamp));

        tracker.release(&[lamp.clone(), lights.clone()]);
        assert!(tracker.is_suppressed(&lamp));
        assert!(!tracker.is_suppressed(&lights));

        tracker.release(&[lamp.clone()]);
        assert!(!tracker.is_suppressed(&lamp));

        // Releasing an unknown key is a no-op.
        tracker.release(&[lamp.clone()]);
        assert!(!tracker.is_suppressed(&lamp));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_after_waits_for_delay() -> anyhow::Result<()> {
        let tracker = SuppressionTracker::new();
        let key = IdentityKey::device("a", 3);
        tracker.mark_active(&[key.clone()]);

        let handle = tracker.release_after(vec![key.clone()], Duration::from_millis(3000));
        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(tracker.is_suppressed(&key));

        handle.await?;
        assert!(!tracker.is_suppressed(&key));
        Ok(())
    }
}
