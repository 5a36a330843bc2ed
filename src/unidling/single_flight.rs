// Per-app mutual exclusion so two requests for one app don't unidle it twice at once.
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct SingleFlight {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

pub struct FlightGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other caller holds `key`, then holds it until the
    /// guard is dropped.
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let lock = self.locks.entry(key.to_string()).or_default().clone();
        if lock.try_lock().is_err() {
            log::info!("Unidle of {} already in progress, waiting", key);
        }
        let guard = lock.lock_owned().await;
        FlightGuard {
            locks: &self.locks,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map's own handle left: nobody holds or waits on this key.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
