//! Keyed trailing-edge debouncer.
//!
//! Every `push` for a key restarts that key's timer; when the timer expires
//! the last pushed value is handed to the sink exactly once. Keys are
//! independent of each other.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::debug_if_enabled;

/// Receives the coalesced value once a key has been quiet for the window.
#[async_trait]
pub trait DebounceSink<V>: Send + Sync {
    async fn fire(&self, key: &str, value: V);
}

struct Pending<V> {
    generation: u64,
    value: V,
    handle: JoinHandle<()>,
}

pub struct Debouncer<V> {
    window: Duration,
    sink: Arc<dyn DebounceSink<V>>,
    pending: Arc<DashMap<String, Pending<V>>>,
    generation: AtomicU64,
}

impl<V> Debouncer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(window: Duration, sink: Arc<dyn DebounceSink<V>>) -> Self {
        Self {
            window,
            sink,
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedules `value` for `key`, replacing any value still waiting.
    pub fn push(&self, key: &str, value: V) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        // The entry guard is held while the timer is spawned so the timer can
        // never observe the map before its own generation is stored.
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get().handle.abort();
                let handle = self.spawn_timer(key.to_string(), generation);
                entry.insert(Pending {
                    generation,
                    value,
                    handle,
                });
                debug_if_enabled!("Debounce restarted for '{}'", key);
            }
            Entry::Vacant(entry) => {
                let handle = self.spawn_timer(key.to_string(), generation);
                entry.insert(Pending {
                    generation,
                    value,
                    handle,
                });
            }
        }
    }

    fn spawn_timer(&self, key: String, generation: u64) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        let sink = Arc::clone(&self.sink);
        let window = self.window;

        tokio::spawn(async move {
            sleep(window).await;
            let due = pending.remove_if(&key, |_, entry| entry.generation == generation);
            if let Some((key, entry)) = due {
                sink.fire(&key, entry.value).await;
            }
        })
    }

    /// Value waiting to be fired for `key`, if any.
    pub fn pending(&self, key: &str) -> Option<V> {
        self.pending.get(key).map(|entry| entry.value.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drops the waiting value for `key` without firing it.
    pub fn cancel(&self, key: &str) -> bool {
        match self.pending.remove(key) {
            Some((_, entry)) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Fires every waiting value now. Returns how many were fired.
    pub async fn flush(&self) -> usize {
        let keys: Vec<String> = self
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut fired = 0;
        for key in keys {
            if let Some((key, entry)) = self.pending.remove(&key) {
                entry.handle.abort();
                self.sink.fire(&key, entry.value).await;
                fired += 1;
            }
        }
        fired
    }
}

impl<V> Drop for Debouncer<V> {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        fired: Mutex<Vec<(String, u32)>>,
    }

    #[async_trait]
    impl DebounceSink<u32> for Recorder {
        async fn fire(&self, key: &str, value: u32) {
            self.fired.lock().push((key.to_string(), value));
        }
    }

    fn debouncer(window_ms: u64) -> (Debouncer<u32>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let debouncer = Debouncer::new(Duration::from_millis(window_ms), recorder.clone());
        (debouncer, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_pushes_coalesce_to_last_value() {
        let (debouncer, recorder) = debouncer(300);

        for i in 1..=10 {
            debouncer.push("windowBounds", i);
            sleep(Duration::from_millis(20)).await;
        }
        assert!(recorder.fired.lock().is_empty());
        assert_eq!(debouncer.pending("windowBounds"), Some(10));

        sleep(Duration::from_millis(400)).await;

        assert_eq!(*recorder.fired.lock(), vec![("windowBounds".to_string(), 10)]);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let (debouncer, recorder) = debouncer(100);

        debouncer.push("a", 1);
        debouncer.push("b", 2);
        debouncer.push("a", 3);
        sleep(Duration::from_millis(150)).await;

        let mut fired = recorder.fired.lock().clone();
        fired.sort();
        assert_eq!(fired, vec![("a".to_string(), 3), ("b".to_string(), 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_pushes_fire_separately() {
        let (debouncer, recorder) = debouncer(50);

        debouncer.push("k", 1);
        sleep(Duration::from_millis(80)).await;
        debouncer.push("k", 2);
        sleep(Duration::from_millis(80)).await;

        assert_eq!(
            *recorder.fired.lock(),
            vec![("k".to_string(), 1), ("k".to_string(), 2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn flush_fires_immediately_and_only_once() {
        let (debouncer, recorder) = debouncer(1000);

        debouncer.push("k", 7);
        assert_eq!(debouncer.flush().await, 1);
        assert_eq!(*recorder.fired.lock(), vec![("k".to_string(), 7)]);

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(recorder.fired.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_value() {
        let (debouncer, recorder) = debouncer(100);

        debouncer.push("k", 1);
        assert!(debouncer.cancel("k"));
        assert!(!debouncer.cancel("k"));
        sleep(Duration::from_millis(200)).await;
        assert!(recorder.fired.lock().is_empty());
    }
}
