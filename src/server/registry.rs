//! Registry of STREAM subscribers, keyed by subscribed path string.
//!
//! A client appears under every path it subscribes to and is purged when
//! its stream ends. Readers clone under the read lock and never send while
//! holding it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::HashSet;

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    inner: RwLock<HashMap<String, HashSet<u64>>>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a client under each of the given path strings.
    pub(crate) fn register(&self, client_id: u64, paths: &[String]) {
        let mut inner = self.inner.write();
        for path in paths {
            inner.entry(path.clone()).or_default().insert(client_id);
        }
    }

    /// Removes a client from every path it was registered under; paths
    /// left without subscribers disappear.
    pub(crate) fn purge(&self, client_id: u64) {
        let mut inner = self.inner.write();
        for subscribers in inner.values_mut() {
            subscribers.remove(&client_id);
        }
        inner.retain(|_, subscribers| !subscribers.is_empty());
    }

    pub(crate) fn is_subscribed(&self, path: &str, client_id: u64) -> bool {
        self.inner
            .read()
            .get(path)
            .is_some_and(|subscribers| subscribers.contains(&client_id))
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, path: &str) -> usize {
        self.inner.read().get(path).map_or(0, HashSet::len)
    }
}
