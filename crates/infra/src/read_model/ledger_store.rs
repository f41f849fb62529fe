use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use renqing_core::LedgerId;

/// Ledger-isolated key/value store for disposable read models.
///
/// Read models are rebuildable from the event streams; this store holds no
/// source of truth.
pub trait LedgerStore<K, V>: Send + Sync {
    fn get(&self, ledger_id: LedgerId, key: &K) -> Option<V>;
    fn upsert(&self, ledger_id: LedgerId, key: K, value: V);
    fn remove(&self, ledger_id: LedgerId, key: &K);
    fn list(&self, ledger_id: LedgerId) -> Vec<V>;
    /// Drop every record of a ledger (rebuild support).
    fn clear_ledger(&self, ledger_id: LedgerId);
}

impl<K, V, S> LedgerStore<K, V> for Arc<S>
where
    S: LedgerStore<K, V> + ?Sized,
{
    fn get(&self, ledger_id: LedgerId, key: &K) -> Option<V> {
        (**self).get(ledger_id, key)
    }

    fn upsert(&self, ledger_id: LedgerId, key: K, value: V) {
        (**self).upsert(ledger_id, key, value)
    }

    fn remove(&self, ledger_id: LedgerId, key: &K) {
        (**self).remove(ledger_id, key)
    }

    fn list(&self, ledger_id: LedgerId) -> Vec<V> {
        (**self).list(ledger_id)
    }

    fn clear_ledger(&self, ledger_id: LedgerId) {
        (**self).clear_ledger(ledger_id)
    }
}

/// In-memory ledger-isolated store for dev and tests.
#[derive(Debug)]
pub struct InMemoryLedgerStore<K, V> {
    inner: RwLock<HashMap<(LedgerId, K), V>>,
}

impl<K, V> InMemoryLedgerStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryLedgerStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LedgerStore<K, V> for InMemoryLedgerStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, ledger_id: LedgerId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(ledger_id, key.clone())).cloned()
    }

    fn upsert(&self, ledger_id: LedgerId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((ledger_id, key), value);
        }
    }

    fn remove(&self, ledger_id: LedgerId, key: &K) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&(ledger_id, key.clone()));
        }
    }

    fn list(&self, ledger_id: LedgerId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((l, _k), v)| if *l == ledger_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_ledger(&self, ledger_id: LedgerId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(l, _k), _v| *l != ledger_id);
        }
    }
}
