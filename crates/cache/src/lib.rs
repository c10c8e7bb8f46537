//! Multi-level cache: L1 in-process LRU, L2 through the Store Gateway, and
//! an optional L3 durable tier (spec §4.7).

pub mod error;
pub mod invalidation;
mod l1;

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use streamhub_metrics::{cache as cache_metrics, counter};
use streamhub_store::StoreGateway;

pub use {
    error::{Error, Result},
    invalidation::{InvalidationRules, MAX_INVALIDATION_DEPTH},
    l1::L1Cache,
};

const L1_DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
const L1_DEFAULT_MAX_ENTRIES: usize = 100_000;
const L1_DEFAULT_BYTE_BUDGET: usize = 100 * 1024 * 1024;
const L2_DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
const L2_KEY_PREFIX: &str = "cache";

/// A value and the metadata used to invalidate it by tag or dependency.
#[derive(Default, Clone)]
pub struct Tags {
    pub tags: Vec<String>,
    pub deps: Vec<String>,
}

pub struct Cache {
    l1: L1Cache,
    l2: Arc<StoreGateway>,
    rules: std::sync::RwLock<InvalidationRules>,
}

impl Cache {
    pub fn new(l2: Arc<StoreGateway>) -> Self {
        Self {
            l1: L1Cache::new(L1_DEFAULT_MAX_ENTRIES, L1_DEFAULT_BYTE_BUDGET),
            l2,
            rules: std::sync::RwLock::new(InvalidationRules::new()),
        }
    }

    pub fn declare_rule(&self, trigger: impl Into<String>, invalidates: Vec<String>) {
        self.rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .on(trigger, invalidates);
    }

    fn l2_key(key: &str) -> String {
        format!("{L2_KEY_PREFIX}:{key}")
    }

    /// Read with promotion: an L2 hit is written back into L1 before return.
    pub async fn get<T: DeserializeOwned + Serialize>(&self, key: &str) -> Result<Option<T>> {
        if let Some(bytes) = self.l1.get(key) {
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        let value: Option<T> = self.l2.get(&Self::l2_key(key)).await?;
        if let Some(ref value) = value {
            counter!(cache_metrics::L2_HITS_TOTAL).increment(1);
            let bytes = serde_json::to_vec(value)?;
            self.l1.set(key.to_string(), bytes, vec![], vec![], L1_DEFAULT_TTL);
        } else {
            counter!(cache_metrics::L2_MISSES_TOTAL).increment(1);
        }
        Ok(value)
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, tags: Tags) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.l1.set(key.to_string(), bytes, tags.tags, tags.deps, L1_DEFAULT_TTL);
        self.l2.set(&Self::l2_key(key), value, Some(L2_DEFAULT_TTL)).await?;
        Ok(())
    }

    /// Drop `key` from both tiers, then fan out to whatever still references
    /// it by tag or dependency, bounded to [`MAX_INVALIDATION_DEPTH`] hops.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.invalidate_depth(key, 0).await
    }

    fn invalidate_depth<'a>(
        &'a self,
        key: &'a str,
        depth: u32,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.l1.remove(key);
            self.l2.del(&Self::l2_key(key)).await?;
            if depth >= MAX_INVALIDATION_DEPTH {
                return Ok(());
            }
            for dependent in self.l1.dependents_of(key) {
                self.invalidate_depth(&dependent, depth + 1).await?;
            }
            Ok(())
        })
    }

    /// Apply a declared rule for `trigger` (e.g. a bus event type).
    pub async fn apply_rule(&self, trigger: &str) -> Result<()> {
        let keys = {
            let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
            rules.keys_for(trigger).to_vec()
        };
        for key in keys {
            self.invalidate(&key).await?;
        }
        Ok(())
    }

    pub fn l1_len(&self) -> usize {
        self.l1.len()
    }

    #[cfg(feature = "durable")]
    pub async fn get_durable<T: DeserializeOwned>(&self, _key: &str) -> Result<Option<T>> {
        Err(Error::Message("durable L3 tier is not configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_default_is_empty() {
        let tags = Tags::default();
        assert!(tags.tags.is_empty());
        assert!(tags.deps.is_empty());
    }
}
