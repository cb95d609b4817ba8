//! Cached user directory lookups.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tartan_core::{BoxedUserInfoFinder, UserInfoFinder, UserInfoResult, UserProfile};
use tracing::trace;

use crate::cache::ArcCache;

/// Wraps a [`UserInfoFinder`] with an ARC cache of profiles.
///
/// Only successful lookups are cached; failures (including not-found) go
/// straight back to the caller and the next lookup asks the directory again.
/// Two concurrent misses for the same id may both load it.
pub struct CachingUserInfoFinder {
    inner: BoxedUserInfoFinder,
    cache: Mutex<ArcCache<String, UserProfile>>,
}

impl CachingUserInfoFinder {
    /// Caches up to `capacity` profiles from `inner`.
    pub fn new(inner: BoxedUserInfoFinder, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(ArcCache::new(capacity)),
        }
    }

    /// Wraps `inner` when `capacity` is set, otherwise returns it unchanged.
    pub fn wrap(inner: BoxedUserInfoFinder, capacity: Option<usize>) -> BoxedUserInfoFinder {
        match capacity {
            Some(capacity) => Arc::new(Self::new(inner, capacity)),
            None => inner,
        }
    }

    /// Number of cached profiles.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

#[async_trait]
impl UserInfoFinder for CachingUserInfoFinder {
    async fn get_user(&self, user_id: &str) -> UserInfoResult<UserProfile> {
        let key = user_id.to_string();
        let cached = self.cache.lock().get(&key).cloned();
        if let Some(profile) = cached {
            trace!(user_id, "User info cache hit");
            return Ok(profile);
        }

        let profile = self.inner.get_user(user_id).await?;
        self.cache.lock().insert(key, profile.clone());
        Ok(profile)
    }
}
