//! Access-token cache shared by the app-style channels.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Tokens are refreshed this long before they expire.
pub(super) const REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub(super) struct TokenCache {
    inner: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token, unless it expires within [`REFRESH_MARGIN`].
    pub fn get(&self) -> Option<String> {
        self.get_at(Instant::now())
    }

    fn get_at(&self, now: Instant) -> Option<String> {
        let guard = self.inner.lock();
        let token = guard.as_ref()?;
        (now + REFRESH_MARGIN < token.expires_at).then(|| token.value.clone())
    }

    pub fn store(&self, value: String, ttl: Duration) {
        *self.inner.lock() = Some(CachedToken {
            value,
            expires_at: Instant::now() + ttl,
        });
    }

    pub fn clear(&self) {
        *self.inner.lock() = None;
    }
}
