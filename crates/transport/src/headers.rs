use crate::error::ConfigurationError;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;

/// Shared, mutable request headers
///
/// Cloning yields a handle onto the same map. Every outgoing request reads the current map, so
/// updates apply from the next request on without rebuilding the transport.
#[derive(Clone, Debug, Default)]
pub struct HeaderStore {
    inner: Arc<RwLock<HeaderMap>>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or replaces) a header
    pub fn set(&self, name: &str, value: &str) -> Result<(), ConfigurationError> {
        let (name, value) = parse_header(name, value)?;
        self.inner.write().insert(name, value);
        Ok(())
    }

    pub fn remove(&self, name: &str) {
        self.inner.write().remove(name);
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.read().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    }

    /// Copy of the current headers
    pub fn snapshot(&self) -> HeaderMap {
        self.inner.read().clone()
    }
}

pub(crate) fn parse_header(
    name: &str,
    value: &str,
) -> Result<(HeaderName, HeaderValue), ConfigurationError> {
    let invalid = || ConfigurationError::InvalidHeader { name: name.to_string() };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_share_state() {
        let store = HeaderStore::new();
        let handle = store.clone();
        store.set("X-Session-Id", "abc").unwrap();
        assert_eq!(handle.get("x-session-id"), Some("abc".to_string()));

        handle.set("x-session-id", "def").unwrap();
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.get("X-Session-Id"), Some("def".to_string()));

        store.remove("x-session-id");
        assert!(handle.get("x-session-id").is_none());
    }

    #[test]
    fn rejects_invalid_header() {
        let store = HeaderStore::new();
        assert_eq!(
            store.set("bad header", "x"),
            Err(ConfigurationError::InvalidHeader { name: "bad header".into() })
        );
        assert!(store.set("x-ok", "line\nbreak").is_err());
    }
}
