//! HTTP client pool for maintaining persistent connections per base URL.
//!
//! Every decision is one HTTP request to the same endpoint, so reusing the connection
//! avoids a DNS lookup and TLS handshake per chat message. One `reqwest::Client` is kept
//! per base URL and cloned out (clones share the underlying pool).

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    /// Global HTTP client pool, lazily initialized on first access.
    static ref HTTP_CLIENT_POOL: Mutex<HashMap<String, reqwest::Client>> =
        Mutex::new(HashMap::new());
}

/// Get or create a shared HTTP client for the given base URL.
///
/// The client keeps idle connections for 90 seconds, sends TCP keepalives every 60 seconds
/// and gives up connecting after 30 seconds. There is no overall request timeout here; the
/// brain bounds each decision itself.
pub fn get_http_client(base_url: &str) -> Result<reqwest::Client, reqwest::Error> {
    let mut pool = HTTP_CLIENT_POOL
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(client) = pool.get(base_url) {
        return Ok(client.clone());
    }

    let client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(Duration::from_secs(30))
        .build()?;

    pool.insert(base_url.to_string(), client.clone());
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_keeps_one_entry_per_base_url() {
        let url = "https://pool.test.invalid/v1";
        get_http_client(url).unwrap();
        get_http_client(url).unwrap();

        let other = "http://localhost:11434/v1";
        get_http_client(other).unwrap();

        let pool = HTTP_CLIENT_POOL.lock().unwrap();
        assert!(pool.contains_key(url));
        assert!(pool.contains_key(other));
    }
}
