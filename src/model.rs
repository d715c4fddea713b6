// src/model.rs
//
// Model acquisition: fetch bytes over HTTP, validate the response before
// any inference session exists, and cache built sessions by URL so repeat
// loads never refetch.

use crate::inference::{InferenceSession, OrtSession};
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Seam between downloaded model bytes and a runnable session. Lets the
/// loader be exercised without ONNX Runtime present.
pub trait SessionFactory: Send + Sync {
    type Session: InferenceSession;

    fn create(&self, bytes: &[u8]) -> Result<Self::Session>;
}

pub struct OrtSessionFactory {
    pub num_threads: usize,
}

impl SessionFactory for OrtSessionFactory {
    type Session = OrtSession;

    fn create(&self, bytes: &[u8]) -> Result<OrtSession> {
        OrtSession::from_bytes(bytes, self.num_threads)
    }
}

pub struct ModelLoader<F: SessionFactory> {
    factory: F,
    http: reqwest::Client,
    cache: Mutex<HashMap<String, Arc<F::Session>>>,
}

impl<F: SessionFactory> ModelLoader<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            http: reqwest::Client::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch, validate, and build the session for `url`, or return the
    /// cached session from an earlier load of the same URL.
    pub async fn load(&self, url: &str) -> Result<Arc<F::Session>> {
        if let Some(session) = self.cached(url) {
            debug!("model cache hit: {}", url);
            return Ok(session);
        }

        info!("Fetching model: {}", url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("model fetch failed: {}", url))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        // Validation gates both the body download and session construction.
        validate_model_response(status, content_type.as_deref())?;

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("model download failed: {}", url))?;

        self.admit(url, &bytes)
    }

    fn cached(&self, url: &str) -> Option<Arc<F::Session>> {
        self.cache.lock().ok()?.get(url).cloned()
    }

    fn admit(&self, url: &str, bytes: &[u8]) -> Result<Arc<F::Session>> {
        let session = Arc::new(self.factory.create(bytes)?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url.to_string(), Arc::clone(&session));
        }
        Ok(session)
    }
}

/// Reject responses that cannot be model bytes. Error pages served with a
/// 200 and a text content-type are the common CDN failure mode.
pub fn validate_model_response(status: u16, content_type: Option<&str>) -> Result<()> {
    if !(200..300).contains(&status) {
        bail!("model fetch returned HTTP {}", status);
    }

    if let Some(ct) = content_type {
        if ct.to_ascii_lowercase().starts_with("text/") {
            bail!("model fetch returned non-binary content-type '{}'", ct);
        }
    }

    Ok(())
}
