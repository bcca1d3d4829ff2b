//! HTTP fetcher — download whole audio files over ureq.
//!
//! Feature-gated behind `http` to keep the default build free of a TLS
//! stack. Non-2xx statuses are errors; the resolver treats them like any
//! other mirror failure and moves on.

use std::io::Read;

use crate::backend::Fetcher;
use crate::error::{PlayerError, Result};

/// Blocking HTTP fetcher backed by ureq.
pub struct UreqFetcher;

impl Fetcher for UreqFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = ureq::get(url)
            .call()
            .map_err(|e| PlayerError::Network(e.to_string()))?;

        let mut reader = response.into_body().into_reader();
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| PlayerError::Network(e.to_string()))?;
        Ok(bytes)
    }
}
