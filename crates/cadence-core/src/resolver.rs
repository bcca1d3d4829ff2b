//! Mirror resolution — one decoded buffer out of a set of candidate URLs.
//!
//! Mirrors are tried strictly in order; the first URL that both fetches and
//! decodes wins. Concurrent resolutions whose URL sets overlap collapse onto
//! one underlying fetch chain: the first caller owns the job, later callers
//! wait on it and receive the same shared outcome.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::backend::{AudioData, Decoder, Fetcher};
use crate::error::PlayerError;

/// Shared outcome of one resolution.
pub type ResolveResult = Result<Arc<AudioData>, PlayerError>;

/// One in-flight resolution, shared by every caller whose URL set overlaps.
#[derive(Default)]
struct UrlJob {
    outcome: Mutex<Option<ResolveResult>>,
    settled: Condvar,
}

/// Resolves mirror URL sets to decoded audio data.
pub struct SourceResolver {
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn Decoder>,
    /// URL -> pending job. Entries exist only while a job is in flight;
    /// insert and remove happen under this one lock.
    in_flight: Mutex<HashMap<String, Arc<UrlJob>>>,
}

impl SourceResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, decoder: Arc<dyn Decoder>) -> Self {
        Self {
            fetcher,
            decoder,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `urls` to decoded audio data, reusing any in-flight job that
    /// already covers one of them.
    pub fn resolve(&self, urls: &[String]) -> ResolveResult {
        if urls.is_empty() {
            return Err(PlayerError::NoValidSource);
        }

        let (job, owner) = {
            let mut map = self.in_flight.lock();
            if let Some(job) = urls.iter().find_map(|url| map.get(url)) {
                (Arc::clone(job), false)
            } else {
                let job = Arc::new(UrlJob::default());
                for url in urls {
                    map.insert(url.clone(), Arc::clone(&job));
                }
                (job, true)
            }
        };

        if !owner {
            let mut outcome = job.outcome.lock();
            while outcome.is_none() {
                job.settled.wait(&mut outcome);
            }
            // The loop above only exits once the owner published an outcome.
            return outcome.clone().unwrap_or(Err(PlayerError::NoValidSource));
        }

        let result = self.try_mirrors(urls);

        {
            let mut map = self.in_flight.lock();
            for url in urls {
                map.remove(url);
            }
        }

        let mut outcome = job.outcome.lock();
        *outcome = Some(result.clone());
        job.settled.notify_all();

        result
    }

    /// Try each mirror once, in order. Individual failures are logged and
    /// recovered by falling through to the next URL; only exhaustion
    /// surfaces.
    fn try_mirrors(&self, urls: &[String]) -> ResolveResult {
        for url in urls {
            let attempt = self
                .fetcher
                .get(url)
                .and_then(|bytes| self.decoder.decode(&bytes));
            match attempt {
                Ok(data) => return Ok(Arc::new(data)),
                Err(err) => log::warn!("cadence: source {} failed: {}", url, err),
            }
        }
        Err(PlayerError::NoValidSource)
    }
}
