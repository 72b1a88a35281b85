use std::fmt;
use std::sync::Mutex;

use rand::seq::SliceRandom;

use crate::{BucketdError, Result};

/// Port used when a bootstrap entry omits one.
pub const DEFAULT_PORT: u16 = 9000;

/// A single candidate server address from the bootstrap list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses a bootstrap list of `host[:port]` strings.
///
/// Entries without a port default to [`DEFAULT_PORT`]. The list must be
/// non-empty and every entry must name a host.
pub fn parse_bootstrap_list<S: AsRef<str>>(entries: &[S]) -> Result<Vec<Endpoint>> {
    if entries.is_empty() {
        return Err(BucketdError::Config(
            "bootstrap list must not be empty".to_owned(),
        ));
    }
    entries
        .iter()
        .map(|entry| parse_entry(entry.as_ref()))
        .collect()
}

fn parse_entry(entry: &str) -> Result<Endpoint> {
    let entry = entry.trim();
    let (host, port) = match entry.split_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                BucketdError::Config(format!("port {port} is not a number in entry '{entry}'"))
            })?;
            (host, port)
        }
        None => (entry, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(BucketdError::Config(format!(
            "bootstrap entry '{entry}' has no host"
        )));
    }
    Ok(Endpoint {
        host: host.to_owned(),
        port,
    })
}

/// Ordered set of candidate endpoints shared by every in-flight call.
///
/// The head of the sequence is the endpoint used for the next attempt.
/// [`RotationState::rotate`] moves a failed head to the tail; entries are
/// never dropped, so a dead host is retried after a full cycle.
pub(crate) struct RotationState {
    endpoints: Mutex<Vec<Endpoint>>,
}

impl RotationState {
    /// Builds the rotation from a parsed bootstrap list, shuffling it so
    /// concurrent client instances do not all favor the same host first.
    pub(crate) fn new(mut endpoints: Vec<Endpoint>) -> Self {
        endpoints.shuffle(&mut rand::thread_rng());
        Self::with_order(endpoints)
    }

    /// Builds the rotation preserving the given order. Used when callers
    /// need a deterministic head, e.g. in tests.
    pub(crate) fn with_order(endpoints: Vec<Endpoint>) -> Self {
        debug_assert!(!endpoints.is_empty());
        Self {
            endpoints: Mutex::new(endpoints),
        }
    }

    pub(crate) fn current(&self) -> Endpoint {
        self.lock()[0].clone()
    }

    /// Moves the head endpoint to the tail and returns the new head.
    pub(crate) fn rotate(&self) -> Endpoint {
        let mut endpoints = self.lock();
        endpoints.rotate_left(1);
        endpoints[0].clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Endpoint>> {
        // A panic while the short critical section is held is the only way
        // to poison this mutex, and no code path in it can panic.
        self.endpoints
            .lock()
            .expect("rotation mutex must not be poisoned")
    }
}

impl fmt::Debug for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotationState")
            .field("endpoints", &*self.lock())
            .finish()
    }
}
