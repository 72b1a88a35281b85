//! `bucketd-http` is an async HTTP client for the bucketd sharded metadata
//! store.
//!
//! Every operation runs against a bootstrap list of candidate hosts: the
//! client keeps a shuffled rotation of endpoints, sends each attempt to the
//! current head, and on a connection-level failure rotates to the next host
//! and retries, at most once per configured endpoint. Application-level
//! error responses are mapped to a closed set of [`ErrorKind`]s and never
//! retried.
//!
//! ```no_run
//! use bucketd_http::{BucketdClient, RequestContext};
//!
//! # async fn run() -> bucketd_http::Result<()> {
//! let client = BucketdClient::new(&["meta-1.local", "meta-2.local:9001"])?;
//! let ctx = RequestContext::new();
//! client.create_bucket("journal", r#"{"owner":"svc-ingest"}"#, &ctx).await?;
//! # Ok(())
//! # }
//! ```

mod bootstrap;
mod client;
mod context;
mod error;
mod options;
mod path;
mod types;
mod wire;

pub use bootstrap::{parse_bootstrap_list, Endpoint, DEFAULT_PORT};
pub use client::{BucketdClient, REQUEST_UIDS_HEADER};
pub use context::RequestContext;
pub use error::{BucketdError, ErrorKind};
pub use options::{ClientOptions, TlsOptions};
pub use types::ListParams;

pub type Result<T> = std::result::Result<T, BucketdError>;
