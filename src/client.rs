use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Method};
use tracing::{debug, trace, warn};

use crate::{
    bootstrap::{parse_bootstrap_list, RotationState},
    error::classify_response,
    path::encode_segment,
    BucketdError, ClientOptions, ListParams, RequestContext, Result, TlsOptions,
};

/// Header carrying the per-call correlation identifier.
pub const REQUEST_UIDS_HEADER: &str = "x-request-uids";

/// HTTP client for the bucketd metadata service.
///
/// Holds the shared endpoint rotation and the keep-alive connection pool;
/// cloning is cheap and clones share both.
#[derive(Clone)]
pub struct BucketdClient {
    http: reqwest::Client,
    rotation: Arc<RotationState>,
    use_https: bool,
    options: ClientOptions,
}

impl fmt::Debug for BucketdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketdClient")
            .field("rotation", &self.rotation)
            .field("use_https", &self.use_https)
            .field("options", &self.options)
            .finish()
    }
}

/// Outcome of one attempt against one endpoint.
enum AttemptFailure {
    /// Application-level or caller error. Terminal, never retried.
    Fatal(BucketdError),
    /// Connection-level failure. Drives the failover rotation.
    Transport(reqwest::Error),
}

impl BucketdClient {
    /// Creates a client from a bootstrap list of `host[:port]` strings.
    ///
    /// The parsed list is shuffled once so a fleet of clients spreads its
    /// first attempts across the configured hosts.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bucketd_http::BucketdClient;
    ///
    /// let client = BucketdClient::new(&["meta-1.local", "meta-2.local:9001"])?;
    /// # Ok::<(), bucketd_http::BucketdError>(())
    /// ```
    pub fn new<S: AsRef<str>>(bootstrap: &[S]) -> Result<Self> {
        let endpoints = parse_bootstrap_list(bootstrap)?;
        Ok(Self {
            http: build_transport(reqwest::Client::builder())?,
            rotation: Arc::new(RotationState::new(endpoints)),
            use_https: false,
            options: ClientOptions::default(),
        })
    }

    /// Creates a client that keeps the bootstrap list order instead of
    /// shuffling it. Intended for tests and debugging, where a
    /// deterministic first endpoint matters.
    pub fn new_ordered<S: AsRef<str>>(bootstrap: &[S]) -> Result<Self> {
        let endpoints = parse_bootstrap_list(bootstrap)?;
        Ok(Self {
            http: build_transport(reqwest::Client::builder())?,
            rotation: Arc::new(RotationState::with_order(endpoints)),
            use_https: false,
            options: ClientOptions::default(),
        })
    }

    /// Applies timeout options.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Switches the transport to HTTPS with the given TLS material.
    ///
    /// Providing `identity_pem` enables mutual TLS.
    pub fn with_tls(mut self, tls: TlsOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(ca_pem) = &tls.ca_pem {
            let certificate = reqwest::Certificate::from_pem(ca_pem)
                .map_err(|err| BucketdError::Config(format!("invalid CA certificate: {err}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        if let Some(identity_pem) = &tls.identity_pem {
            let identity = reqwest::Identity::from_pem(identity_pem)
                .map_err(|err| BucketdError::Config(format!("invalid client identity: {err}")))?;
            builder = builder.identity(identity);
        }
        self.http = build_transport(builder)?;
        self.use_https = true;
        Ok(self)
    }

    // ── Bucket operations ───────────────────────────────────────────────

    /// Creates a bucket with the given attribute document.
    pub async fn create_bucket(
        &self,
        bucket: &str,
        attributes: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        require_name("bucket name", bucket)?;
        let path = format!("/default/bucket/{}", encode_segment(bucket));
        self.request(Method::POST, &path, &[], Some(attributes.as_bytes()), ctx)
            .await
    }

    pub async fn delete_bucket(&self, bucket: &str, ctx: &RequestContext) -> Result<Vec<u8>> {
        require_name("bucket name", bucket)?;
        let path = format!("/default/bucket/{}", encode_segment(bucket));
        self.request(Method::DELETE, &path, &[], None, ctx).await
    }

    pub async fn get_bucket_attributes(
        &self,
        bucket: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        require_name("bucket name", bucket)?;
        let path = format!("/default/attributes/{}", encode_segment(bucket));
        self.request(Method::GET, &path, &[], None, ctx).await
    }

    pub async fn put_bucket_attributes(
        &self,
        bucket: &str,
        attributes: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        require_name("bucket name", bucket)?;
        let path = format!("/default/attributes/{}", encode_segment(bucket));
        self.request(Method::POST, &path, &[], Some(attributes.as_bytes()), ctx)
            .await
    }

    /// Lists object keys in a bucket, forwarding the given filters as
    /// query parameters.
    pub async fn list_object(
        &self,
        bucket: &str,
        params: &ListParams,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        require_name("bucket name", bucket)?;
        let path = format!("/default/bucket/{}", encode_segment(bucket));
        self.request(Method::GET, &path, &params.to_query(), None, ctx)
            .await
    }

    // ── Object operations ───────────────────────────────────────────────

    /// Stores an object value under `bucket/key`.
    ///
    /// The value is sent as raw bytes; keys may contain `/` and are
    /// percent-encoded so they address a single path segment.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        value: &[u8],
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        let path = object_path(bucket, key)?;
        self.request(Method::POST, &path, &[], Some(value), ctx)
            .await
    }

    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        let path = object_path(bucket, key)?;
        self.request(Method::GET, &path, &[], None, ctx).await
    }

    /// Fetches bucket attributes and the object value in one round trip.
    pub async fn get_bucket_and_object(
        &self,
        bucket: &str,
        key: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        require_name("bucket name", bucket)?;
        require_name("object key", key)?;
        let path = format!(
            "/default/parallel/{}/{}",
            encode_segment(bucket),
            encode_segment(key)
        );
        self.request(Method::GET, &path, &[], None, ctx).await
    }

    pub async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        let path = object_path(bucket, key)?;
        self.request(Method::DELETE, &path, &[], None, ctx).await
    }

    // ── Raft/administration operations ──────────────────────────────────

    /// Returns the leader endpoint of the raft session owning a bucket.
    pub async fn get_bucket_leader(&self, bucket: &str, ctx: &RequestContext) -> Result<Vec<u8>> {
        require_name("bucket name", bucket)?;
        let path = format!("/default/leader/{}", encode_segment(bucket));
        self.request(Method::GET, &path, &[], None, ctx).await
    }

    /// Returns raft session information for a bucket.
    pub async fn get_raft_information(
        &self,
        bucket: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        require_name("bucket name", bucket)?;
        let path = format!("/default/informations/{}", encode_segment(bucket));
        self.request(Method::GET, &path, &[], None, ctx).await
    }

    /// Lists every raft session known to the contacted host.
    pub async fn get_all_rafts(&self, ctx: &RequestContext) -> Result<Vec<u8>> {
        self.request(Method::GET, "/_/raft_sessions/", &[], None, ctx)
            .await
    }

    /// Fetches a slice of a raft session's log.
    pub async fn get_raft_log(
        &self,
        raft_id: &str,
        begin: Option<u64>,
        limit: Option<u64>,
        target_leader: bool,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        require_name("raft session id", raft_id)?;
        let path = format!("/_/raft_sessions/{}/log", encode_segment(raft_id));
        let mut query = Vec::new();
        if let Some(begin) = begin {
            query.push(("begin".to_owned(), begin.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit".to_owned(), limit.to_string()));
        }
        if target_leader {
            query.push(("targetLeader".to_owned(), "true".to_owned()));
        }
        self.request(Method::GET, &path, &query, None, ctx).await
    }

    /// Lists the buckets attached to a raft session.
    pub async fn get_raft_buckets(&self, raft_id: &str, ctx: &RequestContext) -> Result<Vec<u8>> {
        require_name("raft session id", raft_id)?;
        let path = format!("/_/raft_sessions/{}/bucket", encode_segment(raft_id));
        self.request(Method::GET, &path, &[], None, ctx).await
    }

    /// Returns placement information for a bucket.
    pub async fn get_bucket_information(
        &self,
        bucket: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        require_name("bucket name", bucket)?;
        let path = format!("/_/buckets/{}", encode_segment(bucket));
        self.request(Method::GET, &path, &[], None, ctx).await
    }

    /// Checks that the contacted host is up and serving.
    pub async fn healthcheck(&self, ctx: &RequestContext) -> Result<Vec<u8>> {
        self.request(Method::GET, "/_/healthcheck", &[], None, ctx)
            .await
    }

    /// Deep health probe exercising the write path.
    pub async fn livecheck(&self, ctx: &RequestContext) -> Result<Vec<u8>> {
        self.request(Method::POST, "/_/livecheck", &[], None, ctx)
            .await
    }

    // ── Request/failover engine ─────────────────────────────────────────

    /// Runs one logical call, failing over across the rotation on
    /// transport errors and applying the optional overall deadline.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&[u8]>,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        match self.options.operation_timeout_ms {
            Some(timeout_ms) => {
                tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    self.failover(method, path, query, body, ctx),
                )
                .await
                .map_err(|_| BucketdError::OperationTimeout { timeout_ms })?
            }
            None => self.failover(method, path, query, body, ctx).await,
        }
    }

    /// Bounded retry loop: every bootstrap endpoint is tried at most once
    /// per logical call. Only transport failures rotate; success and
    /// application errors leave the current head in place for the next
    /// call.
    async fn failover(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&[u8]>,
        ctx: &RequestContext,
    ) -> Result<Vec<u8>> {
        let mut attempt = 0usize;
        loop {
            let endpoint = self.rotation.current();
            match self
                .execute(&endpoint, method.clone(), path, query, body, ctx, attempt)
                .await
            {
                Ok(body) => return Ok(body),
                Err(AttemptFailure::Fatal(err)) => return Err(err),
                Err(AttemptFailure::Transport(source)) => {
                    attempt += 1;
                    if attempt >= self.rotation.len() {
                        warn!(
                            uid = ctx.uid(),
                            attempts = attempt,
                            error = %source,
                            "every bootstrap endpoint failed, giving up"
                        );
                        return Err(BucketdError::Transport {
                            attempts: attempt,
                            source,
                        });
                    }
                    let next = self.rotation.rotate();
                    warn!(
                        uid = ctx.uid(),
                        failed = %endpoint,
                        next = %next,
                        attempt,
                        error = %source,
                        "transport failure, rotating endpoint"
                    );
                }
            }
        }
    }

    /// Sends a single attempt against one endpoint, buffers the response
    /// body and classifies the outcome.
    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        endpoint: &crate::Endpoint,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&[u8]>,
        ctx: &RequestContext,
        attempt: usize,
    ) -> std::result::Result<Vec<u8>, AttemptFailure> {
        let url = format!("{}://{}{}", self.scheme(), endpoint, path);
        debug!(
            uid = ctx.uid(),
            method = %method,
            %url,
            attempt,
            "sending request"
        );
        let mut request = self
            .http
            .request(method, &url)
            .header(REQUEST_UIDS_HEADER, ctx.uid())
            .timeout(Duration::from_millis(self.options.request_timeout_ms));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            // The payload is already transport-ready; send it untouched
            // with an exact length instead of re-encoding.
            request = request
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .header(header::CONTENT_LENGTH, body.len().to_string())
                .body(body.to_vec());
        }

        let response = request.send().await.map_err(AttemptFailure::Transport)?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(AttemptFailure::Transport)?;

        if status <= 201 {
            trace!(uid = ctx.uid(), status, bytes = bytes.len(), "success");
            Ok(bytes.to_vec())
        } else {
            let err = classify_response(status, &bytes);
            trace!(uid = ctx.uid(), status, error = %err, "application error");
            Err(AttemptFailure::Fatal(err))
        }
    }

    fn scheme(&self) -> &'static str {
        if self.use_https {
            "https"
        } else {
            "http"
        }
    }
}

/// Finalizes the HTTP transport shared by every constructor.
///
/// Redirects are never followed: a 3xx response must reach the
/// classifier as a status-code error rather than silently re-target a
/// request, possibly at a host outside the rotation.
fn build_transport(builder: reqwest::ClientBuilder) -> Result<reqwest::Client> {
    builder
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|err| BucketdError::Config(format!("failed to build HTTP transport: {err}")))
}

fn object_path(bucket: &str, key: &str) -> Result<String> {
    require_name("bucket name", bucket)?;
    require_name("object key", key)?;
    Ok(format!(
        "/default/bucket/{}/{}",
        encode_segment(bucket),
        encode_segment(key)
    ))
}

fn require_name(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(BucketdError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}
