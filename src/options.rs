/// Configures timeout behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Optional deadline for a whole logical call, covering every failover
    /// attempt. `None` means the call is bounded only by per-attempt
    /// timeouts times the bootstrap list length.
    pub operation_timeout_ms: Option<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            operation_timeout_ms: None,
        }
    }
}

/// TLS material for HTTPS transport.
///
/// Setting any of this switches the client to `https` URLs. Providing an
/// identity enables mutual TLS.
#[derive(Clone, Debug, Default)]
pub struct TlsOptions {
    /// PEM-encoded CA certificate used to verify server certificates.
    pub ca_pem: Option<Vec<u8>>,
    /// PEM-encoded client certificate and private key, concatenated.
    pub identity_pem: Option<Vec<u8>>,
}
