use crate::wire;

/// Closed set of application-level errors the metadata service returns.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    NoSuchBucket,
    BucketAlreadyExists,
    NoSuchKey,
    NotImplemented,
    InvalidRange,
    BadRequest,
    /// Anything the fixed mapping table does not recognize.
    InternalError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSuchBucket => "NoSuchBucket",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::NoSuchKey => "NoSuchKey",
            Self::NotImplemented => "NotImplemented",
            Self::InvalidRange => "InvalidRange",
            Self::BadRequest => "BadRequest",
            Self::InternalError => "InternalError",
        }
    }

    /// Fixed table mapping service error names to kinds. The `DB*`/`Obj*`
    /// aliases are the storage layer's spellings of the same conditions.
    pub(crate) fn from_message(message: &str) -> Option<Self> {
        match message {
            "NoSuchBucket" | "DBNotFound" => Some(Self::NoSuchBucket),
            "BucketAlreadyExists" | "DBAlreadyExists" => Some(Self::BucketAlreadyExists),
            "NoSuchKey" | "ObjNotFound" => Some(Self::NoSuchKey),
            "NotImplemented" => Some(Self::NotImplemented),
            "InvalidRange" => Some(Self::InvalidRange),
            "BadRequest" => Some(Self::BadRequest),
            _ => None,
        }
    }

    /// Fallback used when the response body carries no recognizable error
    /// name (reqwest does not expose HTTP reason phrases).
    pub(crate) fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(Self::BadRequest),
            404 => Some(Self::NoSuchBucket),
            409 => Some(Self::BucketAlreadyExists),
            416 => Some(Self::InvalidRange),
            501 => Some(Self::NotImplemented),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum BucketdError {
    /// Caller passed malformed arguments; never sent over the network.
    #[error("validation error: {0}")]
    Validation(String),
    /// Bootstrap list or TLS material could not be used.
    #[error("configuration error: {0}")]
    Config(String),
    /// Application-level error response (status > 201). Never retried.
    #[error("{kind} (http status {status}): {message}")]
    Api {
        kind: ErrorKind,
        status: u16,
        message: String,
    },
    /// Connection-level failure after every bootstrap endpoint was tried.
    #[error("transport error after {attempts} attempts: {source}")]
    Transport {
        attempts: usize,
        source: reqwest::Error,
    },
    /// The optional overall operation deadline elapsed.
    #[error("operation deadline of {timeout_ms} ms exceeded")]
    OperationTimeout { timeout_ms: u64 },
}

impl BucketdError {
    /// Whether the server returned this error deliberately, as opposed to
    /// an unexpected condition or a connectivity failure.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Api { kind, .. } if *kind != ErrorKind::InternalError
        )
    }

    /// The application-level kind, when this is an API error.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Classifies a non-success response into a [`BucketdError::Api`] value.
///
/// The error name is looked up in the fixed table, trying each candidate
/// the body offers; a status-code fallback covers empty bodies. A fresh
/// error value is built per occurrence.
pub(crate) fn classify_response(status: u16, body: &[u8]) -> BucketdError {
    let mut kind = None;
    let mut message = None;
    for candidate in wire::error_name_candidates(body) {
        if let Some(matched) = ErrorKind::from_message(&candidate) {
            kind = Some(matched);
            message = Some(candidate);
            break;
        }
        if message.is_none() {
            message = Some(candidate);
        }
    }
    let kind = kind
        .or_else(|| ErrorKind::from_status(status))
        .unwrap_or(ErrorKind::InternalError);
    let message = message.unwrap_or_else(|| kind.as_str().to_owned());
    BucketdError::Api {
        kind,
        status,
        message,
    }
}
