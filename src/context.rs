use uuid::Uuid;

/// Correlates one logical call across its retry attempts.
///
/// Created once per logical operation and reused for every attempt of that
/// operation; the uid travels in the request-uids header so server-side logs
/// can be tied back to a single client call.
#[derive(Clone, Debug)]
pub struct RequestContext {
    uid: String,
}

impl RequestContext {
    /// Creates a context with a fresh request-unique identifier.
    pub fn new() -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
        }
    }

    /// Creates a context carrying an existing correlation chain, e.g. one
    /// received from an upstream service.
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::RequestContext;

    #[test]
    fn fresh_contexts_have_distinct_uids() {
        assert_ne!(RequestContext::new().uid(), RequestContext::new().uid());
    }

    #[test]
    fn with_uid_preserves_the_chain() {
        let ctx = RequestContext::with_uid("upstream:1:2");
        assert_eq!(ctx.uid(), "upstream:1:2");
    }
}
