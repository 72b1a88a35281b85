/// Listing filters forwarded to the service as query parameters.
///
/// The known filters have typed fields; anything newer the server learns to
/// accept goes through `extra` verbatim, so callers do not need a client
/// update to use it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListParams {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub max_keys: Option<u64>,
    pub delimiter: Option<String>,
    pub versions: Option<String>,
    /// Additional `(name, value)` pairs forwarded without interpretation.
    pub extra: Vec<(String, String)>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    pub fn max_keys(mut self, max_keys: u64) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn versions(mut self, versions: impl Into<String>) -> Self {
        self.versions = Some(versions.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    pub(crate) fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(prefix) = &self.prefix {
            query.push(("prefix".to_owned(), prefix.clone()));
        }
        if let Some(marker) = &self.marker {
            query.push(("marker".to_owned(), marker.clone()));
        }
        if let Some(max_keys) = self.max_keys {
            query.push(("maxKeys".to_owned(), max_keys.to_string()));
        }
        if let Some(delimiter) = &self.delimiter {
            query.push(("delimiter".to_owned(), delimiter.clone()));
        }
        if let Some(versions) = &self.versions {
            query.push(("versions".to_owned(), versions.clone()));
        }
        query.extend(self.extra.iter().cloned());
        query
    }
}
