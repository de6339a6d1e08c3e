use serde::{Deserialize, Serialize};

/// Tunables for a [`super::Connection`].
///
/// Missing fields fall back to their defaults, so `{}` is a valid configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Look the service up in the privileged namespace. Defaults to `true`.
    pub privileged: bool,
    /// Label of the background context. Defaults to the service name.
    pub context_label: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            privileged: true,
            context_label: None,
        }
    }
}

impl ConnectionOptions {
    /// Parses options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
