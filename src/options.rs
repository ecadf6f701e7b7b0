use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::{Error, Result};

lazy_static! {
    static ref METRICS_NAMESPACE: Regex = Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").unwrap();
}

pub const DEFAULT_SEPARATOR: &str = ".";
pub const DEFAULT_AUTH_CTX_KEY: &str = "allow-rules.auth_ctx";
pub const DEFAULT_METRICS_NAMESPACE: &str = "authz";

/// Dispatcher configuration.
///
/// ```json
/// {
///     "separator": "::",
///     "authCtxKey": "my-app.principal",
///     "metricsNamespace": "my_app_authz"
/// }
/// ```
///
/// Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AuthzOptions {
    /// Splits a rule identifier into namespace and rule name.
    pub separator: String,
    /// Label of the context key the principal is stored under. The key
    /// itself is a fresh token per dispatcher.
    pub auth_ctx_key: String,
    pub metrics_namespace: String,
}

impl AuthzOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let options: AuthzOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(Error::InvalidOptions("separator must not be empty".into()));
        }

        if !METRICS_NAMESPACE.is_match(&self.metrics_namespace) {
            return Err(Error::InvalidOptions(format!(
                "{:?} is not a valid metrics namespace",
                self.metrics_namespace
            )));
        }

        Ok(())
    }
}

impl Default for AuthzOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.into(),
            auth_ctx_key: DEFAULT_AUTH_CTX_KEY.into(),
            metrics_namespace: DEFAULT_METRICS_NAMESPACE.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_json_uses_defaults() {
        let options = AuthzOptions::from_json("{}").unwrap();
        assert_eq!(AuthzOptions::default(), options);
    }

    #[test]
    fn partial_json_overrides_fields() {
        let json = r#"{
            "separator": "::",
            "metricsNamespace": "my_app_authz"
        }"#;

        let options = AuthzOptions::from_json(json).unwrap();
        assert_eq!("::", options.separator);
        assert_eq!(DEFAULT_AUTH_CTX_KEY, options.auth_ctx_key);
        assert_eq!("my_app_authz", options.metrics_namespace);
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert_matches!(
            AuthzOptions::from_json(r#"{ "seperator": ":" }"#),
            Err(Error::Deserializing(_))
        );
    }

    #[test]
    fn empty_separator_is_rejected() {
        assert_matches!(
            AuthzOptions::from_json(r#"{ "separator": "" }"#),
            Err(Error::InvalidOptions(_))
        );
    }

    #[test]
    fn bad_metrics_namespace_is_rejected() {
        assert_matches!(
            AuthzOptions::from_json(r#"{ "metricsNamespace": "my-app" }"#),
            Err(Error::InvalidOptions(_))
        );
    }
}
