use std::sync::Arc;

use crate::{
    metrics::{MetricsSink, NoopMetrics, PrometheusMetrics},
    Authz, AuthzOptions, Result,
};

/// Builds an [`Authz`] dispatcher.
///
/// ```
/// use allow_rules::{AuthzBuilder, Context, RuleFn};
///
/// let authz = AuthzBuilder::from_json(r#"{ "separator": ":" }"#)?
///     .without_metrics()
///     .build()?;
/// authz.register_rule("ping", RuleFn::new(|_ctx, _resource| Ok(())));
///
/// authz.authorize(&Context::background(), "ping", &())?;
/// # Ok::<(), allow_rules::Error>(())
/// ```
#[derive(Default)]
pub struct AuthzBuilder {
    options: AuthzOptions,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl AuthzBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from options given as JSON. See [`AuthzOptions`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new().with_options(AuthzOptions::from_json(json)?))
    }

    #[must_use]
    pub fn with_options(mut self, options: AuthzOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.options.separator = separator.into();
        self
    }

    #[must_use]
    pub fn with_auth_ctx_key(mut self, label: impl Into<String>) -> Self {
        self.options.auth_ctx_key = label.into();
        self
    }

    #[must_use]
    pub fn with_metrics_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.options.metrics_namespace = namespace.into();
        self
    }

    /// Records observations into `metrics` instead of the default Prometheus
    /// histogram.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn without_metrics(self) -> Self {
        self.with_metrics(Arc::new(NoopMetrics))
    }

    pub fn build(self) -> Result<Authz> {
        self.options.validate()?;

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(PrometheusMetrics::new(&self.options.metrics_namespace)?),
        };

        Ok(Authz::from_parts(self.options, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use assert_matches::assert_matches;

    #[test]
    fn default_build_uses_prometheus() {
        let authz = AuthzBuilder::new().build().unwrap();

        assert_eq!(&AuthzOptions::default(), authz.options());
        assert!(authz.metrics_registry().is_some());
    }

    #[test]
    fn without_metrics_has_no_registry() {
        let authz = AuthzBuilder::new().without_metrics().build().unwrap();
        assert!(authz.metrics_registry().is_none());
    }

    #[test]
    fn setters_override_options() {
        let authz = AuthzBuilder::from_json(r#"{ "separator": "/" }"#)
            .unwrap()
            .with_auth_ctx_key("principal")
            .with_metrics_namespace("svc_authz")
            .build()
            .unwrap();

        assert_eq!("/", authz.options().separator);
        assert_eq!("principal", authz.auth_ctx_key().label());
        assert_eq!("svc_authz", authz.options().metrics_namespace);
    }

    #[test]
    fn invalid_options_fail_build() {
        assert_matches!(
            AuthzBuilder::new().with_separator("").build(),
            Err(Error::InvalidOptions(_))
        );
        assert_matches!(
            AuthzBuilder::new().with_metrics_namespace("svc-authz").build(),
            Err(Error::InvalidOptions(_))
        );
    }
}
