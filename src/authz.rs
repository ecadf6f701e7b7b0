use std::any::Any;
use std::collections::{hash_map::Entry, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use prometheus::Registry;
use tracing::{debug, trace};

use crate::{
    context::Principal,
    dynamic::{DynamicPolicy, PolicyFactory},
    metrics::MetricsSink,
    policy::{PolicyRegistry, DEFAULT_POLICY},
    resolver::resolve,
    AuthzBuilder, AuthzOptions, Context, ContextKey, Error, Policy, Result, Rule,
};

/// Authorization dispatcher.
///
/// Routes a request either to an explicitly registered [`Rule`] addressed by
/// a `namespace.rule` identifier ([`Authz::authorize`]), or to a method of a
/// [`DynamicPolicy`] addressed by policy and method name
/// ([`Authz::authorize_method`]). Every call records exactly one observation
/// in the configured [`MetricsSink`].
pub struct Authz {
    options: AuthzOptions,
    auth_ctx_key: ContextKey,
    registry: PolicyRegistry,
    factories: RwLock<HashMap<String, Arc<dyn PolicyFactory>>>,
    metrics: Arc<dyn MetricsSink>,
}

impl Authz {
    /// A dispatcher with default options and Prometheus metrics.
    pub fn new() -> Result<Self> {
        AuthzBuilder::new().build()
    }

    pub fn builder() -> AuthzBuilder {
        AuthzBuilder::new()
    }

    pub(crate) fn from_parts(options: AuthzOptions, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            auth_ctx_key: ContextKey::new(options.auth_ctx_key.clone()),
            options,
            registry: PolicyRegistry::new(),
            factories: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    pub fn options(&self) -> &AuthzOptions {
        &self.options
    }

    /// Key the authentication context is stored under. Unique to this
    /// dispatcher.
    pub fn auth_ctx_key(&self) -> &ContextKey {
        &self.auth_ctx_key
    }

    /// Derives a context carrying `auth_ctx`. `None` attaches an explicit nil
    /// principal, which dynamic policies reject.
    #[must_use]
    pub fn set_auth_ctx<A>(&self, ctx: &Context, auth_ctx: Option<A>) -> Context
    where
        A: Any + Send + Sync,
    {
        ctx.with_value(&self.auth_ctx_key, Principal::new(auth_ctx))
    }

    /// The authentication context attached with [`Authz::set_auth_ctx`], if
    /// it is present and of type `A`.
    pub fn auth_ctx<'c, A: Any>(&self, ctx: &'c Context) -> Option<&'c A> {
        ctx.principal::<A>(&self.auth_ctx_key)
    }

    pub fn register_policy(&self, policy: Policy) -> Result<Arc<Policy>> {
        self.registry.register(policy)
    }

    /// Registers policies in order, stopping at the first failure. Policies
    /// registered before the failure stay registered.
    pub fn register_policies<I>(&self, policies: I) -> Result<()>
    where
        I: IntoIterator<Item = Policy>,
    {
        for policy in policies {
            self.register_policy(policy)?;
        }
        Ok(())
    }

    /// Adds a rule to the default policy.
    pub fn register_rule<R>(&self, name: impl Into<String>, rule: R)
    where
        R: Rule + 'static,
    {
        self.registry.default_policy().set_rule(name, rule);
    }

    pub fn register_policy_factory<P: 'static>(
        &self,
        name: impl Into<String>,
        policy: DynamicPolicy<P>,
    ) -> Result<()> {
        match self.factories.write().entry(name.into()) {
            Entry::Occupied(item) => Err(Error::PolicyAlreadyRegistered(item.key().clone())),
            Entry::Vacant(item) => {
                debug!(name = %item.key(), ?policy, "policy factory registered");
                item.insert(Arc::new(policy));
                Ok(())
            }
        }
    }

    pub fn policy(&self, name: &str) -> Option<Arc<Policy>> {
        self.registry.lookup(name)
    }

    /// Names of explicitly registered policies, in registration order.
    pub fn policies(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Canonical method names of a dynamic policy.
    pub fn methods(&self, policy: &str) -> Result<Vec<String>> {
        Ok(self.factory(policy)?.method_names())
    }

    /// Registry of the metrics sink, for exposing observations.
    pub fn metrics_registry(&self) -> Option<&Registry> {
        self.metrics.registry()
    }

    /// Authorizes `resource` against the rule named by `identifier`.
    ///
    /// The identifier is split on the configured separator: `project.create`
    /// addresses rule `create` of policy `project`. Identifiers without a
    /// namespace, or whose namespace is not registered, are looked up in the
    /// default policy.
    pub fn authorize(&self, ctx: &Context, identifier: &str, resource: &dyn Any) -> Result<()> {
        let mut observation = Observation::start(self.metrics.as_ref(), DEFAULT_POLICY, identifier);

        let result = self.authorize_rule(ctx, identifier, resource, &mut observation);
        debug!(
            policy = observation.policy,
            rule = observation.rule,
            granted = result.is_ok(),
            "authorization decided"
        );
        result
    }

    fn authorize_rule<'a>(
        &'a self,
        ctx: &Context,
        identifier: &'a str,
        resource: &dyn Any,
        observation: &mut Observation<'a>,
    ) -> Result<()> {
        let name = resolve(identifier, &self.options.separator)?;

        let policy = match name.namespace() {
            Some(namespace) => match self.registry.lookup(namespace) {
                Some(policy) => {
                    observation.policy = namespace;
                    policy
                }
                None => {
                    trace!(namespace, "unknown namespace, using default policy");
                    self.registry.default_policy().clone()
                }
            },
            None => self.registry.default_policy().clone(),
        };
        observation.rule = name.rule();

        let rule = policy.rule(name.rule())?;
        rule.authorize(ctx, resource).map_err(Error::Denied)
    }

    /// Authorizes `resource` against `method` of the dynamic policy
    /// registered as `policy`.
    ///
    /// A fresh policy instance is built for the call and receives the
    /// authentication context attached to `ctx`. The method is invoked with
    /// `ctx`, `resource` and then `args`, after each of them was checked
    /// against the parameter types the method declares.
    pub fn authorize_method(
        &self,
        ctx: &Context,
        resource: &dyn Any,
        policy: &str,
        method: &str,
        args: &[&dyn Any],
    ) -> Result<()> {
        let _observation = Observation::start(self.metrics.as_ref(), policy, method);

        let result = self.factory(policy).and_then(|factory| {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(resource);
            call_args.extend_from_slice(args);

            factory.dispatch(policy, ctx, &self.auth_ctx_key, method, &call_args)
        });
        debug!(policy, method, granted = result.is_ok(), "authorization decided");
        result
    }

    fn factory(&self, policy: &str) -> Result<Arc<dyn PolicyFactory>> {
        self.factories
            .read()
            .get(policy)
            .cloned()
            .ok_or_else(|| Error::PolicyNotFound(policy.to_string()))
    }
}

impl fmt::Debug for Authz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut factories: Vec<_> = self.factories.read().keys().cloned().collect();
        factories.sort();
        f.debug_struct("Authz")
            .field("options", &self.options)
            .field("policies", &self.registry)
            .field("factories", &factories)
            .finish()
    }
}

/// Records one observation when dropped, so every exit path of an
/// authorization call is measured.
struct Observation<'a> {
    metrics: &'a dyn MetricsSink,
    start: Instant,
    policy: &'a str,
    rule: &'a str,
}

impl<'a> Observation<'a> {
    fn start(metrics: &'a dyn MetricsSink, policy: &'a str, rule: &'a str) -> Self {
        Self {
            metrics,
            start: Instant::now(),
            policy,
            rule,
        }
    }
}

impl Drop for Observation<'_> {
    fn drop(&mut self) {
        self.metrics
            .record_observation(self.policy, self.rule, self.start.elapsed());
    }
}
