use std::fmt;
use std::sync::Arc;

use indexmap::{map::Entry, IndexMap};
use parking_lot::RwLock;
use tracing::debug;

use super::{Policy, DEFAULT_POLICY};
use crate::{Error, Result};

/// Namespace to policy mapping.
///
/// Always holds the default policy, installed before any caller can register
/// anything. Registration is strict: a name can be taken only once.
pub struct PolicyRegistry {
    default: Arc<Policy>,
    policies: RwLock<IndexMap<String, Arc<Policy>>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        let default = Arc::new(Policy::new(DEFAULT_POLICY));
        let mut policies = IndexMap::new();
        policies.insert(DEFAULT_POLICY.to_string(), default.clone());

        Self {
            default,
            policies: RwLock::new(policies),
        }
    }

    pub fn register(&self, policy: Policy) -> Result<Arc<Policy>> {
        match self.policies.write().entry(policy.name().to_string()) {
            Entry::Occupied(item) => Err(Error::PolicyAlreadyRegistered(item.key().clone())),
            Entry::Vacant(item) => {
                debug!(policy = %item.key(), "policy registered");
                Ok(item.insert(Arc::new(policy)).clone())
            }
        }
    }

    /// Exact-match lookup. An unknown namespace is not an error here, the
    /// caller decides whether to fall back to the default policy.
    pub fn lookup(&self, namespace: &str) -> Option<Arc<Policy>> {
        self.policies.read().get(namespace).cloned()
    }

    pub fn default_policy(&self) -> &Arc<Policy> {
        &self.default
    }

    /// Registered policy names in registration order, default first.
    pub fn names(&self) -> Vec<String> {
        self.policies.read().keys().cloned().collect()
    }

    /// Number of registered policies, counting the default one.
    pub fn len(&self) -> usize {
        self.policies.read().len()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("policies", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuleFn;
    use assert_matches::assert_matches;

    #[test]
    fn default_policy_is_preinstalled() {
        let registry = PolicyRegistry::new();

        assert_eq!(vec![DEFAULT_POLICY], registry.names());
        assert!(registry.lookup(DEFAULT_POLICY).is_some());
        assert_eq!(DEFAULT_POLICY, registry.default_policy().name());
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let registry = PolicyRegistry::new();
        registry
            .register(Policy::new("project").with_rule("create", RuleFn::new(|_, _| Ok(()))))
            .unwrap();

        assert_matches!(
            registry.register(Policy::new("project")),
            Err(Error::PolicyAlreadyRegistered(name)) if name == "project"
        );

        let kept = registry.lookup("project").unwrap();
        assert_eq!(vec!["create"], kept.rule_names());
    }

    #[test]
    fn default_name_is_reserved() {
        let registry = PolicyRegistry::new();

        assert_matches!(
            registry.register(Policy::new(DEFAULT_POLICY)),
            Err(Error::PolicyAlreadyRegistered(_))
        );
    }

    #[test]
    fn names_follow_registration_order() {
        let registry = PolicyRegistry::new();
        for name in &["zeta", "alpha", "mid"] {
            registry.register(Policy::new(*name)).unwrap();
        }

        assert_eq!(vec!["default", "zeta", "alpha", "mid"], registry.names());
        assert_eq!(4, registry.len());
        assert!(registry.lookup("beta").is_none());
    }

    #[test]
    fn registered_policy_accepts_rules_later() {
        let registry = PolicyRegistry::new();
        let handle = registry.register(Policy::new("project")).unwrap();
        handle.set_rule("archive", RuleFn::new(|_, _| Ok(())));

        assert!(registry.lookup("project").unwrap().rule("archive").is_ok());
    }
}
