mod registry;
pub use registry::PolicyRegistry;

use std::collections::{hash_map::Entry, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::{Error, Result, Rule};

/// Reserved name of the policy that receives rules registered without a
/// namespace.
pub const DEFAULT_POLICY: &str = "default";

/// A named collection of rules.
///
/// The name is the namespace under which the policy is registered, so the
/// rule identifier `"project.create"` addresses rule `"create"` of policy
/// `"project"`. Rules can be added after the policy was registered, but
/// never removed.
pub struct Policy {
    name: String,
    rules: RwLock<HashMap<String, Arc<dyn Rule>>>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_rule<R>(self, name: impl Into<String>, rule: R) -> Self
    where
        R: Rule + 'static,
    {
        self.set_rule(name, rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a rule to the policy, replacing any rule with the same name.
    pub fn set_rule<R>(&self, name: impl Into<String>, rule: R)
    where
        R: Rule + 'static,
    {
        let name = name.into();
        let rule: Arc<dyn Rule> = Arc::new(rule);

        match self.rules.write().entry(name) {
            Entry::Vacant(item) => {
                debug!(policy = %self.name, rule = %item.key(), "rule registered");
                item.insert(rule);
            }
            Entry::Occupied(mut item) => {
                debug!(policy = %self.name, rule = %item.key(), "rule replaced");
                item.insert(rule);
            }
        }
    }

    pub fn rule(&self, name: &str) -> Result<Arc<dyn Rule>> {
        self.rules
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::RuleNotFound {
                policy: self.name.clone(),
                rule: name.to_string(),
            })
    }

    /// Names of all rules in the policy, sorted.
    pub fn rule_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.rules.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("name", &self.name)
            .field("rules", &self.rule_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, RuleFn};
    use assert_matches::assert_matches;

    fn deny(reason: &'static str) -> impl Rule {
        RuleFn::new(move |_, _| Err(reason.into()))
    }

    #[test]
    fn get_registered_rule() {
        let policy = Policy::new("project").with_rule("create", RuleFn::new(|_, _| Ok(())));

        let rule = policy.rule("create").expect("rule is registered");
        assert!(rule.authorize(&Context::background(), &()).is_ok());
    }

    #[test]
    fn missing_rule_is_not_found() {
        let policy = Policy::new("project");

        assert_matches!(
            policy.rule("delete").map(|_| ()),
            Err(Error::RuleNotFound { policy, rule }) if policy == "project" && rule == "delete"
        );
    }

    #[test]
    fn set_rule_twice_last_one_wins() {
        let policy = Policy::new("project");
        policy.set_rule("create", deny("first"));
        policy.set_rule("create", deny("second"));

        assert_eq!(1, policy.len());

        let err = policy
            .rule("create")
            .unwrap()
            .authorize(&Context::background(), &())
            .unwrap_err();
        assert_eq!("second", err.to_string());
    }

    #[test]
    fn rule_names_are_sorted() {
        let policy = Policy::new("project")
            .with_rule("update", deny("no"))
            .with_rule("create", deny("no"))
            .with_rule("delete", deny("no"));

        assert_eq!(vec!["create", "delete", "update"], policy.rule_names());
        assert!(!policy.is_empty());
    }
}
