use crate::{Error, Result};

/// A rule identifier split into its optional namespace and the rule name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleName<'a> {
    namespace: Option<&'a str>,
    rule: &'a str,
}

impl<'a> RuleName<'a> {
    /// `None` when the identifier carried no namespace.
    pub fn namespace(&self) -> Option<&'a str> {
        self.namespace
    }

    pub fn rule(&self) -> &'a str {
        self.rule
    }
}

/// Splits `identifier` on the first occurrence of `separator`.
///
/// Everything after the first separator is the rule name, so
/// `"project.sub.create"` resolves to namespace `"project"` and rule
/// `"sub.create"`. Identifiers without a separator, or with nothing before
/// it, have no namespace.
pub fn resolve<'a>(identifier: &'a str, separator: &str) -> Result<RuleName<'a>> {
    if identifier.is_empty() {
        return Err(Error::InvalidRuleName(identifier.into()));
    }

    match identifier.split_once(separator) {
        Some((namespace, rule)) => Ok(RuleName {
            namespace: Some(namespace).filter(|namespace| !namespace.is_empty()),
            rule,
        }),
        None => Ok(RuleName {
            namespace: None,
            rule: identifier,
        }),
    }
}
