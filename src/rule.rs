use std::any::Any;
use std::fmt;

use crate::{errors::RuleResult, Context};

/// A single authorization decision.
///
/// A rule receives the request context and the resource being acted on and
/// either grants access with `Ok(())` or denies it with an error of its own
/// choosing.
pub trait Rule: Send + Sync {
    fn authorize(&self, ctx: &Context, resource: &dyn Any) -> RuleResult;
}

/// Adapter turning a closure into a [`Rule`].
///
/// ```
/// use allow_rules::RuleFn;
///
/// let rule = RuleFn::new(|_ctx, _resource| Ok(()));
/// # let _ = rule;
/// ```
pub struct RuleFn<F>(F);

impl<F> RuleFn<F>
where
    F: Fn(&Context, &dyn Any) -> RuleResult + Send + Sync,
{
    pub fn new(f: F) -> Self {
        RuleFn(f)
    }
}

impl<F> Rule for RuleFn<F>
where
    F: Fn(&Context, &dyn Any) -> RuleResult + Send + Sync,
{
    fn authorize(&self, ctx: &Context, resource: &dyn Any) -> RuleResult {
        (self.0)(ctx, resource)
    }
}

impl<F> fmt::Debug for RuleFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RuleFn")
    }
}
