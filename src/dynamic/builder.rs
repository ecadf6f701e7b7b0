use std::any::{self, Any};
use std::collections::HashMap;

use tracing::debug;

use super::{arg, AuthSlot, Call, DynamicPolicy, Method, Param, CONTEXT_POSITION, RESOURCE_POSITION};
use crate::{errors::RuleResult, naming::to_camel, Context, Error};

/// Builds a [`DynamicPolicy`].
///
/// ```
/// use allow_rules::{Context, DynamicPolicy};
///
/// #[derive(Clone)]
/// struct User { role: String }
/// struct Project;
///
/// #[derive(Default)]
/// struct ProjectPolicy { user: Option<User> }
///
/// let policy = DynamicPolicy::builder(ProjectPolicy::default)
///     .with_auth_ctx(|policy: &mut ProjectPolicy, user: User| policy.user = Some(user))
///     .with_method("create", |policy: &ProjectPolicy, _ctx, _project: &Project| {
///         match &policy.user {
///             Some(user) if user.role == "Admin" => Ok(()),
///             _ => Err("only admins can create projects".into()),
///         }
///     })
///     .build();
/// # let _ = policy;
/// ```
pub struct DynamicPolicyBuilder<P> {
    policy: DynamicPolicy<P>,
}

impl<P: 'static> DynamicPolicyBuilder<P> {
    pub fn new<F>(construct: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
    {
        Self {
            policy: DynamicPolicy {
                type_name: any::type_name::<P>(),
                construct: Box::new(construct),
                auth_slot: None,
                methods: HashMap::new(),
            },
        }
    }

    /// Declares the slot receiving the authentication context. The principal
    /// attached to the request must be exactly of type `A`.
    pub fn with_auth_ctx<A, S>(mut self, setter: S) -> Self
    where
        A: Any + Clone,
        S: Fn(&mut P, A) + Send + Sync + 'static,
    {
        self.policy.auth_slot = Some(AuthSlot {
            param: Param::of::<A>(),
            assign: Box::new(move |policy: &mut P, value: &(dyn Any + Send + Sync)| {
                match value.downcast_ref::<A>() {
                    Some(auth_ctx) => {
                        setter(policy, auth_ctx.clone());
                        true
                    }
                    None => false,
                }
            }),
        });
        self
    }

    /// Declares a method taking the request context and a resource of type `R`.
    pub fn with_method<R, F>(self, name: &str, f: F) -> Self
    where
        R: Any,
        F: Fn(&P, &Context, &R) -> RuleResult + Send + Sync + 'static,
    {
        let params = vec![Param::of::<Context>(), Param::of::<R>()];
        self.insert(
            name,
            params,
            Box::new(move |policy: &P, args: &[&dyn Any]| {
                let ctx = arg::<Context>(args, CONTEXT_POSITION)?;
                let resource = arg::<R>(args, RESOURCE_POSITION)?;
                f(policy, ctx, resource).map_err(Error::Denied)
            }),
        )
    }

    /// Declares a method taking the request context, a resource of type `R`
    /// and one extra argument of type `T`.
    pub fn with_method_arg<R, T, F>(self, name: &str, f: F) -> Self
    where
        R: Any,
        T: Any,
        F: Fn(&P, &Context, &R, &T) -> RuleResult + Send + Sync + 'static,
    {
        let params = vec![Param::of::<Context>(), Param::of::<R>(), Param::of::<T>()];
        self.insert(
            name,
            params,
            Box::new(move |policy: &P, args: &[&dyn Any]| {
                let ctx = arg::<Context>(args, CONTEXT_POSITION)?;
                let resource = arg::<R>(args, RESOURCE_POSITION)?;
                let extra = arg::<T>(args, RESOURCE_POSITION + 1)?;
                f(policy, ctx, resource, extra).map_err(Error::Denied)
            }),
        )
    }

    /// Declares a method with an explicit parameter list. `params` describes
    /// everything after the request context, starting with the resource. The
    /// method receives those arguments untyped, already checked against
    /// `params`.
    pub fn with_raw_method<F>(self, name: &str, params: Vec<Param>, f: F) -> Self
    where
        F: Fn(&P, &Context, &[&dyn Any]) -> RuleResult + Send + Sync + 'static,
    {
        let mut declared = Vec::with_capacity(params.len() + 1);
        declared.push(Param::of::<Context>());
        declared.extend(params);

        self.insert(
            name,
            declared,
            Box::new(move |policy: &P, args: &[&dyn Any]| {
                let ctx = arg::<Context>(args, CONTEXT_POSITION)?;
                let rest = args.get(RESOURCE_POSITION..).unwrap_or(&[]);
                f(policy, ctx, rest).map_err(Error::Denied)
            }),
        )
    }

    pub fn build(self) -> DynamicPolicy<P> {
        self.policy
    }

    fn insert(mut self, name: &str, params: Vec<Param>, call: Call<P>) -> Self {
        let canonical = to_camel(name);
        debug!(policy = self.policy.type_name, method = %canonical, ?params, "policy method declared");
        self.policy.methods.insert(canonical, Method { params, call });
        self
    }
}

impl<P: Default + 'static> Default for DynamicPolicyBuilder<P> {
    fn default() -> Self {
        Self::new(P::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Principal;
    use crate::dynamic::PolicyFactory;
    use crate::ContextKey;
    use assert_matches::assert_matches;

    #[derive(Default)]
    struct Policy {
        user: String,
    }

    fn ctx(key: &ContextKey) -> Context {
        Context::background().with_value(key, Principal::new(Some(String::from("alice"))))
    }

    #[test]
    fn redeclared_method_replaces_previous() {
        let key = ContextKey::new("auth");
        let policy = DynamicPolicyBuilder::<Policy>::default()
            .with_auth_ctx(|policy: &mut Policy, user: String| policy.user = user)
            .with_method("read", |_: &Policy, _, _: &()| Err("first".into()))
            .with_method("Read", |policy: &Policy, _, _: &()| {
                if policy.user == "alice" {
                    Ok(())
                } else {
                    Err("second".into())
                }
            })
            .build();

        assert_eq!(vec!["Read"], policy.method_names());
        assert_matches!(policy.dispatch("docs", &ctx(&key), &key, "read", &[&()]), Ok(()));
    }

    #[test]
    fn debug_lists_methods_and_slot() {
        let policy = DynamicPolicyBuilder::<Policy>::default()
            .with_auth_ctx(|policy: &mut Policy, user: String| policy.user = user)
            .with_method("read", |_: &Policy, _, _: &()| Ok(()))
            .with_method("write", |_: &Policy, _, _: &()| Ok(()))
            .build();

        let debug = format!("{:?}", policy);
        assert!(debug.contains("Read"));
        assert!(debug.contains("Write"));
        assert!(debug.contains("String"));
    }

    #[test]
    fn raw_method_without_extra_arguments() {
        let key = ContextKey::new("auth");
        let policy = DynamicPolicyBuilder::<Policy>::default()
            .with_auth_ctx(|policy: &mut Policy, user: String| policy.user = user)
            .with_raw_method("ping", vec![Param::of::<()>()], |_: &Policy, _, args| {
                assert_eq!(1, args.len());
                Ok(())
            })
            .build();

        assert_matches!(policy.dispatch("docs", &ctx(&key), &key, "ping", &[&()]), Ok(()));
        assert_matches!(
            policy.dispatch("docs", &ctx(&key), &key, "ping", &[&0_u8]),
            Err(Error::InvalidResource { .. })
        );
    }
}
