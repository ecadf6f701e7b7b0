//! Convention-based policy methods.
//!
//! Instead of registering ready-made rules, a caller may describe a policy
//! *type*: how to construct it, which slot receives the authentication
//! context and which named methods it exposes. Each authorization request
//! builds a fresh instance, threads the principal into it and invokes the
//! method addressed by a normalized name, after checking that the supplied
//! arguments have the types the method declares.

mod builder;
pub use builder::DynamicPolicyBuilder;

use std::any::{self, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::{context::Principal, naming::to_camel, Context, ContextKey, Error, Result};

/// Position of the request context in a method's argument list.
const CONTEXT_POSITION: usize = 0;
/// Position of the resource in a method's argument list.
const RESOURCE_POSITION: usize = 1;

/// Declared type of a single method parameter.
#[derive(Clone, Copy)]
pub struct Param {
    type_id: TypeId,
    type_name: &'static str,
}

impl Param {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn accepts(&self, arg: &dyn Any) -> bool {
        (*arg).type_id() == self.type_id
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

type Construct<P> = Box<dyn Fn() -> P + Send + Sync>;
type Assign<P> = Box<dyn Fn(&mut P, &(dyn Any + Send + Sync)) -> bool + Send + Sync>;
type Call<P> = Box<dyn Fn(&P, &[&dyn Any]) -> Result<()> + Send + Sync>;

struct AuthSlot<P> {
    param: Param,
    assign: Assign<P>,
}

struct Method<P> {
    params: Vec<Param>,
    call: Call<P>,
}

/// Description of a policy type whose methods are bound by name at
/// authorization time. Built with [`DynamicPolicyBuilder`].
pub struct DynamicPolicy<P> {
    type_name: &'static str,
    construct: Construct<P>,
    auth_slot: Option<AuthSlot<P>>,
    methods: HashMap<String, Method<P>>,
}

impl<P: 'static> DynamicPolicy<P> {
    pub fn builder<F>(construct: F) -> DynamicPolicyBuilder<P>
    where
        F: Fn() -> P + Send + Sync + 'static,
    {
        DynamicPolicyBuilder::new(construct)
    }
}

impl<P> fmt::Debug for DynamicPolicy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("DynamicPolicy")
            .field("type", &self.type_name)
            .field("auth_ctx", &self.auth_slot.as_ref().map(|slot| slot.param))
            .field("methods", &methods)
            .finish()
    }
}

/// Type-erased view of a [`DynamicPolicy`], as stored in the factory table.
pub(crate) trait PolicyFactory: Send + Sync {
    fn method_names(&self) -> Vec<String>;

    /// Builds a fresh policy instance, binds the principal found under
    /// `auth_key` and invokes `method` with `ctx` followed by `args`.
    fn dispatch(
        &self,
        policy_name: &str,
        ctx: &Context,
        auth_key: &ContextKey,
        method: &str,
        args: &[&dyn Any],
    ) -> Result<()>;
}

impl<P: 'static> PolicyFactory for DynamicPolicy<P> {
    fn method_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    fn dispatch(
        &self,
        policy_name: &str,
        ctx: &Context,
        auth_key: &ContextKey,
        method: &str,
        args: &[&dyn Any],
    ) -> Result<()> {
        let mut policy = (self.construct)();

        let principal = ctx
            .value::<Principal>(auth_key)
            .filter(|principal| !principal.is_nil())
            .ok_or(Error::InvalidAuthCtx)?;

        let slot = self
            .auth_slot
            .as_ref()
            .ok_or_else(|| Error::MisconfiguredPolicyType(self.type_name.to_string()))?;

        let bound = principal
            .as_any()
            .map_or(false, |value| (slot.assign)(&mut policy, value));
        if !bound {
            return Err(Error::AuthCtxTypeMismatch {
                expected: slot.param.type_name(),
                actual: principal.type_name(),
            });
        }

        let canonical = to_camel(method);
        trace!(policy = policy_name, method, %canonical, "binding policy method");

        let method = self
            .methods
            .get(&canonical)
            .ok_or_else(|| Error::MethodNotAvailable {
                policy: policy_name.to_string(),
                method: canonical.clone(),
            })?;

        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(ctx as &dyn Any);
        call_args.extend_from_slice(args);

        validate_args(&method.params, &call_args)?;

        (method.call)(&policy, &call_args)
    }
}

/// Checks supplied arguments against declared parameters, position by
/// position. Types must match exactly.
fn validate_args(params: &[Param], args: &[&dyn Any]) -> Result<()> {
    if params.len() != args.len() {
        return Err(Error::RuleArgsLenMismatch {
            expected: params.len(),
            actual: args.len(),
        });
    }

    for (position, (param, arg)) in params.iter().zip(args).enumerate() {
        if !param.accepts(*arg) {
            return Err(match position {
                RESOURCE_POSITION => Error::InvalidResource {
                    expected: param.type_name(),
                },
                _ => Error::RuleArgItemMismatch {
                    position,
                    expected: param.type_name(),
                },
            });
        }
    }

    Ok(())
}

/// Fetches the argument at `position` as a `T`. Arguments are validated
/// before a method is called, so a failure here means the declared
/// parameters and the typed closure disagree.
fn arg<'a, T: Any>(args: &[&'a dyn Any], position: usize) -> Result<&'a T> {
    let expected = any::type_name::<T>();
    let arg: &'a dyn Any = *args.get(position).ok_or(Error::RuleArgsLenMismatch {
        expected: position + 1,
        actual: args.len(),
    })?;

    arg.downcast_ref::<T>().ok_or(match position {
        RESOURCE_POSITION => Error::InvalidResource { expected },
        _ => Error::RuleArgItemMismatch { position, expected },
    })
}
