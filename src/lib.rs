#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::len_without_is_empty
)]
//! In-process authorization dispatcher.
//!
//! Requests are routed either to rules registered under a namespaced
//! identifier (`"project.create"`), or to methods of policy types that are
//! instantiated per request and addressed by a normalized method name.
//!
//! ```
//! use allow_rules::{Authz, Context, Policy, RuleFn};
//!
//! #[derive(Clone)]
//! struct User { role: String }
//! struct Project;
//!
//! let authz = Authz::builder().without_metrics().build()?;
//! let key = authz.auth_ctx_key().clone();
//!
//! authz.register_policy(Policy::new("project").with_rule(
//!     "create",
//!     RuleFn::new(move |ctx, _resource| match ctx.principal::<User>(&key) {
//!         Some(user) if user.role == "Admin" => Ok(()),
//!         _ => Err("only admins can create projects".into()),
//!     }),
//! ))?;
//!
//! let ctx = authz.set_auth_ctx(&Context::background(), Some(User { role: "Admin".into() }));
//! authz.authorize(&ctx, "project.create", &Project)?;
//! # Ok::<(), allow_rules::Error>(())
//! ```
mod authz;
mod builder;
mod context;
mod dynamic;
mod errors;
pub mod metrics;
mod naming;
mod options;
mod policy;
mod resolver;
mod rule;

pub use authz::Authz;
pub use builder::AuthzBuilder;
pub use context::{Context, ContextKey, Principal};
pub use dynamic::{DynamicPolicy, DynamicPolicyBuilder, Param};
pub use errors::{BoxError, Error, Result, RuleResult};
pub use metrics::{MetricsSink, NoopMetrics, PrometheusMetrics};
pub use naming::to_camel;
pub use options::AuthzOptions;
pub use policy::{Policy, PolicyRegistry, DEFAULT_POLICY};
pub use resolver::{resolve, RuleName};
pub use rule::{Rule, RuleFn};
