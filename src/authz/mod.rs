//! Authorization module - rule building and per-request checks
//!
//! - `predicate`: engine-neutral filters over a resource and its relations
//! - `ability`: allow/deny rules, evaluated last-match-wins, deny by default
//! - `authorizer`: the per-resource hook trait and its request context
//! - `downloads`: rules and the grace-windowed lookup for downloads
//! - `guard`: the axum middleware driving the hooks for each request

mod ability;
mod authorizer;
pub mod downloads;
mod guard;
pub mod media;
mod predicate;

pub use ability::{Action, Effect, PermissionSet, Rule, RuleBuilder, Subject};
pub use authorizer::{build_rules, AuthorizationContext, Authorizer, Channel};
pub use downloads::DownloadsAuthorizer;
pub use guard::{authorize_request, Authenticator, AuthorizationGuard, Guarded, RouteRequirement};
pub use media::{AccessPolicy, DefaultMediaAccessPolicy, MediaAccessPolicy};
pub use predicate::{all, any, eq, is_in, ne, not, related, Comparison, Predicate, Relation, Scalar};
