use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{FromRequestParts, RawPathParams, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::models::user::User;

use super::ability::{Action, PermissionSet, Subject};
use super::authorizer::{build_rules, AuthorizationContext, Authorizer};

/// Identity collaborator consulted before any rule is built.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn retrieve_user(&self, parts: &Parts) -> AppResult<Option<User>>;

    /// Whether a request without an actor may proceed.
    fn allow_no_rules_access(&self, parts: &Parts) -> bool;
}

/// The permission a route demands, stored in request extensions while the
/// guard runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteRequirement(pub Option<(Action, Subject)>);

pub struct AuthorizationGuard {
    authenticator: Arc<dyn Authenticator>,
    authorizers: Vec<Arc<dyn Authorizer>>,
}

impl AuthorizationGuard {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            authorizers: Vec::new(),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizers.push(authorizer);
        self
    }

    pub fn build_rules(&self, actor: &User) -> PermissionSet {
        build_rules(&self.authorizers, actor)
    }

    /// Runs every authorizer; the first refusal or error wins.
    pub async fn authorize(&self, ctx: &mut AuthorizationContext, ability: &PermissionSet) -> AppResult<bool> {
        for authorizer in &self.authorizers {
            if !authorizer.authorize(ctx, ability).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Middleware state: the app plus the requirement of the route it wraps.
#[derive(Clone)]
pub struct Guarded {
    state: AppState,
    requirement: RouteRequirement,
}

impl Guarded {
    pub fn require(state: &AppState, action: Action, subject: Subject) -> Self {
        Self {
            state: state.clone(),
            requirement: RouteRequirement(Some((action, subject))),
        }
    }
}

async fn path_params(parts: &mut Parts) -> AppResult<HashMap<String, String>> {
    match RawPathParams::from_request_parts(parts, &()).await {
        Ok(params) => Ok(params
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()),
        Err(RawPathParamsRejection::MissingPathParams(_)) => Ok(HashMap::new()),
        Err(err) => Err(AppError::bad_request(err.body_text())),
    }
}

pub async fn authorize_request(
    State(guarded): State<Guarded>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    parts.extensions.insert(guarded.requirement);

    let guard = &guarded.state.guard;

    let Some(actor) = guard.authenticator.retrieve_user(&parts).await? else {
        if guard.authenticator.allow_no_rules_access(&parts) {
            return Ok(next.run(Request::from_parts(parts, body)).await);
        }
        return Err(AppError::unauthorized("authentication required"));
    };

    let ability = guard.build_rules(&actor);

    if let RouteRequirement(Some((action, subject))) = guarded.requirement {
        if !ability.can_any(action, subject) {
            let reason = ability
                .relevant_rule(action, subject)
                .and_then(|rule| rule.reason.clone())
                .unwrap_or_else(|| format!("cannot {action} {subject}"));
            tracing::info!(
                user_id = %actor.id,
                action = %action,
                subject = %subject,
                reason = %reason,
                "access denied"
            );
            return Err(AppError::access_denied(reason));
        }
    }

    let params = path_params(&mut parts).await?;
    let mut ctx = AuthorizationContext::http(params, std::mem::take(&mut parts.extensions));
    let outcome = guard.authorize(&mut ctx, &ability).await;
    parts.extensions = ctx.into_extensions();

    if !outcome? {
        tracing::info!(user_id = %actor.id, "request authorizer refused");
        return Err(AppError::access_denied("request refused by authorizer"));
    }

    tracing::debug!(user_id = %actor.id, rules = ability.rules().len(), "request authorized");

    parts.extensions.insert(actor);
    parts.extensions.insert(Arc::new(ability));

    Ok(next.run(Request::from_parts(parts, body)).await)
}
