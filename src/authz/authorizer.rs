use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::Extensions;

use crate::errors::AppResult;
use crate::models::user::User;

use super::ability::{PermissionSet, RuleBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Http,
    Socket,
}

/// What an authorizer sees of the invocation it is asked about.
#[derive(Debug)]
pub struct AuthorizationContext {
    channel: Channel,
    params: HashMap<String, String>,
    extensions: Extensions,
}

impl AuthorizationContext {
    pub fn http(params: HashMap<String, String>, extensions: Extensions) -> Self {
        Self {
            channel: Channel::Http,
            params,
            extensions,
        }
    }

    pub fn socket() -> Self {
        Self {
            channel: Channel::Socket,
            params: HashMap::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn is_socket(&self) -> bool {
        self.channel == Channel::Socket
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Hand a resolved value to downstream handlers.
    pub fn attach<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(value);
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    pub fn into_extensions(self) -> Extensions {
        self.extensions
    }
}

/// Per-resource authorization hooks.
///
/// `for_user` contributes rules once per actor per request; `authorize` runs
/// once per guarded route with the finished permission set.
#[async_trait]
pub trait Authorizer: Send + Sync {
    fn for_user(&self, actor: &User, rules: &mut RuleBuilder);

    async fn authorize(&self, _ctx: &mut AuthorizationContext, _ability: &PermissionSet) -> AppResult<bool> {
        Ok(true)
    }
}

/// Builds the actor's permission set from every authorizer.
pub fn build_rules(authorizers: &[std::sync::Arc<dyn Authorizer>], actor: &User) -> PermissionSet {
    let mut builder = RuleBuilder::new();
    for authorizer in authorizers {
        authorizer.for_user(actor, &mut builder);
    }
    builder.build()
}
