use std::fmt;

use crate::models::user::User;

use super::predicate::{eq, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    Read,
    Write,
    Delete,
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessPolicy::Read => "READ",
            AccessPolicy::Write => "WRITE",
            AccessPolicy::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Decides which media an actor may see; other authorizers nest this
/// predicate under their own relations.
pub trait MediaAccessPolicy: Send + Sync {
    fn predicate(&self, actor: &User, policy: AccessPolicy) -> Predicate;
}

/// Admins see everything; everyone else reads available media only and
/// never writes or deletes.
#[derive(Debug, Clone, Default)]
pub struct DefaultMediaAccessPolicy;

impl DefaultMediaAccessPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl MediaAccessPolicy for DefaultMediaAccessPolicy {
    fn predicate(&self, actor: &User, policy: AccessPolicy) -> Predicate {
        if actor.is_admin() {
            return Predicate::Always;
        }

        match policy {
            AccessPolicy::Read => eq("available", true),
            AccessPolicy::Write | AccessPolicy::Delete => Predicate::Never,
        }
    }
}
