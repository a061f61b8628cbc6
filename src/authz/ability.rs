use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::predicate::{self, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Wildcard: a rule on `Manage` covers every action.
    Manage,
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Manage => "manage",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Resource kinds rules can be written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Subject {
    Download,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Download => f.write_str("Download"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub effect: Effect,
    pub action: Action,
    pub subject: Subject,
    /// `None` means the rule applies to every instance of the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Rule {
    pub fn when(&mut self, predicate: Predicate) -> &mut Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn because(&mut self, reason: impl Into<String>) -> &mut Self {
        self.reason = Some(reason.into());
        self
    }

    fn is_relevant(&self, action: Action, subject: Subject) -> bool {
        self.subject == subject && (self.action == action || self.action == Action::Manage)
    }

    fn matches_resource(&self, resource: &Value) -> bool {
        match &self.predicate {
            None => true,
            Some(p) => p.evaluate(resource),
        }
    }

    /// Type-level match: a conditional allow may grant, a conditional deny
    /// cannot be decided without an instance and is skipped.
    fn matches_subject_type(&self) -> bool {
        self.predicate.is_none() || self.effect == Effect::Allow
    }
}

/// Collects rules in declaration order.
#[derive(Debug, Default)]
pub struct RuleBuilder {
    rules: Vec<Rule>,
}

impl RuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can(&mut self, action: Action, subject: Subject) -> &mut Rule {
        self.push(Effect::Allow, action, subject)
    }

    pub fn cannot(&mut self, action: Action, subject: Subject) -> &mut Rule {
        self.push(Effect::Deny, action, subject)
    }

    pub fn build(self) -> PermissionSet {
        PermissionSet { rules: self.rules }
    }

    fn push(&mut self, effect: Effect, action: Action, subject: Subject) -> &mut Rule {
        self.rules.push(Rule {
            effect,
            action,
            subject,
            predicate: None,
            reason: None,
        });
        let last = self.rules.len() - 1;
        &mut self.rules[last]
    }
}

/// Immutable, per-request set of allow/deny rules.
///
/// Evaluation is last-match-wins: rules declared later take precedence, and
/// anything no rule allows is denied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PermissionSet {
    rules: Vec<Rule>,
}

impl PermissionSet {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Relevant rules, highest precedence first.
    fn rules_for(&self, action: Action, subject: Subject) -> impl Iterator<Item = &Rule> + '_ {
        self.rules
            .iter()
            .rev()
            .filter(move |rule| rule.is_relevant(action, subject))
    }

    /// Instance check against the resource's JSON closure.
    pub fn can(&self, action: Action, subject: Subject, resource: &Value) -> bool {
        self.rules_for(action, subject)
            .find(|rule| rule.matches_resource(resource))
            .map(|rule| rule.effect == Effect::Allow)
            .unwrap_or(false)
    }

    /// Type-level check: could this actor perform `action` on some `subject`?
    pub fn can_any(&self, action: Action, subject: Subject) -> bool {
        self.relevant_rule(action, subject)
            .map(|rule| rule.effect == Effect::Allow)
            .unwrap_or(false)
    }

    /// The rule deciding a type-level check, if any.
    pub fn relevant_rule(&self, action: Action, subject: Subject) -> Option<&Rule> {
        self.rules_for(action, subject)
            .find(|rule| rule.matches_subject_type())
    }

    /// Filter selecting exactly the instances `action` is allowed on.
    pub fn accessible_by(&self, action: Action, subject: Subject) -> Predicate {
        let mut allowed: Vec<Predicate> = Vec::new();
        let mut excluded: Vec<Predicate> = Vec::new();
        let mut unconditional = false;

        for rule in self.rules_for(action, subject) {
            match (rule.effect, &rule.predicate) {
                (Effect::Deny, None) => break,
                (Effect::Allow, None) => {
                    unconditional = true;
                    break;
                }
                (Effect::Allow, Some(p)) => allowed.push(p.clone()),
                (Effect::Deny, Some(p)) => excluded.push(predicate::not(p.clone())),
            }
        }

        if !unconditional && allowed.is_empty() {
            return Predicate::Never;
        }

        let grant = if unconditional {
            Predicate::Always
        } else {
            predicate::any(allowed)
        };

        predicate::all(std::iter::once(grant).chain(excluded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::predicate::eq;
    use serde_json::json;

    #[test]
    fn empty_set_denies_everything() {
        let set = RuleBuilder::new().build();
        assert!(!set.can(Action::Read, Subject::Download, &json!({})));
        assert!(!set.can_any(Action::Read, Subject::Download));
        assert_eq!(set.accessible_by(Action::Read, Subject::Download), Predicate::Never);
    }

    #[test]
    fn manage_deny_covers_every_action() {
        let mut builder = RuleBuilder::new();
        builder
            .cannot(Action::Manage, Subject::Download)
            .because("nope");
        let set = builder.build();

        for action in [Action::Create, Action::Read, Action::Update, Action::Delete, Action::Manage] {
            assert!(!set.can_any(action, Subject::Download));
            assert_eq!(set.accessible_by(action, Subject::Download), Predicate::Never);
        }
        let rule = set.relevant_rule(Action::Read, Subject::Download).unwrap();
        assert_eq!(rule.reason.as_deref(), Some("nope"));
    }

    #[test]
    fn later_rules_take_precedence() {
        let mut builder = RuleBuilder::new();
        builder.can(Action::Read, Subject::Download);
        builder
            .cannot(Action::Read, Subject::Download)
            .when(eq("hidden", true));
        let set = builder.build();

        assert!(set.can(Action::Read, Subject::Download, &json!({"hidden": false})));
        assert!(!set.can(Action::Read, Subject::Download, &json!({"hidden": true})));
        assert!(set.can_any(Action::Read, Subject::Download));
        assert_eq!(
            set.accessible_by(Action::Read, Subject::Download),
            predicate::not(eq("hidden", true))
        );
    }

    #[test]
    fn conditional_allows_are_or_ed() {
        let mut builder = RuleBuilder::new();
        builder.can(Action::Read, Subject::Download).when(eq("a", 1i64));
        builder.can(Action::Read, Subject::Download).when(eq("b", 2i64));
        let set = builder.build();

        assert_eq!(
            set.accessible_by(Action::Read, Subject::Download),
            Predicate::Any(vec![eq("b", 2i64), eq("a", 1i64)])
        );
        assert!(set.can(Action::Read, Subject::Download, &json!({"a": 1})));
        assert!(!set.can(Action::Read, Subject::Download, &json!({"a": 2})));
        assert!(!set.can(Action::Delete, Subject::Download, &json!({"a": 1})));
    }

    #[test]
    fn unconditional_deny_below_allow_is_shadowed() {
        let mut builder = RuleBuilder::new();
        builder.cannot(Action::Manage, Subject::Download);
        builder.can(Action::Read, Subject::Download).when(eq("a", 1i64));
        let set = builder.build();

        assert_eq!(set.accessible_by(Action::Read, Subject::Download), eq("a", 1i64));
        assert!(!set.can_any(Action::Update, Subject::Download));
    }
}
