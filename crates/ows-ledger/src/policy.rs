//! The policy engine: ordered allow/deny statements over actions and
//! resources.

/// Whether a statement allows or denies the actions/resources it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The statement grants access when it matches.
    Allow,
    /// The statement revokes access when it matches, and cannot be
    /// overridden by a later `Allow` in the same policy.
    Deny,
}

/// One allow/deny rule. `actions` entries are `*`, `<category>:*`, or
/// `<category>:<name>`; `resources` entries are `*` or an exact resource
/// id.
#[derive(Debug, Clone)]
pub struct PolicyStatement {
    /// Action patterns this statement matches.
    pub actions: Vec<String>,
    /// Resource patterns this statement matches.
    pub resources: Vec<String>,
    /// Whether a match allows or denies.
    pub effect: Effect,
}

impl PolicyStatement {
    fn matches_action(&self, category: &str, name: &str) -> bool {
        self.actions.iter().any(|pattern| {
            if pattern == "*" {
                return true;
            }
            match pattern.split_once(':') {
                Some((c, n)) => (c == "*" || c == category) && (n == "*" || n == name),
                None => false,
            }
        })
    }

    fn matches_resource(&self, resource: &str) -> bool {
        self.resources
            .iter()
            .any(|pattern| pattern == "*" || pattern == resource)
    }

    fn matches(&self, category: &str, name: &str, resource: &str) -> bool {
        self.matches_action(category, name) && self.matches_resource(resource)
    }

    fn allows(&self, category: &str, name: &str, resource: &str) -> bool {
        self.effect == Effect::Allow && self.matches(category, name, resource)
    }

    fn denies(&self, category: &str, name: &str, resource: &str) -> bool {
        self.effect == Effect::Deny && self.matches(category, name, resource)
    }
}

/// An ordered list of statements. An action on a resource is allowed iff
/// some statement allows it and no statement denies it.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// The statements that make up this policy, evaluated in order.
    pub statements: Vec<PolicyStatement>,
}

impl Policy {
    /// The unconditional `{*, *, Allow}` policy granted to root users. It
    /// can never be locked out by a `Deny` because it is the policy's only
    /// statement.
    #[must_use]
    pub fn root() -> Self {
        Self {
            statements: vec![PolicyStatement {
                actions: vec!["*".to_string()],
                resources: vec!["*".to_string()],
                effect: Effect::Allow,
            }],
        }
    }

    fn allows_one(&self, category: &str, name: &str, resource: &str) -> bool {
        let mut allowed = false;
        for statement in &self.statements {
            if statement.allows(category, name, resource) {
                allowed = true;
            }
            if statement.denies(category, name, resource) {
                return false;
            }
        }
        allowed
    }

    /// Returns `true` iff this policy allows `(category, name)` on every
    /// resource in `resources`.
    #[must_use]
    pub fn allows_all(&self, category: &str, name: &str, resources: &[String]) -> bool {
        resources
            .iter()
            .all(|resource| self.allows_one(category, name, resource))
    }
}

/// Returns `true` iff any of `policies` allows `(category, name)` on every
/// one of `resources`.
#[must_use]
pub fn any_policy_allows(policies: &[Policy], category: &str, name: &str, resources: &[String]) -> bool {
    policies
        .iter()
        .any(|policy| policy.allows_all(category, name, resources))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn root_policy_allows_anything() {
        let root = Policy::root();
        assert!(root.allows_all("nodes", "Add", &["*".to_string()]));
        assert!(root.allows_all("gateways", "Remove", &["gateway1xyz".to_string()]));
    }

    #[test]
    fn wildcard_category_statement_matches() {
        let policy = Policy {
            statements: vec![PolicyStatement {
                actions: vec!["gateways:*".to_string()],
                resources: vec!["*".to_string()],
                effect: Effect::Allow,
            }],
        };
        assert!(policy.allows_all("gateways", "Add", &["*".to_string()]));
        assert!(!policy.allows_all("nodes", "Add", &["*".to_string()]));
    }

    #[test]
    fn deny_overrides_allow_within_same_policy() {
        let policy = Policy {
            statements: vec![
                PolicyStatement {
                    actions: vec!["*".to_string()],
                    resources: vec!["*".to_string()],
                    effect: Effect::Allow,
                },
                PolicyStatement {
                    actions: vec!["gateways:Remove".to_string()],
                    resources: vec!["gateway1xyz".to_string()],
                    effect: Effect::Deny,
                },
            ],
        };
        assert!(!policy.allows_all("gateways", "Remove", &["gateway1xyz".to_string()]));
        assert!(policy.allows_all("gateways", "Add", &["*".to_string()]));
    }

    #[test]
    fn multi_resource_evaluation_is_a_conjunction() {
        let policy = Policy {
            statements: vec![PolicyStatement {
                actions: vec!["*".to_string()],
                resources: vec!["gateway1xyz".to_string()],
                effect: Effect::Allow,
            }],
        };
        assert!(!policy.allows_all(
            "gateways",
            "Remove",
            &["gateway1xyz".to_string(), "gateway2xyz".to_string()]
        ));
    }

    #[test]
    fn any_policy_allows_is_a_disjunction_over_policies() {
        let narrow = Policy {
            statements: vec![PolicyStatement {
                actions: vec!["functions:*".to_string()],
                resources: vec!["*".to_string()],
                effect: Effect::Allow,
            }],
        };
        let other = Policy {
            statements: vec![PolicyStatement {
                actions: vec!["gateways:*".to_string()],
                resources: vec!["*".to_string()],
                effect: Effect::Allow,
            }],
        };
        assert!(any_policy_allows(
            &[narrow, other],
            "gateways",
            "Add",
            &["*".to_string()]
        ));
    }
}
