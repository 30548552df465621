//! Combining algorithms and their registry.
//!
//! Rule- and policy-combining algorithms live in separate namespaces: the
//! same algorithm is registered once under its rule URN and once under its
//! policy URN.

pub mod legacy;
pub mod overrides;
pub mod selection;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::context::EvaluationContext;
use crate::error::{PolicyError, PolicyResult};
use crate::model::CombinerParameter;
use crate::rule::Evaluatable;
use crate::types::DecisionResult;

use legacy::{LegacyPolicyOverrides, LegacyRuleOverrides};
use overrides::Overrides;
use selection::{FirstApplicable, OnlyOneApplicable, Unless};

pub const RULE_NS_1_0: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm";
pub const RULE_NS_1_1: &str = "urn:oasis:names:tc:xacml:1.1:rule-combining-algorithm";
pub const RULE_NS_3_0: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm";
pub const POLICY_NS_1_0: &str = "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm";
pub const POLICY_NS_1_1: &str = "urn:oasis:names:tc:xacml:1.1:policy-combining-algorithm";
pub const POLICY_NS_3_0: &str = "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm";

/// Default algorithm for combining the deployed top-level nodes.
pub const ONLY_ONE_APPLICABLE: &str =
    "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:only-one-applicable";

pub trait CombiningAlgorithm: Send + Sync {
    fn id(&self) -> &str;

    /// Combine the children in declaration order.
    fn combine(
        &self,
        children: &[&dyn Evaluatable],
        parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult;
}

pub(crate) fn log_combined(algorithm: &str, children: usize, result: &DecisionResult) {
    debug!(algorithm, children, decision = %result.decision, "combined");
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CombiningAlgorithmRegistry {
    rule: HashMap<String, Arc<dyn CombiningAlgorithm>>,
    policy: HashMap<String, Arc<dyn CombiningAlgorithm>>,
}

impl CombiningAlgorithmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every XACML 1.0, 1.1 and 3.0 algorithm.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for name in ["deny-overrides", "ordered-deny-overrides"] {
            registry.add_rule(Overrides::deny(format!("{}:{}", RULE_NS_3_0, name)));
            registry.add_policy(Overrides::deny(format!("{}:{}", POLICY_NS_3_0, name)));
        }
        for name in ["permit-overrides", "ordered-permit-overrides"] {
            registry.add_rule(Overrides::permit(format!("{}:{}", RULE_NS_3_0, name)));
            registry.add_policy(Overrides::permit(format!("{}:{}", POLICY_NS_3_0, name)));
        }
        registry.add_rule(Unless::deny_unless_permit(format!("{}:deny-unless-permit", RULE_NS_3_0)));
        registry.add_policy(Unless::deny_unless_permit(format!("{}:deny-unless-permit", POLICY_NS_3_0)));
        registry.add_rule(Unless::permit_unless_deny(format!("{}:permit-unless-deny", RULE_NS_3_0)));
        registry.add_policy(Unless::permit_unless_deny(format!("{}:permit-unless-deny", POLICY_NS_3_0)));

        registry.add_rule(LegacyRuleOverrides::deny(format!("{}:deny-overrides", RULE_NS_1_0)));
        registry.add_rule(LegacyRuleOverrides::permit(format!("{}:permit-overrides", RULE_NS_1_0)));
        registry.add_rule(LegacyRuleOverrides::deny(format!("{}:ordered-deny-overrides", RULE_NS_1_1)));
        registry.add_rule(LegacyRuleOverrides::permit(format!("{}:ordered-permit-overrides", RULE_NS_1_1)));
        registry.add_policy(LegacyPolicyOverrides::deny(format!("{}:deny-overrides", POLICY_NS_1_0)));
        registry.add_policy(LegacyPolicyOverrides::permit(format!("{}:permit-overrides", POLICY_NS_1_0)));
        registry.add_policy(LegacyPolicyOverrides::deny(format!("{}:ordered-deny-overrides", POLICY_NS_1_1)));
        registry.add_policy(LegacyPolicyOverrides::permit(format!(
            "{}:ordered-permit-overrides",
            POLICY_NS_1_1
        )));

        registry.add_rule(FirstApplicable::new(format!("{}:first-applicable", RULE_NS_1_0)));
        registry.add_policy(FirstApplicable::new(format!("{}:first-applicable", POLICY_NS_1_0)));
        registry.add_policy(OnlyOneApplicable::new(ONLY_ONE_APPLICABLE));

        debug!(
            rule = registry.rule.len(),
            policy = registry.policy.len(),
            "combining algorithms registered"
        );
        registry
    }

    fn add_rule(&mut self, algorithm: impl CombiningAlgorithm + 'static) {
        self.rule.insert(algorithm.id().to_string(), Arc::new(algorithm));
    }

    fn add_policy(&mut self, algorithm: impl CombiningAlgorithm + 'static) {
        self.policy.insert(algorithm.id().to_string(), Arc::new(algorithm));
    }

    pub fn register_rule(&mut self, algorithm: Arc<dyn CombiningAlgorithm>) -> PolicyResult<()> {
        insert_unique(&mut self.rule, algorithm)
    }

    pub fn register_policy(&mut self, algorithm: Arc<dyn CombiningAlgorithm>) -> PolicyResult<()> {
        insert_unique(&mut self.policy, algorithm)
    }

    pub fn rule_algorithm(&self, id: &str) -> Option<&Arc<dyn CombiningAlgorithm>> {
        self.rule.get(id)
    }

    pub fn policy_algorithm(&self, id: &str) -> Option<&Arc<dyn CombiningAlgorithm>> {
        self.policy.get(id)
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        sorted_ids(&self.rule)
    }

    pub fn policy_ids(&self) -> Vec<&str> {
        sorted_ids(&self.policy)
    }
}

fn insert_unique(
    map: &mut HashMap<String, Arc<dyn CombiningAlgorithm>>,
    algorithm: Arc<dyn CombiningAlgorithm>,
) -> PolicyResult<()> {
    let id = algorithm.id().to_string();
    if map.contains_key(&id) {
        return Err(PolicyError::InvalidConfiguration(format!(
            "combining algorithm {} is already registered",
            id
        )));
    }
    map.insert(id, algorithm);
    Ok(())
}

fn sorted_ids(map: &HashMap<String, Arc<dyn CombiningAlgorithm>>) -> Vec<&str> {
    let mut ids: Vec<&str> = map.keys().map(String::as_str).collect();
    ids.sort_unstable();
    ids
}

impl fmt::Debug for CombiningAlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombiningAlgorithmRegistry")
            .field("rule", &self.rule.len())
            .field("policy", &self.policy.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_namespaces() {
        let registry = CombiningAlgorithmRegistry::standard();
        assert!(registry
            .rule_algorithm("urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides")
            .is_some());
        assert!(registry
            .policy_algorithm("urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-overrides")
            .is_some());
        assert!(registry.policy_algorithm(ONLY_ONE_APPLICABLE).is_some());
        assert!(registry
            .rule_algorithm("urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:only-one-applicable")
            .is_none());
        assert!(registry
            .policy_algorithm("urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:permit-overrides")
            .is_none());
        assert_eq!(registry.rule_ids().len(), 11);
        assert_eq!(registry.policy_ids().len(), 12);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = CombiningAlgorithmRegistry::standard();
        let rule: Arc<dyn CombiningAlgorithm> =
            Arc::new(FirstApplicable::new(format!("{}:first-applicable", RULE_NS_1_0)));
        assert!(registry.register_rule(rule.clone()).is_err());
        // Rule and policy namespaces are separate.
        assert!(registry.register_policy(rule).is_ok());
        let policy: Arc<dyn CombiningAlgorithm> = Arc::new(OnlyOneApplicable::new(ONLY_ONE_APPLICABLE));
        assert!(registry.register_policy(policy).is_err());
    }
}
