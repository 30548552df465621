//! Deploy-time validation of a policy tree.
//!
//! Everything that can be checked without a request is checked here, so
//! that evaluation never meets an unknown algorithm or a misspelt function.

use std::collections::HashSet;

use crate::combining::CombiningAlgorithmRegistry;
use crate::expression::{Expression, VariableDefinition};
use crate::function::FunctionRegistry;
use crate::model::{
    AdviceExpression, AttributeAssignmentExpression, EvaluatableNode, ObligationExpression, Policy, PolicyChild,
    PolicyHeader, PolicySet,
};
use crate::target::Target;

struct Validator<'r> {
    functions: &'r FunctionRegistry,
    algorithms: &'r CombiningAlgorithmRegistry,
    errors: Vec<String>,
}

/// Collect every problem in the tree rooted at `node`.
pub fn validate_node(
    node: &EvaluatableNode,
    functions: &FunctionRegistry,
    algorithms: &CombiningAlgorithmRegistry,
) -> Result<(), Vec<String>> {
    let mut validator = Validator {
        functions,
        algorithms,
        errors: Vec::new(),
    };
    match node {
        EvaluatableNode::Policy(p) => validator.policy(p),
        EvaluatableNode::PolicySet(s) => validator.policy_set(s),
    }
    if validator.errors.is_empty() {
        Ok(())
    } else {
        Err(validator.errors)
    }
}

impl Validator<'_> {
    fn header(&mut self, header: &PolicyHeader, variables: &[VariableDefinition], what: &str) -> String {
        let path = format!("{} '{}'", what, header.id);
        if header.id.as_str().is_empty() {
            self.errors.push(format!("{} id must not be empty", what));
        }
        if header.version.is_empty() {
            self.errors.push(format!("{}: version must not be empty", path));
        }
        self.target(&header.target, &path);
        self.obligations(&header.obligations, &header.advice, variables, &path);
        path
    }

    fn policy(&mut self, policy: &Policy) {
        let path = self.header(&policy.header, &policy.variables, "policy");
        if self.algorithms.rule_algorithm(&policy.rule_combining_algorithm).is_none() {
            self.errors.push(format!(
                "{}: unknown rule-combining algorithm {}",
                path, policy.rule_combining_algorithm
            ));
        }

        let mut variable_ids = HashSet::new();
        for variable in &policy.variables {
            if !variable_ids.insert(variable.variable_id.as_str()) {
                self.errors
                    .push(format!("{}: duplicate variable id '{}'", path, variable.variable_id));
            }
            let here = format!("{} variable '{}'", path, variable.variable_id);
            self.expression(&variable.expression, &policy.variables, &here);
        }

        let mut rule_ids = HashSet::new();
        for rule in &policy.rules {
            if rule.id.as_str().is_empty() {
                self.errors.push(format!("{}: rule id must not be empty", path));
            } else if !rule_ids.insert(rule.id.as_str()) {
                self.errors.push(format!("{}: duplicate rule id '{}'", path, rule.id));
            }
            let here = format!("{} rule '{}'", path, rule.id);
            self.target(&rule.target, &here);
            if let Some(condition) = &rule.condition {
                self.expression(condition, &policy.variables, &here);
            }
            self.obligations(&rule.obligations, &rule.advice, &policy.variables, &here);
        }
    }

    fn policy_set(&mut self, set: &PolicySet) {
        let path = self.header(&set.header, &[], "policy set");
        if self.algorithms.policy_algorithm(&set.policy_combining_algorithm).is_none() {
            self.errors.push(format!(
                "{}: unknown policy-combining algorithm {}",
                path, set.policy_combining_algorithm
            ));
        }
        for child in &set.children {
            match child {
                PolicyChild::Policy(p) => self.policy(p),
                PolicyChild::PolicySet(s) => self.policy_set(s),
                PolicyChild::PolicyReference(r) | PolicyChild::PolicySetReference(r) => {
                    if r.id.as_str().is_empty() {
                        self.errors.push(format!("{}: reference with empty id", path));
                    }
                }
            }
        }
    }

    fn target(&mut self, target: &Target, path: &str) {
        for any_of in &target.any_of {
            if any_of.all_of.is_empty() {
                self.errors.push(format!("{}: empty AnyOf in target", path));
            }
            for all_of in &any_of.all_of {
                if all_of.matches.is_empty() {
                    self.errors.push(format!("{}: empty AllOf in target", path));
                }
                for clause in &all_of.matches {
                    match self.functions.get(&clause.match_id) {
                        None => self
                            .errors
                            .push(format!("{}: unknown match function {}", path, clause.match_id)),
                        Some(f) if !f.arity().accepts(2) => self.errors.push(format!(
                            "{}: {} cannot be used in a match, it takes {} argument(s)",
                            path,
                            clause.match_id,
                            f.arity()
                        )),
                        Some(_) => {}
                    }
                }
            }
        }
    }

    fn obligations(
        &mut self,
        obligations: &[ObligationExpression],
        advice: &[AdviceExpression],
        variables: &[VariableDefinition],
        path: &str,
    ) {
        for o in obligations {
            self.assignments(&o.assignments, variables, &format!("{} obligation '{}'", path, o.obligation_id));
        }
        for a in advice {
            self.assignments(&a.assignments, variables, &format!("{} advice '{}'", path, a.advice_id));
        }
    }

    fn assignments(&mut self, assignments: &[AttributeAssignmentExpression], variables: &[VariableDefinition], path: &str) {
        for assignment in assignments {
            self.expression(&assignment.expression, variables, path);
        }
    }

    fn expression(&mut self, expression: &Expression, variables: &[VariableDefinition], path: &str) {
        let functions = self.functions;
        let mut errors = Vec::new();
        expression.walk(&mut |e| match e {
            Expression::Apply(apply) => match functions.get(&apply.function_id) {
                None => errors.push(format!("{}: unknown function {}", path, apply.function_id)),
                Some(f) if !f.arity().accepts(apply.arguments.len()) => errors.push(format!(
                    "{}: {} expects {} argument(s), got {}",
                    path,
                    apply.function_id,
                    f.arity(),
                    apply.arguments.len()
                )),
                Some(_) => {}
            },
            Expression::Function { function_id } => {
                if !functions.contains(function_id) {
                    errors.push(format!("{}: unknown function {}", path, function_id));
                }
            }
            Expression::Variable { variable_id } => {
                if !variables.iter().any(|v| &v.variable_id == variable_id) {
                    errors.push(format!("{}: undefined variable '{}'", path, variable_id));
                }
            }
            _ => {}
        });
        self.errors.extend(errors);
    }
}
