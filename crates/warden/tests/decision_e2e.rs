//! End-to-end decision stories: policy documents on disk, a configuration
//! file, and requests decided through the public API.
//!
//! Story 1: a policy set where only one child applies
//! Story 2: a required attribute nobody can supply
//! Story 3: date comparisons, well-typed and ill-typed
//! Story 4: obligations fed by request attributes
//! Story 5: policy references across files
//! Story 6: undeploy and redeploy
//! Story 7: concurrent evaluation while deploying

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use warden::{build_pdp, deploy_files, loader, RootConfig};
use warden_core::{DecisionType, PolicyId, StatusCode};
use warden_policy::{Pdp, Request};

const DENY_OVERRIDES: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides";
const PERMIT_OVERRIDES_SET: &str = "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:permit-overrides";
const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";

fn write_json(dir: &TempDir, name: &str, value: &serde_json::Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn resource_target(resource: &str) -> serde_json::Value {
    json!([[[{
        "match_id": STRING_EQUAL,
        "value": { "data_type": "string", "value": resource },
        "designator": { "category": "resource", "attribute_id": "resource-id", "data_type": "string" }
    }]]])
}

fn request_for(resource: &str) -> serde_json::Value {
    json!({
        "attributes": [{
            "category": "urn:oasis:names:tc:xacml:3.0:attribute-category:resource",
            "attributes": [{
                "attribute_id": "resource-id",
                "values": [{ "data_type": "string", "value": resource }]
            }]
        }]
    })
}

fn permit_policy(id: &str) -> serde_json::Value {
    json!({
        "type": "policy",
        "id": id,
        "rule_combining_algorithm": DENY_OVERRIDES,
        "rules": [{ "id": "permit", "effect": "Permit" }]
    })
}

fn decide(pdp: &Pdp, dir: &TempDir, name: &str, request: serde_json::Value) -> warden_policy::Response {
    let path = write_json(dir, name, &request);
    let request = loader::load_request(&path).unwrap();
    pdp.evaluate(&request)
}

fn pdp_with(dir: &TempDir, documents: &[(&str, serde_json::Value)]) -> Pdp {
    let mut config = RootConfig::default();
    config.policies.paths = documents
        .iter()
        .map(|(name, doc)| write_json(dir, name, doc))
        .collect();
    build_pdp(&config).unwrap()
}

// ============================================================================
// Story 1: one applicable child in a permit-overrides set
// ============================================================================

#[test]
fn test_story_policy_set_with_one_applicable_child() {
    let dir = tempfile::tempdir().unwrap();
    let set = json!({
        "type": "policy_set",
        "id": "documents",
        "policy_combining_algorithm": PERMIT_OVERRIDES_SET,
        "children": [
            {
                "type": "policy", "id": "invoices", "target": resource_target("invoice"),
                "rule_combining_algorithm": DENY_OVERRIDES,
                "rules": [{ "id": "deny-all", "effect": "Deny" }]
            },
            {
                "type": "policy", "id": "reports", "target": resource_target("report"),
                "rule_combining_algorithm": DENY_OVERRIDES,
                "rules": [{ "id": "permit-all", "effect": "Permit" }]
            }
        ]
    });
    let pdp = pdp_with(&dir, &[("set.json", set)]);

    let response = decide(&pdp, &dir, "report.json", request_for("report"));
    assert_eq!(response.decision, DecisionType::Permit);
    assert_eq!(response.status.code, StatusCode::Ok);

    let response = decide(&pdp, &dir, "invoice.json", request_for("invoice"));
    assert_eq!(response.decision, DecisionType::Deny);

    let response = decide(&pdp, &dir, "other.json", request_for("payroll"));
    assert_eq!(response.decision, DecisionType::NotApplicable);
}

// ============================================================================
// Story 2: a required attribute is missing everywhere
// ============================================================================

#[test]
fn test_story_missing_subject_id() {
    let dir = tempfile::tempdir().unwrap();
    let policy = json!({
        "type": "policy",
        "id": "owners-only",
        "rule_combining_algorithm": DENY_OVERRIDES,
        "rules": [{
            "id": "owner",
            "effect": "Permit",
            "condition": {
                "kind": "apply",
                "function_id": "urn:oasis:names:tc:xacml:1.0:function:string-is-in",
                "arguments": [
                    { "kind": "value", "data_type": "string", "value": "alice" },
                    { "kind": "designator", "category": "subject", "attribute_id": "subject-id",
                      "data_type": "string", "must_be_present": true }
                ]
            }
        }]
    });
    let pdp = pdp_with(&dir, &[("owners.json", policy)]);

    let response = decide(&pdp, &dir, "req.json", request_for("report"));
    assert_eq!(response.decision, DecisionType::Indeterminate);
    assert_eq!(response.status.code, StatusCode::MissingAttribute);
    assert_eq!(response.status.missing_attributes.len(), 1);
    assert_eq!(response.status.missing_attributes[0].attribute_id.as_str(), "subject-id");

    // The same policy permits once the attribute is present.
    let mut request = request_for("report");
    request["attributes"].as_array_mut().unwrap().push(json!({
        "category": "subject",
        "attributes": [{ "attribute_id": "subject-id", "values": [{ "data_type": "string", "value": "alice" }] }]
    }));
    let response = decide(&pdp, &dir, "req-alice.json", request);
    assert_eq!(response.decision, DecisionType::Permit);
    assert!(response.status.missing_attributes.is_empty());
}

// ============================================================================
// Story 3: date comparisons
// ============================================================================

fn date_policy(id: &str, right: serde_json::Value) -> serde_json::Value {
    json!({
        "type": "policy",
        "id": id,
        "rule_combining_algorithm": DENY_OVERRIDES,
        "rules": [{
            "id": "after-new-year",
            "effect": "Permit",
            "condition": {
                "kind": "apply",
                "function_id": "urn:oasis:names:tc:xacml:1.0:function:date-greater-than",
                "arguments": [
                    { "kind": "value", "data_type": "date", "value": "2020-01-02" },
                    right
                ]
            }
        }]
    })
}

#[test]
fn test_story_date_greater_than() {
    let dir = tempfile::tempdir().unwrap();
    let pdp = pdp_with(
        &dir,
        &[(
            "dates.json",
            date_policy("dates", json!({ "kind": "value", "data_type": "date", "value": "2020-01-01" })),
        )],
    );
    let response = decide(&pdp, &dir, "req.json", request_for("report"));
    assert_eq!(response.decision, DecisionType::Permit);
}

#[test]
fn test_story_date_compared_with_string_is_processing_error() {
    let dir = tempfile::tempdir().unwrap();
    let pdp = pdp_with(
        &dir,
        &[(
            "dates.json",
            date_policy("dates", json!({ "kind": "value", "data_type": "string", "value": "yesterday" })),
        )],
    );
    let response = decide(&pdp, &dir, "req.json", request_for("report"));
    assert_eq!(response.decision, DecisionType::Indeterminate);
    assert_eq!(response.status.code, StatusCode::ProcessingError);
    assert!(response.status.message.is_some());
}

// ============================================================================
// Story 4: obligations carry request data
// ============================================================================

#[test]
fn test_story_obligation_assignments_from_request() {
    let dir = tempfile::tempdir().unwrap();
    let policy = json!({
        "type": "policy",
        "id": "audited",
        "rule_combining_algorithm": DENY_OVERRIDES,
        "obligations": [
            {
                "obligation_id": "audit-access",
                "fulfill_on": "Permit",
                "assignments": [{
                    "attribute_id": "resource",
                    "expression": { "kind": "designator", "category": "resource",
                                    "attribute_id": "resource-id", "data_type": "string" }
                }]
            },
            { "obligation_id": "alert", "fulfill_on": "Deny" }
        ],
        "advice": [{ "advice_id": "be-nice", "applies_to": "Permit" }],
        "rules": [{ "id": "permit", "effect": "Permit" }]
    });
    let pdp = pdp_with(&dir, &[("audited.json", policy)]);

    let response = decide(&pdp, &dir, "req.json", request_for("report"));
    assert_eq!(response.decision, DecisionType::Permit);
    assert_eq!(response.obligations.len(), 1);
    let obligation = &response.obligations[0];
    assert_eq!(obligation.obligation_id, "audit-access");
    assert_eq!(obligation.attribute_assignments.len(), 1);
    assert_eq!(obligation.attribute_assignments[0].value.to_string(), "report");
    assert_eq!(response.advice.len(), 1);

    // The response serializes with the public decision and status URNs.
    let printed = serde_json::to_value(&response).unwrap();
    assert_eq!(printed["status"]["code"], StatusCode::Ok.urn());
}

// ============================================================================
// Story 5: references between documents
// ============================================================================

#[test]
fn test_story_reference_matches_version_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let mut old = permit_policy("shared");
    old["rules"][0]["effect"] = json!("Deny");
    let mut new = permit_policy("shared-next");
    new["version"] = json!("1.4");

    let root = json!({
        "type": "policy_set",
        "id": "root",
        "policy_combining_algorithm": PERMIT_OVERRIDES_SET,
        "target": resource_target("report"),
        "children": [{ "type": "policy_reference", "id": "shared-next", "version": "1.+" }]
    });

    let mut config = RootConfig::default();
    config.pdp.root_combining_algorithm =
        "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:first-applicable".into();
    config.policies.paths = vec![
        write_json(&dir, "root.json", &root),
        write_json(&dir, "shared.json", &json!([old, new])),
    ];
    let pdp = build_pdp(&config).unwrap();

    // "root" is first and applicable, and it resolves its reference against
    // the deployed "shared-next" at version 1.4.
    let mut request = request_for("report");
    request["return_policy_id_list"] = json!(true);
    let response = decide(&pdp, &dir, "req.json", request);
    assert_eq!(response.decision, DecisionType::Permit);
    let ids: Vec<&str> = response.policy_identifiers.iter().map(|p| p.id.as_str()).collect();
    assert!(ids.contains(&"root"));
    assert!(ids.contains(&"shared-next"));
}

#[test]
fn test_story_dangling_reference_is_indeterminate() {
    let dir = tempfile::tempdir().unwrap();
    let root = json!({
        "type": "policy_set",
        "id": "root",
        "policy_combining_algorithm": PERMIT_OVERRIDES_SET,
        "children": [{ "type": "policy_set_reference", "id": "nowhere" }]
    });
    let pdp = pdp_with(&dir, &[("root.json", root)]);
    let response = decide(&pdp, &dir, "req.json", request_for("report"));
    assert_eq!(response.decision, DecisionType::Indeterminate);
    assert_ne!(response.status.code, StatusCode::Ok);
}

// ============================================================================
// Story 6: undeploy and redeploy
// ============================================================================

#[test]
fn test_story_redeploy_reproduces_decision() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_json(&dir, "p.json", &permit_policy("p"));
    let pdp = Pdp::builder().build().unwrap();
    deploy_files(&pdp, &[path.clone()]).unwrap();
    let request = Request::new();

    let before = pdp.evaluate(&request);
    assert_eq!(before.decision, DecisionType::Permit);

    pdp.undeploy(&PolicyId::new("p")).unwrap();
    assert_eq!(pdp.evaluate(&request).decision, DecisionType::NotApplicable);

    deploy_files(&pdp, &[path]).unwrap();
    assert_eq!(pdp.evaluate(&request), before);
    assert_eq!(pdp.evaluate(&request), before);
}

#[test]
fn test_story_invalid_document_is_rejected_whole() {
    let dir = tempfile::tempdir().unwrap();
    let mut broken = permit_policy("broken");
    broken["rules"][0]["condition"] = json!({
        "kind": "apply",
        "function_id": "urn:example:no-such-function",
        "arguments": []
    });
    let path = write_json(&dir, "broken.json", &broken);
    let pdp = Pdp::builder().build().unwrap();
    let err = deploy_files(&pdp, &[path]).unwrap_err();
    assert!(err.to_string().contains("urn:example:no-such-function"));
    assert!(pdp.repository().evaluatables().is_empty());
}

// ============================================================================
// Story 7: concurrent evaluation
// ============================================================================

#[test]
fn test_story_concurrent_evaluation_during_deploys() {
    let pdp = Arc::new(Pdp::builder().build().unwrap());
    let first = loader::parse_policies(std::path::Path::new("inline"), &permit_policy("p").to_string()).unwrap();
    for node in first {
        pdp.deploy(node).unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let pdp = Arc::clone(&pdp);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    // Either the single policy decides, or the second one
                    // has landed and only-one-applicable reports the clash.
                    let response = pdp.evaluate(&Request::new());
                    assert!(matches!(
                        response.decision,
                        DecisionType::Permit | DecisionType::Indeterminate
                    ));
                }
            })
        })
        .collect();

    let writer = {
        let pdp = Arc::clone(&pdp);
        std::thread::spawn(move || {
            let nodes = loader::parse_policies(std::path::Path::new("inline"), &permit_policy("q").to_string()).unwrap();
            for node in nodes {
                pdp.deploy(node).unwrap();
            }
        })
    };

    for handle in readers {
        handle.join().unwrap();
    }
    writer.join().unwrap();
    assert_eq!(pdp.repository().evaluatables().len(), 2);
}
