//! Reading policy and request documents from disk.
//!
//! A policy file holds either one policy or policy set, or a JSON array of
//! them. A request file holds one request.

use std::path::Path;

use tracing::debug;
use warden_policy::{EvaluatableNode, Request};

use crate::error::{RootError, RootResult};

fn read(path: &Path) -> RootResult<String> {
    std::fs::read_to_string(path).map_err(|e| RootError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_error(path: &Path, e: serde_json::Error) -> RootError {
    RootError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Parse a policy document held in memory.
pub fn parse_policies(path: &Path, text: &str) -> RootResult<Vec<EvaluatableNode>> {
    let document: serde_json::Value = serde_json::from_str(text).map_err(|e| parse_error(path, e))?;
    let nodes = if document.is_array() {
        serde_json::from_value::<Vec<EvaluatableNode>>(document)
    } else {
        serde_json::from_value::<EvaluatableNode>(document).map(|node| vec![node])
    }
    .map_err(|e| parse_error(path, e))?;
    debug!(path = %path.display(), count = nodes.len(), "policy document parsed");
    Ok(nodes)
}

pub fn load_policies(path: &Path) -> RootResult<Vec<EvaluatableNode>> {
    parse_policies(path, &read(path)?)
}

pub fn load_request(path: &Path) -> RootResult<Request> {
    serde_json::from_str(&read(path)?).map_err(|e| parse_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const POLICY: &str = r#"{
        "type": "policy",
        "id": "p",
        "rule_combining_algorithm": "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides",
        "rules": [ { "id": "r", "effect": "Permit" } ]
    }"#;

    #[test]
    fn test_single_node_document() {
        let nodes = parse_policies(Path::new("p.json"), POLICY).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id().as_str(), "p");
    }

    #[test]
    fn test_array_document() {
        let text = format!("[{}, {}]", POLICY, POLICY.replace("\"id\": \"p\"", "\"id\": \"q\""));
        let nodes = parse_policies(Path::new("many.json"), &text).unwrap();
        let ids: Vec<&str> = nodes.iter().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, vec!["p", "q"]);
    }

    #[test]
    fn test_bad_document_names_the_file() {
        let err = parse_policies(Path::new("broken.json"), r#"{ "type": "rule" }"#).unwrap_err();
        match err {
            RootError::Load { path, .. } => assert_eq!(path, PathBuf::from("broken.json")),
            other => panic!("expected a load error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_request(Path::new("/nonexistent/request.json")).unwrap_err();
        assert!(matches!(err, RootError::Load { .. }));
    }
}
