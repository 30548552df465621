//! Warden Root Library
//!
//! Wires the configuration file and policy documents to a
//! [`warden_policy::Pdp`]. The binary is a thin layer over [`build_pdp`] and
//! [`deploy_files`].

pub mod config;
pub mod error;
pub mod loader;

pub use config::{PdpConfig, PoliciesConfig, RepositoryKind, RootConfig};
pub use error::{RootError, RootResult};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use warden_core::PolicyId;
use warden_policy::{OrderedPolicyRepository, Pdp, PolicyRepository, UnorderedPolicyRepository};

/// Build a decision point from configuration and deploy the configured
/// policy files.
pub fn build_pdp(config: &RootConfig) -> RootResult<Pdp> {
    config.validate()?;
    let repository: Arc<dyn PolicyRepository> = match config.pdp.repository {
        RepositoryKind::Ordered => Arc::new(OrderedPolicyRepository::new()),
        RepositoryKind::Unordered => Arc::new(UnorderedPolicyRepository::new()),
    };
    let pdp = Pdp::builder()
        .repository(repository)
        .options(config.pdp.engine_options()?)
        .build()?;
    deploy_files(&pdp, &config.policies.paths)?;
    Ok(pdp)
}

/// Load and deploy every node from `paths`, in order. Returns the ids
/// deployed. Stops at the first file or node that fails.
pub fn deploy_files(pdp: &Pdp, paths: &[PathBuf]) -> RootResult<Vec<PolicyId>> {
    let mut deployed = Vec::new();
    for path in paths {
        for node in loader::load_policies(path)? {
            let id = node.id().clone();
            pdp.deploy(node)?;
            deployed.push(id);
        }
        info!(path = %path.display(), "policy file deployed");
    }
    Ok(deployed)
}
