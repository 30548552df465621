//! Warden Core
//!
//! Shared vocabulary of the Warden policy decision point: typed identifiers,
//! effects and decisions, XACML status codes with their priority ordering,
//! attribute categories, data types and missing-attribute descriptors.
//! Contains no evaluation logic.

pub mod error;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
