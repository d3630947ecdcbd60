//! Provisioning orchestrator for multi-region Plan B Cassandra clusters.
//!
//! The cloud is reached only through the traits in [`provider`]; the
//! [`sim`] module implements them in memory for tests and dry runs.

pub mod allocator;
pub mod boot;
pub mod config;
pub mod error;
pub mod launcher;
pub mod ledger;
pub mod orchestrator;
pub mod provider;
pub mod provisioners;
pub mod report;
pub mod seeds;
pub mod sim;
pub mod types;

pub use config::{ClusterConfig, ClusterConfigBuilder, ImageSource, Timing};
pub use error::{ProviderError, ProvisionError, Result};
pub use orchestrator::Orchestrator;
pub use provider::{ArtifactResolver, CertificateIssuer, CloudProvider};
pub use report::{failure_notice, ProvisionReport};
pub use types::Region;
