use tracing::info;

use crate::config::ImageSource;
use crate::error::{ProvisionError, Result};
use crate::provider::ArtifactResolver;

/// Container image the nodes run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImage {
    pub reference: String,
    pub version: String,
}

impl DockerImage {
    /// Version is whatever follows the last `:` of the reference
    pub fn from_reference(reference: &str) -> Self {
        let version = reference.rsplit(':').next().unwrap_or(reference);
        Self {
            reference: reference.to_string(),
            version: version.to_string(),
        }
    }
}

/// Turn the configured image source into a concrete image reference,
/// asking the artifact registry for the latest tag when needed
pub async fn resolve_docker_image<R>(
    resolver: &R,
    source: &ImageSource,
    registry_host: &str,
) -> Result<DockerImage>
where
    R: ArtifactResolver + ?Sized,
{
    let image = match source {
        ImageSource::DockerImage(reference) => DockerImage::from_reference(reference),
        ImageSource::Artifact(name) => {
            let version = resolver.latest_version(name).await?.ok_or_else(|| {
                ProvisionError::ResolutionFailure {
                    what: format!("artifact {}", name),
                    region: registry_host.to_string(),
                }
            })?;
            DockerImage {
                reference: format!("{}/stups/{}:{}", registry_host, name, version),
                version,
            }
        }
    };

    info!("Using docker image: {}", image.reference);
    Ok(image)
}
