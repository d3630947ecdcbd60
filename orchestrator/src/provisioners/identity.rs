use tracing::info;

use crate::error::Result;
use crate::provider::IdentityProvider;
use crate::types::ProfileHandle;

pub async fn ensure_instance_profile<P>(provider: &P, cluster_name: &str) -> Result<ProfileHandle>
where
    P: IdentityProvider + ?Sized,
{
    info!("Ensuring instance profile for {}..", cluster_name);
    let profile = provider.ensure_identity_profile(cluster_name).await?;
    Ok(profile)
}
