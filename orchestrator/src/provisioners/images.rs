use std::collections::BTreeMap;
use tracing::info;

use crate::error::{ProvisionError, Result};
use crate::provider::ImageCatalog;
use crate::types::{ImageHandle, Region};

/// Latest machine image per region; fails before anything is created
pub async fn find_machine_images<P>(
    provider: &P,
    regions: &[Region],
    name_pattern: &str,
) -> Result<BTreeMap<Region, ImageHandle>>
where
    P: ImageCatalog + ?Sized,
{
    let mut images = BTreeMap::new();

    for region in regions {
        info!("Finding latest Taupage AMI in {}..", region);
        let image = provider
            .resolve_latest_machine_image(region, name_pattern)
            .await?
            .ok_or_else(|| {
                ProvisionError::resolution(format!("machine image {}", name_pattern), region)
            })?;
        info!("Using {} in {}", image, region);
        images.insert(region.clone(), image);
    }

    Ok(images)
}
