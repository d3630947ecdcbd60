use std::collections::BTreeMap;
use tracing::info;

use crate::config::AlarmSettings;
use crate::error::Result;
use crate::provider::Monitoring;
use crate::types::{AlarmTopicHandle, Region};

/// One notification topic per region for the auto-recovery alarms
pub async fn setup_alarm_topics<P>(
    provider: &P,
    cluster_name: &str,
    regions: &[Region],
    settings: &AlarmSettings,
) -> Result<BTreeMap<Region, AlarmTopicHandle>>
where
    P: Monitoring + ?Sized,
{
    let topic_name = settings.topic_name(cluster_name);
    let mut topics = BTreeMap::new();

    for region in regions {
        info!("Setting up alarm topic {} in {}..", topic_name, region);
        let topic = provider
            .ensure_alarm_topic(region, topic_name, settings.email.as_deref())
            .await?;
        topics.insert(region.clone(), topic);
    }

    Ok(topics)
}
