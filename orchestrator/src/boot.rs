//! Boot configuration shipped to every node as user data.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{ClusterConfig, CLIENT_PORT, INTER_NODE_PORT};
use crate::error::{ProvisionError, Result};
use crate::provisioners::DockerImage;
use crate::types::{KeyMaterial, Topology};

pub const PASSWORD_LENGTH: usize = 32;
pub const DATA_DEVICE: &str = "/dev/xvdf";
pub const DATA_MOUNT: &str = "/var/lib/cassandra";

const USER_DATA_HEADER: &str = "#taupage-ami-config\n";

/// Letters, digits and punctuation without quotes and backslash
fn password_alphabet() -> Vec<u8> {
    (b'!'..=b'~')
        .filter(|c| !matches!(c, b'\\' | b'\'' | b'"'))
        .collect()
}

pub fn generate_password<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    let alphabet = password_alphabet();
    (0..length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volumes {
    /// Device -> volume name, filled in per node
    pub ebs: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub partition: String,
    pub options: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootConfig {
    pub runtime: String,
    pub source: String,
    pub application_id: String,
    pub application_version: String,
    pub networking: String,
    pub ports: BTreeMap<String, String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Volumes,
    pub mounts: BTreeMap<String, Mount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalyr_account_key: Option<String>,
}

impl BootConfig {
    /// Shared template for all nodes of the cluster. Seeds from every region
    /// are listed, by public address in public-facing mode.
    pub fn for_cluster(
        config: &ClusterConfig,
        image: &DockerImage,
        seeds: &Topology,
        keys: &KeyMaterial,
        admin_password: String,
    ) -> Self {
        let all_seeds = seeds
            .all_nodes()
            .map(|n| n.default_ip().to_string())
            .collect::<Vec<_>>()
            .join(",");
        let regions = config
            .regions
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut environment = BTreeMap::new();
        environment.insert("CLUSTER_NAME".to_string(), config.cluster_name.clone());
        environment.insert("CLUSTER_SIZE".to_string(), config.cluster_size.to_string());
        environment.insert("NUM_TOKENS".to_string(), config.num_tokens.to_string());
        environment.insert("REGIONS".to_string(), regions);
        environment.insert("SUBNET_TYPE".to_string(), config.subnet_type().to_string());
        environment.insert("SEEDS".to_string(), all_seeds);
        environment.insert("KEYSTORE".to_string(), STANDARD.encode(&keys.keystore));
        environment.insert("TRUSTSTORE".to_string(), STANDARD.encode(&keys.truststore));
        environment.insert("ADMIN_PASSWORD".to_string(), admin_password);
        // operator overrides win
        for (key, value) in &config.environment {
            environment.insert(key.clone(), value.clone());
        }

        let ports = [INTER_NODE_PORT, CLIENT_PORT]
            .iter()
            .map(|p| (p.to_string(), p.to_string()))
            .collect();

        let mut ebs = BTreeMap::new();
        ebs.insert(DATA_DEVICE.to_string(), None);

        let mut mounts = BTreeMap::new();
        mounts.insert(
            DATA_MOUNT.to_string(),
            Mount {
                partition: DATA_DEVICE.to_string(),
                options: "noatime,nodiratime".to_string(),
            },
        );

        Self {
            runtime: "Docker".to_string(),
            source: image.reference.clone(),
            application_id: config.cluster_name.clone(),
            application_version: image.version.clone(),
            networking: "host".to_string(),
            ports,
            environment,
            volumes: Volumes { ebs },
            mounts,
            scalyr_account_key: config.scalyr_key.clone(),
        }
    }

    /// Copy of the template bound to one node's data volume
    pub fn with_data_volume(&self, volume: &str) -> Self {
        let mut config = self.clone();
        config
            .volumes
            .ebs
            .insert(DATA_DEVICE.to_string(), Some(volume.to_string()));
        config
    }

    pub fn render(&self) -> Result<String> {
        let body = serde_json::to_string_pretty(self).map_err(|e| {
            ProvisionError::InvalidConfiguration(format!("boot configuration: {}", e))
        })?;
        Ok(format!("{}{}", USER_DATA_HEADER, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeAddress, Region};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::net::Ipv4Addr;

    fn keys() -> KeyMaterial {
        KeyMaterial {
            keystore: b"ks".to_vec(),
            truststore: b"ts".to_vec(),
        }
    }

    fn seeds() -> Topology {
        let mut seeds = Topology::new();
        seeds.insert(
            Region::from("eu-west-1"),
            vec![
                NodeAddress::private(Ipv4Addr::new(10, 0, 0, 11)),
                NodeAddress::private(Ipv4Addr::new(10, 0, 1, 11)),
            ],
        );
        seeds.insert(
            Region::from("us-east-1"),
            vec![NodeAddress::private(Ipv4Addr::new(10, 1, 0, 11))],
        );
        seeds
    }

    #[test]
    fn test_password_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        let password = generate_password(&mut rng, PASSWORD_LENGTH);

        assert_eq!(password.len(), PASSWORD_LENGTH);
        assert!(!password.contains(['\\', '\'', '"']));
        assert!(password.chars().all(|c| c.is_ascii_graphic()));
    }

    #[test]
    fn test_password_is_deterministic_for_seed() {
        let a = generate_password(&mut StdRng::seed_from_u64(42), 32);
        let b = generate_password(&mut StdRng::seed_from_u64(42), 32);
        assert_eq!(a, b);
    }

    #[test]
    fn test_template_environment() {
        let config = ClusterConfig::builder()
            .cluster_name("orders")
            .cluster_size(4)
            .regions(["eu-west-1", "us-east-1"])
            .environment("NUM_TOKENS=16")
            .build()
            .unwrap();
        let image = DockerImage::from_reference("registry.example.org/planb:3.0.1");

        let boot = BootConfig::for_cluster(&config, &image, &seeds(), &keys(), "pw".into());

        assert_eq!(boot.environment["SEEDS"], "10.0.0.11,10.0.1.11,10.1.0.11");
        assert_eq!(boot.environment["REGIONS"], "eu-west-1 us-east-1");
        assert_eq!(boot.environment["SUBNET_TYPE"], "internal");
        assert_eq!(boot.environment["CLUSTER_SIZE"], "4");
        assert_eq!(boot.environment["NUM_TOKENS"], "16");
        assert_eq!(boot.environment["KEYSTORE"], "a3M=");
        assert_eq!(boot.application_version, "3.0.1");
        assert_eq!(boot.volumes.ebs[DATA_DEVICE], None);
    }

    #[test]
    fn test_volume_merge_leaves_template_untouched() {
        let config = ClusterConfig::builder()
            .cluster_name("orders")
            .cluster_size(1)
            .region("eu-west-1")
            .build()
            .unwrap();
        let image = DockerImage::from_reference("planb:1");
        let template = BootConfig::for_cluster(&config, &image, &seeds(), &keys(), "pw".into());

        let node = template.with_data_volume("orders-10.0.0.11");
        assert_eq!(
            node.volumes.ebs[DATA_DEVICE].as_deref(),
            Some("orders-10.0.0.11")
        );
        assert_eq!(template.volumes.ebs[DATA_DEVICE], None);

        let rendered = node.render().unwrap();
        assert!(rendered.starts_with("#taupage-ami-config\n"));
        assert!(rendered.contains("orders-10.0.0.11"));
    }
}
