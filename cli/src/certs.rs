use planb_orchestrator::error::ProviderError;
use planb_orchestrator::provider::{CertificateIssuer, ProviderResult};
use planb_orchestrator::types::KeyMaterial;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use time::{Duration, OffsetDateTime};
use tracing::info;

/// Nodes keep their certificate for the lifetime of the cluster
pub const DEFAULT_VALIDITY_DAYS: i64 = 3650;

/// Issues one self-signed certificate per cluster, shared by all nodes.
/// The keystore carries the private key and certificate, the truststore
/// only the certificate, both PEM encoded.
pub struct SelfSignedIssuer {
    validity: Duration,
}

impl SelfSignedIssuer {
    pub fn new(validity_days: i64) -> Self {
        Self {
            validity: Duration::days(validity_days),
        }
    }
}

impl Default for SelfSignedIssuer {
    fn default() -> Self {
        Self::new(DEFAULT_VALIDITY_DAYS)
    }
}

impl CertificateIssuer for SelfSignedIssuer {
    fn issue(&self, cluster_name: &str) -> ProviderResult<KeyMaterial> {
        let fail = |e: rcgen::Error| ProviderError::new("issue_certificate", "global", e.to_string());

        let key_pair = KeyPair::generate().map_err(fail)?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, cluster_name);
        dn.push(DnType::OrganizationName, "Plan B Cassandra");
        params.distinguished_name = dn;
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        // every node is both server and client of its peers
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        params.not_before = OffsetDateTime::now_utc();
        params.not_after = OffsetDateTime::now_utc() + self.validity;

        let cert = params.self_signed(&key_pair).map_err(fail)?;
        let cert_pem = cert.pem();
        info!("Generated self-signed certificate for {}", cluster_name);

        Ok(KeyMaterial {
            keystore: format!("{}{}", key_pair.serialize_pem(), cert_pem).into_bytes(),
            truststore: cert_pem.into_bytes(),
        })
    }
}
