//! Building blocks of the `planb` binary: settings, the cloud gateway and
//! artifact registry clients, and the certificate issuer.

pub mod certs;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http_client;
pub mod registry;
pub mod rehearsal;
