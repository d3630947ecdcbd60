pub mod access;
pub mod alarms;
pub mod artifact;
pub mod dns;
pub mod identity;
pub mod images;

pub use access::setup_access_groups;
pub use alarms::setup_alarm_topics;
pub use artifact::{resolve_docker_image, DockerImage};
pub use dns::setup_dns_records;
pub use identity::ensure_instance_profile;
pub use images::find_machine_images;
