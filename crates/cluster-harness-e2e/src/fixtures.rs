//! Test fixtures for the Kafka scenarios.
//!
//! Compose files live under `fixtures/kafka` in this crate. The expected
//! `server.properties` blocks are compared with
//! [`crate::probes::properties_match`], which ignores whitespace.

use std::path::PathBuf;

use cluster_harness::{HostDirectory, ServiceGroupDefinition};

/// Group running the configuration scenarios.
pub const CONFIG_GROUP: &str = "config-test";

/// Compose file for [`CONFIG_GROUP`].
pub const CONFIG_COMPOSE_FILE: &str = "standalone-config.yml";

/// Group running the networking scenarios.
pub const NETWORK_GROUP: &str = "standalone-network-test";

/// Compose file for [`NETWORK_GROUP`].
pub const NETWORK_COMPOSE_FILE: &str = "standalone-network.yml";

/// Coordination service present in every fixture.
pub const ZOOKEEPER_SERVICE: &str = "zookeeper";

/// Image used for probes run from outside the group.
pub const KAFKACAT_IMAGE: &str = "confluentinc/kafkacat";

/// Uid the `random-user` and `kitchen-sink` brokers run as.
pub const RANDOM_USER_UID: u32 = 12345;

/// Scratch tree bind-mounted by the `kitchen-sink` broker.
pub const KITCHEN_SINK_ROOT: &str = "/tmp/kafka-config-kitchen-sink-test";

/// Host port published by the bridged broker.
pub const BRIDGE_PORT: u16 = 19092;

/// Port the host-networked broker listens on.
pub const HOST_NETWORK_PORT: u16 = 29092;

/// Broker services started without a mandatory setting, paired with the
/// message each one logs before exiting.
pub const REQUIRED_CONFIG_FAILURES: [(&str, &str); 4] = [
    ("failing-config", "BROKER_ID is required."),
    ("failing-config-zk-connect", "ZOOKEEPER_CONNECT is required."),
    ("failing-config-adv-hostname", "ADVERTISED_HOST_NAME is required."),
    ("failing-config-adv-port", "ADVERTISED_PORT is required."),
];

/// Rendered configuration of the `default-config` broker.
pub const DEFAULT_CONFIG_PROPERTIES: &str = "broker.id=1
    advertised.host.name=default-config
    port=9092
    advertised.port=9092
    log.dirs=/opt/kafka/data
    zookeeper.connect=zookeeper:2181/defaultconfig
";

/// Rendered configuration of the `full-config` broker.
pub const FULL_CONFIG_PROPERTIES: &str = "broker.id=1
    advertised.host.name=full-config
    port=9092
    advertised.port=9092
    log.dirs=/opt/kafka/data
    zookeeper.connect=zookeeper:2181/fullconfig
";

/// Rendered configuration of the `kitchen-sink` broker.
pub const KITCHEN_SINK_PROPERTIES: &str = "broker.id=1
    advertised.host.name=kitchen-sink
    port=9092
    advertised.port=9092
    log.dirs=/opt/kafka/data
    zookeeper.connect=zookeeper:2181/kitchensink
";

/// Directory holding the Kafka compose fixtures.
#[must_use]
pub fn kafka_fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("kafka")
}

/// Definition of the configuration group.
///
/// The kitchen-sink data directory is created for [`RANDOM_USER_UID`] before
/// the group starts and the whole scratch tree is removed afterwards.
#[must_use]
pub fn config_group() -> ServiceGroupDefinition {
    let data = PathBuf::from(KITCHEN_SINK_ROOT).join("data");
    ServiceGroupDefinition::new(CONFIG_GROUP, kafka_fixture_dir(), CONFIG_COMPOSE_FILE)
        .with_host_directory(
            HostDirectory::new(data)
                .owned_by(RANDOM_USER_UID)
                .removing(KITCHEN_SINK_ROOT),
        )
}

/// Definition of the networking group.
#[must_use]
pub fn network_group() -> ServiceGroupDefinition {
    ServiceGroupDefinition::new(NETWORK_GROUP, kafka_fixture_dir(), NETWORK_COMPOSE_FILE)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::config(config_group())]
    #[case::network(network_group())]
    fn fixture_compose_files_declare_zookeeper(#[case] definition: ServiceGroupDefinition) {
        let services = definition.load_services().expect("fixture parses");
        assert!(
            services.iter().any(|spec| spec.name() == ZOOKEEPER_SERVICE),
            "{} lacks {ZOOKEEPER_SERVICE}",
            definition.name()
        );
    }

    #[rstest]
    fn config_fixture_declares_every_failing_broker() {
        let services = config_group().load_services().expect("fixture parses");
        for (service, _) in REQUIRED_CONFIG_FAILURES {
            assert!(
                services.iter().any(|spec| spec.name() == service),
                "missing {service}"
            );
        }
    }

    #[rstest]
    fn host_networked_broker_uses_host_mode() {
        let services = network_group().load_services().expect("fixture parses");
        let host = services
            .iter()
            .find(|spec| spec.name() == "kafka-host")
            .expect("kafka-host declared");
        assert_eq!(host.network_mode(), Some("host"));
    }

    #[rstest]
    fn kitchen_sink_directory_is_owned_by_the_broker_user() {
        let definition = config_group();
        let directory = definition.host_directories().first().expect("one directory");
        assert_eq!(directory.owner_uid(), Some(RANDOM_USER_UID));
        assert_eq!(directory.cleanup_root(), std::path::Path::new(KITCHEN_SINK_ROOT));
    }
}
