//! Probes executed inside service containers.
//!
//! Readiness probes wrap the Confluent `cub` utility and print `PASS` or
//! `FAIL`, the protocol understood by [`cluster_harness::ReadinessPoller`].

use cluster_harness::ContainerCommand;

/// Waits until `brokers` brokers are registered in ZooKeeper.
#[must_use]
pub fn kafka_ready(brokers: u32) -> ContainerCommand {
    ContainerCommand::shell(format!(
        "cub kafka-ready $KAFKA_ZOOKEEPER_CONNECT {brokers} 10 10 10 && echo PASS || echo FAIL"
    ))
}

/// Waits until ZooKeeper answers on its client port.
#[must_use]
pub fn zookeeper_ready() -> ContainerCommand {
    ContainerCommand::shell("cub zk-ready localhost:2181 10 10 2 && echo PASS || echo FAIL")
}

/// Lists cluster metadata as JSON through the broker at `host:port`.
#[must_use]
pub fn kafkacat_metadata(host: &str, port: u16) -> ContainerCommand {
    let broker = format!("{host}:{port}");
    ContainerCommand::new("kafkacat").args(["-L", "-b", broker.as_str(), "-J"])
}

/// Prints the broker's rendered configuration.
#[must_use]
pub fn server_properties() -> ContainerCommand {
    ContainerCommand::new("cat").arg("/etc/kafka/server.properties")
}

/// Compares two configuration blocks ignoring every whitespace character.
#[must_use]
pub fn properties_match(actual: &str, expected: &str) -> bool {
    strip_whitespace(actual) == strip_whitespace(expected)
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
