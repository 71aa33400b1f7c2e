//! Declarative description of a service group.
//!
//! A [`ServiceGroupDefinition`] names the compose project, points at the
//! fixture directory and compose file, and lists the host directories the
//! group expects to exist while it runs. The compose file itself is parsed
//! only far enough to learn which services it declares.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::HarnessError;
use crate::host_dir::HostDirectory;

/// Immutable description of one service group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceGroupDefinition {
    name: String,
    fixture_dir: PathBuf,
    compose_file: String,
    host_directories: Vec<HostDirectory>,
}

impl ServiceGroupDefinition {
    /// Describes group `name` defined by `fixture_dir/compose_file`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        fixture_dir: impl Into<PathBuf>,
        compose_file: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            fixture_dir: fixture_dir.into(),
            compose_file: compose_file.into(),
            host_directories: Vec::new(),
        }
    }

    /// Adds a host directory that must exist while the group runs.
    #[must_use]
    pub fn with_host_directory(mut self, directory: HostDirectory) -> Self {
        self.host_directories.push(directory);
        self
    }

    /// Group name, used as the compose project name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the fixture files.
    #[must_use]
    pub fn fixture_dir(&self) -> &Path {
        &self.fixture_dir
    }

    /// Full path of the compose file.
    #[must_use]
    pub fn compose_path(&self) -> PathBuf {
        self.fixture_dir.join(&self.compose_file)
    }

    /// Host directories acquired before start and released after shutdown.
    #[must_use]
    pub fn host_directories(&self) -> &[HostDirectory] {
        &self.host_directories
    }

    /// Reads the compose file and returns the declared services by name.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Definition`] when the file cannot be read, is
    /// not valid YAML, or declares no services.
    pub fn load_services(&self) -> Result<Vec<ServiceSpec>, HarnessError> {
        let path = self.compose_path();
        let text = fs::read_to_string(&path).map_err(|err| HarnessError::Definition {
            path: path.clone(),
            message: err.to_string(),
        })?;
        parse_services(&path, &text)
    }
}

/// One service declared by a compose file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    name: String,
    image: Option<String>,
    network_mode: Option<String>,
}

impl ServiceSpec {
    /// Service name as used by `docker compose`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image reference, when the service declares one.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Declared `network_mode`, for example `host`.
    #[must_use]
    pub fn network_mode(&self) -> Option<&str> {
        self.network_mode.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct ComposeDocument {
    #[serde(default)]
    services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Default, Deserialize)]
struct ComposeService {
    image: Option<String>,
    network_mode: Option<String>,
}

fn parse_services(path: &Path, text: &str) -> Result<Vec<ServiceSpec>, HarnessError> {
    let document: ComposeDocument =
        serde_saphyr::from_str(text).map_err(|err| HarnessError::Definition {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

    if document.services.is_empty() {
        return Err(HarnessError::Definition {
            path: path.to_path_buf(),
            message: String::from("compose file declares no services"),
        });
    }

    Ok(document
        .services
        .into_iter()
        .map(|(name, service)| ServiceSpec {
            name,
            image: service.image,
            network_mode: service.network_mode,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    const COMPOSE: &str = r#"
version: "2"
services:
  zookeeper:
    image: confluentinc/cp-zookeeper
    environment:
      ZOOKEEPER_CLIENT_PORT: "2181"
  kafka-host:
    image: confluentinc/cp-kafka
    network_mode: host
"#;

    #[rstest]
    fn services_are_listed_in_name_order() {
        let services = parse_services(Path::new("compose.yml"), COMPOSE).expect("parse");
        let names: Vec<&str> = services.iter().map(ServiceSpec::name).collect();
        assert_eq!(names, ["kafka-host", "zookeeper"]);
        assert_eq!(services.first().and_then(ServiceSpec::network_mode), Some("host"));
        assert_eq!(
            services.get(1).and_then(ServiceSpec::image),
            Some("confluentinc/cp-zookeeper")
        );
    }

    #[rstest]
    #[case::empty("services: {}\n")]
    #[case::missing("version: \"2\"\n")]
    fn groups_without_services_are_rejected(#[case] text: &str) {
        let err = parse_services(Path::new("compose.yml"), text).expect_err("should fail");
        assert!(err.to_string().contains("no services"), "got {err}");
    }

    #[rstest]
    fn malformed_yaml_is_a_definition_error() {
        let err = parse_services(Path::new("broken.yml"), "services: [unterminated")
            .expect_err("should fail");
        assert!(matches!(err, HarnessError::Definition { .. }), "got {err}");
    }

    #[rstest]
    fn load_services_reads_from_fixture_dir() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("standalone.yml"), COMPOSE).expect("write compose");
        let definition = ServiceGroupDefinition::new("standalone", dir.path(), "standalone.yml");
        assert_eq!(definition.load_services().expect("load").len(), 2);
    }

    #[rstest]
    fn missing_compose_file_is_a_definition_error() {
        let definition = ServiceGroupDefinition::new("ghost", "/nonexistent", "ghost.yml");
        let err = definition.load_services().expect_err("should fail");
        assert!(err.to_string().contains("ghost.yml"), "got {err}");
    }
}
