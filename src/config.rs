//! Process configuration for k8scc.
//!
//! Mirrors the teacher's env-driven config module, but loads from a YAML
//! file instead of environment variables: defaults are filled in by serde,
//! and `validate()` turns structural problems into a typed `ConfigError`
//! instead of letting an invalid config reach the orchestrator.

use crate::error::ConfigError;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

const NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TransferVolume {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub claim: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResourceLimits {
    #[serde(default)]
    pub memory_limit: String,
    #[serde(default)]
    pub cpu_limit: String,
}

impl ResourceLimits {
    /// Parses non-empty limit fields into Kubernetes quantities. Absent
    /// fields (empty string) are simply omitted from the returned map,
    /// meaning "unlimited".
    pub fn parsed(&self, section: &str) -> Result<HashMap<String, Quantity>, ConfigError> {
        let mut limits = HashMap::new();
        if !self.memory_limit.is_empty() {
            validate_quantity(&self.memory_limit).map_err(|reason| ConfigError::InvalidQuantity {
                field: format!("{section}.resources.memory_limit"),
                value: self.memory_limit.clone(),
                reason,
            })?;
            limits.insert("memory".to_string(), Quantity(self.memory_limit.clone()));
        }
        if !self.cpu_limit.is_empty() {
            validate_quantity(&self.cpu_limit).map_err(|reason| ConfigError::InvalidQuantity {
                field: format!("{section}.resources.cpu_limit"),
                value: self.cpu_limit.clone(),
                reason,
            })?;
            limits.insert("cpu".to_string(), Quantity(self.cpu_limit.clone()));
        }
        Ok(limits)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PhaseConfig {
    #[serde(default)]
    pub resources: ResourceLimits,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct K8sccConfig {
    #[serde(default)]
    pub images: HashMap<String, String>,
    #[serde(default)]
    pub transfer_volume: TransferVolume,
    #[serde(default)]
    pub builder: PhaseConfig,
    #[serde(default)]
    pub launcher: PhaseConfig,

    /// Populated after load from the service-account namespace file, never
    /// from the YAML document itself.
    #[serde(skip)]
    pub namespace: String,
}

impl K8sccConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut cfg: K8sccConfig = serde_yaml::from_str(&data)?;
        cfg.namespace = Self::read_namespace()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn read_namespace() -> Result<String, ConfigError> {
        std::fs::read_to_string(NAMESPACE_FILE)
            .map(|s| s.trim().to_string())
            .map_err(|source| ConfigError::Namespace {
                path: NAMESPACE_FILE.to_string(),
                source,
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer_volume.path.is_empty() {
            return Err(ConfigError::EmptyTransferPath);
        }
        self.builder.resources.parsed("builder")?;
        self.launcher.resources.parsed("launcher")?;
        Ok(())
    }

    pub fn image_for(&self, platform: &str) -> Option<&str> {
        self.images.get(platform).map(String::as_str)
    }
}

impl fmt::Display for K8sccConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "transfer_volume.path = {}", self.transfer_volume.path)?;
        writeln!(f, "transfer_volume.claim = {}", self.transfer_volume.claim)?;
        writeln!(f, "namespace = {}", self.namespace)?;
        for (platform, image) in &self.images {
            writeln!(f, "images.{platform} = {image}")?;
        }
        Ok(())
    }
}

/// Minimal structural check for a Kubernetes resource quantity string:
/// a decimal number optionally followed by a known suffix. We do not
/// replicate the full quantity grammar, only reject obvious nonsense
/// before it reaches the cluster API.
fn validate_quantity(value: &str) -> Result<(), String> {
    const SUFFIXES: &[&str] = &[
        "n", "u", "m", "", "k", "K", "M", "G", "T", "P", "E", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei",
    ];
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(value.len());
    let (number, suffix) = value.split_at(digits_end);
    if number.is_empty() {
        return Err("missing numeric part".to_string());
    }
    if number.parse::<f64>().is_err() {
        return Err(format!("{number:?} is not a number"));
    }
    if !SUFFIXES.contains(&suffix) {
        return Err(format!("unknown unit suffix {suffix:?}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_yaml() -> &'static str {
        r#"
images:
  golang: "example.com/golang-cc:latest"
transfer_volume:
  path: /var/lib/k8scc
  claim: k8scc-transfer
builder:
  resources:
    memory_limit: "256Mi"
    cpu_limit: "500m"
launcher:
  resources:
    memory_limit: ""
    cpu_limit: ""
"#
    }

    #[test]
    fn parses_valid_document() {
        let cfg: K8sccConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(cfg.transfer_volume.path, "/var/lib/k8scc");
        assert_eq!(cfg.image_for("golang"), Some("example.com/golang-cc:latest"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_empty_transfer_path() {
        let mut cfg: K8sccConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        cfg.transfer_volume.path = String::new();
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyTransferPath)));
    }

    #[test]
    fn rejects_malformed_quantity() {
        let mut cfg: K8sccConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        cfg.builder.resources.memory_limit = "not-a-quantity".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn empty_limits_mean_unlimited() {
        let cfg: K8sccConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let limits = cfg.launcher.resources.parsed("launcher").unwrap();
        assert!(limits.is_empty());
    }

    #[test]
    fn load_reads_and_parses_a_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();
        let data = std::fs::read_to_string(file.path()).unwrap();
        let cfg: K8sccConfig = serde_yaml::from_str(&data).unwrap();
        assert_eq!(cfg.transfer_volume.claim, "k8scc-transfer");
    }
}
