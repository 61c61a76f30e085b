//! Peer-supplied descriptors: chaincode package metadata (build input) and
//! chaincode run configuration (run input), plus the build-information
//! artifact exchanged between the build and run phases.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::Path;

/// Mirrors Hyperledger Fabric's chaincode package metadata shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChaincodeMetadata {
    #[serde(rename = "type")]
    pub language_tag: String,
    pub path: String,
    pub label: String,

    #[serde(skip)]
    pub metadata_id: String,
}

impl ChaincodeMetadata {
    pub fn read(metadata_dir: &Path) -> Result<Self, InputError> {
        let path = metadata_dir.join("metadata.json");
        let raw = std::fs::read(&path).map_err(|source| InputError::Read {
            what: "metadata.json".to_string(),
            path: path.display().to_string(),
            source,
        })?;
        let mut metadata: ChaincodeMetadata =
            serde_json::from_slice(&raw).map_err(|source| InputError::Parse {
                what: "metadata.json".to_string(),
                source,
            })?;
        metadata.metadata_id = metadata_id(&raw);
        Ok(metadata)
    }

    pub fn language_upper(&self) -> String {
        self.language_tag.to_uppercase()
    }
}

/// First 8 hex characters of SHA-1 over the raw descriptor bytes. Used only
/// as a deduplication key for pod names, never as a security boundary.
pub fn metadata_id(raw: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(raw);
    let digest = hasher.finalize();
    hex::encode(digest)[0..8].to_string()
}

/// Mirrors the externalbuilder run-phase JSON contract (`chaincode.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct ChaincodeRunConfigRaw {
    #[serde(rename = "chaincode_id")]
    pub ccid: String,
    #[serde(rename = "peer_address")]
    pub peer_address: String,
    #[serde(rename = "client_cert", default)]
    pub client_cert: String,
    #[serde(rename = "client_key", default)]
    pub client_key: String,
    #[serde(rename = "root_cert", default)]
    pub root_cert: String,
    #[serde(rename = "mspid")]
    pub msp_id: String,
}

#[derive(Debug, Clone)]
pub struct ChaincodeRunConfig {
    pub ccid: String,
    pub peer_address: String,
    pub client_cert: String,
    pub client_key: String,
    pub root_cert: String,
    pub msp_id: String,
    pub short_name: String,
    pub image: String,
    pub platform: String,
}

impl ChaincodeRunConfig {
    pub fn read(metadata_dir: &Path) -> Result<Self, InputError> {
        let path = metadata_dir.join("chaincode.json");
        let raw = std::fs::read(&path).map_err(|source| InputError::Read {
            what: "chaincode.json".to_string(),
            path: path.display().to_string(),
            source,
        })?;
        let raw_cfg: ChaincodeRunConfigRaw =
            serde_json::from_slice(&raw).map_err(|source| InputError::Parse {
                what: "chaincode.json".to_string(),
                source,
            })?;
        let short_name = short_name(&raw_cfg.ccid)?;
        Ok(Self {
            ccid: raw_cfg.ccid,
            peer_address: raw_cfg.peer_address,
            client_cert: raw_cfg.client_cert,
            client_key: raw_cfg.client_key,
            root_cert: raw_cfg.root_cert,
            msp_id: raw_cfg.msp_id,
            short_name,
            image: String::new(),
            platform: String::new(),
        })
    }

    pub fn has_tls(&self) -> bool {
        !self.client_cert.is_empty()
    }

    pub fn with_build_information(mut self, info: &BuildInformation) -> Result<Self, InputError> {
        if info.image.is_empty() {
            return Err(InputError::MissingImage {
                path: "k8scc_buildinfo.json".to_string(),
            });
        }
        self.image = info.image.clone();
        self.platform = info.platform.clone();
        Ok(self)
    }
}

/// `name:hash` -> `slug(name)-hash[0:8]`, slug replacing `_` with `-`.
fn short_name(ccid: &str) -> Result<String, InputError> {
    let (name, hash) = ccid
        .split_once(':')
        .ok_or_else(|| InputError::MalformedCcid(ccid.to_string()))?;
    if name.is_empty() || hash.len() < 8 {
        return Err(InputError::ShortCcidHash(ccid.to_string()));
    }
    let slug = name.replace('_', "-");
    Ok(format!("{}-{}", slug, &hash[0..8]))
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BuildInformation {
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Platform")]
    pub platform: String,
}

impl BuildInformation {
    pub fn read(out_dir: &Path) -> Result<Self, InputError> {
        let path = out_dir.join("k8scc_buildinfo.json");
        let raw = std::fs::read(&path).map_err(|source| InputError::Read {
            what: "k8scc_buildinfo.json".to_string(),
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| InputError::Parse {
            what: "k8scc_buildinfo.json".to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_id_is_deterministic() {
        let bytes = br#"{"type":"golang","path":"p","label":"l"}"#;
        assert_eq!(metadata_id(bytes), metadata_id(bytes));
        assert_eq!(metadata_id(bytes).len(), 8);
    }

    #[test]
    fn metadata_id_differs_on_different_input() {
        assert_ne!(metadata_id(b"a"), metadata_id(b"b"));
    }

    #[test]
    fn short_name_replaces_underscores_and_truncates_hash() {
        assert_eq!(
            short_name("my_cc:0123456789abcdef").unwrap(),
            "my-cc-01234567"
        );
    }

    #[test]
    fn short_name_rejects_missing_colon() {
        assert!(matches!(
            short_name("no-colon-here"),
            Err(InputError::MalformedCcid(_))
        ));
    }

    #[test]
    fn short_name_rejects_short_hash() {
        assert!(matches!(
            short_name("name:1234567"),
            Err(InputError::ShortCcidHash(_))
        ));
    }

    #[test]
    fn with_build_information_rejects_empty_image() {
        let cfg = ChaincodeRunConfig {
            ccid: "n:0123456789abcdef".to_string(),
            peer_address: String::new(),
            client_cert: String::new(),
            client_key: String::new(),
            root_cert: String::new(),
            msp_id: String::new(),
            short_name: "n-01234567".to_string(),
            image: String::new(),
            platform: String::new(),
        };
        let info = BuildInformation::default();
        assert!(matches!(
            cfg.with_build_information(&info),
            Err(InputError::MissingImage { .. })
        ));
    }

    #[test]
    fn has_tls_tracks_client_cert_presence() {
        let mut cfg = ChaincodeRunConfig {
            ccid: "n:0123456789abcdef".to_string(),
            peer_address: String::new(),
            client_cert: String::new(),
            client_key: String::new(),
            root_cert: String::new(),
            msp_id: String::new(),
            short_name: "n-01234567".to_string(),
            image: "img".to_string(),
            platform: "golang".to_string(),
        };
        assert!(!cfg.has_tls());
        cfg.client_cert = "-----BEGIN CERTIFICATE-----".to_string();
        assert!(cfg.has_tls());
    }
}
