//! Pure construction of the `Pod` specs submitted for the builder and
//! launcher phases. No I/O of its own: the orchestrator resolves the
//! owning peer pod's name/UID via `ClusterClient` and passes it in.

use crate::config::ResourceLimits;
use crate::error::ConfigError;
use crate::metadata::{ChaincodeMetadata, ChaincodeRunConfig};
use crate::platform;
use k8s_openapi::api::core::v1::{
    Container, EnvVar, Pod, PodSpec, ResourceRequirements, Volume, VolumeMount,
    PersistentVolumeClaimVolumeSource,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

pub const TYPE_LABEL: &str = "externalcc-type";
const TRANSFER_VOLUME_NAME: &str = "transfer";

pub struct OwnerPod {
    pub name: String,
    pub uid: String,
}

fn owner_references(owner: &OwnerPod) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: "v1".to_string(),
        kind: "Pod".to_string(),
        name: owner.name.clone(),
        uid: owner.uid.clone(),
        block_owner_deletion: Some(true),
        controller: Some(true),
    }]
}

fn transfer_volume(claim: &str) -> Volume {
    Volume {
        name: TRANSFER_VOLUME_NAME.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim.to_string(),
            read_only: Some(false),
        }),
        ..Default::default()
    }
}

fn mount(sub_path: &str, mount_path: &str, read_only: bool) -> VolumeMount {
    VolumeMount {
        name: TRANSFER_VOLUME_NAME.to_string(),
        sub_path: Some(sub_path.to_string()),
        mount_path: mount_path.to_string(),
        read_only: Some(read_only),
        ..Default::default()
    }
}

fn labels(kind: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(TYPE_LABEL.to_string(), kind.to_string())])
}

fn resource_requirements(limits: &ResourceLimits, section: &str) -> Result<ResourceRequirements, ConfigError> {
    let limits = limits.parsed(section)?;
    Ok(ResourceRequirements {
        limits: if limits.is_empty() { None } else { Some(limits) },
        ..Default::default()
    })
}

/// Builds the `detect`/`build` phase's builder pod.
pub struct WorkloadSpecBuilder;

impl WorkloadSpecBuilder {
    pub fn builder_pod(
        hostname: &str,
        namespace: &str,
        owner: &OwnerPod,
        claim: &str,
        transfer_prefix: &str,
        image: &str,
        metadata: &ChaincodeMetadata,
        resources: &ResourceLimits,
    ) -> Result<Pod, ConfigError> {
        let spec = platform::build_spec(&metadata.language_tag, &metadata.path);
        let env = spec
            .env
            .into_iter()
            .map(|(name, value)| EnvVar {
                name,
                value: Some(value),
                ..Default::default()
            })
            .collect();

        let container = Container {
            name: "builder".to_string(),
            image: Some(image.to_string()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: Some(spec.cmd),
            env: Some(env),
            volume_mounts: Some(vec![
                mount(
                    &format!("{transfer_prefix}/src"),
                    "/chaincode/input/",
                    true,
                ),
                mount(
                    &format!("{transfer_prefix}/bld"),
                    "/chaincode/output/",
                    false,
                ),
            ]),
            resources: Some(resource_requirements(resources, "builder")?),
            ..Default::default()
        };

        Ok(Pod {
            metadata: ObjectMeta {
                name: Some(format!("{hostname}-ccbuild-{}", metadata.metadata_id)),
                namespace: Some(namespace.to_string()),
                labels: Some(labels("builder")),
                owner_references: Some(owner_references(owner)),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![container],
                volumes: Some(vec![transfer_volume(claim)]),
                restart_policy: Some("Never".to_string()),
                enable_service_links: Some(false),
                ..Default::default()
            }),
            status: None,
        })
    }

    /// Builds the `run` phase's launcher pod.
    pub fn launcher_pod(
        hostname: &str,
        namespace: &str,
        owner: &OwnerPod,
        claim: &str,
        transfer_prefix: &str,
        run_cfg: &ChaincodeRunConfig,
        resources: &ResourceLimits,
    ) -> Result<Pod, ConfigError> {
        let mount_dir = platform::mount_dir(&run_cfg.platform);
        let args = platform::run_args(&run_cfg.platform, &run_cfg.peer_address);
        let has_tls = run_cfg.has_tls();

        let env = vec![
            env_var("CORE_CHAINCODE_ID_NAME", &run_cfg.ccid),
            env_var("CORE_PEER_LOCALMSPID", &run_cfg.msp_id),
            env_var("CORE_PEER_TLS_ENABLED", if has_tls { "true" } else { "false" }),
            env_var("CORE_TLS_CLIENT_CERT_PATH", "/chaincode/artifacts/client.crt"),
            env_var("CORE_TLS_CLIENT_KEY_PATH", "/chaincode/artifacts/client.key"),
            env_var("CORE_PEER_TLS_ROOTCERT_FILE", "/chaincode/artifacts/root.crt"),
            env_var(
                "CORE_TLS_CLIENT_CERT_FILE",
                "/chaincode/artifacts/client_pem.crt",
            ),
            env_var(
                "CORE_TLS_CLIENT_KEY_FILE",
                "/chaincode/artifacts/client_pem.key",
            ),
        ];

        let container = Container {
            name: "chaincode".to_string(),
            image: Some(run_cfg.image.clone()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: Some(args),
            working_dir: Some(mount_dir.to_string()),
            env: Some(env),
            volume_mounts: Some(vec![
                mount(
                    &format!("{transfer_prefix}/artifacts"),
                    "/chaincode/artifacts/",
                    true,
                ),
                mount(&format!("{transfer_prefix}/output"), mount_dir, true),
            ]),
            resources: Some(resource_requirements(resources, "launcher")?),
            ..Default::default()
        };

        Ok(Pod {
            metadata: ObjectMeta {
                name: Some(format!("{hostname}-cc-{}", run_cfg.short_name)),
                namespace: Some(namespace.to_string()),
                labels: Some(labels("launcher")),
                owner_references: Some(owner_references(owner)),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![container],
                volumes: Some(vec![transfer_volume(claim)]),
                restart_policy: Some("Always".to_string()),
                enable_service_links: Some(false),
                ..Default::default()
            }),
            status: None,
        })
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}
