//! Glues the four externalbuilder phases together: reads peer-supplied
//! descriptors via [`crate::metadata`], resolves language-specific
//! parameters via [`crate::platform`], stages a transfer subtree, submits
//! a pod, awaits its verdict, and copies results back.

use crate::cancel::Cancellation;
use crate::cluster::{ClusterClient, PodWatcher, Verdict};
use crate::config::K8sccConfig;
use crate::error::{InputError, WorkloadFailure};
use crate::fs::FileSystem;
use crate::guard::{PodGuard, StagingGuard};
use crate::metadata::{BuildInformation, ChaincodeMetadata, ChaincodeRunConfig};
use crate::platform;
use crate::podspec::{OwnerPod, WorkloadSpecBuilder};
use crate::staging::TransferStaging;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

pub struct Orchestrator {
    config: K8sccConfig,
    hostname: String,
    fs: Arc<dyn FileSystem>,
    staging: Arc<TransferStaging>,
    cluster: Arc<dyn ClusterClient>,
}

impl Orchestrator {
    pub fn new(
        config: K8sccConfig,
        hostname: String,
        fs: Arc<dyn FileSystem>,
        cluster: Arc<dyn ClusterClient>,
    ) -> Self {
        let staging = Arc::new(TransferStaging::new(fs.clone()));
        Self {
            config,
            hostname,
            fs,
            staging,
            cluster,
        }
    }

    async fn owner_pod(&self) -> anyhow::Result<OwnerPod> {
        let pod = self
            .cluster
            .get_pod(&self.hostname)
            .await
            .context("looking up the owning peer pod")?;
        let uid = pod
            .metadata
            .uid
            .clone()
            .ok_or_else(|| anyhow::anyhow!("owner pod {} has no uid", self.hostname))?;
        Ok(OwnerPod {
            name: self.hostname.clone(),
            uid,
        })
    }

    pub fn detect(&self, md_dir: &Path) -> anyhow::Result<()> {
        let metadata = ChaincodeMetadata::read(md_dir).context("reading metadata.json")?;
        if !platform::is_supported(&metadata.language_tag) {
            return Err(InputError::UnsupportedPlatform(metadata.language_tag).into());
        }
        if self
            .config
            .image_for(&metadata.language_tag.to_lowercase())
            .is_none()
        {
            return Err(InputError::UnsupportedPlatform(metadata.language_tag).into());
        }
        Ok(())
    }

    pub async fn build(
        &self,
        src_dir: &Path,
        md_dir: &Path,
        out_dir: &Path,
        cancellation: Cancellation,
    ) -> anyhow::Result<()> {
        let metadata = ChaincodeMetadata::read(md_dir).context("reading metadata.json")?;
        let image = self
            .config
            .image_for(&metadata.language_tag.to_lowercase())
            .ok_or_else(|| InputError::UnsupportedPlatform(metadata.language_tag.clone()))?
            .to_string();

        let handle = self
            .staging
            .create(Path::new(&self.config.transfer_volume.path), &self.hostname)
            .context("creating staging directory")?;
        let staging_guard = StagingGuard::new(self.staging.clone(), handle);
        self.staging
            .populate_build(staging_guard.handle(), src_dir)
            .context("populating staging src/bld")?;

        let owner = self.owner_pod().await?;
        let pod = WorkloadSpecBuilder::builder_pod(
            &self.hostname,
            &self.config.namespace,
            &owner,
            &self.config.transfer_volume.claim,
            staging_guard.handle().transfer_prefix(),
            &image,
            &metadata,
            &self.config.builder.resources,
        )
        .context("building the builder pod spec")?;
        let pod_name = pod.metadata.name.clone().unwrap_or_default();

        self.cluster
            .create_pod(pod)
            .await
            .context("creating the builder pod")?;
        let pod_guard = PodGuard::new(self.cluster.clone(), pod_name.clone());

        let verdict = PodWatcher::await_verdict(self.cluster.as_ref(), &pod_name, cancellation)
            .await
            .context("watching the builder pod")?;
        pod_guard.dispose().await;

        match verdict {
            Verdict::Success => {
                self.staging
                    .harvest_build(staging_guard.handle(), src_dir, out_dir)
                    .context("harvesting build output")?;
                let info = BuildInformation {
                    image,
                    platform: metadata.language_tag.clone(),
                };
                let data = serde_json::to_vec_pretty(&info).context("serializing build info")?;
                self.fs
                    .write(&out_dir.join("k8scc_buildinfo.json"), &data)
                    .context("writing k8scc_buildinfo.json")?;
                staging_guard.dispose();
                Ok(())
            }
            Verdict::Failure(reason) => {
                staging_guard.dispose();
                Err(WorkloadFailure::Build {
                    pod: pod_name,
                    label: metadata.label,
                    reason,
                }
                .into())
            }
        }
    }

    pub fn release(&self, bld_dir: &Path, out_dir: &Path) -> anyhow::Result<()> {
        let meta_inf = bld_dir.join("META-INF");
        if self.fs.exists(&meta_inf) {
            self.fs
                .copy_tree(&meta_inf, &out_dir.join("META-INF"))
                .context("copying META-INF")?;
        }
        let statedb = bld_dir.join("statedb");
        if self.fs.exists(&statedb) {
            self.fs
                .copy_tree(&statedb, &out_dir.join("statedb"))
                .context("copying statedb")?;
        }
        Ok(())
    }

    pub async fn run(
        &self,
        out_dir: &Path,
        md_dir: &Path,
        cancellation: Cancellation,
    ) -> anyhow::Result<()> {
        let run_cfg = ChaincodeRunConfig::read(md_dir).context("reading chaincode.json")?;
        let info = BuildInformation::read(out_dir).context("reading k8scc_buildinfo.json")?;
        let run_cfg = run_cfg
            .with_build_information(&info)
            .context("validating build information")?;

        let handle = self
            .staging
            .create(Path::new(&self.config.transfer_volume.path), &self.hostname)
            .context("creating staging directory")?;
        let staging_guard = StagingGuard::new(self.staging.clone(), handle);
        self.staging
            .populate_run(staging_guard.handle(), out_dir, &run_cfg)
            .context("populating staging output/artifacts")?;

        let owner = self.owner_pod().await?;
        let pod = WorkloadSpecBuilder::launcher_pod(
            &self.hostname,
            &self.config.namespace,
            &owner,
            &self.config.transfer_volume.claim,
            staging_guard.handle().transfer_prefix(),
            &run_cfg,
            &self.config.launcher.resources,
        )
        .context("building the launcher pod spec")?;
        let pod_name = pod.metadata.name.clone().unwrap_or_default();

        self.cluster
            .create_pod(pod)
            .await
            .context("creating the launcher pod")?;
        let pod_guard = PodGuard::new(self.cluster.clone(), pod_name.clone());

        let verdict = PodWatcher::await_verdict(self.cluster.as_ref(), &pod_name, cancellation)
            .await
            .context("watching the launcher pod")?;
        pod_guard.dispose().await;
        staging_guard.dispose();

        match verdict {
            Verdict::Success => Ok(()),
            Verdict::Failure(reason) => Err(WorkloadFailure::Run {
                pod: pod_name,
                ccid: run_cfg.ccid,
                reason,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterClient;
    use crate::config::{PhaseConfig, TransferVolume};
    use crate::error::ClusterError;
    use crate::fs::MockFileSystem;
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        pub Client {}

        #[async_trait]
        impl ClusterClient for Client {
            async fn get_pod(&self, name: &str) -> Result<Pod, ClusterError>;
            async fn create_pod(&self, pod: Pod) -> Result<Pod, ClusterError>;
            async fn delete_pod(&self, name: &str) -> Result<(), ClusterError>;
            async fn watch_until_terminal(&self, name: &str, cancel: Cancellation) -> Result<Verdict, ClusterError>;
            async fn stream_logs(&self, name: &str, cancel: Cancellation) -> Result<(), ClusterError>;
        }
    }

    fn owner_pod_response() -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("peer0".to_string()),
                uid: Some("11111111-2222-3333-4444-555555555555".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn config() -> K8sccConfig {
        K8sccConfig {
            images: HashMap::from([(
                "golang".to_string(),
                "example.com/golang-cc".to_string(),
            )]),
            transfer_volume: TransferVolume {
                path: "/vol".to_string(),
                claim: "k8scc-transfer".to_string(),
            },
            builder: PhaseConfig::default(),
            launcher: PhaseConfig::default(),
            namespace: "ns1".to_string(),
        }
    }

    #[test]
    fn detect_accepts_a_configured_supported_platform() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(
            "/md/metadata.json",
            br#"{"type":"golang","path":"p","label":"l"}"#,
        );
        let cluster: Arc<dyn ClusterClient> = Arc::new(MockClient::new());
        let orchestrator = Orchestrator::new(config(), "peer0".to_string(), fs, cluster);
        assert!(orchestrator.detect(Path::new("/md")).is_ok());
    }

    #[test]
    fn detect_rejects_an_unconfigured_platform() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(
            "/md/metadata.json",
            br#"{"type":"rust","path":"p","label":"l"}"#,
        );
        let cluster: Arc<dyn ClusterClient> = Arc::new(MockClient::new());
        let orchestrator = Orchestrator::new(config(), "peer0".to_string(), fs, cluster);
        assert!(orchestrator.detect(Path::new("/md")).is_err());
    }

    #[tokio::test]
    async fn build_happy_path_writes_buildinfo_and_disposes_staging() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(
            "/md/metadata.json",
            br#"{"type":"golang","path":"p","label":"l"}"#,
        );
        fs.add_file("/src/main.go", b"package main");

        let mut mock = MockClient::new();
        mock.expect_get_pod()
            .returning(|_| Box::pin(async { Ok(owner_pod_response()) }));
        mock.expect_create_pod()
            .returning(|pod| Box::pin(async { Ok(pod) }));
        mock.expect_watch_until_terminal()
            .returning(|_, _| Box::pin(async { Ok(Verdict::Success) }));
        mock.expect_stream_logs()
            .returning(|_, _| Box::pin(async { Ok(()) }));
        mock.expect_delete_pod()
            .returning(|_| Box::pin(async { Ok(()) }));

        let cluster: Arc<dyn ClusterClient> = Arc::new(mock);
        let orchestrator = Orchestrator::new(config(), "peer0".to_string(), fs.clone(), cluster);

        let (_handle, cancellation) = Cancellation::new();
        orchestrator
            .build(
                Path::new("/src"),
                Path::new("/md"),
                Path::new("/out"),
                cancellation,
            )
            .await
            .unwrap();

        let info: BuildInformation =
            serde_json::from_slice(&fs.contents("/out/k8scc_buildinfo.json").unwrap()).unwrap();
        assert_eq!(info.image, "example.com/golang-cc");
        assert_eq!(info.platform, "golang");
    }

    #[tokio::test]
    async fn build_failure_surfaces_workload_failure() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(
            "/md/metadata.json",
            br#"{"type":"golang","path":"p","label":"l"}"#,
        );

        let mut mock = MockClient::new();
        mock.expect_get_pod()
            .returning(|_| Box::pin(async { Ok(owner_pod_response()) }));
        mock.expect_create_pod()
            .returning(|pod| Box::pin(async { Ok(pod) }));
        mock.expect_watch_until_terminal()
            .returning(|_, _| Box::pin(async { Ok(Verdict::Failure("pod phase Failed".to_string())) }));
        mock.expect_stream_logs()
            .returning(|_, _| Box::pin(async { Ok(()) }));
        mock.expect_delete_pod()
            .returning(|_| Box::pin(async { Ok(()) }));

        let cluster: Arc<dyn ClusterClient> = Arc::new(mock);
        let orchestrator = Orchestrator::new(config(), "peer0".to_string(), fs, cluster);

        let (_handle, cancellation) = Cancellation::new();
        let err = orchestrator
            .build(
                Path::new("/src"),
                Path::new("/md"),
                Path::new("/out"),
                cancellation,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pod phase Failed") || format!("{err:?}").contains("Failed"));
    }

    #[test]
    fn release_combines_meta_inf_and_statedb() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/bld/META-INF/statedb/couchdb/index.json", b"{}");
        fs.add_file("/bld/statedb/couchdb/state.json", b"{}");
        let cluster: Arc<dyn ClusterClient> = Arc::new(MockClient::new());
        let orchestrator = Orchestrator::new(config(), "peer0".to_string(), fs.clone(), cluster);

        orchestrator
            .release(Path::new("/bld"), Path::new("/out"))
            .unwrap();

        assert!(fs
            .contents("/out/META-INF/statedb/couchdb/index.json")
            .is_some());
        assert!(fs.contents("/out/statedb/couchdb/state.json").is_some());
    }

    #[tokio::test]
    async fn run_rejects_missing_buildinfo() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(
            "/md/chaincode.json",
            br#"{"chaincode_id":"my_cc:0123456789abcdef","peer_address":"peer0:7052","mspid":"Org1MSP"}"#,
        );
        let cluster: Arc<dyn ClusterClient> = Arc::new(MockClient::new());
        let orchestrator = Orchestrator::new(config(), "peer0".to_string(), fs, cluster);

        let (_handle, cancellation) = Cancellation::new();
        let result = orchestrator
            .run(Path::new("/out"), Path::new("/md"), cancellation)
            .await;
        assert!(result.is_err());
    }
}
