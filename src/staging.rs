//! Allocates and tears down the scratch subtree shared with builder and
//! launcher pods via the transfer volume. Named `<hostname><random>` under
//! the configured volume path, mirroring the original's
//! `ioutil.TempDir(cfg.TransferVolume.Path, hostnamePrefix)`.

use crate::error::StagingError;
use crate::fs::FileSystem;
use crate::metadata::ChaincodeRunConfig;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct StagingHandle {
    root: PathBuf,
}

impl StagingHandle {
    /// The leaf directory name, used as the sub-path for pod volume mounts.
    pub fn transfer_prefix(&self) -> &str {
        self.root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn bld_dir(&self) -> PathBuf {
        self.root.join("bld")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub struct TransferStaging {
    fs: Arc<dyn FileSystem>,
}

impl TransferStaging {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn create(&self, volume_root: &Path, hostname: &str) -> Result<StagingHandle, StagingError> {
        let leaf = format!("{hostname}-{}", uuid::Uuid::new_v4().simple());
        let root = volume_root.join(leaf);
        self.fs
            .create_dir_all(&root)
            .map_err(|source| StagingError::Create {
                path: root.display().to_string(),
                source: to_io_error(source),
            })?;
        Ok(StagingHandle { root })
    }

    pub fn populate_build(&self, handle: &StagingHandle, source_dir: &Path) -> Result<(), StagingError> {
        self.fs
            .copy_tree(source_dir, &handle.src_dir())
            .map_err(|source| StagingError::Copy {
                from: source_dir.display().to_string(),
                to: handle.src_dir().display().to_string(),
                source: to_io_error(source),
            })?;
        self.fs
            .create_dir_all(&handle.bld_dir())
            .map_err(|source| StagingError::Create {
                path: handle.bld_dir().display().to_string(),
                source: to_io_error(source),
            })
    }

    pub fn populate_run(
        &self,
        handle: &StagingHandle,
        output_dir: &Path,
        run_cfg: &ChaincodeRunConfig,
    ) -> Result<(), StagingError> {
        self.fs
            .copy_tree(output_dir, &handle.output_dir())
            .map_err(|source| StagingError::Copy {
                from: output_dir.display().to_string(),
                to: handle.output_dir().display().to_string(),
                source: to_io_error(source),
            })?;

        let artifacts = handle.artifacts_dir();
        self.write_artifact(&artifacts, "client_pem.crt", run_cfg.client_cert.as_bytes())?;
        self.write_artifact(&artifacts, "client_pem.key", run_cfg.client_key.as_bytes())?;
        self.write_artifact(&artifacts, "root.crt", run_cfg.root_cert.as_bytes())?;
        self.write_artifact(
            &artifacts,
            "client.crt",
            STANDARD.encode(&run_cfg.client_cert).as_bytes(),
        )?;
        self.write_artifact(
            &artifacts,
            "client.key",
            STANDARD.encode(&run_cfg.client_key).as_bytes(),
        )?;
        Ok(())
    }

    fn write_artifact(&self, dir: &Path, name: &str, contents: &[u8]) -> Result<(), StagingError> {
        let path = dir.join(name);
        self.fs
            .write(&path, contents)
            .map_err(|source| StagingError::Write {
                path: path.display().to_string(),
                source: to_io_error(source),
            })
    }

    pub fn harvest_build(
        &self,
        handle: &StagingHandle,
        source_dir: &Path,
        dest_dir: &Path,
    ) -> Result<(), StagingError> {
        self.fs
            .copy_tree(&handle.bld_dir(), dest_dir)
            .map_err(|source| StagingError::Copy {
                from: handle.bld_dir().display().to_string(),
                to: dest_dir.display().to_string(),
                source: to_io_error(source),
            })?;

        let meta_inf = source_dir.join("META-INF");
        if self.fs.exists(&meta_inf) {
            self.fs
                .copy_tree(&meta_inf, &dest_dir.join("META-INF"))
                .map_err(|source| StagingError::Copy {
                    from: meta_inf.display().to_string(),
                    to: dest_dir.join("META-INF").display().to_string(),
                    source: to_io_error(source),
                })?;
        }
        Ok(())
    }

    /// Best-effort: errors are returned for the caller to log at `warn`,
    /// never to mask the phase's primary verdict.
    pub fn dispose(&self, handle: &StagingHandle) -> Result<(), StagingError> {
        self.fs
            .remove_dir_all(handle.root())
            .map_err(|source| StagingError::Copy {
                from: handle.root().display().to_string(),
                to: "(removed)".to_string(),
                source: to_io_error(source),
            })
    }
}

fn to_io_error(err: anyhow::Error) -> std::io::Error {
    std::io::Error::other(err.to_string())
}
