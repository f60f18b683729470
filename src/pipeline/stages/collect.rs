//! Collect stage: copy finished images out of the disposable working tree
//!
//! Artifacts are identified by file name only, so a second build that
//! produces the same name overwrites the earlier copy.

use crate::error::{BuildError, IoResultExt};
use crate::pipeline::context::StageContext;
use crate::pipeline::stage_trait::{Stage, Target};
use crate::pipeline::state::PipelineState;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const NAME: &str = "collect_artifacts";

pub struct CollectArtifactsStage {
    ctx: StageContext,
    target: Target,
}

impl CollectArtifactsStage {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            ctx,
            target: Target::default(),
        }
    }
}

#[async_trait]
impl Stage for CollectArtifactsStage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Collecting artifacts\n"
    }

    fn state(&self) -> PipelineState {
        PipelineState::CollectingArtifacts
    }

    fn set_target(&mut self, target: &Path) {
        self.target.set(target);
    }

    async fn run(&self) -> Result<(), BuildError> {
        let dir = self.target.get(NAME)?.to_path_buf();
        let output = &self.ctx.config.output;
        let out_dir = output.artifact_dir.clone();
        let extension = output.artifact_extension.trim_start_matches('.').to_string();

        tokio::fs::create_dir_all(&out_dir).await.with_path(&out_dir)?;

        let search_root = dir.clone();
        let artifacts = tokio::task::spawn_blocking(move || find_artifacts(&search_root, &extension))
            .await
            .map_err(|e| BuildError::io(&dir, io::Error::other(e)))??;

        if artifacts.is_empty() {
            warn!(dir = %dir.display(), "Builder produced no artifacts");
            self.ctx.publish("No artifacts found\n");
            return Ok(());
        }

        for source in artifacts {
            let Some(file_name) = source.file_name().map(|n| n.to_os_string()) else {
                continue;
            };
            let destination = out_dir.join(&file_name);
            self.ctx.publish(format!(
                "Copying {} -> {}\n",
                source.display(),
                destination.display()
            ));

            let dest = destination.clone();
            let digest = tokio::task::spawn_blocking(move || copy_with_checksum(&source, &dest))
                .await
                .map_err(|e| BuildError::io(&destination, io::Error::other(e)))??;

            let name = file_name.to_string_lossy();
            let checksum_path = sidecar_path(&destination);
            tokio::fs::write(&checksum_path, format!("{}  {}\n", digest, name))
                .await
                .with_path(&checksum_path)?;

            info!(artifact = %destination.display(), sha256 = %digest, "Collected artifact");
            self.ctx.publish(format!("sha256 {}  {}\n", digest, name));
        }
        Ok(())
    }
}

/// Regular files under `root` with the given extension, in walk order
fn find_artifacts(root: &Path, extension: &str) -> Result<Vec<PathBuf>, BuildError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BuildError::io(path, io::Error::from(e))
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some(extension)
        {
            debug!(path = %entry.path().display(), "Found artifact");
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Copy `source` to `destination`, syncing it to disk, and return its SHA-256
fn copy_with_checksum(source: &Path, destination: &Path) -> Result<String, BuildError> {
    let mut reader = BufReader::new(File::open(source).with_path(source)?);
    let mut writer = File::create(destination).with_path(destination)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];

    loop {
        let n = reader.read(&mut buf).with_path(source)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n]).with_path(destination)?;
    }
    writer.sync_all().with_path(destination)?;

    Ok(hex::encode(hasher.finalize()))
}

fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}
