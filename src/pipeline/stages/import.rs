//! Import stage: drop user assets into the live-build config tree
//!
//! Runs in a fixed order: custom files, package lists, splash images.
//! Directories are created as needed; the first failing file aborts the stage.

use crate::error::{BuildError, IoResultExt};
use crate::pipeline::context::StageContext;
use crate::pipeline::stage_trait::{Stage, Target};
use crate::pipeline::state::PipelineState;
use async_trait::async_trait;
use serde::Deserialize;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const NAME: &str = "import";

/// Concatenated package list consumed by live-build
pub const PACKAGE_LIST_PATH: &str = "config/package-lists/live.list.chroot";

/// Directory for bootloader splash images
pub const SPLASH_DIR: &str = "config/includes.binary/isolinux";

/// Sidecar metadata stored next to a custom file as `<file>.meta.json`
#[derive(Debug, Default, Deserialize)]
struct FileMetadata {
    #[serde(default)]
    install_path: String,
}

pub struct ImportStage {
    ctx: StageContext,
    target: Target,
}

impl ImportStage {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            ctx,
            target: Target::default(),
        }
    }

    async fn import_custom_files(&self, dir: &Path) -> Result<(), BuildError> {
        let files = &self.ctx.config.assets.custom_files;
        if files.is_empty() {
            return Ok(());
        }
        self.ctx.publish("Importing custom files\n");

        for source in files {
            let contents = fs::read(source).await.with_path(source)?;
            let (header, body) = split_header(&contents);
            let header = String::from_utf8_lossy(header);

            let declared = if header.trim().is_empty() {
                sidecar_install_path(source).await?
            } else {
                header.trim().to_string()
            };
            let destination = dir.join(resolve_destination(source, &declared)?);

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).await.with_path(parent)?;
            }
            let mut out = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&destination)
                .await
                .with_path(&destination)?;
            for line in body {
                out.write_all(line).await.with_path(&destination)?;
                out.write_all(b"\n").await.with_path(&destination)?;
            }
            out.flush().await.with_path(&destination)?;

            debug!(source = %source.display(), destination = %destination.display(), "Imported custom file");
            self.ctx.publish(format!(
                "Added custom file {} to {}\n",
                display_name(source),
                destination.display()
            ));
        }
        Ok(())
    }

    async fn import_package_lists(&self, dir: &Path) -> Result<(), BuildError> {
        let lists = &self.ctx.config.assets.package_lists;
        if lists.is_empty() {
            return Ok(());
        }
        self.ctx.publish("Importing package lists\n");

        let list_path = dir.join(PACKAGE_LIST_PATH);
        if let Some(parent) = list_path.parent() {
            fs::create_dir_all(parent).await.with_path(parent)?;
        }
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&list_path)
            .await
            .with_path(&list_path)?;

        for source in lists {
            let contents = fs::read(source).await.with_path(source)?;
            out.write_all(&contents).await.with_path(&list_path)?;
            out.write_all(b"\n").await.with_path(&list_path)?;

            self.ctx.publish(format!(
                "Added package list {} to {}\n",
                display_name(source),
                PACKAGE_LIST_PATH
            ));
        }
        out.flush().await.with_path(&list_path)?;
        Ok(())
    }

    async fn import_splash_images(&self, dir: &Path) -> Result<(), BuildError> {
        let images = &self.ctx.config.assets.splash_images;
        if images.is_empty() {
            return Ok(());
        }
        self.ctx.publish("Importing splash images\n");

        let splash_dir = dir.join(SPLASH_DIR);
        fs::create_dir_all(&splash_dir).await.with_path(&splash_dir)?;

        for source in images {
            let file_name = source.file_name().ok_or_else(|| {
                BuildError::io(
                    source,
                    io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
                )
            })?;
            let destination = splash_dir.join(file_name);
            fs::copy(source, &destination).await.with_path(source)?;

            self.ctx.publish(format!(
                "Added splash image {} to {}\n",
                display_name(source),
                destination.display()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for ImportStage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Importing assets\n"
    }

    fn state(&self) -> PipelineState {
        PipelineState::Importing
    }

    fn set_target(&mut self, target: &Path) {
        self.target.set(target);
    }

    async fn run(&self) -> Result<(), BuildError> {
        let dir = self.target.get(NAME)?;
        let assets = &self.ctx.config.assets;
        info!(
            custom_files = assets.custom_files.len(),
            package_lists = assets.package_lists.len(),
            splash_images = assets.splash_images.len(),
            "Importing assets"
        );

        self.import_custom_files(dir).await?;
        self.import_package_lists(dir).await?;
        self.import_splash_images(dir).await?;

        self.ctx.publish("Import finished\n");
        Ok(())
    }
}

/// First line and the remaining lines of a custom file, as raw bytes
fn split_header(contents: &[u8]) -> (&[u8], impl Iterator<Item = &[u8]>) {
    let mut lines = byte_lines(contents);
    let header = lines.next().unwrap_or(b"");
    (header, lines)
}

/// `str::lines` for bytes: splits on `\n`, drops a trailing `\r`
fn byte_lines(contents: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = contents.strip_suffix(b"\n").unwrap_or(contents);
    (!contents.is_empty())
        .then(|| body.split(|b| *b == b'\n'))
        .into_iter()
        .flatten()
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

async fn sidecar_install_path(source: &Path) -> Result<String, BuildError> {
    let mut meta_path = source.as_os_str().to_owned();
    meta_path.push(".meta.json");
    let meta_path = PathBuf::from(meta_path);

    match fs::read(&meta_path).await {
        Ok(bytes) => {
            let meta: FileMetadata = serde_json::from_slice(&bytes)
                .map_err(io::Error::from)
                .with_path(&meta_path)?;
            Ok(meta.install_path.trim().to_string())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(BuildError::io(meta_path, e)),
    }
}

/// Confine a declared destination to the working directory
fn resolve_destination(source: &Path, declared: &str) -> Result<PathBuf, BuildError> {
    let invalid = || BuildError::InvalidDestination {
        source_file: source.to_path_buf(),
        destination: declared.to_string(),
    };

    let mut resolved = PathBuf::new();
    for component in Path::new(declared.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(invalid())
            }
        }
    }

    if resolved.as_os_str().is_empty() {
        return Err(invalid());
    }
    Ok(resolved)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
