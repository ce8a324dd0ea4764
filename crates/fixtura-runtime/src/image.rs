//! Build-file resolution and content-addressed image tags.
//!
//! Every fixture built from the same build file reuses one image tag, so
//! repeated test runs overwrite a single image instead of piling up a new
//! one per container.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use fixtura_common::constants::{IMAGE_REPOSITORY, IMAGE_TAG_HEX_LENGTH};
use fixtura_common::error::{FixturaError, Result};
use fixtura_common::types::ImageTag;
use sha2::{Digest, Sha256};

/// A validated build file together with its build context and image tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Canonical path of the build file.
    pub build_file: PathBuf,
    /// Directory sent to the engine as the build context.
    pub context_dir: PathBuf,
    /// Tag the built image is stored under.
    pub tag: ImageTag,
}

impl BuildContext {
    /// Resolves a build-file reference.
    ///
    /// The build context is the directory containing the build file.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Build` if the file does not exist, is not a
    /// regular file, or cannot be read.
    pub fn resolve(build_file: &Path) -> Result<Self> {
        let build_error = |message: String| FixturaError::Build {
            build_file: build_file.to_path_buf(),
            message,
        };

        let canonical = build_file
            .canonicalize()
            .map_err(|e| build_error(format!("build file not found: {e}")))?;
        if !canonical.is_file() {
            return Err(build_error("build file is not a regular file".into()));
        }
        let contents =
            std::fs::read(&canonical).map_err(|e| build_error(format!("cannot read build file: {e}")))?;

        let context_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| build_error("build file has no parent directory".into()))?;

        let tag = image_tag(&canonical, &context_dir, &contents);
        tracing::debug!(build_file = %canonical.display(), tag = %tag, "resolved build context");

        Ok(Self {
            build_file: canonical,
            context_dir,
            tag,
        })
    }
}

/// Derives `fixtura/<context-name>:<digest>` from the build file's path and
/// contents.
fn image_tag(canonical: &Path, context_dir: &Path, contents: &[u8]) -> ImageTag {
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(contents);
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(IMAGE_TAG_HEX_LENGTH);
    for byte in digest.iter().take(IMAGE_TAG_HEX_LENGTH / 2) {
        let _ = write!(hex, "{byte:02x}");
    }

    let repo = context_dir
        .file_name()
        .map(|n| sanitize_repository(&n.to_string_lossy()))
        .unwrap_or_default();
    let repo = if repo.is_empty() { "fixture".to_string() } else { repo };

    ImageTag::new(format!("{IMAGE_REPOSITORY}/{repo}:{hex}"))
}

/// Lowercases and replaces characters not allowed in a repository path.
///
/// Components must start and end alphanumeric with single separators in
/// between, so any run of two or more separators collapses to `-`.
fn sanitize_repository(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut separator: Option<char> = None;
    let mut run = 0_usize;

    for c in raw.chars().map(|c| c.to_ascii_lowercase()) {
        if c.is_ascii_alphanumeric() {
            if let Some(sep) = separator.take().filter(|_| !out.is_empty()) {
                out.push(if run == 1 { sep } else { '-' });
            }
            run = 0;
            out.push(c);
        } else {
            separator = Some(if matches!(c, '.' | '_' | '-') { c } else { '-' });
            run += 1;
        }
    }
    out
}
