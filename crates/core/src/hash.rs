//! Content hashing and hash-derived directory names

use crate::error::{Error, Result};
use ::sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-1 of the file contents
pub fn sha1(file: impl AsRef<Path>) -> Result<String> {
    digest_file::<Sha1>(file.as_ref())
}

/// Lowercase hex SHA-256 of the file contents
pub fn sha256(file: impl AsRef<Path>) -> Result<String> {
    digest_file::<Sha256>(file.as_ref())
}

/// Lowercase hex SHA-1 of an in-memory string
pub fn sha1_str(text: &str) -> String {
    hex::encode(Sha1::digest(text.as_bytes()))
}

fn digest_file<D: Digest>(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::io_at(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = D::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer).map_err(|e| Error::io_at(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Derives the human-readable part of a jar's extraction directory name
///
/// Implementations recognize a dependency cache layout and name the jar after
/// the coordinates encoded in its location. Returning `None` falls back to
/// the jar's base name.
pub trait ArchiveLayout {
    fn base_name(&self, jar: &Path) -> Option<String>;
}

/// Layout of unpacked `.aar` dependencies:
/// `.../exploded-aar/<group>/<artifact>/<version>/jars/classes.jar`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplodedAarLayout;

impl ArchiveLayout for ExplodedAarLayout {
    fn base_name(&self, jar: &Path) -> Option<String> {
        if jar.file_stem()? != "classes" || !jar.to_string_lossy().contains("exploded-aar") {
            return None;
        }

        let version_dir = jar.parent()?.parent()?;
        let artifact_dir = version_dir.parent()?;
        let group_dir = artifact_dir.parent()?;

        let name = |p: &Path| p.file_name().map(|n| n.to_string_lossy().into_owned());
        Some(format!(
            "{}-{}-{}",
            name(group_dir)?,
            name(artifact_dir)?,
            name(version_dir)?
        ))
    }
}

/// Layout that never matches; every jar is named after its base name
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainLayout;

impl ArchiveLayout for PlainLayout {
    fn base_name(&self, _jar: &Path) -> Option<String> {
        None
    }
}

/// Stable directory name for extracting `jar`, using [`ExplodedAarLayout`]
pub fn directory_name_for_jar(jar: impl AsRef<Path>) -> Result<String> {
    directory_name_for_jar_with(jar, &ExplodedAarLayout)
}

/// Stable directory name for extracting `jar`
///
/// `<base name>_<sha1 of the absolute path>`. The path is hashed as UTF-16LE
/// so names match those produced by JVM-based build tools for the same jar.
pub fn directory_name_for_jar_with(
    jar: impl AsRef<Path>,
    layout: &dyn ArchiveLayout,
) -> Result<String> {
    let jar = jar.as_ref();
    let absolute = std::path::absolute(jar).map_err(|e| Error::io_at(jar, e))?;

    let base = layout.base_name(&absolute).unwrap_or_else(|| {
        absolute
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let utf16: Vec<u8> = absolute
        .to_string_lossy()
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
    Ok(format!("{}_{}", base, hex::encode(Sha1::digest(&utf16))))
}
