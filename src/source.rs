//! Where compiled resources come from: APK archives or extracted directories.

use crate::binary_xml::parse_document;
use crate::{DecodeError, Result, TYPE_STRING};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

const MANIFEST: &str = "AndroidManifest.xml";

/// One compiled XML file and the path it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResource {
    /// Path inside the application, `/`-separated
    pub path: String,
    pub bytes: Vec<u8>,
}

/// An application whose compiled resources can be listed
pub trait ResourceSource {
    fn package_name(&self) -> &str;

    fn location(&self) -> &Path;

    /// Every candidate animation or interpolator resource
    fn resources(&mut self) -> Result<Vec<RawResource>>;
}

/// Whether `path` lies in an `anim` or `interpolator` resource directory, with or without
/// configuration qualifiers (`res/anim-v21/...`)
pub fn is_animation_resource(path: &str) -> bool {
    let mut parts = path.split('/');
    let (Some("res"), Some(dir)) = (parts.next(), parts.next()) else {
        return false;
    };
    let kind = dir.split('-').next().unwrap_or(dir);
    (kind == "anim" || kind == "interpolator") && path.ends_with(".xml")
}

pub struct ApkSource {
    path: PathBuf,
    archive: ZipArchive<File>,
    package_name: String,
}

impl ApkSource {
    /// Open an APK. The package name comes from `package` when given, otherwise from the
    /// compiled manifest, falling back to the file stem.
    pub fn open(path: impl AsRef<Path>, package: Option<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut archive = ZipArchive::new(File::open(&path)?)?;

        let package_name = match package {
            Some(name) => name,
            None => match manifest_package(&mut archive) {
                Ok(Some(name)) => name,
                Ok(None) => fallback_name(&path),
                Err(e) => {
                    warn!(apk = %path.display(), error = %e, "unreadable manifest");
                    fallback_name(&path)
                }
            },
        };
        debug!(apk = %path.display(), package = %package_name, entries = archive.len(), "opened APK");

        Ok(Self {
            path,
            archive,
            package_name,
        })
    }
}

impl ResourceSource for ApkSource {
    fn package_name(&self) -> &str {
        &self.package_name
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn resources(&mut self) -> Result<Vec<RawResource>> {
        let mut resources = Vec::new();
        for index in 0..self.archive.len() {
            let mut file = self.archive.by_index(index)?;
            if !file.is_file() || !is_animation_resource(file.name()) {
                continue;
            }
            let path = file.name().to_string();
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;
            resources.push(RawResource { path, bytes });
        }
        debug!(package = %self.package_name, count = resources.len(), "collected resources");
        Ok(resources)
    }
}

/// The `package` attribute of a compiled `AndroidManifest.xml`
fn manifest_package(archive: &mut ZipArchive<File>) -> Result<Option<String>> {
    let mut bytes = Vec::new();
    match archive.by_name(MANIFEST) {
        Ok(mut file) => {
            file.read_to_end(&mut bytes)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let document = parse_document(Cursor::new(bytes)).map_err(DecodeError::from)?;
    let package = document
        .root
        .attributes
        .iter()
        .find(|attr| attr.namespace.is_none() && attr.name == "package")
        .and_then(|attr| match attr.data_type {
            TYPE_STRING => document.strings.get(attr.data as usize).cloned(),
            _ => attr.raw_value.clone(),
        });
    Ok(package)
}

fn fallback_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// An application already extracted to disk, laid out as in the APK (`res/anim/...`)
pub struct DirectorySource {
    root: PathBuf,
    package_name: String,
}

impl DirectorySource {
    pub fn open(root: impl AsRef<Path>, package: Option<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(crate::Error::Usage(format!("{} is not a directory", root.display())));
        }
        let package_name = package.unwrap_or_else(|| {
            root.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| fallback_name(&root))
        });
        Ok(Self { root, package_name })
    }
}

impl ResourceSource for DirectorySource {
    fn package_name(&self) -> &str {
        &self.package_name
    }

    fn location(&self) -> &Path {
        &self.root
    }

    fn resources(&mut self) -> Result<Vec<RawResource>> {
        let mut resources = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !is_animation_resource(&path) {
                continue;
            }
            resources.push(RawResource {
                bytes: std::fs::read(entry.path())?,
                path,
            });
        }
        debug!(package = %self.package_name, count = resources.len(), "collected resources");
        Ok(resources)
    }
}
