use super::header::{read_header, validate_header, HeaderMismatch};
use super::LoadError;
use crate::catalog::{Entity, EntitySpec};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A CSV file whose header matched its entity's contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy {
    pub entity: Entity,
    pub path: PathBuf,
}

impl PlannedCopy {
    pub fn spec(&self) -> &'static EntitySpec {
        self.entity.spec()
    }
}

/// Header problem found while validating one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub entity: Entity,
    pub path: PathBuf,
    pub reason: Rejection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Mismatch(HeaderMismatch),
    Unreadable(String),
}

impl std::fmt::Display for RejectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            Rejection::Mismatch(mismatch) => {
                write!(f, "{}: {}", self.path.display(), mismatch)
            }
            Rejection::Unreadable(reason) => write!(f, "{}: {}", self.path.display(), reason),
        }
    }
}

/// Ordered, fully validated set of files for one load run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    directory: PathBuf,
    entries: Vec<PlannedCopy>,
}

impl LoadPlan {
    /// Scans `dir` for catalog files and validates every header.
    ///
    /// Fails before producing any entry when a single header is wrong.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self, LoadError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LoadError::MissingDirectory(dir.to_path_buf()));
        }
        let directory = fs::canonicalize(dir).map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut found: BTreeMap<Entity, PathBuf> = BTreeMap::new();
        let listing = fs::read_dir(&directory).map_err(|source| LoadError::Io {
            path: directory.clone(),
            source,
        })?;
        for entry in listing {
            let entry = entry.map_err(|source| LoadError::Io {
                path: directory.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                debug!(file = %path.display(), "ignoring file with a non UTF-8 name");
                continue;
            };
            match Entity::from_file_name(name) {
                Some(entity) => {
                    found.insert(entity, path);
                }
                None => debug!(file = %path.display(), "ignoring file outside the catalog"),
            }
        }

        let mut entries = Vec::with_capacity(found.len());
        let mut rejected = Vec::new();
        for entity in Entity::ALL {
            let Some(path) = found.remove(&entity) else {
                info!(file = entity.spec().file_name, "skipped (missing)");
                continue;
            };
            match check_file(entity.spec(), &path) {
                Ok(()) => entries.push(PlannedCopy { entity, path }),
                Err(reason) => rejected.push(RejectedFile {
                    entity,
                    path,
                    reason,
                }),
            }
        }

        if !rejected.is_empty() {
            return Err(LoadError::InvalidHeaders(rejected));
        }
        if entries.is_empty() {
            return Err(LoadError::NoInputFiles(directory));
        }

        info!(directory = %directory.display(), files = entries.len(), "load plan ready");
        Ok(Self { directory, entries })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn entries(&self) -> &[PlannedCopy] {
        &self.entries
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entries.iter().map(|entry| entry.entity)
    }
}

fn check_file(spec: &EntitySpec, path: &Path) -> Result<(), Rejection> {
    let file = File::open(path).map_err(|err| Rejection::Unreadable(err.to_string()))?;
    let header =
        read_header(BufReader::new(file)).map_err(|err| Rejection::Unreadable(err.to_string()))?;
    validate_header(spec, &header).map_err(Rejection::Mismatch)
}
