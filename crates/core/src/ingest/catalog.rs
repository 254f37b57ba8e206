use crate::domain::record::Dataset;
use crate::error::Result;
use crate::ingest::dataset;
use std::path::{Path, PathBuf};

const DATASET_EXTENSION: &str = "csv";

/// Directory of `<Company>.csv` files.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(PathBuf),
    NotFound,
    InvalidName,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Company names (file stems), sorted. A missing directory lists as empty.
    pub fn companies(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(dir = %self.root.display(), "data directory does not exist");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut out = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_dataset = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(DATASET_EXTENSION))
                .unwrap_or(false);
            if !is_dataset || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                out.push(stem.to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }

    pub fn lookup(&self, company: &str) -> Lookup {
        if !is_valid_company_name(company) {
            return Lookup::InvalidName;
        }
        let path = self.root.join(format!("{company}.{DATASET_EXTENSION}"));
        if path.is_file() {
            Lookup::Found(path)
        } else {
            Lookup::NotFound
        }
    }

    /// Reads the company file fresh; callers own the returned snapshot.
    pub fn load(&self, path: &Path) -> Result<Dataset> {
        dataset::load_csv(path)
    }
}

fn is_valid_company_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}
