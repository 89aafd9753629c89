//! Template storage
//!
//! Layout under the template root:
//!
//! ```text
//! {root}/{formType}/{version}/{formType}_{version}.pdf     template
//! {root}/{formType}/{version}/mapping.json                 mapping
//! {root}/{formType}_{version}.pdf                          legacy template
//! {root}/{formType}_{version}.json                         legacy mapping
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::mapping::FormMapping;

use super::types::{TemplateError, TemplateResult};

/// Source of template documents and their mappings
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Template document bytes
    async fn load_template(&self, form_type: &str, version: &str) -> TemplateResult<Vec<u8>>;

    /// Mapping for the template
    async fn load_mapping(&self, form_type: &str, version: &str) -> TemplateResult<FormMapping>;
}

/// Templates on the local filesystem
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    root: PathBuf,
}

impl FsTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical path first, then the legacy flat path
    pub fn template_paths(&self, form_type: &str, version: &str) -> TemplateResult<Vec<PathBuf>> {
        check_component(form_type)?;
        check_component(version)?;
        let stem = format!("{}_{}", form_type, version);
        Ok(vec![
            self.root
                .join(form_type)
                .join(version)
                .join(format!("{}.pdf", stem)),
            self.root.join(format!("{}.pdf", stem)),
        ])
    }

    pub fn mapping_paths(&self, form_type: &str, version: &str) -> TemplateResult<Vec<PathBuf>> {
        check_component(form_type)?;
        check_component(version)?;
        Ok(vec![
            self.root.join(form_type).join(version).join("mapping.json"),
            self.root.join(format!("{}_{}.json", form_type, version)),
        ])
    }
}

/// Reject names that would leave the template root
fn check_component(value: &str) -> TemplateResult<()> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.contains("..");
    if invalid {
        return Err(TemplateError::InvalidKey(value.to_string()));
    }
    Ok(())
}

/// First readable path, or `None` when none exists
async fn read_first(paths: &[PathBuf]) -> TemplateResult<Option<(PathBuf, Vec<u8>)>> {
    for path in paths {
        match tokio::fs::read(path).await {
            Ok(bytes) => return Ok(Some((path.clone(), bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(source) => {
                return Err(TemplateError::Io {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
    Ok(None)
}

#[async_trait]
impl TemplateStore for FsTemplateStore {
    async fn load_template(&self, form_type: &str, version: &str) -> TemplateResult<Vec<u8>> {
        let attempted = self.template_paths(form_type, version)?;
        match read_first(&attempted).await? {
            Some((path, bytes)) => {
                tracing::info!("Resolved template {} {} at {}", form_type, version, path.display());
                Ok(bytes)
            }
            None => Err(TemplateError::TemplateNotFound {
                form_type: form_type.to_string(),
                version: version.to_string(),
                attempted,
            }),
        }
    }

    async fn load_mapping(&self, form_type: &str, version: &str) -> TemplateResult<FormMapping> {
        let attempted = self.mapping_paths(form_type, version)?;
        match read_first(&attempted).await? {
            Some((path, bytes)) => {
                tracing::debug!("Reading mapping {} {} from {}", form_type, version, path.display());
                let json = String::from_utf8_lossy(&bytes);
                Ok(FormMapping::from_json(&json)?)
            }
            None => Err(TemplateError::MappingNotFound {
                form_type: form_type.to_string(),
                version: version.to_string(),
                attempted,
            }),
        }
    }
}
