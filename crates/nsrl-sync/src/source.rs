use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Basic-auth credentials for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// The shape of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// The artifact is already the hash list.
    Flat,
    /// A ZIP archive holding the hash list.
    Zip,
    /// An ISO9660 image holding `/NSRLFILE.ZIP`, which holds the hash list.
    Iso,
}

impl ContainerKind {
    /// Pick a container kind from the last path segment of a URI.
    pub fn from_uri(uri: &str) -> Self {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        let file_name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();

        if file_name.ends_with(".zip") {
            Self::Zip
        } else if file_name.ends_with(".iso") {
            Self::Iso
        } else {
            Self::Flat
        }
    }

    pub fn is_container(self) -> bool {
        !matches!(self, Self::Flat)
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Flat => "txt",
            Self::Zip => "zip",
            Self::Iso => "iso",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Zip => write!(f, "zip"),
            Self::Iso => write!(f, "iso"),
        }
    }
}

/// Static configuration for one remote hash list.
///
/// `name` keys every working file the source produces, so it must be
/// unique across the configured list (see [`validate_sources`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: String,
    pub uri: String,
    pub credentials: Option<Credentials>,
    /// Extra PEM certificate to trust on top of the system roots.
    pub ca_cert: Option<String>,
    pub ignore_ssl_errors: bool,
    /// Outbound proxy used for this source's requests only.
    pub proxy: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Path of the hash list inside the container.
    pub pattern: Option<String>,
    /// Overrides the container kind inferred from the URI.
    pub container: Option<ContainerKind>,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_container(mut self, kind: ContainerKind) -> Self {
        self.container = Some(kind);
        self
    }

    pub fn container_kind(&self) -> ContainerKind {
        self.container
            .unwrap_or_else(|| ContainerKind::from_uri(&self.uri))
    }

    /// Where the fetcher writes the downloaded artifact. For flat sources
    /// this is also the extracted hash list.
    pub fn artifact_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(format!("{}.{}", self.name, self.container_kind().extension()))
    }

    /// Canonical location of this source's flat hash list.
    pub fn extracted_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(format!("{}.txt", self.name))
    }

    /// Temporary location of the ZIP pulled out of an ISO image.
    pub fn nested_zip_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(format!("{}.nested.zip", self.name))
    }
}

/// Reject source lists that would make a run unsafe to start.
pub fn validate_sources(sources: &[SourceDescriptor]) -> Result<(), ConfigurationError> {
    if sources.is_empty() {
        return Err(ConfigurationError::NoSources);
    }

    let mut seen = HashSet::with_capacity(sources.len());
    for source in sources {
        let name = source.name.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ConfigurationError::InvalidName(name.to_owned()));
        }

        if !seen.insert(name) {
            return Err(ConfigurationError::DuplicateName(name.to_owned()));
        }

        let kind = source.container_kind();
        if kind.is_container() && source.pattern.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigurationError::MissingPattern {
                name: name.to_owned(),
                kind,
            });
        }
    }

    Ok(())
}
