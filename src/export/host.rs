//! Where exported files go and how the user is told about it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExportError;

/// A finished export ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFile {
    /// File name including extension.
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Capabilities of the environment an export runs in.
pub trait HostEnvironment {
    /// Whether binary blobs can be built at all.
    fn supports_blob(&self) -> bool {
        true
    }

    /// Whether the user has to save downloads by hand.
    fn requires_manual_save(&self) -> bool {
        false
    }

    /// Shows a message to the user.
    fn notify(&mut self, message: &str);

    /// Stores a finished export.
    fn save(&mut self, file: &DownloadFile) -> Result<(), ExportError>;
}

// ============================================================================
// UserAgent
// ============================================================================

/// Browser identification strings used for capability checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgent {
    pub vendor: String,
    pub user_agent: String,
}

impl UserAgent {
    pub fn new(vendor: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Safari cannot save generated downloads by itself. Chrome on iOS
    /// reports an Apple vendor too but is excluded by its `CriOS` token.
    pub fn requires_manual_save(&self) -> bool {
        self.vendor.contains("Apple") && !self.user_agent.contains("CriOS")
    }
}

// ============================================================================
// DirectoryHost
// ============================================================================

/// Saves exports into a directory and logs notices.
#[derive(Debug, Clone)]
pub struct DirectoryHost {
    dir: PathBuf,
    user_agent: UserAgent,
}

impl DirectoryHost {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            user_agent: UserAgent::default(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl HostEnvironment for DirectoryHost {
    fn requires_manual_save(&self) -> bool {
        self.user_agent.requires_manual_save()
    }

    fn notify(&mut self, message: &str) {
        tracing::info!(notice = message, "export notice");
    }

    fn save(&mut self, file: &DownloadFile) -> Result<(), ExportError> {
        let path = self.dir.join(&file.filename);
        fs::write(&path, &file.bytes).map_err(|err| ExportError::Save {
            filename: file.filename.clone(),
            reason: err.to_string(),
        })?;
        tracing::info!(path = %path.display(), bytes = file.bytes.len(), "saved export");
        Ok(())
    }
}

// ============================================================================
// MemoryHost
// ============================================================================

/// Keeps exports and notices in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    pub blob_support: bool,
    pub manual_save: bool,
    pub notices: Vec<String>,
    pub files: Vec<DownloadFile>,
}

impl MemoryHost {
    /// A host that supports blobs and saves programmatically.
    pub fn new() -> Self {
        Self {
            blob_support: true,
            ..Self::default()
        }
    }

    /// A host that cannot build blobs.
    pub fn without_blob_support() -> Self {
        Self::default()
    }

    pub fn for_user_agent(user_agent: &UserAgent) -> Self {
        Self {
            manual_save: user_agent.requires_manual_save(),
            ..Self::new()
        }
    }
}

impl HostEnvironment for MemoryHost {
    fn supports_blob(&self) -> bool {
        self.blob_support
    }

    fn requires_manual_save(&self) -> bool {
        self.manual_save
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn save(&mut self, file: &DownloadFile) -> Result<(), ExportError> {
        self.files.push(file.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
        (KHTML, like Gecko) Version/17.0 Safari/605.1.15";
    const CHROME_IOS: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/118.0 Mobile/15E148 Safari/604.1";

    #[test]
    fn safari_requires_manual_save() {
        assert!(UserAgent::new("Apple Computer, Inc.", SAFARI).requires_manual_save());
        assert!(!UserAgent::new("Apple Computer, Inc.", CHROME_IOS).requires_manual_save());
        assert!(!UserAgent::new("Google Inc.", SAFARI).requires_manual_save());
    }

    #[test]
    fn directory_host_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = DirectoryHost::new(dir.path());
        let file = DownloadFile {
            filename: "chart.svg".into(),
            mime_type: "image/svg+xml",
            bytes: b"<svg/>".to_vec(),
        };
        host.save(&file).unwrap();
        assert_eq!(fs::read(dir.path().join("chart.svg")).unwrap(), b"<svg/>");
    }

    #[test]
    fn directory_host_reports_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = DirectoryHost::new(dir.path().join("missing"));
        let file = DownloadFile {
            filename: "chart.png".into(),
            mime_type: "image/png",
            bytes: Vec::new(),
        };
        let err = host.save(&file).unwrap_err();
        assert!(matches!(err, ExportError::Save { ref filename, .. } if filename == "chart.png"));
    }

    #[test]
    fn memory_host_capabilities() {
        assert!(MemoryHost::new().supports_blob());
        assert!(!MemoryHost::without_blob_support().supports_blob());
        let safari = UserAgent::new("Apple Computer, Inc.", SAFARI);
        assert!(MemoryHost::for_user_agent(&safari).requires_manual_save());
    }
}
