pub mod extract;
pub mod inspect;
pub mod reader;

pub use extract::{ExtractReport, extract};
pub use inspect::{LayoutVerdict, inspect};
pub use reader::ZipBundle;

/// One usable entry of an uploaded archive, path normalized to `/` separators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

impl ArchiveEntry {
    /// First path segment
    pub fn top_level(&self) -> &str {
        self.path.split('/').next().unwrap_or("")
    }

    /// A file sitting directly at the archive root
    pub fn is_root_file(&self) -> bool {
        !self.is_dir && !self.path.contains('/')
    }
}
