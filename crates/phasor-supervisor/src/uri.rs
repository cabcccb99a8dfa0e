//! Conversion of filesystem paths into protocol URIs.

use std::path::Path;
use std::str::FromStr;

use lsp_types::Uri;

/// Builds a `file://` URI for an absolute file path.
///
/// Returns `None` for relative paths or URIs the protocol type rejects.
#[must_use]
pub fn file_uri(path: &Path) -> Option<Uri> {
    let url = url::Url::from_file_path(path).ok()?;
    Uri::from_str(url.as_str()).ok()
}

/// Builds a `file://` URI for an absolute directory path.
#[must_use]
pub fn directory_uri(path: &Path) -> Option<Uri> {
    let url = url::Url::from_directory_path(path).ok()?;
    Uri::from_str(url.as_str()).ok()
}
