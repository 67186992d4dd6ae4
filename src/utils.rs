//! Utility functions for file names and sizes

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Format a byte count for display
///
/// - below 1 KiB: whole bytes (`"500 B"`)
/// - below 1 MiB: kilobytes with one decimal (`"2.0 KB"`)
/// - otherwise: megabytes with one decimal (`"5.0 MB"`)
///
/// # Examples
///
/// ```
/// use doc_intake::utils::format_size;
///
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(2048), "2.0 KB");
/// assert_eq!(format_size(5_242_880), "5.0 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

/// Extension of a file name: the text after the final `.`, lower-cased
///
/// Returns `None` when the name contains no `.`.
///
/// # Examples
///
/// ```
/// use doc_intake::utils::file_extension;
///
/// assert_eq!(file_extension("Scan.JPEG").as_deref(), Some("jpeg"));
/// assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
/// assert_eq!(file_extension("README"), None);
/// ```
pub fn file_extension(name: &str) -> Option<String> {
    name.rfind('.').map(|idx| name[idx + 1..].to_lowercase())
}

/// Whether `name` has an extension contained in `allowed`
///
/// Entries of `allowed` are compared case-insensitively and may carry a
/// leading dot (`".pdf"` and `"pdf"` are equivalent).
pub fn has_allowed_extension(name: &str, allowed: &[String]) -> bool {
    let Some(ext) = file_extension(name) else {
        return false;
    };
    allowed
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext))
}
