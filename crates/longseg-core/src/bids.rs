//! BIDS path identity helpers: extracting subject/session tokens from paths
//! following the `.../sub-<ID>/ses-<ID>/...` convention, and building
//! BIDS-compliant names for derived files.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static SUB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sub-([a-zA-Z0-9]+)").unwrap());
static SES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ses-([a-zA-Z0-9]+)").unwrap());

fn extract_id(path: &Path, marker: &str, re: &Regex) -> String {
    // First path component carrying the marker wins; filenames also qualify
    // since BIDS names embed both tokens.
    for component in path.iter() {
        let text = component.to_string_lossy();
        if !text.contains(marker) {
            continue;
        }
        if let Some(caps) = re.captures(&text) {
            return caps[1].to_string();
        }
    }
    // Empty ID signals "not resolvable"; callers must not treat it as valid.
    String::new()
}

/// Extract the BIDS subject ID from any path containing a `sub-<ID>` segment.
/// Returns an empty string when no segment matches.
pub fn subject_id(path: &Path) -> String {
    extract_id(path, "sub-", &SUB_RE)
}

/// Extract the BIDS session ID from any path containing a `ses-<ID>` segment.
/// Returns an empty string when no segment matches.
pub fn session_id(path: &Path) -> String {
    extract_id(path, "ses-", &SES_RE)
}

/// `sub-<sub>_ses-<ses>` filename stem.
pub fn stem(sub: &str, ses: &str) -> String {
    format!("sub-{sub}_ses-{ses}")
}

/// Per-session anatomy directory under a derivatives (or raw) root:
/// `<root>/sub-<sub>/ses-<ses>/anat`.
pub fn anat_dir(root: &Path, sub: &str, ses: &str) -> PathBuf {
    root.join(format!("sub-{sub}"))
        .join(format!("ses-{ses}"))
        .join("anat")
}

/// Subject directory under a root: `<root>/sub-<sub>`.
pub fn subject_dir(root: &Path, sub: &str) -> PathBuf {
    root.join(format!("sub-{sub}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_both_ids() {
        let p = Path::new("/data/sub-m001234/ses-20210101/anat/x.nii.gz");
        assert_eq!(subject_id(p), "m001234");
        assert_eq!(session_id(p), "20210101");
    }

    #[test]
    fn missing_segment_yields_empty_id() {
        let p = Path::new("/data/patient01/scan.nii.gz");
        assert_eq!(subject_id(p), "");
        assert_eq!(session_id(p), "");
    }

    #[test]
    fn ids_resolve_from_filename_alone() {
        let p = Path::new("sub-a1_ses-b2_T1w.nii.gz");
        assert_eq!(subject_id(p), "a1");
        assert_eq!(session_id(p), "b2");
    }
}
