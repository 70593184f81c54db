//! Orphan cleanup after a regeneration.
//!
//! The previously known derived files come from two places: the sizes in the
//! metadata this run started from, and the prior-generation snapshot the host
//! keeps for the image. The snapshot matters when the size selection shrinks,
//! since sizes outside the current selection never reach the incoming
//! metadata. Every previously known file the new sizes no longer reference is
//! deleted together with its WebP sibling.
//!
//! The original is never deleted, whatever the metadata claims, and neither is
//! any file the current sizes still own. A converted and an unconverted name
//! share one WebP sibling (`a-1x1.png.jpg` and `a-1x1.png` both map to
//! `a-1x1.webp`).

use crate::imaging::operations::remove_existing;
use crate::ledger::SizeMap;
use crate::naming::webp_sibling;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Previously known files that `current` no longer references.
///
/// Order follows `previous`, without repeats. The original's basename and
/// names that would leave the image directory are never returned.
pub fn orphaned_files<'a>(
    previous: impl IntoIterator<Item = &'a str>,
    current: &SizeMap,
    original_basename: &str,
) -> Vec<String> {
    let referenced: HashSet<&str> = current.files().collect();
    let mut seen = HashSet::new();

    previous
        .into_iter()
        .filter(|file| seen.insert(*file))
        .filter(|file| *file != original_basename)
        .filter(|file| is_plain_name(file))
        .filter(|file| !referenced.contains(file))
        .map(String::from)
        .collect()
}

/// A bare file name: not empty, no directory parts.
fn is_plain_name(file: &str) -> bool {
    !file.is_empty() && file != "." && file != ".." && !file.contains(['/', '\\'])
}

/// Paths in `dir` the current sizes own: each file and its WebP sibling.
fn owned_paths(dir: &Path, current: &SizeMap) -> HashSet<PathBuf> {
    current
        .files()
        .map(|file| dir.join(file))
        .flat_map(|path| {
            let sibling = webp_sibling(&path);
            [path, sibling]
        })
        .collect()
}

/// Delete each orphan in `dir` plus its WebP sibling. Best-effort.
///
/// Paths still owned by `current` are skipped. Returns the paths that were
/// actually removed.
pub fn delete_orphans(
    dir: &Path,
    orphans: &[String],
    current: &SizeMap,
    original_basename: &str,
) -> Vec<PathBuf> {
    let owned = owned_paths(dir, current);
    let mut deleted = Vec::new();
    for file in orphans {
        let path = dir.join(file);
        let sibling = webp_sibling(&path);

        for candidate in [path, sibling] {
            if candidate.file_name().is_some_and(|n| n == original_basename) {
                continue;
            }
            if owned.contains(&candidate) {
                debug!(path = %candidate.display(), "still owned by a current size, keeping");
                continue;
            }
            if !candidate.exists() {
                continue;
            }
            match remove_existing(&candidate) {
                Ok(()) => {
                    info!(path = %candidate.display(), "deleted orphaned thumbnail");
                    deleted.push(candidate);
                }
                // Stale files are only a disk-space cost; keep going.
                Err(e) => debug!(path = %candidate.display(), error = %e, "could not delete orphan"),
            }
        }
    }
    deleted
}

/// Diff previous sizes against `current` and delete what fell out.
pub fn reconcile(
    dir: &Path,
    previous: &SizeMap,
    prior_generation: Option<&SizeMap>,
    current: &SizeMap,
    original_basename: &str,
) -> Vec<PathBuf> {
    let known = prior_generation
        .into_iter()
        .flat_map(SizeMap::files)
        .chain(previous.files());
    let orphans = orphaned_files(known, current, original_basename);
    if orphans.is_empty() {
        return Vec::new();
    }
    debug!(count = orphans.len(), "orphaned thumbnails found");
    delete_orphans(dir, &orphans, current, original_basename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SizeRecord;
    use std::fs;

    fn sizes(entries: &[(&str, &str)]) -> SizeMap {
        let mut map = SizeMap::new();
        for (name, file) in entries {
            map.insert(
                *name,
                SizeRecord {
                    file: file.to_string(),
                    width: 1,
                    height: 1,
                    mime_type: "image/jpeg".into(),
                },
            );
        }
        map
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"x").unwrap();
        }
    }

    #[test]
    fn orphans_are_previous_minus_current() {
        let current = sizes(&[("b", "p-b.jpg")]);
        let orphans = orphaned_files(["p-a.jpg", "p-b.jpg", "p-c.jpg"], &current, "p.jpg");
        assert_eq!(orphans, vec!["p-a.jpg", "p-c.jpg"]);
    }

    #[test]
    fn original_is_never_an_orphan() {
        let orphans = orphaned_files(["p.jpg", "p-a.jpg"], &SizeMap::new(), "p.jpg");
        assert_eq!(orphans, vec!["p-a.jpg"]);
    }

    #[test]
    fn duplicates_and_path_escapes_are_dropped() {
        let orphans = orphaned_files(
            ["p-a.jpg", "p-a.jpg", "../p.jpg", "sub/p-x.jpg", ""],
            &SizeMap::new(),
            "p.jpg",
        );
        assert_eq!(orphans, vec!["p-a.jpg"]);
    }

    #[test]
    fn reconcile_uses_prior_generation_snapshot() {
        let tmp = tempfile::TempDir::new().unwrap();
        touch(
            tmp.path(),
            &["p.jpg", "p-a.jpg", "p-b.jpg", "p-c.jpg", "p-c.webp"],
        );

        // Incoming metadata only knows B; the snapshot still lists A and C.
        let previous = sizes(&[("b", "p-b.jpg")]);
        let prior = sizes(&[("a", "p-a.jpg"), ("b", "p-b.jpg"), ("c", "p-c.jpg")]);
        let current = sizes(&[("b", "p-b.jpg")]);

        let deleted = reconcile(tmp.path(), &previous, Some(&prior), &current, "p.jpg");

        assert_eq!(deleted.len(), 3);
        assert!(!tmp.path().join("p-a.jpg").exists());
        assert!(!tmp.path().join("p-c.jpg").exists());
        assert!(!tmp.path().join("p-c.webp").exists());
        assert!(tmp.path().join("p-b.jpg").exists());
        assert!(tmp.path().join("p.jpg").exists());
    }

    #[test]
    fn converted_orphan_takes_its_webp_sibling() {
        let tmp = tempfile::TempDir::new().unwrap();
        touch(tmp.path(), &["p-10x10.png.jpg", "p-10x10.webp"]);

        let deleted = delete_orphans(
            tmp.path(),
            &["p-10x10.png.jpg".to_string()],
            &SizeMap::new(),
            "p.png",
        );

        assert_eq!(deleted.len(), 2);
        assert!(!tmp.path().join("p-10x10.webp").exists());
    }

    #[test]
    fn webp_sibling_matching_original_is_kept() {
        let tmp = tempfile::TempDir::new().unwrap();
        touch(tmp.path(), &["p.jpg", "p.webp"]);

        let deleted = delete_orphans(tmp.path(), &["p.jpg".to_string()], &SizeMap::new(), "p.webp");

        assert_eq!(deleted, vec![tmp.path().join("p.jpg")]);
        assert!(tmp.path().join("p.webp").exists());
    }

    #[test]
    fn webp_sibling_shared_with_current_size_is_kept() {
        let tmp = tempfile::TempDir::new().unwrap();
        touch(tmp.path(), &["p.png", "p-10x10.png.jpg", "p-10x10.png", "p-10x10.webp"]);

        // Conversion was switched off: the old `.png.jpg` is orphaned but its
        // sibling now belongs to the unconverted `p-10x10.png`.
        let previous = sizes(&[("a", "p-10x10.png.jpg")]);
        let current = sizes(&[("a", "p-10x10.png")]);

        let deleted = reconcile(tmp.path(), &previous, None, &current, "p.png");

        assert_eq!(deleted, vec![tmp.path().join("p-10x10.png.jpg")]);
        assert!(tmp.path().join("p-10x10.png").exists());
        assert!(tmp.path().join("p-10x10.webp").exists());
    }

    #[test]
    fn missing_files_are_ignored() {
        let tmp = tempfile::TempDir::new().unwrap();
        let deleted = delete_orphans(tmp.path(), &["gone.jpg".to_string()], &SizeMap::new(), "p.jpg");
        assert!(deleted.is_empty());
    }
}
