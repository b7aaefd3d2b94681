//! # Git Module
//!
//! Branch, short commit and dirty state for the working directory, read in
//! process with gix. Outside a repository the segment is simply omitted.

use crate::models::git::GitInfo;
use std::path::Path;

pub fn read_git_info(start_dir: &Path) -> Option<GitInfo> {
    let repo = gix::discover(start_dir).ok()?;
    let mut info = GitInfo::default();

    let mut head = repo.head().ok()?;
    if let Some(name) = head.referent_name() {
        info.branch = Some(name.shorten().to_string());
    }
    if let Ok(Some(id)) = head.try_peel_to_id() {
        let hex = id.to_hex().to_string();
        info.short_commit = Some(hex.chars().take(7).collect());
    }

    // Index vs worktree; untracked files do not count
    info.is_clean = match repo.is_dirty() {
        Ok(dirty) => Some(!dirty),
        Err(err) => {
            tracing::debug!("git dirty check failed: {}", err);
            None
        }
    };

    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outside_repository_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        // A bare temp dir may still sit under a repository on some hosts
        if gix::discover(dir.path()).is_err() {
            assert!(read_git_info(dir.path()).is_none());
        }
    }

    #[test]
    fn test_fresh_repository_has_branch_but_no_commit() {
        let dir = tempfile::TempDir::new().unwrap();
        gix::init(dir.path()).unwrap();

        let info = read_git_info(dir.path()).unwrap();
        assert!(info.branch.is_some());
        assert_eq!(info.short_commit, None);
    }
}
