use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Resolve the persistent browser profile directory.
///
/// Default: `dirs::data_dir()/webpane/profile`. An override replaces the
/// whole path. Session cookies live in the profile, so reusing it is what
/// lets a later session reuse an earlier session's logins.
pub fn resolve_profile_dir(
    profile_override: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    match profile_override {
        Some(p) => Ok(p.to_path_buf()),
        None => {
            let data_dir = dirs::data_dir().ok_or("could not determine data directory")?;
            Ok(data_dir.join("webpane").join("profile"))
        }
    }
}

/// Guard for the exclusive profile lock. Dropping it releases the lock
/// with the file handle.
pub struct ProfileLock {
    _file: std::fs::File,
}

/// Acquire an exclusive file lock on `<profile>/.webpane-lock` so two
/// sessions never drive the same profile at once.
pub fn acquire_profile_lock(
    profile_dir: &Path,
) -> Result<ProfileLock, Box<dyn std::error::Error + Send + Sync>> {
    let lock_path = profile_dir.join(".webpane-lock");
    let file = acquire_lock_file(&lock_path).map_err(|_| {
        format!(
            "profile '{}' is currently in use by another session",
            profile_dir.display()
        )
    })?;
    Ok(ProfileLock { _file: file })
}

fn acquire_lock_file(
    lock_path: &Path,
) -> Result<std::fs::File, Box<dyn std::error::Error + Send + Sync>> {
    use fs2::FileExt;

    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?;

    file.try_lock_exclusive()?;

    Ok(file)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "webpane-profile-{prefix}-{}-{now}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn resolve_profile_dir_honors_override() {
        let dir = resolve_profile_dir(Some(Path::new("/tmp/custom-profile"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/custom-profile"));
    }

    #[test]
    fn resolve_profile_dir_default_is_under_webpane_or_errors() {
        match resolve_profile_dir(None) {
            Ok(dir) => assert!(
                dir.ends_with(Path::new("webpane/profile")),
                "unexpected dir {}",
                dir.display()
            ),
            Err(err) => assert!(err.to_string().contains("data directory")),
        }
    }

    #[test]
    fn profile_lock_excludes_second_session() {
        let dir = temp_dir("lock");

        let first = acquire_profile_lock(&dir).unwrap();
        let second = acquire_profile_lock(&dir);
        match second {
            Ok(_) => panic!("expected the second lock attempt to fail"),
            Err(err) => assert!(
                err.to_string().contains("currently in use"),
                "unexpected error: {err}"
            ),
        }

        drop(first);
        let third = acquire_profile_lock(&dir);
        assert!(third.is_ok(), "expected the lock to be reacquirable");

        drop(third);
        let _ = fs::remove_dir_all(&dir);
    }
}
