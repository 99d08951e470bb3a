use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve the directory downloads are saved into.
///
/// An explicit override wins. Otherwise this is the platform documents
/// directory (falling back to the downloads directory) plus a `webpane`
/// subdirectory.
pub fn resolve_documents_dir(
    override_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    let base = dirs::document_dir()
        .or_else(dirs::download_dir)
        .ok_or("could not determine a documents directory")?;
    Ok(base.join("webpane"))
}

/// Write artifact bytes under `documents_dir`, creating the directory on
/// demand and overwriting any existing file with the same name.
pub fn save_artifact(
    documents_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
    fs::create_dir_all(documents_dir)?;
    let path = documents_dir.join(filename);
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Open the platform viewer on a saved artifact. Best effort: failures
/// are logged and never touch the session.
pub fn preview_artifact(path: &Path) {
    if let Err(err) = open_with_system_viewer(path) {
        eprintln!(
            "[WEBVIEW] could not open preview for {}: {err}",
            path.display()
        );
    }
}

fn open_with_system_viewer(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    const VIEWER: &str = "open";
    #[cfg(target_os = "windows")]
    const VIEWER: &str = "explorer";
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    const VIEWER: &str = "xdg-open";
    std::process::Command::new(VIEWER).arg(path).spawn()?;
    Ok(())
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
            "webpane-storage-{prefix}-{}-{now}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn resolve_documents_dir_honors_override() {
        let dir = temp_dir("override");
        let resolved = resolve_documents_dir(Some(&dir)).unwrap();
        assert_eq!(resolved, dir);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn resolve_documents_dir_default_ends_with_webpane_or_errors() {
        match resolve_documents_dir(None) {
            Ok(dir) => assert!(dir.ends_with("webpane"), "unexpected dir {}", dir.display()),
            Err(err) => assert!(err.to_string().contains("documents directory")),
        }
    }

    #[test]
    fn save_artifact_writes_and_overwrites() {
        let dir = temp_dir("save");
        let target = dir.join("artifacts");

        let first = save_artifact(&target, "report.pdf", b"first").unwrap();
        assert_eq!(fs::read(&first).unwrap(), b"first");

        let second = save_artifact(&target, "report.pdf", b"second").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read(&second).unwrap(), b"second");

        let _ = fs::remove_dir_all(&dir);
    }
}
