use std::error::Error;
use std::path::{Path, PathBuf};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tokio::sync::watch;

const PATH_FALLBACKS: [&str; 4] = [
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "microsoft-edge",
];

/// Find the Chrome or Edge binary on the system.
pub fn find_chrome_binary() -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
    // Check well-known paths first
    for candidate in chrome_candidates() {
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    // Fallback to PATH search
    for name in PATH_FALLBACKS {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    Err("could not find Chrome or Edge binary; install Chrome or set PATH".into())
}

#[cfg(target_os = "macos")]
fn chrome_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        PathBuf::from("/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"),
        PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
    ]
}

#[cfg(target_os = "windows")]
fn chrome_candidates() -> Vec<PathBuf> {
    let program_files =
        std::env::var("PROGRAMFILES").unwrap_or_else(|_| "C:\\Program Files".to_string());
    let program_files_x86 = std::env::var("PROGRAMFILES(X86)")
        .unwrap_or_else(|_| "C:\\Program Files (x86)".to_string());
    vec![
        PathBuf::from(&program_files).join("Google\\Chrome\\Application\\chrome.exe"),
        PathBuf::from(&program_files_x86).join("Google\\Chrome\\Application\\chrome.exe"),
        PathBuf::from(&program_files).join("Microsoft\\Edge\\Application\\msedge.exe"),
        PathBuf::from(&program_files_x86).join("Microsoft\\Edge\\Application\\msedge.exe"),
    ]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn chrome_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/bin/google-chrome-stable"),
        PathBuf::from("/usr/bin/google-chrome"),
        PathBuf::from("/usr/bin/chromium-browser"),
        PathBuf::from("/usr/bin/chromium"),
    ]
}

/// Launch the browser window for a session.
///
/// Returns the `Browser` handle, the `JoinHandle` driving the CDP event
/// handler loop, and a watch receiver that flips to `true` when that loop
/// ends, which is how the session learns the window was closed.
pub async fn launch_browser(
    chrome_path: &Path,
    profile_dir: &Path,
    headless: bool,
) -> Result<(Browser, tokio::task::JoinHandle<()>, watch::Receiver<bool>), Box<dyn Error + Send + Sync>>
{
    std::fs::create_dir_all(profile_dir)?;

    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .user_data_dir(profile_dir)
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-extensions")
        .launch_timeout(std::time::Duration::from_secs(30));
    if !headless {
        builder = builder.with_head();
    }
    let config = builder
        .build()
        .map_err(|e| format!("failed to build browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(config).await?;

    let (closed_tx, closed_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut count = 0u64;
        loop {
            match handler.next().await {
                Some(Ok(())) => {
                    count += 1;
                }
                Some(Err(err)) => {
                    match &err {
                        // Fatal: underlying transport or process is gone.
                        CdpError::Ws(_)
                        | CdpError::Io(_)
                        | CdpError::ChannelSendError(_)
                        | CdpError::LaunchExit(_, _)
                        | CdpError::LaunchTimeout(_)
                        | CdpError::LaunchIo(_, _) => {
                            eprintln!("[browser] fatal handler error after {count} events: {err}");
                            break;
                        }
                        // Non-fatal: a single malformed/unexpected CDP message.
                        // Log and keep processing so the session stays alive.
                        _ => {
                            eprintln!(
                                "[browser] non-fatal handler error after {count} events (continuing): {err}"
                            );
                        }
                    }
                }
                None => {
                    eprintln!("[browser] handler stream ended after {count} events");
                    break;
                }
            }
        }
        let _ = closed_tx.send(true);
    });

    Ok((browser, handle, closed_rx))
}

/// Get a usable initial page handle for a newly launched browser.
///
/// Chromium often starts with an already-open tab. Prefer attaching to that
/// tab to avoid `Target.createTarget(about:blank)` hanging in some
/// configurations.
pub async fn open_start_page(
    browser: &mut Browser,
) -> Result<chromiumoxide::Page, Box<dyn Error + Send + Sync>> {
    browser.fetch_targets().await?;
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;

    if let Some(page) = browser.pages().await?.into_iter().next() {
        return Ok(page);
    }

    let create_timeout = std::time::Duration::from_secs(10);
    match tokio::time::timeout(create_timeout, browser.new_page("about:blank")).await {
        Ok(Ok(page)) => Ok(page),
        Ok(Err(err)) => Err(format!("failed to create initial page: {err}").into()),
        Err(_) => Err(format!(
            "timed out after {}s creating initial page (about:blank)",
            create_timeout.as_secs()
        )
        .into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn find_chrome_binary_returns_existing_path_or_error() {
        match find_chrome_binary() {
            Ok(path) => {
                assert!(path.exists(), "found path should exist: {}", path.display());
            }
            Err(e) => {
                // Acceptable in CI where Chrome may not be installed
                let msg = e.to_string();
                assert!(
                    msg.contains("could not find Chrome"),
                    "unexpected error: {msg}"
                );
            }
        }
    }

    #[test]
    fn chrome_candidates_are_absolute_paths() {
        for path in chrome_candidates() {
            assert!(
                path.is_absolute(),
                "candidate should be absolute: {}",
                path.display()
            );
        }
    }
}
