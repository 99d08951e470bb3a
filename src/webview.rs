pub mod browser;
pub mod download;
pub mod filename;
pub mod netlog;
pub mod profile;
pub mod session;
pub mod storage;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use url::Url;

/// Configuration for one browser session.
pub struct WebviewConfig {
    pub url: Url,
    pub debug: bool,
    pub documents_dir: Option<PathBuf>,
    pub profile_dir: Option<PathBuf>,
    pub chrome_binary: Option<PathBuf>,
    pub headless: bool,
    pub preview: bool,
    pub interactive: bool,
}

impl WebviewConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            debug: false,
            documents_dir: None,
            profile_dir: None,
            chrome_binary: None,
            headless: false,
            preview: true,
            interactive: false,
        }
    }
}

/// What the host wants done with a top-level navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Let the browser render it.
    Allow,
    /// Abort it in the page; the host took it over.
    Cancel,
}

/// Host-side policy for browser events. The session consults it for every
/// paused top-level request and hands it every payload the injected
/// wrapper reports.
pub trait BrowserHost: Send {
    fn on_navigate(&mut self, url: &str) -> NavigationDecision;
    fn on_script_message(&mut self, payload: &str);
}

/// Production host: turns downloadable navigations into queued jobs and
/// logs network activity reports when debug mode is on.
pub struct WebviewHost {
    debug: bool,
    jobs: mpsc::UnboundedSender<download::DownloadJob>,
}

impl WebviewHost {
    pub fn new(debug: bool, jobs: mpsc::UnboundedSender<download::DownloadJob>) -> Self {
        Self { debug, jobs }
    }
}

impl BrowserHost for WebviewHost {
    fn on_navigate(&mut self, url: &str) -> NavigationDecision {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            // Nothing to download in an unparseable URL; let it render.
            Err(_) => return NavigationDecision::Allow,
        };
        match download::classify_download(&parsed) {
            Some(kind) => {
                let job = download::DownloadJob { url: parsed, kind };
                if self.jobs.send(job).is_err() {
                    // The worker is gone, so the session is winding down.
                    return NavigationDecision::Allow;
                }
                NavigationDecision::Cancel
            }
            None => NavigationDecision::Allow,
        }
    }

    fn on_script_message(&mut self, payload: &str) {
        if !self.debug {
            return;
        }
        if let Some(activity) = netlog::parse_activity(payload) {
            eprintln!("{}", netlog::format_activity(&activity));
        }
    }
}

/// Commands accepted at the interactive session prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Back,
    Forward,
    Reload,
    Url,
    Close,
    Help,
}

/// Parse one prompt line. Empty lines parse to `None`; an unknown word
/// is an error naming the word.
pub fn parse_session_command(line: &str) -> Result<Option<SessionCommand>, String> {
    let word = line.trim();
    if word.is_empty() {
        return Ok(None);
    }
    let command = match word.to_ascii_lowercase().as_str() {
        "back" => SessionCommand::Back,
        "forward" => SessionCommand::Forward,
        "reload" => SessionCommand::Reload,
        "url" => SessionCommand::Url,
        "close" | "quit" | "exit" => SessionCommand::Close,
        "help" | "?" => SessionCommand::Help,
        other => return Err(format!("unknown command '{other}'; type 'help' for commands")),
    };
    Ok(Some(command))
}

fn print_session_help() {
    eprintln!("Session commands:");
    eprintln!("  back     go back one page");
    eprintln!("  forward  go forward one page");
    eprintln!("  reload   reload the current page");
    eprintln!("  url      print the current URL");
    eprintln!("  close    end the session (quit/exit also work)");
}

/// Run the full browser session orchestration.
///
/// This is the async core called from `run_webview`, which sets up a tokio
/// runtime. `presented` fires once the initial navigation has been issued,
/// which is the point the session counts as presented.
pub async fn run_webview_async(
    config: WebviewConfig,
    presented: Option<std::sync::mpsc::Sender<()>>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    // 1. Resolve and lock the browser profile
    let profile_dir = profile::resolve_profile_dir(config.profile_dir.as_deref())?;
    let _profile_lock = profile::acquire_profile_lock(&profile_dir)?;

    // 2. Resolve the documents directory downloads are saved into
    let documents_dir = storage::resolve_documents_dir(config.documents_dir.as_deref())?;

    // 3. Find and launch the browser
    let chrome_path = match &config.chrome_binary {
        Some(path) => path.clone(),
        None => browser::find_chrome_binary()?,
    };
    eprintln!("Using browser: {}", chrome_path.display());
    eprintln!("Profile dir: {}", profile_dir.display());

    eprintln!("Launching browser...");
    let (mut browser_instance, handler_handle, mut closed_rx) =
        browser::launch_browser(&chrome_path, &profile_dir, config.headless).await?;
    eprintln!("Browser launched.");

    // 4. Attach to the initial page
    let page = browser::open_start_page(&mut browser_instance).await?;

    // 5. Wire the host: download queue and worker, network bridge,
    //    download interceptor
    let (job_tx, job_rx) = mpsc::unbounded_channel();
    let host: Arc<Mutex<dyn BrowserHost>> =
        Arc::new(Mutex::new(WebviewHost::new(config.debug, job_tx)));

    let worker_handle = tokio::spawn(download::run_download_worker(
        download::DownloadContext {
            client: reqwest::Client::new(),
            documents_dir,
            preview: config.preview,
        },
        page.clone(),
        job_rx,
    ));

    session::install_network_bridge(&page, host.clone()).await?;
    session::install_download_interceptor(&page, host.clone()).await?;

    // 6. Navigate; issuing the navigation is what presents the session
    eprintln!("Opening {}", config.url);
    session::navigate(&page, &config.url).await?;
    if let Some(presented) = presented {
        let _ = presented.send(());
    }

    // 7. Drive the session until the window closes or `close` is issued
    let result = if config.interactive {
        run_command_loop(&page, &mut closed_rx).await
    } else {
        wait_for_window_close(&mut closed_rx).await
    };

    // 8. Close the browser and wait briefly for the pieces to wind down
    eprintln!("Closing browser...");
    let _ = browser_instance.close().await;
    drop(page);
    drop(host);
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handler_handle).await;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), worker_handle).await;
    eprintln!("Done.");

    result
}

/// Synchronous entry point that creates a tokio runtime and runs the
/// session to completion.
pub fn run_webview(config: WebviewConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_webview_async(config, None))
        .map_err(|err| -> Box<dyn std::error::Error> { err })?;
    Ok(())
}

async fn wait_for_window_close(
    closed: &mut watch::Receiver<bool>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        if *closed.borrow_and_update() {
            return Ok(());
        }
        // An error means the handler task is gone, which ends the session
        // just the same.
        if closed.changed().await.is_err() {
            return Ok(());
        }
    }
}

async fn run_command_loop(
    page: &chromiumoxide::Page,
    closed: &mut watch::Receiver<bool>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut lines = spawn_stdin_reader();
    eprintln!("Session ready. Type 'help' for commands, or close the window.");
    loop {
        tokio::select! {
            changed = closed.changed() => {
                if changed.is_err() || *closed.borrow() {
                    eprintln!("Window closed.");
                    return Ok(());
                }
            }
            line = lines.recv() => {
                let line = match line {
                    Some(line) => line,
                    // stdin closed; treat it like a close command
                    None => return Ok(()),
                };
                match parse_session_command(&line) {
                    Ok(None) => {}
                    Ok(Some(SessionCommand::Back)) => {
                        let _ = session::go_back(page).await?;
                    }
                    Ok(Some(SessionCommand::Forward)) => {
                        let _ = session::go_forward(page).await?;
                    }
                    Ok(Some(SessionCommand::Reload)) => {
                        session::reload(page).await?;
                    }
                    Ok(Some(SessionCommand::Url)) => match session::current_url(page).await? {
                        Some(url) => eprintln!("{url}"),
                        None => eprintln!("(no navigation yet)"),
                    },
                    Ok(Some(SessionCommand::Close)) => return Ok(()),
                    Ok(Some(SessionCommand::Help)) => print_session_help(),
                    Err(message) => eprintln!("{message}"),
                }
            }
        }
    }
}

/// Read stdin lines on a plain thread so the runtime only ever sees the
/// channel. The thread ends when stdin closes or the receiver is dropped.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::webview::download::DownloadKind;

    #[test]
    fn webview_config_defaults() {
        let config = WebviewConfig::new(Url::parse("https://example.com").unwrap());
        assert!(!config.debug);
        assert!(!config.headless);
        assert!(!config.interactive);
        assert!(config.preview);
        assert!(config.documents_dir.is_none());
        assert!(config.profile_dir.is_none());
        assert!(config.chrome_binary.is_none());
    }

    #[test]
    fn parse_session_command_accepts_known_words() {
        let cases = [
            ("back", SessionCommand::Back),
            ("forward", SessionCommand::Forward),
            ("reload", SessionCommand::Reload),
            ("url", SessionCommand::Url),
            ("close", SessionCommand::Close),
            ("quit", SessionCommand::Close),
            ("exit", SessionCommand::Close),
            ("help", SessionCommand::Help),
            ("?", SessionCommand::Help),
            ("  RELOAD  ", SessionCommand::Reload),
        ];
        for (line, expected) in cases {
            match parse_session_command(line) {
                Ok(Some(command)) => assert_eq!(command, expected, "for line {line:?}"),
                other => panic!("expected {expected:?} for {line:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_session_command_empty_is_none() {
        assert_eq!(parse_session_command(""), Ok(None));
        assert_eq!(parse_session_command("   "), Ok(None));
    }

    #[test]
    fn parse_session_command_rejects_unknown_words() {
        let err = match parse_session_command("teleport") {
            Err(err) => err,
            other => panic!("expected an error, got {other:?}"),
        };
        assert!(err.contains("unknown command 'teleport'"), "got: {err}");
    }

    #[test]
    fn host_cancels_downloadable_navigations_and_queues_a_job() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = WebviewHost::new(false, tx);

        let decision = host.on_navigate("https://example.com/files/report.pdf");
        assert_eq!(decision, NavigationDecision::Cancel);

        let job = rx.try_recv().unwrap();
        assert_eq!(job.kind, DownloadKind::File);
        assert_eq!(job.url.as_str(), "https://example.com/files/report.pdf");
    }

    #[test]
    fn host_queues_prescription_jobs() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = WebviewHost::new(false, tx);

        let decision = host.on_navigate("https://example.com/api/prescription-pdf?id=7");
        assert_eq!(decision, NavigationDecision::Cancel);
        assert_eq!(rx.try_recv().unwrap().kind, DownloadKind::PrescriptionPdf);
    }

    #[test]
    fn host_allows_ordinary_navigations() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = WebviewHost::new(false, tx);

        let decision = host.on_navigate("https://example.com/about");
        assert_eq!(decision, NavigationDecision::Allow);
        assert!(rx.try_recv().is_err(), "no job should be queued");
    }

    #[test]
    fn host_allows_unparseable_urls() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = WebviewHost::new(false, tx);

        assert_eq!(host.on_navigate("not-a-url"), NavigationDecision::Allow);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn host_allows_downloads_once_the_worker_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut host = WebviewHost::new(false, tx);

        let decision = host.on_navigate("https://example.com/files/report.pdf");
        assert_eq!(decision, NavigationDecision::Allow);
    }

    #[test]
    fn host_ignores_script_messages_outside_debug_mode() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut host = WebviewHost::new(false, tx);
        // Must not panic or log; nothing observable to assert beyond that.
        host.on_script_message(r#"{"type":"fetch-response","url":"x","status":200}"#);
        host.on_script_message("not json");
    }

    #[test]
    fn host_tolerates_malformed_payloads_in_debug_mode() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut host = WebviewHost::new(true, tx);
        host.on_script_message("not json");
        host.on_script_message("");
    }
}
