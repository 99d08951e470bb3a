pub mod cli;
pub mod webview;

mod version;

const PRESENT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// A running browser session handed back by [`open_webview`].
///
/// Dropping the handle leaves the session running; call [`WebviewHandle::join`]
/// to block until the user closes the window.
pub struct WebviewHandle {
    join_handle: std::thread::JoinHandle<Result<(), String>>,
}

impl WebviewHandle {
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Block until the session ends and surface its outcome.
    pub fn join(self) -> Result<(), String> {
        match self.join_handle.join() {
            Ok(result) => result,
            Err(_) => Err("webview session thread panicked".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct EchoResponse {
    pub value: String,
}

/// Return the given value unchanged.
pub fn echo(value: &str) -> EchoResponse {
    EchoResponse {
        value: value.to_string(),
    }
}

/// Open a browser session on `url`.
///
/// Returns once the session has presented, meaning the browser is up and the
/// initial navigation has been issued. Fails with `"URL is required"` when
/// `url` is blank or does not parse, and with `"Could not present the
/// webview"` when the browser cannot be brought up.
pub fn open_webview(url: &str, debug: bool) -> Result<WebviewHandle, String> {
    let url = require_valid_url(url)?;
    let mut config = webview::WebviewConfig::new(url);
    config.debug = debug;
    present_webview(config)
}

pub(crate) fn require_valid_url(input: &str) -> Result<url::Url, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("URL is required".to_string());
    }
    url::Url::parse(trimmed).map_err(|_| "URL is required".to_string())
}

fn present_webview(config: webview::WebviewConfig) -> Result<WebviewHandle, String> {
    let (presented_tx, presented_rx) = std::sync::mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("webview-session".to_string())
        .spawn(move || run_session_thread(config, presented_tx));
    let join_handle = match spawned {
        Ok(join_handle) => join_handle,
        Err(err) => {
            eprintln!("[webview] could not spawn the session thread: {err}");
            return Err("Could not present the webview".to_string());
        }
    };

    match presented_rx.recv_timeout(PRESENT_TIMEOUT) {
        Ok(()) => Ok(WebviewHandle { join_handle }),
        Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
            // The session ended before it presented anything; report why.
            match join_handle.join() {
                Ok(Err(err)) => eprintln!("[webview] session failed to start: {err}"),
                Ok(Ok(())) => eprintln!("[webview] session ended before presenting"),
                Err(_) => eprintln!("[webview] session thread panicked during startup"),
            }
            Err("Could not present the webview".to_string())
        }
        Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
            // Leave the slow session to wind down on its own.
            eprintln!(
                "[webview] browser did not come up within {} seconds",
                PRESENT_TIMEOUT.as_secs()
            );
            Err("Could not present the webview".to_string())
        }
    }
}

fn run_session_thread(
    config: webview::WebviewConfig,
    presented: std::sync::mpsc::Sender<()>,
) -> Result<(), String> {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => return Err(format!("failed to start the session runtime: {err}")),
    };
    runtime
        .block_on(webview::run_webview_async(config, Some(presented)))
        .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::{echo, open_webview, require_valid_url};

    #[test]
    fn require_valid_url_accepts_absolute_urls() {
        match require_valid_url(" https://example.com/files/report.pdf ") {
            Ok(url) => assert_eq!(url.as_str(), "https://example.com/files/report.pdf"),
            Err(err) => panic!("expected parsed URL, got error: {err}"),
        }
    }

    #[test]
    fn require_valid_url_rejects_blank_input() {
        for input in ["", "   "] {
            match require_valid_url(input) {
                Ok(url) => panic!("expected rejection for {input:?}, got {url}"),
                Err(err) => assert_eq!(err, "URL is required"),
            }
        }
    }

    #[test]
    fn require_valid_url_rejects_unparseable_input() {
        match require_valid_url("not-a-url") {
            Ok(url) => panic!("expected rejection, got {url}"),
            Err(err) => assert_eq!(err, "URL is required"),
        }
    }

    #[test]
    fn open_webview_rejects_invalid_urls_without_launching() {
        match open_webview("definitely not a url", false) {
            Ok(_) => panic!("expected rejection for invalid URL"),
            Err(err) => assert_eq!(err, "URL is required"),
        }
    }

    #[test]
    fn echo_returns_the_value() {
        let response = echo("hello");
        assert_eq!(response.value, "hello");
    }

    #[test]
    fn echo_serializes_to_a_value_object() {
        let response = echo("hola");
        match serde_json::to_string(&response) {
            Ok(json) => assert_eq!(json, r#"{"value":"hola"}"#),
            Err(err) => panic!("expected serialized response, got error: {err}"),
        }
    }
}
