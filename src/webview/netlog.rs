use serde::Deserialize;

/// Name of the page-world binding the wrapper script reports through.
pub const BINDING_NAME: &str = "networkLogger";

/// Script installed on every new document. Wraps `window.fetch` and
/// `XMLHttpRequest` so each completed call reports a `{type, url, status}`
/// object through the binding. The binding accepts a single string
/// argument, so payloads are stringified first. Reporting must never break
/// the page, hence the empty catch.
pub const NETWORK_LOGGER_JS: &str = r#"
(function () {
  function report(payload) {
    try {
      window.networkLogger(JSON.stringify(payload));
    } catch (e) {}
  }
  var originalFetch = window.fetch;
  window.fetch = function () {
    var target = arguments[0] && arguments[0].url ? arguments[0].url : arguments[0];
    return originalFetch.apply(this, arguments).then(function (response) {
      report({ type: 'fetch-response', url: String(target), status: response.status });
      return response;
    });
  };
  var originalOpen = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function (method, url) {
    this._url = String(url);
    return originalOpen.apply(this, arguments);
  };
  var originalSend = XMLHttpRequest.prototype.send;
  XMLHttpRequest.prototype.send = function () {
    var xhr = this;
    xhr.addEventListener('loadend', function () {
      report({ type: 'xhr-response', url: xhr._url, status: xhr.status });
    });
    return originalSend.apply(this, arguments);
  };
})();
"#;

/// One report from the injected wrapper. Missing fields fall back to
/// `"unknown"` / empty rather than failing the parse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkActivity {
    #[serde(rename = "type", default = "unknown_kind")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: Option<i64>,
}

fn unknown_kind() -> String {
    "unknown".to_string()
}

/// Parse a binding payload. Malformed payloads yield `None` and are
/// dropped by the caller.
pub fn parse_activity(payload: &str) -> Option<NetworkActivity> {
    serde_json::from_str(payload).ok()
}

/// Render the log line for one report. Reports with a status are
/// responses; reports without one are bare requests.
pub fn format_activity(activity: &NetworkActivity) -> String {
    let kind = activity.kind.to_uppercase();
    match activity.status {
        Some(status) => format!(
            "[WEBVIEW] {kind} response from: {} - status: {status}",
            activity.url
        ),
        None => format!("[WEBVIEW] {kind} request to: {}", activity.url),
    }
}
