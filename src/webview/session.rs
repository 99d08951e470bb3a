use std::error::Error;
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, GetCookiesParams, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, GetNavigationHistoryParams, NavigateParams,
    NavigateToHistoryEntryParams, ReloadParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    AddBindingParams, EnableParams as RuntimeEnableParams, EventBindingCalled,
};
use futures::StreamExt;
use tokio::sync::Mutex;
use url::Url;

use crate::webview::netlog;
use crate::webview::{BrowserHost, NavigationDecision};

/// Issue the initial navigation without waiting for the load to finish.
/// The session resolves on presentation, and a first navigation that gets
/// intercepted and cancelled would wedge any waiting variant.
pub async fn navigate(
    page: &chromiumoxide::Page,
    url: &Url,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    page.execute(NavigateParams::new(url.to_string())).await?;
    Ok(())
}

/// Go back one history entry. Returns false, and navigates nowhere, when
/// already at the oldest entry.
pub async fn go_back(page: &chromiumoxide::Page) -> Result<bool, Box<dyn Error + Send + Sync>> {
    step_history(page, -1).await
}

/// Go forward one history entry. Returns false, and navigates nowhere,
/// when already at the newest entry.
pub async fn go_forward(page: &chromiumoxide::Page) -> Result<bool, Box<dyn Error + Send + Sync>> {
    step_history(page, 1).await
}

async fn step_history(
    page: &chromiumoxide::Page,
    offset: i64,
) -> Result<bool, Box<dyn Error + Send + Sync>> {
    let history = page.execute(GetNavigationHistoryParams::default()).await?;
    let target = history.result.current_index + offset;
    if target < 0 {
        return Ok(false);
    }
    let entry = match history.result.entries.get(target as usize) {
        Some(entry) => entry,
        None => return Ok(false),
    };
    page.execute(NavigateToHistoryEntryParams::new(entry.id))
        .await?;
    Ok(true)
}

/// Reload the current page, unconditionally.
pub async fn reload(page: &chromiumoxide::Page) -> Result<(), Box<dyn Error + Send + Sync>> {
    page.execute(ReloadParams::default()).await?;
    Ok(())
}

/// URL of the active navigation history entry.
pub async fn current_url(
    page: &chromiumoxide::Page,
) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
    let history = page.execute(GetNavigationHistoryParams::default()).await?;
    let index = history.result.current_index;
    if index < 0 {
        return Ok(None);
    }
    Ok(history
        .result
        .entries
        .get(index as usize)
        .map(|entry| entry.url.clone()))
}

/// Read the session cookies that apply to `url` and assemble them into a
/// `Cookie` request header value. `None` when the session has none.
pub async fn cookie_header(
    page: &chromiumoxide::Page,
    url: &Url,
) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
    let response = page
        .execute(GetCookiesParams::builder().url(url.to_string()).build())
        .await?;
    let pairs: Vec<String> = response
        .result
        .cookies
        .iter()
        .map(|cookie| format!("{}={}", cookie.name, cookie.value))
        .collect();
    Ok(join_cookie_pairs(&pairs))
}

/// Join `name=value` pairs into one header value.
pub fn join_cookie_pairs(pairs: &[String]) -> Option<String> {
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Install the network activity bridge: the page-world binding, the
/// wrapper script on every new document, and a task forwarding binding
/// payloads to the host.
pub async fn install_network_bridge(
    page: &chromiumoxide::Page,
    host: Arc<Mutex<dyn BrowserHost>>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    page.execute(RuntimeEnableParams::default()).await?;
    page.execute(AddBindingParams::new(netlog::BINDING_NAME))
        .await?;
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
        netlog::NETWORK_LOGGER_JS,
    ))
    .await?;

    let mut events = page.event_listener::<EventBindingCalled>().await?;
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if event.name != netlog::BINDING_NAME {
                continue;
            }
            host.lock().await.on_script_message(&event.payload);
        }
    });
    Ok(())
}

/// Pause every top-level document request and let the host decide its
/// fate: continue it into the page, or abort it because it became a
/// download job.
pub async fn install_download_interceptor(
    page: &chromiumoxide::Page,
    host: Arc<Mutex<dyn BrowserHost>>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    page.execute(
        FetchEnableParams::builder()
            .pattern(
                RequestPattern::builder()
                    .url_pattern("*")
                    .resource_type(ResourceType::Document)
                    .request_stage(RequestStage::Request)
                    .build(),
            )
            .build(),
    )
    .await?;

    let mut events = page.event_listener::<EventRequestPaused>().await?;
    let page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let decision = host.lock().await.on_navigate(&event.request.url);
            let request_id = event.request_id.clone();
            let resolved = match decision {
                NavigationDecision::Allow => page
                    .execute(ContinueRequestParams::new(request_id))
                    .await
                    .map(|_| ()),
                NavigationDecision::Cancel => page
                    .execute(FailRequestParams::new(request_id, ErrorReason::Aborted))
                    .await
                    .map(|_| ()),
            };
            if let Err(err) = resolved {
                eprintln!("[browser] could not resolve paused request: {err}");
            }
        }
    });
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn join_cookie_pairs_formats_a_header_value() {
        let pairs = vec!["session=abc".to_string(), "theme=dark".to_string()];
        assert_eq!(
            join_cookie_pairs(&pairs).as_deref(),
            Some("session=abc; theme=dark")
        );
        assert_eq!(
            join_cookie_pairs(&["one=1".to_string()]).as_deref(),
            Some("one=1")
        );
    }

    #[test]
    fn join_cookie_pairs_empty_is_none() {
        assert_eq!(join_cookie_pairs(&[]), None);
    }
}
