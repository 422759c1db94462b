use std::time::Duration;

use collections_shared::{CollectionsError, Result};
use reqwest::Client;
use url::Url;

/// Maximum number of redirects to follow (sheet exports redirect once or twice).
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for source downloads.
const USER_AGENT: &str = concat!("program-collections/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by the remote sources.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| CollectionsError::Network(format!("failed to build HTTP client: {e}")))
}

/// GET a URL and return its body as text. Non-2xx statuses are errors.
pub(crate) async fn fetch_text(client: &Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| CollectionsError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CollectionsError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| CollectionsError::Network(format!("{url}: failed to read body: {e}")))
}
