//! Network URL constants for the Deriv SDK.

/// Default WebSocket URL for the Deriv API.
pub const DEFAULT_WS_URL: &str = "wss://ws.derivws.com/websockets/v3";

/// Build the connection URL for `endpoint`, adding `app_id` and, when given,
/// the response language.
pub fn endpoint_url(endpoint: &str, app_id: &str, language: Option<&str>) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    let mut url = format!(
        "{}{}app_id={}",
        endpoint,
        separator,
        urlencoding::encode(app_id)
    );
    if let Some(lang) = language {
        url.push_str("&l=");
        url.push_str(&urlencoding::encode(&lang.to_uppercase()));
    }
    url
}
