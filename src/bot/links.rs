use reqwest::Url;

use crate::config::settings::ConnectionConfig;
use crate::error::AppError;

/// Characters left as-is in app import links besides ASCII alphanumerics.
const IMPORT_LINK_SAFE: &[u8] = b":/?&=#@._-~";

pub fn client_link(connection: &ConnectionConfig, token: &str) -> String {
    connection.link_template.replace("{token}", token)
}

/// Deep link that makes the VPN app import `link`.
pub fn import_deep_link(connection: &ConnectionConfig, link: &str) -> String {
    let mut out = String::with_capacity(connection.import_scheme.len() + link.len());
    out.push_str(&connection.import_scheme);
    for &b in link.as_bytes() {
        if b.is_ascii_alphanumeric() || IMPORT_LINK_SAFE.contains(&b) {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Public page showing the user's config, with the link passed as a query parameter.
pub fn miniapp_url(base_url: &str, user_id: i64, link: &str) -> Result<String, AppError> {
    let raw = format!("{}/u/{}", base_url.trim_end_matches('/'), user_id);
    let mut url = Url::parse(&raw)
        .map_err(|e| AppError::Config(format!("invalid miniapp base_url {base_url:?}: {e}")))?;
    url.query_pairs_mut().append_pair("config", link);
    Ok(url.into())
}
