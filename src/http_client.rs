use std::time::Duration;

use reqwest::ClientBuilder;

fn has_proxy_env() -> bool {
    [
        "HTTPS_PROXY",
        "https_proxy",
        "HTTP_PROXY",
        "http_proxy",
        "ALL_PROXY",
        "all_proxy",
    ]
    .iter()
    .any(|k| std::env::var(k).is_ok_and(|v| !v.trim().is_empty()))
}

fn should_bypass_proxy_impl(url: &str, no_proxy_hosts: &[String], proxy_env_present: bool) -> bool {
    if !proxy_env_present || no_proxy_hosts.is_empty() {
        return false;
    }

    let Ok(u) = reqwest::Url::parse(url) else {
        return false;
    };
    let Some(host) = u.host_str() else {
        return false;
    };

    // An entry matches the host itself and, when it starts with a dot, any subdomain.
    no_proxy_hosts.iter().map(|h| h.trim()).any(|h| {
        if let Some(suffix) = h.strip_prefix('.') {
            host == suffix || host.ends_with(h)
        } else {
            host.eq_ignore_ascii_case(h)
        }
    })
}

pub fn should_bypass_proxy_for_url(url: &str, no_proxy_hosts: &[String]) -> bool {
    should_bypass_proxy_impl(url, no_proxy_hosts, has_proxy_env())
}

pub fn maybe_disable_proxy(
    builder: ClientBuilder,
    url: &str,
    no_proxy_hosts: &[String],
) -> ClientBuilder {
    if should_bypass_proxy_for_url(url, no_proxy_hosts) {
        tracing::debug!("proxy disabled for {}", url);
        builder.no_proxy()
    } else {
        builder
    }
}

pub fn client_for_url_with_timeout(
    url: &str,
    timeout: Duration,
    no_proxy_hosts: &[String],
) -> Result<reqwest::Client, reqwest::Error> {
    let builder = reqwest::Client::builder().timeout(timeout);
    maybe_disable_proxy(builder, url, no_proxy_hosts).build()
}
