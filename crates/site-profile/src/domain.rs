use url::Url;

pub const DEFAULT_DOMAIN: &str = "default";

/// Filesystem-safe profile key for the host of `url`.
///
/// Any character outside `[a-z0-9.-]` (case-insensitive) becomes `_`. Plans
/// without a navigable URL share the `default` profile.
pub fn domain_key(url: Option<&str>) -> String {
    let Some(host) = url
        .and_then(|raw| Url::parse(raw).ok())
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
    else {
        return DEFAULT_DOMAIN.to_string();
    };

    host.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_host_of_first_navigation() {
        assert_eq!(domain_key(Some("https://app.example.com:8443/login?x=1")), "app.example.com");
    }

    #[test]
    fn sanitizes_ipv6_hosts() {
        assert_eq!(domain_key(Some("http://[::1]:3000/")), "___1_");
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(domain_key(None), "default");
        assert_eq!(domain_key(Some("not a url")), "default");
        assert_eq!(domain_key(Some("data:text/plain,hi")), "default");
    }
}
