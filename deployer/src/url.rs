use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

use url::ParseError;

/// An endpoint url that may carry credentials (api keys in the path or query, basic auth).
///
/// Sensitive urls only show their scheme and host when formatted, so they can be logged safely.
#[derive(Hash, PartialEq, Eq, Clone)]
pub struct Url {
    inner: url::Url,
    is_sensitive: bool,
}

impl Deref for Url {
    type Target = url::Url;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Url {
    pub fn new_sensitive(s: &str) -> Result<Self, ParseError> {
        url::Url::parse(s.trim()).map(|inner| Self {
            inner,
            is_sensitive: true,
        })
    }

    pub fn new_non_sensitive(s: &str) -> Result<Self, ParseError> {
        url::Url::parse(s.trim()).map(|inner| Self {
            inner,
            is_sensitive: false,
        })
    }

    pub fn to_standard_url(&self) -> url::Url {
        self.inner.clone()
    }

    fn redacted(&self) -> String {
        match self.inner.host_str() {
            Some(host) => format!("{}://{}/[REDACTED]", self.inner.scheme(), host),
            None => "[REDACTED]".to_string(),
        }
    }
}

impl Display for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_sensitive {
            f.write_str(&self.redacted())
        } else {
            f.write_str(self.inner.as_str())
        }
    }
}

impl Debug for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::Url;

    #[test]
    fn sensitive_url_should_only_show_scheme_and_host() {
        let url = Url::new_sensitive("https://eth-mainnet.g.alchemy.com/v2/secret-api-key").unwrap();

        assert_eq!(url.to_string(), "https://eth-mainnet.g.alchemy.com/[REDACTED]");
        assert_eq!(format!("{url:?}"), "https://eth-mainnet.g.alchemy.com/[REDACTED]");
        assert_eq!(url.path(), "/v2/secret-api-key");
    }

    #[test]
    fn non_sensitive_url_should_be_shown_in_full() {
        let url = Url::new_non_sensitive("http://localhost:8545").unwrap();

        assert_eq!(url.to_string(), "http://localhost:8545/");
    }

    #[test]
    fn invalid_url_should_fail_to_parse() {
        assert!(Url::new_sensitive("not a url").is_err());
    }
}
