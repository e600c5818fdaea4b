// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

//! URL normalization.

use crate::error::{NavigatorError, Result};
use url::Url;

const SCHEME_DELIMITER: &str = "://";

/// Prepends the `http://` scheme to a URL that lacks one. Fails if a scheme
/// other than `http` is given or if the URL carries several schemes.
///
/// ```
/// use halnav::uri::normalize;
///
/// assert_eq!(normalize("www.example.com").unwrap(), "http://www.example.com");
/// assert_eq!(normalize("http://example.com").unwrap(), "http://example.com");
/// assert!(normalize("ftp://example.com").is_err());
/// ```
pub fn normalize(url: &str) -> Result<String> {
    let parts: Vec<&str> = url.split(SCHEME_DELIMITER).collect();

    match parts.as_slice() {
        [_] => Ok(format!("http{}{}", SCHEME_DELIMITER, url)),
        ["http", _] => Ok(url.to_string()),
        [scheme, _] => Err(NavigatorError::UnsupportedScheme(scheme.to_string()).into()),
        _ => Err(malformed(url, "too many schemes")),
    }
}

/// Parses an absolute URL and returns its canonical serialization, the form
/// used as a cache key.
pub fn canonical(url: &str) -> Result<String> {
    Url::parse(url)
        .map(Url::into_string)
        .map_err(|err| malformed(url, err))
}

/// Resolves a possibly relative `href` against `base`.
pub fn join(base: &str, href: &str) -> Result<String> {
    let base = Url::parse(base).map_err(|err| malformed(base, err))?;

    base.join(href)
        .map(Url::into_string)
        .map_err(|err| malformed(href, err))
}

/// The path, query and fragment of `url`, or `url` itself when it cannot be
/// parsed.
pub fn relative(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let mut relative = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                relative.push('?');
                relative.push_str(query);
            }
            if let Some(fragment) = parsed.fragment() {
                relative.push('#');
                relative.push_str(fragment);
            }
            relative
        }
        Err(_) => url.to_string(),
    }
}

fn malformed(url: &str, reason: impl ToString) -> failure::Error {
    NavigatorError::MalformedUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(err: failure::Error) -> NavigatorError {
        err.downcast::<NavigatorError>()
            .expect("Expect a navigator error")
    }

    mod normalize {
        use super::*;

        #[test]
        fn prepends_http_once() {
            for url in &["www.example.com", "example.com/path", "localhost:8080/"] {
                let actual = normalize(url).expect("Expect a valid url");

                assert_eq!(actual, format!("http://{}", url));
                assert_eq!(normalize(&actual).expect("Expect a valid url"), actual);
            }
        }

        #[test]
        fn keeps_http_urls() {
            let input = "http://example.com/a?b=c";

            assert_eq!(normalize(input).expect("Expect a valid url"), input);
        }

        #[test]
        fn rejects_other_schemes() {
            for url in &["https://example.com", "ftp://example.com", "file:///tmp"] {
                let actual = kind(normalize(url).unwrap_err());

                match actual {
                    NavigatorError::UnsupportedScheme(_) => (),
                    other => panic!("Unexpected error {:?}", other),
                }
            }
        }

        #[test]
        fn rejects_several_schemes() {
            let actual = kind(normalize("http://http://example.com").unwrap_err());

            assert_eq!(
                actual,
                NavigatorError::MalformedUrl {
                    url: "http://http://example.com".into(),
                    reason: "too many schemes".into(),
                }
            );
        }
    }

    #[test]
    fn canonical_adds_root_path() {
        let actual = canonical("http://www.example.com").expect("Expect a valid url");

        assert_eq!(actual, "http://www.example.com/");
    }

    #[test]
    fn canonical_rejects_relative_urls() {
        let actual = kind(canonical("/relative").unwrap_err());

        match actual {
            NavigatorError::MalformedUrl { url, .. } => assert_eq!(url, "/relative"),
            other => panic!("Unexpected error {:?}", other),
        }
    }

    #[test]
    fn join_relative_and_absolute() {
        let base = "http://example.com/api/index";

        assert_eq!(join(base, "users").unwrap(), "http://example.com/api/users");
        assert_eq!(join(base, "/users").unwrap(), "http://example.com/users");
        assert_eq!(
            join(base, "http://other.org/x").unwrap(),
            "http://other.org/x"
        );
    }

    #[test]
    fn relative_strips_origin() {
        assert_eq!(relative("http://example.com/a/b?c=d"), "/a/b?c=d");
        assert_eq!(relative("not a url"), "not a url");
    }
}
