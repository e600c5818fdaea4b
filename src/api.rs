// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

//! Per-API shared state and the builder for root navigators.

use crate::cache::ResourceCache;
use crate::error::{NavigatorError, Result};
use crate::navigator::Navigator;
use crate::transport::{self, Auth, Request, Response, Transport};
use crate::uri;
use http::header::{HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use http::{HeaderMap, Method};
use log::debug;
use std::cell::RefCell;
use std::convert::TryFrom;
use std::rc::Rc;
use url::Url;

pub const DEFAULT_ACCEPT: &str = "application/hal+json,application/json";

pub fn user_agent() -> String {
    format!("HALNavigator/{}", env!("CARGO_PKG_VERSION"))
}

/// State shared by every navigator reached from one root.
pub struct ApiCore {
    root: String,
    name: String,
    default_curie: Option<String>,
    headers: RefCell<HeaderMap>,
    auth: RefCell<Option<Auth>>,
    transport: Box<dyn Transport>,
    cache: ResourceCache,
}

impl ApiCore {
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_curie(&self) -> Option<&str> {
        self.default_curie.as_ref().map(String::as_str)
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// The headers sent with every request.
    pub fn headers(&self) -> HeaderMap {
        self.headers.borrow().clone()
    }

    /// Sets a header sent with every request, replacing any previous value.
    pub fn set_header<K, V>(&self, name: K, value: V) -> Result<()>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let (name, value) = transport::header(name, value)?;
        self.headers.borrow_mut().insert(name, value);

        Ok(())
    }

    pub fn authenticate(&self, auth: Option<Auth>) {
        *self.auth.borrow_mut() = auth;
    }

    /// Sends a request with the API headers, overridden by `headers`.
    pub(crate) fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        let mut request_headers = self.headers();
        request_headers.extend(headers);

        debug!("{} {}", method, url);

        let request = Request {
            method,
            url: url.to_string(),
            headers: request_headers,
            body,
            auth: self.auth.borrow().clone(),
        };

        self.transport.send(&request).map_err(|err| {
            NavigatorError::Transport {
                uri: url.to_string(),
                message: err.to_string(),
            }
            .into()
        })
    }
}

/// Configures an API and builds its root navigator.
///
/// ```no_run
/// use halnav::ApiBuilder;
///
/// let root = ApiBuilder::new("api.example.com")
///     .name("example")
///     .default_curie("ex")
///     .header("X-Client", "docs")
///     .build()
///     .unwrap();
///
/// for page in root.select("orders").unwrap().one().unwrap().pages() {
///     println!("{}", page.unwrap().uri());
/// }
/// ```
pub struct ApiBuilder {
    root: String,
    name: Option<String>,
    default_curie: Option<String>,
    headers: HeaderMap,
    auth: Option<Auth>,
    transport: Option<Box<dyn Transport>>,
    error: Option<failure::Error>,
}

impl ApiBuilder {
    /// `root` may omit the scheme, in which case `http://` is assumed.
    pub fn new(root: impl Into<String>) -> ApiBuilder {
        ApiBuilder {
            root: root.into(),
            name: None,
            default_curie: None,
            headers: HeaderMap::new(),
            auth: None,
            transport: None,
            error: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> ApiBuilder {
        self.name = Some(name.into());
        self
    }

    /// A curie prefix tried for relations given without one.
    pub fn default_curie(mut self, curie: impl Into<String>) -> ApiBuilder {
        self.default_curie = Some(curie.into());
        self
    }

    /// Adds a header sent with every request. An invalid name or value makes
    /// [`ApiBuilder::build`] fail.
    pub fn header<K, V>(mut self, name: K, value: V) -> ApiBuilder
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        match transport::header(name, value) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> ApiBuilder {
        self.headers.extend(headers);
        self
    }

    pub fn auth(mut self, auth: Auth) -> ApiBuilder {
        self.auth = Some(auth);
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> ApiBuilder {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn build(self) -> Result<Navigator> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let root = uri::canonical(&uri::normalize(&self.root)?)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&root)?,
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(USER_AGENT, HeaderValue::from_str(&user_agent())?);
        headers.extend(self.headers);

        let core = ApiCore {
            name: self.name.unwrap_or_else(|| namify(&root)),
            root,
            default_curie: self.default_curie,
            headers: RefCell::new(headers),
            auth: RefCell::new(self.auth),
            transport,
            cache: ResourceCache::new(),
        };

        debug!("API {} rooted at {}", core.name, core.root);

        Ok(Navigator::root(Rc::new(core)))
    }
}

#[cfg(feature = "client")]
fn default_transport(_root: &str) -> Result<Box<dyn Transport>> {
    Ok(Box::new(crate::transport::HttpTransport::new()?))
}

#[cfg(not(feature = "client"))]
fn default_transport(root: &str) -> Result<Box<dyn Transport>> {
    Err(NavigatorError::Transport {
        uri: root.to_string(),
        message: "no transport configured; enable the `client` feature or set one".to_string(),
    }
    .into())
}

/// A short name for the API at `root`: the host without `www.` and without
/// its top-level domain.
fn namify(root: &str) -> String {
    let host = Url::parse(root)
        .ok()
        .and_then(|url| url.host_str().map(String::from))
        .unwrap_or_default();

    let labels: Vec<&str> = host
        .split('.')
        .filter(|label| !label.is_empty() && *label != "www")
        .collect();

    if labels.iter().all(|label| label.chars().all(|c| c.is_ascii_digit())) {
        return host;
    }

    match labels.len() {
        0 => host,
        1 => labels[0].to_string(),
        n => labels[..n - 1].join("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockServer;

    #[test]
    fn namify_hosts() {
        assert_eq!(namify("http://www.example.com/"), "example");
        assert_eq!(namify("http://api.example.com/v1"), "api.example");
        assert_eq!(namify("http://localhost:8080/"), "localhost");
        assert_eq!(namify("http://127.0.0.1/"), "127.0.0.1");
    }

    #[test]
    fn build_normalizes_root() {
        let root = ApiBuilder::new("www.example.com")
            .transport(MockServer::new())
            .build()
            .expect("Expect a root navigator");

        assert_eq!(root.uri(), "http://www.example.com/");
        assert_eq!(root.api_name(), "example");
        assert!(root.core().cache().contains("http://www.example.com/"));
    }

    #[test]
    fn build_rejects_other_schemes() {
        let actual = ApiBuilder::new("https://www.example.com")
            .transport(MockServer::new())
            .build()
            .err()
            .expect("Expect an error");

        assert_eq!(
            NavigatorError::of(&actual),
            Some(&NavigatorError::UnsupportedScheme("https".into()))
        );
    }

    #[test]
    fn default_headers_can_be_overridden() {
        let root = ApiBuilder::new("http://example.com")
            .name("exampleAPI")
            .header("Accept", "application/json")
            .header("X-Trace", "1")
            .transport(MockServer::new())
            .build()
            .expect("Expect a root navigator");

        let headers = root.core().headers();

        assert_eq!(root.api_name(), "exampleAPI");
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers["x-trace"], "1");
        assert_eq!(headers[USER_AGENT], user_agent().as_str());
    }

    #[test]
    fn invalid_header_fails_the_build() {
        let actual = ApiBuilder::new("http://example.com")
            .header("X-Bad", "line\nbreak")
            .transport(MockServer::new())
            .build();

        assert!(actual.is_err());
    }

    #[test]
    fn session_headers_can_be_set_later() {
        let root = ApiBuilder::new("http://example.com")
            .transport(MockServer::new())
            .build()
            .expect("Expect a root navigator");

        root.core()
            .set_header("Accept", "application/json")
            .expect("Expect a valid header");

        assert_eq!(root.core().headers()[ACCEPT], "application/json");
        assert!(root.core().set_header("bad name", "1").is_err());
    }

    #[test]
    fn requests_carry_headers_and_auth() {
        let server = MockServer::new();
        let root = ApiBuilder::new("http://example.com")
            .auth(Auth::Bearer("token".into()))
            .transport(server.clone())
            .build()
            .expect("Expect a root navigator");

        let mut extra = HeaderMap::new();
        extra.insert("x-once", HeaderValue::from_static("yes"));
        let _ = root.core().send(Method::GET, "http://example.com/", extra, None);

        let request = server.requests().pop().expect("Expect a request");
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.headers[ACCEPT], DEFAULT_ACCEPT);
        assert_eq!(request.headers["x-once"], "yes");
        assert_eq!(request.auth, Some(Auth::Bearer("token".into())));
    }

    #[test]
    fn transport_failures_are_wrapped() {
        let root = ApiBuilder::new("http://example.com")
            .transport(MockServer::new())
            .build()
            .expect("Expect a root navigator");

        let actual = root
            .core()
            .send(Method::GET, "http://example.com/", HeaderMap::new(), None)
            .expect_err("Expect a transport error");

        match NavigatorError::of(&actual) {
            Some(NavigatorError::Transport { uri, .. }) => assert_eq!(uri, "http://example.com/"),
            other => panic!("Unexpected error {:?}", other),
        }
    }
}
