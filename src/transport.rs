// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

//! The HTTP side of navigation.
//!
//! Navigators never talk to the network themselves; they hand a [`Request`]
//! to a [`Transport`] and ingest the [`Response`]. Methods, headers and
//! status codes are the `http` crate types. The `client` feature (on by
//! default) provides [`HttpTransport`], a blocking `reqwest` client.

use crate::error::Result;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use std::convert::TryFrom;

/// Credentials sent along every request of an API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Auth {
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer(String),
}

/// Parses a header name and value, as given to [`crate::ApiBuilder::header`].
///
/// ```
/// use halnav::transport::header;
///
/// let (name, value) = header("X-Trace", "1").unwrap();
/// assert_eq!(name, "x-trace");
/// assert_eq!(value, "1");
///
/// assert!(header("bad name", "1").is_err());
/// ```
pub fn header<K, V>(name: K, value: V) -> Result<(HeaderName, HeaderValue)>
where
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
{
    let name = HeaderName::try_from(name).map_err(Into::<http::Error>::into)?;
    let value = HeaderValue::try_from(value).map_err(Into::<http::Error>::into)?;

    Ok((name, value))
}

/// The value of `name` when it is visible ASCII.
pub fn header_str<'a>(headers: &'a HeaderMap, name: HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub auth: Option<Auth>,
}

#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    /// The canonical reason phrase of the status code, empty when unknown.
    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or_default()
    }
}

/// Sends requests on behalf of navigators.
///
/// Retries, timeouts and connection handling are the transport's business;
/// any error it returns is surfaced to the caller as is.
pub trait Transport {
    fn send(&self, request: &Request) -> Result<Response>;
}

#[cfg(feature = "client")]
pub use self::client::HttpTransport;

#[cfg(feature = "client")]
mod client {
    use super::{Auth, Request, Response, Transport};
    use crate::error::Result;
    use log::debug;
    use reqwest::blocking::Client;
    use reqwest::redirect::Policy;
    use std::time::Duration;

    /// A blocking `reqwest` client that does not follow redirects, so that
    /// `Location` headers reach the navigator.
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        pub fn new() -> Result<HttpTransport> {
            let client = Client::builder().redirect(Policy::none()).build()?;

            Ok(HttpTransport { client })
        }

        pub fn with_timeout(timeout: Duration) -> Result<HttpTransport> {
            let client = Client::builder()
                .redirect(Policy::none())
                .timeout(timeout)
                .build()?;

            Ok(HttpTransport { client })
        }
    }

    impl Transport for HttpTransport {
        fn send(&self, request: &Request) -> Result<Response> {
            let mut builder = self
                .client
                .request(request.method.clone(), request.url.as_str())
                .headers(request.headers.clone());

            builder = match &request.auth {
                Some(Auth::Basic { username, password }) => {
                    builder.basic_auth(username, password.as_ref())
                }
                Some(Auth::Bearer(token)) => builder.bearer_auth(token),
                None => builder,
            };

            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let response = builder.send()?;
            let status = response.status();
            let headers = response.headers().clone();

            debug!("{} {} -> {}", request.method, request.url, status);

            Ok(Response {
                status,
                headers,
                body: response.bytes()?.to_vec(),
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::{header, Request, Response, Transport};
    use crate::error::Result;
    use http::header::CONTENT_TYPE;
    use http::{HeaderMap, HeaderValue, Method, StatusCode};
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    enum Route {
        Hal {
            links: Value,
            state: Value,
            title: Option<String>,
        },
        Raw(Response),
    }

    #[derive(Default)]
    struct Inner {
        routes: HashMap<(Method, String), Route>,
        requests: Vec<Request>,
    }

    /// An in-memory server. Clones share routes and the request log, so a
    /// test can keep one clone and hand the other to the navigator.
    #[derive(Clone, Default)]
    pub struct MockServer {
        inner: Rc<RefCell<Inner>>,
    }

    impl MockServer {
        pub fn new() -> MockServer {
            MockServer::default()
        }

        /// Serves a HAL document at `url`. The `self` link is filled in with
        /// the requested URL and `title`. Requests whose query does not
        /// match any route fall back to the route without query.
        pub fn register_hal(&self, url: &str, links: Value, state: Value, title: Option<&str>) {
            self.inner.borrow_mut().routes.insert(
                (Method::GET, url.to_string()),
                Route::Hal {
                    links,
                    state,
                    title: title.map(String::from),
                },
            );
        }

        pub fn register(&self, method: Method, url: &str, response: Response) {
            self.inner
                .borrow_mut()
                .routes
                .insert((method, url.to_string()), Route::Raw(response));
        }

        pub fn requests(&self) -> Vec<Request> {
            self.inner.borrow().requests.clone()
        }

        /// How many requests hit `url`, any method.
        pub fn hits(&self, url: &str) -> usize {
            self.inner
                .borrow()
                .requests
                .iter()
                .filter(|request| request.url == url)
                .count()
        }
    }

    pub fn response(status: u16, headers: &[(&str, &str)], body: &str) -> Response {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let (name, value) = header(*name, *value).expect("Expect a valid header");
            map.insert(name, value);
        }

        Response {
            status: StatusCode::from_u16(status).expect("Expect a valid status code"),
            headers: map,
            body: body.as_bytes().to_vec(),
        }
    }

    impl Transport for MockServer {
        fn send(&self, request: &Request) -> Result<Response> {
            let mut inner = self.inner.borrow_mut();
            inner.requests.push(request.clone());

            let without_query = request.url.split('?').next().unwrap_or_default();
            let route = inner
                .routes
                .get(&(request.method.clone(), request.url.clone()))
                .or_else(|| {
                    inner
                        .routes
                        .get(&(request.method.clone(), without_query.to_string()))
                });

            match route {
                Some(Route::Hal {
                    links,
                    state,
                    title,
                }) => {
                    let mut links = links.clone();
                    let mut self_link = json!({ "href": request.url });
                    if let Some(title) = title {
                        self_link["title"] = json!(title);
                    }
                    links["self"] = self_link;

                    let mut document = state.clone();
                    document["_links"] = links;

                    let mut headers = HeaderMap::new();
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/hal+json"));

                    Ok(Response {
                        status: StatusCode::OK,
                        headers,
                        body: document.to_string().into_bytes(),
                    })
                }
                Some(Route::Raw(response)) => Ok(response.clone()),
                None => Err(format_err!("connection refused: {}", request.url)),
            }
        }
    }
}
