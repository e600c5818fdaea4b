// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

//! Navigators: lazy handles on the resources of a HAL API.

use crate::api::ApiCore;
use crate::error::{NavigatorError, Result};
use crate::link::{Link, Links, Relation};
use crate::orphan::Orphan;
use crate::selector::{Expression, IndexArgs, Selector};
use crate::template::Template;
use crate::transport::{header_str, Auth, Response};
use crate::uri;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, Method, StatusCode};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use std::rc::Rc;

const DEFAULT_CONTENT_TYPE: &str = "application/hal+json";

/// Write responses whose `Location` header names the affected resource.
const LOCATED: [StatusCode; 4] = [
    StatusCode::CREATED,
    StatusCode::NO_CONTENT,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    Unfetched,
    Fetched,
    /// The last fetch failed. Whatever was fetched before is kept.
    Error,
}

impl Default for FetchStatus {
    fn default() -> FetchStatus {
        FetchStatus::Unfetched
    }
}

/// Status and headers of the last response.
#[derive(Clone, Debug)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

#[derive(Default)]
struct Fetch {
    status: FetchStatus,
    response: Option<ResponseMeta>,
    state: Option<Value>,
    links: Option<Links>,
}

/// The record shared by every navigator pointing at the same URL.
pub(crate) struct Resource {
    link: RefCell<Link>,
    /// URL a templated href is resolved against once expanded.
    base: String,
    templated: bool,
    fetch: RefCell<Fetch>,
}

impl Resource {
    pub(crate) fn concrete(link: Link) -> Resource {
        Resource {
            base: link.href.clone(),
            link: RefCell::new(link),
            templated: false,
            fetch: RefCell::new(Fetch::default()),
        }
    }

    fn templated(link: Link, base: &str) -> Resource {
        Resource {
            base: base.to_string(),
            link: RefCell::new(link),
            templated: true,
            fetch: RefCell::new(Fetch::default()),
        }
    }
}

/// What a relation resolves to.
#[derive(Clone, Debug)]
pub enum Resolved {
    One(Navigator),
    /// An array-valued relation, in declaration order.
    Many(Vec<Navigator>),
}

impl Resolved {
    pub fn one(self) -> Option<Navigator> {
        match self {
            Resolved::One(navigator) => Some(navigator),
            Resolved::Many(_) => None,
        }
    }

    pub fn into_vec(self) -> Vec<Navigator> {
        match self {
            Resolved::One(navigator) => vec![navigator],
            Resolved::Many(navigators) => navigators,
        }
    }
}

/// A request body for write operations.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl From<Value> for Body {
    fn from(value: Value) -> Body {
        Body::Json(value)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Body {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Body {
        Body::Text(text)
    }
}

/// The result of a write.
#[derive(Debug)]
pub enum Outcome {
    /// The server pointed at a resource with `Location`. It is not fetched.
    Located(Navigator),
    /// Any other successful response.
    Orphan(Orphan),
}

/// A handle on one resource of an API.
///
/// Navigators are cheap to clone. Two navigators for the same URL obtained
/// from the same API share their fetched state; [`Navigator::ptr_eq`] tells
/// whether they do.
///
/// A navigator fetches its resource the first time something needs it:
/// links, title, relation lookups. Templated navigators never fetch; they
/// must be expanded first.
#[derive(Clone)]
pub struct Navigator {
    core: Rc<ApiCore>,
    resource: Rc<Resource>,
}

impl Navigator {
    pub(crate) fn root(core: Rc<ApiCore>) -> Navigator {
        let url = core.root().to_string();
        let resource = Rc::new(Resource::concrete(Link::new("self", url.as_str())));

        core.cache().put(&url, resource.clone());

        Navigator { core, resource }
    }

    /// The cached navigator for the absolute `link.href`, created unfetched
    /// the first time.
    fn concrete(core: &Rc<ApiCore>, mut link: Link) -> Result<Navigator> {
        link.href = uri::canonical(&link.href)?;
        link.templated = false;

        let url = link.href.clone();
        let resource = core.cache().get_or_create(&url, || Resource::concrete(link));

        Ok(Navigator {
            core: core.clone(),
            resource,
        })
    }

    /// A navigator for `link` as found in a document at `base`.
    pub(crate) fn from_link(core: &Rc<ApiCore>, base: &str, link: Link) -> Result<Navigator> {
        if link.templated {
            return Ok(Navigator {
                core: core.clone(),
                resource: Rc::new(Resource::templated(link, base)),
            });
        }

        let mut link = link;
        link.href = uri::join(base, &link.href)?;

        Navigator::concrete(core, link)
    }

    pub(crate) fn materialize(
        core: &Rc<ApiCore>,
        base: &str,
        relation: Relation,
    ) -> Result<Resolved> {
        match relation {
            Relation::One(link) => Ok(Resolved::One(Navigator::from_link(core, base, link)?)),
            Relation::Many(links) => Ok(Resolved::Many(
                links
                    .into_iter()
                    .map(|link| Navigator::from_link(core, base, link))
                    .collect::<Result<Vec<Navigator>>>()?,
            )),
        }
    }

    /// Whether both navigators share the same resource record.
    pub fn ptr_eq(a: &Navigator, b: &Navigator) -> bool {
        Rc::ptr_eq(&a.resource, &b.resource)
    }

    pub fn core(&self) -> &ApiCore {
        &self.core
    }

    pub(crate) fn core_rc(&self) -> &Rc<ApiCore> {
        &self.core
    }

    /// The canonical URL, or the raw href of a templated navigator.
    pub fn uri(&self) -> String {
        self.resource.link.borrow().href.clone()
    }

    pub fn api_name(&self) -> &str {
        self.core.name()
    }

    pub fn is_templated(&self) -> bool {
        self.resource.templated
    }

    /// The navigator's own link, refreshed from the `self` link of every
    /// fetched document.
    pub fn link(&self) -> Link {
        self.resource.link.borrow().clone()
    }

    pub fn profile(&self) -> Option<String> {
        self.resource.link.borrow().profile().map(String::from)
    }

    /// The media type of the last response, or the `type` hint of the link.
    pub fn media_type(&self) -> Option<String> {
        self.resource.link.borrow().media_type().map(String::from)
    }

    /// The title of the resource. Fetches it unless templated.
    pub fn title(&self) -> Result<Option<String>> {
        if !self.is_templated() {
            self.ensure_fetched()?;
        }

        Ok(self.resource.link.borrow().title.clone())
    }

    pub fn fetch_status(&self) -> FetchStatus {
        self.resource.fetch.borrow().status
    }

    pub fn is_fetched(&self) -> bool {
        self.fetch_status() == FetchStatus::Fetched
    }

    /// Status code of the last successful fetch.
    pub fn status(&self) -> Option<StatusCode> {
        self.resource
            .fetch
            .borrow()
            .response
            .as_ref()
            .map(|response| response.status)
    }

    pub fn response(&self) -> Option<ResponseMeta> {
        self.resource.fetch.borrow().response.clone()
    }

    /// A copy of the last known state, without fetching.
    pub fn state(&self) -> Option<Value> {
        self.resource.fetch.borrow().state.clone()
    }

    /// Sets a header sent with every request of this API.
    pub fn set_header<K, V>(&self, name: K, value: V) -> Result<()>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.core.set_header(name, value)
    }

    pub fn authenticate(&self, auth: Option<Auth>) {
        self.core.authenticate(auth);
    }

    /// A navigator already known for `url`, if any.
    pub fn cached(&self, url: &str) -> Option<Navigator> {
        let url = uri::canonical(url).ok()?;

        self.core.cache().get(&url).map(|resource| Navigator {
            core: self.core.clone(),
            resource,
        })
    }

    /// Returns a copy of the state, fetching the resource first if needed.
    pub fn invoke(&self) -> Result<Value> {
        self.ensure_fetched()?;

        self.state().ok_or_else(|| {
            NavigatorError::MalformedResponse {
                uri: self.uri(),
                reason: "no state".to_string(),
            }
            .into()
        })
    }

    /// GETs the resource, replacing state and links, and returns a copy of
    /// the new state. A failed fetch leaves the previous data untouched.
    pub fn fetch(&self) -> Result<Value> {
        self.ensure_concrete()?;

        let uri = self.uri();
        let result = self
            .core
            .send(Method::GET, &uri, HeaderMap::new(), None)
            .and_then(|response| self.ingest(&uri, response));

        if let Err(err) = &result {
            warn!("fetching {} failed: {}", uri, err);
            self.resource.fetch.borrow_mut().status = FetchStatus::Error;
        }

        result
    }

    fn ensure_concrete(&self) -> Result<()> {
        if self.is_templated() {
            return Err(NavigatorError::AmbiguousNavigation(self.uri()).into());
        }

        Ok(())
    }

    fn ensure_fetched(&self) -> Result<()> {
        self.ensure_concrete()?;

        if !self.is_fetched() {
            self.fetch()?;
        }

        Ok(())
    }

    fn ingest(&self, uri: &str, response: Response) -> Result<Value> {
        if !response.status.is_success() {
            return Err(http_status(uri, &response));
        }

        let content_type = header_str(&response.headers, CONTENT_TYPE).map(String::from);

        if let Some(content_type) = &content_type {
            if !is_json(content_type) {
                return Err(malformed(
                    uri,
                    format!("unexpected content type {}", content_type),
                ));
            }
        }

        let document: Value = serde_json::from_slice(&response.body)
            .map_err(|err| malformed(uri, format!("not valid JSON: {}", err)))?;

        let state = hal_state(&document).ok_or_else(|| malformed(uri, "not a JSON object"))?;
        let links = Links::from_document(&document).map_err(|err| malformed(uri, err))?;

        {
            let mut link = self.resource.link.borrow_mut();
            if let Some(self_link) = links.self_link() {
                link.update(self_link);
            }
            link.properties.insert(
                "type".to_string(),
                Value::String(content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())),
            );
        }

        debug!("fetched {} with {} relations", uri, links.len());

        let mut fetch = self.resource.fetch.borrow_mut();
        fetch.status = FetchStatus::Fetched;
        fetch.response = Some(ResponseMeta {
            status: response.status,
            headers: response.headers,
        });
        fetch.state = Some(state.clone());
        fetch.links = Some(links);

        Ok(state)
    }

    fn with_links<T>(&self, f: impl FnOnce(&Links) -> T) -> Result<T> {
        self.ensure_fetched()?;

        let fetch = self.resource.fetch.borrow();
        let links = fetch.links.as_ref().ok_or_else(|| {
            NavigatorError::AmbiguousNavigation(self.uri())
        })?;

        Ok(f(links))
    }

    /// Every relation of the resource, resolved. Fetches if needed.
    pub fn links(&self) -> Result<BTreeMap<String, Resolved>> {
        let relations: Vec<(String, Relation)> = self.with_links(|links| {
            links
                .iter()
                .map(|(rel, relation)| (rel.clone(), relation.clone()))
                .collect()
        })?;

        let base = self.uri();
        let mut resolved = BTreeMap::new();

        for (rel, relation) in relations {
            resolved.insert(rel, Navigator::materialize(&self.core, &base, relation)?);
        }

        Ok(resolved)
    }

    /// Curie name to documentation href template. Fetches if needed.
    pub fn curies(&self) -> Result<BTreeMap<String, String>> {
        self.with_links(|links| links.curies().clone())
    }

    /// The documentation URL of a curied relation such as `ea:find`.
    /// Relations without a known prefix are returned unchanged.
    pub fn docs_for(&self, rel: &str) -> Result<String> {
        let curies = self.curies()?;
        let mut parts = rel.splitn(2, ':');

        match (parts.next(), parts.next()) {
            (Some(prefix), Some(name)) if curies.contains_key(prefix) => {
                let template = Template::parse(&curies[prefix])?;
                let mut variables = BTreeMap::new();
                variables.insert("rel".to_string(), name.to_string());

                uri::join(&self.uri(), &template.expand(&variables))
            }
            _ => Ok(rel.to_string()),
        }
    }

    /// Resolves `rel` against the links of the resource, fetching it first
    /// if needed.
    pub fn resolve(&self, rel: &str) -> Result<Resolved> {
        let relation = self.with_links(|links| {
            links
                .find(rel, self.core.default_curie())
                .map(|(_, relation)| relation.clone())
        })?;

        let relation = relation.ok_or_else(|| NavigatorError::LinkNotFound {
            rel: rel.to_string(),
            uri: self.uri(),
        })?;

        Navigator::materialize(&self.core, &self.uri(), relation)
    }

    /// Resolves `rel` to a single navigator.
    pub fn follow(&self, rel: &str) -> Result<Navigator> {
        match self.resolve(rel)? {
            Resolved::One(navigator) => Ok(navigator),
            Resolved::Many(_) => Err(NavigatorError::MultipleLinks {
                rel: rel.to_string(),
                uri: self.uri(),
            }
            .into()),
        }
    }

    /// The variables of a templated navigator, empty otherwise.
    pub fn variables(&self) -> Result<Vec<String>> {
        if !self.is_templated() {
            return Ok(vec![]);
        }

        Ok(Template::parse(&self.uri())?.variables().to_vec())
    }

    /// Expands a templated navigator into the cached navigator for the
    /// resulting URL. Variables left out are omitted from the URL.
    ///
    /// ```
    /// # use halnav::Navigator;
    /// # fn example(first: &Navigator) -> halnav::error::Result<()> {
    /// let page = first.expand(vec![("page", 0), ("max", 10)])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn expand<I, K, V>(&self, variables: I) -> Result<Navigator>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        if !self.is_templated() {
            return Err(NavigatorError::NotTemplated(self.uri()).into());
        }

        let variables: BTreeMap<String, String> = variables
            .into_iter()
            .map(|(name, value)| (name.into(), value.to_string()))
            .collect();

        let template = Template::parse(&self.uri())?;
        let expanded = template.expand(&variables);

        let mut link = self.link();
        link.href = uri::join(&self.resource.base, &expanded)?;

        debug!("expanded {} into {}", template.as_str(), link.href);

        Navigator::concrete(&self.core, link)
    }

    /// Selects with an index expression given as typed selectors.
    ///
    /// With a relation, it is resolved first. A templated target is then
    /// expanded when variables or a completion marker were given.
    pub fn get(&self, selectors: &[Selector]) -> Result<Resolved> {
        self.index(IndexArgs::new(selectors).expression()?)
    }

    /// Selects with a textual index expression, e.g. `"first, page:0"`.
    pub fn select(&self, expression: &str) -> Result<Resolved> {
        self.index(IndexArgs::parse(expression)?.expression()?)
    }

    fn index(&self, expression: Expression) -> Result<Resolved> {
        let target = match &expression.rel {
            Some(rel) => self.resolve(rel)?,
            None => Resolved::One(self.clone()),
        };

        if !expression.expands() {
            return Ok(target);
        }

        let navigator = match target {
            Resolved::One(navigator) => navigator,
            Resolved::Many(_) => {
                return Err(NavigatorError::MultipleLinks {
                    rel: expression.rel.unwrap_or_default(),
                    uri: self.uri(),
                }
                .into())
            }
        };

        if navigator.is_templated() {
            return navigator.expand(expression.variables).map(Resolved::One);
        }

        if !expression.variables.is_empty() {
            return Err(NavigatorError::NotTemplated(navigator.uri()).into());
        }

        Ok(Resolved::One(navigator))
    }

    /// Yields this navigator, then follows `rel` from each navigator yielded
    /// until a resource lacks it.
    pub fn iter_rel(&self, rel: impl Into<String>) -> RelIter {
        RelIter {
            current: Some(self.clone()),
            started: false,
            rel: rel.into(),
        }
    }

    /// This navigator and the ones reached through `next` links.
    pub fn pages(&self) -> RelIter {
        self.iter_rel("next")
    }

    /// POSTs `body` to create a subordinate resource.
    ///
    /// JSON bodies are sent as `application/json` unless
    /// [`Navigator::create_with_headers`] sets another `Content-Type`. Text
    /// bodies are sent without one.
    pub fn create(&self, body: impl Into<Body>) -> Result<Outcome> {
        self.request(Method::POST, Some(body.into()), HeaderMap::new())
    }

    pub fn create_with_headers(&self, body: impl Into<Body>, headers: HeaderMap) -> Result<Outcome> {
        self.request(Method::POST, Some(body.into()), headers)
    }

    /// PUTs `body`, creating or replacing the resource. `Content-Type` is
    /// chosen as in [`Navigator::create`].
    pub fn upsert(&self, body: impl Into<Body>) -> Result<Outcome> {
        self.request(Method::PUT, Some(body.into()), HeaderMap::new())
    }

    pub fn upsert_with_headers(&self, body: impl Into<Body>, headers: HeaderMap) -> Result<Outcome> {
        self.request(Method::PUT, Some(body.into()), headers)
    }

    pub fn patch(&self, body: impl Into<Body>) -> Result<Outcome> {
        self.request(Method::PATCH, Some(body.into()), HeaderMap::new())
    }

    pub fn patch_with_headers(&self, body: impl Into<Body>, headers: HeaderMap) -> Result<Outcome> {
        self.request(Method::PATCH, Some(body.into()), headers)
    }

    pub fn delete(&self) -> Result<Outcome> {
        self.request(Method::DELETE, None, HeaderMap::new())
    }

    pub fn delete_with_headers(&self, headers: HeaderMap) -> Result<Outcome> {
        self.request(Method::DELETE, None, headers)
    }

    fn request(&self, method: Method, body: Option<Body>, headers: HeaderMap) -> Result<Outcome> {
        self.ensure_concrete()?;

        let mut headers = headers;
        let body = match body {
            Some(Body::Json(value)) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(serde_json::to_vec(&value)?)
            }
            Some(Body::Text(text)) => Some(text.into_bytes()),
            None => None,
        };

        let uri = self.uri();
        let response = self.core.send(method.clone(), &uri, headers, body)?;

        let location = if LOCATED.contains(&response.status) {
            header_str(&response.headers, LOCATION).map(String::from)
        } else {
            None
        };

        if let Some(location) = location {
            let location = uri::join(&uri, &location)?;
            debug!("{} {} located {}", method, uri, location);

            return Navigator::concrete(&self.core, Link::new("self", location))
                .map(Outcome::Located);
        }

        if !response.status.is_success() {
            return Err(http_status(&uri, &response));
        }

        Ok(Outcome::Orphan(Orphan::new(self.clone(), response)))
    }
}

/// Navigators are equal when they point at the same URL of the same API.
impl PartialEq for Navigator {
    fn eq(&self, other: &Navigator) -> bool {
        self.uri() == other.uri() && self.api_name() == other.api_name()
    }
}

impl fmt::Debug for Navigator {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Navigator")
            .field("api", &self.api_name())
            .field("uri", &self.uri())
            .field("templated", &self.is_templated())
            .field("status", &self.fetch_status())
            .finish()
    }
}

impl fmt::Display for Navigator {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let path = if self.is_templated() {
            self.uri()
        } else {
            uri::relative(&self.uri())
        };

        write!(formatter, "Navigator({}{})", self.api_name(), path)
    }
}

/// Iterator over the navigators reached by following one relation over and
/// over. Yields an error at most once, then stops.
pub struct RelIter {
    current: Option<Navigator>,
    started: bool,
    rel: String,
}

impl Iterator for RelIter {
    type Item = Result<Navigator>;

    fn next(&mut self) -> Option<Result<Navigator>> {
        if !self.started {
            self.started = true;
            return self.current.clone().map(Ok);
        }

        let current = self.current.take()?;

        match current.follow(&self.rel) {
            Ok(next) => {
                self.current = Some(next.clone());
                Some(Ok(next))
            }
            Err(err) => match NavigatorError::of(&err) {
                Some(NavigatorError::LinkNotFound { .. }) => None,
                _ => Some(Err(err)),
            },
        }
    }
}

/// The document without its `_links` member. `None` unless it is an object.
pub(crate) fn hal_state(document: &Value) -> Option<Value> {
    let object = document.as_object()?;

    let state: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| key.as_str() != "_links")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(Value::Object(state))
}

fn http_status(uri: &str, response: &Response) -> failure::Error {
    NavigatorError::HttpStatus {
        uri: uri.to_string(),
        status: response.status.as_u16(),
        reason: response.reason().to_string(),
    }
    .into()
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json" || essence.ends_with("+json")
}

fn malformed(uri: &str, reason: impl fmt::Display) -> failure::Error {
    NavigatorError::MalformedResponse {
        uri: uri.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
