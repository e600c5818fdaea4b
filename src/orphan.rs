// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

use crate::error::{NavigatorError, Result};
use crate::link::Links;
use crate::navigator::{hal_state, Navigator, Resolved};
use crate::transport::Response;
use http::{HeaderMap, StatusCode};
use log::debug;
use serde_json::{Map, Value};

/// The response to a write that did not point at another resource.
///
/// It cannot be fetched. Its state is the response body when that is a JSON
/// object and an empty object otherwise; its links resolve against the
/// navigator the write was issued from.
#[derive(Debug)]
pub struct Orphan {
    parent: Navigator,
    status: StatusCode,
    headers: HeaderMap,
    state: Value,
    links: Links,
}

impl Orphan {
    pub(crate) fn new(parent: Navigator, response: Response) -> Orphan {
        let document: Value = serde_json::from_slice(&response.body)
            .unwrap_or_else(|_| Value::Object(Map::new()));

        let state = hal_state(&document).unwrap_or_else(|| Value::Object(Map::new()));
        let links = Links::from_document(&document).unwrap_or_else(|err| {
            debug!("ignoring links of {} response: {}", response.status, err);
            Links::default()
        });

        Orphan {
            parent,
            status: response.status,
            headers: response.headers,
            state,
            links,
        }
    }

    /// The navigator the write was issued from.
    pub fn parent(&self) -> &Navigator {
        &self.parent
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A copy of the state.
    pub fn state(&self) -> Value {
        self.state.clone()
    }

    pub fn links(&self) -> Result<Vec<(String, Resolved)>> {
        let base = self.parent.uri();

        self.links
            .iter()
            .map(|(rel, relation)| {
                Navigator::materialize(self.parent.core_rc(), &base, relation.clone())
                    .map(|resolved| (rel.clone(), resolved))
            })
            .collect()
    }

    pub fn resolve(&self, rel: &str) -> Result<Resolved> {
        let (_, relation) = self
            .links
            .find(rel, self.parent.core().default_curie())
            .ok_or_else(|| NavigatorError::LinkNotFound {
                rel: rel.to_string(),
                uri: self.parent.uri(),
            })?;

        Navigator::materialize(self.parent.core_rc(), &self.parent.uri(), relation.clone())
    }

    pub fn follow(&self, rel: &str) -> Result<Navigator> {
        match self.resolve(rel)? {
            Resolved::One(navigator) => Ok(navigator),
            Resolved::Many(_) => Err(NavigatorError::MultipleLinks {
                rel: rel.to_string(),
                uri: self.parent.uri(),
            }
            .into()),
        }
    }
}
