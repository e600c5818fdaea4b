// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

use crate::error::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const SELF_REL: &str = "self";
const CURIES_REL: &str = "curies";

/// A HAL link object.
///
/// `href` and `templated` are lifted out of the object; `title` too since
/// navigators expose it. Every other member (`name`, `type`, `profile`,
/// `deprecation`, ...) is kept verbatim in `properties`.
///
/// ```
/// use halnav::link::Link;
/// use serde_json::json;
///
/// let link = Link::from_json("ht:users", &json!({
///     "href": "/users{?page}",
///     "templated": true,
///     "title": "Users",
///     "profile": "http://example.com/profiles/user",
/// })).unwrap();
///
/// assert_eq!(link.href, "/users{?page}");
/// assert!(link.templated);
/// assert_eq!(link.title.as_ref().map(String::as_str), Some("Users"));
/// assert_eq!(link.profile(), Some("http://example.com/profiles/user"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub rel: String,
    pub href: String,
    pub templated: bool,
    pub title: Option<String>,
    pub properties: Map<String, Value>,
}

impl Link {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Link {
        Link {
            rel: rel.into(),
            href: href.into(),
            templated: false,
            title: None,
            properties: Map::new(),
        }
    }

    pub fn from_json(rel: &str, value: &Value) -> Result<Link> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid(rel, "a link must be an object"))?;

        let mut link = Link::new(rel, "");

        for (key, member) in object {
            match key.as_str() {
                "href" => match member.as_str() {
                    Some(href) if !href.is_empty() => link.href = href.to_string(),
                    _ => return Err(invalid(rel, "href must be a non-empty string")),
                },

                "templated" => {
                    link.templated = member
                        .as_bool()
                        .ok_or_else(|| invalid(rel, "templated must be a boolean"))?
                }

                "title" => link.title = member.as_str().map(String::from),

                _ => {
                    link.properties.insert(key.clone(), member.clone());
                }
            }
        }

        if link.href.is_empty() {
            return Err(invalid(rel, "href is missing"));
        }

        Ok(link)
    }

    /// Overwrites title and properties with the members of `object`, as done
    /// with the `self` link of a freshly fetched document. `href` and
    /// `templated` are left alone.
    pub fn update(&mut self, object: &Map<String, Value>) {
        for (key, member) in object {
            match key.as_str() {
                "href" | "templated" => (),
                "title" => self.title = member.as_str().map(String::from),
                _ => {
                    self.properties.insert(key.clone(), member.clone());
                }
            }
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    fn property_str(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.property_str("name")
    }

    pub fn profile(&self) -> Option<&str> {
        self.property_str("profile")
    }

    /// The `type` member: a media type hint.
    pub fn media_type(&self) -> Option<&str> {
        self.property_str("type")
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.property_str("deprecation")
    }
}

/// The links under one relation: a single object or an array of them.
#[derive(Clone, Debug, PartialEq)]
pub enum Relation {
    One(Link),
    Many(Vec<Link>),
}

impl Relation {
    /// The links in declaration order.
    pub fn links(&self) -> Vec<&Link> {
        match self {
            Relation::One(link) => vec![link],
            Relation::Many(links) => links.iter().collect(),
        }
    }
}

/// The `_links` member of a HAL document.
///
/// `self` and `curies` are not relations one navigates to: the first is
/// kept apart as the document's own link, the second as a curie table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Links {
    relations: BTreeMap<String, Relation>,
    self_link: Option<Map<String, Value>>,
    curies: BTreeMap<String, String>,
}

impl Links {
    /// Reads `_links` from `document`. A document without `_links` has no
    /// links.
    pub fn from_document(document: &Value) -> Result<Links> {
        let mut links = Links::default();

        let members = match document.get("_links") {
            None | Some(Value::Null) => return Ok(links),
            Some(Value::Object(members)) => members,
            Some(_) => return Err(invalid("_links", "_links must be an object")),
        };

        for (rel, value) in members {
            match rel.as_str() {
                SELF_REL => {
                    links.self_link = value.as_object().cloned();
                }

                CURIES_REL => {
                    for curie in one_or_many(value) {
                        let curie = Link::from_json(CURIES_REL, curie)?;
                        let name = curie
                            .name()
                            .ok_or_else(|| invalid(CURIES_REL, "a curie must have a name"))?
                            .to_string();

                        links.curies.insert(name, curie.href);
                    }
                }

                _ => {
                    let relation = match value {
                        Value::Array(items) => Relation::Many(
                            items
                                .iter()
                                .map(|item| Link::from_json(rel, item))
                                .collect::<Result<Vec<Link>>>()?,
                        ),
                        _ => Relation::One(Link::from_json(rel, value)?),
                    };

                    links.relations.insert(rel.clone(), relation);
                }
            }
        }

        Ok(links)
    }

    /// Looks up `rel`. When it is absent, has no prefix and a default curie
    /// is given, `<curie>:<rel>` is tried as well. Returns the matching
    /// relation name alongside the relation.
    pub fn find(&self, rel: &str, default_curie: Option<&str>) -> Option<(&str, &Relation)> {
        if let Some((name, relation)) = self.relations.get_key_value(rel) {
            return Some((name.as_str(), relation));
        }

        match default_curie {
            Some(curie) if !rel.contains(':') => self
                .relations
                .get_key_value(&format!("{}:{}", curie, rel))
                .map(|(name, relation)| (name.as_str(), relation)),
            _ => None,
        }
    }

    pub fn get(&self, rel: &str) -> Option<&Relation> {
        self.relations.get(rel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Relation)> {
        self.relations.iter()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// The members of the document's `self` link.
    pub fn self_link(&self) -> Option<&Map<String, Value>> {
        self.self_link.as_ref()
    }

    /// Curie name to documentation href template.
    pub fn curies(&self) -> &BTreeMap<String, String> {
        &self.curies
    }
}

fn one_or_many(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        _ => vec![value],
    }
}

fn invalid(rel: &str, reason: &str) -> failure::Error {
    format_err!("link {:?}: {}", rel, reason)
}
