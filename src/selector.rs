// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

//! Index expressions: which relation to follow and how to expand it.
//!
//! An expression is a list of selectors. It can be given as typed
//! [`Selector`] values or as text:
//!
//! ```text
//! first                  follow `first`
//! 'ht:users'             quote relation names that contain `:`
//! first, page:0, max:10  follow `first` and expand it with two variables
//! first, ...             follow `first` and expand it with no variables
//! page:0, :              expand the current navigator, select nothing further
//! ```

use crate::error::{NavigatorError, Result};
use log::trace;
use percent_encoding::percent_decode;
use pest::{iterators::Pair, Parser};
use std::collections::BTreeMap;
use std::fmt::{self, Display};

#[derive(Parser)]
#[grammar = "selector.pest"]
pub struct SelectorParser;

/// A single item of an index expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// A link relation name.
    Rel(String),
    /// A template variable assignment.
    Bind(String, String),
    /// Expand the target with whatever variables were collected.
    ExpandAll,
    /// Expand the target but select no relation.
    Stop,
}

impl Selector {
    pub fn rel(name: impl Into<String>) -> Selector {
        Selector::Rel(name.into())
    }

    /// A variable assignment. Any displayable value is accepted:
    ///
    /// ```
    /// use halnav::selector::Selector;
    ///
    /// assert_eq!(Selector::bind("page", 0), Selector::Bind("page".into(), "0".into()));
    /// ```
    pub fn bind(key: impl Into<String>, value: impl ToString) -> Selector {
        Selector::Bind(key.into(), value.to_string())
    }

    pub fn from_rule(pair: Pair<Rule>) -> Result<Selector> {
        match pair.as_rule() {
            Rule::expand_all => Ok(Selector::ExpandAll),

            Rule::stop => Ok(Selector::Stop),

            Rule::relation => Ok(Selector::Rel(text(pair)?)),

            Rule::binding => {
                let mut key = String::new();
                let mut value = String::new();

                for inner_pair in pair.into_inner() {
                    match inner_pair.as_rule() {
                        Rule::key => key = text(inner_pair)?,

                        Rule::value => value = text(inner_pair)?,

                        _ => unreachable!(),
                    }
                }

                Ok(Selector::Bind(key, value))
            }

            rule => bail!("Expected a selector rule but given {:?} instead", rule),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Selector {
        Selector::Rel(s.to_string())
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Selector {
        Selector::Rel(s)
    }
}

/// Parses a textual index expression into selectors.
pub fn parse(input: &str) -> Result<Vec<Selector>> {
    let expression = SelectorParser::parse(Rule::expression, input)
        .map_err(|err| syntax(format!("{:?} does not parse: {}", input, err)))?
        .next()
        .ok_or_else(|| syntax(format!("{:?} is empty", input)))?;

    let mut selectors = vec![];

    for inner_pair in expression.into_inner() {
        match inner_pair.as_rule() {
            Rule::EOI => (),

            _ => selectors.push(Selector::from_rule(inner_pair)?),
        }
    }

    trace!("parsed {:?} into {:?}", input, selectors);

    Ok(selectors)
}

/// The text of a `key`, `value` or `relation` pair. Bare tokens are
/// percent-decoded, quoted ones are taken verbatim.
fn text(pair: Pair<Rule>) -> Result<String> {
    let inner_pair = pair
        .into_inner()
        .next()
        .ok_or_else(|| syntax("missing token".to_string()))?;

    match inner_pair.as_rule() {
        Rule::quoted => Ok(inner_pair
            .into_inner()
            .next()
            .map(|inner| inner.as_str().to_string())
            .unwrap_or_default()),

        Rule::bare => percent_decode(inner_pair.as_str().as_bytes())
            .decode_utf8()
            .map(|decoded| decoded.into_owned())
            .map_err(|err| syntax(format!("{:?} is not UTF-8: {}", inner_pair.as_str(), err))),

        rule => bail!("Expected a quoted or bare token but given {:?} instead", rule),
    }
}

/// A relation name or one of the two structural markers, in the order they
/// were given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slug {
    Rel(String),
    ExpandAll,
    Stop,
}

/// Selectors split into slugs and template variables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexArgs {
    pub slugs: Vec<Slug>,
    pub variables: BTreeMap<String, String>,
}

impl IndexArgs {
    pub fn new(selectors: &[Selector]) -> IndexArgs {
        let mut args = IndexArgs::default();

        for selector in selectors {
            match selector {
                Selector::Rel(name) => args.slugs.push(Slug::Rel(name.clone())),
                Selector::Bind(key, value) => {
                    args.variables.insert(key.clone(), value.clone());
                }
                Selector::ExpandAll => args.slugs.push(Slug::ExpandAll),
                Selector::Stop => args.slugs.push(Slug::Stop),
            }
        }

        args
    }

    pub fn parse(input: &str) -> Result<IndexArgs> {
        Ok(IndexArgs::new(&parse(input)?))
    }

    /// Checks that the slugs form one legal expression.
    ///
    /// ```
    /// use halnav::selector::{Completion, IndexArgs};
    ///
    /// let expression = IndexArgs::parse("first, page:0, ...").unwrap().expression().unwrap();
    /// assert_eq!(expression.rel, Some("first".to_string()));
    /// assert_eq!(expression.completion, Some(Completion::ExpandAll));
    ///
    /// assert!(IndexArgs::parse(":, ...").unwrap().expression().is_err());
    /// ```
    pub fn expression(self) -> Result<Expression> {
        let mut rel: Option<String> = None;
        let mut completion: Option<Completion> = None;

        for slug in self.slugs {
            let marker = match slug {
                Slug::Rel(name) => {
                    if let Some(first) = &rel {
                        return Err(syntax(format!(
                            "only one relation per expression, got {:?} and {:?}",
                            first, name
                        )));
                    }
                    rel = Some(name);
                    continue;
                }
                Slug::ExpandAll => Completion::ExpandAll,
                Slug::Stop => Completion::Stop,
            };

            if let Some(previous) = completion {
                return Err(syntax(format!(
                    "`{}` cannot be combined with `{}`",
                    marker, previous
                )));
            }
            completion = Some(marker);
        }

        if let (Some(name), Some(Completion::Stop)) = (&rel, completion) {
            return Err(syntax(format!(
                "relation {:?} cannot be combined with `{}`",
                name,
                Completion::Stop
            )));
        }

        Ok(Expression {
            rel,
            variables: self.variables,
            completion,
        })
    }
}

/// The marker that completes an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    ExpandAll,
    Stop,
}

impl Display for Completion {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Completion::ExpandAll => write!(formatter, "..."),
            Completion::Stop => write!(formatter, ":"),
        }
    }
}

/// A validated index expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expression {
    pub rel: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub completion: Option<Completion>,
}

impl Expression {
    /// Whether the target must be expanded as a template.
    pub fn expands(&self) -> bool {
        !self.variables.is_empty() || self.completion.is_some()
    }
}

fn syntax(message: String) -> failure::Error {
    NavigatorError::CompositeIndexSyntax(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expression(input: &str) -> Result<Expression> {
        IndexArgs::parse(input)?.expression()
    }

    fn is_syntax_error(result: Result<Expression>) -> bool {
        match result {
            Err(err) => match NavigatorError::of(&err) {
                Some(NavigatorError::CompositeIndexSyntax(_)) => true,
                _ => false,
            },
            Ok(_) => false,
        }
    }

    mod text {
        use super::*;

        #[test]
        fn single_relation() {
            let actual = parse("first").expect("Expect a valid expression");

            assert_eq!(actual, vec![Selector::rel("first")]);
        }

        #[test]
        fn quoted_curie_relation() {
            let actual = parse(r#"'ht:users', "ht:me""#).expect("Expect a valid expression");

            assert_eq!(actual, vec![Selector::rel("ht:users"), Selector::rel("ht:me")]);
        }

        #[test]
        fn bindings_and_markers() {
            let actual = parse("first, page:0, max : 10, q:'a b', ...")
                .expect("Expect a valid expression");

            assert_eq!(
                actual,
                vec![
                    Selector::rel("first"),
                    Selector::bind("page", 0),
                    Selector::bind("max", 10),
                    Selector::bind("q", "a b"),
                    Selector::ExpandAll,
                ]
            );
        }

        #[test]
        fn binding_without_value() {
            let actual = parse("page:").expect("Expect a valid expression");

            assert_eq!(actual, vec![Selector::bind("page", "")]);
        }

        #[test]
        fn bare_values_are_percent_decoded() {
            let actual = parse("q:a%20b").expect("Expect a valid expression");

            assert_eq!(actual, vec![Selector::bind("q", "a b")]);
        }

        #[test]
        fn stop_marker() {
            let actual = parse("page:0, :").expect("Expect a valid expression");

            assert_eq!(actual, vec![Selector::bind("page", 0), Selector::Stop]);
        }

        #[test]
        fn empty_expression() {
            let actual = parse("").expect("Expect a valid expression");

            assert_eq!(actual, vec![]);
        }

        #[test]
        fn malformed_expressions() {
            for input in &[":page:0", "page:0:1", "::page", "first,", "first second", "a:b c"] {
                let actual = parse(input).expect_err("Expect an invalid expression");

                match NavigatorError::of(&actual) {
                    Some(NavigatorError::CompositeIndexSyntax(_)) => (),
                    other => panic!("Unexpected error for {:?}: {:?}", input, other),
                }
            }
        }
    }

    #[test]
    fn args_split_slugs_and_variables() {
        let actual = IndexArgs::new(&[
            "first".into(),
            Selector::bind("page", 0),
            Selector::ExpandAll,
            Selector::bind("page", 1),
        ]);

        let mut variables = BTreeMap::new();
        variables.insert("page".to_string(), "1".to_string());

        assert_eq!(
            actual,
            IndexArgs {
                slugs: vec![Slug::Rel("first".into()), Slug::ExpandAll],
                variables,
            }
        );
    }

    #[test]
    fn legal_expressions() {
        for input in &[
            "page:0",
            "...",
            "page:0, ...",
            ":",
            "page:0, :",
            "first",
            "first, page:0",
            "first, ...",
            "first, page:0, ...",
        ] {
            assert!(expression(input).is_ok(), "{:?} should be legal", input);
        }
    }

    #[test]
    fn markers_are_exclusive() {
        assert!(is_syntax_error(expression(":, ...")));
        assert!(is_syntax_error(expression("page:0, :, ...")));
        assert!(is_syntax_error(expression("..., ...")));
    }

    #[test]
    fn relation_with_stop_is_illegal() {
        assert!(is_syntax_error(expression("first, :")));
        assert!(is_syntax_error(expression("first, page:0, :")));
        assert!(is_syntax_error(expression("first, :, ...")));
    }

    #[test]
    fn one_relation_per_expression() {
        assert!(is_syntax_error(expression("first, next")));
        assert!(is_syntax_error(expression("first, next, ...")));
    }

    #[test]
    fn expands_with_variables_or_marker() {
        assert!(!expression("first").unwrap().expands());
        assert!(expression("first, page:0").unwrap().expands());
        assert!(expression("first, ...").unwrap().expands());
        assert!(expression(":").unwrap().expands());
    }
}
