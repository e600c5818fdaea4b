// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

//! URI templates as found in templated links.

use crate::error::{NavigatorError, Result};
use pest::{iterators::Pair, Parser};
use std::collections::BTreeMap;
use uritemplate::UriTemplate;

#[derive(Parser)]
#[grammar = "template.pest"]
pub struct TemplateParser;

/// A syntactically valid URI template.
///
/// ```
/// use halnav::template::Template;
/// use std::collections::BTreeMap;
///
/// let template = Template::parse("http://example.com/{?max,page}").unwrap();
/// assert_eq!(template.variables(), &["max".to_string(), "page".to_string()]);
///
/// let mut variables = BTreeMap::new();
/// variables.insert("page".to_string(), "0".to_string());
/// assert_eq!(template.expand(&variables), "http://example.com/?page=0");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    raw: String,
    variables: Vec<String>,
}

impl Template {
    pub fn parse(input: &str) -> Result<Template> {
        let template = TemplateParser::parse(Rule::template, input)
            .map_err(|err| NavigatorError::TemplateExpansion {
                template: input.to_string(),
                reason: err.to_string(),
            })?
            .next()
            .ok_or_else(|| NavigatorError::TemplateExpansion {
                template: input.to_string(),
                reason: "empty template".to_string(),
            })?;

        let mut variables = vec![];

        for inner_pair in template.into_inner() {
            if inner_pair.as_rule() == Rule::expression {
                collect_variables(inner_pair, &mut variables);
            }
        }

        Ok(Template {
            raw: input.to_string(),
            variables,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The variable names in order of first appearance.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Expands the template. Variables that are not given are left undefined
    /// and vanish from the result; extra variables are ignored.
    pub fn expand(&self, variables: &BTreeMap<String, String>) -> String {
        let mut template = UriTemplate::new(&self.raw);

        for (name, value) in variables {
            if self.variables.contains(name) {
                template.set(name, value.as_str());
            }
        }

        template.build()
    }
}

fn collect_variables(expression: Pair<Rule>, variables: &mut Vec<String>) {
    for varspec in expression.into_inner() {
        if varspec.as_rule() != Rule::varspec {
            continue;
        }

        for inner_pair in varspec.into_inner() {
            if inner_pair.as_rule() == Rule::varname {
                let name = inner_pair.as_str().to_string();

                if !variables.contains(&name) {
                    variables.push(name);
                }
            }
        }
    }
}
