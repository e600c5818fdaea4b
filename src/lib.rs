// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

//! Navigate HAL APIs by following link relations instead of building URLs.
//!
//! ```no_run
//! use halnav::{ApiBuilder, Selector};
//!
//! let root = ApiBuilder::new("api.example.com").build().unwrap();
//!
//! // Fetches the root and follows `ht:users`.
//! let users = root.select("'ht:users'").unwrap().one().unwrap();
//!
//! // Follows the templated `find` link and expands it.
//! let fred = users
//!     .get(&["find".into(), Selector::bind("name", "fred")])
//!     .unwrap()
//!     .one()
//!     .unwrap();
//!
//! println!("{}", fred.invoke().unwrap());
//! ```

#[macro_use]
extern crate failure;

extern crate pest;
#[macro_use]
extern crate pest_derive;

pub mod api;
pub mod cache;
pub mod error;
pub mod link;
pub mod navigator;
pub mod orphan;
pub mod selector;
pub mod template;
pub mod transport;
pub mod uri;

pub use api::ApiBuilder;
pub use error::NavigatorError;
pub use navigator::{Navigator, Outcome, Resolved};
pub use selector::Selector;
