//! Error types and utilities.

pub use failure::Error;

/// Either `Ok(T)` or `Err(failure::Error)`.
///
/// Errors raised by this crate are [`NavigatorError`] values; use
/// `err.downcast_ref::<NavigatorError>()` to inspect them.
pub type Result<T> = ::std::result::Result<T, failure::Error>;

/// Everything that can go wrong while navigating an API.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum NavigatorError {
    /// The URL could not be parsed or carries more than one scheme.
    #[fail(display = "Malformed URL {:?}: {}", url, reason)]
    MalformedUrl { url: String, reason: String },

    /// The URL names a scheme other than `http`.
    #[fail(display = "Bad scheme! Got: {}, expected http", _0)]
    UnsupportedScheme(String),

    /// The resource has no link with the requested relation.
    #[fail(display = "No link with relation {:?} at {}", rel, uri)]
    LinkNotFound { rel: String, uri: String },

    /// The navigator is still a template and has no concrete URL to fetch.
    #[fail(
        display = "{} is templated; expand it before fetching or traversing",
        _0
    )]
    AmbiguousNavigation(String),

    /// An index expression combined selectors that cannot go together.
    #[fail(display = "Invalid index expression: {}", _0)]
    CompositeIndexSyntax(String),

    /// The href is not a valid URI template.
    #[fail(display = "Cannot expand template {:?}: {}", template, reason)]
    TemplateExpansion { template: String, reason: String },

    /// Variables were supplied to a navigator that is not templated.
    #[fail(display = "{} is not templated and takes no variables", _0)]
    NotTemplated(String),

    /// A single navigator was required but the relation holds several links.
    #[fail(display = "Relation {:?} at {} holds several links", rel, uri)]
    MultipleLinks { rel: String, uri: String },

    /// The transport failed before a response was received.
    #[fail(display = "Request to {} failed: {}", uri, message)]
    Transport { uri: String, message: String },

    /// The server answered with a non-success status code.
    #[fail(display = "{} answered {} {}", uri, status, reason)]
    HttpStatus {
        uri: String,
        status: u16,
        reason: String,
    },

    /// The body is not a JSON object or has an unexpected content type.
    #[fail(display = "Malformed response from {}: {}", uri, reason)]
    MalformedResponse { uri: String, reason: String },
}

impl NavigatorError {
    /// Returns the navigator error carried by `err`, if any.
    pub fn of(err: &Error) -> Option<&NavigatorError> {
        err.downcast_ref::<NavigatorError>()
    }
}
