//! Abstract request methods.

use std::fmt;

/// The method of a pipeline request.
///
/// The well-known methods are listed explicitly; anything else is carried as
/// [`RequestMethod::Custom`] and is validated when the request is adapted to
/// the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Trace,
    Connect,
    Custom(String),
}

impl RequestMethod {
    /// Get the canonical upper-case name of this method.
    pub fn as_str(&self) -> &str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Head => "HEAD",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Options => "OPTIONS",
            RequestMethod::Trace => "TRACE",
            RequestMethod::Connect => "CONNECT",
            RequestMethod::Custom(name) => name,
        }
    }

    /// Parse a method name. Well-known names are matched case-insensitively.
    pub fn parse(name: &str) -> Self {
        const KNOWN: [RequestMethod; 9] = [
            RequestMethod::Get,
            RequestMethod::Head,
            RequestMethod::Post,
            RequestMethod::Put,
            RequestMethod::Delete,
            RequestMethod::Patch,
            RequestMethod::Options,
            RequestMethod::Trace,
            RequestMethod::Connect,
        ];
        KNOWN
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
            .unwrap_or_else(|| RequestMethod::Custom(name.to_owned()))
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RequestMethod {
    fn from(name: &str) -> Self {
        RequestMethod::parse(name)
    }
}
