// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

use bytes::Bytes;
use http::Uri;
use serde_json::Value;

/// One logical API call: the template it targets and the named
/// arguments supplied by the caller.
///
/// An `Invocation` is created once at the typed-client boundary and
/// consumed read-only by every downstream stage.
///
/// # Examples
///
/// ```
/// use restkit::Invocation;
///
/// let inv = Invocation::new("Servers", "suspend").with_arg("id", "abc123");
/// assert_eq!(inv.to_string(), "Servers.suspend");
/// ```
#[derive(Clone, Debug)]
pub struct Invocation {
    api: String,
    method: String,
    args: Vec<(String, Arg)>,
}

impl Invocation {
    /// Create an invocation of `method` on the api template named `api`.
    pub fn new(api: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            method: method.into(),
            args: Vec::new(),
        }
    }

    /// Attach a named argument.
    ///
    /// Anything serializable to a JSON value is accepted; use
    /// [`Invocation::with_raw_arg`] for the non-value argument kinds.
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.push((name.into(), Arg::Value(value.into())));
        self
    }

    /// Attach a named argument of any [`Arg`] kind.
    pub fn with_raw_arg(mut self, name: impl Into<String>, arg: Arg) -> Self {
        self.args.push((name.into(), arg));
        self
    }

    /// The api template name this invocation targets.
    pub fn api(&self) -> &str {
        &self.api
    }

    /// The method name this invocation targets.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// All arguments, in the order they were supplied.
    pub fn args(&self) -> &[(String, Arg)] {
        &self.args
    }

    /// Look up an argument by name.
    pub fn arg(&self, name: &str) -> Option<&Arg> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, arg)| arg)
    }

    /// The first argument carrying an explicit endpoint, if any.
    pub(crate) fn endpoint_arg(&self) -> Option<&Uri> {
        self.args.iter().find_map(|(_, arg)| match arg {
            Arg::Endpoint(uri) => Some(uri),
            _ => None,
        })
    }

    /// The first prebuilt payload among the arguments, if any.
    pub(crate) fn payload_arg(&self) -> Option<(&Bytes, Option<&str>)> {
        self.args.iter().find_map(|(_, arg)| match arg {
            Arg::Payload {
                bytes,
                content_type,
            } => Some((bytes, content_type.as_deref())),
            _ => None,
        })
    }

    /// All request options among the arguments, in order.
    pub(crate) fn options(&self) -> impl Iterator<Item = &RequestOptions> {
        self.args.iter().filter_map(|(_, arg)| match arg {
            Arg::Options(opts) => Some(opts),
            _ => None,
        })
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.api, self.method)
    }
}

/// A single invocation argument.
///
/// Arguments are tagged values rather than reflected objects: the
/// template's bindings refer to them by name and decide how each one is
/// rendered into the request.
#[derive(Clone, Debug)]
pub enum Arg {
    /// A plain value, rendered through the binding it is attached to.
    Value(Value),
    /// An explicit endpoint. Takes precedence over every other endpoint
    /// source during resolution.
    Endpoint(Uri),
    /// A prebuilt request payload.
    Payload {
        /// The raw body.
        bytes: Bytes,
        /// Content type to set alongside the body, if any.
        content_type: Option<String>,
    },
    /// Per-call request options contributing headers, query and form
    /// parameters, a path suffix, or a literal string body.
    Options(RequestOptions),
    /// An explicit null. Allowed only for bindings marked nullable.
    None,
}

impl Arg {
    /// Whether this argument is an explicit null.
    pub fn is_none(&self) -> bool {
        matches!(self, Arg::None) || matches!(self, Arg::Value(Value::Null))
    }

    /// Render this argument as a string token, the way a path or query
    /// parameter sees it. Strings render without quotes; other values
    /// render as their JSON form.
    pub fn to_token(&self) -> Option<String> {
        match self {
            Arg::Value(Value::String(s)) => Some(s.clone()),
            Arg::Value(Value::Null) => None,
            Arg::Value(v) => Some(v.to_string()),
            Arg::Endpoint(uri) => Some(uri.to_string()),
            _ => None,
        }
    }

    /// The JSON value behind this argument, if it carries one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

/// Per-call options carried as a trailing argument, the counterpart of a
/// hand-written request-options object.
///
/// Values contributed here land after the template's static parameters
/// and the per-argument bindings, and may also append a path suffix or
/// replace the payload with a literal string.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
    queries: Vec<(String, String)>,
    forms: Vec<(String, String)>,
    path_suffix: Option<String>,
    string_payload: Option<String>,
}

impl RequestOptions {
    /// Create an empty set of options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header to the request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Add a query parameter to the request.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.queries.push((key.into(), value.into()));
        self
    }

    /// Add a form parameter to the request.
    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.forms.push((key.into(), value.into()));
        self
    }

    /// Append a suffix to the request path.
    pub fn path_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.path_suffix = Some(suffix.into());
        self
    }

    /// Set a literal string body for the request.
    pub fn string_payload(mut self, payload: impl Into<String>) -> Self {
        self.string_payload = Some(payload.into());
        self
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub(crate) fn queries(&self) -> &[(String, String)] {
        &self.queries
    }

    pub(crate) fn forms(&self) -> &[(String, String)] {
        &self.forms
    }

    pub(crate) fn suffix(&self) -> Option<&str> {
        self.path_suffix.as_deref()
    }

    pub(crate) fn payload(&self) -> Option<&str> {
        self.string_payload.as_deref()
    }
}
