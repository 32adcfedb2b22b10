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

//! The declarative request-template vocabulary.
//!
//! Provider apis are described as data: an [`ApiTemplate`] carries the
//! interface-level defaults, each [`MethodTemplate`] carries one
//! operation's verb, path template, parameter bindings, payload
//! strategy, response parser and fallback. A single generic executor
//! ([`crate::Client`]) interprets these tables; no per-provider glue
//! code exists.

use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use http::Request;

use crate::raw::Binder;
use crate::raw::Fallback;
use crate::raw::MapBinder;
use crate::raw::ResponseParser;
use crate::raw::TransformFn;
use crate::types::Arg;
use crate::Result;

/// Sentinel value for a static parameter meaning "remove every value
/// accumulated for this key so far and record an explicit null".
///
/// A method-level static parameter set to `NULL` therefore erases the
/// api-level default for the same key.
pub const NULL: &str = "\u{0}null\u{0}";

/// A request filter applied to the built request before dispatch, in
/// declaration order. Request signing and authentication live here.
pub trait RequestFilter: Send + Sync + 'static {
    /// Transform the request. Filters run after the builder has
    /// produced the complete request and before the transport sees it.
    fn filter(&self, req: Request<Bytes>) -> Result<Request<Bytes>>;
}

/// A function lifting an argument into its string form before token
/// substitution, the counterpart of a param-parser annotation.
pub type ParamParserFn = Arc<dyn Fn(&Arg) -> Option<String> + Send + Sync>;

/// Where a bound parameter lands in the request.
#[derive(Clone)]
pub enum BindKind {
    /// Substituted into a `{token}` in the path template.
    Path,
    /// Appended to the query string.
    Query,
    /// Added as a request header.
    Header,
    /// Accumulated into the url-encoded form body.
    Form,
    /// Accumulated into the map-payload parameters.
    Payload,
    /// Parsed into the request endpoint.
    Endpoint,
    /// A multipart part with optional content type and filename.
    Part {
        /// Content type for the part, if any.
        content_type: Option<String>,
        /// Filename for the part; `{token}`s are substituted.
        filename: Option<String>,
    },
    /// Handed to a [`Binder`] that mutates the request directly.
    Binder(Arc<dyn Binder>),
}

impl Debug for BindKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindKind::Path => "Path",
            BindKind::Query => "Query",
            BindKind::Header => "Header",
            BindKind::Form => "Form",
            BindKind::Payload => "Payload",
            BindKind::Endpoint => "Endpoint",
            BindKind::Part { .. } => "Part",
            BindKind::Binder(_) => "Binder",
        };
        f.write_str(name)
    }
}

/// Binds one named argument into the request.
#[derive(Clone)]
pub struct ParamBinding {
    pub(crate) arg: String,
    pub(crate) key: String,
    pub(crate) kind: BindKind,
    pub(crate) parser: Option<ParamParserFn>,
    pub(crate) nullable: bool,
}

impl ParamBinding {
    fn new(kind: BindKind, arg: impl Into<String>) -> Self {
        let arg = arg.into();
        Self {
            key: arg.clone(),
            arg,
            kind,
            parser: None,
            nullable: false,
        }
    }

    /// Bind `arg` into the path token `{arg}`.
    pub fn path(arg: impl Into<String>) -> Self {
        Self::new(BindKind::Path, arg)
    }

    /// Bind `arg` as a query parameter.
    pub fn query(arg: impl Into<String>) -> Self {
        Self::new(BindKind::Query, arg)
    }

    /// Bind `arg` as a header.
    pub fn header(arg: impl Into<String>) -> Self {
        Self::new(BindKind::Header, arg)
    }

    /// Bind `arg` as a form parameter.
    pub fn form(arg: impl Into<String>) -> Self {
        Self::new(BindKind::Form, arg)
    }

    /// Bind `arg` as a map-payload parameter.
    pub fn payload(arg: impl Into<String>) -> Self {
        Self::new(BindKind::Payload, arg)
    }

    /// Parse `arg` into the request endpoint.
    pub fn endpoint(arg: impl Into<String>) -> Self {
        Self::new(BindKind::Endpoint, arg)
    }

    /// Bind `arg` as a multipart part.
    pub fn part(arg: impl Into<String>) -> Self {
        Self::new(
            BindKind::Part {
                content_type: None,
                filename: None,
            },
            arg,
        )
    }

    /// Hand `arg` to `binder` once the base request is built.
    pub fn binder(arg: impl Into<String>, binder: Arc<dyn Binder>) -> Self {
        Self::new(BindKind::Binder(binder), arg)
    }

    /// Use `key` instead of the argument name as the token/parameter
    /// key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Pass the raw argument through `parser` before substitution.
    pub fn with_parser(mut self, parser: ParamParserFn) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Allow an absent or null argument for this binding.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the content type of a part binding.
    pub fn content_type(mut self, ct: impl Into<String>) -> Self {
        if let BindKind::Part { content_type, .. } = &mut self.kind {
            *content_type = Some(ct.into());
        }
        self
    }

    /// Set the filename of a part binding.
    pub fn filename(mut self, name: impl Into<String>) -> Self {
        if let BindKind::Part { filename, .. } = &mut self.kind {
            *filename = Some(name.into());
        }
        self
    }
}

impl Debug for ParamBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamBinding")
            .field("arg", &self.arg)
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .finish()
    }
}

/// How the request body is established.
///
/// Exactly one strategy applies per method. When a map strategy is
/// present it wins over per-binding [`Binder`]s.
#[derive(Clone, Default)]
pub enum PayloadSpec {
    /// No body unless a prebuilt payload or form/part parameters say
    /// otherwise.
    #[default]
    None,
    /// A literal template; `{token}`s are substituted from the payload
    /// parameters and the request's token values.
    Literal(String),
    /// Serialize the payload-parameter map as a JSON object body.
    JsonMap,
    /// Serialize the payload-parameter map nested under a wrapper key.
    WrappedJsonMap(String),
    /// A caller-supplied map binder.
    Custom(Arc<dyn MapBinder>),
}

impl Debug for PayloadSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PayloadSpec::None => f.write_str("None"),
            PayloadSpec::Literal(t) => f.debug_tuple("Literal").field(t).finish(),
            PayloadSpec::JsonMap => f.write_str("JsonMap"),
            PayloadSpec::WrappedJsonMap(k) => f.debug_tuple("WrappedJsonMap").field(k).finish(),
            PayloadSpec::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// The declared return shape of a method, from which the response
/// parser is derived when no explicit parser is given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReturnKind {
    /// No value; the response payload is released.
    Unit,
    /// True when the response status is 2xx.
    Bool,
    /// The response body as a string, when 2xx.
    Text,
    /// A created-resource URI from the Location header or body.
    Uri,
    /// The raw body bytes.
    Stream,
    /// The raw HTTP response, passed through untouched.
    Response,
    /// A JSON value deserialized from the body.
    Json {
        /// Select a single named field before deserializing.
        select: Option<String>,
        /// Collapse a one-element list to its element (or null).
        only_element: bool,
        /// Unwrap a single-entry JSON object to its value.
        unwrap: bool,
    },
    /// An XML document deserialized from the body.
    Xml,
}

impl ReturnKind {
    /// A plain JSON return with no field selection.
    pub fn json() -> Self {
        ReturnKind::Json {
            select: None,
            only_element: false,
            unwrap: false,
        }
    }

    /// A JSON return selecting one named field.
    pub fn select_json(field: impl Into<String>) -> Self {
        ReturnKind::Json {
            select: Some(field.into()),
            only_element: false,
            unwrap: false,
        }
    }
}

/// What kind of entry a method template is.
#[derive(Clone, Debug)]
pub enum MethodKind {
    /// A true HTTP-bound operation.
    Http,
    /// Resolve the return value from the registry's provided instances.
    Provides {
        /// Qualifier narrowing the lookup, tried before the
        /// unqualified entry.
        qualifier: Option<String>,
    },
    /// Return a child client for the named api template, bound to the
    /// current invocation as caller context.
    Delegate {
        /// The target api template.
        target: String,
        /// When set, a missing target yields `None` instead of a
        /// configuration error.
        optional: bool,
    },
}

/// One operation of an api: verb, path template, bindings, payload
/// strategy, parser, fallback.
#[derive(Clone)]
pub struct MethodTemplate {
    pub(crate) name: String,
    pub(crate) kind: MethodKind,
    pub(crate) verb: Method,
    pub(crate) path: String,
    pub(crate) bindings: Vec<ParamBinding>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) queries: Vec<(String, String)>,
    pub(crate) forms: Vec<(String, String)>,
    pub(crate) payload_params: Vec<(String, String)>,
    pub(crate) produces: Option<String>,
    pub(crate) consumes: Option<String>,
    pub(crate) payload: PayloadSpec,
    pub(crate) parser: Option<ResponseParser>,
    pub(crate) returns: Option<ReturnKind>,
    pub(crate) transform: Option<TransformFn>,
    pub(crate) fallback: Option<Fallback>,
    pub(crate) filters: Vec<Arc<dyn RequestFilter>>,
    pub(crate) override_filters: bool,
    pub(crate) endpoint: Option<String>,
    pub(crate) skip_encoding: Vec<char>,
    pub(crate) virtual_host: bool,
}

impl MethodTemplate {
    fn with_verb(name: impl Into<String>, verb: Method) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Http,
            verb,
            path: String::new(),
            bindings: Vec::new(),
            headers: Vec::new(),
            queries: Vec::new(),
            forms: Vec::new(),
            payload_params: Vec::new(),
            produces: None,
            consumes: None,
            payload: PayloadSpec::None,
            parser: None,
            returns: None,
            transform: None,
            fallback: None,
            filters: Vec::new(),
            override_filters: false,
            endpoint: None,
            skip_encoding: Vec::new(),
            virtual_host: false,
        }
    }

    /// A `GET` operation.
    pub fn get(name: impl Into<String>) -> Self {
        Self::with_verb(name, Method::GET)
    }

    /// A `POST` operation.
    pub fn post(name: impl Into<String>) -> Self {
        Self::with_verb(name, Method::POST)
    }

    /// A `PUT` operation.
    pub fn put(name: impl Into<String>) -> Self {
        Self::with_verb(name, Method::PUT)
    }

    /// A `DELETE` operation.
    pub fn delete(name: impl Into<String>) -> Self {
        Self::with_verb(name, Method::DELETE)
    }

    /// A `HEAD` operation.
    pub fn head(name: impl Into<String>) -> Self {
        Self::with_verb(name, Method::HEAD)
    }

    /// A `PATCH` operation.
    pub fn patch(name: impl Into<String>) -> Self {
        Self::with_verb(name, Method::PATCH)
    }

    /// An entry whose value is resolved from the registry's provided
    /// instances instead of an HTTP call.
    pub fn provides(name: impl Into<String>) -> Self {
        let mut t = Self::with_verb(name, Method::GET);
        t.kind = MethodKind::Provides { qualifier: None };
        t
    }

    /// Like [`MethodTemplate::provides`], narrowed by a qualifier.
    pub fn provides_qualified(name: impl Into<String>, qualifier: impl Into<String>) -> Self {
        let mut t = Self::with_verb(name, Method::GET);
        t.kind = MethodKind::Provides {
            qualifier: Some(qualifier.into()),
        };
        t
    }

    /// An entry returning a child client for `target`, scoped to the
    /// invoking call.
    pub fn delegate(name: impl Into<String>, target: impl Into<String>) -> Self {
        let mut t = Self::with_verb(name, Method::GET);
        t.kind = MethodKind::Delegate {
            target: target.into(),
            optional: false,
        };
        t
    }

    /// Mark a delegate entry optional: a missing target api yields
    /// `None` instead of a configuration error.
    pub fn optional(mut self) -> Self {
        if let MethodKind::Delegate { optional, .. } = &mut self.kind {
            *optional = true;
        }
        self
    }

    /// Set the method-level path template, appended to the api path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Add a parameter binding.
    pub fn bind(mut self, binding: ParamBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Add a static header. [`NULL`] removes accumulated values.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Add a static query parameter. [`NULL`] removes accumulated
    /// values.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.queries.push((key.into(), value.into()));
        self
    }

    /// Add a static form parameter. [`NULL`] removes accumulated
    /// values.
    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.forms.push((key.into(), value.into()));
        self
    }

    /// Add a static payload parameter for the map-payload strategies.
    pub fn payload_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload_params.push((key.into(), value.into()));
        self
    }

    /// Set the `Content-Type` this method produces, overriding the api.
    pub fn produces(mut self, media: impl Into<String>) -> Self {
        self.produces = Some(media.into());
        self
    }

    /// Set the `Accept` media type, overriding the api.
    pub fn consumes(mut self, media: impl Into<String>) -> Self {
        self.consumes = Some(media.into());
        self
    }

    /// Set the payload strategy.
    pub fn payload(mut self, spec: PayloadSpec) -> Self {
        self.payload = spec;
        self
    }

    /// Shorthand for a literal payload template.
    pub fn payload_literal(mut self, template: impl Into<String>) -> Self {
        self.payload = PayloadSpec::Literal(template.into());
        self
    }

    /// Shorthand for wrapping the payload-parameter map under `key`.
    pub fn wrap_with(mut self, key: impl Into<String>) -> Self {
        self.payload = PayloadSpec::WrappedJsonMap(key.into());
        self
    }

    /// Set an explicit response parser. Takes precedence over
    /// [`MethodTemplate::returns`].
    pub fn parser(mut self, parser: ResponseParser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Declare the return shape the parser is derived from.
    pub fn returns(mut self, kind: ReturnKind) -> Self {
        self.returns = Some(kind);
        self
    }

    /// Compose a mapping function over the parser result.
    pub fn transform(mut self, f: TransformFn) -> Self {
        self.transform = Some(f);
        self
    }

    /// Set the fallback applied when the call fails.
    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Add a method-level request filter.
    pub fn filter(mut self, filter: Arc<dyn RequestFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Use only method-level filters, discarding the api-level list.
    pub fn override_filters(mut self) -> Self {
        self.override_filters = true;
        self
    }

    /// Resolve the endpoint through the named registry supplier.
    pub fn endpoint_named(mut self, name: impl Into<String>) -> Self {
        self.endpoint = Some(name.into());
        self
    }

    /// Leave the given characters unencoded in the built path.
    pub fn skip_encoding(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.skip_encoding.extend(chars);
        self
    }

    /// Add a `Host` header derived from the resolved endpoint.
    pub fn virtual_host(mut self) -> Self {
        self.virtual_host = true;
        self
    }

    /// The method name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Debug for MethodTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTemplate")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("bindings", &self.bindings)
            .field("payload", &self.payload)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// The interface-level template: base path, defaults, filters and the
/// method table.
#[derive(Clone, Default)]
pub struct ApiTemplate {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) queries: Vec<(String, String)>,
    pub(crate) forms: Vec<(String, String)>,
    pub(crate) produces: Option<String>,
    pub(crate) consumes: Option<String>,
    pub(crate) fallback: Option<Fallback>,
    pub(crate) filters: Vec<Arc<dyn RequestFilter>>,
    pub(crate) endpoint: Option<String>,
    pub(crate) skip_encoding: Vec<char>,
    pub(crate) virtual_host: bool,
    pub(crate) methods: Vec<MethodTemplate>,
}

impl Debug for ApiTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTemplate")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl ApiTemplate {
    /// Create a template for the api named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the interface-level base path template.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Add a static default header. [`NULL`] removes accumulated
    /// values.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Add a static default query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.queries.push((key.into(), value.into()));
        self
    }

    /// Add a static default form parameter.
    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.forms.push((key.into(), value.into()));
        self
    }

    /// Set the default `Content-Type` for every method.
    pub fn produces(mut self, media: impl Into<String>) -> Self {
        self.produces = Some(media.into());
        self
    }

    /// Set the default `Accept` media type for every method.
    pub fn consumes(mut self, media: impl Into<String>) -> Self {
        self.consumes = Some(media.into());
        self
    }

    /// Set the default fallback for every method.
    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Add an api-level request filter.
    pub fn filter(mut self, filter: Arc<dyn RequestFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Resolve endpoints through the named registry supplier.
    pub fn endpoint_named(mut self, name: impl Into<String>) -> Self {
        self.endpoint = Some(name.into());
        self
    }

    /// Leave the given characters unencoded in built paths.
    pub fn skip_encoding(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.skip_encoding.extend(chars);
        self
    }

    /// Add a `Host` header derived from the resolved endpoint on every
    /// method.
    pub fn virtual_host(mut self) -> Self {
        self.virtual_host = true;
        self
    }

    /// Add a method to the template.
    pub fn method(mut self, method: MethodTemplate) -> Self {
        self.methods.push(method);
        self
    }

    /// The api name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a method by name.
    pub fn find_method(&self, name: &str) -> Option<&MethodTemplate> {
        self.methods.iter().find(|m| m.name == name)
    }
}
