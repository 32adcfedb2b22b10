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

//! The request compiler: turns a method template plus an invocation
//! into a concrete HTTP request.
//!
//! Compilation is pure and deterministic. Given the same registry,
//! templates and arguments it produces a byte-identical request, so a
//! failed build can be retried or compared safely.

use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use http::header;
use http::Method;
use http::Request;
use http::Uri;
use log::trace;
use serde_json::Value;

use crate::raw::http_util::new_request_build_error;
use crate::raw::http_util::percent_encode_path_skipping;
use crate::raw::http_util::percent_encode_query;
use crate::raw::http_util::FormDataPart;
use crate::raw::http_util::Multipart;
use crate::raw::template::ApiTemplate;
use crate::raw::template::BindKind;
use crate::raw::template::MethodTemplate;
use crate::raw::template::ParamBinding;
use crate::raw::template::PayloadSpec;
use crate::raw::template::RequestFilter;
use crate::raw::template::NULL;
use crate::raw::MapBinder;
use crate::types::Arg;
use crate::types::Invocation;
use crate::types::Registry;
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// An insertion-ordered multimap for query and form parameters.
///
/// A `None` value renders as a bare key. Static values equal to
/// [`NULL`] erase everything accumulated for the key first, which is
/// how a method-level parameter cancels an interface-level default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, Option<String>)>);

impl Params {
    /// An empty multimap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value for `key`.
    pub fn put(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.push((key.into(), value));
    }

    /// Apply one static template value, honoring the [`NULL`] sentinel.
    pub fn put_static(&mut self, key: &str, value: &str) {
        if value == NULL {
            self.remove_all(key);
            self.0.push((key.to_string(), None));
        } else {
            self.0.push((key.to_string(), Some(value.to_string())));
        }
    }

    /// Drop every value accumulated for `key`.
    pub fn remove_all(&mut self, key: &str) {
        self.0.retain(|(k, _)| k != key);
    }

    /// Drop every value for `key` and append the given one.
    pub fn replace(&mut self, key: &str, value: Option<String>) {
        self.remove_all(key);
        self.0.push((key.to_string(), value));
    }

    /// All values accumulated for `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> Vec<Option<&str>> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
            .collect()
    }

    /// Whether any value exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Whether the multimap is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Percent-encode the entries as a query or form string. Bare keys
    /// render without `=`.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{}={}", percent_encode_query(k), percent_encode_query(v)),
                None => percent_encode_query(k),
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// The mutable request under construction, handed to [`crate::raw::Binder`]s
/// before it is frozen into the final request.
#[derive(Debug)]
pub struct RequestDraft {
    /// The request method.
    pub method: Method,
    /// The resolved endpoint; its path prefixes the request path.
    pub endpoint: Uri,
    /// The joined, token-substituted, not-yet-encoded path.
    pub path: String,
    /// Characters left unencoded in the path.
    pub skip_encoding: Vec<char>,
    /// Accumulated query parameters.
    pub queries: Params,
    /// Accumulated headers, in insertion order.
    pub headers: Vec<(String, String)>,
    /// Accumulated form parameters.
    pub forms: Params,
    /// Accumulated multipart parts. Parts win over the form body.
    pub parts: Vec<FormDataPart>,
    payload: Option<(Bytes, Option<String>)>,
}

impl RequestDraft {
    /// Start a draft for `method` against `endpoint` with the given
    /// path.
    pub fn new(method: Method, endpoint: Uri, path: String) -> Self {
        Self {
            method,
            endpoint,
            path,
            skip_encoding: Vec::new(),
            queries: Params::new(),
            headers: Vec::new(),
            forms: Params::new(),
            parts: Vec::new(),
            payload: None,
        }
    }

    /// Set the request body, replacing any previous one.
    pub fn set_payload(&mut self, bytes: impl Into<Bytes>, content_type: Option<String>) {
        self.payload = Some((bytes.into(), content_type));
    }

    /// Whether a body has been set.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Freeze the draft into the final request.
    ///
    /// Encodes the path and query, resolves the body precedence
    /// (explicit payload, then parts, then form parameters) and builds
    /// the `http` request.
    ///
    /// When parts are present, form parameters become parts of the
    /// same multipart body instead of a url-encoded one.
    pub fn finish(self) -> Result<Request<Bytes>> {
        let mut payload = self.payload;

        if payload.is_none() && !self.parts.is_empty() {
            let mut multipart = Multipart::new();
            for part in self.parts {
                multipart = multipart.part(part);
            }
            for (k, v) in self.forms.iter() {
                multipart = multipart
                    .part(FormDataPart::new(k).content(v.unwrap_or_default().to_string()));
            }
            let content_type = multipart.content_type();
            payload = Some((multipart.build(), Some(content_type)));
        }

        if payload.is_none() && !self.forms.is_empty() {
            payload = Some((
                Bytes::from(self.forms.encode()),
                Some("application/x-www-form-urlencoded".to_string()),
            ));
        }

        let path = if self.path.is_empty() {
            "/".to_string()
        } else {
            self.path
        };
        let mut uri = format!(
            "{}://{}{}",
            self.endpoint.scheme_str().unwrap_or("https"),
            authority_str(&self.endpoint)?,
            percent_encode_path_skipping(&path, &self.skip_encoding),
        );
        if !self.queries.is_empty() {
            uri.push('?');
            uri.push_str(&self.queries.encode());
        }

        let mut req = Request::builder().method(self.method).uri(&uri);
        for (k, v) in &self.headers {
            req = req.header(k, v);
        }

        let body = match payload {
            Some((bytes, content_type)) => {
                if let Some(ct) = content_type {
                    if !self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                        req = req.header(header::CONTENT_TYPE, ct);
                    }
                }
                req = req.header(header::CONTENT_LENGTH, bytes.len());
                bytes
            }
            None => Bytes::new(),
        };

        req.body(body).map_err(new_request_build_error)
    }
}

fn authority_str(endpoint: &Uri) -> Result<&str> {
    endpoint
        .authority()
        .map(|a| a.as_str())
        .ok_or_else(|| {
            Error::new(ErrorKind::ConfigInvalid, "endpoint has no host")
                .with_operation("RequestDraft::finish")
                .with_context("endpoint", endpoint.to_string())
        })
}

/// Substitute `{token}` occurrences strictly: an unresolved token is an
/// error. Later entries shadow earlier ones.
pub fn expand_tokens(template: &str, tokens: &[(String, String)]) -> Result<String> {
    expand(template, tokens, true)
}

/// Substitute `{token}` occurrences leniently: unresolved tokens are
/// left in place, matching how header and parameter values behave.
pub fn expand_tokens_lenient(template: &str, tokens: &[(String, String)]) -> String {
    // The lenient pass cannot fail.
    expand(template, tokens, false).unwrap_or_default()
}

fn expand(template: &str, tokens: &[(String, String)], strict: bool) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match tokens.iter().rev().find(|(k, _)| k == name) {
                    Some((_, v)) => out.push_str(v),
                    None if strict => {
                        return Err(Error::new(
                            ErrorKind::InvalidInput,
                            "unresolved token in path template",
                        )
                        .with_operation("build::expand_tokens")
                        .with_context("token", name.to_string())
                        .with_context("template", template.to_string()));
                    }
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Join two path fragments without doubling the separator.
pub fn join_path(base: &str, segment: &str) -> String {
    if segment.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return segment.to_string();
    }
    match (base.ends_with('/'), segment.starts_with('/')) {
        (true, true) => format!("{}{}", base, &segment[1..]),
        (false, false) => format!("{base}/{segment}"),
        _ => format!("{base}{segment}"),
    }
}

/// The calling invocation a delegated client is scoped to. Its path,
/// static parameters and argument tokens prefix everything the child
/// builds, with the child's own entries taking precedence. Delegation
/// nests: a caller may itself carry a parent context.
#[derive(Debug, Clone)]
pub struct CallerContext {
    /// The caller's api template.
    pub api: ApiTemplate,
    /// The delegate method that produced the child client.
    pub method: MethodTemplate,
    /// The caller's invocation, with its bound arguments.
    pub invocation: Invocation,
    /// The context the caller was itself delegated from, if any.
    pub parent: Option<Arc<CallerContext>>,
}

/// The filters applying to one method: the api's list then the
/// method's, unless the method overrides.
pub fn effective_filters(
    api: &ApiTemplate,
    method: &MethodTemplate,
) -> Vec<Arc<dyn RequestFilter>> {
    let mut filters = Vec::new();
    if !method.override_filters {
        filters.extend(api.filters.iter().cloned());
    }
    filters.extend(method.filters.iter().cloned());
    filters
}

/// Compiles one invocation against its templates into a request.
pub struct RequestCompiler<'a> {
    registry: &'a Registry,
    api: &'a ApiTemplate,
    method: &'a MethodTemplate,
    invocation: &'a Invocation,
    caller: Option<&'a CallerContext>,
}

impl<'a> RequestCompiler<'a> {
    /// Create a compiler for one invocation.
    pub fn new(
        registry: &'a Registry,
        api: &'a ApiTemplate,
        method: &'a MethodTemplate,
        invocation: &'a Invocation,
        caller: Option<&'a CallerContext>,
    ) -> Self {
        Self {
            registry,
            api,
            method,
            invocation,
            caller,
        }
    }

    /// Compile the invocation into a ready-to-filter request.
    pub fn compile(&self) -> Result<Request<Bytes>> {
        let tokens = self.collect_tokens()?;
        let endpoint = self.resolve_endpoint()?;

        let path = self.build_path(&endpoint, &tokens)?;

        let mut draft = RequestDraft::new(self.method.verb.clone(), endpoint.clone(), path);
        draft.skip_encoding = self.skip_encoding();

        self.seed_queries_from_endpoint(&endpoint, &mut draft);
        self.apply_static_params(&tokens, &mut draft)?;
        self.apply_bindings(&tokens, &mut draft)?;
        self.apply_options(&mut draft);
        self.apply_media_types(&mut draft);
        self.apply_payload(&tokens, &mut draft)?;
        if self.virtual_host() {
            if let Some(host) = endpoint.host() {
                draft.headers.push((header::HOST.to_string(), host.to_string()));
            }
        }

        draft.finish()
    }

    /// Tokens in precedence order: version constants, then the
    /// caller's argument values, then this invocation's. Later entries
    /// shadow earlier ones.
    fn collect_tokens(&self) -> Result<Vec<(String, String)>> {
        let mut tokens = Vec::new();
        if let Some(v) = self.registry.api_version() {
            tokens.push(("apiVersion".to_string(), v.to_string()));
        }
        if let Some(v) = self.registry.build_version() {
            tokens.push(("buildVersion".to_string(), v.to_string()));
        }
        for caller in self.caller_chain() {
            collect_arg_tokens(&caller.method.bindings, &caller.invocation, &mut tokens)?;
        }
        collect_arg_tokens(&self.method.bindings, self.invocation, &mut tokens)?;
        Ok(tokens)
    }

    /// The caller contexts this invocation is nested under, outermost
    /// first.
    fn caller_chain(&self) -> Vec<&'a CallerContext> {
        let mut chain = Vec::new();
        let mut next = self.caller;
        while let Some(caller) = next {
            chain.push(caller);
            next = caller.parent.as_deref();
        }
        chain.reverse();
        chain
    }

    /// Endpoint precedence: an endpoint argument on this invocation,
    /// then on the caller, then the method's named endpoint, the
    /// api's, and finally the registry default.
    fn resolve_endpoint(&self) -> Result<Uri> {
        if let Some(uri) = self.endpoint_from_args(self.method, self.invocation)? {
            trace!("{}: endpoint {} resolved from args", self.invocation, uri);
            return Ok(self.add_host_if_missing(uri)?);
        }
        for caller in self.caller_chain().into_iter().rev() {
            if let Some(uri) = self.endpoint_from_args(&caller.method, &caller.invocation)? {
                trace!("{}: endpoint {} resolved from caller", self.invocation, uri);
                return Ok(self.add_host_if_missing(uri)?);
            }
        }
        let caller_endpoints = self
            .caller_chain()
            .into_iter()
            .rev()
            .map(|c| c.api.endpoint.as_deref());
        for name in [self.method.endpoint.as_deref(), self.api.endpoint.as_deref()]
            .into_iter()
            .chain(caller_endpoints)
            .flatten()
        {
            return self.registry.named_endpoint(name).cloned().ok_or_else(|| {
                Error::new(ErrorKind::ConfigInvalid, "no endpoint registered under this name")
                    .with_operation("RequestCompiler::compile")
                    .with_context("endpoint", name.to_string())
                    .with_context("invocation", self.invocation.to_string())
            });
        }
        Ok(self.registry.default_endpoint().clone())
    }

    /// An endpoint argument carrying only a path inherits scheme and
    /// authority from the registry default.
    fn add_host_if_missing(&self, uri: Uri) -> Result<Uri> {
        if uri.authority().is_some() {
            return Ok(uri);
        }
        let default = self.registry.default_endpoint();
        let mut parts = uri.into_parts();
        parts.scheme = default.scheme().cloned();
        parts.authority = default.authority().cloned();
        Uri::from_parts(parts).map_err(|err| {
            Error::new(ErrorKind::InvalidInput, "endpoint argument cannot take the default host")
                .with_operation("RequestCompiler::compile")
                .with_context("invocation", self.invocation.to_string())
                .set_source(err)
        })
    }

    fn endpoint_from_args(
        &self,
        method: &MethodTemplate,
        invocation: &Invocation,
    ) -> Result<Option<Uri>> {
        // A prebuilt uri argument wins over any declared endpoint
        // binding, and needs none to be honored.
        if let Some(uri) = invocation.endpoint_arg() {
            return Ok(Some(uri.clone()));
        }
        for binding in method
            .bindings
            .iter()
            .filter(|b| matches!(b.kind, BindKind::Endpoint))
        {
            match self.binding_value(binding, invocation)? {
                Some(text) => {
                    let uri = Uri::from_str(&text).map_err(|err| {
                        Error::new(ErrorKind::InvalidInput, "endpoint argument is not a valid uri")
                            .with_operation("RequestCompiler::compile")
                            .with_context("endpoint", text)
                            .with_context("invocation", invocation.to_string())
                            .set_source(err)
                    })?;
                    return Ok(Some(uri));
                }
                None => continue,
            }
        }
        Ok(None)
    }

    /// The path is assembled host-first: the endpoint's own path, the
    /// caller's api and method paths, then this api's and method's,
    /// then any suffix from the request options.
    fn build_path(&self, endpoint: &Uri, tokens: &[(String, String)]) -> Result<String> {
        let mut path = endpoint.path().trim_end_matches('/').to_string();
        for caller in self.caller_chain() {
            path = join_path(&path, &caller.api.path);
            path = join_path(&path, &caller.method.path);
        }
        path = join_path(&path, &self.api.path);
        path = join_path(&path, &self.method.path);
        for options in self.invocation.options() {
            if let Some(suffix) = options.suffix() {
                path = join_path(&path, suffix);
            }
        }
        expand_tokens(&path, tokens)
    }

    fn skip_encoding(&self) -> Vec<char> {
        let mut skip = self.api.skip_encoding.clone();
        skip.extend(&self.method.skip_encoding);
        skip
    }

    fn virtual_host(&self) -> bool {
        self.api.virtual_host || self.method.virtual_host
    }

    /// A query already present on the resolved endpoint survives the
    /// build.
    fn seed_queries_from_endpoint(&self, endpoint: &Uri, draft: &mut RequestDraft) {
        if let Some(query) = endpoint.query() {
            for (k, v) in crate::raw::http_util::query_pairs(query) {
                let value = if v.is_empty() { None } else { Some(v) };
                draft.queries.put(k, value);
            }
        }
    }

    /// Static parameters accumulate outermost-first: the caller's api,
    /// this api, then this method, so the innermost level wins ties
    /// and can erase inherited keys with [`NULL`].
    fn apply_static_params(
        &self,
        tokens: &[(String, String)],
        draft: &mut RequestDraft,
    ) -> Result<()> {
        let mut levels: Vec<(&[(String, String)], &[(String, String)], &[(String, String)])> =
            Vec::new();
        for caller in self.caller_chain() {
            levels.push((&caller.api.headers, &caller.api.queries, &caller.api.forms));
            levels.push((
                &caller.method.headers,
                &caller.method.queries,
                &caller.method.forms,
            ));
        }
        levels.push((&self.api.headers, &self.api.queries, &self.api.forms));
        levels.push((&self.method.headers, &self.method.queries, &self.method.forms));

        for (headers, queries, forms) in levels {
            for (k, v) in headers {
                apply_static_header(&mut draft.headers, k, &expand_tokens_lenient(v, tokens));
            }
            for (k, v) in queries {
                draft.queries.put_static(k, &expand_tokens_lenient(v, tokens));
            }
            for (k, v) in forms {
                draft.forms.put_static(k, &expand_tokens_lenient(v, tokens));
            }
        }
        Ok(())
    }

    /// Per-argument bindings run in declaration order after the static
    /// parameters. A missing non-nullable argument fails the build.
    fn apply_bindings(&self, tokens: &[(String, String)], draft: &mut RequestDraft) -> Result<()> {
        for binding in &self.method.bindings {
            match &binding.kind {
                // Path and endpoint bindings were already consumed
                // while collecting tokens and resolving the endpoint.
                BindKind::Path | BindKind::Endpoint => {}
                BindKind::Query => {
                    if let Some(v) = self.binding_value(binding, self.invocation)? {
                        draft.queries.put(binding.key.clone(), Some(v));
                    }
                }
                BindKind::Header => {
                    if let Some(v) = self.binding_value(binding, self.invocation)? {
                        draft.headers.push((binding.key.clone(), v));
                    }
                }
                BindKind::Form => {
                    if let Some(v) = self.binding_value(binding, self.invocation)? {
                        draft.forms.put(binding.key.clone(), Some(v));
                    }
                }
                BindKind::Payload => {}
                BindKind::Part {
                    content_type,
                    filename,
                } => {
                    if let Some(content) = self.part_content(binding)? {
                        let mut part = FormDataPart::new(binding.key.clone()).content(content);
                        if let Some(ct) = content_type {
                            part = part.content_type(ct.clone());
                        }
                        if let Some(name) = filename {
                            part = part.filename(expand_tokens(name, tokens)?);
                        }
                        draft.parts.push(part);
                    }
                }
                BindKind::Binder(binder) => {
                    // When a map-payload strategy is declared it owns
                    // the body; per-argument binders are skipped.
                    if matches!(self.method.payload, PayloadSpec::None) {
                        let arg = self.require_arg(binding)?;
                        if let Some(arg) = arg {
                            binder.bind(draft, arg)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_options(&self, draft: &mut RequestDraft) {
        for options in self.invocation.options() {
            for (k, v) in options.headers() {
                draft.headers.push((k.clone(), v.clone()));
            }
            for (k, v) in options.queries() {
                draft.queries.put(k.clone(), Some(v.clone()));
            }
            for (k, v) in options.forms() {
                draft.forms.put(k.clone(), Some(v.clone()));
            }
        }
    }

    fn apply_media_types(&self, draft: &mut RequestDraft) {
        let consumes = self.method.consumes.as_ref().or(self.api.consumes.as_ref());
        if let Some(accept) = consumes {
            if !has_header(&draft.headers, "accept") {
                draft.headers.push((header::ACCEPT.to_string(), accept.clone()));
            }
        }
    }

    /// Body precedence: a prebuilt payload argument, then a string
    /// payload from the request options, then the declared strategy.
    fn apply_payload(&self, tokens: &[(String, String)], draft: &mut RequestDraft) -> Result<()> {
        let produces = self
            .method
            .produces
            .as_ref()
            .or(self.api.produces.as_ref())
            .cloned();

        if let Some((bytes, content_type)) = self.invocation.payload_arg() {
            draft.set_payload(bytes.clone(), content_type.map(str::to_string).or(produces));
            return Ok(());
        }
        if let Some(body) = self.invocation.options().filter_map(|o| o.payload()).last() {
            draft.set_payload(Bytes::from(body.to_string()), produces);
            return Ok(());
        }

        let params = self.payload_params()?;
        match &self.method.payload {
            PayloadSpec::None => {
                // A declared content type with no body still travels
                // on an empty payload.
                if let Some(content_type) = produces {
                    if draft.parts.is_empty() && draft.forms.is_empty() {
                        draft.set_payload(Bytes::new(), Some(content_type));
                    }
                }
            }
            PayloadSpec::Literal(template) => {
                // Lenient: a literal body is often JSON whose braces
                // are not tokens.
                let mut scope = tokens.to_vec();
                for (k, v) in &params {
                    scope.push((k.clone(), value_to_token(v)));
                }
                let body = expand_tokens_lenient(template, &scope);
                draft.set_payload(Bytes::from(body), produces);
            }
            PayloadSpec::JsonMap => {
                let body = encode_json_map(&params)?;
                draft.set_payload(body, Some("application/json".to_string()));
            }
            PayloadSpec::WrappedJsonMap(key) => {
                let inner: Value = params_to_object(&params);
                let mut wrapper = serde_json::Map::new();
                wrapper.insert(key.clone(), inner);
                let body = serde_json::to_vec(&Value::Object(wrapper)).map_err(json_encode_error)?;
                draft.set_payload(body, Some("application/json".to_string()));
            }
            PayloadSpec::Custom(binder) => {
                let binder: &Arc<dyn MapBinder> = binder;
                binder.bind_map(draft, &params)?;
            }
        }
        Ok(())
    }

    /// The payload-parameter map: method statics first, then bound
    /// arguments in declaration order.
    fn payload_params(&self) -> Result<Vec<(String, Value)>> {
        let mut params: Vec<(String, Value)> = self
            .method
            .payload_params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        for binding in self
            .method
            .bindings
            .iter()
            .filter(|b| matches!(b.kind, BindKind::Payload))
        {
            let arg = self.require_arg(binding)?;
            if let Some(arg) = arg {
                let value = match arg.as_value() {
                    Some(v) => v.clone(),
                    None => match arg.to_token() {
                        Some(text) => Value::String(text),
                        None => Value::Null,
                    },
                };
                params.push((binding.key.clone(), value));
            }
        }
        Ok(params)
    }

    fn part_content(&self, binding: &ParamBinding) -> Result<Option<Bytes>> {
        let arg = self.require_arg(binding)?;
        Ok(arg.map(|arg| match arg {
            Arg::Payload { bytes, .. } => bytes.clone(),
            other => Bytes::from(other.to_token().unwrap_or_default()),
        }))
    }

    /// The stringified value for a binding, passing the argument
    /// through the binding's parser when one is declared. A missing or
    /// null non-nullable argument is an invalid invocation.
    fn binding_value(
        &self,
        binding: &ParamBinding,
        invocation: &Invocation,
    ) -> Result<Option<String>> {
        let arg = invocation.arg(&binding.arg);
        let value = match arg {
            Some(arg) if !arg.is_none() => match &binding.parser {
                Some(parser) => parser(arg),
                None => arg.to_token(),
            },
            _ => None,
        };
        if value.is_none() && !binding.nullable {
            return Err(missing_param(&binding.key, invocation));
        }
        Ok(value)
    }

    /// The raw argument for a binding, with the same null check.
    fn require_arg(&self, binding: &ParamBinding) -> Result<Option<&Arg>> {
        let arg = self.invocation.arg(&binding.arg).filter(|a| !a.is_none());
        if arg.is_none() && !binding.nullable {
            return Err(missing_param(&binding.key, self.invocation));
        }
        Ok(arg)
    }
}

fn collect_arg_tokens(
    bindings: &[ParamBinding],
    invocation: &Invocation,
    tokens: &mut Vec<(String, String)>,
) -> Result<()> {
    for binding in bindings
        .iter()
        .filter(|b| matches!(b.kind, BindKind::Path))
    {
        let arg = invocation.arg(&binding.arg);
        let value = match arg {
            Some(arg) if !arg.is_none() => match &binding.parser {
                Some(parser) => parser(arg),
                None => arg.to_token(),
            },
            _ => None,
        };
        match value {
            Some(v) => tokens.push((binding.key.clone(), v)),
            None if binding.nullable => {}
            None => return Err(missing_param(&binding.key, invocation)),
        }
    }
    Ok(())
}

fn missing_param(key: &str, invocation: &Invocation) -> Error {
    Error::new(
        ErrorKind::InvalidInput,
        format!("param{{{key}}} for invocation {invocation}"),
    )
    .with_operation("RequestCompiler::compile")
}

fn apply_static_header(headers: &mut Vec<(String, String)>, key: &str, value: &str) {
    if value == NULL {
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    } else {
        headers.push((key.to_string(), value.to_string()));
    }
}

fn has_header(headers: &[(String, String)], key: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
}

fn params_to_object(params: &[(String, Value)]) -> Value {
    let mut map = serde_json::Map::new();
    for (k, v) in params {
        map.insert(k.clone(), v.clone());
    }
    Value::Object(map)
}

fn encode_json_map(params: &[(String, Value)]) -> Result<Vec<u8>> {
    serde_json::to_vec(&params_to_object(params)).map_err(json_encode_error)
}

fn json_encode_error(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Unexpected, "serialize json payload")
        .with_operation("RequestCompiler::compile")
        .set_source(err)
}

fn value_to_token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        v => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_params_null_sentinel_erases_inherited_values() {
        let mut params = Params::new();
        params.put_static("format", "json");
        params.put_static("format", "xml");
        params.put_static("format", NULL);
        assert_eq!(params.get_all("format"), vec![None]);
        assert_eq!(params.encode(), "format");
    }

    #[test]
    fn test_params_encode_order_is_insertion_order() {
        let mut params = Params::new();
        params.put("b", Some("2".to_string()));
        params.put("a", Some("1".to_string()));
        params.put("b", Some("3".to_string()));
        assert_eq!(params.encode(), "b=2&a=1&b=3");
    }

    #[test]
    fn test_params_replace_collapses_to_one_value() {
        let mut params = Params::new();
        params.put("limit", Some("10".to_string()));
        params.put("limit", Some("20".to_string()));
        params.replace("limit", Some("50".to_string()));
        assert_eq!(params.encode(), "limit=50");
    }

    #[test]
    fn test_expand_tokens_strict_and_lenient() {
        let tokens = vec![
            ("id".to_string(), "s1".to_string()),
            ("id".to_string(), "s2".to_string()),
        ];
        // Last binding wins.
        assert_eq!(expand_tokens("/servers/{id}", &tokens).unwrap(), "/servers/s2");
        assert!(expand_tokens("/servers/{missing}", &tokens).is_err());
        assert_eq!(
            expand_tokens_lenient("v={missing}", &tokens),
            "v={missing}"
        );
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/v2", "servers"), "/v2/servers");
        assert_eq!(join_path("/v2/", "/servers"), "/v2/servers");
        assert_eq!(join_path("", "/servers"), "/servers");
        assert_eq!(join_path("/v2", ""), "/v2");
    }

    #[test]
    fn test_draft_form_body() {
        let mut draft = RequestDraft::new(
            Method::POST,
            Uri::from_static("http://example.com"),
            "/auth".to_string(),
        );
        draft.forms.put("user", Some("admin".to_string()));
        draft.forms.put("scope", Some("read write".to_string()));
        let req = draft.finish().unwrap();
        assert_eq!(
            req.headers()["content-type"],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(req.body().as_ref(), b"user=admin&scope=read%20write");
    }

    #[test]
    fn test_draft_empty_path_becomes_root() {
        let draft = RequestDraft::new(
            Method::GET,
            Uri::from_static("http://example.com"),
            String::new(),
        );
        let req = draft.finish().unwrap();
        assert_eq!(req.uri().to_string(), "http://example.com/");
    }
}
