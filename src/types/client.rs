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
use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use bytes::Bytes;
use http::Request;
use log::debug;
use serde_json::Value;

use crate::raw::effective_filters;
use crate::raw::http_util::from_response;
use crate::raw::ApiTemplate;
use crate::raw::CallerContext;
use crate::raw::Fallback;
use crate::raw::HttpClient;
use crate::raw::MethodKind;
use crate::raw::MethodTemplate;
use crate::raw::Reply;
use crate::raw::RequestCompiler;
use crate::raw::ResponseParser;
use crate::raw::ReturnKind;
use crate::types::Invocation;
use crate::types::Registry;
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// The generic executor: dispatches any [`Invocation`] against the
/// registry's templates over HTTP.
///
/// A client is cheap to clone; the registry and transport are shared.
///
/// # Examples
///
/// ```no_run
/// use restkit::raw::ApiTemplate;
/// use restkit::raw::MethodTemplate;
/// use restkit::raw::ReturnKind;
/// use restkit::Client;
/// use restkit::Invocation;
/// use restkit::Registry;
///
/// # async fn example() -> restkit::Result<()> {
/// let registry = Registry::builder("https://compute.example.com/v2")
///     .api(
///         ApiTemplate::new("Servers")
///             .path("/servers")
///             .method(MethodTemplate::get("list").returns(ReturnKind::json())),
///     )
///     .build()?;
/// let client = Client::new(registry)?;
/// let servers = client.invoke(Invocation::new("Servers", "list")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    registry: Arc<Registry>,
    http: HttpClient,
    caller: Option<Arc<CallerContext>>,
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("registry", &self.registry)
            .field(
                "caller",
                &self.caller.as_ref().map(|c| c.invocation.to_string()),
            )
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client over the default transport.
    pub fn new(registry: Registry) -> Result<Self> {
        Ok(Self {
            registry: Arc::new(registry),
            http: HttpClient::new()?,
            caller: None,
        })
    }

    /// Create a client over a custom transport.
    pub fn with_http_client(registry: Registry, http: HttpClient) -> Self {
        Self {
            registry: Arc::new(registry),
            http,
            caller: None,
        }
    }

    /// The registry this client dispatches against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatch one invocation and reply with its typed result.
    pub async fn invoke(&self, invocation: Invocation) -> Result<Reply> {
        let (api, method) = self.lookup(&invocation)?;

        match &method.kind {
            MethodKind::Provides { qualifier } => {
                self.resolve_provided(method, qualifier.as_deref(), &invocation)
            }
            MethodKind::Delegate { target, optional } => {
                self.resolve_delegate(api, method, target, *optional, invocation)
            }
            MethodKind::Http => self.dispatch(api, method, &invocation).await,
        }
    }

    /// Compile and filter the request an invocation would send,
    /// without dispatching it.
    pub fn build_request(&self, invocation: &Invocation) -> Result<Request<Bytes>> {
        let (api, method) = self.lookup(invocation)?;
        if !matches!(method.kind, MethodKind::Http) {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "this method does not issue an http request",
            )
            .with_operation("Client::build_request")
            .with_context("invocation", invocation.to_string()));
        }
        self.compile(api, method, invocation)
    }

    fn lookup(&self, invocation: &Invocation) -> Result<(&ApiTemplate, &MethodTemplate)> {
        let api = self.registry.api(invocation.api()).ok_or_else(|| {
            Error::new(ErrorKind::ConfigInvalid, "api is not registered")
                .with_operation("Client::invoke")
                .with_context("invocation", invocation.to_string())
        })?;
        let method = api.find_method(invocation.method()).ok_or_else(|| {
            Error::new(ErrorKind::ConfigInvalid, "method is not declared on this api")
                .with_operation("Client::invoke")
                .with_context("invocation", invocation.to_string())
        })?;
        Ok((api, method))
    }

    fn compile(
        &self,
        api: &ApiTemplate,
        method: &MethodTemplate,
        invocation: &Invocation,
    ) -> Result<Request<Bytes>> {
        let mut req = RequestCompiler::new(
            &self.registry,
            api,
            method,
            invocation,
            self.caller.as_deref(),
        )
        .compile()?;
        for filter in effective_filters(api, method) {
            req = filter.filter(req)?;
        }
        Ok(req)
    }

    async fn dispatch(
        &self,
        api: &ApiTemplate,
        method: &MethodTemplate,
        invocation: &Invocation,
    ) -> Result<Reply> {
        let req = self.compile(api, method, invocation)?;
        debug!("{} -> {} {}", invocation, req.method(), req.uri());

        let send = self.http.send(req);
        let resp = match self.registry.timeout_for(api.name(), method.name()) {
            Some(timeout) => tokio::time::timeout(timeout, send).await.map_err(|_| {
                Error::new(ErrorKind::TimedOut, "invocation timed out")
                    .with_operation("Client::invoke")
                    .with_context("invocation", invocation.to_string())
                    .with_context("timeout", format!("{timeout:?}"))
                    .set_temporary()
            })??,
            None => send.await?,
        };

        if !resp.status().is_success() {
            let err = from_response(resp)
                .with_operation("Client::invoke")
                .with_context("invocation", invocation.to_string());
            let fallback = method
                .fallback
                .as_ref()
                .or(api.fallback.as_ref())
                .cloned()
                .unwrap_or(Fallback::Propagate);
            return fallback.apply(err);
        }

        let parser = match &method.parser {
            Some(parser) => parser.clone(),
            None => ResponseParser::derive(method.returns.as_ref().unwrap_or(&ReturnKind::Unit)),
        };
        let mut reply = parser.parse(resp)?;
        if let Some(transform) = &method.transform {
            reply = transform(reply)?;
        }
        Ok(reply)
    }

    fn resolve_provided(
        &self,
        method: &MethodTemplate,
        qualifier: Option<&str>,
        invocation: &Invocation,
    ) -> Result<Reply> {
        self.registry
            .provided(method.name(), qualifier)
            .map(Reply::Provided)
            .ok_or_else(|| {
                Error::new(ErrorKind::ConfigInvalid, "no provided instance for this method")
                    .with_operation("Client::invoke")
                    .with_context("invocation", invocation.to_string())
            })
    }

    /// A delegate reply carries a child client scoped to the calling
    /// invocation: the caller's path and parameters prefix everything
    /// the child builds. A missing optional target replies JSON null.
    fn resolve_delegate(
        &self,
        api: &ApiTemplate,
        method: &MethodTemplate,
        target: &str,
        optional: bool,
        invocation: Invocation,
    ) -> Result<Reply> {
        if self.registry.api(target).is_none() {
            if optional {
                return Ok(Reply::Json(Value::Null));
            }
            return Err(Error::new(ErrorKind::ConfigInvalid, "delegate target api is not registered")
                .with_operation("Client::invoke")
                .with_context("invocation", invocation.to_string())
                .with_context("target", target.to_string()));
        }
        let caller = CallerContext {
            api: api.clone(),
            method: method.clone(),
            invocation,
            parent: self.caller.clone(),
        };
        let child = Client {
            registry: self.registry.clone(),
            http: self.http.clone(),
            caller: Some(Arc::new(caller)),
        };
        Ok(Reply::Delegate(child))
    }
}
