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

//! Raw modules provide the building blocks the public client is made
//! of: the template vocabulary, the request compiler, response
//! parsing, fallbacks and the HTTP transport seam.
//!
//! These types are exposed for users who describe their own apis or
//! plug in custom binders, parsers and transports. The interfaces here
//! are stable but lower level than [`crate::Client`].

mod template;
pub use template::ApiTemplate;
pub use template::BindKind;
pub use template::MethodKind;
pub use template::MethodTemplate;
pub use template::ParamBinding;
pub use template::ParamParserFn;
pub use template::PayloadSpec;
pub use template::RequestFilter;
pub use template::ReturnKind;
pub use template::NULL;

mod build;
pub use build::effective_filters;
pub use build::expand_tokens;
pub use build::expand_tokens_lenient;
pub use build::join_path;
pub use build::CallerContext;
pub use build::Params;
pub use build::RequestCompiler;
pub use build::RequestDraft;

mod binder;
pub use binder::BindToJsonPayload;
pub use binder::Binder;
pub use binder::MapBinder;

mod transform;
pub use transform::CustomParserFn;
pub use transform::Reply;
pub use transform::ResponseParser;
pub use transform::TransformFn;

mod fallback;
pub use fallback::CustomFallbackFn;
pub use fallback::Fallback;

pub mod http_util;
pub use http_util::HttpClient;
pub use http_util::HttpFetch;
pub use http_util::HttpFetchDyn;
pub use http_util::HttpFetcher;

/// BoxedFuture is the type alias of [`futures::future::BoxFuture`].
pub type BoxedFuture<'a, T> = futures::future::BoxFuture<'a, T>;
