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

//! restkit dispatches declaratively described REST apis through one
//! generic engine.
//!
//! A provider api is data, not code: each interface is an
//! [`raw::ApiTemplate`] whose [`raw::MethodTemplate`]s declare the
//! verb, path template, parameter bindings, payload strategy, response
//! shape and failure fallback of one operation. Templates are
//! collected into a [`Registry`], validated eagerly, and every call is
//! an [`Invocation`] executed by the same [`Client`].
//!
//! # Quick Start
//!
//! ```no_run
//! use restkit::raw::ApiTemplate;
//! use restkit::raw::Fallback;
//! use restkit::raw::MethodTemplate;
//! use restkit::raw::ParamBinding;
//! use restkit::raw::ReturnKind;
//! use restkit::Client;
//! use restkit::Invocation;
//! use restkit::Registry;
//!
//! #[tokio::main]
//! async fn main() -> restkit::Result<()> {
//!     let servers = ApiTemplate::new("Servers")
//!         .path("/servers")
//!         .consumes("application/json")
//!         .method(
//!             MethodTemplate::get("get")
//!                 .path("/{id}")
//!                 .bind(ParamBinding::path("id"))
//!                 .returns(ReturnKind::select_json("server"))
//!                 .fallback(Fallback::NullOnNotFound),
//!         );
//!
//!     let registry = Registry::builder("https://compute.example.com/v2")
//!         .api(servers)
//!         .build()?;
//!     let client = Client::new(registry)?;
//!
//!     let server = client
//!         .invoke(Invocation::new("Servers", "get").with_arg("id", "s-1"))
//!         .await?;
//!     println!("{:?}", server.as_json());
//!     Ok(())
//! }
//! ```
//!
//! # Layers
//!
//! - [`Registry`]: the validated, immutable provider description.
//! - [`Client`]: compiles invocations into requests, applies filters,
//!   dispatches them and parses the reply.
//! - [`BlockingClient`]: a synchronous facade over [`Client`].
//! - [`raw`]: the building blocks, for custom binders, parsers,
//!   filters and transports.

#![warn(missing_docs)]

mod types;
pub use types::Arg;
pub use types::BlockingClient;
pub use types::Client;
pub use types::Error;
pub use types::ErrorKind;
pub use types::Invocation;
pub use types::Provided;
pub use types::Registry;
pub use types::RegistryBuilder;
pub use types::RequestOptions;
pub use types::Result;

pub mod raw;
