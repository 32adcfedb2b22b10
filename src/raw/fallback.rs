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

//! Fallbacks: mapping a failed call to a benign reply.

use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use serde_json::Value;

use crate::raw::Reply;
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// A caller-supplied fallback: `Some(reply)` swallows the error,
/// `None` propagates it.
pub type CustomFallbackFn = Arc<dyn Fn(&Error) -> Option<Reply> + Send + Sync>;

/// What to reply when a call fails.
///
/// Authorization failures always propagate, even through an
/// on-not-found fallback; swallowing a credential problem as "absent"
/// hides real misconfiguration.
#[derive(Clone, Default)]
pub enum Fallback {
    /// Propagate every error.
    #[default]
    Propagate,
    /// Reply `false` when the resource is not found.
    FalseOnNotFound,
    /// Reply `true` when the resource is not found.
    TrueOnNotFound,
    /// Reply JSON null when the resource is not found.
    NullOnNotFound,
    /// Reply an empty JSON list when the resource is not found.
    EmptyListOnNotFound,
    /// Reply unit when the resource is not found.
    VoidOnNotFound,
    /// A caller-supplied fallback.
    Custom(CustomFallbackFn),
}

impl Debug for Fallback {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Fallback::Propagate => "Propagate",
            Fallback::FalseOnNotFound => "FalseOnNotFound",
            Fallback::TrueOnNotFound => "TrueOnNotFound",
            Fallback::NullOnNotFound => "NullOnNotFound",
            Fallback::EmptyListOnNotFound => "EmptyListOnNotFound",
            Fallback::VoidOnNotFound => "VoidOnNotFound",
            Fallback::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

impl Fallback {
    /// Map a failed call to a reply, or propagate the error.
    pub fn apply(&self, err: Error) -> Result<Reply> {
        if err.is_authorization() {
            return Err(err);
        }
        match self {
            Fallback::Propagate => Err(err),
            Fallback::FalseOnNotFound => on_not_found(err, || Reply::Bool(false)),
            Fallback::TrueOnNotFound => on_not_found(err, || Reply::Bool(true)),
            Fallback::NullOnNotFound => on_not_found(err, || Reply::Json(Value::Null)),
            Fallback::EmptyListOnNotFound => {
                on_not_found(err, || Reply::Json(Value::Array(Vec::new())))
            }
            Fallback::VoidOnNotFound => on_not_found(err, || Reply::Unit),
            Fallback::Custom(f) => match f(&err) {
                Some(reply) => Ok(reply),
                None => Err(err),
            },
        }
    }
}

fn on_not_found(err: Error, reply: impl FnOnce() -> Reply) -> Result<Reply> {
    if err.kind() == ErrorKind::NotFound {
        Ok(reply())
    } else {
        Err(err)
    }
}
