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

//! Binders: hooks that place an argument into the request in ways the
//! built-in binding kinds cannot express.

use serde_json::Value;

use crate::raw::RequestDraft;
use crate::types::Arg;
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// Places one bound argument into the request draft.
///
/// Runs after static parameters and the built-in bindings, in binding
/// declaration order.
pub trait Binder: Send + Sync + 'static {
    /// Bind `value` into the draft.
    fn bind(&self, draft: &mut RequestDraft, value: &Arg) -> Result<()>;
}

/// Produces the request payload from the accumulated payload-parameter
/// map. When present it wins over per-argument [`Binder`]s.
pub trait MapBinder: Send + Sync + 'static {
    /// Bind the payload parameters into the draft.
    fn bind_map(&self, draft: &mut RequestDraft, params: &[(String, Value)]) -> Result<()>;
}

/// Serializes the bound argument as the JSON request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindToJsonPayload;

impl Binder for BindToJsonPayload {
    fn bind(&self, draft: &mut RequestDraft, value: &Arg) -> Result<()> {
        let value = value.as_value().ok_or_else(|| {
            Error::new(ErrorKind::InvalidInput, "argument is not a json value")
                .with_operation("BindToJsonPayload::bind")
        })?;
        let body = serde_json::to_vec(value).map_err(|err| {
            Error::new(ErrorKind::Unexpected, "serialize json payload")
                .with_operation("BindToJsonPayload::bind")
                .set_source(err)
        })?;
        draft.set_payload(body, Some("application/json".to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use http::Uri;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_bind_to_json_payload() {
        let mut draft = RequestDraft::new(
            Method::POST,
            Uri::from_static("http://example.com"),
            "/servers".to_string(),
        );
        let arg = Arg::Value(serde_json::json!({"name": "vm-1"}));
        BindToJsonPayload.bind(&mut draft, &arg).unwrap();

        let req = draft.finish().unwrap();
        assert_eq!(req.headers()["content-type"], "application/json");
        assert_eq!(req.body().as_ref(), br#"{"name":"vm-1"}"#);
    }
}
