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

//! Response parsing: turning a raw HTTP response into the typed reply
//! a method declares.

use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use http::header;
use http::Response;
use http::Uri;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::raw::template::ReturnKind;
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// A function composed over the parsed reply, the counterpart of a
/// declared response transformer.
pub type TransformFn = Arc<dyn Fn(Reply) -> Result<Reply> + Send + Sync>;

/// The typed result of a successful call.
///
/// One variant per return shape a method can declare; the typed
/// accessors deserialize on demand.
pub enum Reply {
    /// No value.
    Unit,
    /// Success flag derived from the response status.
    Bool(bool),
    /// The response body as text.
    Text(String),
    /// A resource location.
    Uri(Uri),
    /// The raw body bytes.
    Bytes(Bytes),
    /// The untouched HTTP response.
    Response(Response<Bytes>),
    /// A parsed JSON value.
    Json(Value),
    /// The body of an XML response, deserialized on demand.
    Xml(String),
    /// A child client handle produced by a delegate method.
    Delegate(crate::Client),
    /// A provided instance resolved from the registry.
    Provided(Arc<dyn std::any::Any + Send + Sync>),
}

impl Debug for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Unit => f.write_str("Unit"),
            Reply::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Reply::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Reply::Uri(v) => f.debug_tuple("Uri").field(v).finish(),
            Reply::Bytes(v) => f.debug_tuple("Bytes").field(&v.len()).finish(),
            Reply::Response(v) => f.debug_tuple("Response").field(&v.status()).finish(),
            Reply::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Reply::Xml(v) => f.debug_tuple("Xml").field(v).finish(),
            Reply::Delegate(_) => f.write_str("Delegate"),
            Reply::Provided(_) => f.write_str("Provided"),
        }
    }
}

impl Reply {
    /// Returns true for the unit reply.
    pub fn is_unit(&self) -> bool {
        matches!(self, Reply::Unit)
    }

    /// The success flag of a boolean reply.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Reply::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The text of a textual reply.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The uri of a location reply.
    pub fn as_uri(&self) -> Option<&Uri> {
        match self {
            Reply::Uri(v) => Some(v),
            _ => None,
        }
    }

    /// The parsed JSON value, when this is a JSON reply.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Reply::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Deserialize a JSON reply into `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Reply::Json(v) => serde_json::from_value(v).map_err(|err| {
                Error::new(ErrorKind::Unexpected, "deserialize json reply")
                    .with_operation("Reply::json")
                    .set_source(err)
            }),
            v => Err(unexpected_variant("json", &v)),
        }
    }

    /// Deserialize an XML reply into `T`.
    pub fn xml<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Reply::Xml(text) => quick_xml::de::from_str(&text).map_err(|err| {
                Error::new(ErrorKind::Unexpected, "deserialize xml reply")
                    .with_operation("Reply::xml")
                    .set_source(err)
            }),
            v => Err(unexpected_variant("xml", &v)),
        }
    }

    /// The raw bytes of a stream reply.
    pub fn into_bytes(self) -> Result<Bytes> {
        match self {
            Reply::Bytes(v) => Ok(v),
            v => Err(unexpected_variant("bytes", &v)),
        }
    }

    /// The untouched response of an identity reply.
    pub fn into_response(self) -> Result<Response<Bytes>> {
        match self {
            Reply::Response(v) => Ok(v),
            v => Err(unexpected_variant("response", &v)),
        }
    }

    /// The child client of a delegate reply.
    pub fn into_client(self) -> Result<crate::Client> {
        match self {
            Reply::Delegate(v) => Ok(v),
            v => Err(unexpected_variant("delegate", &v)),
        }
    }

    /// Downcast a provided instance to `T`.
    pub fn provided<T: Send + Sync + 'static>(self) -> Result<Arc<T>> {
        match self {
            Reply::Provided(v) => v.downcast::<T>().map_err(|_| {
                Error::new(ErrorKind::Unexpected, "provided instance has a different type")
                    .with_operation("Reply::provided")
            }),
            v => Err(unexpected_variant("provided", &v)),
        }
    }
}

fn unexpected_variant(wanted: &'static str, got: &Reply) -> Error {
    let got = match got {
        Reply::Unit => "unit",
        Reply::Bool(_) => "bool",
        Reply::Text(_) => "text",
        Reply::Uri(_) => "uri",
        Reply::Bytes(_) => "bytes",
        Reply::Response(_) => "response",
        Reply::Json(_) => "json",
        Reply::Xml(_) => "xml",
        Reply::Delegate(_) => "delegate",
        Reply::Provided(_) => "provided",
    };
    Error::new(ErrorKind::Unexpected, "reply has a different shape")
        .with_operation("Reply")
        .with_context("wanted", wanted)
        .with_context("got", got)
}

/// A caller-supplied parser consuming the raw response.
pub type CustomParserFn = Arc<dyn Fn(Response<Bytes>) -> Result<Reply> + Send + Sync>;

/// How a successful response body becomes a [`Reply`].
///
/// Derived from the declared [`ReturnKind`] unless an explicit parser
/// is set on the method template.
#[derive(Clone)]
pub enum ResponseParser {
    /// Drop the payload and reply unit.
    ReleasePayload,
    /// Reply `true`; the non-2xx path never reaches the parser.
    TrueIfOk,
    /// Reply the body as text.
    TextIfOk,
    /// Reply the `Location` header, falling back to the body.
    UriFromLocation,
    /// Reply the raw body bytes.
    RawBytes,
    /// Reply the untouched response.
    Identity,
    /// Parse the body as JSON, with optional field selection.
    Json {
        /// Select a single named field before replying.
        select: Option<String>,
        /// Collapse a one-element list to its element (or null).
        only_element: bool,
        /// Unwrap a single-entry JSON object to its value.
        unwrap: bool,
    },
    /// Keep the body for on-demand XML deserialization.
    Xml,
    /// A caller-supplied parser.
    Custom(CustomParserFn),
}

impl Debug for ResponseParser {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseParser::ReleasePayload => "ReleasePayload",
            ResponseParser::TrueIfOk => "TrueIfOk",
            ResponseParser::TextIfOk => "TextIfOk",
            ResponseParser::UriFromLocation => "UriFromLocation",
            ResponseParser::RawBytes => "RawBytes",
            ResponseParser::Identity => "Identity",
            ResponseParser::Json { .. } => "Json",
            ResponseParser::Xml => "Xml",
            ResponseParser::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

impl ResponseParser {
    /// Derive the parser from a declared return shape.
    pub fn derive(returns: &ReturnKind) -> Self {
        match returns {
            ReturnKind::Unit => ResponseParser::ReleasePayload,
            ReturnKind::Bool => ResponseParser::TrueIfOk,
            ReturnKind::Text => ResponseParser::TextIfOk,
            ReturnKind::Uri => ResponseParser::UriFromLocation,
            ReturnKind::Stream => ResponseParser::RawBytes,
            ReturnKind::Response => ResponseParser::Identity,
            ReturnKind::Json {
                select,
                only_element,
                unwrap,
            } => ResponseParser::Json {
                select: select.clone(),
                only_element: *only_element,
                unwrap: *unwrap,
            },
            ReturnKind::Xml => ResponseParser::Xml,
        }
    }

    /// Parse a successful response into a reply.
    pub fn parse(&self, resp: Response<Bytes>) -> Result<Reply> {
        match self {
            ResponseParser::ReleasePayload => Ok(Reply::Unit),
            ResponseParser::TrueIfOk => Ok(Reply::Bool(resp.status().is_success())),
            ResponseParser::TextIfOk => {
                let body = body_text(resp.into_body())?;
                Ok(Reply::Text(body))
            }
            ResponseParser::UriFromLocation => parse_location(resp),
            ResponseParser::RawBytes => Ok(Reply::Bytes(resp.into_body())),
            ResponseParser::Identity => Ok(Reply::Response(resp)),
            ResponseParser::Json {
                select,
                only_element,
                unwrap,
            } => {
                let mut value: Value =
                    serde_json::from_slice(resp.body()).map_err(|err| {
                        Error::new(ErrorKind::Unexpected, "parse response body as json")
                            .with_operation("ResponseParser::parse")
                            .set_source(err)
                    })?;
                if let Some(field) = select {
                    value = value.get_mut(field).map(Value::take).unwrap_or(Value::Null);
                }
                if *unwrap {
                    value = unwrap_single_entry(value)?;
                }
                if *only_element {
                    value = take_only_element(value)?;
                }
                Ok(Reply::Json(value))
            }
            ResponseParser::Xml => {
                let body = body_text(resp.into_body())?;
                Ok(Reply::Xml(body))
            }
            ResponseParser::Custom(f) => f(resp),
        }
    }
}

fn body_text(body: Bytes) -> Result<String> {
    String::from_utf8(body.to_vec()).map_err(|err| {
        Error::new(ErrorKind::Unexpected, "response body is not valid utf-8")
            .with_operation("ResponseParser::parse")
            .set_source(err)
    })
}

fn parse_location(resp: Response<Bytes>) -> Result<Reply> {
    let location = match resp.headers().get(header::LOCATION) {
        Some(v) => v
            .to_str()
            .map_err(|err| {
                Error::new(ErrorKind::Unexpected, "location header is not valid utf-8")
                    .with_operation("ResponseParser::parse")
                    .set_source(err)
            })?
            .to_string(),
        None => body_text(resp.into_body())?.trim().to_string(),
    };
    let uri = Uri::from_str(&location).map_err(|err| {
        Error::new(ErrorKind::Unexpected, "location is not a valid uri")
            .with_operation("ResponseParser::parse")
            .with_context("location", location)
            .set_source(err)
    })?;
    Ok(Reply::Uri(uri))
}

fn unwrap_single_entry(value: Value) -> Result<Value> {
    match value {
        Value::Object(map) if map.len() == 1 => {
            Ok(map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null))
        }
        Value::Object(map) => Err(Error::new(
            ErrorKind::Unexpected,
            "cannot unwrap a json object with more than one entry",
        )
        .with_operation("ResponseParser::parse")
        .with_context("entries", map.len().to_string())),
        v => Ok(v),
    }
}

fn take_only_element(value: Value) -> Result<Value> {
    match value {
        Value::Array(mut items) => match items.len() {
            0 => Ok(Value::Null),
            1 => Ok(items.remove(0)),
            n => Err(Error::new(
                ErrorKind::Unexpected,
                "expected at most one element in the response list",
            )
            .with_operation("ResponseParser::parse")
            .with_context("elements", n.to_string())),
        },
        v => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn response(body: &'static str) -> Response<Bytes> {
        Response::builder()
            .status(200)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
    }

    #[test]
    fn test_derivation_table() {
        let cases = vec![
            (ReturnKind::Unit, "ReleasePayload"),
            (ReturnKind::Bool, "TrueIfOk"),
            (ReturnKind::Text, "TextIfOk"),
            (ReturnKind::Uri, "UriFromLocation"),
            (ReturnKind::Stream, "RawBytes"),
            (ReturnKind::Response, "Identity"),
            (ReturnKind::json(), "Json"),
            (ReturnKind::Xml, "Xml"),
        ];
        for (returns, expected) in cases {
            let parser = ResponseParser::derive(&returns);
            assert_eq!(format!("{parser:?}"), expected, "{returns:?}");
        }
    }

    #[test]
    fn test_json_select_field() {
        let parser = ResponseParser::Json {
            select: Some("server".to_string()),
            only_element: false,
            unwrap: false,
        };
        let reply = parser
            .parse(response(r#"{"server": {"id": "s1"}, "other": 2}"#))
            .unwrap();
        assert_eq!(reply.as_json(), Some(&json!({"id": "s1"})));
    }

    #[test]
    fn test_json_unwrap_and_only_element() {
        let parser = ResponseParser::Json {
            select: None,
            only_element: true,
            unwrap: true,
        };
        let reply = parser.parse(response(r#"{"flavors": [{"id": "f1"}]}"#)).unwrap();
        assert_eq!(reply.as_json(), Some(&json!({"id": "f1"})));

        let reply = parser.parse(response(r#"{"flavors": []}"#)).unwrap();
        assert_eq!(reply.as_json(), Some(&Value::Null));
    }

    #[test]
    fn test_uri_from_location_header() {
        let resp = Response::builder()
            .status(201)
            .header("location", "http://example.com/servers/s1")
            .body(Bytes::new())
            .unwrap();
        let reply = ResponseParser::UriFromLocation.parse(resp).unwrap();
        assert_eq!(
            reply.as_uri().map(|u| u.to_string()),
            Some("http://example.com/servers/s1".to_string())
        );
    }

    #[test]
    fn test_uri_from_body_fallback() {
        let reply = ResponseParser::UriFromLocation
            .parse(response("http://example.com/servers/s2\n"))
            .unwrap();
        assert_eq!(
            reply.as_uri().map(|u| u.to_string()),
            Some("http://example.com/servers/s2".to_string())
        );
    }
}
