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
use http::Response;
use http::StatusCode;

use crate::Error;
use crate::ErrorKind;

/// The captured parts of a non-2xx response, carried as the source of
/// the error returned to the caller.
#[derive(Debug)]
pub struct ErrorResponse {
    parts: http::response::Parts,
    body: Bytes,
}

impl ErrorResponse {
    /// The response status code.
    pub fn status_code(&self) -> StatusCode {
        self.parts.status
    }

    /// The response headers.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.parts.headers
    }

    /// The raw response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl Display for ErrorResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "status code: {:?}, headers: {:?}", self.parts.status, self.parts.headers)?;
        match std::str::from_utf8(&self.body) {
            Ok(body) => write!(f, ", body: {body:?}"),
            Err(_) => write!(f, ", body: <{} bytes>", self.body.len()),
        }
    }
}

impl std::error::Error for ErrorResponse {}

/// Split a response into an [`ErrorResponse`] for error reporting.
pub fn parse_error_response(resp: Response<Bytes>) -> ErrorResponse {
    let (parts, body) = resp.into_parts();
    ErrorResponse { parts, body }
}

/// Map a response status code to the error kind and temporariness it
/// carries.
///
/// Retryable statuses are 429 and the transient 5xx family.
pub fn classify_status(status: StatusCode) -> (ErrorKind, bool) {
    match status {
        StatusCode::NOT_FOUND => (ErrorKind::NotFound, false),
        StatusCode::UNAUTHORIZED => (ErrorKind::Unauthorized, false),
        StatusCode::FORBIDDEN => (ErrorKind::PermissionDenied, false),
        StatusCode::TOO_MANY_REQUESTS => (ErrorKind::RateLimited, true),
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => (ErrorKind::Unexpected, true),
        _ => (ErrorKind::Unexpected, false),
    }
}

/// Build the error for a non-2xx response, keeping the full response
/// as the error source.
pub fn from_response(resp: Response<Bytes>) -> Error {
    let er = parse_error_response(resp);
    let (kind, temporary) = classify_status(er.status_code());

    let mut err = Error::new(kind, "server returned an error response")
        .with_context("status", er.status_code().as_str());
    if temporary {
        err = err.set_temporary();
    }
    err.set_source(er)
}

/// Build the error when the request itself cannot be constructed.
pub fn new_request_build_error(err: http::Error) -> Error {
    Error::new(ErrorKind::Unexpected, "building http request")
        .with_operation("http_util::Request::build")
        .set_source(err)
}
