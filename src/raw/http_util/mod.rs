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

//! http_util contains the transport seam and the shared helpers for
//! building and reading requests.

mod client;
pub use client::HttpClient;
pub use client::HttpFetch;
pub use client::HttpFetchDyn;
pub use client::HttpFetcher;

mod error;
pub use error::classify_status;
pub use error::from_response;
pub use error::new_request_build_error;
pub use error::parse_error_response;
pub use error::ErrorResponse;

mod multipart;
pub use multipart::FormDataPart;
pub use multipart::Multipart;

mod uri;
pub use uri::percent_decode_path;
pub use uri::percent_encode_path;
pub use uri::percent_encode_path_skipping;
pub use uri::percent_encode_query;
pub use uri::query_pairs;
