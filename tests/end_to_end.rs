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

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use http::Request;
use http::Response;
use http::StatusCode;
use pretty_assertions::assert_eq;
use restkit::raw::ApiTemplate;
use restkit::raw::Fallback;
use restkit::raw::HttpClient;
use restkit::raw::HttpFetch;
use restkit::raw::MethodTemplate;
use restkit::raw::ParamBinding;
use restkit::raw::RequestFilter;
use restkit::raw::ReturnKind;
use restkit::raw::NULL;
use restkit::Arg;
use restkit::Client;
use restkit::ErrorKind;
use restkit::Invocation;
use restkit::Registry;
use restkit::RequestOptions;
use restkit::Result;
use serde_json::json;

/// A transport that records requests and replays canned responses.
#[derive(Default)]
struct MockTransport {
    requests: Mutex<Vec<Request<Bytes>>>,
    responses: Mutex<VecDeque<(StatusCode, &'static str)>>,
    delay: Option<Duration>,
}

impl MockTransport {
    fn replying(responses: Vec<(StatusCode, &'static str)>) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into_iter().collect()),
            delay: None,
        })
    }

    fn stalled(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    fn request(&self, i: usize) -> Request<Bytes> {
        let mut requests = self.requests.lock().unwrap();
        std::mem::replace(
            &mut requests[i],
            Request::builder().body(Bytes::new()).unwrap(),
        )
    }
}

impl HttpFetch for MockTransport {
    async fn fetch(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.requests.lock().unwrap().push(req);
        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((StatusCode::OK, ""));
        Ok(Response::builder()
            .status(status)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap())
    }
}

fn compute_registry() -> Registry {
    let servers = ApiTemplate::new("Servers")
        .path("/servers")
        .consumes("application/json")
        .method(MethodTemplate::get("list").returns(ReturnKind::select_json("servers")))
        .method(
            MethodTemplate::get("get")
                .path("/{id}")
                .bind(ParamBinding::path("id"))
                .returns(ReturnKind::select_json("server"))
                .fallback(Fallback::NullOnNotFound),
        )
        .method(
            MethodTemplate::post("suspend")
                .path("/{id}/action")
                .bind(ParamBinding::path("id"))
                .payload_literal(r#"{"suspend":null}"#)
                .produces("application/json")
                .returns(ReturnKind::Bool)
                .fallback(Fallback::FalseOnNotFound),
        )
        .method(
            MethodTemplate::post("create")
                .bind(ParamBinding::payload("name"))
                .bind(ParamBinding::payload("flavor").key("flavorRef"))
                .wrap_with("server")
                .returns(ReturnKind::Uri),
        );

    let flavors = ApiTemplate::new("Flavors")
        .path("/flavors")
        .query("format", "json")
        .method(
            MethodTemplate::get("extra_spec")
                .path("/{flavor_id}/os-extra_specs/{key}")
                .bind(ParamBinding::path("flavor_id"))
                .bind(ParamBinding::path("key"))
                .query("format", NULL)
                .returns(ReturnKind::json()),
        );

    let tenants = ApiTemplate::new("Tenants")
        .path("/{tenant}")
        .method(
            MethodTemplate::delegate("servers", "TenantServers")
                .bind(ParamBinding::path("tenant")),
        );

    let tenant_servers = ApiTemplate::new("TenantServers").path("/servers").method(
        MethodTemplate::get("get")
            .path("/{id}")
            .bind(ParamBinding::path("id"))
            .returns(ReturnKind::json()),
    );

    Registry::builder("http://compute.example.com/v2")
        .api(servers)
        .api(flavors)
        .api(tenants)
        .api(tenant_servers)
        .build()
        .unwrap()
}

fn client_over(transport: Arc<MockTransport>) -> Client {
    Client::with_http_client(compute_registry(), HttpClient::with(transport))
}

#[tokio::test]
async fn test_suspend_replies_true_on_success() {
    let transport = MockTransport::replying(vec![(StatusCode::ACCEPTED, "")]);
    let client = client_over(transport.clone());

    let reply = client
        .invoke(Invocation::new("Servers", "suspend").with_arg("id", "s-1"))
        .await
        .unwrap();
    assert_eq!(reply.as_bool(), Some(true));

    let req = transport.request(0);
    assert_eq!(req.method(), http::Method::POST);
    assert_eq!(
        req.uri().to_string(),
        "http://compute.example.com/v2/servers/s-1/action"
    );
    assert_eq!(req.headers()["content-type"], "application/json");
    assert_eq!(req.body().as_ref(), br#"{"suspend":null}"#);
}

#[tokio::test]
async fn test_suspend_falls_back_to_false_on_missing_server() {
    let transport = MockTransport::replying(vec![(StatusCode::NOT_FOUND, "no such server")]);
    let client = client_over(transport);

    let reply = client
        .invoke(Invocation::new("Servers", "suspend").with_arg("id", "gone"))
        .await
        .unwrap();
    assert_eq!(reply.as_bool(), Some(false));
}

#[tokio::test]
async fn test_fallback_does_not_swallow_authorization_failures() {
    let transport = MockTransport::replying(vec![(StatusCode::UNAUTHORIZED, "bad token")]);
    let client = client_over(transport);

    let err = client
        .invoke(Invocation::new("Servers", "get").with_arg("id", "s-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(err.is_authorization());
}

#[tokio::test]
async fn test_get_selects_wrapper_field_and_nulls_on_404() {
    let transport = MockTransport::replying(vec![
        (StatusCode::OK, r#"{"server": {"id": "s-1", "status": "ACTIVE"}}"#),
        (StatusCode::NOT_FOUND, ""),
    ]);
    let client = client_over(transport);

    let reply = client
        .invoke(Invocation::new("Servers", "get").with_arg("id", "s-1"))
        .await
        .unwrap();
    assert_eq!(reply.as_json(), Some(&json!({"id": "s-1", "status": "ACTIVE"})));

    let reply = client
        .invoke(Invocation::new("Servers", "get").with_arg("id", "gone"))
        .await
        .unwrap();
    assert_eq!(reply.as_json(), Some(&serde_json::Value::Null));
}

#[tokio::test]
async fn test_method_level_null_erases_api_level_query() {
    let transport = MockTransport::replying(vec![(StatusCode::OK, "{}")]);
    let client = client_over(transport.clone());

    client
        .invoke(
            Invocation::new("Flavors", "extra_spec")
                .with_arg("flavor_id", "f1")
                .with_arg("key", "disk"),
        )
        .await
        .unwrap();

    let req = transport.request(0);
    assert_eq!(
        req.uri().to_string(),
        "http://compute.example.com/v2/flavors/f1/os-extra_specs/disk?format"
    );
}

#[tokio::test]
async fn test_wrapped_payload_from_bound_params() {
    let transport = MockTransport::replying(vec![(
        StatusCode::CREATED,
        "http://compute.example.com/v2/servers/s-9",
    )]);
    let client = client_over(transport.clone());

    let reply = client
        .invoke(
            Invocation::new("Servers", "create")
                .with_arg("name", "vm-1")
                .with_arg("flavor", "f1"),
        )
        .await
        .unwrap();
    assert_eq!(
        reply.as_uri().map(|u| u.to_string()),
        Some("http://compute.example.com/v2/servers/s-9".to_string())
    );

    let req = transport.request(0);
    let body: serde_json::Value = serde_json::from_slice(req.body()).unwrap();
    assert_eq!(body, json!({"server": {"flavorRef": "f1", "name": "vm-1"}}));
}

#[tokio::test]
async fn test_missing_argument_names_the_parameter() {
    let client = client_over(MockTransport::replying(vec![]));

    let err = client
        .invoke(Invocation::new("Servers", "get"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(
        err.to_string().contains("param{id} for invocation Servers.get"),
        "{err}"
    );
}

#[tokio::test]
async fn test_delegate_merges_caller_path_and_tokens() {
    let transport = MockTransport::replying(vec![(StatusCode::OK, "{}")]);
    let client = client_over(transport.clone());

    let child = client
        .invoke(Invocation::new("Tenants", "servers").with_arg("tenant", "acme"))
        .await
        .unwrap()
        .into_client()
        .unwrap();
    child
        .invoke(Invocation::new("TenantServers", "get").with_arg("id", "s-1"))
        .await
        .unwrap();

    let req = transport.request(0);
    assert_eq!(
        req.uri().to_string(),
        "http://compute.example.com/v2/acme/servers/s-1"
    );
}

#[tokio::test]
async fn test_request_options_extend_the_template() {
    let transport = MockTransport::replying(vec![(StatusCode::OK, r#"{"servers": []}"#)]);
    let client = client_over(transport.clone());

    let options = RequestOptions::new()
        .query("limit", "10")
        .header("x-trace", "t-1")
        .path_suffix("detail");
    client
        .invoke(Invocation::new("Servers", "list").with_raw_arg("options", Arg::Options(options)))
        .await
        .unwrap();

    let req = transport.request(0);
    assert_eq!(
        req.uri().to_string(),
        "http://compute.example.com/v2/servers/detail?limit=10"
    );
    assert_eq!(req.headers()["x-trace"], "t-1");
    assert_eq!(req.headers()["accept"], "application/json");
}

#[tokio::test]
async fn test_produces_without_payload_sends_the_content_type() {
    let registry = Registry::builder("http://compute.example.com/v2")
        .api(
            ApiTemplate::new("Servers").path("/servers").method(
                MethodTemplate::post("noop")
                    .path("/noop")
                    .produces("application/json"),
            ),
        )
        .build()
        .unwrap();
    let client = Client::with_http_client(registry, HttpClient::default());

    let req = client
        .build_request(&Invocation::new("Servers", "noop"))
        .unwrap();
    assert_eq!(req.headers()["content-type"], "application/json");
    assert_eq!(req.headers()["content-length"], "0");
    assert!(req.body().is_empty());
}

#[tokio::test]
async fn test_explicit_endpoint_argument_wins_over_a_bound_one() {
    let registry = Registry::builder("http://compute.example.com/v2")
        .api(
            ApiTemplate::new("Servers").path("/servers").method(
                MethodTemplate::get("list").bind(ParamBinding::endpoint("region")),
            ),
        )
        .build()
        .unwrap();
    let client = Client::with_http_client(registry, HttpClient::default());

    let req = client
        .build_request(
            &Invocation::new("Servers", "list")
                .with_arg("region", "http://bound.example.com")
                .with_raw_arg(
                    "override",
                    Arg::Endpoint(http::Uri::from_static("http://explicit.example.com")),
                ),
        )
        .unwrap();
    assert_eq!(req.uri().host(), Some("explicit.example.com"));
}

#[tokio::test]
async fn test_delegation_nests_through_a_second_level() {
    let transport = MockTransport::replying(vec![(StatusCode::OK, "{}")]);
    let registry = Registry::builder("http://compute.example.com/v2")
        .api(
            ApiTemplate::new("Tenants").path("/{tenant}").method(
                MethodTemplate::delegate("regions", "Regions")
                    .bind(ParamBinding::path("tenant")),
            ),
        )
        .api(
            ApiTemplate::new("Regions").path("/regions/{region}").method(
                MethodTemplate::delegate("servers", "RegionServers")
                    .bind(ParamBinding::path("region")),
            ),
        )
        .api(
            ApiTemplate::new("RegionServers").path("/servers").method(
                MethodTemplate::get("get")
                    .path("/{id}")
                    .bind(ParamBinding::path("id"))
                    .returns(ReturnKind::json()),
            ),
        )
        .build()
        .unwrap();
    let client = Client::with_http_client(registry, HttpClient::with(transport.clone()));

    let regions = client
        .invoke(Invocation::new("Tenants", "regions").with_arg("tenant", "acme"))
        .await
        .unwrap()
        .into_client()
        .unwrap();
    let servers = regions
        .invoke(Invocation::new("Regions", "servers").with_arg("region", "eu"))
        .await
        .unwrap()
        .into_client()
        .unwrap();
    servers
        .invoke(Invocation::new("RegionServers", "get").with_arg("id", "s-1"))
        .await
        .unwrap();

    let req = transport.request(0);
    assert_eq!(
        req.uri().to_string(),
        "http://compute.example.com/v2/acme/regions/eu/servers/s-1"
    );
}

#[tokio::test]
async fn test_undeclared_return_kind_replies_unit() {
    let transport = MockTransport::replying(vec![(StatusCode::NO_CONTENT, "")]);
    let registry = Registry::builder("http://compute.example.com/v2")
        .api(
            ApiTemplate::new("Servers").path("/servers").method(
                MethodTemplate::delete("destroy")
                    .path("/{id}")
                    .bind(ParamBinding::path("id")),
            ),
        )
        .build()
        .unwrap();
    let client = Client::with_http_client(registry, HttpClient::with(transport));

    let reply = client
        .invoke(Invocation::new("Servers", "destroy").with_arg("id", "s-1"))
        .await
        .unwrap();
    assert!(reply.is_unit());
}

#[tokio::test]
async fn test_endpoint_argument_overrides_the_default() {
    let client = client_over(MockTransport::replying(vec![]));

    let invocation = Invocation::new("Servers", "list").with_raw_arg(
        "region",
        Arg::Endpoint(http::Uri::from_static("http://eu.example.com/v3")),
    );
    let req = client.build_request(&invocation).unwrap();
    assert_eq!(
        req.uri().to_string(),
        "http://eu.example.com/v3/servers"
    );

    // A path-only endpoint inherits the default host.
    let invocation = Invocation::new("Servers", "list")
        .with_raw_arg("region", Arg::Endpoint(http::Uri::from_static("/v3")));
    let req = client.build_request(&invocation).unwrap();
    assert_eq!(
        req.uri().to_string(),
        "http://compute.example.com/v3/servers"
    );
}

#[tokio::test]
async fn test_build_request_is_deterministic() {
    let client = client_over(MockTransport::replying(vec![]));

    let invocation = Invocation::new("Servers", "create")
        .with_arg("name", "vm-1")
        .with_arg("flavor", "f1");
    let a = client.build_request(&invocation).unwrap();
    let b = client.build_request(&invocation).unwrap();
    assert_eq!(a.uri(), b.uri());
    assert_eq!(a.body(), b.body());
}

#[tokio::test]
async fn test_part_binding_promotes_forms_into_a_multipart_body() {
    let registry = Registry::builder("http://objects.example.com")
        .api(
            ApiTemplate::new("Objects").path("/objects").method(
                MethodTemplate::post("upload")
                    .bind(ParamBinding::part("data").filename("blob.bin"))
                    .bind(ParamBinding::form("label")),
            ),
        )
        .build()
        .unwrap();
    let client = Client::with_http_client(registry, HttpClient::default());

    let req = client
        .build_request(
            &Invocation::new("Objects", "upload")
                .with_arg("data", "abc")
                .with_arg("label", "backup"),
        )
        .unwrap();
    let content_type = req.headers()["content-type"].to_str().unwrap().to_string();
    assert!(
        content_type.starts_with("multipart/form-data; boundary="),
        "{content_type}"
    );
    let body = std::str::from_utf8(req.body()).unwrap();
    assert!(body.contains("name=\"data\""), "{body}");
    assert!(body.contains("filename=\"blob.bin\""), "{body}");
    assert!(body.contains("name=\"label\""), "{body}");
    assert!(body.contains("backup"), "{body}");
}

#[tokio::test]
async fn test_skip_encoding_leaves_named_characters_raw() {
    let registry = Registry::builder("http://objects.example.com")
        .api(
            ApiTemplate::new("Objects").path("/objects").method(
                MethodTemplate::get("get")
                    .path("/{name}")
                    .bind(ParamBinding::path("name"))
                    .skip_encoding([':']),
            ),
        )
        .build()
        .unwrap();
    let client = Client::with_http_client(registry, HttpClient::default());

    let req = client
        .build_request(&Invocation::new("Objects", "get").with_arg("name", "a:b c"))
        .unwrap();
    assert_eq!(
        req.uri().to_string(),
        "http://objects.example.com/objects/a:b%20c"
    );
}

#[tokio::test]
async fn test_virtual_host_sets_the_host_header() {
    let registry = Registry::builder("http://objects.example.com")
        .api(
            ApiTemplate::new("Objects")
                .path("/objects")
                .virtual_host()
                .method(MethodTemplate::get("list")),
        )
        .build()
        .unwrap();
    let client = Client::with_http_client(registry, HttpClient::default());

    let req = client
        .build_request(&Invocation::new("Objects", "list"))
        .unwrap();
    assert_eq!(req.headers()["host"], "objects.example.com");
}

#[tokio::test(start_paused = true)]
async fn test_registry_timeout_cancels_a_stalled_call() {
    let transport = MockTransport::stalled(Duration::from_secs(60));
    let registry = Registry::builder("http://compute.example.com/v2")
        .api(
            ApiTemplate::new("Servers")
                .path("/servers")
                .method(MethodTemplate::get("list").returns(ReturnKind::json())),
        )
        .timeout("Servers.list", Duration::from_secs(1))
        .build()
        .unwrap();
    let client = Client::with_http_client(registry, HttpClient::with(transport));

    let err = client
        .invoke(Invocation::new("Servers", "list"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert!(err.is_temporary());
}

#[tokio::test]
async fn test_filters_run_in_declaration_order() {
    struct AuthFilter;
    impl RequestFilter for AuthFilter {
        fn filter(&self, mut req: Request<Bytes>) -> Result<Request<Bytes>> {
            req.headers_mut()
                .insert("x-auth-token", http::HeaderValue::from_static("tok-1"));
            Ok(req)
        }
    }

    let transport = MockTransport::replying(vec![(StatusCode::OK, "{}")]);
    let registry = Registry::builder("http://compute.example.com/v2")
        .api(
            ApiTemplate::new("Servers")
                .path("/servers")
                .filter(Arc::new(AuthFilter))
                .method(MethodTemplate::get("list").returns(ReturnKind::json())),
        )
        .build()
        .unwrap();
    let client = Client::with_http_client(registry, HttpClient::with(transport.clone()));

    client.invoke(Invocation::new("Servers", "list")).await.unwrap();
    let req = transport.request(0);
    assert_eq!(req.headers()["x-auth-token"], "tok-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_facade_dispatches_from_a_plain_thread() {
    let transport = MockTransport::replying(vec![(StatusCode::OK, r#"{"servers": []}"#)]);
    let client = client_over(transport);
    let blocking =
        restkit::BlockingClient::with_handle(client, tokio::runtime::Handle::current());

    let reply = tokio::task::spawn_blocking(move || {
        blocking.invoke(Invocation::new("Servers", "list"))
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(reply.as_json(), Some(&json!([])));
}
