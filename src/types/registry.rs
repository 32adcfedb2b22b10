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

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use http::Uri;
use log::debug;

use crate::raw::ApiTemplate;
use crate::raw::MethodKind;
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// A provided instance, registered at build time and resolved by
/// provides methods.
pub type Provided = Arc<dyn Any + Send + Sync>;

/// The immutable provider description: api templates, endpoints,
/// provided instances and timeouts.
///
/// A registry is assembled once through [`RegistryBuilder`] and
/// validated eagerly, so a misdescribed api fails at startup instead
/// of on first use. After build it is shared read-only between
/// clients.
#[derive(Clone)]
pub struct Registry {
    apis: Vec<ApiTemplate>,
    default_endpoint: Uri,
    endpoints: HashMap<String, Uri>,
    provides: HashMap<(String, Option<String>), Provided>,
    timeouts: HashMap<String, Duration>,
    default_timeout: Option<Duration>,
    api_version: Option<String>,
    build_version: Option<String>,
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("apis", &self.apis.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("default_endpoint", &self.default_endpoint)
            .field("endpoints", &self.endpoints)
            .field("api_version", &self.api_version)
            .field("build_version", &self.build_version)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Start building a registry against the given default endpoint.
    pub fn builder(default_endpoint: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder {
            apis: Vec::new(),
            default_endpoint: default_endpoint.into(),
            endpoints: Vec::new(),
            provides: HashMap::new(),
            timeouts: HashMap::new(),
            default_timeout: None,
            api_version: None,
            build_version: None,
        }
    }

    /// Look up an api template by name.
    pub fn api(&self, name: &str) -> Option<&ApiTemplate> {
        self.apis.iter().find(|a| a.name() == name)
    }

    /// The provider default endpoint.
    pub fn default_endpoint(&self) -> &Uri {
        &self.default_endpoint
    }

    /// A named endpoint, when registered.
    pub fn named_endpoint(&self, name: &str) -> Option<&Uri> {
        self.endpoints.get(name)
    }

    /// The api version substituted for `{apiVersion}` tokens.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// The build version substituted for `{buildVersion}` tokens.
    pub fn build_version(&self) -> Option<&str> {
        self.build_version.as_deref()
    }

    /// Resolve a provided instance, preferring the qualified entry.
    pub fn provided(&self, key: &str, qualifier: Option<&str>) -> Option<Provided> {
        if let Some(q) = qualifier {
            if let Some(v) = self.provides.get(&(key.to_string(), Some(q.to_string()))) {
                return Some(v.clone());
            }
        }
        self.provides.get(&(key.to_string(), None)).cloned()
    }

    /// The timeout for one invocation: `Api.method` first, then `Api`,
    /// then the default.
    pub fn timeout_for(&self, api: &str, method: &str) -> Option<Duration> {
        self.timeouts
            .get(&format!("{api}.{method}"))
            .or_else(|| self.timeouts.get(api))
            .copied()
            .or(self.default_timeout)
    }
}

/// Builder for [`Registry`].
pub struct RegistryBuilder {
    apis: Vec<ApiTemplate>,
    default_endpoint: String,
    endpoints: Vec<(String, String)>,
    provides: HashMap<(String, Option<String>), Provided>,
    timeouts: HashMap<String, Duration>,
    default_timeout: Option<Duration>,
    api_version: Option<String>,
    build_version: Option<String>,
}

impl Debug for RegistryBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("apis", &self.apis.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("default_endpoint", &self.default_endpoint)
            .finish_non_exhaustive()
    }
}

impl RegistryBuilder {
    /// Register an api template.
    pub fn api(mut self, api: ApiTemplate) -> Self {
        self.apis.push(api);
        self
    }

    /// Register a named endpoint for templates using
    /// [`ApiTemplate::endpoint_named`].
    pub fn endpoint(mut self, name: impl Into<String>, uri: impl Into<String>) -> Self {
        self.endpoints.push((name.into(), uri.into()));
        self
    }

    /// Register a provided instance under `key`.
    pub fn provide(mut self, key: impl Into<String>, value: Provided) -> Self {
        self.provides.insert((key.into(), None), value);
        self
    }

    /// Register a provided instance under `key` narrowed by
    /// `qualifier`.
    pub fn provide_qualified(
        mut self,
        key: impl Into<String>,
        qualifier: impl Into<String>,
        value: Provided,
    ) -> Self {
        self.provides.insert((key.into(), Some(qualifier.into())), value);
        self
    }

    /// Set the timeout for `Api.method` or a whole `Api`.
    pub fn timeout(mut self, scope: impl Into<String>, timeout: Duration) -> Self {
        self.timeouts.insert(scope.into(), timeout);
        self
    }

    /// Set the timeout applied when no scoped one matches.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Set the api version for `{apiVersion}` tokens.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the build version for `{buildVersion}` tokens.
    pub fn build_version(mut self, version: impl Into<String>) -> Self {
        self.build_version = Some(version.into());
        self
    }

    /// Validate the description and freeze it.
    pub fn build(self) -> Result<Registry> {
        debug!("registry build started: {self:?}");

        let default_endpoint = parse_endpoint("default", &self.default_endpoint)?;
        let mut endpoints = HashMap::new();
        for (name, uri) in &self.endpoints {
            let uri = parse_endpoint(name, uri)?;
            endpoints.insert(name.clone(), uri);
        }

        for (i, api) in self.apis.iter().enumerate() {
            if self.apis[..i].iter().any(|a| a.name() == api.name()) {
                return Err(config_error("api registered twice")
                    .with_context("api", api.name().to_string()));
            }
            self.validate_api(api, &endpoints)?;
        }

        let registry = Registry {
            apis: self.apis,
            default_endpoint,
            endpoints,
            provides: self.provides,
            timeouts: self.timeouts,
            default_timeout: self.default_timeout,
            api_version: self.api_version,
            build_version: self.build_version,
        };

        debug!("registry build finished: {registry:?}");
        Ok(registry)
    }

    fn validate_api(&self, api: &ApiTemplate, endpoints: &HashMap<String, Uri>) -> Result<()> {
        if let Some(name) = &api.endpoint {
            if !endpoints.contains_key(name) {
                return Err(config_error("api references an unregistered endpoint")
                    .with_context("api", api.name().to_string())
                    .with_context("endpoint", name.to_string()));
            }
        }
        for (i, method) in api.methods.iter().enumerate() {
            if api.methods[..i].iter().any(|m| m.name() == method.name()) {
                return Err(config_error("method declared twice")
                    .with_context("api", api.name().to_string())
                    .with_context("method", method.name().to_string()));
            }
            if let Some(name) = &method.endpoint {
                if !endpoints.contains_key(name) {
                    return Err(config_error("method references an unregistered endpoint")
                        .with_context("api", api.name().to_string())
                        .with_context("method", method.name().to_string())
                        .with_context("endpoint", name.to_string()));
                }
            }
            match &method.kind {
                MethodKind::Http => {}
                MethodKind::Provides { qualifier } => {
                    let found = self
                        .provides
                        .contains_key(&(method.name().to_string(), qualifier.clone()))
                        || self.provides.contains_key(&(method.name().to_string(), None));
                    if !found {
                        return Err(config_error("no provided instance for this method")
                            .with_context("api", api.name().to_string())
                            .with_context("method", method.name().to_string()));
                    }
                }
                MethodKind::Delegate { target, optional } => {
                    if !optional && !self.apis.iter().any(|a| a.name() == target) {
                        return Err(config_error("delegate target api is not registered")
                            .with_context("api", api.name().to_string())
                            .with_context("method", method.name().to_string())
                            .with_context("target", target.to_string()));
                    }
                }
            }
        }
        Ok(())
    }
}

fn parse_endpoint(name: &str, uri: &str) -> Result<Uri> {
    let uri = Uri::from_str(uri).map_err(|err| {
        config_error("endpoint is not a valid uri")
            .with_context("endpoint", name.to_string())
            .with_context("uri", uri.to_string())
            .set_source(err)
    })?;
    if uri.authority().is_none() {
        return Err(config_error("endpoint has no host")
            .with_context("endpoint", name.to_string())
            .with_context("uri", uri.to_string()));
    }
    Ok(uri)
}

fn config_error(message: &'static str) -> Error {
    Error::new(ErrorKind::ConfigInvalid, message).with_operation("RegistryBuilder::build")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::raw::MethodTemplate;

    fn servers_api() -> ApiTemplate {
        ApiTemplate::new("Servers")
            .path("/servers")
            .method(MethodTemplate::get("list"))
    }

    #[test]
    fn test_build_minimal() {
        let registry = Registry::builder("http://example.com/v2")
            .api(servers_api())
            .build()
            .unwrap();
        assert!(registry.api("Servers").is_some());
        assert_eq!(registry.default_endpoint().path(), "/v2");
    }

    #[test]
    fn test_invalid_default_endpoint() {
        let err = Registry::builder("/no-host").api(servers_api()).build().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_named_endpoints_parsed_and_referenced() {
        let api = ApiTemplate::new("Servers")
            .path("/servers")
            .endpoint_named("compute")
            .method(MethodTemplate::get("list"));
        let registry = Registry::builder("http://example.com")
            .endpoint("compute", "http://compute.example.com")
            .api(api.clone())
            .build()
            .unwrap();
        assert_eq!(
            registry.named_endpoint("compute").map(|u| u.host()),
            Some(Some("compute.example.com"))
        );

        let err = Registry::builder("http://example.com").api(api).build().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_duplicate_api_rejected() {
        let err = Registry::builder("http://example.com")
            .api(servers_api())
            .api(servers_api())
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_delegate_target_checked_eagerly() {
        let api = ApiTemplate::new("Top")
            .method(MethodTemplate::delegate("servers", "Servers"));
        let err = Registry::builder("http://example.com").api(api).build().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigInvalid);

        let api = ApiTemplate::new("Top")
            .method(MethodTemplate::delegate("servers", "Servers").optional());
        Registry::builder("http://example.com").api(api).build().unwrap();
    }

    #[test]
    fn test_provides_checked_eagerly() {
        let api = ApiTemplate::new("Top").method(MethodTemplate::provides("context"));
        let err = Registry::builder("http://example.com").api(api.clone()).build().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigInvalid);

        Registry::builder("http://example.com")
            .api(api)
            .provide("context", Arc::new("tenant-1".to_string()))
            .build()
            .unwrap();
    }

    #[test]
    fn test_timeout_resolution_order() {
        let registry = Registry::builder("http://example.com")
            .api(servers_api())
            .timeout("Servers.list", Duration::from_secs(5))
            .timeout("Servers", Duration::from_secs(30))
            .default_timeout(Duration::from_secs(60))
            .build()
            .unwrap();
        assert_eq!(
            registry.timeout_for("Servers", "list"),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            registry.timeout_for("Servers", "get"),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            registry.timeout_for("Flavors", "get"),
            Some(Duration::from_secs(60))
        );
    }
}
