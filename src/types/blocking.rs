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

use tokio::runtime::Handle;

use crate::types::Invocation;
use crate::Client;
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// A synchronous facade over [`Client`] for callers without an async
/// context of their own.
///
/// The facade drives the async client on a captured tokio runtime
/// handle. Registry timeouts apply to the underlying dispatch exactly
/// as they do for async callers.
///
/// # Notes
///
/// Create the facade where a runtime handle is reachable. In a pure
/// blocking program, own a runtime and enter it first:
///
/// ```no_run
/// use restkit::BlockingClient;
/// # fn example(client: restkit::Client) -> restkit::Result<()> {
/// let runtime = tokio::runtime::Builder::new_multi_thread()
///     .enable_all()
///     .build()
///     .unwrap();
/// let _guard = runtime.enter();
/// let blocking = BlockingClient::new(client)?;
/// # Ok(())
/// # }
/// ```
///
/// Calling [`BlockingClient::invoke`] from inside an async task blocks
/// that runtime thread; keep the facade on dedicated blocking threads.
#[derive(Debug, Clone)]
pub struct BlockingClient {
    inner: Client,
    handle: Handle,
}

impl BlockingClient {
    /// Wrap a client, capturing the ambient runtime handle.
    pub fn new(inner: Client) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| {
            Error::new(
                ErrorKind::Unexpected,
                "BlockingClient must be created under a tokio context",
            )
            .with_operation("BlockingClient::new")
        })?;
        Ok(Self { inner, handle })
    }

    /// Wrap a client with an explicit runtime handle.
    pub fn with_handle(inner: Client, handle: Handle) -> Self {
        Self { inner, handle }
    }

    /// The wrapped async client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Dispatch one invocation, blocking until it replies or the
    /// registry timeout for it expires.
    pub fn invoke(&self, invocation: Invocation) -> Result<crate::raw::Reply> {
        self.handle.block_on(self.inner.invoke(invocation))
    }
}
