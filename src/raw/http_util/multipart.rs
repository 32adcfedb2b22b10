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

use bytes::Bytes;
use bytes::BytesMut;

/// Multipart is a builder for a `multipart/form-data` body.
///
/// The boundary is generated per instance so repeated builds of the
/// same request never collide.
#[derive(Debug)]
pub struct Multipart {
    boundary: String,
    parts: Vec<FormDataPart>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Create a new multipart body with a random boundary.
    pub fn new() -> Self {
        Self {
            boundary: format!("restkit-{}", uuid::Uuid::new_v4()),
            parts: Vec::new(),
        }
    }

    /// Insert a part into the body.
    pub fn part(mut self, part: FormDataPart) -> Self {
        self.parts.push(part);
        self
    }

    /// The `Content-Type` header value for this body.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Whether any part has been added.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Serialize the parts into the final body.
    pub fn build(self) -> Bytes {
        let mut buf = BytesMut::new();

        for part in self.parts {
            buf.extend_from_slice(b"--");
            buf.extend_from_slice(self.boundary.as_bytes());
            buf.extend_from_slice(b"\r\n");
            part.write_into(&mut buf);
        }

        buf.extend_from_slice(b"--");
        buf.extend_from_slice(self.boundary.as_bytes());
        buf.extend_from_slice(b"--\r\n");

        buf.freeze()
    }
}

/// FormDataPart is a single part of a `multipart/form-data` body.
#[derive(Debug)]
pub struct FormDataPart {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    content: Bytes,
}

impl FormDataPart {
    /// Create a new part with the given field name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            content: Bytes::new(),
        }
    }

    /// Set the filename carried in the content disposition.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the part's content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the part's content.
    pub fn content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = content.into();
        self
    }

    fn write_into(self, buf: &mut BytesMut) {
        buf.extend_from_slice(b"content-disposition: form-data; name=\"");
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(b"\"");
        if let Some(filename) = &self.filename {
            buf.extend_from_slice(b"; filename=\"");
            buf.extend_from_slice(filename.as_bytes());
            buf.extend_from_slice(b"\"");
        }
        buf.extend_from_slice(b"\r\n");
        if let Some(content_type) = &self.content_type {
            buf.extend_from_slice(b"content-type: ");
            buf.extend_from_slice(content_type.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(&self.content);
        buf.extend_from_slice(b"\r\n");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_multipart_layout() {
        let multipart = Multipart::new()
            .part(FormDataPart::new("metadata").content("{}"))
            .part(
                FormDataPart::new("file")
                    .filename("disk.img")
                    .content_type("application/octet-stream")
                    .content("bytes"),
            );

        let boundary = multipart.boundary.clone();
        let body = multipart.build();
        let text = std::str::from_utf8(&body).unwrap();

        let expected = format!(
            "--{boundary}\r\n\
             content-disposition: form-data; name=\"metadata\"\r\n\
             \r\n\
             {{}}\r\n\
             --{boundary}\r\n\
             content-disposition: form-data; name=\"file\"; filename=\"disk.img\"\r\n\
             content-type: application/octet-stream\r\n\
             \r\n\
             bytes\r\n\
             --{boundary}--\r\n"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_boundaries_are_unique() {
        assert_ne!(Multipart::new().boundary, Multipart::new().boundary);
    }
}
