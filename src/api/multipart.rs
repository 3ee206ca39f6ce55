use reqwest::multipart::{Form, Part};

use crate::error::{RequestError, Result};

/// A multipart payload: text fields alongside file contents.
///
/// Unlike `reqwest`'s own form this one can be cloned and inspected, so a
/// request can be examined before the transport turns it into bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    fields: Vec<MultipartField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        bytes: Vec<u8>,
        file_name: String,
        mime_type: Option<String>,
    },
}

impl MultipartField {
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(MultipartField::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a file from its contents.
    pub fn file_bytes(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        file_name: impl Into<String>,
        mime_type: Option<&str>,
    ) -> Self {
        self.fields.push(MultipartField::File {
            name: name.into(),
            bytes: bytes.into(),
            file_name: file_name.into(),
            mime_type: mime_type.map(str::to_string),
        });
        self
    }

    pub fn fields(&self) -> &[MultipartField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert into a `reqwest` form, ready to send.
    pub(crate) fn into_reqwest(self) -> Result<Form> {
        let mut form = Form::new();
        for field in self.fields {
            form = match field {
                MultipartField::Text { name, value } => form.text(name, value),
                MultipartField::File {
                    name,
                    bytes,
                    file_name,
                    mime_type,
                } => {
                    let mut part = Part::bytes(bytes).file_name(file_name);
                    if let Some(mime) = mime_type {
                        part = part
                            .mime_str(&mime)
                            .map_err(|_| RequestError::InvalidMime(mime))?;
                    }
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}
