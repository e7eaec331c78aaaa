use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single public image as listed by the provider for one datacenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    id: String,
    os: String,
    code: String,
    name: String,
}

impl Image {
    pub fn new(
        id: impl Into<String>,
        os: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            os: os.into(),
            code: code.into(),
            name: name.into(),
        }
    }

    /// Decode one catalog entry. Entries missing a field, or carrying a
    /// non-string value, yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let field = |key: &str| value.get(key).and_then(Value::as_str);

        Some(Self::new(field("id")?, field("os")?, field("code")?, field("name")?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// OS family
    /// eg. Ubuntu
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Provider code of the image
    /// eg. 22.04 64bit
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
