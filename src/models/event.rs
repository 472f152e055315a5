use serde::{Deserialize, Serialize};

/// Events pushed to the host's UI transport.
///
/// Serialises as `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Event {
    Status {
        description: String,
        done: bool,
    },
    Image {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        width: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        height: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        alt: Option<String>,
    },
    Message {
        content: String,
    },
}

impl Event {
    pub fn status(description: impl Into<String>, done: bool) -> Self {
        Event::Status {
            description: description.into(),
            done,
        }
    }

    pub fn message(content: impl Into<String>) -> Self {
        Event::Message {
            content: content.into(),
        }
    }
}
