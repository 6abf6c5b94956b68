//! Content fragments and their canonical text encoding.
//!
//! A fragment is one typed piece of message content; ordering within a
//! message is significant. The canonical text form is a bracket code
//! (`[at,qq=10001]`) whose concatenation yields the `raw_message`
//! rendering; plain text is escaped so brackets in user text never read
//! as codes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
/// One typed content fragment of a wire message.
pub enum Fragment {
    Text {
        text: String,
    },
    At {
        /// Public id of the target, or `"all"` for a broadcast mention.
        qq: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Reply {
        /// Short sequence id of the quoted message.
        id: String,
    },
    Image {
        file: String,
        sub_type: u32,
        url: String,
        file_size: String,
    },
    Video {
        file: String,
        path: String,
        url: String,
        file_size: String,
    },
    File {
        file: String,
        path: String,
        file_id: String,
        url: String,
        file_size: String,
    },
    Record {
        file: String,
        path: String,
        url: String,
        file_size: String,
    },
    Json {
        data: String,
    },
    Markdown {
        data: String,
    },
    Face {
        id: String,
    },
    Dice {
        result: String,
    },
    Rps {
        result: String,
    },
    Mface {
        summary: String,
        url: String,
        emoji_id: String,
        emoji_package_id: String,
        key: String,
    },
    Forward {
        /// Kernel id of the forwarded-bundle container message.
        id: String,
    },
}

impl Fragment {
    /// Canonical text form of this fragment.
    pub fn canonical_text(&self) -> String {
        match self {
            Fragment::Text { text } => escape_text(text),
            other => {
                let (name, params) = other.code_params();
                let mut out = String::from("[");
                out.push_str(name);
                for (key, value) in params {
                    out.push(',');
                    out.push_str(key);
                    out.push('=');
                    out.push_str(&escape_value(&value));
                }
                out.push(']');
                out
            }
        }
    }

    fn code_params(&self) -> (&'static str, Vec<(&'static str, String)>) {
        match self {
            Fragment::Text { .. } => ("text", Vec::new()),
            Fragment::At { qq, name } => {
                let mut params = vec![("qq", qq.clone())];
                if let Some(name) = name {
                    params.push(("name", name.clone()));
                }
                ("at", params)
            }
            Fragment::Reply { id } => ("reply", vec![("id", id.clone())]),
            Fragment::Image {
                file,
                sub_type,
                url,
                file_size,
            } => (
                "image",
                vec![
                    ("file", file.clone()),
                    ("sub_type", sub_type.to_string()),
                    ("url", url.clone()),
                    ("file_size", file_size.clone()),
                ],
            ),
            Fragment::Video {
                file,
                url,
                file_size,
                ..
            } => (
                "video",
                vec![
                    ("file", file.clone()),
                    ("url", url.clone()),
                    ("file_size", file_size.clone()),
                ],
            ),
            Fragment::File {
                file,
                file_id,
                file_size,
                ..
            } => (
                "file",
                vec![
                    ("file", file.clone()),
                    ("file_id", file_id.clone()),
                    ("file_size", file_size.clone()),
                ],
            ),
            Fragment::Record {
                file, file_size, ..
            } => (
                "record",
                vec![("file", file.clone()), ("file_size", file_size.clone())],
            ),
            Fragment::Json { data } => ("json", vec![("data", data.clone())]),
            Fragment::Markdown { data } => ("markdown", vec![("data", data.clone())]),
            Fragment::Face { id } => ("face", vec![("id", id.clone())]),
            Fragment::Dice { result } => ("dice", vec![("result", result.clone())]),
            Fragment::Rps { result } => ("rps", vec![("result", result.clone())]),
            Fragment::Mface {
                summary, emoji_id, ..
            } => (
                "mface",
                vec![("summary", summary.clone()), ("emoji_id", emoji_id.clone())],
            ),
            Fragment::Forward { id } => ("forward", vec![("id", id.clone())]),
        }
    }
}

/// Concatenates canonical text forms in emission order and trims the
/// result; this is the `raw_message` rendering.
pub fn encode_fragments(fragments: &[Fragment]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        out.push_str(&fragment.canonical_text());
    }
    out.trim().to_string()
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('[', "&#91;")
        .replace(']', "&#93;")
}

fn escape_value(value: &str) -> String {
    escape_text(value).replace(',', "&#44;")
}
