use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub id: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// Reply content chosen by the runtime. Platform payload shaping happens in
/// the outbound adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text { body: String },
    Menu { header: String, body: String, options: Vec<MenuOption> },
    List { header: String, body: String, button_label: String, rows: Vec<ListRow> },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// Plain-text rendering, used for the assistant turn kept in session memory.
    pub fn summary(&self) -> String {
        match self {
            Self::Text { body } => body.clone(),
            Self::Menu { body, options, .. } => {
                let titles = options.iter().map(|option| option.title.as_str()).collect::<Vec<_>>();
                format!("{body} [{}]", titles.join(" | "))
            }
            Self::List { body, rows, .. } => {
                let titles = rows.iter().map(|row| row.title.as_str()).collect::<Vec<_>>();
                format!("{body} [{}]", titles.join(" | "))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum InteractiveReply {
    ButtonReply(String),
    ListReply(String),
}
