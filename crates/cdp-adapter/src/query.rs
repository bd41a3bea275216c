use serde::{Deserialize, Serialize};
use std::fmt;

/// Element lookup understood by every [`BrowserSession`](crate::BrowserSession).
///
/// Name, label, placeholder and non-exact text matching are case-insensitive
/// substring matches over trimmed text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ElementQuery {
    Css { selector: String },
    Role { role: String, name: String },
    Label { text: String },
    Placeholder { text: String },
    Text { content: String, exact: bool },
}

impl ElementQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn text(content: impl Into<String>, exact: bool) -> Self {
        Self::Text {
            content: content.into(),
            exact,
        }
    }

    /// CSS selector when the query is already one.
    pub fn as_css(&self) -> Option<&str> {
        match self {
            Self::Css { selector } => Some(selector),
            _ => None,
        }
    }
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { selector } => write!(f, "css={selector}"),
            Self::Role { role, name } => write!(f, "role={role}[name={name:?}]"),
            Self::Label { text } => write!(f, "label={text:?}"),
            Self::Placeholder { text } => write!(f, "placeholder={text:?}"),
            Self::Text { content, exact } => {
                if *exact {
                    write!(f, "text={content:?}")
                } else {
                    write!(f, "text~={content:?}")
                }
            }
        }
    }
}

/// Element state a wait is satisfied by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    Attached,
    Visible,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attached => "attached",
            Self::Visible => "visible",
        }
    }
}
