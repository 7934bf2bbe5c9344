//! Typed representation of the plugin page protocol.
//!
//! Every polymorphic node is a closed `enum` tagged by `type`; unknown tags are
//! rejected by [`validate`] before serde ever sees the document. Optional wire fields
//! stay `Option` so that decoding and re-encoding keeps exactly the fields a plugin
//! sent.

mod command;
pub mod validate;

pub use command::{Command, Invocation};

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Page {
    List(List),
    Detail(Detail),
    Form(Form),
}

impl Page {
    pub fn title(&self) -> Option<&str> {
        match self {
            Page::List(l) => l.title.as_deref(),
            Page::Detail(d) => d.title.as_deref(),
            Page::Form(f) => f.title.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Page::List(_) => "list",
            Page::Detail(_) => "detail",
            Page::Form(_) => "form",
        }
    }

    /// Local page used to surface a failed load without touching the plugin.
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Page::Detail(Detail {
            title: Some(title.into()),
            preview: Preview::Static {
                text: message.into(),
                language: None,
            },
            actions: Some(vec![Action::Exit(ExitAction {
                title: Some("Quit".into()),
                key: Some("q".into()),
            })]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_view: Option<EmptyView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_preview: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ListItem>>,
}

impl List {
    pub fn items(&self) -> &[ListItem] {
        self.items.as_deref().unwrap_or_default()
    }

    pub fn shows_preview(&self) -> bool {
        self.show_preview.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmptyView {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Preview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
}

impl ListItem {
    pub fn accessories(&self) -> &[String] {
        self.accessories.as_deref().unwrap_or_default()
    }

    pub fn actions(&self) -> &[Action] {
        self.actions.as_deref().unwrap_or_default()
    }

    /// Case-insensitive match against title, subtitle and accessories.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let q = query.to_lowercase();
        self.title.to_lowercase().contains(&q)
            || self
                .subtitle
                .as_deref()
                .map(|s| s.to_lowercase().contains(&q))
                .unwrap_or(false)
            || self
                .accessories()
                .iter()
                .any(|a| a.to_lowercase().contains(&q))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub preview: Preview,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
}

impl Detail {
    pub fn actions(&self) -> &[Action] {
        self.actions.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub submit_action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Preview {
    Static {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Dynamic {
        command: Command,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl Preview {
    pub fn language(&self) -> Option<&str> {
        match self {
            Preview::Static { language, .. } | Preview::Dynamic { language, .. } => {
                language.as_deref()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Copy(CopyAction),
    Open(OpenAction),
    Exit(ExitAction),
    Reload(ReloadAction),
    Run(RunAction),
    Push(PushAction),
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Copy(_) => "copy",
            Action::Open(_) => "open",
            Action::Exit(_) => "exit",
            Action::Reload(_) => "reload",
            Action::Run(_) => "run",
            Action::Push(_) => "push",
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Action::Copy(a) => a.title.as_deref(),
            Action::Open(a) => a.title.as_deref(),
            Action::Exit(a) => a.title.as_deref(),
            Action::Reload(a) => a.title.as_deref(),
            Action::Run(a) => a.title.as_deref(),
            Action::Push(a) => a.title.as_deref(),
        }
    }

    /// Title shown in menus; falls back to a label derived from the action type.
    pub fn display_title(&self) -> String {
        if let Some(t) = self.title() {
            return t.to_string();
        }
        match self {
            Action::Copy(_) => "Copy".into(),
            Action::Open(_) => "Open".into(),
            Action::Exit(_) => "Exit".into(),
            Action::Reload(_) => "Reload".into(),
            Action::Run(_) => "Run".into(),
            Action::Push(_) => "Open Page".into(),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Action::Copy(a) => a.key.as_deref(),
            Action::Open(a) => a.key.as_deref(),
            Action::Exit(a) => a.key.as_deref(),
            Action::Reload(a) => a.key.as_deref(),
            Action::Run(a) => a.key.as_deref(),
            Action::Push(a) => a.key.as_deref(),
        }
    }

    /// Inputs collected before the action runs. `exit` and `reload` never take any.
    pub fn inputs(&self) -> &[Input] {
        let inputs = match self {
            Action::Copy(a) => &a.inputs,
            Action::Open(a) => &a.inputs,
            Action::Run(a) => &a.inputs,
            Action::Push(a) => &a.inputs,
            Action::Exit(_) | Action::Reload(_) => return &[],
        };
        inputs.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Input>>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Input>>,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExitAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReloadAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Input>>,
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<OnSuccess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnSuccess {
    Reload,
    Copy,
    Open,
    Exit,
    Push,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Input>>,
    pub page: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Input {
    Textfield(TextFieldInput),
    Textarea(TextAreaInput),
    Checkbox(CheckboxInput),
    Dropdown(DropdownInput),
}

impl Input {
    pub fn name(&self) -> &str {
        match self {
            Input::Textfield(i) => &i.name,
            Input::Textarea(i) => &i.name,
            Input::Checkbox(i) => &i.name,
            Input::Dropdown(i) => &i.name,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Input::Textfield(i) => &i.title,
            Input::Textarea(i) => &i.title,
            Input::Checkbox(i) => &i.title,
            Input::Dropdown(i) => &i.title,
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Input::Textfield(TextFieldInput { secure: Some(true), .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFieldInput {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAreaInput {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckboxInput {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_substitution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_substitution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownInput {
    pub name: String,
    pub title: String,
    pub items: Vec<DropdownItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownItem {
    pub title: String,
    pub value: String,
}

/// Decode one plugin document. Nothing partially decoded escapes: either the whole
/// tree validates and converts, or a [`SchemaError`] names the first bad field.
pub fn decode_page(text: &str) -> Result<Page, SchemaError> {
    let v: JsonValue = serde_json::from_str(text).map_err(|e| {
        SchemaError::new(
            "$",
            format!("invalid JSON at line {} column {}: {e}", e.line(), e.column()),
        )
    })?;
    decode_page_value(v)
}

pub fn decode_page_value(v: JsonValue) -> Result<Page, SchemaError> {
    validate::validate_page(&v, "$")?;
    serde_json::from_value(v).map_err(|e| SchemaError::new("$", e.to_string()))
}

#[cfg(test)]
pub fn decode_action_value(v: JsonValue) -> Result<Action, SchemaError> {
    validate::validate_action(&v, "$")?;
    serde_json::from_value(v).map_err(|e| SchemaError::new("$", e.to_string()))
}

#[cfg(test)]
pub fn decode_input_value(v: JsonValue) -> Result<Input, SchemaError> {
    validate::validate_input(&v, "$")?;
    serde_json::from_value(v).map_err(|e| SchemaError::new("$", e.to_string()))
}
