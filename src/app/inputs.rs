//! Input collection: turns an action's `inputs` into named values ready for
//! interpolation.

use crate::error::InputError;
use crate::model::Input;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn as_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Text(s) => crate::services::config::truthy(s),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub value: Value,
    /// Text spliced into `${name}` references.
    pub substitution: String,
    pub secure: bool,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secure {
            f.debug_struct("Entry")
                .field("name", &self.name)
                .field("value", &"***")
                .finish()
        } else {
            f.debug_struct("Entry")
                .field("name", &self.name)
                .field("value", &self.value)
                .field("substitution", &self.substitution)
                .finish()
        }
    }
}

/// Collected values in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputValues {
    entries: Vec<Entry>,
}

impl InputValues {
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn substitution(&self, name: &str) -> Option<&str> {
        self.get(name).map(|e| e.substitution.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `name=value` pairs safe to show or log.
    pub fn readback(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                if e.secure {
                    format!("{}=***", e.name)
                } else {
                    format!("{}={}", e.name, e.substitution)
                }
            })
            .collect()
    }

    /// Secure values, so messages built from them can be scrubbed.
    pub fn secrets(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.secure && !e.substitution.is_empty())
            .map(|e| e.substitution.as_str())
            .collect()
    }

    fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }
}

/// Source of answers for one collection pass. `Ok(None)` keeps the pre-filled
/// default untouched; `Err(InputError::Cancelled)` aborts the whole pass.
pub trait Prompter {
    fn prompt(&mut self, input: &Input, default: &Value) -> Result<Option<Value>, InputError>;
}

/// Replays answers gathered elsewhere (the form UI), one per input in order.
pub struct Answers(pub Vec<Option<Value>>);

impl Prompter for Answers {
    fn prompt(&mut self, _input: &Input, _default: &Value) -> Result<Option<Value>, InputError> {
        if self.0.is_empty() {
            return Ok(None);
        }
        Ok(self.0.remove(0))
    }
}

/// Pre-filled value of an input before the user touches it.
pub fn default_value(input: &Input) -> Value {
    match input {
        Input::Textfield(i) => Value::Text(i.default.clone().unwrap_or_default()),
        Input::Textarea(i) => Value::Text(i.default.clone().unwrap_or_default()),
        Input::Checkbox(i) => Value::Bool(i.default.unwrap_or(false)),
        Input::Dropdown(i) => Value::Text(
            i.default
                .clone()
                .or_else(|| i.items.first().map(|it| it.value.clone()))
                .unwrap_or_default(),
        ),
    }
}

/// Collect every input in declared order. Nothing is returned unless the whole
/// pass completes.
pub fn collect(inputs: &[Input], prompter: &mut dyn Prompter) -> Result<InputValues, InputError> {
    let mut values = InputValues::default();
    for input in inputs {
        let default = default_value(input);
        let (value, touched) = match prompter.prompt(input, &default)? {
            Some(v) => (v, true),
            None => (default, false),
        };
        let (value, substitution) = match input {
            Input::Textfield(_) | Input::Textarea(_) => {
                let text = value.as_text();
                (Value::Text(text.clone()), text)
            }
            Input::Checkbox(c) => {
                let checked = value.as_bool();
                let sub = if checked {
                    c.true_substitution.clone()
                } else {
                    c.false_substitution.clone()
                };
                (Value::Bool(checked), sub.unwrap_or_else(|| checked.to_string()))
            }
            Input::Dropdown(d) => {
                let chosen = value.as_text();
                // An untouched default may sit outside `items`.
                if touched && !d.items.iter().any(|it| it.value == chosen) {
                    return Err(InputError::InvalidChoice {
                        name: d.name.clone(),
                        value: chosen,
                    });
                }
                (Value::Text(chosen.clone()), chosen)
            }
        };
        values.push(Entry {
            name: input.name().to_string(),
            value,
            substitution,
            secure: input.is_secure(),
        });
    }
    log::debug!("collected inputs: {}", values.readback().join(", "));
    Ok(values)
}
