use crate::app::inputs::{default_value, Value};
use crate::model::Input;
use crate::theme::Theme;
use crate::widgets::chrome::panel_block;
use ratatui::prelude::*;
use ratatui::widgets::*;

pub const OPTIONS_VISIBLE: usize = 8;

#[derive(Clone, Debug)]
pub enum FieldKind {
    Text,
    Password,
    TextArea,
    Checkbox {
        label: Option<String>,
    },
    Select {
        options: Vec<String>,
        values: Vec<String>,
        cursor: usize,
        offset: usize,
    },
}

#[derive(Clone, Debug)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub value: Value,
    pub placeholder: Option<String>,
    /// Set once the user changes the value; untouched fields report their default.
    pub touched: bool,
}

impl FormField {
    pub fn from_input(input: &Input) -> Self {
        let kind = match input {
            Input::Textfield(i) if i.secure == Some(true) => FieldKind::Password,
            Input::Textfield(_) => FieldKind::Text,
            Input::Textarea(_) => FieldKind::TextArea,
            Input::Checkbox(c) => FieldKind::Checkbox {
                label: c.label.clone(),
            },
            Input::Dropdown(d) => FieldKind::Select {
                options: d.items.iter().map(|it| it.title.clone()).collect(),
                values: d.items.iter().map(|it| it.value.clone()).collect(),
                cursor: 0,
                offset: 0,
            },
        };
        let placeholder = match input {
            Input::Textfield(i) => i.placeholder.clone(),
            Input::Textarea(i) => i.placeholder.clone(),
            _ => None,
        };
        Self {
            name: input.name().to_string(),
            label: input.title().to_string(),
            kind,
            value: default_value(input),
            placeholder,
            touched: false,
        }
    }

    pub fn text(&self) -> String {
        self.value.as_text()
    }

    pub fn set(&mut self, value: Value) {
        self.value = value;
        self.touched = true;
    }
}

#[derive(Clone, Debug, Default)]
pub struct FormState {
    pub title: String,
    pub fields: Vec<FormField>,
    /// Field index, then the Submit and Cancel buttons.
    pub selected: usize,
    pub editing: bool,
    pub message: Option<String>,
}

impl FormState {
    pub fn from_inputs(title: impl Into<String>, inputs: &[Input]) -> Self {
        Self {
            title: title.into(),
            fields: inputs.iter().map(FormField::from_input).collect(),
            ..Default::default()
        }
    }

    pub fn submit_idx(&self) -> usize {
        self.fields.len()
    }

    pub fn cancel_idx(&self) -> usize {
        self.fields.len() + 1
    }

    pub fn current(&self) -> Option<&FormField> {
        self.fields.get(self.selected)
    }

    pub fn current_mut(&mut self) -> Option<&mut FormField> {
        self.fields.get_mut(self.selected)
    }

    /// One answer per field; `None` where the user left the default alone.
    pub fn answers(&self) -> Vec<Option<Value>> {
        self.fields
            .iter()
            .map(|f| f.touched.then(|| f.value.clone()))
            .collect()
    }
}

fn value_style(form: &FormState, i: usize, theme: &Theme) -> Style {
    if i != form.selected {
        Style::default()
    } else if form.editing {
        theme.text_editing_bold()
    } else {
        theme.text_active_bold()
    }
}

pub fn draw_form(
    f: &mut Frame,
    area: Rect,
    form: &FormState,
    focused: bool,
    cursor_on: bool,
    theme: &Theme,
) {
    let mut lines: Vec<Line> = Vec::new();
    for (i, fld) in form.fields.iter().enumerate() {
        let sel = if i == form.selected { '›' } else { ' ' };
        let editing_here = form.editing && i == form.selected;
        let style = value_style(form, i, theme);
        match &fld.kind {
            FieldKind::Text | FieldKind::Password => {
                let raw = fld.text();
                let mut val = if matches!(fld.kind, FieldKind::Password) {
                    "•".repeat(raw.chars().count())
                } else {
                    raw.clone()
                };
                if editing_here && cursor_on {
                    val.push('▏');
                }
                let mut spans = vec![
                    Span::raw(format!("{sel} {}: ", fld.label)),
                    Span::styled(val, style),
                ];
                if raw.is_empty() && !editing_here {
                    if let Some(ph) = &fld.placeholder {
                        spans.push(Span::styled(ph.clone(), theme.text_muted()));
                    }
                }
                lines.push(Line::from(spans));
            }
            FieldKind::TextArea => {
                lines.push(Line::from(Span::raw(format!("{sel} {}:", fld.label))));
                let text = fld.text();
                if text.is_empty() {
                    let ph = fld.placeholder.clone().unwrap_or_default();
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(ph, theme.text_muted()),
                    ]));
                } else {
                    for bl in text.lines() {
                        lines.push(Line::from(vec![
                            Span::raw("  "),
                            Span::styled(bl.to_string(), style),
                        ]));
                    }
                }
            }
            FieldKind::Checkbox { label } => {
                let mark = if fld.value.as_bool() { "[x]" } else { "[ ]" };
                let mut spans = vec![
                    Span::raw(format!("{sel} {}: ", fld.label)),
                    Span::styled(mark.to_string(), style),
                ];
                if let Some(l) = label {
                    spans.push(Span::raw(format!(" {l}")));
                }
                lines.push(Line::from(spans));
            }
            FieldKind::Select {
                options,
                values,
                cursor,
                offset,
            } => {
                let current = fld.text();
                let summary = values
                    .iter()
                    .position(|v| *v == current)
                    .and_then(|p| options.get(p).cloned())
                    .unwrap_or_else(|| {
                        if current.is_empty() {
                            "(none)".into()
                        } else {
                            current.clone()
                        }
                    });
                lines.push(Line::from(vec![
                    Span::raw(format!("{sel} {}: ", fld.label)),
                    Span::styled(summary, style),
                ]));
                if editing_here {
                    let start = (*offset).min(options.len());
                    let end = (start + OPTIONS_VISIBLE).min(options.len());
                    for (oi, opt) in options.iter().enumerate().take(end).skip(start) {
                        let chosen = values.get(oi).map(|v| *v == current).unwrap_or(false);
                        let mark = if chosen { "(•)" } else { "( )" };
                        let cur = if oi == *cursor { '›' } else { ' ' };
                        let st = if oi == *cursor {
                            theme.list_cursor_style()
                        } else {
                            theme.text_muted()
                        };
                        lines.push(Line::from(Span::styled(
                            format!("  {cur} {mark} {opt}"),
                            st,
                        )));
                    }
                }
            }
        }
    }
    if !form.fields.is_empty() {
        lines.push(Line::from(""));
    }
    let submit_style = if form.selected == form.submit_idx() {
        theme.list_cursor_style()
    } else {
        theme.text_active_bold()
    };
    let cancel_style = if form.selected == form.cancel_idx() {
        theme.list_cursor_style()
    } else {
        theme.text_muted()
    };
    lines.push(Line::from(vec![
        Span::styled("  [ Submit ]  ", submit_style),
        Span::styled("Cancel", cancel_style),
    ]));
    if let Some(msg) = &form.message {
        lines.push(Line::from(Span::styled(msg.clone(), theme.text_error())));
    }
    let title = if form.editing {
        format!("{} (editing)", form.title)
    } else {
        form.title.clone()
    };
    let p = Paragraph::new(lines)
        .block(panel_block(&title, focused, theme))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}
