use crate::app::inputs::Value;
use crate::theme::Theme;
use crate::widgets::chrome::centered_rect;
use crate::widgets::form::{draw_form, FieldKind, FormState, OPTIONS_VISIBLE};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::crossterm::event as rt_event;
use ratatui::prelude::*;
use std::collections::HashMap;
use tui_textarea::TextArea;

/// What a key press means for whoever owns the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEvent {
    None,
    Submit,
    Cancel,
}

pub struct FormWidget {
    pub form: FormState,
    ta_map: HashMap<String, TextArea<'static>>,
}

impl FormWidget {
    pub fn new(form: FormState) -> Self {
        let mut ta_map = HashMap::new();
        for f in &form.fields {
            if let FieldKind::TextArea = f.kind {
                let mut ta = TextArea::default();
                let txt = f.text();
                if !txt.is_empty() {
                    ta.insert_str(&txt);
                }
                ta_map.insert(f.name.clone(), ta);
            }
        }
        Self { form, ta_map }
    }

    fn editing_textarea(&self) -> Option<String> {
        if !self.form.editing {
            return None;
        }
        match self.form.current() {
            Some(fld) if matches!(fld.kind, FieldKind::TextArea) => Some(fld.name.clone()),
            _ => None,
        }
    }

    fn commit_textarea(&mut self) {
        let Some(name) = self.editing_textarea() else {
            return;
        };
        if let Some(ta) = self.ta_map.get(&name) {
            let text = ta.lines().join("\n");
            if let Some(fld) = self.form.current_mut() {
                fld.set(Value::Text(text));
            }
        }
        self.form.editing = false;
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64, theme: &Theme) {
        let editing_ta = self.editing_textarea();
        let cursor_on = editing_ta.is_none() && tick % 2 == 0;
        draw_form(f, area, &self.form, focused, cursor_on, theme);
        if let Some(name) = editing_ta {
            let label = self
                .form
                .current()
                .map(|fld| fld.label.clone())
                .unwrap_or_default();
            if let Some(ta) = self.ta_map.get_mut(&name) {
                ta.set_block(
                    ratatui::widgets::Block::default()
                        .borders(ratatui::widgets::Borders::ALL)
                        .border_style(theme.border_focused())
                        .title(format!("Editing: {label} (Ctrl+S save, Esc done)")),
                );
                let rect = centered_rect(80, 70, area);
                f.render_widget(ratatui::widgets::Clear, rect);
                f.render_widget(&*ta, rect);
            }
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> FormEvent {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if let Some(name) = self.editing_textarea() {
            if (ctrl && key.code == KeyCode::Char('s')) || key.code == KeyCode::Esc {
                self.commit_textarea();
            } else if let (Some(ta), Some(ev)) = (self.ta_map.get_mut(&name), to_textarea_key(key))
            {
                let _ = ta.input(ev);
            }
            return FormEvent::None;
        }
        if ctrl && key.code == KeyCode::Char('s') {
            self.form.editing = false;
            return FormEvent::Submit;
        }
        if self.form.editing {
            self.on_edit_key(key.code);
            return FormEvent::None;
        }
        match key.code {
            KeyCode::Esc => FormEvent::Cancel,
            KeyCode::Up | KeyCode::BackTab => {
                self.form.selected = self.form.selected.saturating_sub(1);
                FormEvent::None
            }
            KeyCode::Down | KeyCode::Tab => {
                if self.form.selected < self.form.cancel_idx() {
                    self.form.selected += 1;
                }
                FormEvent::None
            }
            KeyCode::Enter => self.activate(),
            KeyCode::Char(' ') if self.toggle_checkbox() => FormEvent::None,
            KeyCode::Char(c) if !ctrl => {
                // Typing on a text field starts editing it.
                if let Some(fld) = self.form.current_mut() {
                    if matches!(fld.kind, FieldKind::Text | FieldKind::Password) {
                        let mut s = fld.text();
                        s.push(c);
                        fld.set(Value::Text(s));
                        self.form.editing = true;
                    }
                }
                FormEvent::None
            }
            _ => FormEvent::None,
        }
    }

    fn toggle_checkbox(&mut self) -> bool {
        match self.form.current_mut() {
            Some(fld) if matches!(fld.kind, FieldKind::Checkbox { .. }) => {
                let v = !fld.value.as_bool();
                fld.set(Value::Bool(v));
                true
            }
            _ => false,
        }
    }

    fn activate(&mut self) -> FormEvent {
        if self.form.selected == self.form.submit_idx() {
            return FormEvent::Submit;
        }
        if self.form.selected == self.form.cancel_idx() {
            return FormEvent::Cancel;
        }
        if self.toggle_checkbox() {
            return FormEvent::None;
        }
        if let Some(fld) = self.form.current_mut() {
            if let FieldKind::Select {
                values,
                cursor,
                offset,
                ..
            } = &mut fld.kind
            {
                let current = fld.value.as_text();
                *cursor = values.iter().position(|v| *v == current).unwrap_or(0);
                if *cursor >= *offset + OPTIONS_VISIBLE || *cursor < *offset {
                    *offset = cursor.saturating_sub(OPTIONS_VISIBLE - 1);
                }
            }
        }
        self.form.editing = true;
        FormEvent::None
    }

    fn on_edit_key(&mut self, code: KeyCode) {
        if self.form.current().is_none() {
            self.form.editing = false;
            return;
        }
        let Some(fld) = self.form.current_mut() else {
            return;
        };
        let mut done = false;
        let mut choice: Option<String> = None;
        match &mut fld.kind {
            FieldKind::Select {
                values,
                cursor,
                offset,
                ..
            } => match code {
                KeyCode::Up => {
                    *cursor = cursor.saturating_sub(1);
                    if *cursor < *offset {
                        *offset = *cursor;
                    }
                }
                KeyCode::Down => {
                    if *cursor + 1 < values.len() {
                        *cursor += 1;
                    }
                    if *cursor >= *offset + OPTIONS_VISIBLE {
                        *offset = *cursor + 1 - OPTIONS_VISIBLE;
                    }
                }
                KeyCode::Enter => {
                    choice = values.get(*cursor).cloned();
                    done = true;
                }
                KeyCode::Esc => done = true,
                _ => {}
            },
            FieldKind::Text | FieldKind::Password => match code {
                KeyCode::Char(c) => {
                    let mut s = fld.value.as_text();
                    s.push(c);
                    choice = Some(s);
                }
                KeyCode::Backspace => {
                    let mut s = fld.value.as_text();
                    s.pop();
                    choice = Some(s);
                }
                KeyCode::Enter | KeyCode::Esc | KeyCode::Tab => done = true,
                _ => {}
            },
            _ => done = true,
        }
        if let Some(v) = choice {
            fld.set(Value::Text(v));
        }
        if done {
            self.form.editing = false;
        }
    }
}

fn to_textarea_key(key: KeyEvent) -> Option<rt_event::KeyEvent> {
    let code = match key.code {
        KeyCode::Char(c) => rt_event::KeyCode::Char(c),
        KeyCode::Enter => rt_event::KeyCode::Enter,
        KeyCode::Backspace => rt_event::KeyCode::Backspace,
        KeyCode::Delete => rt_event::KeyCode::Delete,
        KeyCode::Left => rt_event::KeyCode::Left,
        KeyCode::Right => rt_event::KeyCode::Right,
        KeyCode::Up => rt_event::KeyCode::Up,
        KeyCode::Down => rt_event::KeyCode::Down,
        KeyCode::Home => rt_event::KeyCode::Home,
        KeyCode::End => rt_event::KeyCode::End,
        KeyCode::Tab => rt_event::KeyCode::Tab,
        _ => return None,
    };
    let mut mods = rt_event::KeyModifiers::NONE;
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        mods |= rt_event::KeyModifiers::CONTROL;
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        mods |= rt_event::KeyModifiers::ALT;
    }
    Some(rt_event::KeyEvent::new(code, mods))
}
