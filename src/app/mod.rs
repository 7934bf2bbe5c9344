pub mod dispatch;
pub mod inputs;
pub mod interpolate;

use crate::app::dispatch::{finish_run, plan, Plan, RunOutcome};
use crate::app::inputs::{collect, Answers, InputValues, Value};
use crate::app::interpolate::{interpolate_invocation, process_env};
use crate::error::{DispatchError, InputError};
use crate::model::{Action, Invocation, OnSuccess, Page, Preview};
use crate::nav::flatten::{clamp_selection, selected_item, visible_items};
use crate::nav::keys::cache_key;
use crate::services::catalog::PageSource;
use crate::services::executor::{CancelToken, RunMsg};
use crate::services::loader::{LoadMsg, LoadPurpose};
use crate::services::preview::{PreviewEvent, SlotId};
use crate::ui::{AppState, ToastLevel};
use crate::widgets::form::FormState;
use crate::widgets::form_widget::FormWidget;

/// Interaction mode. Only `Browse` accepts navigation; everything else is modal.
pub enum Mode {
    Browse,
    Palette {
        selected: usize,
    },
    Collecting {
        action: Action,
        form: FormWidget,
    },
    Confirm {
        plan: Plan,
    },
    /// A load or a `run` is in flight; its result must carry `ticket`.
    Busy {
        ticket: u64,
        title: String,
        cancel: CancelToken,
        kind: BusyKind,
    },
}

pub enum BusyKind {
    Load {
        purpose: LoadPurpose,
        /// Frame being reloaded.
        frame: Option<u64>,
    },
    Run {
        on_success: Option<OnSuccess>,
        invocation: Invocation,
    },
}

pub enum AppMsg {
    Start(PageSource),
    Move(isize),
    FilterInput(char),
    FilterBackspace,
    Primary,
    Shortcut(char),
    OpenPalette,
    PaletteMove(isize),
    PaletteChoose,
    Invoke(Action),
    SubmitInputs(Vec<Option<Value>>),
    CancelInputs,
    SubmitForm(Vec<Option<Value>>),
    Confirm(bool),
    Back,
    CancelBusy,
    RefreshPreview,
    ToggleDebug,
    Quit,
    Loaded(LoadMsg),
    RunDone(RunMsg),
    Preview(PreviewEvent),
    Tick,
}

#[allow(clippy::large_enum_variant)]
pub enum Effect {
    LoadPage {
        ticket: u64,
        purpose: LoadPurpose,
        source: PageSource,
        cancel: CancelToken,
    },
    RunCommand {
        ticket: u64,
        invocation: Invocation,
        cancel: CancelToken,
    },
    RefreshPreview {
        slot: SlotId,
        key: String,
        invocation: Invocation,
    },
    ShowToast {
        text: String,
        level: ToastLevel,
        seconds: u64,
    },
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    use AppMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    let mut force_preview = false;
    let busy = matches!(state.mode, Mode::Busy { .. });
    match msg {
        Start(source) => effects.extend(start_load(state, LoadPurpose::Root, source, None)),
        Move(delta) if !busy => move_cursor(state, delta),
        FilterInput(c) if !busy => {
            if let Some(frame) = state.stack.top_mut() {
                if matches!(*frame.page, Page::List(_)) {
                    frame.filter.push(c);
                    frame.selected = 0;
                }
            }
        }
        FilterBackspace if !busy => {
            if let Some(frame) = state.stack.top_mut() {
                if frame.filter.pop().is_some() {
                    frame.selected = 0;
                }
            }
        }
        Primary if !busy => {
            if let Some(action) = current_actions(state).into_iter().next() {
                effects.extend(invoke(state, action));
            }
        }
        Shortcut(c) if !busy => {
            let found = current_actions(state).into_iter().find(|a| {
                a.key()
                    .map(|k| k.eq_ignore_ascii_case(&c.to_string()))
                    .unwrap_or(false)
            });
            if let Some(action) = found {
                effects.extend(invoke(state, action));
            }
        }
        OpenPalette if !busy => {
            if !current_actions(state).is_empty() {
                state.mode = Mode::Palette { selected: 0 };
            }
        }
        PaletteMove(delta) => {
            let total = current_actions(state).len();
            if let Mode::Palette { selected } = &mut state.mode {
                let next = (*selected as isize + delta).max(0) as usize;
                *selected = clamp_selection(next, total);
            }
        }
        PaletteChoose => {
            if let Mode::Palette { selected } = state.mode {
                state.mode = Mode::Browse;
                if let Some(action) = current_actions(state).into_iter().nth(selected) {
                    effects.extend(invoke(state, action));
                }
            }
        }
        Invoke(action) if !busy => effects.extend(invoke(state, action)),
        SubmitInputs(answers) => effects.extend(submit_inputs(state, answers)),
        CancelInputs => {
            if matches!(state.mode, Mode::Collecting { .. }) {
                log::debug!("input collection cancelled");
                state.mode = Mode::Browse;
            }
        }
        SubmitForm(answers) if !busy => effects.extend(submit_form_page(state, answers)),
        Confirm(yes) => {
            if matches!(state.mode, Mode::Confirm { .. }) {
                if let Mode::Confirm { plan } = std::mem::replace(&mut state.mode, Mode::Browse) {
                    if yes {
                        effects.extend(perform(state, plan));
                    } else {
                        log::debug!("run declined");
                    }
                }
            }
        }
        Back => effects.extend(back(state)),
        CancelBusy => effects.extend(cancel_busy(state)),
        RefreshPreview => force_preview = true,
        ToggleDebug => state.show_debug = !state.show_debug,
        Quit => state.should_quit = true,
        Loaded(msg) => effects.extend(on_loaded(state, msg)),
        RunDone(msg) => effects.extend(on_run_done(state, msg)),
        Preview(ev) => on_preview(state, ev),
        Tick => {
            state.tick = state.tick.wrapping_add(1);
            if let Some(t) = &state.toast {
                if state.tick >= t.expires_at_tick {
                    state.toast = None;
                }
            }
        }
        _ => log::debug!("ignored input while busy"),
    }
    sync_form_page(state);
    effects.extend(sync_preview(state, force_preview));
    effects
}

fn next_ticket(state: &mut AppState) -> u64 {
    state.next_ticket += 1;
    state.next_ticket
}

fn move_cursor(state: &mut AppState, delta: isize) {
    let Some(frame) = state.stack.top_mut() else {
        return;
    };
    let Page::List(list) = &*frame.page else {
        return;
    };
    let total = visible_items(list, &frame.filter).len();
    let cur = clamp_selection(frame.selected, total) as isize;
    frame.selected = clamp_selection((cur + delta).max(0) as usize, total);
}

/// Actions reachable from the current cursor: the highlighted item's, the empty
/// view's when the list has no rows, or the detail page's.
pub fn current_actions(state: &AppState) -> Vec<Action> {
    let Some(frame) = state.stack.top() else {
        return Vec::new();
    };
    match &*frame.page {
        Page::List(list) => match selected_item(list, &frame.filter, frame.selected) {
            Some((_, item)) => item.actions().to_vec(),
            None if list.items().is_empty() => list
                .empty_view
                .as_ref()
                .and_then(|ev| ev.actions.clone())
                .unwrap_or_default(),
            None => Vec::new(),
        },
        Page::Detail(d) => d.actions().to_vec(),
        Page::Form(f) => vec![f.submit_action.clone()],
    }
}

fn invoke(state: &mut AppState, action: Action) -> Vec<Effect> {
    log::info!("invoke {} '{}'", action.kind(), action.display_title());
    if action.inputs().is_empty() {
        return dispatch(state, &action, InputValues::default());
    }
    let form = FormState::from_inputs(action.display_title(), action.inputs());
    state.mode = Mode::Collecting {
        action,
        form: FormWidget::new(form),
    };
    Vec::new()
}

fn submit_inputs(state: &mut AppState, answers: Vec<Option<Value>>) -> Vec<Effect> {
    if !matches!(state.mode, Mode::Collecting { .. }) {
        return Vec::new();
    }
    let Mode::Collecting { action, mut form } = std::mem::replace(&mut state.mode, Mode::Browse)
    else {
        return Vec::new();
    };
    match collect(action.inputs(), &mut Answers(answers)) {
        Ok(values) => dispatch(state, &action, values),
        Err(InputError::Cancelled) => Vec::new(),
        Err(e) => {
            form.form.message = Some(e.to_string());
            state.mode = Mode::Collecting { action, form };
            Vec::new()
        }
    }
}

fn submit_form_page(state: &mut AppState, answers: Vec<Option<Value>>) -> Vec<Effect> {
    let Some(frame) = state.stack.top() else {
        return Vec::new();
    };
    let Page::Form(page) = &*frame.page else {
        return Vec::new();
    };
    let action = page.submit_action.clone();
    match collect(action.inputs(), &mut Answers(answers)) {
        Ok(values) => dispatch(state, &action, values),
        Err(InputError::Cancelled) => Vec::new(),
        Err(e) => {
            if let Some((_, w)) = &mut state.form_page {
                w.form.message = Some(e.to_string());
            }
            Vec::new()
        }
    }
}

fn env_lookup(state: &AppState) -> impl Fn(&str) -> Option<String> + '_ {
    move |name: &str| {
        state
            .settings
            .env
            .get(name)
            .cloned()
            .or_else(|| process_env(name))
    }
}

/// Plan first so that a bad reference aborts before any side effect.
fn dispatch(state: &mut AppState, action: &Action, values: InputValues) -> Vec<Effect> {
    crate::logging::register_secrets(values.secrets());
    if !values.is_empty() {
        log::debug!("inputs: {}", values.readback().join(", "));
    }
    let planned = {
        let env = env_lookup(state);
        plan(action, &values, &env)
    };
    match planned {
        Ok(p) => perform(state, p),
        Err(e) => fail(state, e),
    }
}

fn perform(state: &mut AppState, plan: Plan) -> Vec<Effect> {
    match plan {
        Plan::Copy(text) => match state.caps.clipboard.set(&text) {
            Ok(()) => vec![toast("Copied to clipboard", ToastLevel::Success)],
            Err(message) => fail(
                state,
                DispatchError::Capability {
                    capability: "clipboard",
                    message,
                },
            ),
        },
        Plan::Open(target) => match state.caps.opener.open(&target) {
            Ok(()) => vec![toast(format!("Opened {target}"), ToastLevel::Success)],
            Err(message) => fail(
                state,
                DispatchError::Capability {
                    capability: "open",
                    message,
                },
            ),
        },
        Plan::Exit => {
            log::info!("exit requested");
            state.should_quit = true;
            Vec::new()
        }
        Plan::Reload => start_reload(state),
        Plan::Run {
            title,
            invocation,
            on_success,
            confirm: true,
        } => {
            state.mode = Mode::Confirm {
                plan: Plan::Run {
                    title,
                    invocation,
                    on_success,
                    confirm: false,
                },
            };
            Vec::new()
        }
        Plan::Run {
            title,
            invocation,
            on_success,
            confirm: false,
        } => {
            let ticket = next_ticket(state);
            let cancel = frame_token(state);
            log::info!("run {}", invocation.display());
            state.mode = Mode::Busy {
                ticket,
                title,
                cancel: cancel.clone(),
                kind: BusyKind::Run {
                    on_success,
                    invocation: invocation.clone(),
                },
            };
            vec![Effect::RunCommand {
                ticket,
                invocation,
                cancel,
            }]
        }
        Plan::Push(id) => {
            let base = state
                .stack
                .top()
                .and_then(|f| f.source.base_dir())
                .unwrap_or_else(|| state.cwd.clone());
            match state.catalog.resolve(&id, Some(&base)) {
                Ok(source) => start_load(state, LoadPurpose::Push, source, None),
                Err(e) => fail(state, e.into()),
            }
        }
    }
}

/// Child of the top frame's token, so popping the page stops the command.
fn frame_token(state: &AppState) -> CancelToken {
    state
        .stack
        .top()
        .map(|f| f.cancel.child())
        .unwrap_or_default()
}

fn start_load(
    state: &mut AppState,
    purpose: LoadPurpose,
    source: PageSource,
    frame: Option<u64>,
) -> Vec<Effect> {
    let ticket = next_ticket(state);
    let cancel = frame_token(state);
    log::info!("load {:?} {}", purpose, source.describe());
    state.mode = Mode::Busy {
        ticket,
        title: format!("Loading {}", source.describe()),
        cancel: cancel.clone(),
        kind: BusyKind::Load { purpose, frame },
    };
    vec![Effect::LoadPage {
        ticket,
        purpose,
        source,
        cancel,
    }]
}

fn start_reload(state: &mut AppState) -> Vec<Effect> {
    let Some(top) = state.stack.top() else {
        return Vec::new();
    };
    let (id, source) = (top.id, top.source.clone());
    if source == PageSource::Inline {
        let page = (*top.page).clone();
        state.preview.forget(id);
        state.stack.replace_top(page);
        return Vec::new();
    }
    start_load(state, LoadPurpose::Reload, source, Some(id))
}

fn on_loaded(state: &mut AppState, msg: LoadMsg) -> Vec<Effect> {
    let (purpose, frame) = match &state.mode {
        Mode::Busy {
            ticket,
            kind: BusyKind::Load { purpose, frame },
            ..
        } if *ticket == msg.ticket => (*purpose, *frame),
        _ => {
            log::debug!("dropping stale load {}", msg.ticket);
            return Vec::new();
        }
    };
    state.mode = Mode::Browse;
    match (purpose, msg.outcome) {
        (LoadPurpose::Root, Ok(page)) => {
            state.stack.push(page, msg.source);
            Vec::new()
        }
        (LoadPurpose::Root, Err(e)) => {
            let text = crate::logging::scrub(&e.to_string());
            log::error!("initial load failed: {text}");
            state.last_error = Some(text.clone());
            state
                .stack
                .push(Page::error("Failed to load page", text), PageSource::Inline);
            Vec::new()
        }
        (LoadPurpose::Push, Ok(page)) => {
            state.stack.push(page, msg.source);
            Vec::new()
        }
        (LoadPurpose::Reload, Ok(page)) => {
            let top = state.stack.top().map(|f| f.id);
            if top.is_some() && top == frame {
                if let Some(old) = top {
                    state.preview.forget(old);
                }
                state.stack.replace_top(page);
            } else {
                log::debug!("reloaded frame is no longer on top");
            }
            Vec::new()
        }
        (_, Err(e)) => fail(state, e.into()),
    }
}

fn on_run_done(state: &mut AppState, msg: RunMsg) -> Vec<Effect> {
    let is_current = matches!(
        &state.mode,
        Mode::Busy { ticket, kind: BusyKind::Run { .. }, .. } if *ticket == msg.ticket
    );
    if !is_current {
        log::debug!("dropping stale run {}", msg.ticket);
        return Vec::new();
    }
    let Mode::Busy {
        title,
        kind: BusyKind::Run {
            on_success,
            invocation,
        },
        ..
    } = std::mem::replace(&mut state.mode, Mode::Browse)
    else {
        return Vec::new();
    };
    let out = match msg.outcome {
        Ok(out) => out,
        Err(e) => return fail(state, e.into()),
    };
    match finish_run(on_success, out) {
        Ok(RunOutcome::Done { stdout }) => {
            log::debug!("'{title}' output: {} bytes", stdout.len());
            let first = stdout.lines().next().unwrap_or_default().trim();
            let text = if first.is_empty() {
                format!("{title} finished")
            } else {
                format!("{title}: {first}")
            };
            vec![toast(text, ToastLevel::Success)]
        }
        Ok(RunOutcome::Reload) => start_reload(state),
        Ok(RunOutcome::Copy(text)) => perform(state, Plan::Copy(text)),
        Ok(RunOutcome::Open(target)) => perform(state, Plan::Open(target)),
        Ok(RunOutcome::Exit) => perform(state, Plan::Exit),
        Ok(RunOutcome::Push(page)) => {
            state.stack.push(page, PageSource::Command(invocation));
            Vec::new()
        }
        Err(e) => fail(state, e),
    }
}

fn on_preview(state: &mut AppState, ev: PreviewEvent) {
    let Some(done) = state.preview.apply(ev) else {
        return;
    };
    let Some(frame) = state.stack.get_mut(done.slot) else {
        return;
    };
    let cacheable = match &*frame.page {
        Page::List(list) => list
            .items()
            .iter()
            .any(|it| cache_key(it) == Some(done.key.as_str())),
        _ => false,
    };
    if cacheable {
        frame.preview_cache.insert(done.key, done.text);
    }
}

fn back(state: &mut AppState) -> Vec<Effect> {
    match state.mode {
        Mode::Palette { .. } | Mode::Confirm { .. } | Mode::Collecting { .. } => {
            state.mode = Mode::Browse;
            return Vec::new();
        }
        Mode::Busy { .. } => return cancel_busy(state),
        Mode::Browse => {}
    }
    if let Some(frame) = state.stack.top_mut() {
        if !frame.filter.is_empty() {
            frame.filter.clear();
            frame.selected = 0;
            return Vec::new();
        }
    }
    if let Some(frame) = state.stack.pop() {
        state.preview.forget(frame.id);
    }
    if state.stack.is_empty() {
        state.should_quit = true;
    }
    Vec::new()
}

fn cancel_busy(state: &mut AppState) -> Vec<Effect> {
    if !matches!(state.mode, Mode::Busy { .. }) {
        return Vec::new();
    }
    let Mode::Busy { title, cancel, .. } = std::mem::replace(&mut state.mode, Mode::Browse) else {
        return Vec::new();
    };
    cancel.cancel();
    log::info!("cancelled '{title}'");
    if state.stack.is_empty() {
        state.should_quit = true;
        return Vec::new();
    }
    vec![toast(format!("Cancelled {title}"), ToastLevel::Info)]
}

fn fail(state: &mut AppState, err: DispatchError) -> Vec<Effect> {
    if err.is_silent() {
        log::debug!("aborted: {err}");
        return Vec::new();
    }
    let text = crate::logging::scrub(&err.to_string());
    log::warn!("{text}");
    state.last_error = Some(text.clone());
    vec![toast(text, ToastLevel::Error)]
}

/// Toasts echo targets and command output, so secure values are masked here.
fn toast(text: impl Into<String>, level: ToastLevel) -> Effect {
    let seconds = if matches!(level, ToastLevel::Error) { 5 } else { 3 };
    Effect::ShowToast {
        text: crate::logging::scrub(&text.into()),
        level,
        seconds,
    }
}

/// Keep the inline form of a form page bound to the frame showing it.
fn sync_form_page(state: &mut AppState) {
    let Some(frame) = state.stack.top() else {
        state.form_page = None;
        return;
    };
    let Page::Form(page) = &*frame.page else {
        state.form_page = None;
        return;
    };
    if state.form_page.as_ref().map(|(id, _)| *id) == Some(frame.id) {
        return;
    }
    let title = page
        .title
        .clone()
        .unwrap_or_else(|| page.submit_action.display_title());
    let form = FormState::from_inputs(title, page.submit_action.inputs());
    state.form_page = Some((frame.id, FormWidget::new(form)));
}

/// Point the top frame's preview slot at the highlighted item. Cached and static
/// text is shown directly; dynamic previews become a refresh effect.
fn sync_preview(state: &mut AppState, force: bool) -> Vec<Effect> {
    let Some(frame) = state.stack.top() else {
        return Vec::new();
    };
    let slot = frame.id;
    let (key, preview, cached) = match &*frame.page {
        Page::List(list) if list.shows_preview() => {
            match selected_item(list, &frame.filter, frame.selected) {
                Some((row, item)) => match &item.preview {
                    Some(p) => {
                        let cached = cache_key(item)
                            .and_then(|k| frame.preview_cache.get(k))
                            .cloned();
                        (row.key, p.clone(), cached)
                    }
                    None => {
                        if state.preview.slot(slot).map(|s| s.key != row.key).unwrap_or(true) {
                            state.preview.set_static(slot, row.key, "");
                        }
                        return Vec::new();
                    }
                },
                None => {
                    state.preview.forget(slot);
                    return Vec::new();
                }
            }
        }
        Page::Detail(d) => ("detail".to_string(), d.preview.clone(), None),
        _ => return Vec::new(),
    };
    let unchanged = state
        .preview
        .slot(slot)
        .map(|s| s.key == key)
        .unwrap_or(false);
    if unchanged && !force {
        return Vec::new();
    }
    match preview {
        Preview::Static { text, .. } => {
            state.preview.set_static(slot, key, text);
            Vec::new()
        }
        Preview::Dynamic { command, .. } => {
            if let (Some(text), false) = (cached, force) {
                state.preview.set_static(slot, key, text);
                return Vec::new();
            }
            let resolved = command.to_invocation().map_err(DispatchError::from).and_then(|inv| {
                let env = env_lookup(state);
                interpolate_invocation(&inv, &InputValues::default(), &env)
                    .map_err(DispatchError::from)
            });
            match resolved {
                Ok(invocation) => vec![Effect::RefreshPreview {
                    slot,
                    key,
                    invocation,
                }],
                Err(e) => {
                    state
                        .preview
                        .set_static(slot, key, format!("preview unavailable: {e}"));
                    Vec::new()
                }
            }
        }
    }
}
