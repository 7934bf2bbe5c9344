use crate::app::{current_actions, update, AppMsg, Effect, Mode};
use crate::model::Page;
use crate::nav::flatten::selected_item;
use crate::nav::stack::NavStack;
use crate::services::capabilities::Capabilities;
use crate::services::catalog::{PageCatalog, PageSource};
use crate::services::config::{truthy, Settings};
use crate::services::executor::{spawn_execute, CancelToken, ExecOptions, RunMsg};
use crate::services::loader::{spawn_load_page, LoadMsg};
use crate::services::preview::{PreviewEvent, PreviewRefresher};
use crate::theme::Theme;
use crate::widgets::chrome::centered_rect;
use crate::widgets::form_widget::{FormEvent, FormWidget};
use crate::widgets::list_view::draw_list;
use crate::widgets::palette::{draw_confirm, draw_palette};
use crate::widgets::preview::{draw_detail, draw_preview};
use crate::widgets::status_bar::draw_status;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

/// Everything the UI thread owns. Workers only talk back through the channels.
pub struct AppState {
    pub settings: Settings,
    pub cwd: PathBuf,
    pub stack: NavStack,
    pub mode: Mode,
    /// Inline form of the top frame when it is a form page, keyed by frame id.
    pub form_page: Option<(u64, FormWidget)>,
    pub caps: Capabilities,
    pub catalog: Box<dyn PageCatalog>,
    pub preview: PreviewRefresher,
    pub theme: Theme,
    pub toast: Option<Toast>,
    pub tick: u64,
    pub show_debug: bool,
    pub should_quit: bool,
    pub last_error: Option<String>,
    pub(crate) next_ticket: u64,
    load_tx: Sender<LoadMsg>,
    pub(crate) load_rx: Receiver<LoadMsg>,
    run_tx: Sender<RunMsg>,
    pub(crate) run_rx: Receiver<RunMsg>,
    pub(crate) preview_rx: Receiver<PreviewEvent>,
}

impl AppState {
    pub fn new(settings: Settings, caps: Capabilities, catalog: Box<dyn PageCatalog>) -> Self {
        let (load_tx, load_rx) = mpsc::channel();
        let (run_tx, run_rx) = mpsc::channel();
        let (preview_tx, preview_rx) = mpsc::channel();
        let theme = Theme::from_name(settings.theme.as_deref());
        let show_debug = settings.debug;
        Self {
            settings,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            stack: NavStack::new(),
            mode: Mode::Browse,
            form_page: None,
            caps,
            catalog,
            preview: PreviewRefresher::new(preview_tx),
            theme,
            toast: None,
            tick: 0,
            show_debug,
            should_quit: false,
            last_error: None,
            next_ticket: 0,
            load_tx,
            load_rx,
            run_tx,
            run_rx,
            preview_rx,
        }
    }

    pub fn exec_options(&self, cancel: Option<CancelToken>, timeout: Option<Duration>) -> ExecOptions {
        let mut env = self.settings.env_pairs();
        env.push((
            "PAGEBEAM_PAGE_DEPTH".to_string(),
            self.stack.depth().to_string(),
        ));
        ExecOptions {
            cwd: Some(self.cwd.clone()),
            stdin: None,
            timeout,
            env,
            cancel,
        }
    }

    /// Worker results that arrived since the last call.
    fn drain(&mut self) -> Vec<AppMsg> {
        let mut msgs = Vec::new();
        while let Ok(m) = self.load_rx.try_recv() {
            msgs.push(AppMsg::Loaded(m));
        }
        while let Ok(m) = self.run_rx.try_recv() {
            msgs.push(AppMsg::RunDone(m));
        }
        while let Ok(ev) = self.preview_rx.try_recv() {
            msgs.push(AppMsg::Preview(ev));
        }
        msgs
    }
}

pub(crate) fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::LoadPage {
                ticket,
                purpose,
                source,
                cancel,
            } => {
                let opts = state.exec_options(Some(cancel), state.settings.command_timeout());
                spawn_load_page(ticket, purpose, source, opts, state.load_tx.clone());
            }
            Effect::RunCommand {
                ticket,
                invocation,
                cancel,
            } => {
                let opts = state.exec_options(Some(cancel), state.settings.command_timeout());
                spawn_execute(ticket, invocation, opts, state.run_tx.clone());
            }
            Effect::RefreshPreview {
                slot,
                key,
                invocation,
            } => {
                let Some(parent) = state.stack.get(slot).map(|f| f.cancel.clone()) else {
                    continue;
                };
                let opts = state.exec_options(None, state.settings.preview_timeout());
                state.preview.trigger(slot, key, invocation, opts, &parent);
            }
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => {
                let tick_ms = state.settings.tick_rate().as_millis().max(1) as u64;
                state.toast = Some(Toast {
                    text,
                    level,
                    expires_at_tick: state.tick + (seconds * 1000).div_ceil(tick_ms),
                });
            }
        }
    }
}

fn dispatch(state: &mut AppState, msg: AppMsg) {
    let effects = update(state, msg);
    run_effects(state, effects);
}

fn pump(state: &mut AppState) {
    for msg in state.drain() {
        dispatch(state, msg);
    }
}

pub fn run(settings: Settings, root: PageSource) -> Result<()> {
    let mut state = AppState::new(
        settings,
        Capabilities::default(),
        Box::new(crate::services::catalog::FsCatalog),
    );
    dispatch(&mut state, AppMsg::Start(root));

    let headless = std::env::var("PAGEBEAM_HEADLESS")
        .map(|v| truthy(&v))
        .unwrap_or(false);
    if headless {
        let ticks: u64 = std::env::var("PAGEBEAM_TICKS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        let summary = std::env::var("PAGEBEAM_SMOKE_SUMMARY")
            .map(|v| truthy(&v))
            .unwrap_or(false);
        return run_headless(&mut state, ticks, summary);
    }

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    let res = event_loop(&mut terminal, &mut state);
    state.stack.clear();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, state: &mut AppState) -> Result<()> {
    let tick_rate = state.settings.tick_rate();
    let mut last_tick = Instant::now();
    while !state.should_quit {
        pump(state);
        terminal.draw(|f| draw(f, state)).context("drawing frame")?;
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(msg) = key_to_msg(state, key) {
                        dispatch(state, msg);
                    }
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            dispatch(state, AppMsg::Tick);
            last_tick = Instant::now();
        }
    }
    Ok(())
}

/// Drive the app against an in-memory terminal for `ticks` ticks; used for smoke runs.
fn run_headless(state: &mut AppState, ticks: u64, summary: bool) -> Result<()> {
    let mut terminal = Terminal::new(ratatui::backend::TestBackend::new(80, 24))?;
    let tick_rate = state.settings.tick_rate();
    for _ in 0..ticks {
        pump(state);
        terminal.draw(|f| draw(f, state))?;
        if state.should_quit {
            break;
        }
        std::thread::sleep(tick_rate);
        dispatch(state, AppMsg::Tick);
    }
    pump(state);
    if summary {
        let top = state.stack.top();
        let out = serde_json::json!({
            "ok": state.last_error.is_none(),
            "depth": state.stack.depth(),
            "page": top.map(|f| f.page.kind()),
            "title": top.and_then(|f| f.page.title()),
            "busy": matches!(state.mode, Mode::Busy { .. }),
            "error": state.last_error,
        });
        println!("{out}");
    }
    state.stack.clear();
    Ok(())
}

pub(crate) fn key_to_msg(state: &mut AppState, key: KeyEvent) -> Option<AppMsg> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let busy = matches!(state.mode, Mode::Busy { .. });
    if ctrl && key.code == KeyCode::Char('c') {
        if busy {
            return Some(AppMsg::CancelBusy);
        }
        // An action bound to `c` takes Ctrl+C while browsing; Esc still backs out.
        let browsing = matches!(state.mode, Mode::Browse) && state.form_page.is_none();
        if browsing && bound_to(state, 'c') {
            return Some(AppMsg::Shortcut('c'));
        }
        return Some(AppMsg::Quit);
    }
    if key.code == KeyCode::F(12) {
        return Some(AppMsg::ToggleDebug);
    }
    match &mut state.mode {
        Mode::Busy { .. } => match key.code {
            KeyCode::Esc => Some(AppMsg::CancelBusy),
            _ => None,
        },
        Mode::Collecting { form, .. } => match form.on_key(key) {
            FormEvent::Submit => Some(AppMsg::SubmitInputs(form.form.answers())),
            FormEvent::Cancel => Some(AppMsg::CancelInputs),
            FormEvent::None => None,
        },
        Mode::Confirm { .. } => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(AppMsg::Confirm(true)),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(AppMsg::Confirm(false)),
            _ => None,
        },
        Mode::Palette { .. } => match key.code {
            KeyCode::Up => Some(AppMsg::PaletteMove(-1)),
            KeyCode::Down => Some(AppMsg::PaletteMove(1)),
            KeyCode::Enter => Some(AppMsg::PaletteChoose),
            KeyCode::Esc | KeyCode::Tab => Some(AppMsg::Back),
            _ => None,
        },
        Mode::Browse => browse_key(state, key, ctrl),
    }
}

fn browse_key(state: &mut AppState, key: KeyEvent, ctrl: bool) -> Option<AppMsg> {
    if let Some((_, w)) = &mut state.form_page {
        return match w.on_key(key) {
            FormEvent::Submit => Some(AppMsg::SubmitForm(w.form.answers())),
            FormEvent::Cancel => Some(AppMsg::Back),
            FormEvent::None => None,
        };
    }
    let is_list = matches!(
        state.stack.top().map(|f| &*f.page),
        Some(Page::List(_))
    );
    match key.code {
        KeyCode::Up => Some(AppMsg::Move(-1)),
        KeyCode::Down => Some(AppMsg::Move(1)),
        KeyCode::PageUp => Some(AppMsg::Move(-10)),
        KeyCode::PageDown => Some(AppMsg::Move(10)),
        KeyCode::Enter => Some(AppMsg::Primary),
        KeyCode::Tab => Some(AppMsg::OpenPalette),
        KeyCode::Esc => Some(AppMsg::Back),
        KeyCode::Char(c) if ctrl => {
            if c == 'r' && !bound_to(state, 'r') {
                Some(AppMsg::RefreshPreview)
            } else {
                Some(AppMsg::Shortcut(c))
            }
        }
        KeyCode::Backspace if is_list => Some(AppMsg::FilterBackspace),
        KeyCode::Char(c) if is_list => Some(AppMsg::FilterInput(c)),
        _ => None,
    }
}

fn bound_to(state: &AppState, c: char) -> bool {
    current_actions(state).iter().any(|a| {
        a.key()
            .map(|k| k.eq_ignore_ascii_case(&c.to_string()))
            .unwrap_or(false)
    })
}

fn draw(f: &mut Frame, state: &mut AppState) {
    let screen = f.area();
    f.render_widget(
        Block::default().style(Style::default().bg(state.theme.bg).fg(state.theme.fg)),
        screen,
    );
    const DEBUG_H: u16 = 8;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(if state.show_debug { DEBUG_H } else { 0 }),
            Constraint::Length(1),
        ])
        .split(screen);
    let main = chunks[0];
    let modal = !matches!(state.mode, Mode::Browse);

    draw_page(f, main, state, !modal);
    match &mut state.mode {
        Mode::Palette { selected } => {
            let selected = *selected;
            let actions = current_actions(state);
            draw_palette(f, main, &actions, selected, &state.theme);
        }
        Mode::Collecting { form, .. } => {
            let rect = centered_rect(70, 70, main);
            f.render_widget(Clear, rect);
            form.render(f, rect, true, state.tick, &state.theme);
        }
        Mode::Confirm { plan } => {
            if let crate::app::dispatch::Plan::Run {
                title, invocation, ..
            } = plan
            {
                let command = crate::logging::scrub(&invocation.display());
                draw_confirm(f, main, title, &command, &state.theme);
            }
        }
        Mode::Busy { .. } | Mode::Browse => {}
    }
    if state.show_debug {
        draw_debug(f, chunks[1], state);
    }
    draw_status(f, chunks[2], state);
}

fn draw_page(f: &mut Frame, area: Rect, state: &mut AppState, focused: bool) {
    let Some(frame) = state.stack.top() else {
        let msg = match &state.mode {
            Mode::Busy { title, .. } => format!("{title}..."),
            _ => "No page".to_string(),
        };
        f.render_widget(
            Paragraph::new(Span::styled(msg, state.theme.text_muted()))
                .block(crate::widgets::chrome::panel_block("pagebeam", focused, &state.theme)),
            area,
        );
        return;
    };
    let page = std::rc::Rc::clone(&frame.page);
    let (slot_id, filter, selected) = (frame.id, frame.filter.clone(), frame.selected);
    match &*page {
        Page::List(list) if list.shows_preview() => {
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
                .split(area);
            draw_list(f, cols[0], list, &filter, selected, focused, &state.theme);
            let (title, language) = match selected_item(list, &filter, selected) {
                Some((_, item)) => (
                    item.title.clone(),
                    item.preview.as_ref().and_then(|p| p.language().map(str::to_string)),
                ),
                None => ("Preview".to_string(), None),
            };
            draw_preview(
                f,
                cols[1],
                &title,
                state.preview.slot(slot_id),
                language.as_deref(),
                false,
                state.tick,
                &state.theme,
            );
        }
        Page::List(list) => draw_list(f, area, list, &filter, selected, focused, &state.theme),
        Page::Detail(detail) => draw_detail(
            f,
            area,
            detail,
            state.preview.slot(slot_id),
            state.tick,
            &state.theme,
        ),
        Page::Form(_) => {
            let tick = state.tick;
            if let Some((_, w)) = &mut state.form_page {
                w.render(f, area, focused, tick, &state.theme);
            }
        }
    }
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    let b = Block::default()
        .borders(Borders::TOP)
        .border_style(state.theme.text_muted())
        .title(Span::styled(
            "Debug",
            state.theme.text_muted().add_modifier(Modifier::BOLD),
        ));
    let lines = crate::logging::recent();
    let h = area.height.saturating_sub(1) as usize;
    let start = lines.len().saturating_sub(h);
    let text: Vec<Line> = lines
        .into_iter()
        .skip(start)
        .map(Line::raw)
        .collect();
    let p = Paragraph::new(text)
        .style(Style::default().fg(Color::Gray))
        .block(b)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decode_page;
    use crate::services::capabilities::fakes;
    use crate::services::catalog::FsCatalog;

    fn state_with(json: &str) -> AppState {
        let (caps, _) = fakes::recording();
        let mut st = AppState::new(Settings::default(), caps, Box::new(FsCatalog));
        st.stack.push(decode_page(json).unwrap(), PageSource::Inline);
        dispatch(&mut st, AppMsg::Tick);
        st
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn screen(st: &mut AppState) -> String {
        let mut terminal = Terminal::new(ratatui::backend::TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| draw(f, st)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn typing_on_a_list_filters() {
        let mut st = state_with(r#"{"type":"list","items":[{"title":"a"}]}"#);
        assert!(matches!(key_to_msg(&mut st, key(KeyCode::Char('x'))), Some(AppMsg::FilterInput('x'))));
        assert!(matches!(key_to_msg(&mut st, key(KeyCode::Enter)), Some(AppMsg::Primary)));
        assert!(matches!(key_to_msg(&mut st, ctrl('c')), Some(AppMsg::Quit)));
    }

    #[test]
    fn ctrl_r_refreshes_unless_an_action_claims_it() {
        let mut st = state_with(
            r#"{"type":"detail","preview":{"type":"static","text":"t"},
                "actions":[{"type":"copy","text":"x","key":"y"}]}"#,
        );
        assert!(matches!(key_to_msg(&mut st, ctrl('r')), Some(AppMsg::RefreshPreview)));
        assert!(matches!(key_to_msg(&mut st, ctrl('y')), Some(AppMsg::Shortcut('y'))));

        let mut st = state_with(
            r#"{"type":"detail","preview":{"type":"static","text":"t"},
                "actions":[{"type":"reload","key":"r"}]}"#,
        );
        assert!(matches!(key_to_msg(&mut st, ctrl('r')), Some(AppMsg::Shortcut('r'))));
    }

    #[test]
    fn ctrl_c_runs_a_bound_action_and_quits_otherwise() {
        let mut st = state_with(
            r#"{"type":"list","items":[{"title":"a","actions":[
                {"type":"copy","text":"x","key":"c"}]}]}"#,
        );
        assert!(matches!(key_to_msg(&mut st, ctrl('c')), Some(AppMsg::Shortcut('c'))));
        dispatch(&mut st, AppMsg::OpenPalette);
        assert!(matches!(key_to_msg(&mut st, ctrl('c')), Some(AppMsg::Quit)));
    }

    #[test]
    fn busy_mode_only_accepts_cancel() {
        let mut st = state_with(r#"{"type":"list","items":[{"title":"a"}]}"#);
        st.mode = Mode::Busy {
            ticket: 1,
            title: "Run".into(),
            cancel: CancelToken::new(),
            kind: crate::app::BusyKind::Load {
                purpose: crate::services::loader::LoadPurpose::Push,
                frame: None,
            },
        };
        assert!(key_to_msg(&mut st, key(KeyCode::Enter)).is_none());
        assert!(matches!(key_to_msg(&mut st, key(KeyCode::Esc)), Some(AppMsg::CancelBusy)));
        assert!(matches!(key_to_msg(&mut st, ctrl('c')), Some(AppMsg::CancelBusy)));
    }

    #[test]
    fn list_with_preview_renders_both_panes() {
        let mut st = state_with(
            r#"{"type":"list","title":"Files","showPreview":true,"items":[
                {"title":"main.rs","id":"m","preview":{"type":"static","text":"fn main() {}","language":"rust"}}
            ]}"#,
        );
        let s = screen(&mut st);
        assert!(s.contains("Files"));
        assert!(s.contains("main.rs"));
        assert!(s.contains("fn main() {}"));
    }

    #[test]
    fn form_page_takes_keys_and_submits() {
        let mut st = state_with(
            r#"{"type":"form","title":"New","submitAction":{"type":"copy","text":"${t}",
                "inputs":[{"type":"textfield","name":"t","title":"T","default":"d"}]}}"#,
        );
        assert!(st.form_page.is_some());
        assert!(screen(&mut st).contains("New"));
        match key_to_msg(&mut st, ctrl('s')) {
            Some(AppMsg::SubmitForm(answers)) => assert_eq!(answers, vec![None]),
            _ => panic!("expected form submit"),
        }
    }

    #[test]
    fn confirm_overlay_masks_secure_values() {
        let mut st = state_with(
            r#"{"type":"list","items":[{"title":"deploy","actions":[{"type":"run",
                "command":"deploy --token ${tok}","confirm":true,
                "inputs":[{"type":"textfield","name":"tok","title":"Token","secure":true}]}]}]}"#,
        );
        dispatch(&mut st, AppMsg::Primary);
        dispatch(
            &mut st,
            AppMsg::SubmitInputs(vec![Some(crate::app::inputs::Value::Text(
                "hunter2secret".into(),
            ))]),
        );
        assert!(matches!(st.mode, Mode::Confirm { .. }));
        let s = screen(&mut st);
        assert!(s.contains("deploy --token ***"));
        assert!(!s.contains("hunter2secret"));
    }

    #[test]
    fn toast_effect_expires_after_its_ticks() {
        let mut st = state_with(r#"{"type":"list"}"#);
        run_effects(
            &mut st,
            vec![Effect::ShowToast {
                text: "hi".into(),
                level: ToastLevel::Info,
                seconds: 1,
            }],
        );
        // 1s at the default 200ms tick.
        assert_eq!(st.toast.as_ref().unwrap().expires_at_tick, st.tick + 5);
        for _ in 0..5 {
            dispatch(&mut st, AppMsg::Tick);
        }
        assert!(st.toast.is_none());
    }
}
