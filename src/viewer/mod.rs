//! Terminal grid browser for an Eagle library.
//!
//! Layout:
//!   rows 0..term_rows-1 : item grid, `ROW_HEIGHT` lines per grid row
//!   row term_rows-1     : status bar / command bar
//!
//! Loading:
//!   The session owns one `FetchSequencer`. Each loop iteration drains its
//!   completions, re-subscribes the `ViewportTrigger` to the current list
//!   boundary and reports whether the last item's row is on screen. A fire
//!   becomes `request_more`, which the sequencer refuses while a page is in
//!   flight, after the end of the list, or after a failure (`r` recovers).
//!
//! Key handling is split by mode (`mode_normal`, `mode_command`). Handlers
//! are pure and return `Effect`s; `Session::apply` performs them.

mod input;
mod mode_command;
mod mode_normal;
mod state;
mod terminal;

use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal as crossterm_terminal,
};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::{EagleClient, Folder};
use crate::config::Config;
use crate::fetch::{Boundary, FetchPhase, FetchSequencer, QueryContext, ViewportTrigger};

use input::{InputAccumulator, map_command_key, map_key_event};
use mode_command::CommandState;
use mode_normal::NormalCtx;
use state::{ExitReason, GridView, Layout};

const IDLE_WAIT: Duration = Duration::from_secs(86400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewerMode {
    Normal,
    Command,
}

/// Side effects requested by the mode handlers.
enum Effect {
    Select(usize),
    SetColumns(u16),
    /// Drop everything and reload page 0 of the current context.
    Recover,
    /// Switch the folder filter; the `String` is the status-bar label.
    SetContext(QueryContext, String),
    /// Look a folder up by id or name, then `SetContext`.
    ResolveFolder(String),
    OpenSelected,
    ShowInfo,
    Flash(String),
    SetMode(ViewerMode),
    RedrawStatusBar,
    MarkDirty,
    Exit(ExitReason),
}

/// Run the viewer until the user quits.
///
/// `:switch <name>` ends the current session, asks Eagle to switch, waits
/// for the switch to land, then starts a fresh session on "all images".
pub fn run(client: Arc<EagleClient>, config: &Config, initial: QueryContext) -> anyhow::Result<()> {
    terminal::check_tty()?;

    let (term_cols, term_rows) = crossterm_terminal::size()
        .map_err(|e| anyhow::anyhow!("failed to get terminal size: {e}"))?;

    let mut guard = terminal::RawGuard::enter()?;
    let mut layout = state::compute_layout(term_cols, term_rows);
    let mut context = initial;
    let mut columns = config.viewer.columns;
    let mut carry_flash: Option<String> = None;

    loop {
        let library = match client.current_library() {
            Ok(name) => name,
            Err(e) => {
                warn!("viewer: current library unknown: {e}");
                "?".to_string()
            }
        };
        let mut session = Session::new(Arc::clone(&client), config, context, library, columns);
        session.flash = carry_flash.take();

        let exit = session.run(&mut layout)?;
        columns = session.grid.columns;

        match exit {
            ExitReason::Quit => break,
            ExitReason::SwitchLibrary(name) => {
                let status = terminal::StatusLine {
                    library: &session.library,
                    folder: &session.folder_label,
                    count: session.seq.items().len(),
                    phase: session.seq.phase().label(),
                    loading: true,
                    error: None,
                };
                let msg = format!("Switching to {name}...");
                terminal::draw_status_bar(&layout, &status, None, Some(&msg))?;
                drop(session);

                carry_flash = Some(match switch_library(&client, config, &name) {
                    Ok(()) => format!("Switched to {name}"),
                    Err(e) => format!("Switch failed: {e}"),
                });
                // Folder ids belong to the old library.
                context = QueryContext::all();
            }
        }
    }

    guard.cleanup();
    Ok(())
}

fn switch_library(client: &EagleClient, config: &Config, name: &str) -> anyhow::Result<()> {
    client.switch_library(name)?;
    client.wait_for_library(
        name,
        config.library.switch_attempts,
        config.library.switch_poll_interval,
    )?;
    info!("viewer: library is now {name}");
    Ok(())
}

/// One viewer session over one library.
struct Session {
    client: Arc<EagleClient>,
    seq: FetchSequencer<EagleClient>,
    trigger: ViewportTrigger,
    grid: GridView,
    mode: ViewerMode,
    acc: InputAccumulator,
    cmd: CommandState,
    flash: Option<String>,
    library: String,
    folder_label: String,
    folders: Option<Vec<Folder>>,
    scroll_step: u32,
    frame_budget: Duration,
    poll_interval: Duration,
}

impl Session {
    fn new(
        client: Arc<EagleClient>,
        config: &Config,
        context: QueryContext,
        library: String,
        columns: u16,
    ) -> Self {
        let folder_label = context.to_string();
        Self {
            seq: FetchSequencer::new(Arc::clone(&client), context),
            client,
            trigger: ViewportTrigger::new(),
            grid: GridView::new(columns),
            mode: ViewerMode::Normal,
            acc: InputAccumulator::new(),
            cmd: CommandState {
                input: String::new(),
            },
            flash: None,
            library,
            folder_label,
            folders: None,
            scroll_step: config.viewer.scroll_step,
            frame_budget: config.viewer.frame_budget,
            poll_interval: config.viewer.poll_interval,
        }
    }

    fn run(&mut self, layout: &mut Layout) -> anyhow::Result<ExitReason> {
        self.seq.start();
        let mut dirty = true;
        let mut last_render = Instant::now();

        loop {
            if self.seq.poll() {
                dirty = true;
            }
            if self.check_boundary(layout) {
                dirty = true;
            }

            let timeout = if dirty {
                self.frame_budget.saturating_sub(last_render.elapsed())
            } else if self.seq.is_loading() {
                self.poll_interval
            } else {
                IDLE_WAIT
            };

            if event::poll(timeout)? {
                let ev = event::read()?;
                debug!("event: {:?}", ev);
                match ev {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        let had_flash = self.flash.take().is_some();
                        let effects = match self.mode {
                            ViewerMode::Normal => match map_key_event(key, &mut self.acc) {
                                Some(action) => {
                                    let ctx = NormalCtx {
                                        grid: &self.grid,
                                        len: self.seq.items().len(),
                                        scroll_step: self.scroll_step,
                                    };
                                    mode_normal::handle(action, &ctx)
                                }
                                None if self.acc.is_active() || had_flash => {
                                    self.acc.reset();
                                    vec![Effect::RedrawStatusBar]
                                }
                                None => vec![],
                            },
                            ViewerMode::Command => match map_command_key(key) {
                                Some(action) => {
                                    mode_command::handle(action, &mut self.cmd, layout)?
                                }
                                None => vec![],
                            },
                        };
                        for effect in effects {
                            match self.apply(effect, layout)? {
                                Step::Continue => {}
                                Step::Dirty => dirty = true,
                                Step::Exit(reason) => return Ok(reason),
                            }
                        }
                    }
                    Event::Resize(cols, rows) => {
                        *layout = state::compute_layout(cols, rows);
                        debug!("resize: {cols}x{rows}, {} visible rows", layout.visible_rows());
                        dirty = true;
                    }
                    _ => {}
                }
                continue;
            }

            // poll timeout → frame budget elapsed
            if dirty {
                self.redraw(layout)?;
                dirty = false;
                last_render = Instant::now();
            }
        }
    }

    /// Re-subscribe the trigger and report boundary visibility.
    ///
    /// Returns `true` when a new page was requested.
    fn check_boundary(&mut self, layout: &Layout) -> bool {
        let len = self.seq.items().len();
        let visible_rows = layout.visible_rows();
        self.grid.settle(len, visible_rows);

        self.trigger.observe(Boundary {
            last_id: self.seq.items().last().map(|item| item.id.clone()),
            offset: self.seq.offset(),
            columns: self.grid.columns,
            folder_id: self.seq.context().folder_id.clone(),
            has_more: self.seq.has_more(),
        });
        let visible = self.grid.last_item_visible(len, visible_rows);
        self.trigger.report(visible) && self.seq.request_more()
    }

    fn status(&self) -> terminal::StatusLine<'_> {
        terminal::StatusLine {
            library: &self.library,
            folder: &self.folder_label,
            count: self.seq.items().len(),
            phase: self.seq.phase().label(),
            loading: self.seq.is_loading(),
            error: match self.seq.phase() {
                FetchPhase::Error => self.seq.last_error(),
                _ => None,
            },
        }
    }

    fn redraw(&self, layout: &Layout) -> anyhow::Result<()> {
        terminal::draw_grid(layout, &self.grid, self.seq.items())?;
        self.redraw_bar(layout)
    }

    fn redraw_bar(&self, layout: &Layout) -> anyhow::Result<()> {
        match self.mode {
            ViewerMode::Command => terminal::draw_command_bar(layout, &self.cmd.input)?,
            ViewerMode::Normal => terminal::draw_status_bar(
                layout,
                &self.status(),
                self.acc.peek(),
                self.flash.as_deref(),
            )?,
        }
        Ok(())
    }

    fn show_flash(&mut self, layout: &Layout, msg: String) -> anyhow::Result<()> {
        self.flash = Some(msg);
        self.redraw_bar(layout)
    }

    fn apply(&mut self, effect: Effect, layout: &Layout) -> anyhow::Result<Step> {
        match effect {
            Effect::Select(idx) => {
                self.grid.selected = idx;
                self.grid.settle(self.seq.items().len(), layout.visible_rows());
                Ok(Step::Dirty)
            }
            Effect::SetColumns(n) => {
                let before = self.grid.columns;
                self.grid.set_columns(n);
                if self.grid.columns == before {
                    self.show_flash(layout, format!("{before} columns"))?;
                    return Ok(Step::Continue);
                }
                self.flash = Some(format!("{} columns", self.grid.columns));
                Ok(Step::Dirty)
            }
            Effect::Recover => {
                self.seq.recover();
                self.grid.reset();
                Ok(Step::Dirty)
            }
            Effect::SetContext(context, label) => {
                if self.seq.set_context(context) {
                    self.folder_label = label;
                    self.grid.reset();
                    Ok(Step::Dirty)
                } else {
                    self.show_flash(layout, format!("Already showing {label}"))?;
                    Ok(Step::Continue)
                }
            }
            Effect::ResolveFolder(key) => self.resolve_folder(&key, layout),
            Effect::OpenSelected => {
                let Some(item) = self.seq.items().get(self.grid.selected) else {
                    return Ok(Step::Continue);
                };
                let url = self.client.original_image_url(&item.id);
                info!("viewer: open {url}");
                let msg = match open::that_detached(&url) {
                    Ok(()) => format!("Opened {}", item.id),
                    Err(e) => format!("Open failed: {e}"),
                };
                self.show_flash(layout, msg)?;
                Ok(Step::Continue)
            }
            Effect::ShowInfo => {
                let Some(item) = self.seq.items().get(self.grid.selected) else {
                    return Ok(Step::Continue);
                };
                let msg = if item.is_placeholder() {
                    format!("{}: no id from server", item.id)
                } else {
                    match self.client.item_info(&item.id) {
                        Ok(info) => info.summary(),
                        Err(e) => format!("Info failed: {e}"),
                    }
                };
                self.show_flash(layout, msg)?;
                Ok(Step::Continue)
            }
            Effect::Flash(msg) => {
                self.show_flash(layout, msg)?;
                Ok(Step::Continue)
            }
            Effect::SetMode(mode) => {
                self.mode = mode;
                if mode == ViewerMode::Command {
                    self.cmd.input.clear();
                    terminal::draw_command_bar(layout, "")?;
                }
                Ok(Step::Continue)
            }
            Effect::RedrawStatusBar => {
                self.redraw_bar(layout)?;
                Ok(Step::Continue)
            }
            Effect::MarkDirty => Ok(Step::Dirty),
            Effect::Exit(reason) => Ok(Step::Exit(reason)),
        }
    }

    fn resolve_folder(&mut self, key: &str, layout: &Layout) -> anyhow::Result<Step> {
        if self.folders.is_none() {
            match self.client.folder_list() {
                Ok(tree) => self.folders = Some(tree),
                Err(e) => {
                    self.show_flash(layout, format!("Folder list failed: {e}"))?;
                    return Ok(Step::Continue);
                }
            }
        }
        let found = self
            .folders
            .as_deref()
            .and_then(|tree| Folder::find(tree, key))
            .map(|f| (f.id.clone(), f.name.clone()));
        match found {
            Some((id, name)) => self.apply(
                Effect::SetContext(QueryContext::folder(id), format!("folder {name}")),
                layout,
            ),
            None => {
                self.show_flash(layout, format!("No folder matches '{key}'"))?;
                Ok(Step::Continue)
            }
        }
    }
}

/// Outcome of applying one effect.
enum Step {
    Continue,
    Dirty,
    Exit(ExitReason),
}
