//! Normal mode handler: selection movement, columns, retry, mode transitions.

use log::debug;

use super::input::Action;
use super::state::{ExitReason, GridView};
use super::{Effect, ViewerMode};

pub(super) struct NormalCtx<'a> {
    pub grid: &'a GridView,
    pub len: usize,
    pub scroll_step: u32,
}

fn step(count: u32, unit: usize) -> usize {
    (count as usize).saturating_mul(unit)
}

pub(super) fn handle(action: Action, ctx: &NormalCtx) -> Vec<Effect> {
    let last = ctx.len.saturating_sub(1);
    let sel = ctx.grid.selected;
    let row_unit = ctx.grid.columns as usize * ctx.scroll_step as usize;

    match action {
        Action::Quit => vec![Effect::Exit(ExitReason::Quit)],

        Action::CancelInput | Action::Digit => vec![Effect::RedrawStatusBar],

        Action::Left(count) => vec![Effect::Select(sel.saturating_sub(step(count, 1)))],
        Action::Right(count) => vec![Effect::Select(sel.saturating_add(step(count, 1)).min(last))],
        Action::Up(count) => vec![Effect::Select(sel.saturating_sub(step(count, row_unit)))],
        Action::Down(count) => {
            let target = sel.saturating_add(step(count, row_unit)).min(last);
            debug!("select down: {sel} → {target} (count={count}, row_unit={row_unit})");
            vec![Effect::Select(target)]
        }
        Action::JumpToTop => vec![Effect::Select(0)],
        Action::JumpToBottom => vec![Effect::Select(last)],

        Action::MoreColumns => vec![Effect::SetColumns(ctx.grid.columns.saturating_add(1))],
        Action::FewerColumns => vec![Effect::SetColumns(ctx.grid.columns.saturating_sub(1))],

        Action::Retry => vec![Effect::Recover, Effect::Flash("Reloading from the start".into())],

        Action::OpenSelected if ctx.len == 0 => vec![Effect::Flash("Nothing selected".into())],
        Action::OpenSelected => vec![Effect::OpenSelected],
        Action::ShowInfo if ctx.len == 0 => vec![Effect::Flash("Nothing selected".into())],
        Action::ShowInfo => vec![Effect::ShowInfo],

        Action::EnterCommand => vec![Effect::SetMode(ViewerMode::Command)],
    }
}
