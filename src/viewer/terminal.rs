//! Terminal I/O layer: raw mode, item grid, status bar, command bar.

use crossterm::{
    ExecutableCommand, QueueableCommand, cursor,
    style::{self, Stylize},
    terminal,
};
use std::io::{self, Write, stdout};

use super::state::{GridView, Layout, ROW_HEIGHT};
use crate::item::Item;

// ---------------------------------------------------------------------------
// RawGuard: raw mode / alternate screen are restored on Drop
// ---------------------------------------------------------------------------

pub(super) struct RawGuard {
    cleaned: bool,
}

impl RawGuard {
    pub(super) fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        stdout().execute(terminal::EnterAlternateScreen)?;
        stdout().execute(cursor::Hide)?;
        Ok(Self { cleaned: false })
    }

    pub(super) fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let mut out = stdout();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Cut `text` to at most `width` characters, marking the cut with `~`.
pub(super) fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        return format!("{text:<width$}");
    }
    if width == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(width - 1).collect();
    cut.push('~');
    cut
}

/// Draw the visible part of the item grid.
///
/// Each grid row is `ROW_HEIGHT` lines: ` id`, ` url`, blank. The selected
/// cell is highlighted.
pub(super) fn draw_grid(layout: &Layout, grid: &GridView, items: &[Item]) -> io::Result<()> {
    let mut out = stdout();
    out.queue(terminal::Clear(terminal::ClearType::All))?;

    let columns = grid.columns as usize;
    let cell_w = (layout.term_cols as usize / columns).max(1);
    let text_w = cell_w.saturating_sub(2);

    for r in 0..layout.visible_rows() {
        let row_idx = grid.scroll_row + r;
        let y = r as u16 * ROW_HEIGHT;
        for c in 0..columns {
            let idx = row_idx * columns + c;
            let Some(item) = items.get(idx) else {
                break;
            };
            let x = (c * cell_w) as u16;
            let marker = if idx == grid.selected { ">" } else { " " };
            let id_line = format!("{marker}{} ", fit(&item.id, text_w));
            let url_line = format!(" {} ", fit(&item.url, text_w));

            out.queue(cursor::MoveTo(x, y))?;
            if idx == grid.selected {
                write!(out, "{}", id_line.on_dark_blue().white())?;
                out.queue(cursor::MoveTo(x, y + 1))?;
                write!(out, "{}", url_line.on_dark_blue().grey())?;
            } else {
                write!(out, "{}", id_line.white().bold())?;
                out.queue(cursor::MoveTo(x, y + 1))?;
                write!(out, "{}", url_line.dark_grey())?;
            }
        }
    }
    out.queue(style::ResetColor)?;
    out.flush()
}

/// Values shown in the status bar.
pub(super) struct StatusLine<'a> {
    pub library: &'a str,
    pub folder: &'a str,
    pub count: usize,
    pub phase: &'a str,
    pub loading: bool,
    pub error: Option<&'a str>,
}

/// Render the status text (without styling).
///
/// `acc_peek`: 数字蓄積中なら `:5_` のように表示
/// `flash`: 一時メッセージ（次のキー入力でクリア）
pub(super) fn status_text(s: &StatusLine, acc_peek: Option<u32>, flash: Option<&str>) -> String {
    let head = format!(" {} | {} | {} items", s.library, s.folder, s.count);
    let tail = if let Some(msg) = flash {
        msg.to_string()
    } else if let Some(n) = acc_peek {
        format!(":{n}_")
    } else if s.loading {
        "Loading images...".to_string()
    } else if let Some(err) = s.error {
        format!("fetch failed: {err} [r:retry]")
    } else {
        format!("{}  [hjkl:move +/-:columns r:reload o:open i:info ::cmd q:quit]", s.phase)
    };
    format!("{head} | {tail}")
}

/// ステータスバーをターミナル最終行に描画。
pub(super) fn draw_status_bar(
    layout: &Layout,
    status: &StatusLine,
    acc_peek: Option<u32>,
    flash: Option<&str>,
) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, layout.status_row))?;
    let text = fit(&status_text(status, acc_peek, flash), layout.term_cols as usize);
    write!(out, "{}", text.on_dark_grey().white())?;
    out.queue(style::ResetColor)?;
    out.flush()
}

/// Draw command input bar on the status row (`:input_` prompt).
pub(super) fn draw_command_bar(layout: &Layout, input: &str) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, layout.status_row))?;
    let prompt = fit(&format!(":{input}_"), layout.term_cols as usize);
    write!(out, "{}", prompt.on_dark_grey().white())?;
    out.queue(style::ResetColor)?;
    out.flush()
}

pub(super) fn check_tty() -> anyhow::Result<()> {
    use std::io::IsTerminal;
    if !io::stdout().is_terminal() {
        anyhow::bail!(
            "eaglet viewer requires an interactive terminal.\n\
             \n\
             To list items non-interactively, use: eaglet list"
        );
    }
    Ok(())
}
