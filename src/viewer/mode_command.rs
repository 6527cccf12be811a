//! Command mode handler (`:` prompt).

use std::io;

use super::input::CommandAction;
use super::state::{ExitReason, Layout};
use super::terminal;
use super::{Effect, ViewerMode};
use crate::fetch::QueryContext;

/// Mutable state for command mode (`:` prompt).
pub(super) struct CommandState {
    pub input: String,
}

pub(super) fn handle(
    action: CommandAction,
    cs: &mut CommandState,
    layout: &Layout,
) -> io::Result<Vec<Effect>> {
    match action {
        CommandAction::Type(c) => {
            cs.input.push(c);
            terminal::draw_command_bar(layout, &cs.input)?;
            Ok(vec![])
        }
        CommandAction::Backspace => {
            if cs.input.is_empty() {
                // Empty input + Backspace → cancel (vim behavior)
                Ok(vec![Effect::SetMode(ViewerMode::Normal), Effect::MarkDirty])
            } else {
                cs.input.pop();
                terminal::draw_command_bar(layout, &cs.input)?;
                Ok(vec![])
            }
        }
        CommandAction::Execute => {
            let cmd = std::mem::take(&mut cs.input);
            let mut effects = vec![Effect::SetMode(ViewerMode::Normal), Effect::MarkDirty];
            effects.extend(parse_command(cmd.trim()));
            Ok(effects)
        }
        CommandAction::Cancel => {
            cs.input.clear();
            Ok(vec![Effect::SetMode(ViewerMode::Normal), Effect::MarkDirty])
        }
    }
}

fn parse_command(cmd: &str) -> Vec<Effect> {
    let (name, arg) = match cmd.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (cmd, ""),
    };
    match (name, arg) {
        ("", _) => vec![],
        ("q" | "quit", _) => vec![Effect::Exit(ExitReason::Quit)],
        ("all", _) => vec![Effect::SetContext(QueryContext::all(), "all images".into())],
        ("retry" | "reload", _) => vec![Effect::Recover],
        ("folder" | "f", "") => vec![Effect::Flash("Usage: :folder <id or name>".into())],
        ("folder" | "f", key) => vec![Effect::ResolveFolder(key.to_string())],
        ("switch", "") => vec![Effect::Flash("Usage: :switch <library>".into())],
        ("switch", name) => vec![Effect::Exit(ExitReason::SwitchLibrary(name.to_string()))],
        _ => vec![Effect::Flash(format!("Unknown command: {cmd}"))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit() {
        assert!(matches!(parse_command("q")[..], [Effect::Exit(ExitReason::Quit)]));
    }

    #[test]
    fn folder_with_spaces_in_name() {
        assert!(matches!(
            &parse_command("folder  Old Sketches ")[..],
            [Effect::ResolveFolder(k)] if k == "Old Sketches"
        ));
    }

    #[test]
    fn folder_without_argument() {
        assert!(matches!(parse_command("folder")[..], [Effect::Flash(_)]));
    }

    #[test]
    fn all_clears_filter() {
        assert!(matches!(
            &parse_command("all")[..],
            [Effect::SetContext(ctx, _)] if ctx.folder_id.is_none()
        ));
    }

    #[test]
    fn switch_exits_with_name() {
        assert!(matches!(
            &parse_command("switch Photos")[..],
            [Effect::Exit(ExitReason::SwitchLibrary(n))] if n == "Photos"
        ));
    }

    #[test]
    fn retry_recovers() {
        assert!(matches!(parse_command("retry")[..], [Effect::Recover]));
    }

    #[test]
    fn unknown_command_flashes() {
        assert!(matches!(
            &parse_command("frobnicate")[..],
            [Effect::Flash(m)] if m.contains("frobnicate")
        ));
    }

    #[test]
    fn empty_command_does_nothing() {
        assert!(parse_command("").is_empty());
    }
}
