use anyhow::Result;
use clap::Args;
use emoboard_core::board::Tooltip;
use emoboard_core::error::ErrorCode;
use serde::Serialize;
use std::io::Write;

use super::CmdContext;
use crate::output::{CodedError, pretty_kv, pretty_section, render_mode};

/// Arguments for `eb show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Post id, as printed by `eb list`.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    id: String,
    x: f64,
    y: f64,
    #[serde(flatten)]
    tooltip: Tooltip,
}

/// Print the tooltip for one post on the current board.
pub fn run_show(args: &ShowArgs, ctx: &CmdContext) -> Result<()> {
    let mut session = ctx.session()?;
    session.load()?;
    let Some(emotion) = session.get(&args.id) else {
        return Err(CodedError::new(
            ErrorCode::RecordNotFound,
            format!("no emotion with id '{}' on the board", args.id),
        )
        .into());
    };

    let out = ShowOutput {
        id: emotion.id.clone(),
        x: emotion.x,
        y: emotion.y,
        tooltip: Tooltip::for_emotion(emotion),
    };

    render_mode(
        ctx.output,
        &out,
        |o, w| {
            writeln!(
                w,
                "{}  {}  {}  {}",
                o.id, o.tooltip.label, o.tooltip.timestamp, o.tooltip.text
            )
        },
        |o, w| {
            pretty_section(w, o.tooltip.label)?;
            writeln!(w, "{}", o.tooltip.text)?;
            writeln!(w)?;
            pretty_kv(w, "Posted", &o.tooltip.timestamp)?;
            pretty_kv(w, "Color", o.tooltip.color)?;
            pretty_kv(w, "Position", format!("{:.1}%, {:.1}%", o.x, o.y))?;
            pretty_kv(w, "Id", &o.id)
        },
    )
}
