use anyhow::Result;
use clap::Args;
use emoboard_core::legend::Legend;
use std::io::Write;

use super::CmdContext;
use crate::output::{pretty_rule, pretty_section, render_mode};

/// Arguments for `eb legend`.
#[derive(Args, Debug)]
pub struct LegendArgs {}

/// Print per-category counts for the current board.
pub fn run_legend(_args: &LegendArgs, ctx: &CmdContext) -> Result<()> {
    let mut session = ctx.session()?;
    session.load()?;
    let legend = Legend::from_emotions(session.emotions());

    render_mode(
        ctx.output,
        &legend,
        |l, w| {
            for row in &l.rows {
                writeln!(w, "{}  {}  {:.1}", row.category, row.count, row.percentage)?;
            }
            writeln!(w, "total  {}", l.total)
        },
        |l, w| {
            pretty_section(w, "Emotions")?;
            for row in &l.rows {
                writeln!(
                    w,
                    "● {:<10} {:>5}  {:>5.1}%",
                    row.label, row.count, row.percentage
                )?;
            }
            pretty_rule(w)?;
            writeln!(w, "{}", l.total_label())
        },
    )
}
