use anyhow::Result;
use clap::Args;

use super::CmdContext;
use crate::tui;

/// Arguments for `eb board`.
#[derive(Args, Debug)]
pub struct BoardArgs {}

/// Open the interactive board.
pub fn run_board(_args: &BoardArgs, ctx: &CmdContext) -> Result<()> {
    let session = ctx.session()?;
    tui::run_board_tui(session)
}
