use anyhow::Result;
use clap::Args;
use emoboard_core::Category;
use tracing::debug;

use super::{CmdContext, EmotionView};
use crate::output::render_item;

/// Arguments for `eb add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// What you feel, up to 100 characters.
    pub text: String,

    /// Emotion tag.
    #[arg(short, long, default_value_t = Category::Sadness)]
    pub emotion: Category,
}

/// Post one emotion and print the created record.
pub fn run_add(args: &AddArgs, ctx: &CmdContext) -> Result<()> {
    let mut session = ctx.session()?;
    let emotion = session.add(&args.text, args.emotion)?;
    debug!(id = %emotion.id, "posted");
    render_item(&EmotionView::from(&emotion), ctx.output)?;
    Ok(())
}
