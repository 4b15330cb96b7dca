//! Interactive terminal board for `eb board`.

pub mod add_dialog;
pub mod board;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use emoboard_core::Category;
use emoboard_core::backend::EmotionBackend;
use emoboard_core::position::PositionSource;
use ratatui::{Terminal, backend::CrosstermBackend, style::Color};
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use tracing::info;

use crate::cmd::BoardSession;
use board::{BoardAction, BoardView};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Terminal color for a category's palette entry.
#[must_use]
pub fn category_color(category: Category) -> Color {
    let (r, g, b) = category.rgb();
    Color::Rgb(r, g, b)
}

/// Run the board until the user quits. The terminal is restored even when
/// drawing or input fails.
pub fn run_board_tui(session: BoardSession) -> Result<()> {
    let mut view = BoardView::new(session);
    info!(
        emotions = view.session().emotions().len(),
        live = view.session().is_live(),
        "board opened"
    );

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let result = event_loop(&mut terminal, &mut view);

    view.close();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

fn event_loop<B, P>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    view: &mut BoardView<B, P>,
) -> Result<()>
where
    B: EmotionBackend,
    P: PositionSource,
{
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|frame| view.render(frame))?;
        if event::poll(TICK_RATE.saturating_sub(last_tick.elapsed()))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if view.handle_key(key) == BoardAction::Quit {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => view.handle_mouse(mouse),
                _ => {}
            }
        }
        if last_tick.elapsed() >= TICK_RATE {
            view.tick();
            last_tick = Instant::now();
        }
    }
}
