use crate::video::{Framebuffer, Rgb};
use crossterm::{cursor, execute, terminal};
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::Color;
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

/// Display is where finished frames end up. It should abstract the
/// implementation details, so a variety of kinds of screen would work.
pub trait Display {
    /// put a decoded frame on the screen
    fn draw(&mut self, frame: &Framebuffer) -> Result<(), io::Error>;

    /// a one-line status shown alongside the picture, if there's room
    fn set_title(&mut self, _title: &str) {}
}

// store useful metadata about the terminal canvas
struct Resolution(usize, usize);

impl Resolution {
    fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    /// cells needed to show the canvas inside a border
    fn area(&self) -> Rect {
        Rect::new(0, 0, 2 + self.0 as u16, 2 + self.1 as u16)
    }

    /// every pixel of one colour as canvas coords; y grows upward in TUI
    fn points_of(&self, frame: &Framebuffer, colour: Rgb) -> Vec<(f64, f64)> {
        frame
            .coords_of(colour)
            .map(|(x, y)| (x as f64, -1.0 * y as f64))
            .collect()
    }
}

/// the distinct colours in a frame, in order of first appearance
fn colours_in(frame: &Framebuffer) -> Vec<Rgb> {
    let mut colours: Vec<Rgb> = Vec::new();
    for px in frame.as_bytes().chunks_exact(4) {
        let c = Rgb(px[0], px[1], px[2]);
        if !colours.contains(&c) {
            colours.push(c);
        }
    }
    colours
}

/// full colour display in a terminal, rendered using TUI and crossterm
pub struct TermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    resolution: Resolution,
    title: String,
}

impl TermDisplay {
    pub fn new(x: usize, y: usize) -> Result<TermDisplay, io::Error> {
        let mut stdout = io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        Ok(TermDisplay {
            terminal,
            resolution: Resolution(x, y),
            title: String::from("CHIP-8"),
        })
    }
}

impl Drop for TermDisplay {
    fn drop(&mut self) {
        if let Err(e) = execute!(io::stdout(), cursor::Show, terminal::LeaveAlternateScreen) {
            log::warn!("couldn't restore the terminal: {}", e);
        }
    }
}

impl Display for TermDisplay {
    fn draw(&mut self, frame: &Framebuffer) -> Result<(), io::Error> {
        // make sure we're given exactly the right amount of data to draw
        assert_eq!(
            frame.width() * frame.height(),
            self.resolution.pixel_count(),
            "TermDisplay must have a correctly sized frame to draw"
        );

        // a monochrome frame has two layers; paint each in its own colour
        let layers: Vec<(Color, Vec<(f64, f64)>)> = colours_in(frame)
            .into_iter()
            .map(|c| (Color::Rgb(c.0, c.1, c.2), self.resolution.points_of(frame, c)))
            .collect();
        let title = self.title.as_str();
        let resolution = &self.resolution;

        // for now this assumes a 1:1 ratio between terminal cells and pixels
        self.terminal.draw(|f| {
            let area = f.size().intersection(resolution.area());
            let canvas = Canvas::default()
                .block(Block::default().title(title).borders(Borders::ALL))
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    for (colour, coords) in &layers {
                        ctx.draw(&Points {
                            coords,
                            color: *colour,
                        });
                    }
                });
            f.render_widget(canvas, area);
        })?;
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }
}

/// useful for testing non-display routines; remembers what it was given
#[derive(Debug, Default)]
pub struct DummyDisplay {
    pub frames: usize,
    pub last: Option<Framebuffer>,
    pub title: String,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay::default()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, frame: &Framebuffer) -> Result<(), io::Error> {
        self.frames += 1;
        self.last = Some(frame.clone());
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }
}
