/// Terminal renderer.
///
/// Each frame is composed into `front`, compared cell by cell against
/// `back` (what the terminal shows now), and only the differing cells are
/// queued. One flush per frame, then the buffers swap.
///
/// ## World → terminal mapping
///
/// The map area is a fixed grid of `MAP_COLS × MAP_ROWS` character cells
/// covering the camera's zoom-adjusted view rectangle. World y grows up,
/// terminal rows grow down, so rows are flipped: row 0 is the top of the
/// view. Zoom changes the size of the view rectangle, not the grid, so the
/// level visibly grows or shrinks during transitions.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{AnimationKind, Facing, Player};
use crate::domain::grapple::{Grapple, GrapplePhase};
use crate::domain::rect::Rect;
use crate::domain::tile::{prop, Tile, TILE_SIZE};
use crate::sim::world::{Phase, WorldState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the gap
    /// between rows matches the cell colour on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        Cell { ch, fg, bg: Self::norm_bg(bg) }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Renderer ──

/// World units per character cell. Terminal cells are roughly twice as
/// tall as wide, so a tile is two columns by one row.
const UNITS_PER_COL: f64 = TILE_SIZE / 2.0;
const UNITS_PER_ROW: f64 = TILE_SIZE;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };

/// Maps world points into the map area for one frame.
struct Viewport {
    view: Rect,
    cols: usize,
    rows: usize,
    sx: f64,
    sy: f64,
}

impl Viewport {
    fn new(view: Rect, cols: usize, rows: usize) -> Self {
        let sx = view.w / cols.max(1) as f64;
        let sy = view.h / rows.max(1) as f64;
        Viewport { view, cols, rows, sx, sy }
    }

    /// World point at the centre of a map cell.
    fn world_at(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.view.x + (col as f64 + 0.5) * self.sx,
            self.view.top() - (row as f64 + 0.5) * self.sy,
        )
    }

    fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.view.x) / self.sx).floor();
        let row = ((self.view.top() - y) / self.sy).floor();
        if col < 0.0 || row < 0.0 || col >= self.cols as f64 || row >= self.rows as f64 {
            return None;
        }
        Some((col as usize, row as usize))
    }
}

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, world: &WorldState) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Detect phase change → clear for clean transition
        if self.last_phase != Some(world.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }

        self.compose(world);

        self.flush_diff()?;

        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colours; ResetColor would fall back to the terminal default.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn map_size(&self, w: &WorldState) -> (usize, usize) {
        let cols = (w.camera.w / UNITS_PER_COL).round() as usize;
        let rows = (w.camera.h / UNITS_PER_ROW).round() as usize;
        let max_rows = self.front.height.saturating_sub(MAP_ROW + 4).max(1);
        (cols.min(self.front.width).max(1), rows.min(max_rows))
    }

    fn compose(&mut self, w: &WorldState) {
        self.front.clear();
        let (cols, rows) = self.map_size(w);
        let vp = Viewport::new(w.camera.view_rect(), cols, rows);

        self.compose_hud(w);
        self.compose_tiles(w, &vp);
        for p in w.particles() {
            if w.camera.sprite_in_view(&p.body.rect()) {
                if let Some((c, r)) = vp.cell_of(p.body.center_x(), p.body.center_y()) {
                    self.front.set(c, MAP_ROW + r, Cell::new('*', Color::Rgb { r: 255, g: 140, b: 40 }, Color::Reset));
                }
            }
        }
        if let Some(player) = w.player() {
            if player.alive {
                self.compose_rope(w, &player.grapple, &vp);
                self.compose_player(player, &vp);
            }
        }
        self.compose_footer(w, rows);
    }

    fn compose_hud(&mut self, w: &WorldState) {
        let mut hud = format!(" {}  [{}/{}]", w.level_name, w.current_level + 1, w.total_levels);
        if let Some(p) = w.player() {
            hud.push_str(&format!("  {:<10} {:<9}", p.state.name(), p.animation.kind.name()));
            if p.has_jetpack {
                let max = w.physics.jetpack_charge_max.max(1.0);
                let filled = ((p.jetpack_charge / max) * 10.0).round().clamp(0.0, 10.0) as usize;
                hud.push_str(&format!("  Jet[{}{}]", "=".repeat(filled), " ".repeat(10 - filled)));
            }
            if p.has_grapple {
                let rope = match p.grapple.phase {
                    GrapplePhase::Idle => "ready",
                    GrapplePhase::Traveling => "firing",
                    GrapplePhase::Latched => "latched",
                    GrapplePhase::Active => "swinging",
                };
                hud.push_str(&format!("  Hook:{rope}"));
            }
        }
        let (px, py) = w.camera.current_page();
        hud.push_str(&format!("  Deaths:{}  Page {},{} ", w.session.deaths, px, py));
        if !w.load_warnings.is_empty() {
            hud.push_str(&format!(" Warnings:{} ", w.load_warnings.len()));
        }

        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
    }

    fn compose_tiles(&mut self, w: &WorldState, vp: &Viewport) {
        for row in 0..vp.rows {
            for col in 0..vp.cols {
                let (wx, wy) = vp.world_at(col, row);
                let cell = match w.grid.point_query(wx, wy) {
                    Some(tile) => tile_cell(tile, &w.session.checkpoint),
                    None => Cell::new(' ', Color::White, Color::Rgb { r: 10, g: 10, b: 16 }),
                };
                self.front.set(col, MAP_ROW + row, cell);
            }
        }
    }

    /// Rope from the hook's owner to its tip. A hook whose owner is gone
    /// has nothing to hang from and is not drawn.
    fn compose_rope(&mut self, w: &WorldState, hook: &Grapple, vp: &Viewport) {
        if !hook.is_out() { return; }
        let Some(owner) = w.actors.get(hook.owner()) else { return };
        let (cx, cy) = (owner.body().center_x(), owner.body().center_y());
        let (tx, ty) = (hook.tip_x, hook.tip_y);
        let len = (tx - cx).hypot(ty - cy);
        let steps = (len / (vp.sx.min(vp.sy) / 2.0)).ceil().max(1.0) as usize;
        let rope_fg = Color::Rgb { r: 190, g: 190, b: 150 };
        for i in 1..steps {
            let t = i as f64 / steps as f64;
            if let Some((c, r)) = vp.cell_of(cx + (tx - cx) * t, cy + (ty - cy) * t) {
                self.front.set(c, MAP_ROW + r, Cell::new('.', rope_fg, Color::Reset));
            }
        }
        if let Some((c, r)) = vp.cell_of(tx, ty) {
            self.front.set(c, MAP_ROW + r, Cell::new('+', Color::White, Color::Reset));
        }
    }

    fn compose_player(&mut self, p: &Player, vp: &Viewport) {
        let body = p.body.rect();
        let fg = Color::Rgb { r: 80, g: 220, b: 255 };
        let Some((c0, r0)) = vp.cell_of(body.left() + 0.5, body.top() - 0.5) else {
            // Partly off screen: mark the centre if visible
            if let Some((c, r)) = vp.cell_of(body.center_x(), body.center_y()) {
                self.front.set(c, MAP_ROW + r, Cell::new('@', fg, Color::Reset));
            }
            return;
        };
        let (c1, r1) = vp.cell_of(body.right() - 0.5, body.bottom() + 0.5)
            .unwrap_or((c0, r0));
        let legs = player_legs(p);
        for r in r0..=r1.max(r0) {
            for c in c0..=c1.max(c0) {
                let ch = if r == r0 {
                    match p.facing {
                        Facing::Left if c == c0 => '<',
                        Facing::Right if c == c1.max(c0) => '>',
                        _ => '@',
                    }
                } else if r == r1.max(r0) {
                    legs
                } else {
                    '#'
                };
                self.front.set(c, MAP_ROW + r, Cell::new(ch, fg, Color::Reset));
            }
        }
    }

    fn compose_footer(&mut self, w: &WorldState, map_rows: usize) {
        let msg_row = MAP_ROW + map_rows + 1;
        let message = match w.phase {
            Phase::TransitionIn => format!("{}  (Enter to start)", w.level_name),
            Phase::LevelComplete => "Level complete".to_string(),
            _ if w.player().is_some_and(|p| !p.alive) => "Rebooting...".to_string(),
            _ => w.message.clone(),
        };
        if msg_row < self.front.height && !message.is_empty() {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(0, msg_row, &format!(" {message} "), Color::Black, MSG_BG);
        }

        let help_row = msg_row + 2;
        if help_row < self.front.height {
            let help = " Arrows/WASD:Move  Space/Z:Jump  X/C:Grapple  Enter:Skip  Esc:Quit";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }
}

fn tile_cell(tile: &Tile, current_checkpoint: &str) -> Cell {
    if tile.is_empty() {
        return Cell::BLANK;
    }
    if tile.has_property(prop::KILL) {
        return Cell::new('^', Color::Rgb { r: 255, g: 60, b: 60 }, Color::Reset);
    }
    if tile.has_property(prop::GOAL) {
        return Cell::new('*', Color::Rgb { r: 80, g: 255, b: 80 }, Color::Rgb { r: 20, g: 60, b: 20 });
    }
    if tile.rejects_grapple() {
        return Cell::new('%', Color::Rgb { r: 120, g: 110, b: 90 }, Color::Rgb { r: 60, g: 55, b: 45 });
    }
    if tile.is_solid() {
        return Cell::new(' ', Color::White, Color::Rgb { r: 90, g: 90, b: 110 });
    }
    if let Some(id) = tile.property(prop::CHECKPOINT) {
        let fg = if id == current_checkpoint {
            Color::Rgb { r: 255, g: 220, b: 50 }
        } else {
            Color::Rgb { r: 120, g: 110, b: 60 }
        };
        return Cell::new('!', fg, Color::Reset);
    }
    Cell::BLANK
}

fn player_legs(p: &Player) -> char {
    match p.animation.kind {
        AnimationKind::Run => if p.animation.frame % 4 < 2 { '/' } else { '\\' },
        AnimationKind::Jump | AnimationKind::JumpUp | AnimationKind::Jetpack => 'v',
        AnimationKind::Falling | AnimationKind::FallingUp => 'A',
        AnimationKind::Wallslide | AnimationKind::LedgeGrab => '|',
        AnimationKind::Swinging => 'Y',
        AnimationKind::Idle => 'H',
    }
}
