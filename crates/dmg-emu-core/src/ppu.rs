#[cfg(feature = "ppu-trace")]
use log::trace;

use crate::{
    mmu::{Interrupt, Mmu},
    palette::Palette,
};

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Timing constants per LCD mode in T-cycles
pub const MODE0_CYCLES: u32 = 204; // HBlank
pub const MODE1_CYCLES: u32 = 456; // One line during VBlank
pub const MODE2_CYCLES: u32 = 80; // OAM scan
pub const MODE3_CYCLES: u32 = 172; // Pixel transfer

const LAST_LINE: u8 = 153;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

// Window X position is clipped if greater than this value
const WINDOW_X_MAX: u8 = 166;

// VRAM layout constants
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_0_BASE: usize = 0x0000;
const TILE_DATA_1_BASE: usize = 0x0800;

// STAT interrupt source enables
const STAT_HBLANK_IRQ: u8 = 0x08;
const STAT_VBLANK_IRQ: u8 = 0x10;
const STAT_OAM_IRQ: u8 = 0x20;
const STAT_LYC_IRQ: u8 = 0x40;
const STAT_LYC_EQUAL: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    Transfer = 3,
}

#[derive(Debug, Clone, Copy, Default)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
    oam_index: usize,
}

pub struct Ppu {
    mode: Mode,
    mode_clock: u32,
    /// Internal window line counter
    win_line_counter: u8,
    vblank_triggered: bool,
    lcd_was_off: bool,
    line_sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    /// Raw background colour ids of the line being drawn, for sprite priority.
    line_bg: [u8; SCREEN_WIDTH],
    /// Palette-resolved shades of the line being drawn.
    line_shades: [u8; SCREEN_WIDTH],
    shades: Vec<u8>,
    framebuffer: Vec<u32>,
    palette: Palette,
    frame_ready: bool,
    frames: u64,
}

impl Ppu {
    pub fn new(palette: Palette) -> Self {
        Self {
            mode: Mode::OamSearch,
            mode_clock: 0,
            win_line_counter: 0,
            vblank_triggered: false,
            lcd_was_off: false,
            line_sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            line_bg: [0; SCREEN_WIDTH],
            line_shades: [0; SCREEN_WIDTH],
            shades: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            framebuffer: vec![palette.color(0); SCREEN_WIDTH * SCREEN_HEIGHT],
            palette,
            frame_ready: false,
            frames: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn mode_clock(&self) -> u32 {
        self.mode_clock
    }

    pub fn window_line_counter(&self) -> u8 {
        self.win_line_counter
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Switches palettes and recolours the current frame.
    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
        for (px, &shade) in self.framebuffer.iter_mut().zip(self.shades.iter()) {
            *px = palette.color(shade);
        }
    }

    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    pub fn clear_frame_flag(&mut self) {
        self.frame_ready = false;
    }

    /// 160x144 resolved colours, row major.
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    /// 160x144 shade indices (0-3) after BGP/OBP translation.
    pub fn shades(&self) -> &[u8] {
        &self.shades
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Advances the LCD by `cycles`. Returns `true` if VBlank was entered.
    pub fn step(&mut self, mmu: &mut Mmu, cycles: u32) -> bool {
        if !mmu.lcd_enabled() {
            self.mode = Mode::HBlank;
            self.mode_clock = 0;
            self.lcd_was_off = true;
            mmu.stat &= !0x03;
            mmu.ly = 0;
            return false;
        }
        if self.lcd_was_off {
            // Restart from the top; the cycles of this step are not counted.
            self.lcd_was_off = false;
            self.mode_clock = 0;
            mmu.ly = 0;
            self.compare_lyc(mmu);
            self.enter_oam_search(mmu);
            return false;
        }

        let mut entered_vblank = false;
        self.mode_clock += cycles;
        loop {
            match self.mode {
                Mode::OamSearch => {
                    if self.mode_clock < MODE2_CYCLES {
                        break;
                    }
                    self.mode_clock -= MODE2_CYCLES;
                    self.oam_scan(mmu);
                    self.set_mode(mmu, Mode::Transfer);
                }
                Mode::Transfer => {
                    if self.mode_clock < MODE3_CYCLES {
                        break;
                    }
                    self.mode_clock -= MODE3_CYCLES;
                    self.render_scanline(mmu);
                    self.set_mode(mmu, Mode::HBlank);
                    self.stat_interrupt(mmu, STAT_HBLANK_IRQ);
                }
                Mode::HBlank => {
                    if self.mode_clock < MODE0_CYCLES {
                        break;
                    }
                    self.mode_clock -= MODE0_CYCLES;
                    self.next_line(mmu);
                    if mmu.ly as usize == SCREEN_HEIGHT {
                        self.enter_vblank(mmu);
                        entered_vblank = true;
                    } else {
                        self.enter_oam_search(mmu);
                    }
                }
                Mode::VBlank => {
                    if self.mode_clock < MODE1_CYCLES {
                        break;
                    }
                    self.mode_clock -= MODE1_CYCLES;
                    if mmu.ly >= LAST_LINE {
                        mmu.ly = 0;
                        self.compare_lyc(mmu);
                        self.win_line_counter = 0;
                        self.enter_oam_search(mmu);
                    } else {
                        self.next_line(mmu);
                    }
                }
            }
        }
        entered_vblank
    }

    fn set_mode(&mut self, mmu: &mut Mmu, mode: Mode) {
        #[cfg(feature = "ppu-trace")]
        trace!("LY={} {:?} -> {:?}", mmu.ly, self.mode, mode);
        self.mode = mode;
        mmu.stat = (mmu.stat & !0x03) | mode as u8;
    }

    fn enter_oam_search(&mut self, mmu: &mut Mmu) {
        self.vblank_triggered = false;
        self.set_mode(mmu, Mode::OamSearch);
        self.stat_interrupt(mmu, STAT_OAM_IRQ);
    }

    fn enter_vblank(&mut self, mmu: &mut Mmu) {
        self.set_mode(mmu, Mode::VBlank);
        self.stat_interrupt(mmu, STAT_VBLANK_IRQ);
        if !self.vblank_triggered {
            self.vblank_triggered = true;
            mmu.request_interrupt(Interrupt::VBlank);
            self.frame_ready = true;
            self.frames = self.frames.wrapping_add(1);
        }
    }

    fn next_line(&mut self, mmu: &mut Mmu) {
        mmu.ly = mmu.ly.wrapping_add(1);
        self.compare_lyc(mmu);
    }

    fn compare_lyc(&mut self, mmu: &mut Mmu) {
        if mmu.ly == mmu.lyc {
            mmu.stat |= STAT_LYC_EQUAL;
            self.stat_interrupt(mmu, STAT_LYC_IRQ);
        } else {
            mmu.stat &= !STAT_LYC_EQUAL;
        }
    }

    fn stat_interrupt(&self, mmu: &mut Mmu, source: u8) {
        if mmu.stat & source != 0 {
            mmu.request_interrupt(Interrupt::LcdStat);
        }
    }

    /// Collect up to 10 sprites visible on the current scanline.
    fn oam_scan(&mut self, mmu: &Mmu) {
        let sprite_height: i16 = if mmu.lcdc & 0x04 != 0 { 16 } else { 8 };
        let ly = mmu.ly as i16;
        self.sprite_count = 0;
        for i in 0..TOTAL_SPRITES {
            if self.sprite_count >= MAX_SPRITES_PER_LINE {
                break;
            }
            let base = i * 4;
            let y = mmu.oam[base] as i16 - 16;
            if ly >= y && ly < y + sprite_height {
                self.line_sprites[self.sprite_count] = Sprite {
                    x: mmu.oam[base + 1] as i16 - 8,
                    y,
                    tile: mmu.oam[base + 2],
                    flags: mmu.oam[base + 3],
                    oam_index: i,
                };
                self.sprite_count += 1;
            }
        }
        // Lower X wins, then lower OAM index.
        self.line_sprites[..self.sprite_count].sort_by_key(|s| (s.x, s.oam_index));
    }

    fn shade(palette: u8, color_id: u8) -> u8 {
        (palette >> (color_id * 2)) & 0x03
    }

    fn tile_row(mmu: &Mmu, tile_addr: usize, row: usize) -> (u8, u8) {
        (mmu.vram[tile_addr + row * 2], mmu.vram[tile_addr + row * 2 + 1])
    }

    fn bg_tile_addr(mmu: &Mmu, tile_index: u8) -> usize {
        if mmu.lcdc & 0x10 != 0 {
            TILE_DATA_0_BASE + tile_index as usize * 16
        } else {
            TILE_DATA_1_BASE + ((tile_index as i8 as i16 + 128) as usize) * 16
        }
    }

    fn render_scanline(&mut self, mmu: &Mmu) {
        let ly = mmu.ly as usize;
        if ly >= SCREEN_HEIGHT {
            return;
        }
        let bg_enabled = mmu.lcdc & 0x01 != 0;

        // With LCDC.0 clear the line is colour 0 and the window is hidden too.
        self.line_bg.fill(0);
        self.line_shades.fill(Self::shade(mmu.bgp, 0));

        if bg_enabled {
            self.draw_background(mmu);
            self.draw_window(mmu);
        }
        if mmu.lcdc & 0x02 != 0 {
            self.draw_sprites(mmu);
        }

        let start = ly * SCREEN_WIDTH;
        self.shades[start..start + SCREEN_WIDTH].copy_from_slice(&self.line_shades);
        for (px, &shade) in self.framebuffer[start..start + SCREEN_WIDTH]
            .iter_mut()
            .zip(self.line_shades.iter())
        {
            *px = self.palette.color(shade);
        }
    }

    fn draw_background(&mut self, mmu: &Mmu) {
        let map_base = if mmu.lcdc & 0x08 != 0 {
            BG_MAP_1_BASE
        } else {
            BG_MAP_0_BASE
        };
        let y = (mmu.ly as usize + mmu.scy as usize) & 0xFF;
        let tile_row = y / 8;
        let tile_y = y % 8;

        for x in 0..SCREEN_WIDTH {
            let px = (x + mmu.scx as usize) & 0xFF;
            let tile_index = mmu.vram[map_base + tile_row * 32 + px / 8];
            let (lo, hi) = Self::tile_row(mmu, Self::bg_tile_addr(mmu, tile_index), tile_y);
            let bit = 7 - (px % 8);
            let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
            self.line_bg[x] = color_id;
            self.line_shades[x] = Self::shade(mmu.bgp, color_id);
        }
    }

    fn draw_window(&mut self, mmu: &Mmu) {
        if mmu.lcdc & 0x20 == 0 || mmu.ly < mmu.wy || mmu.wx > WINDOW_X_MAX {
            return;
        }
        if mmu.ly == mmu.wy {
            self.win_line_counter = 0;
        }
        let map_base = if mmu.lcdc & 0x40 != 0 {
            BG_MAP_1_BASE
        } else {
            BG_MAP_0_BASE
        };
        let win_y = self.win_line_counter as usize;
        let left = mmu.wx as i16 - 7;
        let mut drawn = false;

        for x in left.max(0) as usize..SCREEN_WIDTH {
            let win_x = (x as i16 - left) as usize;
            let tile_index = mmu.vram[map_base + (win_y / 8) * 32 + win_x / 8];
            let (lo, hi) = Self::tile_row(mmu, Self::bg_tile_addr(mmu, tile_index), win_y % 8);
            let bit = 7 - (win_x % 8);
            let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
            self.line_bg[x] = color_id;
            self.line_shades[x] = Self::shade(mmu.bgp, color_id);
            drawn = true;
        }
        if drawn {
            self.win_line_counter = self.win_line_counter.wrapping_add(1);
        }
    }

    fn draw_sprites(&mut self, mmu: &Mmu) {
        let sprite_height: i16 = if mmu.lcdc & 0x04 != 0 { 16 } else { 8 };
        let ly = mmu.ly as i16;
        let mut drawn = [false; SCREEN_WIDTH];

        for s in &self.line_sprites[..self.sprite_count] {
            let tile = if sprite_height == 16 {
                s.tile & 0xFE
            } else {
                s.tile
            };
            let mut line_idx = ly - s.y;
            if s.flags & 0x40 != 0 {
                line_idx = sprite_height - 1 - line_idx;
            }
            let (lo, hi) = Self::tile_row(mmu, tile as usize * 16, line_idx as usize);
            let palette = if s.flags & 0x10 != 0 {
                mmu.obp1
            } else {
                mmu.obp0
            };

            for px in 0..8 {
                let bit = if s.flags & 0x20 != 0 { px } else { 7 - px };
                let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                if color_id == 0 {
                    continue;
                }
                let sx = s.x + px as i16;
                if !(0..SCREEN_WIDTH as i16).contains(&sx) || drawn[sx as usize] {
                    continue;
                }
                let sx = sx as usize;
                if s.flags & 0x80 != 0 && self.line_bg[sx] != 0 {
                    continue;
                }
                self.line_shades[sx] = Self::shade(palette, color_id);
                drawn[sx] = true;
            }
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new(Palette::default())
    }
}
