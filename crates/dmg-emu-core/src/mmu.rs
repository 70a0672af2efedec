use log::debug;

use crate::cartridge::Cartridge;

pub const WRAM_SIZE: usize = 0x2000;
pub const VRAM_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;
pub const HRAM_SIZE: usize = 0x7F;
pub const IO_SIZE: usize = 0x80;
pub const BOOT_ROM_SIZE: usize = 0x100;
/// Bytes moved by one OAM DMA transfer.
pub const DMA_LENGTH: u16 = 0xA0;

pub const REG_JOYP: u16 = 0xFF00;
pub const REG_DIV: u16 = 0xFF04;
pub const REG_TIMA: u16 = 0xFF05;
pub const REG_TMA: u16 = 0xFF06;
pub const REG_TAC: u16 = 0xFF07;
pub const REG_IF: u16 = 0xFF0F;
pub const REG_LCDC: u16 = 0xFF40;
pub const REG_STAT: u16 = 0xFF41;
pub const REG_SCY: u16 = 0xFF42;
pub const REG_SCX: u16 = 0xFF43;
pub const REG_LY: u16 = 0xFF44;
pub const REG_LYC: u16 = 0xFF45;
pub const REG_DMA: u16 = 0xFF46;
pub const REG_BGP: u16 = 0xFF47;
pub const REG_OBP0: u16 = 0xFF48;
pub const REG_OBP1: u16 = 0xFF49;
pub const REG_WY: u16 = 0xFF4A;
pub const REG_WX: u16 = 0xFF4B;
pub const REG_BOOT_OFF: u16 = 0xFF50;
pub const REG_IE: u16 = 0xFFFF;

/// Interrupt sources in priority order; the discriminant is the IF/IE bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    pub const fn mask(self) -> u8 {
        1 << self as u8
    }

    pub const fn vector(self) -> u16 {
        0x40 + 8 * self as u16
    }

    /// Highest priority source present in `pending`.
    pub fn highest(pending: u8) -> Option<Interrupt> {
        Self::ALL.into_iter().find(|i| pending & i.mask() != 0)
    }
}

/// The DMG address space.
///
/// Hardware registers the PPU, timer and CPU touch every step live as plain
/// fields; everything else in 0xFF00-0xFF7F falls through to `io`.
pub struct Mmu {
    pub wram: [u8; WRAM_SIZE],
    pub vram: [u8; VRAM_SIZE],
    pub oam: [u8; OAM_SIZE],
    pub hram: [u8; HRAM_SIZE],
    pub io: [u8; IO_SIZE],
    pub cart: Option<Cartridge>,
    pub boot_rom: Option<Vec<u8>>,
    pub boot_mapped: bool,
    /// Select bits 4-5 last written to JOYP.
    pub joyp_select: u8,
    /// Active-low button byte: directions in the high nibble, actions in the low.
    pub joypad_state: u8,
    pub div: u8,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    pub if_reg: u8,
    pub ie_reg: u8,
    pub lcdc: u8,
    pub stat: u8,
    pub scy: u8,
    pub scx: u8,
    pub ly: u8,
    pub lyc: u8,
    pub dma: u8,
    pub bgp: u8,
    pub obp0: u8,
    pub obp1: u8,
    pub wy: u8,
    pub wx: u8,
    /// Set whenever software writes DIV so the timer can restart its phase.
    pub div_reset: bool,
}

impl Mmu {
    pub fn new() -> Self {
        Self {
            wram: [0; WRAM_SIZE],
            vram: [0; VRAM_SIZE],
            oam: [0; OAM_SIZE],
            hram: [0; HRAM_SIZE],
            io: [0xFF; IO_SIZE],
            cart: None,
            boot_rom: None,
            boot_mapped: false,
            joyp_select: 0x30,
            joypad_state: 0xFF,
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            if_reg: 0,
            ie_reg: 0,
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            dma: 0xFF,
            bgp: 0,
            obp0: 0xFF,
            obp1: 0xFF,
            wy: 0,
            wx: 0,
            div_reset: false,
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    /// Maps a boot ROM over 0x0000-0x00FF until 0xFF50 is written.
    pub fn load_boot_rom(&mut self, data: Vec<u8>) {
        self.boot_rom = Some(data);
        self.boot_mapped = true;
    }

    /// I/O state the DMG boot ROM leaves behind when it hands over to the cartridge.
    pub fn apply_post_boot_state(&mut self) {
        self.joyp_select = 0x30;
        self.div = 0xAB;
        self.tima = 0;
        self.tma = 0;
        self.tac = 0;
        self.if_reg = 0x01;
        self.lcdc = 0x91;
        self.stat = 0x85;
        self.scy = 0;
        self.scx = 0;
        self.ly = 0;
        self.lyc = 0;
        self.dma = 0xFF;
        self.bgp = 0xFC;
        self.wy = 0;
        self.wx = 0;
        self.boot_mapped = false;
    }

    pub fn request_interrupt(&mut self, interrupt: Interrupt) {
        self.if_reg |= interrupt.mask();
    }

    /// IF & IE restricted to the five implemented sources.
    pub fn pending_interrupts(&self) -> u8 {
        self.if_reg & self.ie_reg & 0x1F
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcdc & 0x80 != 0
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        if self.boot_mapped
            && (addr as usize) < BOOT_ROM_SIZE
            && let Some(boot) = &self.boot_rom
        {
            return boot.get(addr as usize).copied().unwrap_or(0xFF);
        }

        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                self.cart.as_ref().map_or(0xFF, |c| c.read(addr))
            }
            REG_JOYP => self.read_joypad(),
            REG_DIV => self.div,
            REG_TIMA => self.tima,
            REG_TMA => self.tma,
            REG_TAC => self.tac | 0xF8,
            REG_IF => self.if_reg | 0xE0,
            REG_LCDC => self.lcdc,
            REG_STAT => self.stat | 0x80,
            REG_SCY => self.scy,
            REG_SCX => self.scx,
            REG_LY => self.ly,
            REG_LYC => self.lyc,
            REG_DMA => self.dma,
            REG_BGP => self.bgp,
            REG_OBP0 => self.obp0,
            REG_OBP1 => self.obp1,
            REG_WY => self.wy,
            REG_WX => self.wx,
            REG_IE => self.ie_reg,
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize],
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize],
            0xFF00..=0xFF7F => self.io[(addr - 0xFF00) as usize],
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            _ => 0xFF,
        }
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => match self.cart.as_mut() {
                Some(cart) => cart.write(addr, val),
                None => debug!("write {val:02X} to {addr:04X} with no cartridge"),
            },
            REG_JOYP => self.joyp_select = val & 0x30,
            REG_DIV => {
                self.div = 0;
                self.div_reset = true;
            }
            REG_TIMA => self.tima = val,
            REG_TMA => self.tma = val,
            REG_TAC => self.tac = val & 0x07,
            REG_IF => self.if_reg = val & 0x1F,
            REG_LCDC => {
                self.lcdc = val;
                if val & 0x80 == 0 {
                    self.stat &= 0x7C;
                    self.ly = 0;
                }
            }
            REG_STAT => self.stat = (val & 0x78) | (self.stat & 0x07),
            REG_SCY => self.scy = val,
            REG_SCX => self.scx = val,
            REG_LY => {}
            REG_LYC => self.lyc = val,
            REG_DMA => self.oam_dma(val),
            REG_BGP => self.bgp = val,
            REG_OBP0 => self.obp0 = val,
            REG_OBP1 => self.obp1 = val,
            REG_WY => self.wy = val,
            REG_WX => self.wx = val,
            REG_BOOT_OFF => {
                self.boot_mapped = false;
                self.io[(addr - 0xFF00) as usize] = val;
            }
            REG_IE => self.ie_reg = val,
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize] = val,
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = val,
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize] = val,
            0xFF00..=0xFF7F => self.io[(addr - 0xFF00) as usize] = val,
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            _ => debug!("ignored write {val:02X} to unusable address {addr:04X}"),
        }
    }

    /// Little-endian 16-bit read.
    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read_byte(addr) as u16;
        let hi = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write_word(&mut self, addr: u16, val: u16) {
        self.write_byte(addr, val as u8);
        self.write_byte(addr.wrapping_add(1), (val >> 8) as u8);
    }

    fn read_joypad(&self) -> u8 {
        let mut nibble = 0x0F;
        if self.joyp_select & 0x10 == 0 {
            nibble &= self.joypad_state >> 4;
        }
        if self.joyp_select & 0x20 == 0 {
            nibble &= self.joypad_state & 0x0F;
        }
        0xC0 | self.joyp_select | nibble
    }

    fn oam_dma(&mut self, val: u8) {
        self.dma = val;
        let src = (val as u16) << 8;
        for i in 0..DMA_LENGTH {
            let byte = self.read_byte(src.wrapping_add(i));
            self.write_byte(0xFE00 + i, byte);
        }
    }

    /// Persists battery RAM of the inserted cartridge, if any.
    pub fn save_cart_ram(&self) -> std::io::Result<()> {
        match &self.cart {
            Some(cart) => cart.save_ram(),
            None => Ok(()),
        }
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
