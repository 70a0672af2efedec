use crate::{
    cartridge::{Cartridge, HeaderInfo},
    cpu::Cpu,
    error::EmuError,
    input::{Buttons, Joypad},
    mmu::Mmu,
    palette::Palette,
    ppu::Ppu,
    timer::Timer,
};

/// T-cycles in one full LCD refresh (154 lines of 456 cycles).
pub const CYCLES_PER_FRAME: u32 = 70_224;

/// A complete DMG: processor, bus, LCD, timer and joypad latch.
pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub ppu: Ppu,
    pub timer: Timer,
    pub joypad: Joypad,
    /// Cycles run past the end of the previous frame.
    overshoot: u32,
    blank: bool,
}

impl GameBoy {
    /// Without a boot ROM the machine starts in the state the boot ROM
    /// would have left behind, with PC at 0x0100.
    pub fn new(cart: Cartridge, boot_rom: Option<Vec<u8>>, palette: Palette) -> Self {
        let blank = cart.rom.iter().all(|&b| b == 0);
        let mut mmu = Mmu::new();
        mmu.load_cart(cart);
        let cpu = match boot_rom {
            Some(boot) => {
                mmu.load_boot_rom(boot);
                Cpu::new()
            }
            None => {
                mmu.apply_post_boot_state();
                Cpu::post_boot()
            }
        };
        Self {
            cpu,
            mmu,
            ppu: Ppu::new(palette),
            timer: Timer::new(),
            joypad: Joypad::new(),
            overshoot: 0,
            blank,
        }
    }

    pub fn from_rom(rom: Vec<u8>, boot_rom: Option<Vec<u8>>, palette: Palette) -> Self {
        Self::new(Cartridge::load(rom), boot_rom, palette)
    }

    /// Rebuilds every component around the current cartridge and boot ROM.
    pub fn reset(&mut self) {
        let boot = self.mmu.boot_rom.take();
        if let Some(mut cart) = self.mmu.cart.take() {
            cart.reset_mbc();
            *self = Self::new(cart, boot, self.ppu.palette());
        }
    }

    /// Inserts a different cartridge. The bus and bank controller are rebuilt
    /// together, so nothing of the previous machine state survives.
    pub fn swap_cartridge(&mut self, cart: Cartridge) {
        let boot = self.mmu.boot_rom.take();
        *self = Self::new(cart, boot, self.ppu.palette());
    }

    /// An all-zero image (the missing-ROM fallback) has nothing to execute.
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    /// Executes one instruction (or interrupt dispatch / halt tick) and
    /// advances the LCD and timer by the same number of cycles.
    pub fn step(&mut self) -> Result<u32, EmuError> {
        let cycles = self.cpu.step(&mut self.mmu)?;
        self.ppu.step(&mut self.mmu, cycles);
        self.timer.step(&mut self.mmu, cycles);
        Ok(cycles)
    }

    /// Runs one frame's worth of cycles with `buttons` held and returns the
    /// cycles actually executed.
    pub fn run_frame(&mut self, buttons: Buttons) -> Result<u32, EmuError> {
        if self.blank {
            return Ok(0);
        }
        self.joypad.sample(&mut self.mmu, buttons);

        let budget = CYCLES_PER_FRAME.saturating_sub(self.overshoot);
        let mut cycles = 0;
        while cycles < budget {
            cycles += self.step()?;
        }
        self.overshoot = cycles - budget;
        Ok(cycles)
    }

    pub fn framebuffer(&self) -> &[u32] {
        self.ppu.framebuffer()
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.ppu.set_palette(palette);
    }

    pub fn frames(&self) -> u64 {
        self.ppu.frames()
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.mmu.cart.as_ref()
    }

    pub fn header_info(&self) -> Option<HeaderInfo> {
        self.cartridge().map(Cartridge::header_info)
    }
}
