use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use log::{info, warn};

/// Size of one switchable ROM bank.
pub const ROM_BANK_SIZE: usize = 0x4000;
/// Size of one external RAM bank.
pub const RAM_BANK_SIZE: usize = 0x2000;
/// Size of the image substituted for a missing ROM file.
pub const BLANK_ROM_SIZE: usize = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc3,
    Mbc5,
}

#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub mbc: MbcType,
    pub title: String,
    cart_type: u8,
    rom_banks: usize,
    ram_banks: usize,
    save_path: Option<PathBuf>,
    mbc_state: MbcState,
}

#[derive(Debug)]
enum MbcState {
    NoMbc {
        ram_enable: bool,
    },
    Mbc1 {
        rom_bank: u8,
        ram_bank: u8,
        mode: u8,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: u8,
        ram_bank: u8,
        ram_enable: bool,
    },
    Mbc5 {
        rom_bank: u16,
        ram_bank: u8,
        ram_enable: bool,
    },
}

impl MbcState {
    fn new(mbc: MbcType) -> Self {
        match mbc {
            MbcType::NoMbc => MbcState::NoMbc { ram_enable: false },
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                ram_bank: 0,
                mode: 0,
                ram_enable: false,
            },
            MbcType::Mbc3 => MbcState::Mbc3 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
            },
            MbcType::Mbc5 => MbcState::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
            },
        }
    }

    fn ram_enabled(&self) -> bool {
        match *self {
            MbcState::NoMbc { ram_enable }
            | MbcState::Mbc1 { ram_enable, .. }
            | MbcState::Mbc3 { ram_enable, .. }
            | MbcState::Mbc5 { ram_enable, .. } => ram_enable,
        }
    }
}

impl Cartridge {
    /// Builds a cartridge from a raw image, decoding the header once.
    pub fn load(data: Vec<u8>) -> Self {
        let header = Header::parse(&data);
        let mbc = header.mbc_type();
        let (ram_size, ram_banks) = header.ram_layout();
        let rom_banks = header.rom_banks();
        let title = header.title();
        let cart_type = header.cart_type();

        Self {
            rom: data,
            ram: vec![0; ram_size],
            mbc,
            title,
            cart_type,
            rom_banks,
            ram_banks,
            save_path: None,
            mbc_state: MbcState::new(mbc),
        }
    }

    /// Reads a ROM from disk and, for battery-backed carts, picks up the
    /// `.sav` file next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = fs::read(&path)?;
        let mut cart = Self::load(data);

        if cart.has_battery() {
            let save = save_path_for(path.as_ref());
            match cart.load_ram_from(&save) {
                Ok(true) => info!("Loaded save RAM from {}", save.display()),
                Ok(false) => {}
                Err(e) => warn!("Failed to read save RAM {}: {e}", save.display()),
            }
            cart.save_path = Some(save);
        }

        info!("Loaded ROM: {} (MBC: {:?})", cart.title, cart.mbc);
        Ok(cart)
    }

    pub fn rom_bank_count(&self) -> usize {
        self.rom_banks
    }

    pub fn ram_bank_count(&self) -> usize {
        self.ram_banks
    }

    pub fn cart_type(&self) -> u8 {
        self.cart_type
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    /// Returns the bank registers and RAM enable latch to power-on values.
    /// RAM contents and the save path are kept.
    pub fn reset_mbc(&mut self) {
        self.mbc_state = MbcState::new(self.mbc);
    }

    /// Decoded header fields with their human readable names.
    pub fn header_info(&self) -> HeaderInfo {
        let header = Header::parse(&self.rom);
        HeaderInfo {
            title: self.title.clone(),
            cartridge_type: cartridge_type_name(header.cart_type()),
            rom_size: rom_size_name(header.byte(0x0148)),
            ram_size: ram_size_name(header.byte(0x0149)),
            checksum: header.byte(0x014D),
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match (&self.mbc_state, addr) {
            (MbcState::NoMbc { .. }, 0x0000..=0x7FFF) => self.rom_byte(0, addr as usize),
            (MbcState::Mbc1 { ram_bank, mode, .. }, 0x0000..=0x3FFF) => {
                let bank = if *mode == 0 {
                    0
                } else {
                    (*ram_bank as usize & 0x03) << 5
                };
                self.rom_byte(bank, addr as usize)
            }
            (MbcState::Mbc1 { rom_bank, ram_bank, .. }, 0x4000..=0x7FFF) => {
                let bank = ((*ram_bank as usize & 0x03) << 5) | (*rom_bank as usize & 0x1F);
                self.rom_byte(bank, addr as usize - 0x4000)
            }
            (MbcState::Mbc3 { .. } | MbcState::Mbc5 { .. }, 0x0000..=0x3FFF) => {
                self.rom_byte(0, addr as usize)
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x4000..=0x7FFF) => {
                self.rom_byte(*rom_bank as usize, addr as usize - 0x4000)
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x4000..=0x7FFF) => {
                self.rom_byte(*rom_bank as usize, addr as usize - 0x4000)
            }
            (state, 0xA000..=0xBFFF) => {
                if !state.ram_enabled() {
                    return 0xFF;
                }
                match self.ram_index(addr) {
                    Some(idx) => self.ram[idx],
                    None => 0xFF,
                }
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match (&mut self.mbc_state, addr) {
            (
                MbcState::NoMbc { ram_enable }
                | MbcState::Mbc1 { ram_enable, .. }
                | MbcState::Mbc3 { ram_enable, .. }
                | MbcState::Mbc5 { ram_enable, .. },
                0x0000..=0x1FFF,
            ) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x1F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x7F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x2000..=0x2FFF) => {
                *rom_bank = (*rom_bank & 0x100) | val as u16;
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x3000..=0x3FFF) => {
                *rom_bank = (*rom_bank & 0x0FF) | (((val & 0x01) as u16) << 8);
            }
            (MbcState::Mbc1 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x03;
            }
            (
                MbcState::Mbc3 { ram_bank, .. } | MbcState::Mbc5 { ram_bank, .. },
                0x4000..=0x5FFF,
            ) => {
                *ram_bank = val & 0x0F;
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
            }
            (state, 0xA000..=0xBFFF) => {
                if !state.ram_enabled() {
                    return;
                }
                if let Some(idx) = self.ram_index(addr) {
                    self.ram[idx] = val;
                }
            }
            _ => {}
        }
    }

    fn rom_byte(&self, bank: usize, offset: usize) -> u8 {
        let bank = bank % self.rom_banks;
        self.rom
            .get(bank * ROM_BANK_SIZE + offset)
            .copied()
            .unwrap_or(0xFF)
    }

    fn ram_index(&self, addr: u16) -> Option<usize> {
        if self.ram.is_empty() || self.ram_banks == 0 {
            return None;
        }
        let bank = match &self.mbc_state {
            MbcState::NoMbc { .. } => 0,
            MbcState::Mbc1 { ram_bank, mode, .. } => {
                if *mode == 0 {
                    0
                } else {
                    *ram_bank as usize
                }
            }
            MbcState::Mbc3 { ram_bank, .. } | MbcState::Mbc5 { ram_bank, .. } => {
                *ram_bank as usize
            }
        };
        let bank = bank % self.ram_banks;
        // 2 KiB parts mirror across the 8 KiB window.
        Some((bank * RAM_BANK_SIZE + (addr as usize - 0xA000)) % self.ram.len())
    }

    pub fn has_battery(&self) -> bool {
        matches!(self.cart_type, 0x03 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E)
    }

    /// Copies a save file into cartridge RAM. Returns `Ok(false)` when the
    /// file does not exist.
    pub fn load_ram_from(&mut self, path: &Path) -> io::Result<bool> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        for (d, s) in self.ram.iter_mut().zip(bytes.iter()) {
            *d = *s;
        }
        Ok(true)
    }

    /// Writes cartridge RAM to `path` if the cartridge is battery backed.
    pub fn save_ram_to(&self, path: &Path) -> io::Result<()> {
        if self.has_battery() && !self.ram.is_empty() {
            fs::write(path, &self.ram)?;
        }
        Ok(())
    }

    /// Persists RAM to the save file picked up by [`Cartridge::from_file`].
    pub fn save_ram(&self) -> io::Result<()> {
        match &self.save_path {
            Some(path) => self.save_ram_to(path),
            None => Ok(()),
        }
    }
}

/// `game.gb` -> `game.sav`
pub fn save_path_for(rom_path: &Path) -> PathBuf {
    let mut save = PathBuf::from(rom_path);
    save.set_extension("sav");
    save
}

/// Reads a ROM file, substituting a zeroed 32 KiB image when it is missing.
pub fn read_rom_or_blank(path: &Path) -> Vec<u8> {
    match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Could not read ROM {}: {e}; using a blank cartridge", path.display());
            vec![0; BLANK_ROM_SIZE]
        }
    }
}

/// Reads a boot ROM. `None` means the machine starts in the post-boot state.
pub fn read_boot_rom(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Some(data),
        Err(e) => {
            info!("No boot ROM at {} ({e}); skipping boot sequence", path.display());
            None
        }
    }
}

/// Printable header summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub title: String,
    pub cartridge_type: &'static str,
    pub rom_size: &'static str,
    pub ram_size: &'static str,
    pub checksum: u8,
}

impl fmt::Display for HeaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title: {}", self.title)?;
        writeln!(f, "Cartridge Type: {}", self.cartridge_type)?;
        writeln!(f, "ROM Size: {}", self.rom_size)?;
        writeln!(f, "RAM Size: {}", self.ram_size)?;
        write!(f, "Checksum: {:02X}", self.checksum)
    }
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn byte(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0)
    }

    fn title(&self) -> String {
        let start = 0x0134.min(self.data.len());
        let end = 0x0144.min(self.data.len());
        let mut slice = &self.data[start..end];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    fn cart_type(&self) -> u8 {
        self.byte(0x0147)
    }

    fn mbc_type(&self) -> MbcType {
        match self.cart_type() {
            0x00 => MbcType::NoMbc,
            0x01..=0x03 => MbcType::Mbc1,
            0x0F..=0x13 => MbcType::Mbc3,
            0x19..=0x1E => MbcType::Mbc5,
            other => {
                warn!("Unknown/unsupported MBC {other:#04X}, using ROM only");
                MbcType::NoMbc
            }
        }
    }

    fn rom_banks(&self) -> usize {
        match self.byte(0x0148) {
            code @ 0x00..=0x08 => (0x8000usize << code) / ROM_BANK_SIZE,
            other => {
                let banks = self.data.len().div_ceil(ROM_BANK_SIZE).max(2);
                warn!("Unknown ROM size code {other:#04X}, assuming {banks} banks");
                banks
            }
        }
    }

    /// RAM size in bytes and bank count.
    fn ram_layout(&self) -> (usize, usize) {
        match self.byte(0x0149) {
            0x00 => (0, 0),
            0x01 => (0x800, 1),
            0x02 => (0x2000, 1),
            0x03 => (0x8000, 4),
            0x04 => (0x20000, 16),
            0x05 => (0x10000, 8),
            other => {
                warn!("Unknown RAM size code {other:#04X}, cartridge has no RAM");
                (0, 0)
            }
        }
    }
}

fn cartridge_type_name(code: u8) -> &'static str {
    match code {
        0x00 => "MBC0/ROM ONLY",
        0x01 => "MBC1",
        0x02 => "MBC1+RAM",
        0x03 => "MBC1+RAM+BATTERY",
        0x05 => "MBC2",
        0x06 => "MBC2+BATTERY",
        0x08 => "ROM+RAM",
        0x09 => "ROM+RAM+BATTERY",
        0x0B => "MMM01",
        0x0C => "MMM01+RAM",
        0x0D => "MMM01+RAM+BATTERY",
        0x0F => "MBC3+TIMER+BATTERY",
        0x10 => "MBC3+TIMER+RAM+BATTERY",
        0x11 => "MBC3",
        0x12 => "MBC3+RAM",
        0x13 => "MBC3+RAM+BATTERY",
        0x19 => "MBC5",
        0x1A => "MBC5+RAM",
        0x1B => "MBC5+RAM+BATTERY",
        0x1C => "MBC5+RUMBLE",
        0x1D => "MBC5+RUMBLE+RAM",
        0x1E => "MBC5+RUMBLE+RAM+BATTERY",
        0x20 => "MBC6",
        0x22 => "MBC7+SENSOR+RUMBLE+RAM+BATTERY",
        0xFC => "POCKET CAMERA",
        0xFD => "BANDAI TAMA5",
        0xFE => "HuC3",
        0xFF => "HuC1+RAM+BATTERY",
        _ => "Unknown cartridge type",
    }
}

fn rom_size_name(code: u8) -> &'static str {
    match code {
        0x00 => "32 KiB (2 ROM banks, No Banking)",
        0x01 => "64 KiB (4 ROM banks)",
        0x02 => "128 KiB (8 ROM banks)",
        0x03 => "256 KiB (16 ROM banks)",
        0x04 => "512 KiB (32 ROM banks)",
        0x05 => "1 MiB (64 ROM banks)",
        0x06 => "2 MiB (128 ROM banks)",
        0x07 => "4 MiB (256 ROM banks)",
        0x08 => "8 MiB (512 ROM banks)",
        _ => "Unknown ROM size",
    }
}

fn ram_size_name(code: u8) -> &'static str {
    match code {
        0x00 => "No RAM",
        0x01 => "Unused (2 KB?)",
        0x02 => "8 KiB (1 bank)",
        0x03 => "32 KiB (4 banks of 8 KiB each)",
        0x04 => "128 KiB (16 banks of 8 KiB each)",
        0x05 => "64 KiB (8 banks of 8 KiB each)",
        _ => "Unknown RAM size",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
        let mut rom = vec![0; 0x8000 << rom_code];
        rom[0x0147] = cart_type;
        rom[0x0148] = rom_code;
        rom[0x0149] = ram_code;
        rom
    }

    #[test]
    fn ram_layout_follows_header_code() {
        let expected = [
            (0x00, 0, 0),
            (0x01, 0x800, 1),
            (0x02, 0x2000, 1),
            (0x03, 0x8000, 4),
            (0x04, 0x20000, 16),
            (0x05, 0x10000, 8),
            (0x09, 0, 0),
        ];
        for (code, size, banks) in expected {
            let data = image(0x03, 0, code);
            assert_eq!(Header::parse(&data).ram_layout(), (size, banks), "code {code:02X}");
        }
    }

    #[test]
    fn rom_banks_double_per_size_code() {
        for code in 0..=5u8 {
            let data = image(0x19, code, 0);
            assert_eq!(Header::parse(&data).rom_banks(), 2 << code);
        }
    }

    #[test]
    fn unsupported_controller_falls_back_to_rom_only() {
        let cart = Cartridge::load(image(0x05, 0, 0));
        assert_eq!(cart.mbc, MbcType::NoMbc);
        assert_eq!(cart.header_info().cartridge_type, "MBC2");
    }

    #[test]
    fn small_ram_mirrors_inside_window() {
        let mut cart = Cartridge::load(image(0x02, 0, 0x01));
        cart.write(0x0000, 0x0A);
        cart.write(0xA000, 0x5A);
        assert_eq!(cart.read(0xA800), 0x5A);
    }
}
