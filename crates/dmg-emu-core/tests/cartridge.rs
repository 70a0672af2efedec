mod common;

use std::fs;

use common::{banked_rom, rom_with_header};
use dmg_emu_core::cartridge::{
    BLANK_ROM_SIZE, Cartridge, MbcType, read_boot_rom, read_rom_or_blank, save_path_for,
};

#[test]
fn rom_only_header_info() {
    let mut rom = rom_with_header("TESTROM", 0x00, 0x00, 0x00);
    rom[0x014D] = 0x3C;
    let cart = Cartridge::load(rom);
    let info = cart.header_info();

    assert_eq!(cart.mbc, MbcType::NoMbc);
    assert_eq!(info.title, "TESTROM");
    assert_eq!(info.cartridge_type, "MBC0/ROM ONLY");
    assert_eq!(info.rom_size, "32 KiB (2 ROM banks, No Banking)");
    assert_eq!(info.ram_size, "No RAM");
    assert_eq!(
        info.to_string(),
        "Title: TESTROM\n\
         Cartridge Type: MBC0/ROM ONLY\n\
         ROM Size: 32 KiB (2 ROM banks, No Banking)\n\
         RAM Size: No RAM\n\
         Checksum: 3C"
    );
}

#[test]
fn header_names_for_banked_carts() {
    let cart = Cartridge::load(rom_with_header("BIG", 0x1B, 0x05, 0x04));
    let info = cart.header_info();
    assert_eq!(cart.mbc, MbcType::Mbc5);
    assert_eq!(info.cartridge_type, "MBC5+RAM+BATTERY");
    assert_eq!(info.rom_size, "1 MiB (64 ROM banks)");
    assert_eq!(info.ram_size, "128 KiB (16 banks of 8 KiB each)");
    assert_eq!(cart.rom_bank_count(), 64);
    assert_eq!(cart.ram_bank_count(), 16);
    assert_eq!(cart.ram.len(), 0x20000);
}

#[test]
fn title_stops_at_padding() {
    let cart = Cartridge::load(rom_with_header("ZELDA   ", 0x00, 0x00, 0x00));
    assert_eq!(cart.title, "ZELDA");
}

#[test]
fn mbc1_rom_bank_switching() {
    let mut cart = Cartridge::load(banked_rom(0x01, 0x02, 0x00));
    assert_eq!(cart.read(0x4000), 1);
    cart.write(0x2000, 0x05);
    assert_eq!(cart.read(0x4000), 5);
    // Bank 0 is not reachable through the switchable window.
    cart.write(0x2000, 0x00);
    assert_eq!(cart.read(0x4000), 1);
    cart.write(0x2000, 0x20);
    assert_eq!(cart.read(0x4000), 1);
}

#[test]
fn bank_select_wraps_to_bank_count() {
    // 4 banks, select bank 0x1F -> 0x1F % 4 == 3
    let mut cart = Cartridge::load(banked_rom(0x01, 0x01, 0x00));
    cart.write(0x2000, 0x1F);
    assert_eq!(cart.read(0x4000), 3);
    assert_eq!(cart.read(0x7FFF), 3);

    let mut cart = Cartridge::load(banked_rom(0x11, 0x01, 0x00));
    cart.write(0x2000, 0x7E);
    assert_eq!(cart.read(0x4000), 2);
}

#[test]
fn truncated_image_reads_open_bus() {
    // Header claims 128 KiB but only 32 KiB are present.
    let mut rom = rom_with_header("SHORT", 0x01, 0x00, 0x00);
    rom[0x0148] = 0x02;
    let mut cart = Cartridge::load(rom);
    cart.write(0x2000, 0x05);
    assert_eq!(cart.read(0x4000), 0xFF);
}

#[test]
fn mbc1_upper_bits_and_mode() {
    // 1 MiB: 64 banks, high bits come from 0x4000-0x5FFF.
    let mut cart = Cartridge::load(banked_rom(0x01, 0x05, 0x00));
    cart.write(0x2000, 0x02);
    cart.write(0x4000, 0x01);
    assert_eq!(cart.read(0x4000), 0x22);
    assert_eq!(cart.read(0x0000), 0x00, "mode 0 keeps bank 0 fixed");
    cart.write(0x6000, 0x01);
    assert_eq!(cart.read(0x0000), 0x20);
}

#[test]
fn mbc1_ram_enable() {
    let mut cart = Cartridge::load(rom_with_header("RAM", 0x03, 0x00, 0x03));
    cart.write(0xA000, 0x55);
    assert_eq!(cart.read(0xA000), 0xFF);

    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x55);
    assert_eq!(cart.read(0xA000), 0x55);

    // Only the low nibble is checked.
    cart.write(0x1FFF, 0x1A);
    assert_eq!(cart.read(0xA000), 0x55);

    cart.write(0x0000, 0x00);
    assert_eq!(cart.read(0xA000), 0xFF);
}

#[test]
fn mbc1_ram_banks_need_mode_one() {
    let mut cart = Cartridge::load(rom_with_header("RAM", 0x03, 0x00, 0x03));
    cart.write(0x0000, 0x0A);
    cart.write(0x6000, 0x01);
    cart.write(0x4000, 0x02);
    cart.write(0xA000, 0x22);
    cart.write(0x4000, 0x00);
    assert_eq!(cart.read(0xA000), 0x00);
    cart.write(0x4000, 0x02);
    assert_eq!(cart.read(0xA000), 0x22);
    assert_eq!(cart.ram[2 * 0x2000], 0x22);
}

#[test]
fn mbc3_ram_bank_wraps() {
    let mut cart = Cartridge::load(rom_with_header("MBC3", 0x13, 0x00, 0x03));
    assert_eq!(cart.mbc, MbcType::Mbc3);
    cart.write(0x0000, 0x0A);
    cart.write(0x4000, 0x05); // 5 % 4 == 1
    cart.write(0xA123, 0x99);
    assert_eq!(cart.ram[0x2000 + 0x123], 0x99);
}

#[test]
fn mbc5_nine_bit_bank_select() {
    let mut cart = Cartridge::load(banked_rom(0x19, 0x08, 0x00));
    assert_eq!(cart.rom_bank_count(), 512);
    cart.write(0x2000, 0x05);
    cart.write(0x3000, 0x01);
    // Bank 0x105: fill value is the bank index truncated to a byte.
    assert_eq!(cart.read(0x4000), 0x05);
    assert_eq!(cart.read(0x4000), (0x105usize & 0xFF) as u8);
    // MBC5 can map bank 0 into the switchable window.
    cart.write(0x3000, 0x00);
    cart.write(0x2000, 0x00);
    assert_eq!(cart.read(0x4000), 0x00);
    cart.write(0x2000, 0x80);
    assert_eq!(cart.read(0x4000), 0x80);
}

#[test]
fn unknown_codes_fall_back_safely() {
    let mut rom = rom_with_header("ODD", 0x22, 0x00, 0x00);
    rom[0x0149] = 0x07;
    let mut cart = Cartridge::load(rom);
    assert_eq!(cart.mbc, MbcType::NoMbc);
    assert!(cart.ram.is_empty());
    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x12);
    assert_eq!(cart.read(0xA000), 0xFF);
    let info = cart.header_info();
    assert_eq!(info.cartridge_type, "MBC7+SENSOR+RUMBLE+RAM+BATTERY");
    assert_eq!(info.ram_size, "Unknown RAM size");
}

#[test]
fn battery_ram_round_trips_through_save_file() {
    let dir = tempfile::tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");
    fs::write(&rom_path, rom_with_header("SAVE", 0x03, 0x00, 0x02)).unwrap();

    let mut cart = Cartridge::from_file(&rom_path).unwrap();
    assert_eq!(cart.save_path(), Some(dir.path().join("game.sav").as_path()));
    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x42);
    cart.write(0xBFFF, 0x24);
    cart.save_ram().unwrap();

    let saved = fs::read(dir.path().join("game.sav")).unwrap();
    assert_eq!(saved.len(), 0x2000);

    let mut reloaded = Cartridge::from_file(&rom_path).unwrap();
    reloaded.write(0x0000, 0x0A);
    assert_eq!(reloaded.read(0xA000), 0x42);
    assert_eq!(reloaded.read(0xBFFF), 0x24);
}

#[test]
fn ram_without_battery_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let save = dir.path().join("plain.sav");
    let mut cart = Cartridge::load(rom_with_header("PLAIN", 0x02, 0x00, 0x02));
    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x42);
    cart.save_ram_to(&save).unwrap();
    assert!(!save.exists());
    assert!(!cart.load_ram_from(&save).unwrap());
}

#[test]
fn missing_files_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let rom = read_rom_or_blank(&dir.path().join("absent.gb"));
    assert_eq!(rom.len(), BLANK_ROM_SIZE);
    assert!(rom.iter().all(|&b| b == 0));
    assert!(read_boot_rom(&dir.path().join("dmg_boot.bin")).is_none());
}

#[test]
fn save_path_replaces_extension() {
    assert_eq!(
        save_path_for(std::path::Path::new("roms/tetris.gb")),
        std::path::PathBuf::from("roms/tetris.sav")
    );
}
