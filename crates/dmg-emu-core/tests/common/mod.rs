#![allow(dead_code)]

use dmg_emu_core::{
    GameBoy,
    cartridge::Cartridge,
    cpu::Cpu,
    mmu::Mmu,
    palette::Palette,
};

/// Address test programs are copied to when run without a cartridge.
pub const PROGRAM_BASE: u16 = 0xC000;

/// A ROM image sized from `rom_code` with the given header fields filled in.
pub fn rom_with_header(title: &str, cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
    let mut rom = vec![0; 0x8000 << rom_code];
    for (dst, src) in rom[0x0134..0x0144].iter_mut().zip(title.bytes()) {
        *dst = src;
    }
    rom[0x0147] = cart_type;
    rom[0x0148] = rom_code;
    rom[0x0149] = ram_code;
    rom
}

/// Fills every 16 KiB bank with its own index so reads reveal the mapping.
pub fn banked_rom(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
    let mut rom = rom_with_header("BANKS", cart_type, rom_code, ram_code);
    for (bank, chunk) in rom.chunks_mut(0x4000).enumerate().skip(1) {
        chunk.fill(bank as u8);
    }
    rom
}

/// ROM-only cartridge with `program` at the 0x0100 entry point.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = rom_with_header("PROGRAM", 0x00, 0x00, 0x00);
    rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
    rom
}

pub fn machine_with_program(program: &[u8]) -> GameBoy {
    GameBoy::new(
        Cartridge::load(rom_with_program(program)),
        None,
        Palette::DMG,
    )
}

/// A post-boot CPU about to execute `program` from work RAM on a bare bus.
pub fn cpu_with_program(program: &[u8]) -> (Cpu, Mmu) {
    let mut mmu = Mmu::new();
    load_program(&mut mmu, program);
    let mut cpu = Cpu::post_boot();
    cpu.regs.pc = PROGRAM_BASE;
    (cpu, mmu)
}

pub fn load_program(mmu: &mut Mmu, program: &[u8]) {
    for (i, &byte) in program.iter().enumerate() {
        mmu.write_byte(PROGRAM_BASE + i as u16, byte);
    }
}

/// Steps `n` instructions and returns their cycle costs.
pub fn run_steps(cpu: &mut Cpu, mmu: &mut Mmu, n: usize) -> Vec<u32> {
    (0..n)
        .map(|_| cpu.step(mmu).expect("program hit an undefined opcode"))
        .collect()
}
