mod common;

use dmg_emu_core::{mmu::Mmu, timer::Timer};

#[test]
fn div_increment() {
    let mut mmu = Mmu::new();
    let mut timer = Timer::new();
    timer.step(&mut mmu, 255);
    assert_eq!(mmu.read_byte(0xFF04), 0);
    timer.step(&mut mmu, 1);
    assert_eq!(mmu.read_byte(0xFF04), 1);
    timer.step(&mut mmu, 256 * 3 + 100);
    assert_eq!(mmu.read_byte(0xFF04), 4);
}

#[test]
fn div_wraps() {
    let mut mmu = Mmu::new();
    let mut timer = Timer::new();
    mmu.div = 0xFF;
    timer.step(&mut mmu, 256);
    assert_eq!(mmu.div, 0x00);
}

#[test]
fn div_write_restarts_the_period() {
    let mut mmu = Mmu::new();
    let mut timer = Timer::new();
    timer.step(&mut mmu, 200);
    mmu.write_byte(0xFF04, 0x12);
    timer.step(&mut mmu, 100);
    assert_eq!(mmu.div, 0);
    timer.step(&mut mmu, 156);
    assert_eq!(mmu.div, 1);
}

#[test]
fn tima_stopped_when_disabled() {
    let mut mmu = Mmu::new();
    let mut timer = Timer::new();
    mmu.write_byte(0xFF07, 0x01);
    timer.step(&mut mmu, 4096);
    assert_eq!(mmu.tima, 0);
}

#[test]
fn tima_counts_at_selected_rate() {
    for (tac, period) in [(0x04u8, 1024u32), (0x05, 16), (0x06, 64), (0x07, 256)] {
        let mut mmu = Mmu::new();
        let mut timer = Timer::new();
        mmu.write_byte(0xFF07, tac);
        timer.step(&mut mmu, period * 3 - 1);
        assert_eq!(mmu.tima, 2, "TAC={tac:02X}");
        timer.step(&mut mmu, 1);
        assert_eq!(mmu.tima, 3, "TAC={tac:02X}");
    }
}

#[test]
fn tima_overflow_reloads_and_interrupts() {
    let mut mmu = Mmu::new();
    let mut timer = Timer::new();
    mmu.write_byte(0xFF06, 0xAB);
    mmu.write_byte(0xFF05, 0xFE);
    mmu.write_byte(0xFF07, 0x05);

    timer.step(&mut mmu, 16);
    assert_eq!(mmu.tima, 0xFF);
    assert_eq!(mmu.if_reg & 0x04, 0);

    timer.step(&mut mmu, 16);
    assert_eq!(mmu.tima, 0xAB);
    assert_eq!(mmu.if_reg & 0x04, 0x04);
}
