use crate::mmu::{Interrupt, Mmu};

/// Cycles per DIV increment.
pub const DIV_PERIOD: u32 = 256;

/// Divider and programmable counter.
///
/// The registers themselves live on the bus; this only tracks the cycle
/// remainders between increments.
pub struct Timer {
    div_cycles: u32,
    tima_cycles: u32,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div_cycles: 0,
            tima_cycles: 0,
        }
    }

    /// TIMA input period selected by TAC bits 0-1.
    pub fn tima_period(tac: u8) -> u32 {
        match tac & 0x03 {
            0 => 1024,
            1 => 16,
            2 => 64,
            _ => 256,
        }
    }

    pub fn step(&mut self, mmu: &mut Mmu, cycles: u32) {
        if mmu.div_reset {
            mmu.div_reset = false;
            self.div_cycles = 0;
        }

        self.div_cycles += cycles;
        while self.div_cycles >= DIV_PERIOD {
            self.div_cycles -= DIV_PERIOD;
            mmu.div = mmu.div.wrapping_add(1);
        }

        if mmu.tac & 0x04 == 0 {
            self.tima_cycles = 0;
            return;
        }
        let period = Self::tima_period(mmu.tac);
        self.tima_cycles += cycles;
        while self.tima_cycles >= period {
            self.tima_cycles -= period;
            let (tima, overflow) = mmu.tima.overflowing_add(1);
            if overflow {
                mmu.tima = mmu.tma;
                mmu.request_interrupt(Interrupt::Timer);
            } else {
                mmu.tima = tima;
            }
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
