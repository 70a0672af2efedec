use std::fmt;

use log::trace;

use crate::{
    error::EmuError,
    mmu::{Interrupt, Mmu},
    opcodes::{AluOp, Condition, EXTENDED, Extended, Indirect, Instruction, Operand, PRIMARY, ShiftOp},
};

pub const FLAG_Z: u8 = 0x80;
pub const FLAG_N: u8 = 0x40;
pub const FLAG_H: u8 = 0x20;
pub const FLAG_C: u8 = 0x10;

const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

/// Cost of dispatching an interrupt.
pub const INTERRUPT_CYCLES: u32 = 20;
/// Cost of one idle step while halted.
pub const HALT_CYCLES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterPair {
    AF,
    BC,
    DE,
    HL,
    SP,
}

/// Decoded form of the F register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub z: bool,
    pub n: bool,
    pub h: bool,
    pub c: bool,
}

impl Flags {
    /// Packed F byte; the low nibble is always zero.
    pub fn bits(self) -> u8 {
        let mut f = 0;
        if self.z {
            f |= FLAG_Z;
        }
        if self.n {
            f |= FLAG_N;
        }
        if self.h {
            f |= FLAG_H;
        }
        if self.c {
            f |= FLAG_C;
        }
        f
    }

    pub fn from_bits(f: u8) -> Self {
        Self {
            z: f & FLAG_Z != 0,
            n: f & FLAG_N != 0,
            h: f & FLAG_H != 0,
            c: f & FLAG_C != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    pub fn get(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.a,
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
        }
    }

    pub fn set(&mut self, reg: Reg8, val: u8) {
        match reg {
            Reg8::A => self.a = val,
            Reg8::B => self.b = val,
            Reg8::C => self.c = val,
            Reg8::D => self.d = val,
            Reg8::E => self.e = val,
            Reg8::H => self.h = val,
            Reg8::L => self.l = val,
        }
    }

    pub fn pair(&self, rr: RegisterPair) -> u16 {
        let join = |hi: u8, lo: u8| ((hi as u16) << 8) | lo as u16;
        match rr {
            RegisterPair::AF => join(self.a, self.f.bits()),
            RegisterPair::BC => join(self.b, self.c),
            RegisterPair::DE => join(self.d, self.e),
            RegisterPair::HL => join(self.h, self.l),
            RegisterPair::SP => self.sp,
        }
    }

    pub fn set_pair(&mut self, rr: RegisterPair, val: u16) {
        let hi = (val >> 8) as u8;
        let lo = val as u8;
        match rr {
            RegisterPair::AF => {
                self.a = hi;
                self.f = Flags::from_bits(lo);
            }
            RegisterPair::BC => (self.b, self.c) = (hi, lo),
            RegisterPair::DE => (self.d, self.e) = (hi, lo),
            RegisterPair::HL => (self.h, self.l) = (hi, lo),
            RegisterPair::SP => self.sp = val,
        }
    }

    pub fn hl(&self) -> u16 {
        self.pair(RegisterPair::HL)
    }
}

/// Sharp SM83 core.
pub struct Cpu {
    pub regs: Registers,
    /// Interrupt master enable.
    pub ime: bool,
    pub halted: bool,
    /// Total cycles executed since reset.
    pub cycles: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: Registers::default(),
            ime: false,
            halted: false,
            cycles: 0,
        }
    }

    /// Register file as the DMG boot ROM leaves it.
    pub fn post_boot() -> Self {
        let mut cpu = Self::new();
        cpu.reset_post_boot();
        cpu
    }

    pub fn reset_post_boot(&mut self) {
        self.regs = Registers {
            a: 0x01,
            f: Flags::from_bits(0xB0),
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xD8,
            h: 0x01,
            l: 0x4D,
            sp: BOOT_SP,
            pc: BOOT_PC,
        };
        self.ime = false;
        self.halted = false;
        self.cycles = 0;
    }

    /// Services an interrupt or executes one instruction, returning the
    /// cycles it took.
    pub fn step(&mut self, mmu: &mut Mmu) -> Result<u32, EmuError> {
        let cycles = if let Some(cycles) = self.handle_interrupts(mmu) {
            cycles
        } else if self.halted {
            HALT_CYCLES
        } else {
            self.execute_next(mmu)?
        };
        self.cycles += cycles as u64;
        Ok(cycles)
    }

    fn handle_interrupts(&mut self, mmu: &mut Mmu) -> Option<u32> {
        let pending = mmu.pending_interrupts();
        if pending == 0 {
            return None;
        }
        self.halted = false;
        if !self.ime {
            return None;
        }
        let interrupt = Interrupt::highest(pending)?;
        self.ime = false;
        mmu.if_reg &= !interrupt.mask();
        let pc = self.regs.pc;
        self.push(mmu, pc);
        self.regs.pc = interrupt.vector();
        Some(INTERRUPT_CYCLES)
    }

    fn execute_next(&mut self, mmu: &mut Mmu) -> Result<u32, EmuError> {
        let pc = self.regs.pc;
        let opcode = self.fetch8(mmu);
        let Some(instr) = PRIMARY[opcode as usize] else {
            return Err(EmuError::UnknownOpcode { opcode, pc });
        };
        #[cfg(feature = "cpu-trace")]
        trace!("{pc:04X}: {instr} [{}]", self.debug_state());
        #[cfg(not(feature = "cpu-trace"))]
        trace!("{pc:04X}: {instr}");
        self.execute(mmu, instr)
    }

    fn fetch8(&mut self, mmu: &Mmu) -> u8 {
        let val = mmu.read_byte(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, mmu: &Mmu) -> u16 {
        let lo = self.fetch8(mmu) as u16;
        let hi = self.fetch8(mmu) as u16;
        (hi << 8) | lo
    }

    fn push(&mut self, mmu: &mut Mmu, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write_byte(self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write_byte(self.regs.sp, val as u8);
    }

    fn pop(&mut self, mmu: &Mmu) -> u16 {
        let lo = mmu.read_byte(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = mmu.read_byte(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    fn read_operand(&self, mmu: &Mmu, operand: Operand) -> u8 {
        match operand {
            Operand::Reg(r) => self.regs.get(r),
            Operand::HlMem => mmu.read_byte(self.regs.hl()),
        }
    }

    fn write_operand(&mut self, mmu: &mut Mmu, operand: Operand, val: u8) {
        match operand {
            Operand::Reg(r) => self.regs.set(r, val),
            Operand::HlMem => mmu.write_byte(self.regs.hl(), val),
        }
    }

    fn indirect_addr(&mut self, ind: Indirect) -> u16 {
        match ind {
            Indirect::Bc => self.regs.pair(RegisterPair::BC),
            Indirect::De => self.regs.pair(RegisterPair::DE),
            Indirect::HlInc => {
                let hl = self.regs.hl();
                self.regs.set_pair(RegisterPair::HL, hl.wrapping_add(1));
                hl
            }
            Indirect::HlDec => {
                let hl = self.regs.hl();
                self.regs.set_pair(RegisterPair::HL, hl.wrapping_sub(1));
                hl
            }
        }
    }

    fn condition(&self, cond: Option<Condition>) -> bool {
        match cond {
            None => true,
            Some(Condition::Nz) => !self.regs.f.z,
            Some(Condition::Z) => self.regs.f.z,
            Some(Condition::Nc) => !self.regs.f.c,
            Some(Condition::C) => self.regs.f.c,
        }
    }

    fn execute(&mut self, mmu: &mut Mmu, instr: Instruction) -> Result<u32, EmuError> {
        use Instruction::*;

        let cycles = match instr {
            Nop => 4,
            // STOP's second byte is not consumed.
            Stop => 4,
            Halt => {
                self.halted = true;
                4
            }
            Di => {
                self.ime = false;
                4
            }
            Ei => {
                self.ime = true;
                4
            }
            Ld(dst, src) => {
                let val = self.read_operand(mmu, src);
                self.write_operand(mmu, dst, val);
                if dst == Operand::HlMem || src == Operand::HlMem { 8 } else { 4 }
            }
            LdImm(dst) => {
                let val = self.fetch8(mmu);
                self.write_operand(mmu, dst, val);
                if dst == Operand::HlMem { 12 } else { 8 }
            }
            LdPairImm(rr) => {
                let val = self.fetch16(mmu);
                self.regs.set_pair(rr, val);
                12
            }
            StoreA(ind) => {
                let addr = self.indirect_addr(ind);
                mmu.write_byte(addr, self.regs.a);
                8
            }
            LoadA(ind) => {
                let addr = self.indirect_addr(ind);
                self.regs.a = mmu.read_byte(addr);
                8
            }
            StoreSp => {
                let addr = self.fetch16(mmu);
                mmu.write_word(addr, self.regs.sp);
                20
            }
            LdhStore => {
                let offset = self.fetch8(mmu) as u16;
                mmu.write_byte(0xFF00 | offset, self.regs.a);
                12
            }
            LdhLoad => {
                let offset = self.fetch8(mmu) as u16;
                self.regs.a = mmu.read_byte(0xFF00 | offset);
                12
            }
            LdhStoreC => {
                mmu.write_byte(0xFF00 | self.regs.c as u16, self.regs.a);
                8
            }
            LdhLoadC => {
                self.regs.a = mmu.read_byte(0xFF00 | self.regs.c as u16);
                8
            }
            StoreAbs => {
                let addr = self.fetch16(mmu);
                mmu.write_byte(addr, self.regs.a);
                16
            }
            LoadAbs => {
                let addr = self.fetch16(mmu);
                self.regs.a = mmu.read_byte(addr);
                16
            }
            LdSpHl => {
                self.regs.sp = self.regs.hl();
                8
            }
            LdHlSpOffset => {
                let offset = self.fetch8(mmu);
                let val = self.sp_plus_offset(offset);
                self.regs.set_pair(RegisterPair::HL, val);
                12
            }
            Push(rr) => {
                let val = self.regs.pair(rr);
                self.push(mmu, val);
                16
            }
            Pop(rr) => {
                // POP AF drops the low nibble through Flags::from_bits.
                let val = self.pop(mmu);
                self.regs.set_pair(rr, val);
                12
            }
            Inc(target) => {
                let val = self.read_operand(mmu, target);
                let res = val.wrapping_add(1);
                self.regs.f.z = res == 0;
                self.regs.f.n = false;
                self.regs.f.h = val & 0x0F == 0x0F;
                self.write_operand(mmu, target, res);
                if target == Operand::HlMem { 12 } else { 4 }
            }
            Dec(target) => {
                let val = self.read_operand(mmu, target);
                let res = val.wrapping_sub(1);
                self.regs.f.z = res == 0;
                self.regs.f.n = true;
                self.regs.f.h = val & 0x0F == 0x00;
                self.write_operand(mmu, target, res);
                if target == Operand::HlMem { 12 } else { 4 }
            }
            IncPair(rr) => {
                let val = self.regs.pair(rr).wrapping_add(1);
                self.regs.set_pair(rr, val);
                8
            }
            DecPair(rr) => {
                let val = self.regs.pair(rr).wrapping_sub(1);
                self.regs.set_pair(rr, val);
                8
            }
            AddHl(rr) => {
                let hl = self.regs.hl();
                let val = self.regs.pair(rr);
                let (res, carry) = hl.overflowing_add(val);
                self.regs.f.n = false;
                self.regs.f.h = (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF;
                self.regs.f.c = carry;
                self.regs.set_pair(RegisterPair::HL, res);
                8
            }
            AddSp => {
                let offset = self.fetch8(mmu);
                self.regs.sp = self.sp_plus_offset(offset);
                16
            }
            Alu(op, src) => {
                let val = self.read_operand(mmu, src);
                self.alu(op, val);
                if src == Operand::HlMem { 8 } else { 4 }
            }
            AluImm(op) => {
                let val = self.fetch8(mmu);
                self.alu(op, val);
                8
            }
            Rlca => {
                let a = self.regs.a;
                self.regs.a = a.rotate_left(1);
                self.set_rotate_a_flags(a & 0x80 != 0);
                4
            }
            Rrca => {
                let a = self.regs.a;
                self.regs.a = a.rotate_right(1);
                self.set_rotate_a_flags(a & 0x01 != 0);
                4
            }
            Rla => {
                let a = self.regs.a;
                self.regs.a = (a << 1) | self.regs.f.c as u8;
                self.set_rotate_a_flags(a & 0x80 != 0);
                4
            }
            Rra => {
                let a = self.regs.a;
                self.regs.a = (a >> 1) | ((self.regs.f.c as u8) << 7);
                self.set_rotate_a_flags(a & 0x01 != 0);
                4
            }
            Daa => {
                self.daa();
                4
            }
            Cpl => {
                self.regs.a = !self.regs.a;
                self.regs.f.n = true;
                self.regs.f.h = true;
                4
            }
            Scf => {
                self.regs.f.n = false;
                self.regs.f.h = false;
                self.regs.f.c = true;
                4
            }
            Ccf => {
                self.regs.f.n = false;
                self.regs.f.h = false;
                self.regs.f.c = !self.regs.f.c;
                4
            }
            Jr(cond) => {
                let offset = self.fetch8(mmu) as i8;
                if self.condition(cond) {
                    self.regs.pc = self.regs.pc.wrapping_add_signed(offset as i16);
                    12
                } else {
                    8
                }
            }
            Jp(cond) => {
                let addr = self.fetch16(mmu);
                if self.condition(cond) {
                    self.regs.pc = addr;
                    16
                } else {
                    12
                }
            }
            JpHl => {
                self.regs.pc = self.regs.hl();
                4
            }
            Call(cond) => {
                let addr = self.fetch16(mmu);
                if self.condition(cond) {
                    let ret = self.regs.pc;
                    self.push(mmu, ret);
                    self.regs.pc = addr;
                    24
                } else {
                    12
                }
            }
            Ret(None) => {
                self.regs.pc = self.pop(mmu);
                16
            }
            Ret(cond) => {
                if self.condition(cond) {
                    self.regs.pc = self.pop(mmu);
                    20
                } else {
                    8
                }
            }
            Reti => {
                self.ime = true;
                self.regs.pc = self.pop(mmu);
                16
            }
            Rst(vector) => {
                let ret = self.regs.pc;
                self.push(mmu, ret);
                self.regs.pc = vector as u16;
                16
            }
            Prefix => self.execute_extended(mmu)?,
        };
        Ok(cycles)
    }

    fn execute_extended(&mut self, mmu: &mut Mmu) -> Result<u32, EmuError> {
        let pc = self.regs.pc.wrapping_sub(1);
        let opcode = self.fetch8(mmu);
        let Some(instr) = EXTENDED[opcode as usize] else {
            return Err(EmuError::UnknownExtendedOpcode { opcode, pc });
        };
        trace!("{pc:04X}: {instr}");

        let target = instr.operand();
        let val = self.read_operand(mmu, target);
        match instr {
            Extended::Shift(op, _) => {
                let res = self.shift(op, val);
                self.write_operand(mmu, target, res);
            }
            Extended::Bit(bit, _) => {
                self.regs.f.z = val & (1 << bit) == 0;
                self.regs.f.n = false;
                self.regs.f.h = true;
                return Ok(if target == Operand::HlMem { 12 } else { 8 });
            }
            Extended::Res(bit, _) => self.write_operand(mmu, target, val & !(1 << bit)),
            Extended::Set(bit, _) => self.write_operand(mmu, target, val | (1 << bit)),
        }
        Ok(if target == Operand::HlMem { 16 } else { 8 })
    }

    fn alu(&mut self, op: AluOp, val: u8) {
        let a = self.regs.a;
        let carry_in = self.regs.f.c as u8;
        match op {
            AluOp::Add | AluOp::Adc => {
                let carry_in = if op == AluOp::Adc { carry_in } else { 0 };
                let sum = a as u16 + val as u16 + carry_in as u16;
                let res = sum as u8;
                self.regs.f = Flags {
                    z: res == 0,
                    n: false,
                    h: (a & 0x0F) + (val & 0x0F) + carry_in > 0x0F,
                    c: sum > 0xFF,
                };
                self.regs.a = res;
            }
            AluOp::Sub | AluOp::Sbc | AluOp::Cp => {
                let carry_in = if op == AluOp::Sbc { carry_in } else { 0 };
                let res = a.wrapping_sub(val).wrapping_sub(carry_in);
                self.regs.f = Flags {
                    z: res == 0,
                    n: true,
                    h: (a & 0x0F) < (val & 0x0F) + carry_in,
                    c: (a as u16) < val as u16 + carry_in as u16,
                };
                if op != AluOp::Cp {
                    self.regs.a = res;
                }
            }
            AluOp::And => {
                self.regs.a = a & val;
                self.regs.f = Flags {
                    z: self.regs.a == 0,
                    n: false,
                    h: true,
                    c: false,
                };
            }
            AluOp::Xor | AluOp::Or => {
                self.regs.a = if op == AluOp::Xor { a ^ val } else { a | val };
                self.regs.f = Flags {
                    z: self.regs.a == 0,
                    ..Flags::default()
                };
            }
        }
    }

    fn shift(&mut self, op: ShiftOp, val: u8) -> u8 {
        let carry_in = self.regs.f.c as u8;
        let (res, carry) = match op {
            ShiftOp::Rlc => (val.rotate_left(1), val & 0x80 != 0),
            ShiftOp::Rrc => (val.rotate_right(1), val & 0x01 != 0),
            ShiftOp::Rl => ((val << 1) | carry_in, val & 0x80 != 0),
            ShiftOp::Rr => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
            ShiftOp::Sla => (val << 1, val & 0x80 != 0),
            ShiftOp::Sra => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            ShiftOp::Swap => (val.rotate_left(4), false),
            ShiftOp::Srl => (val >> 1, val & 0x01 != 0),
        };
        self.regs.f = Flags {
            z: res == 0,
            n: false,
            h: false,
            c: carry,
        };
        res
    }

    fn set_rotate_a_flags(&mut self, carry: bool) {
        self.regs.f = Flags {
            z: false,
            n: false,
            h: false,
            c: carry,
        };
    }

    /// SP + signed offset with flags taken from the unsigned low byte add.
    fn sp_plus_offset(&mut self, offset: u8) -> u16 {
        let sp = self.regs.sp;
        self.regs.f = Flags {
            z: false,
            n: false,
            h: (sp & 0x000F) + (offset as u16 & 0x000F) > 0x000F,
            c: (sp & 0x00FF) + offset as u16 > 0x00FF,
        };
        sp.wrapping_add_signed(offset as i8 as i16)
    }

    fn daa(&mut self) {
        let mut adjust = if self.regs.f.c { 0x60 } else { 0x00 };
        if self.regs.f.h {
            adjust |= 0x06;
        }
        if self.regs.f.n {
            self.regs.a = self.regs.a.wrapping_sub(adjust);
        } else {
            if self.regs.a & 0x0F > 0x09 {
                adjust |= 0x06;
            }
            if self.regs.a > 0x99 {
                adjust |= 0x60;
            }
            self.regs.a = self.regs.a.wrapping_add(adjust);
        }
        self.regs.f.z = self.regs.a == 0;
        self.regs.f.h = false;
        self.regs.f.c = adjust >= 0x60;
    }

    pub fn debug_state(&self) -> String {
        let r = &self.regs;
        format!(
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} PC:{:04X} IME:{} HALT:{} CY:{}",
            r.a,
            r.f.bits(),
            r.b,
            r.c,
            r.d,
            r.e,
            r.h,
            r.l,
            r.sp,
            r.pc,
            self.ime as u8,
            self.halted as u8,
            self.cycles
        )
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reg8::A => "A",
            Reg8::B => "B",
            Reg8::C => "C",
            Reg8::D => "D",
            Reg8::E => "E",
            Reg8::H => "H",
            Reg8::L => "L",
        })
    }
}

impl fmt::Display for RegisterPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegisterPair::AF => "AF",
            RegisterPair::BC => "BC",
            RegisterPair::DE => "DE",
            RegisterPair::HL => "HL",
            RegisterPair::SP => "SP",
        })
    }
}
