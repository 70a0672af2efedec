//! Instruction descriptors and the two 256-entry dispatch tables.
//!
//! Both tables are built at compile time from the opcode bit fields. Entries
//! that are `None` are the undefined opcodes; the CPU turns them into
//! [`EmuError`](crate::error::EmuError) values instead of executing anything.

use std::fmt;

use crate::cpu::{Reg8, RegisterPair};

/// An 8-bit operand slot: a register or the byte addressed by HL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg8),
    HlMem,
}

impl Operand {
    /// Decodes the 3-bit register field used throughout the instruction set.
    pub const fn from_index(index: u8) -> Self {
        match index & 0x07 {
            0 => Operand::Reg(Reg8::B),
            1 => Operand::Reg(Reg8::C),
            2 => Operand::Reg(Reg8::D),
            3 => Operand::Reg(Reg8::E),
            4 => Operand::Reg(Reg8::H),
            5 => Operand::Reg(Reg8::L),
            6 => Operand::HlMem,
            _ => Operand::Reg(Reg8::A),
        }
    }
}

/// Address sources for `LD (rr),A` / `LD A,(rr)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indirect {
    Bc,
    De,
    HlInc,
    HlDec,
}

impl Indirect {
    const fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => Indirect::Bc,
            1 => Indirect::De,
            2 => Indirect::HlInc,
            _ => Indirect::HlDec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Nz,
    Z,
    Nc,
    C,
}

impl Condition {
    const fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => Condition::Nz,
            1 => Condition::Z,
            2 => Condition::Nc,
            _ => Condition::C,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    const fn from_index(index: u8) -> Self {
        match index & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }
}

/// Rotates and shifts of the CB-prefixed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl ShiftOp {
    const fn from_index(index: u8) -> Self {
        match index & 0x07 {
            0 => ShiftOp::Rlc,
            1 => ShiftOp::Rrc,
            2 => ShiftOp::Rl,
            3 => ShiftOp::Rr,
            4 => ShiftOp::Sla,
            5 => ShiftOp::Sra,
            6 => ShiftOp::Swap,
            _ => ShiftOp::Srl,
        }
    }
}

const fn pair(index: u8) -> RegisterPair {
    match index & 0x03 {
        0 => RegisterPair::BC,
        1 => RegisterPair::DE,
        2 => RegisterPair::HL,
        _ => RegisterPair::SP,
    }
}

const fn stack_pair(index: u8) -> RegisterPair {
    match index & 0x03 {
        0 => RegisterPair::BC,
        1 => RegisterPair::DE,
        2 => RegisterPair::HL,
        _ => RegisterPair::AF,
    }
}

/// One entry of the primary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Stop,
    Halt,
    Di,
    Ei,
    /// `LD dst,src`
    Ld(Operand, Operand),
    /// `LD r,u8`
    LdImm(Operand),
    /// `LD rr,u16`
    LdPairImm(RegisterPair),
    /// `LD (rr),A`
    StoreA(Indirect),
    /// `LD A,(rr)`
    LoadA(Indirect),
    /// `LD (u16),SP`
    StoreSp,
    /// `LD (FF00+u8),A`
    LdhStore,
    /// `LD A,(FF00+u8)`
    LdhLoad,
    /// `LD (FF00+C),A`
    LdhStoreC,
    /// `LD A,(FF00+C)`
    LdhLoadC,
    /// `LD (u16),A`
    StoreAbs,
    /// `LD A,(u16)`
    LoadAbs,
    LdSpHl,
    /// `LD HL,SP+i8`
    LdHlSpOffset,
    Push(RegisterPair),
    Pop(RegisterPair),
    Inc(Operand),
    Dec(Operand),
    IncPair(RegisterPair),
    DecPair(RegisterPair),
    AddHl(RegisterPair),
    /// `ADD SP,i8`
    AddSp,
    Alu(AluOp, Operand),
    AluImm(AluOp),
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Jr(Option<Condition>),
    Jp(Option<Condition>),
    JpHl,
    Call(Option<Condition>),
    Ret(Option<Condition>),
    Reti,
    Rst(u8),
    /// The 0xCB prefix; the next byte indexes [`EXTENDED`].
    Prefix,
}

/// One entry of the CB-prefixed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extended {
    Shift(ShiftOp, Operand),
    Bit(u8, Operand),
    Res(u8, Operand),
    Set(u8, Operand),
}

impl Extended {
    pub fn operand(&self) -> Operand {
        match *self {
            Extended::Shift(_, op)
            | Extended::Bit(_, op)
            | Extended::Res(_, op)
            | Extended::Set(_, op) => op,
        }
    }
}

const fn decode_primary(op: u8) -> Option<Instruction> {
    use Instruction::*;

    let instr = match op {
        0x00 => Nop,
        0x10 => Stop,
        0x76 => Halt,
        0xF3 => Di,
        0xFB => Ei,
        0xCB => Prefix,
        0x07 => Rlca,
        0x0F => Rrca,
        0x17 => Rla,
        0x1F => Rra,
        0x27 => Daa,
        0x2F => Cpl,
        0x37 => Scf,
        0x3F => Ccf,
        0x08 => StoreSp,
        0x18 => Jr(None),
        0x20 | 0x28 | 0x30 | 0x38 => Jr(Some(Condition::from_index(op >> 3))),
        0x01 | 0x11 | 0x21 | 0x31 => LdPairImm(pair(op >> 4)),
        0x02 | 0x12 | 0x22 | 0x32 => StoreA(Indirect::from_index(op >> 4)),
        0x0A | 0x1A | 0x2A | 0x3A => LoadA(Indirect::from_index(op >> 4)),
        0x03 | 0x13 | 0x23 | 0x33 => IncPair(pair(op >> 4)),
        0x0B | 0x1B | 0x2B | 0x3B => DecPair(pair(op >> 4)),
        0x09 | 0x19 | 0x29 | 0x39 => AddHl(pair(op >> 4)),
        0x00..=0x3F if op & 0x07 == 0x04 => Inc(Operand::from_index(op >> 3)),
        0x00..=0x3F if op & 0x07 == 0x05 => Dec(Operand::from_index(op >> 3)),
        0x00..=0x3F if op & 0x07 == 0x06 => LdImm(Operand::from_index(op >> 3)),
        0x40..=0x7F => Ld(Operand::from_index(op >> 3), Operand::from_index(op)),
        0x80..=0xBF => Alu(AluOp::from_index(op >> 3), Operand::from_index(op)),
        0xC0 | 0xC8 | 0xD0 | 0xD8 => Ret(Some(Condition::from_index(op >> 3))),
        0xC9 => Ret(None),
        0xD9 => Reti,
        0xC2 | 0xCA | 0xD2 | 0xDA => Jp(Some(Condition::from_index(op >> 3))),
        0xC3 => Jp(None),
        0xE9 => JpHl,
        0xC4 | 0xCC | 0xD4 | 0xDC => Call(Some(Condition::from_index(op >> 3))),
        0xCD => Call(None),
        0xC1 | 0xD1 | 0xE1 | 0xF1 => Pop(stack_pair(op >> 4)),
        0xC5 | 0xD5 | 0xE5 | 0xF5 => Push(stack_pair(op >> 4)),
        0xE0 => LdhStore,
        0xF0 => LdhLoad,
        0xE2 => LdhStoreC,
        0xF2 => LdhLoadC,
        0xEA => StoreAbs,
        0xFA => LoadAbs,
        0xE8 => AddSp,
        0xF8 => LdHlSpOffset,
        0xF9 => LdSpHl,
        0xC0..=0xFF if op & 0x07 == 0x06 => AluImm(AluOp::from_index(op >> 3)),
        0xC0..=0xFF if op & 0x07 == 0x07 => Rst(op & 0x38),
        _ => return None,
    };
    Some(instr)
}

const fn decode_extended(op: u8) -> Extended {
    let target = Operand::from_index(op);
    let bit = (op >> 3) & 0x07;
    match op >> 6 {
        0 => Extended::Shift(ShiftOp::from_index(op >> 3), target),
        1 => Extended::Bit(bit, target),
        2 => Extended::Res(bit, target),
        _ => Extended::Set(bit, target),
    }
}

const fn build_primary() -> [Option<Instruction>; 256] {
    let mut table = [None; 256];
    let mut op = 0;
    while op < 256 {
        table[op] = decode_primary(op as u8);
        op += 1;
    }
    table
}

const fn build_extended() -> [Option<Extended>; 256] {
    let mut table = [None; 256];
    let mut op = 0;
    while op < 256 {
        table[op] = Some(decode_extended(op as u8));
        op += 1;
    }
    table
}

/// Primary opcode table.
pub static PRIMARY: [Option<Instruction>; 256] = build_primary();

/// CB-prefixed opcode table.
pub static EXTENDED: [Option<Extended>; 256] = build_extended();

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{r}"),
            Operand::HlMem => f.write_str("(HL)"),
        }
    }
}

impl fmt::Display for Indirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Indirect::Bc => "(BC)",
            Indirect::De => "(DE)",
            Indirect::HlInc => "(HL+)",
            Indirect::HlDec => "(HL-)",
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Condition::Nz => "NZ",
            Condition::Z => "Z",
            Condition::Nc => "NC",
            Condition::C => "C",
        })
    }
}

impl AluOp {
    fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "ADD A,",
            AluOp::Adc => "ADC A,",
            AluOp::Sub => "SUB A,",
            AluOp::Sbc => "SBC A,",
            AluOp::And => "AND A,",
            AluOp::Xor => "XOR A,",
            AluOp::Or => "OR A,",
            AluOp::Cp => "CP A,",
        }
    }
}

fn cond_prefix(cond: &Option<Condition>) -> String {
    cond.map(|c| format!("{c},")).unwrap_or_default()
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            Nop => f.write_str("NOP"),
            Stop => f.write_str("STOP"),
            Halt => f.write_str("HALT"),
            Di => f.write_str("DI"),
            Ei => f.write_str("EI"),
            Ld(dst, src) => write!(f, "LD {dst},{src}"),
            LdImm(dst) => write!(f, "LD {dst},u8"),
            LdPairImm(rr) => write!(f, "LD {rr},u16"),
            StoreA(ind) => write!(f, "LD {ind},A"),
            LoadA(ind) => write!(f, "LD A,{ind}"),
            StoreSp => f.write_str("LD (u16),SP"),
            LdhStore => f.write_str("LD (FF00+u8),A"),
            LdhLoad => f.write_str("LD A,(FF00+u8)"),
            LdhStoreC => f.write_str("LD (FF00+C),A"),
            LdhLoadC => f.write_str("LD A,(FF00+C)"),
            StoreAbs => f.write_str("LD (u16),A"),
            LoadAbs => f.write_str("LD A,(u16)"),
            LdSpHl => f.write_str("LD SP,HL"),
            LdHlSpOffset => f.write_str("LD HL,SP+i8"),
            Push(rr) => write!(f, "PUSH {rr}"),
            Pop(rr) => write!(f, "POP {rr}"),
            Inc(op) => write!(f, "INC {op}"),
            Dec(op) => write!(f, "DEC {op}"),
            IncPair(rr) => write!(f, "INC {rr}"),
            DecPair(rr) => write!(f, "DEC {rr}"),
            AddHl(rr) => write!(f, "ADD HL,{rr}"),
            AddSp => f.write_str("ADD SP,i8"),
            Alu(op, src) => write!(f, "{}{src}", op.mnemonic()),
            AluImm(op) => write!(f, "{}u8", op.mnemonic()),
            Rlca => f.write_str("RLCA"),
            Rrca => f.write_str("RRCA"),
            Rla => f.write_str("RLA"),
            Rra => f.write_str("RRA"),
            Daa => f.write_str("DAA"),
            Cpl => f.write_str("CPL"),
            Scf => f.write_str("SCF"),
            Ccf => f.write_str("CCF"),
            Jr(cond) => write!(f, "JR {}i8", cond_prefix(cond)),
            Jp(cond) => write!(f, "JP {}u16", cond_prefix(cond)),
            JpHl => f.write_str("JP HL"),
            Call(cond) => write!(f, "CALL {}u16", cond_prefix(cond)),
            Ret(Some(cond)) => write!(f, "RET {cond}"),
            Ret(None) => f.write_str("RET"),
            Reti => f.write_str("RETI"),
            Rst(vector) => write!(f, "RST {vector:02X}h"),
            Prefix => f.write_str("PREFIX CB"),
        }
    }
}

impl fmt::Display for Extended {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extended::Shift(op, target) => {
                let name = match op {
                    ShiftOp::Rlc => "RLC",
                    ShiftOp::Rrc => "RRC",
                    ShiftOp::Rl => "RL",
                    ShiftOp::Rr => "RR",
                    ShiftOp::Sla => "SLA",
                    ShiftOp::Sra => "SRA",
                    ShiftOp::Swap => "SWAP",
                    ShiftOp::Srl => "SRL",
                };
                write!(f, "{name} {target}")
            }
            Extended::Bit(bit, target) => write!(f, "BIT {bit},{target}"),
            Extended::Res(bit, target) => write!(f, "RES {bit},{target}"),
            Extended::Set(bit, target) => write!(f, "SET {bit},{target}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNDEFINED: [u8; 11] = [
        0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
    ];

    #[test]
    fn primary_table_leaves_only_undefined_opcodes_empty() {
        let defined = PRIMARY.iter().filter(|e| e.is_some()).count();
        assert_eq!(defined, 245);
        for op in UNDEFINED {
            assert!(PRIMARY[op as usize].is_none(), "{op:02X} should be undefined");
        }
    }

    #[test]
    fn extended_table_is_complete() {
        assert!(EXTENDED.iter().all(Option::is_some));
        assert_eq!(
            EXTENDED[0x7E],
            Some(Extended::Bit(7, Operand::HlMem))
        );
        assert_eq!(
            EXTENDED[0x37],
            Some(Extended::Shift(ShiftOp::Swap, Operand::Reg(Reg8::A)))
        );
    }

    #[test]
    fn decodes_bit_fields() {
        assert_eq!(PRIMARY[0x76], Some(Instruction::Halt));
        assert_eq!(
            PRIMARY[0x46],
            Some(Instruction::Ld(Operand::Reg(Reg8::B), Operand::HlMem))
        );
        assert_eq!(PRIMARY[0x34], Some(Instruction::Inc(Operand::HlMem)));
        assert_eq!(PRIMARY[0xF1], Some(Instruction::Pop(RegisterPair::AF)));
        assert_eq!(PRIMARY[0x31], Some(Instruction::LdPairImm(RegisterPair::SP)));
        assert_eq!(PRIMARY[0xFE], Some(Instruction::AluImm(AluOp::Cp)));
        assert_eq!(PRIMARY[0xFF], Some(Instruction::Rst(0x38)));
        assert_eq!(
            PRIMARY[0x38],
            Some(Instruction::Jr(Some(Condition::C)))
        );
    }

    #[test]
    fn disassembles_for_trace_output() {
        assert_eq!(PRIMARY[0x3E].map(|i| i.to_string()).as_deref(), Some("LD A,u8"));
        assert_eq!(EXTENDED[0x7E].map(|i| i.to_string()).as_deref(), Some("BIT 7,(HL)"));
        assert_eq!(PRIMARY[0xC0].map(|i| i.to_string()).as_deref(), Some("RET NZ"));
    }
}
