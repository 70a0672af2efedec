use thiserror::Error;

/// Fatal outcomes of instruction decode.
///
/// The instruction tables leave the eleven undefined primary opcodes empty;
/// reaching one stops the machine. Hosts decide whether that ends the process
/// (the interactive default) or just the current run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmuError {
    #[error("unknown opcode {opcode:#04X} at PC={pc:#06X}")]
    UnknownOpcode { opcode: u8, pc: u16 },
    #[error("unknown extended opcode CB {opcode:#04X} at PC={pc:#06X}")]
    UnknownExtendedOpcode { opcode: u8, pc: u16 },
}

impl EmuError {
    /// Address of the prefix or opcode byte that failed to decode.
    pub fn pc(&self) -> u16 {
        match *self {
            EmuError::UnknownOpcode { pc, .. } | EmuError::UnknownExtendedOpcode { pc, .. } => pc,
        }
    }
}
