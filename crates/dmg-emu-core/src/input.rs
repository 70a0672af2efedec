use bitflags::bitflags;

use crate::mmu::{Interrupt, Mmu};

bitflags! {
    /// Pressed buttons. The high nibble is the direction group and the low
    /// nibble the action group, matching the JOYP lines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u8 {
        const DOWN   = 0b1000_0000;
        const UP     = 0b0100_0000;
        const LEFT   = 0b0010_0000;
        const RIGHT  = 0b0001_0000;
        const START  = 0b0000_1000;
        const SELECT = 0b0000_0100;
        const B      = 0b0000_0010;
        const A      = 0b0000_0001;
    }
}

impl Buttons {
    /// Parses a single button name such as `start` or `Left`.
    pub fn parse(name: &str) -> Option<Buttons> {
        match name.to_ascii_lowercase().as_str() {
            "a" => Some(Buttons::A),
            "b" => Some(Buttons::B),
            "select" => Some(Buttons::SELECT),
            "start" => Some(Buttons::START),
            "right" => Some(Buttons::RIGHT),
            "left" => Some(Buttons::LEFT),
            "up" => Some(Buttons::UP),
            "down" => Some(Buttons::DOWN),
            _ => None,
        }
    }
}

/// Latches host button state into the bus once per frame.
#[derive(Debug, Default)]
pub struct Joypad {
    held: Buttons,
}

impl Joypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self) -> Buttons {
        self.held
    }

    /// Publishes `buttons` as the active-low JOYP state. A button going down
    /// raises the joypad interrupt.
    pub fn sample(&mut self, mmu: &mut Mmu, buttons: Buttons) {
        let newly_pressed = buttons & !self.held;
        self.held = buttons;
        mmu.joypad_state = !buttons.bits();
        if !newly_pressed.is_empty() {
            mmu.request_interrupt(Interrupt::Joypad);
        }
    }
}
