use log::warn;

/// Four display colours indexed by shade (0 = lightest), stored as `0x00RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub name: &'static str,
    pub colors: [u32; 4],
}

const fn rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

impl Palette {
    pub const DMG: Palette = Palette {
        name: "dmg",
        colors: [rgb(155, 188, 15), rgb(139, 172, 15), rgb(48, 98, 48), rgb(15, 56, 15)],
    };

    pub const ALL: [Palette; 10] = [
        Palette::DMG,
        Palette {
            name: "cyber",
            colors: [rgb(50, 153, 180), rgb(46, 116, 134), rgb(2, 70, 88), rgb(2, 49, 61)],
        },
        Palette {
            name: "emu",
            colors: [rgb(224, 248, 208), rgb(136, 192, 112), rgb(52, 104, 86), rgb(8, 24, 32)],
        },
        Palette {
            name: "autumn",
            colors: [rgb(255, 246, 211), rgb(249, 168, 117), rgb(235, 107, 111), rgb(124, 63, 88)],
        },
        Palette {
            name: "paris",
            colors: [rgb(218, 112, 214), rgb(186, 85, 211), rgb(153, 50, 204), rgb(75, 0, 130)],
        },
        Palette {
            name: "grayscale",
            colors: [rgb(255, 255, 255), rgb(200, 200, 200), rgb(80, 80, 80), rgb(0, 0, 0)],
        },
        Palette {
            name: "early",
            colors: [rgb(0, 0, 0), rgb(80, 80, 80), rgb(200, 200, 200), rgb(255, 255, 255)],
        },
        Palette {
            name: "crow",
            colors: [rgb(204, 61, 80), rgb(153, 31, 39), rgb(89, 22, 22), rgb(38, 15, 13)],
        },
        Palette {
            name: "coffee",
            colors: [rgb(204, 158, 122), rgb(153, 116, 92), rgb(115, 77, 69), rgb(77, 48, 46)],
        },
        Palette {
            name: "winter",
            colors: [rgb(159, 244, 229), rgb(0, 185, 190), rgb(0, 95, 140), rgb(0, 43, 89)],
        },
    ];

    /// Case-insensitive lookup.
    pub fn by_name(name: &str) -> Option<Palette> {
        Self::ALL
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Like [`Palette::by_name`] but falls back to [`Palette::DMG`].
    pub fn by_name_or_default(name: &str) -> Palette {
        Self::by_name(name).unwrap_or_else(|| {
            warn!("Unknown palette '{name}', using '{}'", Palette::DMG.name);
            Palette::DMG
        })
    }

    pub fn color(&self, shade: u8) -> u32 {
        self.colors[(shade & 0x03) as usize]
    }

    /// Splits a colour into RGB bytes.
    pub fn rgb_bytes(color: u32) -> [u8; 3] {
        [(color >> 16) as u8, (color >> 8) as u8, color as u8]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::DMG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(Palette::by_name("Winter").map(|p| p.name), Some("winter"));
        assert_eq!(Palette::by_name("nope"), None);
        assert_eq!(Palette::by_name_or_default("nope"), Palette::DMG);
    }

    #[test]
    fn dmg_palette_is_classic_green() {
        assert_eq!(Palette::DMG.colors, [0x009BBC0F, 0x008BAC0F, 0x00306230, 0x000F380F]);
        assert_eq!(Palette::rgb_bytes(Palette::DMG.color(0)), [155, 188, 15]);
    }
}
