//! ステータスレジスタ（P）

/// NV-BDIZC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub n: bool,
    pub v: bool,
    pub b: bool,
    pub d: bool,
    pub i: bool,
    pub z: bool,
    pub c: bool,
}

impl Flags {
    pub const CARRY: u8 = 0b0000_0001;
    pub const ZERO: u8 = 0b0000_0010;
    pub const IRQ_DISABLE: u8 = 0b0000_0100;
    pub const DECIMAL: u8 = 0b0000_1000;
    pub const BREAK: u8 = 0b0001_0000;
    pub const UNUSED: u8 = 0b0010_0000;
    pub const OVERFLOW: u8 = 0b0100_0000;
    pub const NEGATIVE: u8 = 0b1000_0000;

    /// ビット5は常に1
    pub fn to_byte(self) -> u8 {
        let mut byte = Self::UNUSED;
        for (set, bit) in [
            (self.c, Self::CARRY),
            (self.z, Self::ZERO),
            (self.i, Self::IRQ_DISABLE),
            (self.d, Self::DECIMAL),
            (self.b, Self::BREAK),
            (self.v, Self::OVERFLOW),
            (self.n, Self::NEGATIVE),
        ] {
            if set {
                byte |= bit;
            }
        }
        byte
    }

    /// PLP/RTIで復元する値。Bフラグは実体がないので常にfalse。
    pub fn from_byte(byte: u8) -> Self {
        Flags {
            n: byte & Self::NEGATIVE != 0,
            v: byte & Self::OVERFLOW != 0,
            b: false,
            d: byte & Self::DECIMAL != 0,
            i: byte & Self::IRQ_DISABLE != 0,
            z: byte & Self::ZERO != 0,
            c: byte & Self::CARRY != 0,
        }
    }

    pub fn update_zn(&mut self, value: u8) {
        self.z = value == 0;
        self.n = value & 0b1000_0000 != 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_bytes() {
        for byte in 0..=255u8 {
            let flags = Flags::from_byte(byte);
            assert!(!flags.b);
            assert_eq!(flags.to_byte(), (byte | Flags::UNUSED) & !Flags::BREAK);
        }
    }

    #[test]
    fn test_to_byte_keeps_break_when_set() {
        let flags = Flags {
            b: true,
            c: true,
            ..Default::default()
        };
        assert_eq!(flags.to_byte(), 0b0011_0001);
    }

    #[test]
    fn test_update_zn_all_values() {
        let mut flags = Flags::default();
        for value in 0..=255u8 {
            flags.update_zn(value);
            assert_eq!(flags.z, value == 0);
            assert_eq!(flags.n, value & 0x80 != 0);
        }
    }
}
