//! PPUのビットフィールドレジスタ
//! どれも素のu8を包み、ビット位置はアクセサで表す。

/// $2000 PPUCTRL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ctrl(pub u8);

impl Ctrl {
    pub fn nametable(self) -> u8 {
        self.0 & 0x03
    }

    pub fn vram_increment(self) -> u16 {
        if self.0 & 0x04 != 0 {
            32
        } else {
            1
        }
    }

    /// 8x8スプライトのパターンテーブル
    pub fn sprite_pattern_base(self) -> u16 {
        if self.0 & 0x08 != 0 {
            0x1000
        } else {
            0x0000
        }
    }

    pub fn background_pattern_base(self) -> u16 {
        if self.0 & 0x10 != 0 {
            0x1000
        } else {
            0x0000
        }
    }

    pub fn sprite_height(self) -> i16 {
        if self.0 & 0x20 != 0 {
            16
        } else {
            8
        }
    }

    pub fn generate_nmi(self) -> bool {
        self.0 & 0x80 != 0
    }
}

/// $2001 PPUMASK
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mask(pub u8);

impl Mask {
    pub fn greyscale(self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn show_background_left(self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn show_sprites_left(self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn show_background(self) -> bool {
        self.0 & 0x08 != 0
    }

    pub fn show_sprites(self) -> bool {
        self.0 & 0x10 != 0
    }

    pub fn rendering_enabled(self) -> bool {
        self.0 & 0x18 != 0
    }
}

/// $2002 PPUSTATUS (上位3ビットのみ実体がある)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    const SPRITE_OVERFLOW: u8 = 0x20;
    const SPRITE_ZERO_HIT: u8 = 0x40;
    const VBLANK: u8 = 0x80;

    pub fn sprite_overflow(self) -> bool {
        self.0 & Self::SPRITE_OVERFLOW != 0
    }

    pub fn sprite_zero_hit(self) -> bool {
        self.0 & Self::SPRITE_ZERO_HIT != 0
    }

    pub fn vblank(self) -> bool {
        self.0 & Self::VBLANK != 0
    }

    pub fn set_sprite_overflow(&mut self, value: bool) {
        self.set(Self::SPRITE_OVERFLOW, value);
    }

    pub fn set_sprite_zero_hit(&mut self, value: bool) {
        self.set(Self::SPRITE_ZERO_HIT, value);
    }

    pub fn set_vblank(&mut self, value: bool) {
        self.set(Self::VBLANK, value);
    }

    fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// OAMの属性バイト（スプライトの3バイト目）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpriteAttribute(pub u8);

impl SpriteAttribute {
    /// ビット2-4は実機に存在しない
    pub const MASK: u8 = 0xE3;

    pub fn palette(self) -> u8 {
        self.0 & 0x03
    }

    pub fn behind_background(self) -> bool {
        self.0 & 0x20 != 0
    }

    pub fn flip_horizontal(self) -> bool {
        self.0 & 0x40 != 0
    }

    pub fn flip_vertical(self) -> bool {
        self.0 & 0x80 != 0
    }
}
