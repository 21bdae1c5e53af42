//! # スクロールユニット（loopy v/t/x/w）
//!
//! ```text
//! yyy NN YYYYY XXXXX
//! ||| || ||||| +++++-- coarse X scroll
//! ||| || +++++-------- coarse Y scroll
//! ||| ++-------------- nametable select
//! +++----------------- fine Y scroll
//! ```

/// 15ビットのVRAMアドレスレジスタ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Loopy(u16);

impl Loopy {
    pub fn new(raw: u16) -> Self {
        Loopy(raw & 0x7FFF)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn coarse_x(self) -> u16 {
        self.0 & 0x001F
    }

    pub fn coarse_y(self) -> u16 {
        (self.0 >> 5) & 0x001F
    }

    pub fn nametable(self) -> u16 {
        (self.0 >> 10) & 0x0003
    }

    pub fn fine_y(self) -> u16 {
        (self.0 >> 12) & 0x0007
    }

    pub fn set_coarse_x(&mut self, value: u16) {
        self.0 = (self.0 & !0x001F) | (value & 0x1F);
    }

    pub fn set_coarse_y(&mut self, value: u16) {
        self.0 = (self.0 & !0x03E0) | ((value & 0x1F) << 5);
    }

    pub fn set_nametable(&mut self, value: u16) {
        self.0 = (self.0 & !0x0C00) | ((value & 0x03) << 10);
    }

    pub fn set_fine_y(&mut self, value: u16) {
        self.0 = (self.0 & !0x7000) | ((value & 0x07) << 12);
    }

    /// 水平方向のネームテーブルを跨ぐ
    pub fn increment_horizontal(&mut self) {
        if self.coarse_x() == 31 {
            self.set_coarse_x(0);
            self.0 ^= 0x0400;
        } else {
            self.set_coarse_x(self.coarse_x() + 1);
        }
    }

    pub fn increment_vertical(&mut self) {
        if self.fine_y() < 7 {
            self.set_fine_y(self.fine_y() + 1);
            return;
        }
        self.set_fine_y(0);
        match self.coarse_y() {
            29 => {
                self.set_coarse_y(0);
                self.0 ^= 0x0800;
            }
            // 属性テーブル領域に入っていた場合はネームテーブルを切り替えずに戻る
            31 => self.set_coarse_y(0),
            y => self.set_coarse_y(y + 1),
        }
    }

    /// ネームテーブル上のタイル番号のアドレス
    pub fn tile_address(self) -> u16 {
        0x2000 | (self.0 & 0x0FFF)
    }

    pub fn attribute_address(self) -> u16 {
        0x23C0 | (self.0 & 0x0C00) | ((self.0 >> 4) & 0x38) | ((self.0 >> 2) & 0x07)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrollUnit {
    /// 現在のVRAMアドレス
    pub v: Loopy,
    /// 一時VRAMアドレス
    pub t: Loopy,
    /// fine X (3 bits)
    pub x: u8,
    /// 2回書き込みラッチ
    pub w: bool,
}

impl ScrollUnit {
    /// $2000: t.nametable = d1-d0
    pub fn write_ctrl(&mut self, value: u8) {
        self.t.set_nametable(value as u16 & 0x03);
    }

    /// $2005
    pub fn write_scroll(&mut self, value: u8) {
        if !self.w {
            self.t.set_coarse_x(value as u16 >> 3);
            self.x = value & 0x07;
        } else {
            self.t.set_fine_y(value as u16 & 0x07);
            self.t.set_coarse_y(value as u16 >> 3);
        }
        self.w = !self.w;
    }

    /// $2006
    pub fn write_addr(&mut self, value: u8) {
        if !self.w {
            // bit 14 is cleared by the first write
            self.t = Loopy::new((self.t.raw() & 0x00FF) | ((value as u16 & 0x3F) << 8));
        } else {
            self.t = Loopy::new((self.t.raw() & 0xFF00) | value as u16);
            self.v = self.t;
        }
        self.w = !self.w;
    }

    pub fn reset_latch(&mut self) {
        self.w = false;
    }

    /// $2007アクセス後のインクリメント
    pub fn increment_address(&mut self, step: u16) {
        self.v = Loopy::new(self.v.raw().wrapping_add(step));
    }

    pub fn increment_horizontal(&mut self) {
        self.v.increment_horizontal();
    }

    pub fn increment_vertical(&mut self) {
        self.v.increment_vertical();
    }

    pub fn copy_horizontal(&mut self) {
        self.v = Loopy::new((self.v.raw() & 0x7BE0) | (self.t.raw() & 0x041F));
    }

    pub fn copy_vertical(&mut self) {
        self.v = Loopy::new((self.v.raw() & 0x041F) | (self.t.raw() & 0x7BE0));
    }
}
