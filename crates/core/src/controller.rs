//! # コントローラー
//!
//! 標準パッドのシフトレジスタ。$4016への書き込みでストローブし、
//! $4016/$4017の読み込みで1ビットずつ取り出す。

/// コントローラーのボタン（ビット位置は読み出し順）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
}

impl Button {
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// 1フレーム分のボタン状態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Buttons {
    pub fn to_byte(self) -> u8 {
        [
            self.a,
            self.b,
            self.select,
            self.start,
            self.up,
            self.down,
            self.left,
            self.right,
        ]
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &pressed)| acc | ((pressed as u8) << i))
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        let flag = match button {
            Button::A => &mut self.a,
            Button::B => &mut self.b,
            Button::Select => &mut self.select,
            Button::Start => &mut self.start,
            Button::Up => &mut self.up,
            Button::Down => &mut self.down,
            Button::Left => &mut self.left,
            Button::Right => &mut self.right,
        };
        *flag = pressed;
    }
}

/// コントローラー
#[derive(Debug, Default)]
pub struct Controller {
    /// ラッチ済みのボタン状態（押されている=1）
    buttons: u8,
    shift_register: u8,
    strobe: bool,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// フレームごとにドライバーからボタン状態を反映する
    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.buttons = buttons.to_byte();
        if self.strobe {
            self.shift_register = self.buttons;
        }
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons & button.bit() != 0
    }

    /// CPU側からの読み込み（$4016/$4017）
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            // ストローブ中は常にAボタンを返す
            return (self.buttons & 0x01) | 0x40;
        }
        let value = (self.shift_register & 0x01) | 0x40;
        // 8回読み終えた後は1が返る
        self.shift_register = (self.shift_register >> 1) | 0x80;
        value
    }

    /// CPU側からの書き込み（$4016）
    pub fn write(&mut self, data: u8) {
        self.strobe = data & 0x01 != 0;
        if self.strobe {
            self.shift_register = self.buttons;
        }
    }
}
