//! # famicore Web
//!
//! WebAssembly対応のフロントエンド。ROMはJS側から渡される。

use wasm_bindgen::prelude::*;
use wasm_bindgen::Clamped;
use web_sys::{CanvasRenderingContext2d, ImageData};

use famicore::{Button, Buttons, Nes, SCREEN_HEIGHT, SCREEN_WIDTH};

/// WebAssembly用のラッパー
#[wasm_bindgen]
pub struct FamicoreWeb {
    nes: Option<Nes>,
    buttons: Buttons,
}

impl Default for FamicoreWeb {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl FamicoreWeb {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        // パニック時のスタックトレースを有効化
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        init_logger();
        log::info!("famicore web initialized");

        Self {
            nes: None,
            buttons: Buttons::default(),
        }
    }

    /// ROMをロード。失敗したら以前のROMはそのまま残る
    pub fn load_rom(&mut self, rom_data: &[u8]) -> Result<(), JsValue> {
        let nes = Nes::new(rom_data)
            .map_err(|e| JsValue::from_str(&format!("Failed to load ROM: {}", e)))?;
        self.nes = Some(nes);
        self.buttons = Buttons::default();
        Ok(())
    }

    pub fn reset(&mut self) {
        if let Some(nes) = self.nes.as_mut() {
            nes.reset();
        }
    }

    /// 1フレーム実行
    pub fn step_frame(&mut self) -> Result<(), JsValue> {
        let nes = self.nes_mut()?;
        nes.step_frame()
            .map_err(|e| JsValue::from_str(&format!("Emulation error: {}", e)))?;
        Ok(())
    }

    /// フレームバッファをCanvasに描画
    pub fn render(&self, ctx: &CanvasRenderingContext2d) -> Result<(), JsValue> {
        let Some(nes) = self.nes.as_ref() else {
            return Ok(());
        };
        let image_data = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(nes.frame_buffer().as_rgba()),
            SCREEN_WIDTH as u32,
            SCREEN_HEIGHT as u32,
        )?;
        ctx.put_image_data(&image_data, 0.0, 0.0)?;
        Ok(())
    }

    /// キーコード: ArrowUp, ArrowDown, ArrowLeft, ArrowRight, a, s, d, f
    pub fn key_down(&mut self, key: &str) {
        self.set_key(key, true);
    }

    pub fn key_up(&mut self, key: &str) {
        self.set_key(key, false);
    }

    /// 前回呼び出し以降のオーディオサンプル（44.1kHz, mono）
    pub fn audio_samples(&mut self) -> js_sys::Float32Array {
        let samples = self
            .nes
            .as_mut()
            .map(|nes| nes.drain_audio_samples())
            .unwrap_or_default();
        js_sys::Float32Array::from(samples.as_slice())
    }

    /// CPU状態の取得（デバッグ用）
    pub fn cpu_state(&self) -> String {
        let Some(nes) = self.nes.as_ref() else {
            return String::from("no ROM loaded");
        };
        let cpu = nes.cpu();
        format!(
            "PC: {:#06x}, SP: {:#04x}, A: {:#04x}, X: {:#04x}, Y: {:#04x}, Status: {:#010b}",
            cpu.pc,
            cpu.sp,
            cpu.a,
            cpu.x,
            cpu.y,
            cpu.flags.to_byte()
        )
    }

    /// PPU状態の取得（デバッグ用）
    pub fn ppu_state(&self) -> String {
        let Some(nes) = self.nes.as_ref() else {
            return String::from("no ROM loaded");
        };
        let ppu = nes.ppu();
        format!(
            "Scanline: {}, Cycle: {}, Frame: {}",
            ppu.scanline(),
            ppu.cycle(),
            ppu.frame()
        )
    }

    /// 逆アセンブル
    pub fn disassemble(&self, start: u16, count: usize) -> String {
        self.nes
            .as_ref()
            .map(|nes| {
                nes.disassemble(start, count)
                    .iter()
                    .map(|(addr, inst)| format!("{:04X}: {}", addr, inst))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

impl FamicoreWeb {
    fn nes_mut(&mut self) -> Result<&mut Nes, JsValue> {
        self.nes
            .as_mut()
            .ok_or_else(|| JsValue::from_str("No ROM loaded"))
    }

    fn set_key(&mut self, key: &str, pressed: bool) {
        let Some(button) = key_to_button(key) else {
            return;
        };
        self.buttons.set(button, pressed);
        if let Some(nes) = self.nes.as_mut() {
            nes.set_buttons(0, self.buttons);
        }
    }
}

fn key_to_button(key: &str) -> Option<Button> {
    match key {
        "ArrowUp" => Some(Button::Up),
        "ArrowDown" => Some(Button::Down),
        "ArrowLeft" => Some(Button::Left),
        "ArrowRight" => Some(Button::Right),
        "a" | "A" => Some(Button::A),
        "s" | "S" => Some(Button::B),
        "d" | "D" => Some(Button::Select),
        "f" | "F" => Some(Button::Start),
        _ => None,
    }
}

/// JavaScriptのコンソールにログを出力（初期化）
#[wasm_bindgen]
pub fn init_logger() {
    let _ = std::panic::catch_unwind(|| {
        wasm_logger::init(wasm_logger::Config::default());
    });
}
