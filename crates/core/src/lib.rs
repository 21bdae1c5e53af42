//! # famicore
//! NES (Famicom) エミュレーションコア。
//!
//! CPU・PPU・APUは単一スレッドのロックステップで進む。`Nes::step`が1命令分の
//! CPUサイクルを実行し、その3倍のPPUドットと半分のAPUサイクルを回す。

pub mod apu;
pub mod audio;
pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod debug;
pub mod error;
pub mod mapper;
pub mod ppu;

pub use audio::AudioRing;
pub use cartridge::{Cartridge, Mirroring};
pub use controller::{Button, Buttons};
pub use debug::{DebugConfig, Diagnostics};
pub use error::{NesError, Result};
pub use ppu::{FrameBuffer, SCREEN_HEIGHT, SCREEN_WIDTH};

use bus::Bus;
use cpu::Cpu;

/// 1フレームあたりのCPUサイクル数（NTSC, 29780.5を切り捨て）
pub const CYCLES_PER_FRAME: u64 = 29_780;

/// 未実装オペコードを読み飛ばすときに消費するサイクル数
const SKIPPED_OPCODE_CYCLES: u32 = 2;

/// NESエミュレータのメインインスタンス
pub struct Nes {
    cpu: Cpu,
    debug: DebugConfig,
    diagnostics: Diagnostics,
    /// 直前のフレーム境界から経過したCPUサイクル
    frame_cycles: u64,
}

impl Nes {
    /// ROMを読み込んで電源投入状態にする。ROMが不正なら何も構築しない。
    pub fn new(rom: &[u8]) -> Result<Self> {
        let cartridge = Cartridge::from_ines(rom)?;
        log::info!(
            "Loaded ROM: mapper {} ({}), PRG {}KB, CHR {}KB{}, {:?} mirroring, reset vector ${:04X}",
            cartridge.header().mapper_id,
            cartridge.mapper().name(),
            cartridge.header().prg_banks * 16,
            cartridge.header().chr_banks * 8,
            if cartridge.has_chr_ram() { " (RAM)" } else { "" },
            cartridge.mirroring(),
            cartridge.reset_vector(),
        );

        let mut nes = Nes {
            cpu: Cpu::new(Bus::new(cartridge)),
            debug: DebugConfig::default(),
            diagnostics: Diagnostics::default(),
            frame_cycles: 0,
        };
        nes.power_on();
        Ok(nes)
    }

    fn power_on(&mut self) {
        let cycles = self.cpu.reset() as u32;
        self.cpu.bus.tick(cycles);
        self.frame_cycles = cycles as u64;
    }

    /// リセットボタン
    pub fn reset(&mut self) {
        self.cpu.bus.reset();
        self.power_on();
    }

    /// 割り込み処理と1命令の実行。経過したCPUサイクル数を返す。
    pub fn step(&mut self) -> Result<u32> {
        let mut cycles = 0u32;

        if self.cpu.bus.ppu.take_nmi() {
            cycles += self.cpu.nmi() as u32;
            self.diagnostics.nmis += 1;
        } else if self.cpu.bus.apu.irq_pending() && !self.cpu.flags.i {
            cycles += self.cpu.irq() as u32;
            self.diagnostics.irqs += 1;
        }

        if self.debug.should_trace(self.diagnostics.frames) {
            log::trace!("{}", debug::trace_line(&self.cpu));
        }

        match self.cpu.step() {
            Ok(instruction_cycles) => cycles += instruction_cycles as u32,
            Err(NesError::UnimplementedOpcode { opcode, pc }) if !self.debug.halt_on_unimplemented => {
                log::warn!("Unimplemented opcode {:#04x} at {:#06x}, skipping", opcode, pc);
                self.diagnostics.unimplemented += 1;
                cycles += SKIPPED_OPCODE_CYCLES;
            }
            Err(e) => return Err(e),
        }
        self.diagnostics.instructions += 1;

        // OAM DMA stall
        cycles += self.cpu.bus.take_stall_cycles(cycles);
        self.diagnostics.oam_dmas = self.cpu.bus.oam_dma_count();

        if self.cpu.bus.tick(cycles) {
            self.diagnostics.frames += 1;
        }
        Ok(cycles)
    }

    /// 1フレーム実行（29780サイクル、端数は次のフレームへ持ち越す）
    pub fn step_frame(&mut self) -> Result<&FrameBuffer> {
        while self.frame_cycles < CYCLES_PER_FRAME {
            self.frame_cycles += self.step()? as u64;
        }
        self.frame_cycles -= CYCLES_PER_FRAME;
        Ok(self.cpu.bus.ppu.frame_buffer())
    }

    /// `port`は0か1
    pub fn set_buttons(&mut self, port: usize, buttons: Buttons) {
        match self.cpu.bus.controllers.get_mut(port) {
            Some(controller) => controller.set_buttons(buttons),
            None => log::warn!("No controller port {}", port),
        }
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        self.cpu.bus.ppu.frame_buffer()
    }

    /// オーディオサンプルをまとめて取得
    pub fn drain_audio_samples(&mut self) -> Vec<f32> {
        self.cpu.bus.apu.drain_samples()
    }

    pub fn read_audio_sample(&mut self) -> Option<f32> {
        self.cpu.bus.apu.read_audio_sample()
    }

    /// CPU状態の取得（デバッグ用）
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// テストROMの自動実行モード等でレジスタを直接いじる
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// PPU状態の取得（デバッグ用）
    pub fn ppu(&self) -> &ppu::Ppu {
        &self.cpu.bus.ppu
    }

    pub fn apu(&self) -> &apu::Apu {
        &self.cpu.bus.apu
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn debug_config(&self) -> &DebugConfig {
        &self.debug
    }

    pub fn set_debug_config(&mut self, config: DebugConfig) {
        self.debug = config;
    }

    /// 副作用のないメモリ読み込み
    pub fn peek(&self, addr: u16) -> u8 {
        self.cpu.bus.peek(addr)
    }

    /// 逆アセンブル
    pub fn disassemble(&self, addr: u16, count: usize) -> Vec<(u16, String)> {
        debug::disassemble(&self.cpu.bus, addr, count)
    }

    /// 現在のPCから逆アセンブル
    pub fn disassemble_at_pc(&self, count: usize) -> Vec<(u16, String)> {
        self.disassemble(self.cpu.pc, count)
    }
}
