//! # famicore CLI
//!
//! SDL2を使用したデスクトップ版フロントエンド。`--headless`ではウィンドウを開かずに
//! 指定フレーム数を実行し、スクリーンショットと統計を出力する。

use anyhow::{Context, Result};
use clap::Parser;
use famicore::{AudioRing, Button, Buttons, DebugConfig, Nes, SCREEN_HEIGHT, SCREEN_WIDTH};
use sdl2::audio::{AudioCallback, AudioSpecDesired};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// NTSCの1フレーム
const FRAME_DURATION: Duration = Duration::from_micros(16_640);
const AUDIO_BUFFER_SAMPLES: u16 = 1024;

/// famicore NES emulator
#[derive(Parser, Debug)]
#[command(name = "famicore")]
#[command(about = "NES emulator", long_about = None)]
struct Args {
    /// ROMファイルのパス
    #[arg(value_name = "ROM")]
    rom_path: PathBuf,

    /// スケールファクタ
    #[arg(short, long, default_value = "3")]
    scale: u32,

    /// デバッグモード（ログをdebugに上げ、未実装オペコードで停止する）
    #[arg(short, long)]
    debug: bool,

    /// CPUトレースをtraceレベルで出力
    #[arg(long)]
    trace: bool,

    /// トレースを開始するフレーム
    #[arg(long, default_value = "0")]
    trace_from_frame: u64,

    /// ウィンドウを開かずに実行
    #[arg(long)]
    headless: bool,

    /// 実行するフレーム数（headlessでは既定60）
    #[arg(long)]
    frames: Option<u64>,

    /// 最後のフレームをPPMで保存
    #[arg(long, value_name = "PATH")]
    screenshot: Option<PathBuf>,

    /// 音声出力を無効化
    #[arg(long)]
    mute: bool,
}

/// SDLのオーディオスレッドから呼ばれる
struct RingOutput {
    ring: Arc<Mutex<AudioRing>>,
}

impl AudioCallback for RingOutput {
    type Channel = f32;

    fn callback(&mut self, out: &mut [f32]) {
        match self.ring.lock() {
            Ok(mut ring) => ring.fill(out),
            Err(_) => out.fill(0.0),
        }
    }
}

fn key_to_button(keycode: Keycode) -> Option<Button> {
    match keycode {
        Keycode::Up => Some(Button::Up),
        Keycode::Down => Some(Button::Down),
        Keycode::Left => Some(Button::Left),
        Keycode::Right => Some(Button::Right),
        Keycode::X => Some(Button::A),
        Keycode::Z => Some(Button::B),
        Keycode::RShift => Some(Button::Select),
        Keycode::Return => Some(Button::Start),
        _ => None,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let rom_data = std::fs::read(&args.rom_path)
        .with_context(|| format!("failed to read ROM {}", args.rom_path.display()))?;
    let mut nes = Nes::new(&rom_data)
        .with_context(|| format!("failed to load ROM {}", args.rom_path.display()))?;
    nes.set_debug_config(DebugConfig {
        trace_cpu: args.trace,
        trace_from_frame: args.trace_from_frame,
        halt_on_unimplemented: args.debug,
    });

    if args.headless {
        run_headless(&mut nes, &args)?;
    } else {
        run_window(&mut nes, &args)?;
    }

    log::info!("Diagnostics: {}", serde_json::to_string(nes.diagnostics())?);
    Ok(())
}

fn save_screenshot(nes: &Nes, path: &Path) -> Result<()> {
    std::fs::write(path, nes.frame_buffer().to_ppm())
        .with_context(|| format!("failed to write screenshot {}", path.display()))?;
    log::info!("Saved screenshot to {}", path.display());
    Ok(())
}

fn run_headless(nes: &mut Nes, args: &Args) -> Result<()> {
    let frames = args.frames.unwrap_or(60);
    let started = Instant::now();
    for _ in 0..frames {
        nes.step_frame()?;
        // 音声は捨てる
        nes.drain_audio_samples();
    }
    log::info!("Ran {} frames in {:.2?}", frames, started.elapsed());

    if let Some(path) = &args.screenshot {
        save_screenshot(nes, path)?;
    }
    println!("{}", serde_json::to_string_pretty(nes.diagnostics())?);
    Ok(())
}

fn run_window(nes: &mut Nes, args: &Args) -> Result<()> {
    let sdl_context = sdl2::init().map_err(|e| anyhow::anyhow!(e))?;
    let video_subsystem = sdl_context.video().map_err(|e| anyhow::anyhow!(e))?;

    let window = video_subsystem
        .window(
            "famicore",
            SCREEN_WIDTH as u32 * args.scale,
            SCREEN_HEIGHT as u32 * args.scale,
        )
        .position_centered()
        .build()?;

    let mut canvas = window.into_canvas().build()?;
    let texture_creator = canvas.texture_creator();
    let mut texture = texture_creator
        .create_texture_streaming(
            PixelFormatEnum::RGBA32,
            SCREEN_WIDTH as u32,
            SCREEN_HEIGHT as u32,
        )
        .map_err(|e| anyhow::anyhow!(e))?;

    let ring = Arc::new(Mutex::new(AudioRing::default()));
    let audio_device = if args.mute {
        None
    } else {
        let audio_subsystem = sdl_context.audio().map_err(|e| anyhow::anyhow!(e))?;
        let desired = AudioSpecDesired {
            freq: Some(famicore::apu::SAMPLE_RATE as i32),
            channels: Some(1),
            samples: Some(AUDIO_BUFFER_SAMPLES),
        };
        let device = audio_subsystem
            .open_playback(None, &desired, |_spec| RingOutput {
                ring: Arc::clone(&ring),
            })
            .map_err(|e| anyhow::anyhow!(e))?;
        device.resume();
        Some(device)
    };

    let mut event_pump = sdl_context.event_pump().map_err(|e| anyhow::anyhow!(e))?;
    let mut buttons = Buttons::default();
    let mut frames_run = 0u64;

    log::info!("Starting emulation...");

    'running: loop {
        let frame_start = Instant::now();

        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => {
                    if let Some(button) = key_to_button(keycode) {
                        buttons.set(button, true);
                    }
                }
                Event::KeyUp {
                    keycode: Some(keycode),
                    ..
                } => {
                    if let Some(button) = key_to_button(keycode) {
                        buttons.set(button, false);
                    }
                }
                _ => {}
            }
        }
        nes.set_buttons(0, buttons);

        match nes.step_frame() {
            Ok(frame_buffer) => {
                texture
                    .update(None, frame_buffer.as_rgba(), SCREEN_WIDTH * 4)
                    .map_err(|e| anyhow::anyhow!(e))?;
                canvas.clear();
                canvas
                    .copy(&texture, None, None)
                    .map_err(|e| anyhow::anyhow!(e))?;
                canvas.present();
            }
            Err(e) => {
                log::error!("Emulation error: {}", e);
                break 'running;
            }
        }

        let samples = nes.drain_audio_samples();
        if audio_device.is_some() {
            if let Ok(mut ring) = ring.lock() {
                ring.extend(&samples);
            }
        }

        frames_run += 1;
        if args.frames.is_some_and(|limit| frames_run >= limit) {
            break 'running;
        }

        if let Some(rest) = FRAME_DURATION.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    if let Some(path) = &args.screenshot {
        save_screenshot(nes, path)?;
    }
    if let Ok(ring) = ring.lock() {
        log::debug!(
            "Audio ring: {} dropped, {} underrun samples",
            ring.dropped(),
            ring.underruns()
        );
    }
    log::info!("Emulation stopped");
    Ok(())
}
