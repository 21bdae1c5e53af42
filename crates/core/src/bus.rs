//! # Memory Bus
//! CPUから見える16ビットアドレス空間のデコード。全アドレスがちょうど1つのデバイスに対応する。
//!
//! | range         | device                          |
//! |---------------|---------------------------------|
//! | $0000-$1FFF   | 2KB RAM (mirrored every $0800)  |
//! | $2000-$3FFF   | PPU registers (mirrored every 8)|
//! | $4000-$4013   | APU (write)                     |
//! | $4014         | OAM DMA                         |
//! | $4015         | APU status                      |
//! | $4016/$4017   | controllers / frame counter     |
//! | $4018-$5FFF   | open bus                        |
//! | $6000-$FFFF   | cartridge                       |

use crate::apu::Apu;
use crate::cartridge::Cartridge;
use crate::controller::Controller;
use crate::ppu::Ppu;
use std::cell::RefCell;
use std::rc::Rc;

const RAM_SIZE: usize = 0x0800;
const OAM_DMA_CYCLES: u32 = 513;

pub struct Bus {
    ram: [u8; RAM_SIZE],
    pub ppu: Ppu,
    pub apu: Apu,
    pub cartridge: Rc<RefCell<Cartridge>>,
    pub controllers: [Controller; 2],
    cycles: u64,
    /// CPUデータバスの最後の値
    open_bus: u8,
    /// 命令の途中で$4014に書かれた。ストールは命令の終わりで確定する
    dma_pending: bool,
    oam_dma_count: u64,
}

impl Bus {
    pub fn new(cartridge: Cartridge) -> Self {
        let cartridge = Rc::new(RefCell::new(cartridge));
        Bus {
            ram: [0; RAM_SIZE],
            ppu: Ppu::new(cartridge.clone()),
            apu: Apu::new(),
            cartridge,
            controllers: [Controller::new(), Controller::new()],
            cycles: 0,
            open_bus: 0,
            dma_pending: false,
            oam_dma_count: 0,
        }
    }

    /// 電源投入からのCPUサイクル数
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn oam_dma_count(&self) -> u64 {
        self.oam_dma_count
    }

    /// DMAのストールサイクルを取り出す。`elapsed`は`tick`前に実行済みの
    /// サイクル数で、DMA開始サイクルが奇数なら1サイクル余分に待つ。
    pub fn take_stall_cycles(&mut self, elapsed: u32) -> u32 {
        if !std::mem::take(&mut self.dma_pending) {
            return 0;
        }
        let start = self.cycles + elapsed as u64;
        OAM_DMA_CYCLES + (start % 2) as u32
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            0x0000..=0x1FFF => self.ram[addr as usize % RAM_SIZE],
            0x2000..=0x3FFF => self.ppu.read_register(addr),
            // bit 5 is not driven
            0x4015 => self.apu.read_register(addr) | (self.open_bus & 0x20),
            0x4016 => self.controllers[0].read(),
            0x4017 => self.controllers[1].read(),
            // APU write-only registers, OAM DMA, test registers, expansion area
            0x4000..=0x5FFF => self.open_bus,
            0x6000..=0xFFFF => self.cartridge.borrow().read(addr),
        };
        self.open_bus = value;
        value
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        self.open_bus = value;
        match addr {
            0x0000..=0x1FFF => self.ram[addr as usize % RAM_SIZE] = value,
            0x2000..=0x3FFF => self.ppu.write_register(addr, value),
            0x4014 => self.oam_dma(value),
            0x4016 => {
                // strobe is wired to both ports
                self.controllers[0].write(value);
                self.controllers[1].write(value);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write_register(addr, value),
            0x4018..=0x5FFF => {}
            0x6000..=0xFFFF => self.cartridge.borrow_mut().write(addr, value),
        }
    }

    /// 副作用のない読み込み（デバッガー・トレース用）
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[addr as usize % RAM_SIZE],
            0x2000..=0x3FFF => self.ppu.open_bus(),
            0x4000..=0x5FFF => self.open_bus,
            0x6000..=0xFFFF => self.cartridge.borrow().read(addr),
        }
    }

    pub fn read_noncontinuous_word(&mut self, a: u16, b: u16) -> u16 {
        (self.read(a) as u16) | ((self.read(b) as u16) << 8)
    }

    pub fn read_word(&mut self, addr: u16) -> u16 {
        self.read_noncontinuous_word(addr, addr.wrapping_add(1))
    }

    /// $4014: 256バイトをOAMへ転送する
    fn oam_dma(&mut self, page: u8) {
        self.dma_pending = true;
        self.oam_dma_count += 1;
        log::debug!("OAM DMA from ${:02X}00 at cycle {}", page, self.cycles);

        let base = (page as u16) << 8;
        self.ppu.dma_active = true;
        for i in 0..256 {
            let value = self.dma_read(base + i);
            self.ppu.write_oam_data(value);
        }
        self.ppu.dma_active = false;
    }

    /// DMA専用の読み込み経路。I/Oレジスタの副作用を起こさない
    fn dma_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[addr as usize % RAM_SIZE],
            0x2000..=0x3FFF => self.ppu.read_register(addr),
            0x4000..=0x5FFF => self.open_bus,
            0x6000..=0xFFFF => self.cartridge.borrow().read(addr),
        }
    }

    /// CPUサイクル分だけPPU(x3)とAPU(1/2)を進める。フレームが一周したらtrue。
    pub fn tick(&mut self, cycles: u32) -> bool {
        let mut frame_complete = false;
        for _ in 0..cycles {
            self.cycles += 1;
            for _ in 0..3 {
                frame_complete |= self.ppu.step();
            }
            if self.cycles % 2 == 0 {
                self.apu.step();
            }
        }
        frame_complete
    }

    pub fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        self.dma_pending = false;
    }
}
