//! # PPU (Picture Processing Unit)
//!
//! スキャンライン/サイクルの状態機械。`step()`を1回呼ぶごとに1 PPUサイクル進み、
//! 可視領域では1ピクセルずつフレームバッファへ描画する。
//!
//! - scanline -1: プリレンダー
//! - scanline 0-239: 可視
//! - scanline 240: ポストレンダー
//! - scanline 241-260: VBlank

mod frame;
mod open_bus;
mod registers;
mod scroll;

pub use frame::{FrameBuffer, SCREEN_HEIGHT, SCREEN_WIDTH, SYSTEM_PALETTE};
pub use open_bus::OpenBus;
pub use registers::{Ctrl, Mask, SpriteAttribute, Status};
pub use scroll::{Loopy, ScrollUnit};

use crate::cartridge::Cartridge;
use std::cell::RefCell;
use std::rc::Rc;

pub const CYCLES_PER_SCANLINE: u16 = 341;
pub const SCANLINES_PER_FRAME: i16 = 262;
const LAST_CYCLE: u16 = 340;
const LAST_SCANLINE: i16 = 260;
const PRE_RENDER_SCANLINE: i16 = -1;
const VBLANK_SCANLINE: i16 = 241;
const SPRITE_EVALUATION_CYCLE: u16 = 65;
const MAX_SPRITES_PER_LINE: usize = 8;

/// 1ライン分のセカンダリOAM
#[derive(Debug, Clone, Copy)]
struct SpriteLine {
    secondary_oam: [u8; 32],
    indices: [u8; MAX_SPRITES_PER_LINE],
    count: usize,
}

impl SpriteLine {
    const EMPTY: SpriteLine = SpriteLine {
        secondary_oam: [0xFF; 32],
        indices: [0; MAX_SPRITES_PER_LINE],
        count: 0,
    };
}

/// スプライト1ピクセル分の評価結果
#[derive(Debug, Clone, Copy)]
struct SpritePixel {
    color: u8,
    palette: u8,
    behind_background: bool,
    sprite_zero: bool,
}

pub struct Ppu {
    ctrl: Ctrl,
    mask: Mask,
    status: Status,
    oam_addr: u8,
    oam: [u8; 256],
    /// 描画中のラインのスプライト
    line_sprites: SpriteLine,
    /// 次のライン用の評価結果。ライン先頭で`line_sprites`に移る
    next_sprites: SpriteLine,
    scroll: ScrollUnit,
    vram: [u8; 2048],
    palette: [u8; 32],
    read_buffer: u8,
    open_bus: OpenBus,
    scanline: i16,
    cycle: u16,
    frame: u64,
    frame_buffer: FrameBuffer,
    /// NMI出力ラッチ。ドライバーが`take_nmi`で消費する
    nmi: bool,
    /// OAM DMA中は$2007などの読み込みを副作用なしのオープンバスにする
    pub dma_active: bool,
    cartridge: Rc<RefCell<Cartridge>>,
}

impl Ppu {
    pub fn new(cartridge: Rc<RefCell<Cartridge>>) -> Self {
        Ppu {
            ctrl: Ctrl::default(),
            mask: Mask::default(),
            status: Status::default(),
            oam_addr: 0,
            oam: [0; 256],
            line_sprites: SpriteLine::EMPTY,
            next_sprites: SpriteLine::EMPTY,
            scroll: ScrollUnit::default(),
            vram: [0; 2048],
            palette: [0; 32],
            read_buffer: 0,
            open_bus: OpenBus::default(),
            scanline: PRE_RENDER_SCANLINE,
            cycle: 0,
            frame: 0,
            frame_buffer: FrameBuffer::new(),
            nmi: false,
            dma_active: false,
            cartridge,
        }
    }

    pub fn reset(&mut self) {
        self.ctrl = Ctrl::default();
        self.mask = Mask::default();
        self.scroll.reset_latch();
        self.read_buffer = 0;
        self.scanline = PRE_RENDER_SCANLINE;
        self.cycle = 0;
        self.nmi = false;
        self.line_sprites = SpriteLine::EMPTY;
        self.next_sprites = SpriteLine::EMPTY;
    }

    pub fn scanline(&self) -> i16 {
        self.scanline
    }

    pub fn cycle(&self) -> u16 {
        self.cycle
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn ctrl(&self) -> Ctrl {
        self.ctrl
    }

    pub fn mask(&self) -> Mask {
        self.mask
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn scroll(&self) -> &ScrollUnit {
        &self.scroll
    }

    pub fn oam(&self) -> &[u8; 256] {
        &self.oam
    }

    pub fn oam_addr(&self) -> u8 {
        self.oam_addr
    }

    /// 描画中のラインに載っているスプライト数
    pub fn sprite_count(&self) -> usize {
        self.line_sprites.count
    }

    pub fn open_bus(&self) -> u8 {
        self.open_bus.value()
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame_buffer
    }

    /// NMIが要求されていれば取り出してラッチを下ろす
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi)
    }

    /// 1 PPUサイクル進める。フレームが一周したらtrueを返す。
    pub fn step(&mut self) -> bool {
        let frame_complete = self.advance();
        self.open_bus.tick();

        let rendering = self.mask.rendering_enabled();
        let visible = (0..240).contains(&self.scanline);

        // プリレンダーラインではライン0を評価する
        if (PRE_RENDER_SCANLINE..240).contains(&self.scanline)
            && self.cycle == SPRITE_EVALUATION_CYCLE
        {
            self.evaluate_sprites(self.scanline + 1);
        }

        if visible {
            if self.cycle == 0 {
                self.line_sprites = self.next_sprites;
            }
            if (1..=256).contains(&self.cycle) {
                self.render_pixel();
                if rendering && (self.cycle - 1) % 8 == 7 {
                    self.scroll.increment_horizontal();
                }
                if rendering && self.cycle == 256 {
                    self.scroll.increment_vertical();
                }
            }
        }

        if rendering && self.scanline <= 239 && self.cycle == 257 {
            self.scroll.copy_horizontal();
        }
        if rendering && self.scanline == PRE_RENDER_SCANLINE && (280..=304).contains(&self.cycle) {
            self.scroll.copy_vertical();
        }

        if self.scanline == VBLANK_SCANLINE && self.cycle == 1 {
            self.status.set_vblank(true);
            if self.ctrl.generate_nmi() {
                self.nmi = true;
            }
        }
        if self.scanline == PRE_RENDER_SCANLINE && self.cycle == 1 {
            self.status.set_vblank(false);
            self.status.set_sprite_zero_hit(false);
            self.status.set_sprite_overflow(false);
        }

        frame_complete
    }

    fn advance(&mut self) -> bool {
        self.cycle += 1;
        if self.cycle <= LAST_CYCLE {
            return false;
        }
        self.cycle = 0;
        self.scanline += 1;
        if self.scanline <= LAST_SCANLINE {
            return false;
        }
        self.scanline = PRE_RENDER_SCANLINE;
        self.frame += 1;
        true
    }

    // ---- CPU側のレジスタ ----

    pub fn read_register(&mut self, addr: u16) -> u8 {
        if self.dma_active {
            return self.open_bus.value();
        }
        match addr & 0x0007 {
            2 => {
                let value = self.open_bus.refresh_masked(self.status.0, 0xE0);
                self.status.set_vblank(false);
                self.scroll.reset_latch();
                value
            }
            4 => {
                let value = self.read_oam_data();
                self.open_bus.refresh(value);
                value
            }
            7 => self.read_data(),
            // write-only registers
            _ => self.open_bus.value(),
        }
    }

    pub fn write_register(&mut self, addr: u16, value: u8) {
        self.open_bus.refresh(value);
        match addr & 0x0007 {
            0 => {
                let was_enabled = self.ctrl.generate_nmi();
                self.ctrl = Ctrl(value);
                self.scroll.write_ctrl(value);
                // VBlank中にNMIを有効にすると即座に発生する
                if !was_enabled && self.ctrl.generate_nmi() && self.status.vblank() {
                    self.nmi = true;
                }
            }
            1 => self.mask = Mask(value),
            2 => {}
            3 => self.oam_addr = value,
            4 => self.write_oam_data(value),
            5 => self.scroll.write_scroll(value),
            6 => self.scroll.write_addr(value),
            7 => {
                let addr = self.scroll.v.raw() & 0x3FFF;
                self.write_vram(addr, value);
                self.scroll.increment_address(self.ctrl.vram_increment());
            }
            _ => unreachable!(),
        }
    }

    fn read_oam_data(&self) -> u8 {
        let value = self.oam[self.oam_addr as usize];
        if self.oam_addr % 4 == 2 {
            value & SpriteAttribute::MASK
        } else {
            value
        }
    }

    /// $2004への書き込み（OAM DMAもここを通る）
    pub fn write_oam_data(&mut self, value: u8) {
        let value = if self.oam_addr % 4 == 2 {
            value & SpriteAttribute::MASK
        } else {
            value
        };
        self.oam[self.oam_addr as usize] = value;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    fn read_data(&mut self) -> u8 {
        let addr = self.scroll.v.raw() & 0x3FFF;
        let value = if addr >= 0x3F00 {
            // パレットは即値。バッファには裏のネームテーブルが入る
            self.read_buffer = self.read_vram(addr - 0x1000);
            let color = self.read_vram(addr) & 0x3F;
            self.open_bus.refresh_masked(color, 0x3F)
        } else {
            let buffered = self.read_buffer;
            self.read_buffer = self.read_vram(addr);
            self.open_bus.refresh(buffered);
            buffered
        };
        self.scroll.increment_address(self.ctrl.vram_increment());
        value
    }

    // ---- PPUバス ----

    fn read_vram(&self, addr: u16) -> u8 {
        match addr & 0x3FFF {
            addr @ 0x0000..=0x1FFF => self.cartridge.borrow().read_chr(addr),
            addr @ 0x2000..=0x3EFF => {
                let index = self.cartridge.borrow().mirroring().nametable_index(addr);
                self.vram[index]
            }
            addr @ 0x3F00..=0x3FFF => self.palette[palette_index(addr)],
            _ => unreachable!(),
        }
    }

    fn write_vram(&mut self, addr: u16, value: u8) {
        match addr & 0x3FFF {
            addr @ 0x0000..=0x1FFF => self.cartridge.borrow_mut().write_chr(addr, value),
            addr @ 0x2000..=0x3EFF => {
                let index = self.cartridge.borrow().mirroring().nametable_index(addr);
                self.vram[index] = value;
            }
            addr @ 0x3F00..=0x3FFF => self.palette[palette_index(addr)] = value & 0x3F,
            _ => unreachable!(),
        }
    }

    // ---- 描画 ----

    /// `target`ラインに載るスプライトを`next_sprites`へ集める
    fn evaluate_sprites(&mut self, target: i16) {
        let mut line = SpriteLine::EMPTY;
        if self.mask.rendering_enabled() {
            let height = self.ctrl.sprite_height();
            for index in 0..64 {
                let y = self.oam[index * 4] as i16;
                let row = target - y - 1;
                if !(0..height).contains(&row) {
                    continue;
                }
                if line.count == MAX_SPRITES_PER_LINE {
                    self.status.set_sprite_overflow(true);
                    break;
                }
                let slot = line.count * 4;
                line.secondary_oam[slot..slot + 4]
                    .copy_from_slice(&self.oam[index * 4..index * 4 + 4]);
                line.indices[line.count] = index as u8;
                line.count += 1;
            }
        }
        self.next_sprites = line;
    }

    fn render_pixel(&mut self) {
        let x = (self.cycle - 1) as usize;
        let y = self.scanline as usize;

        if !self.mask.rendering_enabled() {
            let backdrop = self.palette_color(0);
            self.frame_buffer.set_pixel(x, y, backdrop);
            return;
        }

        let (background, background_palette) =
            if self.mask.show_background() && (x >= 8 || self.mask.show_background_left()) {
                self.background_pixel(x)
            } else {
                (0, 0)
            };
        let sprite = if self.mask.show_sprites() && (x >= 8 || self.mask.show_sprites_left()) {
            self.sprite_pixel(x)
        } else {
            None
        };

        if let Some(sprite) = sprite {
            if sprite.sprite_zero
                && background != 0
                && x != 255
                && self.mask.show_background()
                && self.mask.show_sprites()
            {
                self.status.set_sprite_zero_hit(true);
            }
        }

        let index = match sprite {
            Some(s) if background == 0 || !s.behind_background => {
                0x10 | (s.palette << 2) | s.color
            }
            _ if background != 0 => (background_palette << 2) | background,
            _ => 0,
        };
        let color = self.palette_color(index);
        self.frame_buffer.set_pixel(x, y, color);
    }

    /// (2ビットのカラー番号, パレット番号)
    fn background_pixel(&self, x: usize) -> (u8, u8) {
        let fine = (x as u8 & 0x07) + self.scroll.x;
        let mut v = self.scroll.v;
        if fine >= 8 {
            // fine Xで次のタイルにはみ出した
            v.increment_horizontal();
        }
        let bit = fine & 0x07;

        let tile = self.read_vram(v.tile_address()) as u16;
        let attribute = self.read_vram(v.attribute_address());
        let shift = ((v.coarse_y() & 0x02) << 1) | (v.coarse_x() & 0x02);
        let palette = (attribute >> shift) & 0x03;

        let pattern = self.ctrl.background_pattern_base() + tile * 16 + v.fine_y();
        let lo = self.read_vram(pattern);
        let hi = self.read_vram(pattern + 8);
        let color = ((lo >> (7 - bit)) & 1) | (((hi >> (7 - bit)) & 1) << 1);
        (color, palette)
    }

    fn sprite_pixel(&self, x: usize) -> Option<SpritePixel> {
        let height = self.ctrl.sprite_height();
        let line = &self.line_sprites;
        for slot in 0..line.count {
            let sprite = &line.secondary_oam[slot * 4..slot * 4 + 4];
            let sprite_x = sprite[3] as usize;
            if x < sprite_x || x >= sprite_x + 8 {
                continue;
            }
            let mut row = self.scanline - sprite[0] as i16 - 1;
            if !(0..height).contains(&row) {
                continue;
            }
            let attribute = SpriteAttribute(sprite[2]);
            if attribute.flip_vertical() {
                row = height - 1 - row;
            }
            let mut column = (x - sprite_x) as u8;
            if attribute.flip_horizontal() {
                column = 7 - column;
            }

            let tile = sprite[1] as u16;
            let pattern = if height == 16 {
                let table = (tile & 0x01) * 0x1000;
                let tile = (tile & 0xFE) + (row >= 8) as u16;
                table + tile * 16 + (row as u16 & 0x07)
            } else {
                self.ctrl.sprite_pattern_base() + tile * 16 + row as u16
            };
            let lo = self.read_vram(pattern);
            let hi = self.read_vram(pattern + 8);
            let color = ((lo >> (7 - column)) & 1) | (((hi >> (7 - column)) & 1) << 1);
            if color == 0 {
                continue;
            }
            return Some(SpritePixel {
                color,
                palette: attribute.palette(),
                behind_background: attribute.behind_background(),
                sprite_zero: line.indices[slot] == 0,
            });
        }
        None
    }

    fn palette_color(&self, index: u8) -> u32 {
        let mut entry = self.palette[palette_index(0x3F00 | index as u16)];
        if self.mask.greyscale() {
            entry &= 0x30;
        }
        SYSTEM_PALETTE[(entry & 0x3F) as usize]
    }
}

/// $3F10/$3F14/$3F18/$3F1Cは$3F00/$3F04/$3F08/$3F0Cのミラー
fn palette_index(addr: u16) -> usize {
    let index = (addr & 0x1F) as usize;
    if index >= 0x10 && index % 4 == 0 {
        index - 0x10
    } else {
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::test_rom::ines_image;
    use crate::cartridge::PRG_BANK_SIZE;

    fn new_ppu() -> Ppu {
        // CHR RAM, horizontal mirroring
        let image = ines_image(&[0; PRG_BANK_SIZE], &[], 0, 0x00);
        let cartridge = Cartridge::from_ines(&image).unwrap();
        Ppu::new(Rc::new(RefCell::new(cartridge)))
    }

    fn run_until(ppu: &mut Ppu, scanline: i16, cycle: u16) {
        while !(ppu.scanline() == scanline && ppu.cycle() == cycle) {
            ppu.step();
        }
    }

    fn set_addr(ppu: &mut Ppu, addr: u16) {
        ppu.write_register(0x2006, (addr >> 8) as u8);
        ppu.write_register(0x2006, addr as u8);
    }

    fn write_bytes(ppu: &mut Ppu, addr: u16, bytes: &[u8]) {
        set_addr(ppu, addr);
        for &b in bytes {
            ppu.write_register(0x2007, b);
        }
    }

    /// タイル1の全行をplane0=`row`で埋め、ネームテーブル0をタイル1で埋める
    fn setup_background(ppu: &mut Ppu, row: u8) {
        write_bytes(ppu, 0x0010, &[row; 8]);
        write_bytes(ppu, 0x0018, &[0; 8]);
        write_bytes(ppu, 0x2000, &[1; 960]);
        write_bytes(ppu, 0x23C0, &[0; 64]);
        // backdrop black, bg palette 0 color 1 white
        write_bytes(ppu, 0x3F00, &[0x0F, 0x30]);
        set_addr(ppu, 0x0000);
    }

    #[test]
    fn test_frame_timing_returns_to_pre_render() {
        let mut ppu = new_ppu();
        let total = CYCLES_PER_SCANLINE as usize * SCANLINES_PER_FRAME as usize;
        for i in 0..total {
            let done = ppu.step();
            assert_eq!(done, i == total - 1);
        }
        assert_eq!((ppu.scanline(), ppu.cycle()), (-1, 0));
        assert_eq!(ppu.frame(), 1);
    }

    #[test]
    fn test_vblank_set_and_cleared_at_exact_dots() {
        let mut ppu = new_ppu();
        run_until(&mut ppu, 241, 0);
        assert!(!ppu.status().vblank());
        ppu.step();
        assert!(ppu.status().vblank());

        run_until(&mut ppu, -1, 0);
        assert!(ppu.status().vblank());
        ppu.step();
        assert!(!ppu.status().vblank());
    }

    #[test]
    fn test_status_read_clears_vblank_and_latch() {
        let mut ppu = new_ppu();
        run_until(&mut ppu, 241, 1);
        ppu.write_register(0x2005, 0x1F);
        assert!(ppu.scroll().w);

        let value = ppu.read_register(0x2002);
        // 下位5ビットはオープンバス
        assert_eq!(value, 0x80 | 0x1F);
        assert!(!ppu.status().vblank());
        assert!(!ppu.scroll().w);
        assert_eq!(ppu.read_register(0x200A) & 0x80, 0);
    }

    #[test]
    fn test_nmi_on_vblank_and_on_late_enable() {
        let mut ppu = new_ppu();
        ppu.write_register(0x2000, 0x80);
        run_until(&mut ppu, 241, 1);
        assert!(ppu.take_nmi());
        assert!(!ppu.take_nmi());

        ppu.write_register(0x2000, 0x00);
        ppu.write_register(0x2000, 0x80);
        assert!(ppu.take_nmi());
    }

    #[test]
    fn test_no_nmi_when_disabled() {
        let mut ppu = new_ppu();
        run_until(&mut ppu, 241, 2);
        assert!(!ppu.take_nmi());
    }

    #[test]
    fn test_data_reads_are_buffered() {
        let mut ppu = new_ppu();
        write_bytes(&mut ppu, 0x2000, &[0x11, 0x22]);
        set_addr(&mut ppu, 0x2000);
        assert_eq!(ppu.read_register(0x2007), 0x00);
        assert_eq!(ppu.read_register(0x2007), 0x11);
        assert_eq!(ppu.read_register(0x2007), 0x22);
    }

    #[test]
    fn test_palette_reads_are_immediate_and_mirrored() {
        let mut ppu = new_ppu();
        write_bytes(&mut ppu, 0x2F00, &[0x5A]);
        write_bytes(&mut ppu, 0x3F10, &[0x2C]);
        set_addr(&mut ppu, 0x3F00);
        assert_eq!(ppu.read_register(0x2007) & 0x3F, 0x2C);
        // バッファには$2F00が入っている
        set_addr(&mut ppu, 0x2000);
        assert_eq!(ppu.read_register(0x2007), 0x5A);
    }

    #[test]
    fn test_palette_read_upper_bits_from_open_bus() {
        let mut ppu = new_ppu();
        write_bytes(&mut ppu, 0x3F01, &[0x21]);
        set_addr(&mut ppu, 0x3F01);
        ppu.write_register(0x2003, 0xC0);
        assert_eq!(ppu.read_register(0x2007), 0xC0 | 0x21);
    }

    #[test]
    fn test_increment_by_32() {
        let mut ppu = new_ppu();
        ppu.write_register(0x2000, 0x04);
        set_addr(&mut ppu, 0x2000);
        ppu.write_register(0x2007, 0xAB);
        assert_eq!(ppu.scroll().v.raw(), 0x2020);
    }

    #[test]
    fn test_oam_attribute_bits_masked() {
        let mut ppu = new_ppu();
        ppu.write_register(0x2003, 0x00);
        for value in [0x10, 0x20, 0xFF, 0x40] {
            ppu.write_register(0x2004, value);
        }
        assert_eq!(ppu.oam()[2], 0xE3);
        assert_eq!(ppu.oam_addr(), 4);
        ppu.write_register(0x2003, 0x02);
        assert_eq!(ppu.read_register(0x2004), 0xE3);
    }

    #[test]
    fn test_write_only_registers_return_open_bus() {
        let mut ppu = new_ppu();
        ppu.write_register(0x2001, 0x00);
        ppu.write_register(0x2003, 0x5C);
        assert_eq!(ppu.read_register(0x2000), 0x5C);
        assert_eq!(ppu.read_register(0x2005), 0x5C);
        assert_eq!(ppu.read_register(0x3FFE), 0x5C);
    }

    #[test]
    fn test_dma_active_reads_open_bus_without_side_effects() {
        let mut ppu = new_ppu();
        write_bytes(&mut ppu, 0x2000, &[0x99]);
        set_addr(&mut ppu, 0x2000);
        ppu.write_register(0x2003, 0x20);
        ppu.dma_active = true;
        let v = ppu.scroll().v.raw();
        assert_eq!(ppu.read_register(0x2007), 0x20);
        assert_eq!(ppu.scroll().v.raw(), v);
        ppu.dma_active = false;
    }

    #[test]
    fn test_sprite_overflow_on_ninth_sprite() {
        let mut ppu = new_ppu();
        ppu.write_register(0x2003, 0x00);
        for i in 0..9 {
            for value in [20, 0, 0, i * 8] {
                ppu.write_register(0x2004, value);
            }
        }
        ppu.write_register(0x2001, 0x18);
        run_until(&mut ppu, 21, 66);
        assert_eq!(ppu.sprite_count(), 8);
        assert!(ppu.status().sprite_overflow());
    }

    #[test]
    fn test_background_pixel_and_fine_x_scroll() {
        let mut ppu = new_ppu();
        // 左4ピクセル透明、右4ピクセル不透明
        setup_background(&mut ppu, 0x0F);
        ppu.write_register(0x2001, 0x0A);
        run_until(&mut ppu, 0, 257);
        let frame = ppu.frame_buffer();
        assert_eq!(frame.pixel(0, 0), SYSTEM_PALETTE[0x0F]);
        assert_eq!(frame.pixel(4, 0), SYSTEM_PALETTE[0x30]);
        assert_eq!(frame.pixel(12, 0), SYSTEM_PALETTE[0x30]);

        // fine X = 4
        let mut ppu = new_ppu();
        setup_background(&mut ppu, 0x0F);
        ppu.write_register(0x2005, 0x04);
        ppu.write_register(0x2005, 0x00);
        ppu.write_register(0x2001, 0x0A);
        run_until(&mut ppu, 0, 257);
        let frame = ppu.frame_buffer();
        assert_eq!(frame.pixel(0, 0), SYSTEM_PALETTE[0x30]);
        assert_eq!(frame.pixel(4, 0), SYSTEM_PALETTE[0x0F]);
    }

    #[test]
    fn test_left_column_clipping() {
        let mut ppu = new_ppu();
        setup_background(&mut ppu, 0xFF);
        ppu.write_register(0x2001, 0x08);
        run_until(&mut ppu, 0, 257);
        assert_eq!(ppu.frame_buffer().pixel(7, 0), SYSTEM_PALETTE[0x0F]);
        assert_eq!(ppu.frame_buffer().pixel(8, 0), SYSTEM_PALETTE[0x30]);
    }

    #[test]
    fn test_greyscale() {
        let mut ppu = new_ppu();
        setup_background(&mut ppu, 0xFF);
        write_bytes(&mut ppu, 0x3F01, &[0x16]);
        set_addr(&mut ppu, 0x0000);
        ppu.write_register(0x2001, 0x0B);
        run_until(&mut ppu, 0, 257);
        assert_eq!(ppu.frame_buffer().pixel(0, 0), SYSTEM_PALETTE[0x10]);
    }

    #[test]
    fn test_sprite_zero_hit() {
        let mut ppu = new_ppu();
        setup_background(&mut ppu, 0xFF);
        // sprite 0 at (100, 30) with the solid tile 1
        ppu.write_register(0x2003, 0x00);
        for value in [30, 1, 0, 100] {
            ppu.write_register(0x2004, value);
        }
        ppu.write_register(0x2001, 0x1E);

        run_until(&mut ppu, 31, 100);
        assert!(!ppu.status().sprite_zero_hit());
        ppu.step();
        assert!(ppu.status().sprite_zero_hit());

        // プリレンダーでクリアされる
        run_until(&mut ppu, -1, 1);
        assert!(!ppu.status().sprite_zero_hit());
    }

    #[test]
    fn test_sprite_in_front_of_background() {
        let mut ppu = new_ppu();
        setup_background(&mut ppu, 0x00);
        // sprite palette 0 color 1 = red
        write_bytes(&mut ppu, 0x3F11, &[0x16]);
        set_addr(&mut ppu, 0x0000);
        ppu.write_register(0x2003, 0x00);
        for value in [9, 1, 0, 120] {
            ppu.write_register(0x2004, value);
        }
        ppu.write_register(0x2001, 0x1E);
        run_until(&mut ppu, 10, 257);
        assert_eq!(ppu.frame_buffer().pixel(120, 10), SYSTEM_PALETTE[0x16]);
        assert_eq!(ppu.frame_buffer().pixel(128, 10), SYSTEM_PALETTE[0x0F]);
    }

    /// 背景は透明、スプライトパレット0の色1=赤, 色2=緑
    fn setup_sprites(ppu: &mut Ppu, sprites: &[[u8; 4]]) {
        setup_background(ppu, 0x00);
        write_bytes(ppu, 0x3F11, &[0x16, 0x2A]);
        ppu.write_register(0x2003, 0x00);
        for sprite in sprites {
            for &value in sprite {
                ppu.write_register(0x2004, value);
            }
        }
        // 残りは画面外へ
        for _ in sprites.len()..64 {
            for value in [0xFF, 0, 0, 0] {
                ppu.write_register(0x2004, value);
            }
        }
        set_addr(ppu, 0x0000);
    }

    /// `tile`の8行を`plane0`/`plane1`で埋める
    fn write_tile(ppu: &mut Ppu, tile: u16, plane0: [u8; 8], plane1: [u8; 8]) {
        write_bytes(ppu, tile * 16, &plane0);
        write_bytes(ppu, tile * 16 + 8, &plane1);
    }

    #[test]
    fn test_sprite_drawn_on_first_row_left_of_evaluation_cycle() {
        let mut ppu = new_ppu();
        write_tile(&mut ppu, 2, [0xFF; 8], [0; 8]);
        setup_sprites(&mut ppu, &[[30, 2, 0, 10]]);
        ppu.write_register(0x2001, 0x1E);
        run_until(&mut ppu, 31, 257);
        let frame = ppu.frame_buffer();
        assert_eq!(frame.pixel(10, 30), SYSTEM_PALETTE[0x0F]);
        assert_eq!(frame.pixel(10, 31), SYSTEM_PALETTE[0x16]);
        assert_eq!(frame.pixel(17, 31), SYSTEM_PALETTE[0x16]);
        assert_eq!(frame.pixel(18, 31), SYSTEM_PALETTE[0x0F]);
    }

    #[test]
    fn test_sprite_zero_hit_on_first_row_at_low_x() {
        let mut ppu = new_ppu();
        setup_background(&mut ppu, 0xFF);
        ppu.write_register(0x2003, 0x00);
        for value in [30, 1, 0, 20] {
            ppu.write_register(0x2004, value);
        }
        ppu.write_register(0x2001, 0x1E);

        run_until(&mut ppu, 31, 20);
        assert!(!ppu.status().sprite_zero_hit());
        ppu.step();
        assert!(ppu.status().sprite_zero_hit());
    }

    #[test]
    fn test_sprite_y_is_offset_by_one_line() {
        let mut ppu = new_ppu();
        write_tile(&mut ppu, 2, [0xFF; 8], [0; 8]);
        // Y=$FF never reaches the screen
        setup_sprites(&mut ppu, &[[0xFF, 2, 0, 0]]);
        ppu.write_register(0x2001, 0x1E);
        run_until(&mut ppu, 0, 257);
        assert_eq!(ppu.frame_buffer().pixel(0, 0), SYSTEM_PALETTE[0x0F]);

        let mut ppu = new_ppu();
        write_tile(&mut ppu, 2, [0xFF; 8], [0; 8]);
        setup_sprites(&mut ppu, &[[0x00, 2, 0, 0]]);
        ppu.write_register(0x2001, 0x1E);
        run_until(&mut ppu, 1, 257);
        assert_eq!(ppu.frame_buffer().pixel(0, 0), SYSTEM_PALETTE[0x0F]);
        assert_eq!(ppu.frame_buffer().pixel(0, 1), SYSTEM_PALETTE[0x16]);
    }

    #[test]
    fn test_sprite_horizontal_flip() {
        let mut ppu = new_ppu();
        // 左端の1列だけ不透明
        write_tile(&mut ppu, 2, [0x80; 8], [0; 8]);
        setup_sprites(&mut ppu, &[[19, 2, 0x00, 40], [29, 2, 0x40, 40]]);
        ppu.write_register(0x2001, 0x1E);
        run_until(&mut ppu, 30, 257);
        let frame = ppu.frame_buffer();
        assert_eq!(frame.pixel(40, 20), SYSTEM_PALETTE[0x16]);
        assert_eq!(frame.pixel(47, 20), SYSTEM_PALETTE[0x0F]);
        assert_eq!(frame.pixel(40, 30), SYSTEM_PALETTE[0x0F]);
        assert_eq!(frame.pixel(47, 30), SYSTEM_PALETTE[0x16]);
    }

    #[test]
    fn test_sprite_vertical_flip() {
        let mut ppu = new_ppu();
        // 最上段の1行だけ不透明
        write_tile(&mut ppu, 3, [0xFF, 0, 0, 0, 0, 0, 0, 0], [0; 8]);
        setup_sprites(&mut ppu, &[[49, 3, 0x00, 80], [59, 3, 0x80, 80]]);
        ppu.write_register(0x2001, 0x1E);
        run_until(&mut ppu, 67, 257);
        let frame = ppu.frame_buffer();
        assert_eq!(frame.pixel(80, 50), SYSTEM_PALETTE[0x16]);
        assert_eq!(frame.pixel(80, 57), SYSTEM_PALETTE[0x0F]);
        assert_eq!(frame.pixel(80, 60), SYSTEM_PALETTE[0x0F]);
        assert_eq!(frame.pixel(80, 67), SYSTEM_PALETTE[0x16]);
    }

    #[test]
    fn test_8x16_sprites_use_tile_pair() {
        let mut ppu = new_ppu();
        // tile 4 = color 1 (上半分), tile 5 = color 2 (下半分)
        write_tile(&mut ppu, 4, [0xFF; 8], [0; 8]);
        write_tile(&mut ppu, 5, [0; 8], [0xFF; 8]);
        setup_sprites(&mut ppu, &[[99, 4, 0x00, 16], [129, 4, 0x80, 16]]);
        ppu.write_register(0x2000, 0x20);
        ppu.write_register(0x2001, 0x1E);
        run_until(&mut ppu, 146, 257);
        let frame = ppu.frame_buffer();
        assert_eq!(frame.pixel(16, 100), SYSTEM_PALETTE[0x16]);
        assert_eq!(frame.pixel(16, 107), SYSTEM_PALETTE[0x16]);
        assert_eq!(frame.pixel(16, 108), SYSTEM_PALETTE[0x2A]);
        assert_eq!(frame.pixel(16, 115), SYSTEM_PALETTE[0x2A]);
        assert_eq!(frame.pixel(16, 116), SYSTEM_PALETTE[0x0F]);
        // 縦反転は16行全体で入れ替わる
        assert_eq!(frame.pixel(16, 130), SYSTEM_PALETTE[0x2A]);
        assert_eq!(frame.pixel(16, 145), SYSTEM_PALETTE[0x16]);
        assert_eq!(frame.pixel(16, 146), SYSTEM_PALETTE[0x0F]);
    }

    #[test]
    fn test_rendering_copies_t_into_v() {
        let mut ppu = new_ppu();
        ppu.write_register(0x2000, 0x01);
        ppu.write_register(0x2005, 0x08);
        ppu.write_register(0x2005, 0x00);
        ppu.write_register(0x2001, 0x08);
        run_until(&mut ppu, -1, 305);
        // coarse X = 1, nametable = 1 after the pre-render copies
        assert_eq!(ppu.scroll().v.coarse_x(), 1);
        assert_eq!(ppu.scroll().v.nametable(), 1);
    }

    #[test]
    fn test_palette_index_mirrors() {
        assert_eq!(palette_index(0x3F10), 0x00);
        assert_eq!(palette_index(0x3F14), 0x04);
        assert_eq!(palette_index(0x3F1C), 0x0C);
        assert_eq!(palette_index(0x3F11), 0x11);
        assert_eq!(palette_index(0x3F20), 0x00);
    }
}
