//! フレームバッファとシステムパレット

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;

/// 2C02のカラーインデックス -> 0xRRGGBB
#[rustfmt::skip]
pub const SYSTEM_PALETTE: [u32; 64] = [
    0x808080, 0x003DA6, 0x0012B0, 0x440096, 0xA1005E, 0xC70028, 0xBA0600, 0x8C1700,
    0x5C2F00, 0x104500, 0x054A00, 0x00472E, 0x004166, 0x000000, 0x050505, 0x050505,
    0xC7C7C7, 0x0077FF, 0x2155FF, 0x8237FA, 0xEB2FB5, 0xFF2950, 0xFF2200, 0xD63200,
    0xC46200, 0x358000, 0x058F00, 0x008A55, 0x0099CC, 0x212121, 0x090909, 0x090909,
    0xFFFFFF, 0x0FD7FF, 0x69A2FF, 0xD480FF, 0xFF45F3, 0xFF618B, 0xFF8833, 0xFF9C12,
    0xFABC20, 0x9FE30E, 0x2BF035, 0x0CF0A4, 0x05FBFF, 0x5E5E5E, 0x0D0D0D, 0x0D0D0D,
    0xFFFFFF, 0xA6FCFF, 0xB3ECFF, 0xDAABEB, 0xFFA8F9, 0xFFABB3, 0xFFD2B0, 0xFFEFA6,
    0xFFF79C, 0xD7E895, 0xA6EDAF, 0xA2F2DA, 0x99FFFC, 0xDDDDDD, 0x111111, 0x111111,
];

/// 256x240 RGBA8888
#[derive(Clone)]
pub struct FrameBuffer {
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        let mut pixels = vec![0; SCREEN_WIDTH * SCREEN_HEIGHT * 4];
        for alpha in pixels.iter_mut().skip(3).step_by(4) {
            *alpha = 0xFF;
        }
        FrameBuffer { pixels }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        debug_assert!(x < SCREEN_WIDTH && y < SCREEN_HEIGHT);
        let offset = (y * SCREEN_WIDTH + x) * 4;
        self.pixels[offset] = (color >> 16) as u8;
        self.pixels[offset + 1] = (color >> 8) as u8;
        self.pixels[offset + 2] = color as u8;
        self.pixels[offset + 3] = 0xFF;
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        let offset = (y * SCREEN_WIDTH + x) * 4;
        ((self.pixels[offset] as u32) << 16)
            | ((self.pixels[offset + 1] as u32) << 8)
            | self.pixels[offset + 2] as u32
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.pixels
    }

    /// バイナリPPM (P6) に書き出す
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = format!("P6\n{} {}\n255\n", SCREEN_WIDTH, SCREEN_HEIGHT).into_bytes();
        out.reserve(SCREEN_WIDTH * SCREEN_HEIGHT * 3);
        for rgba in self.pixels.chunks_exact(4) {
            out.extend_from_slice(&rgba[..3]);
        }
        out
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
