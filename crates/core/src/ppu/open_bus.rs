//! PPUのオープンバス（I/Oラッチ）
//! 未接続のデータ線は容量で値を保持し、一定時間リフレッシュされないとビットごとに0へ落ちる。

/// ビットごとの減衰までのPPUサイクル数
const DECAY_CYCLES: [u32; 8] = [
    180_000, 180_000, 180_000, 180_000, 300_000, 600_000, 600_000, 600_000,
];

#[derive(Debug, Clone, Default)]
pub struct OpenBus {
    value: u8,
    timers: [u32; 8],
}

impl OpenBus {
    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn refresh(&mut self, value: u8) {
        self.refresh_masked(value, 0xFF);
    }

    /// `mask`のビットだけを`value`で駆動し、ラッチ全体を返す
    pub fn refresh_masked(&mut self, value: u8, mask: u8) -> u8 {
        for bit in 0..8 {
            let flag = 1u8 << bit;
            if mask & flag != 0 {
                self.value = (self.value & !flag) | (value & flag);
                self.timers[bit] = 0;
            }
        }
        self.value
    }

    /// 1 PPUサイクル
    pub fn tick(&mut self) {
        if self.value == 0 {
            return;
        }
        for bit in 0..8 {
            let flag = 1u8 << bit;
            if self.value & flag == 0 {
                continue;
            }
            self.timers[bit] += 1;
            if self.timers[bit] >= DECAY_CYCLES[bit] {
                self.value &= !flag;
                self.timers[bit] = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick_n(bus: &mut OpenBus, n: u32) {
        for _ in 0..n {
            bus.tick();
        }
    }

    #[test]
    fn test_bits_decay_at_their_own_thresholds() {
        let mut bus = OpenBus::default();
        bus.refresh(0xFF);
        tick_n(&mut bus, 179_999);
        assert_eq!(bus.value(), 0xFF);
        bus.tick();
        assert_eq!(bus.value(), 0xF0);
        tick_n(&mut bus, 300_000 - 180_000);
        assert_eq!(bus.value(), 0xE0);
        tick_n(&mut bus, 600_000 - 300_000);
        assert_eq!(bus.value(), 0x00);
    }

    #[test]
    fn test_refresh_resets_timers() {
        let mut bus = OpenBus::default();
        bus.refresh(0x01);
        tick_n(&mut bus, 179_000);
        bus.refresh(0x01);
        tick_n(&mut bus, 179_000);
        assert_eq!(bus.value(), 0x01);
    }

    #[test]
    fn test_masked_refresh_keeps_other_bits() {
        let mut bus = OpenBus::default();
        bus.refresh(0x1F);
        assert_eq!(bus.refresh_masked(0xA0, 0xE0), 0xBF);
        assert_eq!(bus.refresh_masked(0x00, 0xE0), 0x1F);
    }
}
