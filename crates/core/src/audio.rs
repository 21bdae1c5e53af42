//! # オーディオリングバッファ
//! エミュレーションスレッドと出力コールバックの境界に置く有界キュー。
//! 溢れたら新しいサンプルを捨て、空になったら最後の出力値を無音へ減衰させる。

use std::collections::VecDeque;

/// 約0.19秒分 (44.1kHz)
pub const DEFAULT_CAPACITY: usize = 8192;

/// アンダーラン時に1サンプルごとに掛ける係数
const FADE_FACTOR: f32 = 0.995;
const SILENCE_THRESHOLD: f32 = 1.0e-4;

#[derive(Debug, Clone)]
pub struct AudioRing {
    samples: VecDeque<f32>,
    capacity: usize,
    last: f32,
    dropped: u64,
    underruns: u64,
}

impl AudioRing {
    pub fn new(capacity: usize) -> Self {
        AudioRing {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            last: 0.0,
            dropped: 0,
            underruns: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 満杯で捨てたサンプル数
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    /// 満杯なら捨ててfalse
    pub fn push(&mut self, sample: f32) -> bool {
        if self.samples.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.samples.push_back(sample);
        true
    }

    pub fn extend(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.push(sample);
        }
    }

    /// 空のときは直前の値を減衰させて返す（プチノイズ防止）
    pub fn pop(&mut self) -> f32 {
        match self.samples.pop_front() {
            Some(sample) => {
                self.last = sample;
                sample
            }
            None => {
                self.underruns += 1;
                self.last *= FADE_FACTOR;
                if self.last.abs() < SILENCE_THRESHOLD {
                    self.last = 0.0;
                }
                self.last
            }
        }
    }

    /// 出力コールバック用
    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.pop();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.last = 0.0;
    }
}

impl Default for AudioRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
