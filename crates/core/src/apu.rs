//! # APU (Audio Processing Unit)
//! Register and timing contract of the 2A03 APU: two pulse channels and the
//! frame sequencer. Triangle, noise and DMC registers are accepted but ignored.
//!
//! `step` is called once per APU cycle (every second CPU cycle).

use std::collections::VecDeque;

pub const SAMPLE_RATE: f64 = 44_100.0;
const CPU_FREQUENCY: f64 = 1_789_773.0;
const APU_FREQUENCY: f64 = CPU_FREQUENCY / 2.0;
const MAX_QUEUED_SAMPLES: usize = 8192;

const PULSE_DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0], // 12.5%
    [0, 1, 1, 0, 0, 0, 0, 0], // 25%
    [0, 1, 1, 1, 1, 0, 0, 0], // 50%
    [1, 0, 0, 1, 1, 1, 1, 1], // 75% (inverted 25%)
];

const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

// Frame sequencer step points, in APU cycles
const STEP_1: u32 = 3729;
const STEP_2: u32 = 7457;
const STEP_3: u32 = 11186;
const STEP_4: u32 = 14915;
const STEP_5: u32 = 18641;

#[derive(Debug, Default, Clone)]
pub struct PulseChannel {
    enabled: bool,
    duty: u8,
    duty_position: u8,
    length_counter: u8,
    length_halt: bool,
    constant_volume: bool,
    volume: u8,
    envelope_start: bool,
    envelope_divider: u8,
    envelope_decay: u8,
    sweep_enabled: bool,
    sweep_period: u8,
    sweep_negate: bool,
    sweep_shift: u8,
    sweep_reload: bool,
    sweep_divider: u8,
    timer: u16,
    timer_period: u16,
    // 矩形波1はスイープの減算で追加の1を引く（1の補数）
    ones_complement: bool,
}

impl PulseChannel {
    fn new(ones_complement: bool) -> Self {
        Self {
            ones_complement,
            ..Default::default()
        }
    }

    pub fn length_counter(&self) -> u8 {
        self.length_counter
    }

    pub fn timer_period(&self) -> u16 {
        self.timer_period
    }

    fn write_control(&mut self, value: u8) {
        self.duty = (value >> 6) & 0x03;
        self.length_halt = value & 0x20 != 0;
        self.constant_volume = value & 0x10 != 0;
        self.volume = value & 0x0F;
    }

    fn write_sweep(&mut self, value: u8) {
        self.sweep_enabled = value & 0x80 != 0;
        self.sweep_period = (value >> 4) & 0x07;
        self.sweep_negate = value & 0x08 != 0;
        self.sweep_shift = value & 0x07;
        self.sweep_reload = true;
    }

    fn write_timer_low(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0x0700) | value as u16;
    }

    fn write_timer_high(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | (((value & 0x07) as u16) << 8);
        if self.enabled {
            self.length_counter = LENGTH_TABLE[(value >> 3) as usize];
        }
        self.envelope_start = true;
        self.duty_position = 0;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length_counter = 0;
        }
    }

    fn clock_timer(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            self.duty_position = (self.duty_position + 1) % 8;
        } else {
            self.timer -= 1;
        }
    }

    fn clock_envelope(&mut self) {
        if self.envelope_start {
            self.envelope_start = false;
            self.envelope_decay = 15;
            self.envelope_divider = self.volume;
        } else if self.envelope_divider == 0 {
            self.envelope_divider = self.volume;
            if self.envelope_decay > 0 {
                self.envelope_decay -= 1;
            } else if self.length_halt {
                self.envelope_decay = 15;
            }
        } else {
            self.envelope_divider -= 1;
        }
    }

    fn clock_length(&mut self) {
        if !self.length_halt && self.length_counter > 0 {
            self.length_counter -= 1;
        }
    }

    fn sweep_target(&self) -> u16 {
        let delta = self.timer_period >> self.sweep_shift;
        if self.sweep_negate {
            let extra = if self.ones_complement { 1 } else { 0 };
            self.timer_period.saturating_sub(delta + extra)
        } else {
            self.timer_period + delta
        }
    }

    fn clock_sweep(&mut self) {
        if self.sweep_divider == 0 && self.sweep_enabled && self.sweep_shift > 0 && !self.muted() {
            self.timer_period = self.sweep_target();
        }
        if self.sweep_divider == 0 || self.sweep_reload {
            self.sweep_divider = self.sweep_period;
            self.sweep_reload = false;
        } else {
            self.sweep_divider -= 1;
        }
    }

    fn muted(&self) -> bool {
        self.timer_period < 8 || self.sweep_target() > 0x7FF
    }

    fn output(&self) -> u8 {
        if !self.enabled || self.length_counter == 0 || self.muted() {
            return 0;
        }
        if PULSE_DUTY_TABLE[self.duty as usize][self.duty_position as usize] == 0 {
            return 0;
        }
        if self.constant_volume {
            self.volume
        } else {
            self.envelope_decay
        }
    }
}

#[derive(Debug, Default, Clone)]
struct FrameCounter {
    five_step: bool,
    irq_inhibit: bool,
    irq_pending: bool,
    cycle: u32,
}

pub struct Apu {
    pulse1: PulseChannel,
    pulse2: PulseChannel,
    frame_counter: FrameCounter,
    samples: VecDeque<f32>,
    sample_clock: f64,
    cycles: u64,
}

impl Apu {
    pub fn new() -> Self {
        Self {
            pulse1: PulseChannel::new(true),
            pulse2: PulseChannel::new(false),
            frame_counter: FrameCounter::default(),
            samples: VecDeque::with_capacity(MAX_QUEUED_SAMPLES),
            sample_clock: 0.0,
            cycles: 0,
        }
    }

    pub fn pulse1(&self) -> &PulseChannel {
        &self.pulse1
    }

    pub fn pulse2(&self) -> &PulseChannel {
        &self.pulse2
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// One APU cycle.
    pub fn step(&mut self) {
        self.cycles += 1;
        self.pulse1.clock_timer();
        self.pulse2.clock_timer();
        self.clock_frame_counter();

        self.sample_clock += SAMPLE_RATE;
        if self.sample_clock >= APU_FREQUENCY {
            self.sample_clock -= APU_FREQUENCY;
            if self.samples.len() == MAX_QUEUED_SAMPLES {
                self.samples.pop_front();
            }
            let sample = self.mix_output();
            self.samples.push_back(sample);
        }
    }

    fn clock_frame_counter(&mut self) {
        self.frame_counter.cycle += 1;
        match (self.frame_counter.cycle, self.frame_counter.five_step) {
            (STEP_1, _) | (STEP_3, _) => self.clock_quarter_frame(),
            (STEP_2, _) => {
                self.clock_quarter_frame();
                self.clock_half_frame();
            }
            (STEP_4, false) => {
                self.clock_quarter_frame();
                self.clock_half_frame();
                if !self.frame_counter.irq_inhibit {
                    self.frame_counter.irq_pending = true;
                }
                self.frame_counter.cycle = 0;
            }
            (STEP_5, true) => {
                self.clock_quarter_frame();
                self.clock_half_frame();
                self.frame_counter.cycle = 0;
            }
            _ => {}
        }
    }

    fn clock_quarter_frame(&mut self) {
        self.pulse1.clock_envelope();
        self.pulse2.clock_envelope();
    }

    fn clock_half_frame(&mut self) {
        self.pulse1.clock_length();
        self.pulse2.clock_length();
        self.pulse1.clock_sweep();
        self.pulse2.clock_sweep();
    }

    fn mix_output(&self) -> f32 {
        let pulse = self.pulse1.output() as f32 + self.pulse2.output() as f32;
        // 線形近似のミキサー
        0.00752 * pulse
    }

    pub fn read_register(&mut self, addr: u16) -> u8 {
        match addr {
            0x4015 => {
                let mut status = 0u8;
                if self.pulse1.length_counter > 0 {
                    status |= 0x01;
                }
                if self.pulse2.length_counter > 0 {
                    status |= 0x02;
                }
                if self.frame_counter.irq_pending {
                    status |= 0x40;
                }
                // Reading $4015 clears the frame interrupt flag
                self.frame_counter.irq_pending = false;
                status
            }
            _ => 0,
        }
    }

    pub fn write_register(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000 => self.pulse1.write_control(value),
            0x4001 => self.pulse1.write_sweep(value),
            0x4002 => self.pulse1.write_timer_low(value),
            0x4003 => self.pulse1.write_timer_high(value),
            0x4004 => self.pulse2.write_control(value),
            0x4005 => self.pulse2.write_sweep(value),
            0x4006 => self.pulse2.write_timer_low(value),
            0x4007 => self.pulse2.write_timer_high(value),
            0x4015 => {
                self.pulse1.set_enabled(value & 0x01 != 0);
                self.pulse2.set_enabled(value & 0x02 != 0);
            }
            0x4017 => {
                self.frame_counter.five_step = value & 0x80 != 0;
                self.frame_counter.irq_inhibit = value & 0x40 != 0;
                if self.frame_counter.irq_inhibit {
                    self.frame_counter.irq_pending = false;
                }
                self.frame_counter.cycle = 0;
                if self.frame_counter.five_step {
                    self.clock_quarter_frame();
                    self.clock_half_frame();
                }
            }
            // Triangle, noise and DMC ($4008-$4013)
            _ => {}
        }
    }

    /// Pull one mixed sample, oldest first.
    pub fn read_audio_sample(&mut self) -> Option<f32> {
        self.samples.pop_front()
    }

    pub fn drain_samples(&mut self) -> Vec<f32> {
        self.samples.drain(..).collect()
    }

    pub fn irq_pending(&self) -> bool {
        self.frame_counter.irq_pending
    }

    pub fn reset(&mut self) {
        self.pulse1.set_enabled(false);
        self.pulse2.set_enabled(false);
        self.frame_counter = FrameCounter::default();
        self.samples.clear();
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
