//! # Mapper
//! Address translation for cartridge boards. Each variant turns a CPU or PPU
//! address into an offset inside the cartridge's PRG/CHR storage; the
//! cartridge itself owns the bytes.

use crate::cartridge::{Mirroring, CHR_BANK_SIZE, PRG_BANK_SIZE};

#[derive(Debug, Clone)]
pub enum Mapper {
    Nrom(Nrom),
    Mmc1(Mmc1),
}

impl Mapper {
    /// Unsupported boards fall back to NROM.
    pub fn new(id: u8, prg_banks: usize) -> Self {
        match id {
            0 => Mapper::Nrom(Nrom::new(prg_banks)),
            1 => Mapper::Mmc1(Mmc1::new(prg_banks)),
            _ => {
                log::warn!("Unsupported mapper {}, falling back to NROM", id);
                Mapper::Nrom(Nrom::new(prg_banks))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mapper::Nrom(_) => "NROM",
            Mapper::Mmc1(_) => "MMC1",
        }
    }

    /// $8000-$FFFF -> PRG ROM offset
    pub fn map_prg(&self, addr: u16) -> usize {
        match self {
            Mapper::Nrom(m) => m.map_prg(addr),
            Mapper::Mmc1(m) => m.map_prg(addr),
        }
    }

    /// $0000-$1FFF -> CHR offset
    pub fn map_chr(&self, addr: u16) -> usize {
        match self {
            Mapper::Nrom(_) => (addr & 0x1FFF) as usize,
            Mapper::Mmc1(m) => m.map_chr(addr),
        }
    }

    pub fn write_register(&mut self, addr: u16, value: u8) {
        match self {
            Mapper::Nrom(_) => {}
            Mapper::Mmc1(m) => m.write(addr, value),
        }
    }

    /// `None` means the header's hard-wired mirroring applies.
    pub fn mirroring(&self) -> Option<Mirroring> {
        match self {
            Mapper::Nrom(_) => None,
            Mapper::Mmc1(m) => Some(m.mirroring()),
        }
    }
}

/// Mapper 0: 16KB images are mirrored into $C000, 32KB images are mapped flat.
/// Larger images (unsupported boards falling back here) get bank 0 at $8000
/// and the last bank at $C000 so the vectors come from the last bank.
#[derive(Debug, Clone)]
pub struct Nrom {
    prg_banks: usize,
}

impl Nrom {
    pub fn new(prg_banks: usize) -> Self {
        Nrom { prg_banks }
    }

    fn map_prg(&self, addr: u16) -> usize {
        if self.prg_banks > 2 && addr >= 0xC000 {
            return (self.prg_banks - 1) * PRG_BANK_SIZE + (addr as usize & 0x3FFF);
        }
        (addr as usize - 0x8000) % (self.prg_banks.clamp(1, 2) * PRG_BANK_SIZE)
    }
}

/// Mapper 1 (MMC1): registers are loaded serially, one bit per write, LSB first.
#[derive(Debug, Clone)]
pub struct Mmc1 {
    prg_banks: usize,
    shift_register: u8,
    shift_count: u8,
    control: u8,
    chr_bank_0: u8,
    chr_bank_1: u8,
    prg_bank: u8,
}

impl Mmc1 {
    pub fn new(prg_banks: usize) -> Self {
        Mmc1 {
            prg_banks,
            shift_register: 0,
            shift_count: 0,
            // PRG mode 3: $8000 switchable, $C000 fixed to the last bank
            control: 0x0C,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
        }
    }

    pub fn control(&self) -> u8 {
        self.control
    }

    pub fn prg_bank(&self) -> u8 {
        self.prg_bank
    }

    pub fn chr_banks(&self) -> (u8, u8) {
        (self.chr_bank_0, self.chr_bank_1)
    }

    fn write(&mut self, addr: u16, value: u8) {
        if value & 0x80 != 0 {
            self.shift_register = 0;
            self.shift_count = 0;
            self.control |= 0x0C;
            return;
        }

        self.shift_register |= (value & 0x01) << self.shift_count;
        self.shift_count += 1;
        if self.shift_count < 5 {
            return;
        }

        let data = self.shift_register;
        match (addr >> 13) & 0x03 {
            0 => self.control = data,
            1 => self.chr_bank_0 = data,
            2 => self.chr_bank_1 = data,
            _ => self.prg_bank = data & 0x0F,
        }
        log::debug!(
            "MMC1 register {} <- {:#04x} (addr {:#06x})",
            (addr >> 13) & 0x03,
            data,
            addr
        );
        self.shift_register = 0;
        self.shift_count = 0;
    }

    fn map_prg(&self, addr: u16) -> usize {
        let upper = addr >= 0xC000;
        let last = self.prg_banks.saturating_sub(1);
        let bank = match (self.control >> 2) & 0x03 {
            // 32KB mode ignores the low bit of the bank number
            0 | 1 => (self.prg_bank & 0x0E) as usize + upper as usize,
            2 => {
                if upper {
                    self.prg_bank as usize
                } else {
                    0
                }
            }
            _ => {
                if upper {
                    last
                } else {
                    self.prg_bank as usize
                }
            }
        };
        (bank % self.prg_banks.max(1)) * PRG_BANK_SIZE + (addr as usize & 0x3FFF)
    }

    fn map_chr(&self, addr: u16) -> usize {
        if self.control & 0x10 == 0 {
            // 8KB mode
            (self.chr_bank_0 & 0x1E) as usize * (CHR_BANK_SIZE / 2) + (addr as usize & 0x1FFF)
        } else {
            let bank = if addr < 0x1000 {
                self.chr_bank_0
            } else {
                self.chr_bank_1
            };
            bank as usize * 0x1000 + (addr as usize & 0x0FFF)
        }
    }

    fn mirroring(&self) -> Mirroring {
        match self.control & 0x03 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }
}
