//! # Cartridge
//! iNES image parsing and PRG/CHR storage. Address translation lives in [`crate::mapper`].

use crate::error::{NesError, Result};
use crate::mapper::Mapper;

pub const PRG_BANK_SIZE: usize = 0x4000;
pub const CHR_BANK_SIZE: usize = 0x2000;
const HEADER_SIZE: usize = 16;
const TRAINER_SIZE: usize = 512;
const PRG_RAM_SIZE: usize = 0x2000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleScreenLower,
    SingleScreenUpper,
}

impl Mirroring {
    /// Maps a PPU nametable address ($2000-$3EFF) onto the 2KB of physical VRAM.
    pub fn nametable_index(self, addr: u16) -> usize {
        let index = (addr as usize - 0x2000) & 0x0FFF;
        let table = index / 0x400;
        let offset = index % 0x400;
        let bank = match self {
            Mirroring::Horizontal => table / 2,
            Mirroring::Vertical => table % 2,
            Mirroring::SingleScreenLower => 0,
            Mirroring::SingleScreenUpper => 1,
        };
        bank * 0x400 + offset
    }
}

/// Decoded 16-byte iNES header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub prg_banks: usize,
    pub chr_banks: usize,
    pub mapper_id: u8,
    pub mirroring: Mirroring,
    pub has_prg_ram: bool,
    pub has_trainer: bool,
}

impl Header {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(NesError::InvalidRom(format!(
                "file is {} bytes, shorter than the 16-byte header",
                data.len()
            )));
        }
        if &data[0..4] != b"NES\x1A" {
            return Err(NesError::InvalidRom("missing NES<EOF> magic".to_string()));
        }

        let flags6 = data[6];
        let flags7 = data[7];
        let prg_banks = data[4] as usize;
        if prg_banks == 0 {
            return Err(NesError::InvalidRom("header declares no PRG ROM".to_string()));
        }

        Ok(Header {
            prg_banks,
            chr_banks: data[5] as usize,
            mapper_id: (flags7 & 0xF0) | (flags6 >> 4),
            mirroring: if flags6 & 0x01 != 0 {
                Mirroring::Vertical
            } else {
                Mirroring::Horizontal
            },
            has_prg_ram: flags6 & 0x02 != 0,
            has_trainer: flags6 & 0x04 != 0,
        })
    }

    fn image_len(&self) -> usize {
        HEADER_SIZE
            + if self.has_trainer { TRAINER_SIZE } else { 0 }
            + self.prg_banks * PRG_BANK_SIZE
            + self.chr_banks * CHR_BANK_SIZE
    }
}

pub struct Cartridge {
    header: Header,
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
    mapper: Mapper,
}

impl Cartridge {
    /// Parses an iNES image. Nothing is constructed unless the whole image is valid.
    pub fn from_ines(data: &[u8]) -> Result<Self> {
        let header = Header::parse(data)?;
        if data.len() < header.image_len() {
            return Err(NesError::InvalidRom(format!(
                "truncated image: expected {} bytes, got {}",
                header.image_len(),
                data.len()
            )));
        }

        let prg_start = HEADER_SIZE + if header.has_trainer { TRAINER_SIZE } else { 0 };
        let prg_end = prg_start + header.prg_banks * PRG_BANK_SIZE;
        let chr_end = prg_end + header.chr_banks * CHR_BANK_SIZE;

        let prg_rom = data[prg_start..prg_end].to_vec();
        let chr_is_ram = header.chr_banks == 0;
        let chr = if chr_is_ram {
            vec![0; CHR_BANK_SIZE]
        } else {
            data[prg_end..chr_end].to_vec()
        };
        let mapper = Mapper::new(header.mapper_id, header.prg_banks);

        Ok(Cartridge {
            header,
            prg_rom,
            chr,
            chr_is_ram,
            // NROM/MMC1基板は$6000-$7FFFに8KBを持つものとして常に確保する
            prg_ram: vec![0; PRG_RAM_SIZE],
            mapper,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn has_chr_ram(&self) -> bool {
        self.chr_is_ram
    }

    /// CPU read in $4020-$FFFF.
    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize],
            0x8000..=0xFFFF => {
                let offset = self.mapper.map_prg(addr) % self.prg_rom.len();
                self.prg_rom[offset]
            }
            _ => 0,
        }
    }

    /// CPU write in $4020-$FFFF. ROM is never written; $8000+ goes to mapper registers.
    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr - 0x6000) as usize] = value,
            0x8000..=0xFFFF => self.mapper.write_register(addr, value),
            _ => {}
        }
    }

    /// PPU read in $0000-$1FFF.
    pub fn read_chr(&self, addr: u16) -> u8 {
        let offset = self.mapper.map_chr(addr) % self.chr.len();
        self.chr[offset]
    }

    /// PPU write in $0000-$1FFF. Only lands when the board has CHR RAM.
    pub fn write_chr(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let offset = self.mapper.map_chr(addr) % self.chr.len();
            self.chr[offset] = value;
        }
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring().unwrap_or(self.header.mirroring)
    }

    /// Reset vector taken from the top of the last 16KB PRG bank.
    ///
    /// 16KB images read from bank offset 0 (the bank is mirrored into $C000),
    /// 32KB from 0x4000, larger images from `len - 0x4000`.
    pub fn reset_vector(&self) -> u16 {
        let last_bank = self.prg_rom.len() - PRG_BANK_SIZE;
        let lo = self.prg_rom[last_bank + 0x3FFC] as u16;
        let hi = self.prg_rom[last_bank + 0x3FFD] as u16;
        (hi << 8) | lo
    }
}
