//! 命令テーブル
//! オペコード1バイトから {ニーモニック, アドレッシングモード, 基本サイクル数, ページ跨ぎ加算} を引く。

use std::fmt;

#[rustfmt::skip]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    // undocumented
    Lax, Sax, Dcp, Isb, Slo, Rla, Sre, Rra,
    Invalid,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = format!("{:?}", self).to_uppercase();
        f.write_str(&name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
}

impl Mode {
    /// オペランドのバイト数
    pub fn operand_len(self) -> u16 {
        match self {
            Mode::Implied | Mode::Accumulator => 0,
            Mode::Immediate
            | Mode::ZeroPage
            | Mode::ZeroPageX
            | Mode::ZeroPageY
            | Mode::Relative
            | Mode::IndirectX
            | Mode::IndirectY => 1,
            Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY | Mode::Indirect => 2,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub mode: Mode,
    pub cycles: u8,
    /// ページを跨いだら+1サイクル
    pub page_cycle: bool,
    pub official: bool,
}

impl Instruction {
    pub fn len(&self) -> u16 {
        1 + self.mode.operand_len()
    }

    pub fn is_valid(&self) -> bool {
        self.mnemonic != Mnemonic::Invalid
    }
}

const INVALID: Instruction = Instruction {
    mnemonic: Mnemonic::Invalid,
    mode: Mode::Implied,
    cycles: 0,
    page_cycle: false,
    official: false,
};

const fn op(mnemonic: Mnemonic, mode: Mode, cycles: u8, page_cycle: bool) -> Instruction {
    Instruction {
        mnemonic,
        mode,
        cycles,
        page_cycle,
        official: true,
    }
}

const fn ux(mnemonic: Mnemonic, mode: Mode, cycles: u8, page_cycle: bool) -> Instruction {
    Instruction {
        mnemonic,
        mode,
        cycles,
        page_cycle,
        official: false,
    }
}

pub static INSTRUCTIONS: [Instruction; 256] = build_table();

const fn build_table() -> [Instruction; 256] {
    use Mnemonic::*;
    use Mode::*;

    let mut t = [INVALID; 256];

    // ALU group: ORA AND EOR ADC CMP LDA SBC
    t[0x01] = op(Ora, IndirectX, 6, false);
    t[0x05] = op(Ora, ZeroPage, 3, false);
    t[0x09] = op(Ora, Immediate, 2, false);
    t[0x0D] = op(Ora, Absolute, 4, false);
    t[0x11] = op(Ora, IndirectY, 5, true);
    t[0x15] = op(Ora, ZeroPageX, 4, false);
    t[0x19] = op(Ora, AbsoluteY, 4, true);
    t[0x1D] = op(Ora, AbsoluteX, 4, true);

    t[0x21] = op(And, IndirectX, 6, false);
    t[0x25] = op(And, ZeroPage, 3, false);
    t[0x29] = op(And, Immediate, 2, false);
    t[0x2D] = op(And, Absolute, 4, false);
    t[0x31] = op(And, IndirectY, 5, true);
    t[0x35] = op(And, ZeroPageX, 4, false);
    t[0x39] = op(And, AbsoluteY, 4, true);
    t[0x3D] = op(And, AbsoluteX, 4, true);

    t[0x41] = op(Eor, IndirectX, 6, false);
    t[0x45] = op(Eor, ZeroPage, 3, false);
    t[0x49] = op(Eor, Immediate, 2, false);
    t[0x4D] = op(Eor, Absolute, 4, false);
    t[0x51] = op(Eor, IndirectY, 5, true);
    t[0x55] = op(Eor, ZeroPageX, 4, false);
    t[0x59] = op(Eor, AbsoluteY, 4, true);
    t[0x5D] = op(Eor, AbsoluteX, 4, true);

    t[0x61] = op(Adc, IndirectX, 6, false);
    t[0x65] = op(Adc, ZeroPage, 3, false);
    t[0x69] = op(Adc, Immediate, 2, false);
    t[0x6D] = op(Adc, Absolute, 4, false);
    t[0x71] = op(Adc, IndirectY, 5, true);
    t[0x75] = op(Adc, ZeroPageX, 4, false);
    t[0x79] = op(Adc, AbsoluteY, 4, true);
    t[0x7D] = op(Adc, AbsoluteX, 4, true);

    t[0xC1] = op(Cmp, IndirectX, 6, false);
    t[0xC5] = op(Cmp, ZeroPage, 3, false);
    t[0xC9] = op(Cmp, Immediate, 2, false);
    t[0xCD] = op(Cmp, Absolute, 4, false);
    t[0xD1] = op(Cmp, IndirectY, 5, true);
    t[0xD5] = op(Cmp, ZeroPageX, 4, false);
    t[0xD9] = op(Cmp, AbsoluteY, 4, true);
    t[0xDD] = op(Cmp, AbsoluteX, 4, true);

    t[0xA1] = op(Lda, IndirectX, 6, false);
    t[0xA5] = op(Lda, ZeroPage, 3, false);
    t[0xA9] = op(Lda, Immediate, 2, false);
    t[0xAD] = op(Lda, Absolute, 4, false);
    t[0xB1] = op(Lda, IndirectY, 5, true);
    t[0xB5] = op(Lda, ZeroPageX, 4, false);
    t[0xB9] = op(Lda, AbsoluteY, 4, true);
    t[0xBD] = op(Lda, AbsoluteX, 4, true);

    t[0xE1] = op(Sbc, IndirectX, 6, false);
    t[0xE5] = op(Sbc, ZeroPage, 3, false);
    t[0xE9] = op(Sbc, Immediate, 2, false);
    t[0xED] = op(Sbc, Absolute, 4, false);
    t[0xF1] = op(Sbc, IndirectY, 5, true);
    t[0xF5] = op(Sbc, ZeroPageX, 4, false);
    t[0xF9] = op(Sbc, AbsoluteY, 4, true);
    t[0xFD] = op(Sbc, AbsoluteX, 4, true);

    // Stores never take the page-cross shortcut
    t[0x81] = op(Sta, IndirectX, 6, false);
    t[0x85] = op(Sta, ZeroPage, 3, false);
    t[0x8D] = op(Sta, Absolute, 4, false);
    t[0x91] = op(Sta, IndirectY, 6, false);
    t[0x95] = op(Sta, ZeroPageX, 4, false);
    t[0x99] = op(Sta, AbsoluteY, 5, false);
    t[0x9D] = op(Sta, AbsoluteX, 5, false);

    t[0x86] = op(Stx, ZeroPage, 3, false);
    t[0x8E] = op(Stx, Absolute, 4, false);
    t[0x96] = op(Stx, ZeroPageY, 4, false);

    t[0x84] = op(Sty, ZeroPage, 3, false);
    t[0x8C] = op(Sty, Absolute, 4, false);
    t[0x94] = op(Sty, ZeroPageX, 4, false);

    t[0xA2] = op(Ldx, Immediate, 2, false);
    t[0xA6] = op(Ldx, ZeroPage, 3, false);
    t[0xAE] = op(Ldx, Absolute, 4, false);
    t[0xB6] = op(Ldx, ZeroPageY, 4, false);
    t[0xBE] = op(Ldx, AbsoluteY, 4, true);

    t[0xA0] = op(Ldy, Immediate, 2, false);
    t[0xA4] = op(Ldy, ZeroPage, 3, false);
    t[0xAC] = op(Ldy, Absolute, 4, false);
    t[0xB4] = op(Ldy, ZeroPageX, 4, false);
    t[0xBC] = op(Ldy, AbsoluteX, 4, true);

    t[0xE0] = op(Cpx, Immediate, 2, false);
    t[0xE4] = op(Cpx, ZeroPage, 3, false);
    t[0xEC] = op(Cpx, Absolute, 4, false);

    t[0xC0] = op(Cpy, Immediate, 2, false);
    t[0xC4] = op(Cpy, ZeroPage, 3, false);
    t[0xCC] = op(Cpy, Absolute, 4, false);

    t[0x24] = op(Bit, ZeroPage, 3, false);
    t[0x2C] = op(Bit, Absolute, 4, false);

    // Read-modify-write
    t[0x06] = op(Asl, ZeroPage, 5, false);
    t[0x0A] = op(Asl, Accumulator, 2, false);
    t[0x0E] = op(Asl, Absolute, 6, false);
    t[0x16] = op(Asl, ZeroPageX, 6, false);
    t[0x1E] = op(Asl, AbsoluteX, 7, false);

    t[0x26] = op(Rol, ZeroPage, 5, false);
    t[0x2A] = op(Rol, Accumulator, 2, false);
    t[0x2E] = op(Rol, Absolute, 6, false);
    t[0x36] = op(Rol, ZeroPageX, 6, false);
    t[0x3E] = op(Rol, AbsoluteX, 7, false);

    t[0x46] = op(Lsr, ZeroPage, 5, false);
    t[0x4A] = op(Lsr, Accumulator, 2, false);
    t[0x4E] = op(Lsr, Absolute, 6, false);
    t[0x56] = op(Lsr, ZeroPageX, 6, false);
    t[0x5E] = op(Lsr, AbsoluteX, 7, false);

    t[0x66] = op(Ror, ZeroPage, 5, false);
    t[0x6A] = op(Ror, Accumulator, 2, false);
    t[0x6E] = op(Ror, Absolute, 6, false);
    t[0x76] = op(Ror, ZeroPageX, 6, false);
    t[0x7E] = op(Ror, AbsoluteX, 7, false);

    t[0xC6] = op(Dec, ZeroPage, 5, false);
    t[0xCE] = op(Dec, Absolute, 6, false);
    t[0xD6] = op(Dec, ZeroPageX, 6, false);
    t[0xDE] = op(Dec, AbsoluteX, 7, false);

    t[0xE6] = op(Inc, ZeroPage, 5, false);
    t[0xEE] = op(Inc, Absolute, 6, false);
    t[0xF6] = op(Inc, ZeroPageX, 6, false);
    t[0xFE] = op(Inc, AbsoluteX, 7, false);

    // Branches (taken/page-cross cycles are added by the CPU)
    t[0x10] = op(Bpl, Relative, 2, false);
    t[0x30] = op(Bmi, Relative, 2, false);
    t[0x50] = op(Bvc, Relative, 2, false);
    t[0x70] = op(Bvs, Relative, 2, false);
    t[0x90] = op(Bcc, Relative, 2, false);
    t[0xB0] = op(Bcs, Relative, 2, false);
    t[0xD0] = op(Bne, Relative, 2, false);
    t[0xF0] = op(Beq, Relative, 2, false);

    // Control flow and stack
    t[0x00] = op(Brk, Implied, 7, false);
    t[0x20] = op(Jsr, Absolute, 6, false);
    t[0x40] = op(Rti, Implied, 6, false);
    t[0x60] = op(Rts, Implied, 6, false);
    t[0x4C] = op(Jmp, Absolute, 3, false);
    t[0x6C] = op(Jmp, Indirect, 5, false);
    t[0x08] = op(Php, Implied, 3, false);
    t[0x28] = op(Plp, Implied, 4, false);
    t[0x48] = op(Pha, Implied, 3, false);
    t[0x68] = op(Pla, Implied, 4, false);

    // Flags
    t[0x18] = op(Clc, Implied, 2, false);
    t[0x38] = op(Sec, Implied, 2, false);
    t[0x58] = op(Cli, Implied, 2, false);
    t[0x78] = op(Sei, Implied, 2, false);
    t[0xB8] = op(Clv, Implied, 2, false);
    t[0xD8] = op(Cld, Implied, 2, false);
    t[0xF8] = op(Sed, Implied, 2, false);

    // Register transfers, inc/dec
    t[0x88] = op(Dey, Implied, 2, false);
    t[0x8A] = op(Txa, Implied, 2, false);
    t[0x98] = op(Tya, Implied, 2, false);
    t[0x9A] = op(Txs, Implied, 2, false);
    t[0xA8] = op(Tay, Implied, 2, false);
    t[0xAA] = op(Tax, Implied, 2, false);
    t[0xBA] = op(Tsx, Implied, 2, false);
    t[0xC8] = op(Iny, Implied, 2, false);
    t[0xCA] = op(Dex, Implied, 2, false);
    t[0xE8] = op(Inx, Implied, 2, false);
    t[0xEA] = op(Nop, Implied, 2, false);

    // Undocumented read-modify-write combos
    t[0x03] = ux(Slo, IndirectX, 8, false);
    t[0x07] = ux(Slo, ZeroPage, 5, false);
    t[0x0F] = ux(Slo, Absolute, 6, false);
    t[0x13] = ux(Slo, IndirectY, 8, false);
    t[0x17] = ux(Slo, ZeroPageX, 6, false);
    t[0x1B] = ux(Slo, AbsoluteY, 7, false);
    t[0x1F] = ux(Slo, AbsoluteX, 7, false);

    t[0x23] = ux(Rla, IndirectX, 8, false);
    t[0x27] = ux(Rla, ZeroPage, 5, false);
    t[0x2F] = ux(Rla, Absolute, 6, false);
    t[0x33] = ux(Rla, IndirectY, 8, false);
    t[0x37] = ux(Rla, ZeroPageX, 6, false);
    t[0x3B] = ux(Rla, AbsoluteY, 7, false);
    t[0x3F] = ux(Rla, AbsoluteX, 7, false);

    t[0x43] = ux(Sre, IndirectX, 8, false);
    t[0x47] = ux(Sre, ZeroPage, 5, false);
    t[0x4F] = ux(Sre, Absolute, 6, false);
    t[0x53] = ux(Sre, IndirectY, 8, false);
    t[0x57] = ux(Sre, ZeroPageX, 6, false);
    t[0x5B] = ux(Sre, AbsoluteY, 7, false);
    t[0x5F] = ux(Sre, AbsoluteX, 7, false);

    t[0x63] = ux(Rra, IndirectX, 8, false);
    t[0x67] = ux(Rra, ZeroPage, 5, false);
    t[0x6F] = ux(Rra, Absolute, 6, false);
    t[0x73] = ux(Rra, IndirectY, 8, false);
    t[0x77] = ux(Rra, ZeroPageX, 6, false);
    t[0x7B] = ux(Rra, AbsoluteY, 7, false);
    t[0x7F] = ux(Rra, AbsoluteX, 7, false);

    t[0xC3] = ux(Dcp, IndirectX, 8, false);
    t[0xC7] = ux(Dcp, ZeroPage, 5, false);
    t[0xCF] = ux(Dcp, Absolute, 6, false);
    t[0xD3] = ux(Dcp, IndirectY, 8, false);
    t[0xD7] = ux(Dcp, ZeroPageX, 6, false);
    t[0xDB] = ux(Dcp, AbsoluteY, 7, false);
    t[0xDF] = ux(Dcp, AbsoluteX, 7, false);

    t[0xE3] = ux(Isb, IndirectX, 8, false);
    t[0xE7] = ux(Isb, ZeroPage, 5, false);
    t[0xEF] = ux(Isb, Absolute, 6, false);
    t[0xF3] = ux(Isb, IndirectY, 8, false);
    t[0xF7] = ux(Isb, ZeroPageX, 6, false);
    t[0xFB] = ux(Isb, AbsoluteY, 7, false);
    t[0xFF] = ux(Isb, AbsoluteX, 7, false);

    t[0xA3] = ux(Lax, IndirectX, 6, false);
    t[0xA7] = ux(Lax, ZeroPage, 3, false);
    t[0xAF] = ux(Lax, Absolute, 4, false);
    t[0xB3] = ux(Lax, IndirectY, 5, true);
    t[0xB7] = ux(Lax, ZeroPageY, 4, false);
    t[0xBF] = ux(Lax, AbsoluteY, 4, true);

    t[0x83] = ux(Sax, IndirectX, 6, false);
    t[0x87] = ux(Sax, ZeroPage, 3, false);
    t[0x8F] = ux(Sax, Absolute, 4, false);
    t[0x97] = ux(Sax, ZeroPageY, 4, false);

    t[0xEB] = ux(Sbc, Immediate, 2, false);

    // Undocumented NOPs
    t[0x1A] = ux(Nop, Implied, 2, false);
    t[0x3A] = ux(Nop, Implied, 2, false);
    t[0x5A] = ux(Nop, Implied, 2, false);
    t[0x7A] = ux(Nop, Implied, 2, false);
    t[0xDA] = ux(Nop, Implied, 2, false);
    t[0xFA] = ux(Nop, Implied, 2, false);

    t[0x80] = ux(Nop, Immediate, 2, false);
    t[0x82] = ux(Nop, Immediate, 2, false);
    t[0x89] = ux(Nop, Immediate, 2, false);
    t[0xC2] = ux(Nop, Immediate, 2, false);
    t[0xE2] = ux(Nop, Immediate, 2, false);

    t[0x04] = ux(Nop, ZeroPage, 3, false);
    t[0x44] = ux(Nop, ZeroPage, 3, false);
    t[0x64] = ux(Nop, ZeroPage, 3, false);

    t[0x14] = ux(Nop, ZeroPageX, 4, false);
    t[0x34] = ux(Nop, ZeroPageX, 4, false);
    t[0x54] = ux(Nop, ZeroPageX, 4, false);
    t[0x74] = ux(Nop, ZeroPageX, 4, false);
    t[0xD4] = ux(Nop, ZeroPageX, 4, false);
    t[0xF4] = ux(Nop, ZeroPageX, 4, false);

    t[0x0C] = ux(Nop, Absolute, 4, false);

    t[0x1C] = ux(Nop, AbsoluteX, 4, true);
    t[0x3C] = ux(Nop, AbsoluteX, 4, true);
    t[0x5C] = ux(Nop, AbsoluteX, 4, true);
    t[0x7C] = ux(Nop, AbsoluteX, 4, true);
    t[0xDC] = ux(Nop, AbsoluteX, 4, true);
    t[0xFC] = ux(Nop, AbsoluteX, 4, true);

    t
}
