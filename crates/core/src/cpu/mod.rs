//! # 6502 CPU Implementation
//! テーブル駆動のフェッチ・デコード・実行。`step()`は1命令を丸ごと実行し、
//! 経過サイクル数を返す。PPU/APUを進めるのは呼び出し側の責務。

mod flags;
mod table;

pub use flags::Flags;
pub use table::{Instruction, Mnemonic, Mode, INSTRUCTIONS};

use crate::bus::Bus;
use crate::error::{NesError, Result};

const STACK_BASE: u16 = 0x0100;
const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

/// 割り込みの受付にかかるサイクル数
pub const INTERRUPT_CYCLES: u8 = 7;

pub struct Cpu {
    pub bus: Bus,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub flags: Flags,
    page_crossed: bool,
    branch_taken: bool,
}

impl Cpu {
    pub fn new(bus: Bus) -> Self {
        Cpu {
            bus,
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            flags: Flags {
                i: true,
                ..Default::default()
            },
            page_crossed: false,
            branch_taken: false,
        }
    }

    /// RESET: S=$FD, I=1, PCは$FFFCから。7サイクル。
    pub fn reset(&mut self) -> u8 {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFD;
        self.flags = Flags {
            i: true,
            ..Default::default()
        };
        self.pc = self.bus.read_word(RESET_VECTOR);
        INTERRUPT_CYCLES
    }

    pub fn nmi(&mut self) -> u8 {
        self.interrupt(NMI_VECTOR, false);
        INTERRUPT_CYCLES
    }

    /// Iフラグが立っていれば何もせず0を返す
    pub fn irq(&mut self) -> u8 {
        if self.flags.i {
            return 0;
        }
        self.interrupt(IRQ_VECTOR, false);
        INTERRUPT_CYCLES
    }

    fn interrupt(&mut self, vector: u16, brk: bool) {
        self.push_word(self.pc);
        let mut status = self.flags.to_byte();
        if brk {
            status |= Flags::BREAK;
        } else {
            status &= !Flags::BREAK;
        }
        self.push_byte(status);
        self.flags.i = true;
        self.pc = self.bus.read_word(vector);
    }

    /// 1命令を実行して消費サイクル数を返す
    pub fn step(&mut self) -> Result<u8> {
        let pc = self.pc;
        let opcode = self.next_byte();
        let instruction = INSTRUCTIONS[opcode as usize];
        if !instruction.is_valid() {
            return Err(NesError::UnimplementedOpcode { opcode, pc });
        }

        self.page_crossed = false;
        self.branch_taken = false;
        self.execute(instruction);

        let mut cycles = instruction.cycles;
        if self.branch_taken {
            cycles += 1 + self.page_crossed as u8;
        } else if instruction.page_cycle && self.page_crossed {
            cycles += 1;
        }
        Ok(cycles)
    }

    fn execute(&mut self, instruction: Instruction) {
        let mode = instruction.mode;
        match instruction.mnemonic {
            // Loads and stores
            Mnemonic::Lda => self.lda(mode),
            Mnemonic::Ldx => self.ldx(mode),
            Mnemonic::Ldy => self.ldy(mode),
            Mnemonic::Sta => self.sta(mode),
            Mnemonic::Stx => self.stx(mode),
            Mnemonic::Sty => self.sty(mode),

            // Arithmetic and logic
            Mnemonic::Adc => self.adc(mode),
            Mnemonic::Sbc => self.sbc(mode),
            Mnemonic::And => self.and(mode),
            Mnemonic::Ora => self.ora(mode),
            Mnemonic::Eor => self.eor(mode),
            Mnemonic::Bit => self.bit(mode),
            Mnemonic::Cmp => self.cmp(mode),
            Mnemonic::Cpx => self.cpx(mode),
            Mnemonic::Cpy => self.cpy(mode),

            // Shifts, rotates, increments
            Mnemonic::Asl => self.asl(mode),
            Mnemonic::Lsr => self.lsr(mode),
            Mnemonic::Rol => self.rol(mode),
            Mnemonic::Ror => self.ror(mode),
            Mnemonic::Inc => self.inc(mode),
            Mnemonic::Dec => self.dec(mode),
            Mnemonic::Inx => self.inx(),
            Mnemonic::Iny => self.iny(),
            Mnemonic::Dex => self.dex(),
            Mnemonic::Dey => self.dey(),

            // Register moves
            Mnemonic::Tax => self.tax(),
            Mnemonic::Tay => self.tay(),
            Mnemonic::Txa => self.txa(),
            Mnemonic::Tya => self.tya(),
            Mnemonic::Tsx => self.tsx(),
            Mnemonic::Txs => self.txs(),

            // Flag operations
            Mnemonic::Clc => self.flags.c = false,
            Mnemonic::Sec => self.flags.c = true,
            Mnemonic::Cli => self.flags.i = false,
            Mnemonic::Sei => self.flags.i = true,
            Mnemonic::Clv => self.flags.v = false,
            Mnemonic::Cld => self.flags.d = false,
            Mnemonic::Sed => self.flags.d = true,

            // Branches
            Mnemonic::Bpl => self.branch(!self.flags.n),
            Mnemonic::Bmi => self.branch(self.flags.n),
            Mnemonic::Bvc => self.branch(!self.flags.v),
            Mnemonic::Bvs => self.branch(self.flags.v),
            Mnemonic::Bcc => self.branch(!self.flags.c),
            Mnemonic::Bcs => self.branch(self.flags.c),
            Mnemonic::Bne => self.branch(!self.flags.z),
            Mnemonic::Beq => self.branch(self.flags.z),

            // Jumps and procedure calls
            Mnemonic::Jmp => self.jmp(mode),
            Mnemonic::Jsr => self.jsr(),
            Mnemonic::Rts => self.rts(),
            Mnemonic::Rti => self.rti(),
            Mnemonic::Brk => self.brk(),

            // Stack operations
            Mnemonic::Pha => self.pha(),
            Mnemonic::Pla => self.pla(),
            Mnemonic::Php => self.php(),
            Mnemonic::Plp => self.plp(),

            Mnemonic::Nop => self.nop(mode),

            // Undocumented
            Mnemonic::Lax => self.lax(mode),
            Mnemonic::Sax => self.sax(mode),
            Mnemonic::Dcp => self.dcp(mode),
            Mnemonic::Isb => self.isb(mode),
            Mnemonic::Slo => self.slo(mode),
            Mnemonic::Rla => self.rla(mode),
            Mnemonic::Sre => self.sre(mode),
            Mnemonic::Rra => self.rra(mode),

            Mnemonic::Invalid => unreachable!("invalid opcodes are rejected before dispatch"),
        }
    }

    fn next_byte(&mut self) -> u8 {
        let value = self.bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn next_word(&mut self) -> u16 {
        let lo = self.next_byte() as u16;
        let hi = self.next_byte() as u16;
        (hi << 8) | lo
    }

    fn push_byte(&mut self, value: u8) {
        self.bus.write(STACK_BASE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop_byte(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.bus.read(STACK_BASE | self.sp as u16)
    }

    fn push_word(&mut self, value: u16) {
        self.push_byte((value >> 8) as u8);
        self.push_byte(value as u8);
    }

    fn pop_word(&mut self) -> u16 {
        let lo = self.pop_byte() as u16;
        let hi = self.pop_byte() as u16;
        (hi << 8) | lo
    }

    fn indexed(&mut self, base: u16, index: u8) -> u16 {
        let address = base.wrapping_add(index as u16);
        self.page_crossed = high_byte(base) != high_byte(address);
        address
    }

    fn operand_address(&mut self, mode: Mode) -> u16 {
        match mode {
            Mode::Immediate => {
                let address = self.pc;
                self.pc = self.pc.wrapping_add(1);
                address
            }
            Mode::ZeroPage => self.next_byte() as u16,
            Mode::ZeroPageX => self.next_byte().wrapping_add(self.x) as u16,
            Mode::ZeroPageY => self.next_byte().wrapping_add(self.y) as u16,
            Mode::Absolute => self.next_word(),
            Mode::AbsoluteX => {
                let base = self.next_word();
                self.indexed(base, self.x)
            }
            Mode::AbsoluteY => {
                let base = self.next_word();
                self.indexed(base, self.y)
            }
            Mode::Indirect => {
                // $xxFFを指すポインタの上位バイトは同じページの$xx00から読む
                let pointer = self.next_word();
                let wrapped = high_byte(pointer) | low_byte(pointer.wrapping_add(1));
                self.bus.read_noncontinuous_word(pointer, wrapped)
            }
            Mode::IndirectX => {
                let pointer = self.next_byte().wrapping_add(self.x);
                self.bus
                    .read_noncontinuous_word(pointer as u16, pointer.wrapping_add(1) as u16)
            }
            Mode::IndirectY => {
                let pointer = self.next_byte();
                let base = self
                    .bus
                    .read_noncontinuous_word(pointer as u16, pointer.wrapping_add(1) as u16);
                self.indexed(base, self.y)
            }
            Mode::Implied | Mode::Accumulator | Mode::Relative => {
                unreachable!("{:?} has no operand address", mode)
            }
        }
    }

    fn read_operand(&mut self, mode: Mode) -> u8 {
        let address = self.operand_address(mode);
        self.bus.read(address)
    }

    /// アキュムレータまたはメモリに対する read-modify-write
    fn modify(&mut self, mode: Mode, op: impl FnOnce(&mut Self, u8) -> u8) -> u8 {
        if mode == Mode::Accumulator {
            let a = self.a;
            let result = op(self, a);
            self.a = result;
            result
        } else {
            let address = self.operand_address(mode);
            let operand = self.bus.read(address);
            let result = op(self, operand);
            self.bus.write(address, result);
            result
        }
    }

    fn add_with_carry(&mut self, operand: u8) {
        let a = self.a;
        let sum = a as u16 + operand as u16 + self.flags.c as u16;
        let result = sum as u8;
        self.flags.c = sum > 0xFF;
        self.flags.v = !(a ^ operand) & (a ^ result) & 0x80 != 0;
        self.flags.update_zn(result);
        self.a = result;
    }

    fn compare(&mut self, register: u8, operand: u8) {
        self.flags.z = register == operand;
        self.flags.c = register >= operand;
        self.flags.n = register.wrapping_sub(operand) & 0x80 != 0;
    }

    fn shift_left(&mut self, operand: u8, carry_in: bool) -> u8 {
        let result = (operand << 1) | carry_in as u8;
        self.flags.c = operand & 0b1000_0000 != 0;
        self.flags.update_zn(result);
        result
    }

    fn shift_right(&mut self, operand: u8, carry_in: bool) -> u8 {
        let result = (operand >> 1) | ((carry_in as u8) << 7);
        self.flags.c = operand & 0b0000_0001 != 0;
        self.flags.update_zn(result);
        result
    }

    fn lda(&mut self, mode: Mode) {
        let operand = self.read_operand(mode);
        self.flags.update_zn(operand);
        self.a = operand;
    }

    fn ldx(&mut self, mode: Mode) {
        let operand = self.read_operand(mode);
        self.flags.update_zn(operand);
        self.x = operand;
    }

    fn ldy(&mut self, mode: Mode) {
        let operand = self.read_operand(mode);
        self.flags.update_zn(operand);
        self.y = operand;
    }

    fn sta(&mut self, mode: Mode) {
        let address = self.operand_address(mode);
        self.bus.write(address, self.a);
    }

    fn stx(&mut self, mode: Mode) {
        let address = self.operand_address(mode);
        self.bus.write(address, self.x);
    }

    fn sty(&mut self, mode: Mode) {
        let address = self.operand_address(mode);
        self.bus.write(address, self.y);
    }

    fn adc(&mut self, mode: Mode) {
        let operand = self.read_operand(mode);
        self.add_with_carry(operand);
    }

    fn sbc(&mut self, mode: Mode) {
        let operand = self.read_operand(mode);
        self.add_with_carry(operand ^ 0xFF);
    }

    fn and(&mut self, mode: Mode) {
        let result = self.a & self.read_operand(mode);
        self.flags.update_zn(result);
        self.a = result;
    }

    fn ora(&mut self, mode: Mode) {
        let result = self.a | self.read_operand(mode);
        self.flags.update_zn(result);
        self.a = result;
    }

    fn eor(&mut self, mode: Mode) {
        let result = self.a ^ self.read_operand(mode);
        self.flags.update_zn(result);
        self.a = result;
    }

    fn bit(&mut self, mode: Mode) {
        let operand = self.read_operand(mode);
        self.flags.z = self.a & operand == 0;
        self.flags.v = operand & 0b0100_0000 != 0;
        self.flags.n = operand & 0b1000_0000 != 0;
    }

    fn cmp(&mut self, mode: Mode) {
        let operand = self.read_operand(mode);
        self.compare(self.a, operand);
    }

    fn cpx(&mut self, mode: Mode) {
        let operand = self.read_operand(mode);
        self.compare(self.x, operand);
    }

    fn cpy(&mut self, mode: Mode) {
        let operand = self.read_operand(mode);
        self.compare(self.y, operand);
    }

    fn asl(&mut self, mode: Mode) {
        self.modify(mode, |cpu, v| cpu.shift_left(v, false));
    }

    fn lsr(&mut self, mode: Mode) {
        self.modify(mode, |cpu, v| cpu.shift_right(v, false));
    }

    fn rol(&mut self, mode: Mode) {
        self.modify(mode, |cpu, v| {
            let carry = cpu.flags.c;
            cpu.shift_left(v, carry)
        });
    }

    fn ror(&mut self, mode: Mode) {
        self.modify(mode, |cpu, v| {
            let carry = cpu.flags.c;
            cpu.shift_right(v, carry)
        });
    }

    fn inc(&mut self, mode: Mode) {
        self.modify(mode, |cpu, v| {
            let result = v.wrapping_add(1);
            cpu.flags.update_zn(result);
            result
        });
    }

    fn dec(&mut self, mode: Mode) {
        self.modify(mode, |cpu, v| {
            let result = v.wrapping_sub(1);
            cpu.flags.update_zn(result);
            result
        });
    }

    fn inx(&mut self) {
        self.x = self.x.wrapping_add(1);
        self.flags.update_zn(self.x);
    }

    fn iny(&mut self) {
        self.y = self.y.wrapping_add(1);
        self.flags.update_zn(self.y);
    }

    fn dex(&mut self) {
        self.x = self.x.wrapping_sub(1);
        self.flags.update_zn(self.x);
    }

    fn dey(&mut self) {
        self.y = self.y.wrapping_sub(1);
        self.flags.update_zn(self.y);
    }

    fn tax(&mut self) {
        self.x = self.a;
        self.flags.update_zn(self.x);
    }

    fn tay(&mut self) {
        self.y = self.a;
        self.flags.update_zn(self.y);
    }

    fn txa(&mut self) {
        self.a = self.x;
        self.flags.update_zn(self.a);
    }

    fn tya(&mut self) {
        self.a = self.y;
        self.flags.update_zn(self.a);
    }

    fn tsx(&mut self) {
        self.x = self.sp;
        self.flags.update_zn(self.x);
    }

    // TXSはフラグを変えない
    fn txs(&mut self) {
        self.sp = self.x;
    }

    fn branch(&mut self, condition: bool) {
        let offset = self.next_byte() as i8;
        if condition {
            let target = self.pc.wrapping_add(offset as u16);
            self.branch_taken = true;
            self.page_crossed = high_byte(self.pc) != high_byte(target);
            self.pc = target;
        }
    }

    fn jmp(&mut self, mode: Mode) {
        self.pc = self.operand_address(mode);
    }

    fn jsr(&mut self) {
        let target = self.next_word();
        let return_address = self.pc.wrapping_sub(1);
        self.push_word(return_address);
        self.pc = target;
    }

    fn rts(&mut self) {
        self.pc = self.pop_word().wrapping_add(1);
    }

    fn rti(&mut self) {
        let status = self.pop_byte();
        self.flags = Flags::from_byte(status);
        self.pc = self.pop_word();
    }

    fn brk(&mut self) {
        // パディングバイトを読み飛ばす
        self.pc = self.pc.wrapping_add(1);
        self.interrupt(IRQ_VECTOR, true);
    }

    fn pha(&mut self) {
        self.push_byte(self.a);
    }

    fn pla(&mut self) {
        let value = self.pop_byte();
        self.flags.update_zn(value);
        self.a = value;
    }

    fn php(&mut self) {
        let status = self.flags.to_byte() | Flags::BREAK;
        self.push_byte(status);
    }

    fn plp(&mut self) {
        let status = self.pop_byte();
        self.flags = Flags::from_byte(status);
    }

    fn nop(&mut self, mode: Mode) {
        if mode != Mode::Implied {
            self.read_operand(mode);
        }
    }

    // LAX - Load A and X
    fn lax(&mut self, mode: Mode) {
        let value = self.read_operand(mode);
        self.flags.update_zn(value);
        self.a = value;
        self.x = value;
    }

    // SAX - Store A AND X
    fn sax(&mut self, mode: Mode) {
        let address = self.operand_address(mode);
        self.bus.write(address, self.a & self.x);
    }

    // DCP - Decrement then Compare
    fn dcp(&mut self, mode: Mode) {
        let result = self.modify(mode, |_, v| v.wrapping_sub(1));
        self.compare(self.a, result);
    }

    // ISB - Increment then Subtract with Carry
    fn isb(&mut self, mode: Mode) {
        let result = self.modify(mode, |_, v| v.wrapping_add(1));
        self.add_with_carry(result ^ 0xFF);
    }

    // SLO - Shift Left then OR
    fn slo(&mut self, mode: Mode) {
        let result = self.modify(mode, |cpu, v| cpu.shift_left(v, false));
        self.a |= result;
        self.flags.update_zn(self.a);
    }

    // RLA - Rotate Left then AND
    fn rla(&mut self, mode: Mode) {
        let result = self.modify(mode, |cpu, v| {
            let carry = cpu.flags.c;
            cpu.shift_left(v, carry)
        });
        self.a &= result;
        self.flags.update_zn(self.a);
    }

    // SRE - Shift Right then EOR
    fn sre(&mut self, mode: Mode) {
        let result = self.modify(mode, |cpu, v| cpu.shift_right(v, false));
        self.a ^= result;
        self.flags.update_zn(self.a);
    }

    // RRA - Rotate Right then Add with Carry
    fn rra(&mut self, mode: Mode) {
        let result = self.modify(mode, |cpu, v| {
            let carry = cpu.flags.c;
            cpu.shift_right(v, carry)
        });
        self.add_with_carry(result);
    }
}

fn low_byte(value: u16) -> u16 {
    value & 0x00FF
}

fn high_byte(value: u16) -> u16 {
    value & 0xFF00
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::test_rom::nrom_program;
    use crate::cartridge::Cartridge;

    fn cpu_from_image(image: &[u8]) -> Cpu {
        let cartridge = Cartridge::from_ines(image).unwrap();
        let mut cpu = Cpu::new(Bus::new(cartridge));
        cpu.reset();
        cpu
    }

    fn cpu_with_program(program: &[u8]) -> Cpu {
        cpu_from_image(&nrom_program(0x8000, program))
    }

    fn run(cpu: &mut Cpu, steps: usize) -> u32 {
        (0..steps).map(|_| cpu.step().unwrap() as u32).sum()
    }

    #[test]
    fn test_reset_state() {
        let cpu = cpu_with_program(&[]);
        assert_eq!(cpu.pc, 0x8000);
        assert_eq!(cpu.sp, 0xFD);
        assert!(cpu.flags.i);
        assert_eq!(cpu.flags.to_byte(), 0x24);
    }

    #[test]
    fn test_lda_immediate_zero() {
        let mut cpu = cpu_with_program(&[0xA9, 0x00]);
        let cycles = cpu.step().unwrap();
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.flags.z);
        assert!(!cpu.flags.n);
        assert_eq!(cycles, 2);
        assert_eq!(cpu.pc, 0x8002);
    }

    #[test]
    fn test_lda_immediate_negative() {
        let mut cpu = cpu_with_program(&[0xA9, 0x80]);
        cpu.step().unwrap();
        assert!(!cpu.flags.z);
        assert!(cpu.flags.n);
    }

    #[test]
    fn test_adc_sets_overflow_and_carry() {
        // LDA #$50; ADC #$50 -> $A0, V=1 C=0
        let mut cpu = cpu_with_program(&[0xA9, 0x50, 0x69, 0x50, 0x69, 0x70]);
        run(&mut cpu, 2);
        assert_eq!(cpu.a, 0xA0);
        assert!(cpu.flags.v);
        assert!(!cpu.flags.c);
        assert!(cpu.flags.n);
        // $A0 + $70 = $110 -> C=1, V=0
        cpu.step().unwrap();
        assert_eq!(cpu.a, 0x10);
        assert!(cpu.flags.c);
        assert!(!cpu.flags.v);
    }

    #[test]
    fn test_sbc_borrow() {
        // SEC; LDA #$50; SBC #$F0 -> $60 with borrow (C=0)
        let mut cpu = cpu_with_program(&[0x38, 0xA9, 0x50, 0xE9, 0xF0]);
        run(&mut cpu, 3);
        assert_eq!(cpu.a, 0x60);
        assert!(!cpu.flags.c);
        assert!(!cpu.flags.v);
    }

    #[test]
    fn test_compare_invariant() {
        let mut cpu = cpu_with_program(&[]);
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                cpu.compare(a, b);
                assert_eq!(cpu.flags.z, a == b);
                assert_eq!(cpu.flags.c, a >= b);
                assert_eq!(cpu.flags.n, a.wrapping_sub(b) & 0x80 != 0);
            }
        }
    }

    #[test]
    fn test_branch_taken_across_page() {
        let mut cpu = cpu_from_image(&nrom_program(0x80FD, &[0xF0, 0x01]));
        cpu.flags.z = true;
        let cycles = cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x8100);
        assert_eq!(cycles, 4);
    }

    #[test]
    fn test_branch_cycles_without_page_cross() {
        // BEQ +2 (not taken), BNE +2 (taken, same page)
        let mut cpu = cpu_with_program(&[0xA9, 0x01, 0xF0, 0x02, 0xD0, 0x02]);
        cpu.step().unwrap();
        assert_eq!(cpu.step().unwrap(), 2);
        assert_eq!(cpu.pc, 0x8004);
        assert_eq!(cpu.step().unwrap(), 3);
        assert_eq!(cpu.pc, 0x8008);
    }

    #[test]
    fn test_backward_branch() {
        // DEX; BNE -3
        let mut cpu = cpu_with_program(&[0xA2, 0x03, 0xCA, 0xD0, 0xFD]);
        run(&mut cpu, 1 + 2 * 3);
        assert_eq!(cpu.x, 0);
        assert_eq!(cpu.pc, 0x8005);
    }

    #[test]
    fn test_absolute_x_page_cross_adds_cycle() {
        // LDX #$01; LDA $80FF,X (cross); LDA $8000,X (no cross)
        let mut cpu = cpu_with_program(&[0xA2, 0x01, 0xBD, 0xFF, 0x80, 0xBD, 0x00, 0x80]);
        cpu.step().unwrap();
        assert_eq!(cpu.step().unwrap(), 5);
        assert_eq!(cpu.step().unwrap(), 4);
    }

    #[test]
    fn test_store_absolute_x_is_fixed_cost() {
        // LDX #$01; STA $02FF,X; STA $0200,X
        let mut cpu = cpu_with_program(&[0xA2, 0x01, 0x9D, 0xFF, 0x02, 0x9D, 0x00, 0x02]);
        cpu.step().unwrap();
        assert_eq!(cpu.step().unwrap(), 5);
        assert_eq!(cpu.step().unwrap(), 5);
    }

    #[test]
    fn test_indirect_y_page_cross() {
        // $10/$11 -> $02FF; LDY #$01; LDA ($10),Y reads $0300
        let mut cpu = cpu_with_program(&[0xA0, 0x01, 0xB1, 0x10]);
        cpu.bus.write(0x0010, 0xFF);
        cpu.bus.write(0x0011, 0x02);
        cpu.bus.write(0x0300, 0x77);
        cpu.step().unwrap();
        assert_eq!(cpu.step().unwrap(), 6);
        assert_eq!(cpu.a, 0x77);
    }

    #[test]
    fn test_indirect_x_wraps_in_zero_page() {
        // LDX #$01; LDA ($FE,X) -> pointer at $FF/$00
        let mut cpu = cpu_with_program(&[0xA2, 0x01, 0xA1, 0xFE]);
        cpu.bus.write(0x00FF, 0x34);
        cpu.bus.write(0x0000, 0x02);
        cpu.bus.write(0x0234, 0x99);
        run(&mut cpu, 2);
        assert_eq!(cpu.a, 0x99);
    }

    #[test]
    fn test_jsr_rts_round_trip() {
        let mut image = nrom_program(0x8000, &[0x20, 0x00, 0x90]);
        // iNESヘッダー16バイト + ($9000 - $8000)
        image[16 + 0x1000] = 0x60;
        let mut cpu = cpu_from_image(&image);
        let sp = cpu.sp;

        assert_eq!(cpu.step().unwrap(), 6);
        assert_eq!(cpu.pc, 0x9000);
        assert_eq!(cpu.sp, sp.wrapping_sub(2));
        // 戻り先-1がスタックに積まれる
        assert_eq!(cpu.bus.read(0x01FD), 0x80);
        assert_eq!(cpu.bus.read(0x01FC), 0x02);

        assert_eq!(cpu.step().unwrap(), 6);
        assert_eq!(cpu.pc, 0x8003);
        assert_eq!(cpu.sp, sp);
    }

    #[test]
    fn test_jmp_indirect_page_bug() {
        let mut cpu = cpu_with_program(&[0x6C, 0xFF, 0x02]);
        cpu.bus.write(0x02FF, 0x34);
        cpu.bus.write(0x0200, 0x12);
        cpu.bus.write(0x0300, 0x56);
        assert_eq!(cpu.step().unwrap(), 5);
        assert_eq!(cpu.pc, 0x1234);
    }

    #[test]
    fn test_php_plp_break_flag() {
        // PHP; PLP
        let mut cpu = cpu_with_program(&[0x08, 0x28]);
        cpu.flags.c = true;
        cpu.step().unwrap();
        assert_eq!(cpu.bus.read(0x01FD), 0x35);
        cpu.step().unwrap();
        assert!(!cpu.flags.b);
        assert!(cpu.flags.c);
        assert_eq!(cpu.sp, 0xFD);
    }

    #[test]
    fn test_brk_pushes_pc_plus_two_and_flags() {
        let mut cpu = cpu_with_program(&[0x00]);
        cpu.flags.i = false;
        assert_eq!(cpu.step().unwrap(), 7);
        // IRQベクタは$8000
        assert_eq!(cpu.pc, 0x8000);
        assert!(cpu.flags.i);
        assert_eq!(cpu.bus.read(0x01FD), 0x80);
        assert_eq!(cpu.bus.read(0x01FC), 0x02);
        assert_eq!(cpu.bus.read(0x01FB), 0x30);
        assert_eq!(cpu.sp, 0xFA);
    }

    #[test]
    fn test_nmi_pushes_break_clear_and_rti_restores() {
        // $8000: NOP; RTI at $8001 is not reached through NMI here
        let mut cpu = cpu_with_program(&[0xEA, 0x40]);
        cpu.step().unwrap();
        cpu.flags.c = true;
        assert_eq!(cpu.nmi(), 7);
        assert_eq!(cpu.bus.read(0x01FB) & Flags::BREAK, 0);
        assert_eq!(cpu.bus.read(0x01FB) & Flags::UNUSED, Flags::UNUSED);
        assert_eq!(cpu.pc, 0x8000);

        // jump to the RTI
        cpu.pc = 0x8001;
        cpu.flags.c = false;
        assert_eq!(cpu.step().unwrap(), 6);
        assert_eq!(cpu.pc, 0x8001);
        assert!(cpu.flags.c);
        assert!(!cpu.flags.b);
    }

    #[test]
    fn test_irq_respects_interrupt_disable() {
        let mut cpu = cpu_with_program(&[]);
        assert!(cpu.flags.i);
        assert_eq!(cpu.irq(), 0);
        assert_eq!(cpu.sp, 0xFD);
        cpu.flags.i = false;
        assert_eq!(cpu.irq(), 7);
        assert_eq!(cpu.sp, 0xFA);
    }

    #[test]
    fn test_shift_and_rotate() {
        // SEC; LDA #$81; ROL A -> $03 C=1; ROR A -> $81 C=1; LSR A -> $40 C=1 N=0
        let mut cpu = cpu_with_program(&[0x38, 0xA9, 0x81, 0x2A, 0x6A, 0x4A]);
        run(&mut cpu, 3);
        assert_eq!(cpu.a, 0x03);
        assert!(cpu.flags.c);
        cpu.step().unwrap();
        assert_eq!(cpu.a, 0x81);
        assert!(cpu.flags.c);
        cpu.step().unwrap();
        assert_eq!(cpu.a, 0x40);
        assert!(cpu.flags.c);
        assert!(!cpu.flags.n);
    }

    #[test]
    fn test_memory_read_modify_write() {
        // INC $10; ASL $10; DEC $10
        let mut cpu = cpu_with_program(&[0xE6, 0x10, 0x06, 0x10, 0xC6, 0x10]);
        cpu.bus.write(0x0010, 0x40);
        assert_eq!(run(&mut cpu, 3), 15);
        assert_eq!(cpu.bus.read(0x0010), 0x81);
        assert!(cpu.flags.n);
    }

    #[test]
    fn test_stack_pointer_wraps_in_page_one() {
        // TXS with X=0; PHA
        let mut cpu = cpu_with_program(&[0xA2, 0x00, 0x9A, 0xA9, 0x42, 0x48]);
        run(&mut cpu, 4);
        assert_eq!(cpu.bus.read(0x0100), 0x42);
        assert_eq!(cpu.sp, 0xFF);
    }

    #[test]
    fn test_undocumented_lax_sax_dcp_isb() {
        // LAX $10; SAX $11; DCP $12; ISB $13
        let mut cpu = cpu_with_program(&[0xA7, 0x10, 0x87, 0x11, 0xC7, 0x12, 0xE7, 0x13]);
        cpu.bus.write(0x0010, 0x0F);
        cpu.bus.write(0x0012, 0x10);
        cpu.bus.write(0x0013, 0x01);

        cpu.step().unwrap();
        assert_eq!((cpu.a, cpu.x), (0x0F, 0x0F));
        cpu.step().unwrap();
        assert_eq!(cpu.bus.read(0x0011), 0x0F);
        cpu.step().unwrap();
        assert_eq!(cpu.bus.read(0x0012), 0x0F);
        assert!(cpu.flags.z && cpu.flags.c);
        // A=$0F - $02 - (1-C) = $0D
        cpu.step().unwrap();
        assert_eq!(cpu.bus.read(0x0013), 0x02);
        assert_eq!(cpu.a, 0x0D);
    }

    #[test]
    fn test_undocumented_nop_consumes_operand() {
        // NOP $10,X (4 cycles); NOP #$00; NOP $80FF,X with X=1 (page cross)
        let mut cpu = cpu_with_program(&[0xA2, 0x01, 0x14, 0x10, 0x80, 0x00, 0x1C, 0xFF, 0x80]);
        cpu.step().unwrap();
        assert_eq!(cpu.step().unwrap(), 4);
        assert_eq!(cpu.step().unwrap(), 2);
        assert_eq!(cpu.step().unwrap(), 5);
        assert_eq!(cpu.pc, 0x8009);
    }

    #[test]
    fn test_invalid_opcode_is_an_error() {
        let mut cpu = cpu_with_program(&[0x02]);
        match cpu.step() {
            Err(NesError::UnimplementedOpcode { opcode, pc }) => {
                assert_eq!(opcode, 0x02);
                assert_eq!(pc, 0x8000);
            }
            other => panic!("expected UnimplementedOpcode, got {:?}", other),
        }
    }
}
