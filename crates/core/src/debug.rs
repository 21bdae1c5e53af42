//! # デバッグ支援
//! セッションごとのデバッグ設定と統計、nestest形式のトレース、逆アセンブラ。

use crate::bus::Bus;
use crate::cpu::{Cpu, Mode, INSTRUCTIONS};

/// `Nes`が所有するデバッグ設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DebugConfig {
    /// 1命令ごとにtraceレベルでログを出す
    pub trace_cpu: bool,
    /// このフレーム番号に達してからトレースを始める
    pub trace_from_frame: u64,
    /// 未実装オペコードでエラーを返す（falseなら2サイクルのNOP扱い）
    pub halt_on_unimplemented: bool,
}

impl DebugConfig {
    pub fn should_trace(&self, frame: u64) -> bool {
        self.trace_cpu && frame >= self.trace_from_frame
    }
}

/// 実行統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics {
    pub frames: u64,
    pub instructions: u64,
    pub nmis: u64,
    pub irqs: u64,
    pub oam_dmas: u64,
    pub unimplemented: u64,
}

/// `pc`の命令を (命令長, アセンブリ表記) に変換する。副作用なし。
fn format_instruction(bus: &Bus, pc: u16) -> (u16, String) {
    let opcode = bus.peek(pc);
    let instruction = INSTRUCTIONS[opcode as usize];
    if !instruction.is_valid() {
        return (1, format!(".DB ${:02X}", opcode));
    }

    let lo = bus.peek(pc.wrapping_add(1));
    let hi = bus.peek(pc.wrapping_add(2));
    let word = u16::from_le_bytes([lo, hi]);
    let operand = match instruction.mode {
        Mode::Implied => String::new(),
        Mode::Accumulator => "A".to_string(),
        Mode::Immediate => format!("#${:02X}", lo),
        Mode::ZeroPage => format!("${:02X}", lo),
        Mode::ZeroPageX => format!("${:02X},X", lo),
        Mode::ZeroPageY => format!("${:02X},Y", lo),
        Mode::Relative => {
            let target = pc.wrapping_add(2).wrapping_add(lo as i8 as u16);
            format!("${:04X}", target)
        }
        Mode::Absolute => format!("${:04X}", word),
        Mode::AbsoluteX => format!("${:04X},X", word),
        Mode::AbsoluteY => format!("${:04X},Y", word),
        Mode::Indirect => format!("(${:04X})", word),
        Mode::IndirectX => format!("(${:02X},X)", lo),
        Mode::IndirectY => format!("(${:02X}),Y", lo),
    };

    let marker = if instruction.official { "" } else { "*" };
    let text = if operand.is_empty() {
        format!("{}{}", marker, instruction.mnemonic)
    } else {
        format!("{}{} {}", marker, instruction.mnemonic, operand)
    };
    (instruction.len(), text)
}

/// `addr`から`count`命令を逆アセンブルする
pub fn disassemble(bus: &Bus, addr: u16, count: usize) -> Vec<(u16, String)> {
    let mut result = Vec::with_capacity(count);
    let mut pc = addr;
    for _ in 0..count {
        let (len, text) = format_instruction(bus, pc);
        result.push((pc, text));
        pc = pc.wrapping_add(len);
    }
    result
}

/// nestest.log形式の1行
/// `C000  4C F5 C5  JMP $C5F5    A:00 X:00 Y:00 P:24 SP:FD PPU:  0, 21 CYC:7`
pub fn trace_line(cpu: &Cpu) -> String {
    let bus = &cpu.bus;
    let (len, text) = format_instruction(bus, cpu.pc);
    let bytes = (0..len)
        .map(|i| format!("{:02X}", bus.peek(cpu.pc.wrapping_add(i))))
        .collect::<Vec<_>>()
        .join(" ");
    // 非公式命令はニーモニックの直前に'*'が来る
    let (marker, body) = match text.strip_prefix('*') {
        Some(body) => ('*', body),
        None => (' ', text.as_str()),
    };

    format!(
        "{:04X}  {:<8} {}{:<32}A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} PPU:{:>3},{:>3} CYC:{}",
        cpu.pc,
        bytes,
        marker,
        body,
        cpu.a,
        cpu.x,
        cpu.y,
        cpu.flags.to_byte(),
        cpu.sp,
        bus.ppu.scanline(),
        bus.ppu.cycle(),
        bus.cycles(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::test_rom::nrom_program;
    use crate::cartridge::Cartridge;

    fn cpu_with(program: &[u8]) -> Cpu {
        let image = nrom_program(0x8000, program);
        let mut cpu = Cpu::new(Bus::new(Cartridge::from_ines(&image).unwrap()));
        cpu.reset();
        cpu
    }

    #[test]
    fn test_disassemble_modes() {
        let cpu = cpu_with(&[
            0xA9, 0x10, // LDA #$10
            0x8D, 0x00, 0x02, // STA $0200
            0xB1, 0x20, // LDA ($20),Y
            0x0A, // ASL A
            0xD0, 0xF6, // BNE $8000
            0x6C, 0xFF, 0x02, // JMP ($02FF)
            0xA7, 0x10, // *LAX $10
            0x02, // invalid
        ]);
        let lines = disassemble(&cpu.bus, 0x8000, 8);
        let text: Vec<_> = lines.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(
            text,
            vec![
                "LDA #$10",
                "STA $0200",
                "LDA ($20),Y",
                "ASL A",
                "BNE $8000",
                "JMP ($02FF)",
                "*LAX $10",
                ".DB $02",
            ]
        );
        assert_eq!(lines[1].0, 0x8002);
        assert_eq!(lines[7].0, 0x800F);
    }

    #[test]
    fn test_trace_line_layout() {
        let cpu = cpu_with(&[0x4C, 0xF5, 0x85]);
        let line = trace_line(&cpu);
        assert!(line.starts_with("8000  4C F5 85  JMP $85F5"), "{}", line);
        assert!(line.contains("A:00 X:00 Y:00 P:24 SP:FD"), "{}", line);
        assert!(line.ends_with("CYC:0"), "{}", line);
        let registers = line.find("A:00").unwrap();
        assert_eq!(registers, 48);
    }

    #[test]
    fn test_trace_line_marks_undocumented() {
        let cpu = cpu_with(&[0x04, 0x10]);
        let line = trace_line(&cpu);
        assert!(line.starts_with("8000  04 10    *NOP $10"), "{}", line);
    }

    #[test]
    fn test_trace_does_not_disturb_ppu() {
        let mut cpu = cpu_with(&[0xAD, 0x02, 0x20]);
        cpu.bus.tick(28_000);
        assert!(cpu.bus.ppu.status().vblank());
        let _ = trace_line(&cpu);
        let _ = disassemble(&cpu.bus, 0x2000, 8);
        assert!(cpu.bus.ppu.status().vblank());
    }

    #[test]
    fn test_should_trace_respects_start_frame() {
        let config = DebugConfig {
            trace_cpu: true,
            trace_from_frame: 10,
            ..Default::default()
        };
        assert!(!config.should_trace(9));
        assert!(config.should_trace(10));
        assert!(!DebugConfig::default().should_trace(100));
    }
}
