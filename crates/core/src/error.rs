//! エラー型の定義

use thiserror::Error;

/// エミュレータコアのエラー型
#[derive(Error, Debug)]
pub enum NesError {
    /// iNESヘッダーやデータ長が不正（カートリッジ生成前に検出される）
    #[error("Invalid ROM format: {0}")]
    InvalidRom(String),

    /// 命令テーブルに存在しないオペコードを実行しようとした
    #[error("Unimplemented opcode {opcode:#04x} at {pc:#06x}")]
    UnimplementedOpcode { opcode: u8, pc: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result型のエイリアス
pub type Result<T> = std::result::Result<T, NesError>;
