use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("環境変数 {key} の値が不正です ({value}): {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{name} が範囲外です: {value} (許容範囲: {range})")]
    OutOfRange {
        name: &'static str,
        value: usize,
        range: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("{what} のパースに失敗しました: {needed} バイト必要ですが {actual} バイトしかありません")]
    Truncated {
        what: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("{field} は16ビットで表現できません: {value}")]
    LengthOverflow { field: &'static str, value: usize },

    #[error("組み立てたパケットのチェックサム検証に失敗しました")]
    ChecksumMismatch,

    #[error("{field} が実際のサイズと一致しません: ヘッダー値 {header}, 実際 {actual}")]
    LengthMismatch {
        field: &'static str,
        header: usize,
        actual: usize,
    },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("RAWソケットの作成に失敗しました (OSエラーコード: {code}): {source}")]
    SocketCreation {
        code: i32,
        #[source]
        source: io::Error,
    },

    #[error("パケットの送信に失敗しました (OSエラーコード: {code}): {source}")]
    Send {
        code: i32,
        #[source]
        source: io::Error,
    },

    #[error("パケットの一部しか送信されませんでした: {sent}/{expected} バイト")]
    ShortSend { sent: usize, expected: usize },
}

impl TransportError {
    pub fn socket_creation(source: io::Error) -> Self {
        TransportError::SocketCreation {
            code: os_error_code(&source),
            source,
        }
    }

    pub fn send(source: io::Error) -> Self {
        TransportError::Send {
            code: os_error_code(&source),
            source,
        }
    }

    /// OSから取得したエラーコード (取得できない場合は -1)
    pub fn code(&self) -> i32 {
        match self {
            TransportError::SocketCreation { code, .. } | TransportError::Send { code, .. } => *code,
            TransportError::ShortSend { .. } => 0,
        }
    }
}

fn os_error_code(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(-1)
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("設定エラー: {0}")]
    Config(#[from] ConfigError),

    #[error("パケット構築エラー: {0}")]
    Packet(#[from] PacketError),

    #[error("送信エラー: {0}")]
    Transport(#[from] TransportError),
}

impl ProcessError {
    /// プロセスの終了コード (成功時は0)
    pub fn exit_code(&self) -> u8 {
        match self {
            ProcessError::Config(_) => 2,
            ProcessError::Packet(_) => 3,
            ProcessError::Transport(TransportError::SocketCreation { .. }) => 4,
            ProcessError::Transport(_) => 5,
        }
    }
}

pub type SenderResult<T> = Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let creation = ProcessError::from(TransportError::socket_creation(io::Error::from_raw_os_error(1)));
        let send = ProcessError::from(TransportError::send(io::Error::from_raw_os_error(101)));
        let short = ProcessError::from(TransportError::ShortSend { sent: 20, expected: 44 });

        assert_ne!(creation.exit_code(), 0);
        assert_ne!(send.exit_code(), 0);
        assert_ne!(creation.exit_code(), send.exit_code());
        assert_eq!(send.exit_code(), short.exit_code());
    }

    #[test]
    fn test_os_error_code_is_kept() {
        let err = TransportError::socket_creation(io::Error::from_raw_os_error(13));
        assert_eq!(err.code(), 13);

        let err = TransportError::send(io::Error::new(io::ErrorKind::Other, "no code"));
        assert_eq!(err.code(), -1);
    }
}
