use env_logger::{Builder, Env, Target};
use std::io::Write;

/// RUST_LOG が未設定の場合は info レベルで出力する
pub fn setup_logger() -> Result<(), log::SetLoggerError> {
    Builder::from_env(Env::default().default_filter_or("info"))
        // タイムスタンプ付きのフォーマット
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(), // モジュールパスが表示される
                record.args()
            )
        })
        // 状態表示は標準出力に出すので、ログは標準エラーへ
        .target(Target::Stderr)
        .try_init()
}
