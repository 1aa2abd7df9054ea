use crate::core::error::TransportError;
use crate::core::{Configuration, ProcessError, SendPipeline};
use crate::network::PacketInjector;
use crate::setup_logger::setup_logger;
use log::{debug, info};
use std::process::ExitCode;

mod core;
mod network;
mod setup_logger;

fn main() -> ExitCode {
    if let Err(e) = setup_logger() {
        eprintln!("ロガーのセットアップに失敗しました: {}", e);
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("エラー: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), ProcessError> {
    // 設定の読み込み (.env と環境変数、未設定ならデフォルト値)
    let config = Configuration::from_env()?;
    info!(
        "{}:{} -> {} (TTL: {}, UDPチェックサム: {})",
        config.endpoint.source_addr,
        config.endpoint.source_port,
        config.destination(),
        config.ip.ttl,
        config.udp.checksum_mode
    );
    if let Ok(json) = serde_json::to_string(&config) {
        debug!("有効な設定: {}", json);
    }

    let injector = PacketInjector::raw(config.destination());
    let mut pipeline = SendPipeline::new(config, injector);

    // パケットの構築とチェックサム計算
    let packet = pipeline.prepare()?;
    println!("UDPHeader checksum:\t0x{:04X}", packet.udp_checksum());
    println!("IPHeader checksum:\t0x{:04X}", packet.ipv4_checksum());

    // RAWソケットで1回だけ送信
    let result = pipeline.transmit(&packet);
    match &result {
        Ok(sent) => println!("sendto: {} (0)", sent),
        Err(TransportError::SocketCreation { code, .. }) => {
            println!("socket generation failed ({})", code)
        }
        Err(TransportError::ShortSend { sent, .. }) => println!("sendto: {} (0)", sent),
        Err(e @ TransportError::Send { .. }) => println!("sendto: -1 ({})", e.code()),
    }
    debug!("最終状態: {:?} ({:?})", pipeline.state(), pipeline.history());
    println!("\nDone");

    result.map(|_| ()).map_err(ProcessError::from)
}
