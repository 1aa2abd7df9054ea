use crate::core::config::Configuration;
use crate::core::error::{PacketError, SenderResult, TransportError};
use crate::network::builder::HeaderBuilder;
use crate::network::injection::{ChannelOpener, PacketInjector};
use crate::network::packet::{Packet, PacketAssembler};
use log::debug;

/// 1回の実行における状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Initialized,
    SocketOpen,
    Sent,
    Failed,
    Done,
}

/// 設定 → ヘッダー構築 → パケット組み立て → 送信 を順に行う
pub struct SendPipeline<O: ChannelOpener> {
    config: Configuration,
    injector: PacketInjector<O>,
    state: RunState,
    history: Vec<RunState>,
}

impl<O: ChannelOpener> SendPipeline<O> {
    pub fn new(config: Configuration, injector: PacketInjector<O>) -> Self {
        Self {
            config,
            injector,
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    fn transition(&mut self, next: RunState) {
        debug!("状態遷移: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// ヘッダーを構築し、チェックサム付きのパケットを組み立てる
    pub fn prepare(&mut self) -> SenderResult<Packet> {
        let payload = self.config.payload_bytes();
        let mode = self.config.udp.checksum_mode;

        let built = HeaderBuilder::new(&self.config)
            .build(payload.len())
            .and_then(|headers| PacketAssembler::new(mode).assemble(&headers, &payload))
            .and_then(|packet| match packet.verify(mode)? {
                true => Ok(packet),
                false => Err(PacketError::ChecksumMismatch),
            });

        match built {
            Ok(packet) => {
                debug!("組み立てたパケット ({} バイト):\n{}", packet.len(), packet.hex_dump());
                self.transition(RunState::Initialized);
                Ok(packet)
            }
            Err(e) => {
                self.transition(RunState::Failed);
                self.transition(RunState::Done);
                Err(e.into())
            }
        }
    }

    /// ソケットを開いて1回だけ送信する。ソケットはこの関数を抜ける時に閉じられる
    pub fn transmit(&mut self, packet: &Packet) -> Result<usize, TransportError> {
        let result = self.open_and_send(packet);
        if result.is_err() {
            self.transition(RunState::Failed);
        }
        self.transition(RunState::Done);
        result
    }

    fn open_and_send(&mut self, packet: &Packet) -> Result<usize, TransportError> {
        let mut channel = self.injector.open()?;
        self.transition(RunState::SocketOpen);
        debug!("{} へ送信します", self.injector.destination());

        let sent = self.injector.send(&mut channel, packet)?;
        self.transition(RunState::Sent);

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ProcessError;
    use crate::network::injection::tests::{FakeBehavior, FakeOpener};
    use super::RunState::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn pipeline(behavior: FakeBehavior) -> SendPipeline<FakeOpener> {
        pipeline_with_close_flag(behavior).0
    }

    /// ソケットが閉じられたかを確認するためのフラグも返す
    fn pipeline_with_close_flag(behavior: FakeBehavior) -> (SendPipeline<FakeOpener>, Rc<Cell<bool>>) {
        let config = Configuration::default();
        let opener = FakeOpener::new(behavior);
        let closed = Rc::clone(&opener.closed);
        let injector = PacketInjector::new(opener, config.destination());
        (SendPipeline::new(config, injector), closed)
    }

    #[test]
    fn test_successful_run() {
        let mut pipeline = pipeline(FakeBehavior::Accept);

        let packet = pipeline.prepare().unwrap();
        assert_eq!(pipeline.state(), Initialized);
        assert_eq!(pipeline.transmit(&packet).unwrap(), 44);

        assert_eq!(pipeline.history(), &[Idle, Initialized, SocketOpen, Sent, Done]);
    }

    #[test]
    fn test_socket_creation_failure() {
        let (mut pipeline, closed) = pipeline_with_close_flag(FakeBehavior::Deny(1));

        let packet = pipeline.prepare().unwrap();
        let err = pipeline.transmit(&packet).unwrap_err();

        assert!(matches!(err, TransportError::SocketCreation { .. }));
        assert_eq!(pipeline.history(), &[Idle, Initialized, Failed, Done]);
        // ソケットが作られていないので閉じる対象も無い
        assert!(!closed.get());
    }

    #[test]
    fn test_send_failure() {
        let (mut pipeline, closed) = pipeline_with_close_flag(FakeBehavior::SendError(101));

        let packet = pipeline.prepare().unwrap();
        let err = pipeline.transmit(&packet).unwrap_err();

        assert!(matches!(err, TransportError::Send { .. }));
        assert_eq!(pipeline.history(), &[Idle, Initialized, SocketOpen, Failed, Done]);
        // 送信失敗時もソケットは閉じられている
        assert!(closed.get());
    }

    #[test]
    fn test_failures_are_distinguishable() {
        let mut denied = pipeline(FakeBehavior::Deny(1));
        let packet = denied.prepare().unwrap();
        let denied_err = ProcessError::from(denied.transmit(&packet).unwrap_err());

        let mut rejected = pipeline(FakeBehavior::SendError(101));
        let packet = rejected.prepare().unwrap();
        let rejected_err = ProcessError::from(rejected.transmit(&packet).unwrap_err());

        assert_ne!(denied_err.exit_code(), 0);
        assert_ne!(rejected_err.exit_code(), 0);
        assert_ne!(denied_err.exit_code(), rejected_err.exit_code());
    }

    #[test]
    fn test_prepare_failure_ends_run() {
        let mut config = Configuration::default();
        // 検証を経由せずに溢れる長さを渡す
        config.payload.padded_len = u16::MAX as usize;
        let injector = PacketInjector::new(FakeOpener::new(FakeBehavior::Accept), config.destination());
        let mut pipeline = SendPipeline::new(config, injector);

        let err = pipeline.prepare().unwrap_err();
        assert!(matches!(err, ProcessError::Packet(_)));
        assert_eq!(pipeline.history(), &[Idle, Failed, Done]);
    }
}
