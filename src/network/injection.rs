use crate::core::error::TransportError;
use crate::network::packet::Packet;
use log::{error, info};
use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::transport::{transport_channel, TransportChannelType, TransportSender};
use std::io;
use std::net::{IpAddr, SocketAddrV4};

/// IPPROTO_RAW: 送信専用、IPヘッダーはアプリケーション側で用意する
const IPPROTO_RAW: u8 = 255;

/// ヘッダー込みのIPパケットを送信できるチャネル
pub trait RawChannel {
    fn send_to(&mut self, packet: &[u8], destination: SocketAddrV4) -> io::Result<usize>;
}

/// RAWチャネルを開く。開いたチャネルはドロップ時に閉じられる
pub trait ChannelOpener {
    type Channel: RawChannel;

    fn open(&self) -> io::Result<Self::Channel>;
}

/// pnet のレイヤー3トランスポートチャネル (IP_HDRINCL 付きの RAW ソケット)
pub struct PnetOpener {
    buffer_size: usize,
}

impl Default for PnetOpener {
    fn default() -> Self {
        Self { buffer_size: 4096 }
    }
}

impl ChannelOpener for PnetOpener {
    type Channel = PnetChannel;

    fn open(&self) -> io::Result<PnetChannel> {
        let channel_type = TransportChannelType::Layer3(IpNextHeaderProtocol::new(IPPROTO_RAW));
        // 受信側は使わないのでその場で破棄する
        let (tx, _) = transport_channel(self.buffer_size, channel_type)?;
        Ok(PnetChannel { tx })
    }
}

pub struct PnetChannel {
    tx: TransportSender,
}

impl RawChannel for PnetChannel {
    fn send_to(&mut self, packet: &[u8], destination: SocketAddrV4) -> io::Result<usize> {
        let ipv4 = Ipv4Packet::new(packet).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "IPv4パケットとして短すぎます")
        })?;
        // RAWソケットではポートは使われない (UDPヘッダー内に含まれる)
        self.tx.send_to(ipv4, IpAddr::V4(*destination.ip()))
    }
}

pub struct PacketInjector<O: ChannelOpener = PnetOpener> {
    opener: O,
    destination: SocketAddrV4,
}

impl PacketInjector<PnetOpener> {
    pub fn raw(destination: SocketAddrV4) -> Self {
        Self::new(PnetOpener::default(), destination)
    }
}

impl<O: ChannelOpener> PacketInjector<O> {
    pub fn new(opener: O, destination: SocketAddrV4) -> Self {
        Self {
            opener,
            destination,
        }
    }

    pub fn destination(&self) -> SocketAddrV4 {
        self.destination
    }

    /// RAWソケットを開く。失敗した場合は何も送信しない
    pub fn open(&self) -> Result<O::Channel, TransportError> {
        match self.opener.open() {
            Ok(channel) => {
                info!("RAWソケットを作成しました");
                Ok(channel)
            }
            Err(e) => {
                let err = TransportError::socket_creation(e);
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// パケットを1回だけ送信する (再送はしない)
    pub fn send(&self, channel: &mut O::Channel, packet: &Packet) -> Result<usize, TransportError> {
        let sent = channel.send_to(packet.as_bytes(), self.destination).map_err(|e| {
            let err = TransportError::send(e);
            error!("{}", err);
            err
        })?;

        if sent != packet.len() {
            let err = TransportError::ShortSend {
                sent,
                expected: packet.len(),
            };
            error!("{}", err);
            return Err(err);
        }

        info!("{} へ {} バイト送信しました", self.destination, sent);
        Ok(sent)
    }
}
