use crate::core::config::Configuration;
use crate::core::error::PacketError;
use crate::network::packet::ipv4::{
    IPv4Header, FLAG_DONT_FRAGMENT, IPV4_HEADER_LEN, IPV4_MIN_IHL, IPV4_VERSION, IP_PROTOCOL_UDP,
};
use crate::network::packet::udp::{UDPHeader, UDP_HEADER_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    pub ipv4: IPv4Header,
    pub udp: UDPHeader,
}

/// 設定値から IPv4 / UDP ヘッダーを組み立てる
pub struct HeaderBuilder<'a> {
    config: &'a Configuration,
}

impl<'a> HeaderBuilder<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        Self { config }
    }

    /// チェックサムは0のまま返す (PacketAssembler が後で書き込む)
    pub fn build(&self, payload_len: usize) -> Result<Headers, PacketError> {
        let udp_length = to_u16("UDP長", UDP_HEADER_LEN + payload_len)?;
        let total_length = to_u16("IPv4合計長", IPV4_HEADER_LEN + UDP_HEADER_LEN + payload_len)?;

        let ip = &self.config.ip;
        let endpoint = &self.config.endpoint;

        let ipv4 = IPv4Header {
            version: IPV4_VERSION,
            ihl: IPV4_MIN_IHL,
            dscp: ip.dscp,
            ecn: ip.ecn,
            total_length,
            identification: ip.identification,
            flags: if ip.dont_fragment { FLAG_DONT_FRAGMENT } else { 0 },
            fragment_offset: 0,
            ttl: ip.ttl,
            protocol: IP_PROTOCOL_UDP,
            checksum: 0,
            source: endpoint.source_addr,
            destination: endpoint.destination_addr,
        };

        let udp = UDPHeader {
            source_port: endpoint.source_port,
            destination_port: endpoint.destination_port,
            length: udp_length,
            checksum: 0,
        };

        Ok(Headers { ipv4, udp })
    }
}

/// 切り捨てずに16ビットへ変換する
fn to_u16(field: &'static str, value: usize) -> Result<u16, PacketError> {
    u16::try_from(value).map_err(|_| PacketError::LengthOverflow { field, value })
}
