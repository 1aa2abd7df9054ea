use crate::core::error::PacketError;
use std::net::Ipv4Addr;

/// オプション無しの IPv4 ヘッダー長
pub const IPV4_HEADER_LEN: usize = 20;
pub const IPV4_VERSION: u8 = 4;
/// ヘッダー長 (32ビットワード単位)
pub const IPV4_MIN_IHL: u8 = 5;
pub const IP_PROTOCOL_UDP: u8 = 17;
/// Don't Fragment フラグ (3ビットのフラグフィールド内)
pub const FLAG_DONT_FRAGMENT: u8 = 0b010;

// ヘッダー内のバイトオフセット
pub const CHECKSUM_OFFSET: usize = 10;
pub const SOURCE_OFFSET: usize = 12;
pub const DESTINATION_OFFSET: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IPv4Header {
    pub version: u8,
    pub ihl: u8,
    pub dscp: u8,
    pub ecn: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags: u8,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl IPv4Header {
    /// ネットワークバイトオーダーで `buffer` の先頭20バイトに書き込む
    pub fn encode(&self, buffer: &mut [u8]) -> Result<(), PacketError> {
        if buffer.len() < IPV4_HEADER_LEN {
            return Err(PacketError::Truncated {
                what: "IPv4ヘッダー",
                needed: IPV4_HEADER_LEN,
                actual: buffer.len(),
            });
        }

        // バージョンとIHL
        buffer[0] = ((self.version & 0x0f) << 4) | (self.ihl & 0x0f);

        // DSCP と ECN
        buffer[1] = ((self.dscp & 0x3f) << 2) | (self.ecn & 0x03);

        // 合計長
        buffer[2..4].copy_from_slice(&self.total_length.to_be_bytes());

        // 識別子
        buffer[4..6].copy_from_slice(&self.identification.to_be_bytes());

        // フラグとフラグメントオフセット
        let flags_offset = (((self.flags & 0x07) as u16) << 13) | (self.fragment_offset & 0x1fff);
        buffer[6..8].copy_from_slice(&flags_offset.to_be_bytes());

        // TTL, プロトコル, チェックサム
        buffer[8] = self.ttl;
        buffer[9] = self.protocol;
        buffer[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&self.checksum.to_be_bytes());

        // 送信元IPアドレス
        buffer[SOURCE_OFFSET..SOURCE_OFFSET + 4].copy_from_slice(&self.source.octets());

        // 宛先IPアドレス
        buffer[DESTINATION_OFFSET..DESTINATION_OFFSET + 4].copy_from_slice(&self.destination.octets());

        Ok(())
    }

    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), PacketError> {
        if data.len() < IPV4_HEADER_LEN {
            return Err(PacketError::Truncated {
                what: "IPv4ヘッダー",
                needed: IPV4_HEADER_LEN,
                actual: data.len(),
            });
        }

        let version = (data[0] >> 4) & 0xf;
        let ihl = data[0] & 0xf;
        let dscp = data[1] >> 2;
        let ecn = data[1] & 0x3;
        let total_length = u16::from_be_bytes([data[2], data[3]]);
        let identification = u16::from_be_bytes([data[4], data[5]]);
        let flags = (data[6] >> 5) & 0x7;
        let fragment_offset = u16::from_be_bytes([data[6] & 0x1f, data[7]]);
        let ttl = data[8];
        let protocol = data[9];
        let checksum = u16::from_be_bytes([data[10], data[11]]);
        let source = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
        let destination = Ipv4Addr::new(data[16], data[17], data[18], data[19]);

        // オプション付きヘッダーの場合も IHL 分だけ読み飛ばす
        let header_len = (ihl as usize) * 4;
        if header_len < IPV4_HEADER_LEN || data.len() < header_len {
            return Err(PacketError::Truncated {
                what: "IPv4オプション",
                needed: header_len.max(IPV4_HEADER_LEN),
                actual: data.len(),
            });
        }

        Ok((
            Self {
                version,
                ihl,
                dscp,
                ecn,
                total_length,
                identification,
                flags,
                fragment_offset,
                ttl,
                protocol,
                checksum,
                source,
                destination,
            },
            &data[header_len..],
        ))
    }
}
