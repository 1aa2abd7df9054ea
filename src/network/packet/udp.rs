use crate::core::error::PacketError;

pub const UDP_HEADER_LEN: usize = 8;
pub const LENGTH_OFFSET: usize = 4;
pub const CHECKSUM_OFFSET: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UDPHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
    pub checksum: u16,
}

impl UDPHeader {
    pub fn encode(&self, buffer: &mut [u8]) -> Result<(), PacketError> {
        if buffer.len() < UDP_HEADER_LEN {
            return Err(PacketError::Truncated {
                what: "UDPヘッダー",
                needed: UDP_HEADER_LEN,
                actual: buffer.len(),
            });
        }

        // 送信元ポートと宛先ポート
        buffer[0..2].copy_from_slice(&self.source_port.to_be_bytes());
        buffer[2..4].copy_from_slice(&self.destination_port.to_be_bytes());

        // 長さとチェックサム
        buffer[LENGTH_OFFSET..LENGTH_OFFSET + 2].copy_from_slice(&self.length.to_be_bytes());
        buffer[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&self.checksum.to_be_bytes());

        Ok(())
    }

    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), PacketError> {
        if data.len() < UDP_HEADER_LEN {
            return Err(PacketError::Truncated {
                what: "UDPヘッダー",
                needed: UDP_HEADER_LEN,
                actual: data.len(),
            });
        }

        let source_port = u16::from_be_bytes([data[0], data[1]]);
        let destination_port = u16::from_be_bytes([data[2], data[3]]);
        let length = u16::from_be_bytes([data[4], data[5]]);
        let checksum = u16::from_be_bytes([data[6], data[7]]);

        Ok((
            Self {
                source_port,
                destination_port,
                length,
                checksum,
            },
            &data[UDP_HEADER_LEN..],
        ))
    }
}
