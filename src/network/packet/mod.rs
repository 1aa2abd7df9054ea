pub mod ipv4;
pub mod udp;

use crate::core::config::UdpChecksumMode;
use crate::core::error::PacketError;
use crate::network::builder::Headers;
use crate::network::checksum::calculate_checksum;
use ipv4::{IPv4Header, IPV4_HEADER_LEN};
use udp::{UDPHeader, UDP_HEADER_LEN};

/// IPv4ヘッダー ‖ UDPヘッダー ‖ ペイロード を1つにまとめた送信用バッファ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    buffer: Vec<u8>,
}

impl Packet {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn ipv4_header(&self) -> &[u8] {
        &self.buffer[..IPV4_HEADER_LEN]
    }

    /// UDPヘッダー + ペイロード
    pub fn udp_segment(&self) -> &[u8] {
        &self.buffer[IPV4_HEADER_LEN..]
    }

    pub fn ipv4_checksum(&self) -> u16 {
        read_u16(&self.buffer, ipv4::CHECKSUM_OFFSET)
    }

    pub fn udp_checksum(&self) -> u16 {
        read_u16(&self.buffer, IPV4_HEADER_LEN + udp::CHECKSUM_OFFSET)
    }

    /// 長さフィールドとチェックサムを再検証する
    pub fn verify(&self, mode: UdpChecksumMode) -> Result<bool, PacketError> {
        let (ip, rest) = IPv4Header::parse(&self.buffer)?;
        let (udp, _) = UDPHeader::parse(rest)?;

        if ip.total_length as usize != self.buffer.len() {
            return Err(PacketError::LengthMismatch {
                field: "IPv4合計長",
                header: ip.total_length as usize,
                actual: self.buffer.len(),
            });
        }
        if udp.length as usize != rest.len() {
            return Err(PacketError::LengthMismatch {
                field: "UDP長",
                header: udp.length as usize,
                actual: rest.len(),
            });
        }

        // 正しいチェックサムを含むデータを再計算すると0になる
        let header_ok = calculate_checksum(self.ipv4_header()) == 0;
        let udp_ok = match mode {
            UdpChecksumMode::PseudoHeader => {
                calculate_checksum(&pseudo_header_segment(&self.buffer)) == 0
            }
            UdpChecksumMode::SegmentOnly => calculate_checksum(self.udp_segment()) == 0,
            UdpChecksumMode::Disabled => udp.checksum == 0,
        };

        Ok(header_ok && udp_ok)
    }

    /// デバッグ出力用の16進ダンプ
    pub fn hex_dump(&self) -> String {
        self.buffer
            .chunks(16)
            .enumerate()
            .map(|(line, chunk)| {
                let bytes: Vec<String> = chunk.iter().map(|byte| format!("{:02x}", byte)).collect();
                format!("{:04x}: {}\n", line * 16, bytes.join(" "))
            })
            .collect()
    }
}

pub struct PacketAssembler {
    checksum_mode: UdpChecksumMode,
}

impl PacketAssembler {
    pub fn new(checksum_mode: UdpChecksumMode) -> Self {
        Self { checksum_mode }
    }

    /// ヘッダーとペイロードを配置し、チェックサムを書き込んだパケットを返す
    pub fn assemble(&self, headers: &Headers, payload: &[u8]) -> Result<Packet, PacketError> {
        let mut packet = self.layout(headers, payload)?;
        self.write_checksums(&mut packet);
        Ok(packet)
    }

    /// チェックサム計算前のレイアウトのみを行う
    pub fn layout(&self, headers: &Headers, payload: &[u8]) -> Result<Packet, PacketError> {
        let total = IPV4_HEADER_LEN + UDP_HEADER_LEN + payload.len();

        if headers.udp.length as usize != UDP_HEADER_LEN + payload.len() {
            return Err(PacketError::LengthMismatch {
                field: "UDP長",
                header: headers.udp.length as usize,
                actual: UDP_HEADER_LEN + payload.len(),
            });
        }
        if headers.ipv4.total_length as usize != total {
            return Err(PacketError::LengthMismatch {
                field: "IPv4合計長",
                header: headers.ipv4.total_length as usize,
                actual: total,
            });
        }

        // 未初期化のバイトが送信されないようゼロで初期化する
        let mut buffer = vec![0u8; total];

        let (ip_part, rest) = buffer.split_at_mut(IPV4_HEADER_LEN);
        let (udp_part, payload_part) = rest.split_at_mut(UDP_HEADER_LEN);
        headers.ipv4.encode(ip_part)?;
        headers.udp.encode(udp_part)?;
        payload_part.copy_from_slice(payload);

        Ok(Packet { buffer })
    }

    /// UDPチェックサム、IPv4ヘッダーチェックサムの順に計算して書き戻す
    pub fn write_checksums(&self, packet: &mut Packet) {
        let udp_checksum_at = IPV4_HEADER_LEN + udp::CHECKSUM_OFFSET;

        // 計算前にチェックサムフィールドを0にする
        write_u16(&mut packet.buffer, udp_checksum_at, 0);
        write_u16(&mut packet.buffer, ipv4::CHECKSUM_OFFSET, 0);

        let udp_checksum = match self.checksum_mode {
            UdpChecksumMode::PseudoHeader => {
                // 計算結果が0の場合は 0xFFFF を送る (0 は「チェックサム無し」を意味する)
                match calculate_checksum(&pseudo_header_segment(&packet.buffer)) {
                    0 => 0xFFFF,
                    sum => sum,
                }
            }
            UdpChecksumMode::SegmentOnly => calculate_checksum(packet.udp_segment()),
            UdpChecksumMode::Disabled => 0,
        };
        write_u16(&mut packet.buffer, udp_checksum_at, udp_checksum);

        let ip_checksum = calculate_checksum(packet.ipv4_header());
        write_u16(&mut packet.buffer, ipv4::CHECKSUM_OFFSET, ip_checksum);
    }
}

/// 疑似ヘッダー ‖ UDPヘッダー ‖ ペイロード
fn pseudo_header_segment(buffer: &[u8]) -> Vec<u8> {
    let segment = &buffer[IPV4_HEADER_LEN..];
    let mut pseudo_header = Vec::with_capacity(12 + segment.len());

    // 疑似ヘッダーの構築
    pseudo_header.extend_from_slice(&buffer[ipv4::SOURCE_OFFSET..ipv4::DESTINATION_OFFSET + 4]); // 送信元と宛先IP
    pseudo_header.push(0); // ゼロパディング
    pseudo_header.push(buffer[9]); // プロトコル
    pseudo_header.extend_from_slice(&segment[udp::LENGTH_OFFSET..udp::LENGTH_OFFSET + 2]); // UDP長

    pseudo_header.extend_from_slice(segment);
    pseudo_header
}

fn read_u16(buffer: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buffer[offset], buffer[offset + 1]])
}

fn write_u16(buffer: &mut [u8], offset: usize, value: u16) {
    buffer[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}
