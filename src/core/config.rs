use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

/// IPv4 の合計長 (16ビット) に収まる UDP ペイロードの最大長
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - 20 - 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub endpoint: EndpointConfig,
    pub ip: IpConfig,
    pub udp: UdpConfig,
    pub payload: PayloadConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub source_addr: Ipv4Addr,
    pub source_port: u16,
    pub destination_addr: Ipv4Addr,
    pub destination_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    pub ttl: u8,
    pub identification: u16,
    pub dscp: u8,
    pub ecn: u8,
    pub dont_fragment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpConfig {
    pub checksum_mode: UdpChecksumMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadConfig {
    pub data: Vec<u8>,
    /// この長さまでゼロで埋める (data より短い場合は埋めない)
    pub padded_len: usize,
}

/// UDP チェックサムの計算方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UdpChecksumMode {
    /// RFC 768: 疑似ヘッダー + UDPヘッダー + ペイロード
    PseudoHeader,
    /// 疑似ヘッダーを含めず UDPヘッダー + ペイロードのみ
    SegmentOnly,
    /// チェックサムを送信しない (0)
    Disabled,
}

impl fmt::Display for UdpChecksumMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UdpChecksumMode::PseudoHeader => "pseudo-header",
            UdpChecksumMode::SegmentOnly => "segment-only",
            UdpChecksumMode::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

impl FromStr for UdpChecksumMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pseudo-header" | "pseudo" => Ok(UdpChecksumMode::PseudoHeader),
            "segment-only" | "segment" => Ok(UdpChecksumMode::SegmentOnly),
            "disabled" | "off" | "none" => Ok(UdpChecksumMode::Disabled),
            other => Err(format!("未知のチェックサムモードです: {}", other)),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            endpoint: EndpointConfig {
                source_addr: Ipv4Addr::new(1, 0, 0, 127),
                source_port: 34567,
                destination_addr: Ipv4Addr::new(1, 0, 0, 127),
                destination_port: 34568,
            },
            ip: IpConfig {
                ttl: 65,
                identification: 54321,
                dscp: 0,
                ecn: 0,
                dont_fragment: false,
            },
            udp: UdpConfig {
                checksum_mode: UdpChecksumMode::PseudoHeader,
            },
            payload: PayloadConfig {
                data: b"Lets go\n".to_vec(),
                padded_len: 16,
            },
        }
    }
}

impl Configuration {
    /// `.env` ファイルと環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        // .envファイルが無くてもデフォルト値で動作する
        dotenv::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数から設定を読み込む。未設定の項目はデフォルト値を使う
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Configuration::default();

        let config = Configuration {
            endpoint: EndpointConfig {
                source_addr: parse_var(&lookup, "RAW_UDP_SRC_ADDR", defaults.endpoint.source_addr)?,
                source_port: parse_var(&lookup, "RAW_UDP_SRC_PORT", defaults.endpoint.source_port)?,
                destination_addr: parse_var(&lookup, "RAW_UDP_DST_ADDR", defaults.endpoint.destination_addr)?,
                destination_port: parse_var(&lookup, "RAW_UDP_DST_PORT", defaults.endpoint.destination_port)?,
            },
            ip: IpConfig {
                ttl: parse_var(&lookup, "RAW_UDP_TTL", defaults.ip.ttl)?,
                identification: parse_var(&lookup, "RAW_UDP_IDENT", defaults.ip.identification)?,
                dscp: parse_var(&lookup, "RAW_UDP_DSCP", defaults.ip.dscp)?,
                ecn: parse_var(&lookup, "RAW_UDP_ECN", defaults.ip.ecn)?,
                dont_fragment: parse_var(&lookup, "RAW_UDP_DONT_FRAGMENT", defaults.ip.dont_fragment)?,
            },
            udp: UdpConfig {
                checksum_mode: parse_var(&lookup, "RAW_UDP_CHECKSUM_MODE", defaults.udp.checksum_mode)?,
            },
            payload: PayloadConfig {
                data: lookup("RAW_UDP_PAYLOAD")
                    .map(String::into_bytes)
                    .unwrap_or(defaults.payload.data),
                padded_len: parse_var(&lookup, "RAW_UDP_PAYLOAD_LEN", defaults.payload.padded_len)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// 各フィールドが書き込み先のビット幅に収まるか検証する
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ip.dscp > 0x3F {
            return Err(ConfigError::OutOfRange {
                name: "dscp",
                value: self.ip.dscp as usize,
                range: "0..=63",
            });
        }

        if self.ip.ecn > 0x03 {
            return Err(ConfigError::OutOfRange {
                name: "ecn",
                value: self.ip.ecn as usize,
                range: "0..=3",
            });
        }

        if self.ip.ttl == 0 {
            return Err(ConfigError::OutOfRange {
                name: "ttl",
                value: 0,
                range: "1..=255",
            });
        }

        let payload_len = self.payload_len();
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(ConfigError::OutOfRange {
                name: "payload",
                value: payload_len,
                range: "0..=65507",
            });
        }

        Ok(())
    }

    /// パディング後のペイロード長
    pub fn payload_len(&self) -> usize {
        self.payload.data.len().max(self.payload.padded_len)
    }

    /// ゼロ埋め済みのペイロード
    pub fn payload_bytes(&self) -> Vec<u8> {
        let mut payload = vec![0u8; self.payload_len()];
        payload[..self.payload.data.len()].copy_from_slice(&self.payload.data);
        payload
    }

    pub fn destination(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.endpoint.destination_addr, self.endpoint.destination_port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = Configuration::from_lookup(|_| None).unwrap();
        assert_eq!(config, Configuration::default());
        assert_eq!(config.payload_len(), 16);
        assert_eq!(&config.payload_bytes()[..8], b"Lets go\n");
        assert!(config.payload_bytes()[8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_overrides_from_variables() {
        let config = Configuration::from_lookup(lookup_from(&[
            ("RAW_UDP_DST_ADDR", "10.0.0.11"),
            ("RAW_UDP_DST_PORT", "9000"),
            ("RAW_UDP_TTL", "64"),
            ("RAW_UDP_DSCP", "8"),
            ("RAW_UDP_DONT_FRAGMENT", "true"),
            ("RAW_UDP_CHECKSUM_MODE", "segment-only"),
            ("RAW_UDP_PAYLOAD", "Hello!"),
            ("RAW_UDP_PAYLOAD_LEN", "0"),
        ]))
        .unwrap();

        assert_eq!(config.destination(), SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 11), 9000));
        assert_eq!(config.ip.ttl, 64);
        assert_eq!(config.ip.dscp, 8);
        assert!(config.ip.dont_fragment);
        assert_eq!(config.udp.checksum_mode, UdpChecksumMode::SegmentOnly);
        assert_eq!(config.payload_bytes(), b"Hello!".to_vec());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = Configuration::from_lookup(lookup_from(&[("RAW_UDP_SRC_PORT", "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "RAW_UDP_SRC_PORT", .. }));
    }

    #[test]
    fn test_dscp_out_of_range() {
        let err = Configuration::from_lookup(lookup_from(&[("RAW_UDP_DSCP", "64")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "dscp", .. }));
    }

    #[test]
    fn test_payload_too_large() {
        let mut config = Configuration::default();
        config.payload.padded_len = MAX_PAYLOAD_LEN;
        assert!(config.validate().is_ok());

        config.payload.padded_len = MAX_PAYLOAD_LEN + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { name: "payload", .. })
        ));
    }

    #[test]
    #[allow(deprecated)]
    fn test_env_example_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/.env.example");
        let vars: HashMap<String, String> = dotenv::from_filename_iter(path)
            .unwrap()
            .map(|item| item.unwrap())
            .collect();

        let config = Configuration::from_lookup(|key: &str| vars.get(key).cloned()).unwrap();
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn test_checksum_mode_names() {
        for mode in [
            UdpChecksumMode::PseudoHeader,
            UdpChecksumMode::SegmentOnly,
            UdpChecksumMode::Disabled,
        ] {
            assert_eq!(mode.to_string().parse::<UdpChecksumMode>().unwrap(), mode);
        }
        assert!("crc32".parse::<UdpChecksumMode>().is_err());
    }
}
