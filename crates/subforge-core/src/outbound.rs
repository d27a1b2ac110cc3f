//! Typed outbound objects for the routing engine's configuration.
//!
//! Optional fields are skipped when absent so the emitted JSON carries
//! exactly what the source record had.

use serde::Serialize;
use serde_json::{Map, Value};

/// One proxy outbound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outbound {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,
    #[serde(flatten)]
    pub settings: OutboundSettings,
}

impl Outbound {
    pub fn new(tag: impl Into<String>, server: &str, port: u16, settings: OutboundSettings) -> Self {
        Self {
            tag: tag.into(),
            server: Some(server.to_string()),
            server_port: Some(port),
            settings,
        }
    }

    /// The outbound `type` as emitted.
    pub fn kind(&self) -> &'static str {
        self.settings.kind()
    }

    /// Moves a WireGuard outbound's address into a separate [`Endpoint`].
    ///
    /// The outbound keeps an `endpoint` reference and loses `server` and
    /// `server_port`. Returns `None` for other protocols and for outbounds
    /// already promoted.
    pub fn promote_endpoint(&mut self) -> Option<Endpoint> {
        let OutboundSettings::Wireguard { endpoint, .. } = &mut self.settings else {
            return None;
        };
        let address = self.server.take()?;
        let tag = format!("ep-{}", self.tag);
        *endpoint = Some(tag.clone());
        Some(Endpoint::wireguard(tag, address, self.server_port.take()))
    }
}

/// Protocol-specific outbound settings, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundSettings {
    Shadowsocks {
        method: String,
        password: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        plugin: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        plugin_opts: Option<String>,
    },
    ShadowsocksR {
        method: String,
        password: String,
        obfs: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        obfs_param: Option<String>,
        protocol: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        protocol_param: Option<String>,
    },
    Vmess {
        uuid: String,
        security: String,
        alter_id: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        global_padding: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        authenticated_length: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<TlsConfig>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
        #[serde(skip_serializing_if = "Option::is_none")]
        multiplex: Option<Multiplex>,
    },
    Vless {
        uuid: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        flow: Option<String>,
        packet_encoding: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<TlsConfig>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
        #[serde(skip_serializing_if = "Option::is_none")]
        multiplex: Option<Multiplex>,
    },
    Trojan {
        password: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<TlsConfig>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
        #[serde(skip_serializing_if = "Option::is_none")]
        multiplex: Option<Multiplex>,
    },
    Hysteria2 {
        password: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        up_mbps: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        down_mbps: Option<u32>,
        tls: TlsConfig,
        #[serde(skip_serializing_if = "Option::is_none")]
        obfs: Option<Obfs>,
    },
    Tuic {
        uuid: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        congestion_control: String,
        udp_relay_mode: String,
        zero_rtt_handshake: bool,
        tls: TlsConfig,
    },
    Wireguard {
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        private_key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        peer_public_key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pre_shared_key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mtu: Option<u32>,
        local_address: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reserved: Option<Value>,
    },
    Http {
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<TlsConfig>,
    },
    Socks {
        version: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
}

impl OutboundSettings {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundSettings::Shadowsocks { .. } => "shadowsocks",
            OutboundSettings::ShadowsocksR { .. } => "shadowsocksr",
            OutboundSettings::Vmess { .. } => "vmess",
            OutboundSettings::Vless { .. } => "vless",
            OutboundSettings::Trojan { .. } => "trojan",
            OutboundSettings::Hysteria2 { .. } => "hysteria2",
            OutboundSettings::Tuic { .. } => "tuic",
            OutboundSettings::Wireguard { .. } => "wireguard",
            OutboundSettings::Http { .. } => "http",
            OutboundSettings::Socks { .. } => "socks",
        }
    }
}

/// The `tls` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub insecure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpn: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utls: Option<Utls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reality: Option<Reality>,
}

impl TlsConfig {
    /// An enabled block with nothing else set.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            server_name: None,
            insecure: false,
            alpn: None,
            utls: None,
            reality: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utls {
    pub enabled: bool,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reality {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
}

/// The `transport` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transport {
    Ws {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<Map<String, Value>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_early_data: Option<u32>,
        early_data_header_name: String,
    },
    Grpc {
        #[serde(skip_serializing_if = "Option::is_none")]
        service_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        idle_timeout: Option<Value>,
    },
    Http {
        path: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        host: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        method: Option<String>,
    },
}

/// The `multiplex` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Multiplex {
    pub enabled: bool,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_streams: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_streams: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<bool>,
}

/// Hysteria2 obfuscation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Obfs {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// A network endpoint referenced by tag from an outbound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Endpoint {
    pub fn wireguard(tag: String, address: String, port: Option<u16>) -> Self {
        Self {
            tag,
            kind: "wireguard".to_string(),
            address,
            port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wireguard() -> Outbound {
        Outbound::new(
            "WG Home",
            "198.51.100.4",
            51820,
            OutboundSettings::Wireguard {
                endpoint: None,
                private_key: "cHJpdmF0ZQ==".to_string(),
                peer_public_key: Some("cHVibGlj".to_string()),
                pre_shared_key: None,
                mtu: Some(1280),
                local_address: vec!["10.0.0.2/32".to_string()],
                reserved: None,
            },
        )
    }

    #[test]
    fn test_promote_wireguard_endpoint() {
        let mut outbound = wireguard();
        let endpoint = outbound.promote_endpoint().unwrap();

        assert_eq!(endpoint.tag, "ep-WG Home");
        assert_eq!(endpoint.address, "198.51.100.4");
        assert_eq!(endpoint.port, Some(51820));

        let value = serde_json::to_value(&outbound).unwrap();
        assert_eq!(value["endpoint"], json!("ep-WG Home"));
        assert!(value.get("server").is_none());
        assert!(value.get("server_port").is_none());

        assert!(outbound.promote_endpoint().is_none());
    }

    #[test]
    fn test_promote_ignores_other_protocols() {
        let mut outbound = Outbound::new(
            "S",
            "10.0.0.1",
            1080,
            OutboundSettings::Socks {
                version: "5".to_string(),
                username: None,
                password: None,
            },
        );
        assert!(outbound.promote_endpoint().is_none());
        assert_eq!(outbound.server.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_serialized_shape() {
        let outbound = Outbound::new(
            "JP",
            "jp.example.com",
            443,
            OutboundSettings::Trojan {
                password: "secret".to_string(),
                tls: Some(TlsConfig {
                    server_name: Some("jp.example.com".to_string()),
                    ..TlsConfig::enabled()
                }),
                transport: Some(Transport::Grpc {
                    service_name: Some("gun".to_string()),
                    idle_timeout: None,
                }),
                multiplex: None,
            },
        );

        assert_eq!(
            serde_json::to_value(&outbound).unwrap(),
            json!({
                "tag": "JP",
                "server": "jp.example.com",
                "server_port": 443,
                "type": "trojan",
                "password": "secret",
                "tls": {"enabled": true, "server_name": "jp.example.com", "insecure": false},
                "transport": {"type": "grpc", "service_name": "gun"}
            })
        );
    }
}
