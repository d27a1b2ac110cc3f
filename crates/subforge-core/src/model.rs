//! Canonical proxy records.
//!
//! A [`ProxyRecord`] is the protocol-agnostic description of one proxy
//! endpoint, shaped after the Clash/Mihomo `proxies:` entries that most
//! subscriptions ship. The link decoders build records directly; structured
//! subscriptions deserialize into them.
//!
//! Absent fields stay `None` all the way to the output: a missing option is
//! never rendered as a zero value.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::codec::de;

/// Display name used when a record carries none.
pub const DEFAULT_NAME: &str = "Unnamed";

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

/// One proxy endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProxyRecord {
    /// Display tag.
    #[serde(default = "default_name")]
    pub name: String,
    /// Server host; never empty.
    #[serde(deserialize_with = "de::server")]
    pub server: String,
    /// Server port; records whose port does not coerce are rejected.
    #[serde(deserialize_with = "de::port")]
    pub port: u16,
    /// Protocol and its settings.
    #[serde(flatten)]
    pub protocol: Protocol,
}

impl ProxyRecord {
    /// Creates a record with the given protocol settings.
    pub fn new(
        name: impl Into<String>,
        server: impl Into<String>,
        port: u16,
        protocol: Protocol,
    ) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            port,
            protocol,
        }
    }

    /// Returns the protocol type name as written in records.
    pub fn type_name(&self) -> &'static str {
        self.protocol.type_name()
    }
}

/// The closed set of supported protocols.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Protocol {
    #[serde(rename = "ss", alias = "shadowsocks")]
    Shadowsocks(ShadowsocksOptions),
    #[serde(rename = "ssr", alias = "shadowsocksr")]
    ShadowsocksR(ShadowsocksROptions),
    #[serde(rename = "vmess")]
    Vmess(VmessOptions),
    #[serde(rename = "vless")]
    Vless(VlessOptions),
    #[serde(rename = "trojan")]
    Trojan(TrojanOptions),
    #[serde(rename = "hysteria2", alias = "hy2")]
    Hysteria2(Hysteria2Options),
    #[serde(rename = "tuic")]
    Tuic(TuicOptions),
    #[serde(rename = "wireguard")]
    Wireguard(WireguardOptions),
    #[serde(rename = "http")]
    Http(HttpOptions),
    #[serde(rename = "socks5", alias = "socks")]
    Socks5(SocksOptions),
}

impl Protocol {
    /// Returns the record type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Protocol::Shadowsocks(_) => "ss",
            Protocol::ShadowsocksR(_) => "ssr",
            Protocol::Vmess(_) => "vmess",
            Protocol::Vless(_) => "vless",
            Protocol::Trojan(_) => "trojan",
            Protocol::Hysteria2(_) => "hysteria2",
            Protocol::Tuic(_) => "tuic",
            Protocol::Wireguard(_) => "wireguard",
            Protocol::Http(_) => "http",
            Protocol::Socks5(_) => "socks5",
        }
    }
}

/// TLS-related record fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TlsOptions {
    #[serde(default, deserialize_with = "de::flag")]
    pub tls: bool,
    #[serde(default)]
    pub servername: Option<String>,
    #[serde(default)]
    pub sni: Option<String>,
    #[serde(rename = "skip-cert-verify", default, deserialize_with = "de::flag")]
    pub skip_cert_verify: bool,
    #[serde(rename = "client-fingerprint", alias = "fingerprint", default)]
    pub client_fingerprint: Option<String>,
    #[serde(default, deserialize_with = "de::string_list")]
    pub alpn: Option<Vec<String>>,
    #[serde(rename = "reality-opts", default)]
    pub reality_opts: Option<RealityOptions>,
}

/// Reality handshake parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RealityOptions {
    #[serde(rename = "public-key", default)]
    pub public_key: Option<String>,
    #[serde(rename = "short-id", default)]
    pub short_id: Option<String>,
    #[serde(default)]
    pub servername: Option<String>,
}

/// Transport-related record fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransportOptions {
    #[serde(default)]
    pub network: Option<String>,
    #[serde(rename = "ws-opts", default)]
    pub ws_opts: Option<WsOptions>,
    #[serde(rename = "grpc-opts", default)]
    pub grpc_opts: Option<GrpcOptions>,
    #[serde(rename = "h2-opts", default)]
    pub h2_opts: Option<HttpTransportOptions>,
    #[serde(rename = "http-opts", default)]
    pub http_opts: Option<HttpTransportOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WsOptions {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: Option<Map<String, Value>>,
    #[serde(rename = "max-early-data", default, deserialize_with = "de::lenient_u32")]
    pub max_early_data: Option<u32>,
    #[serde(rename = "early-data-header-name", default)]
    pub early_data_header_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GrpcOptions {
    #[serde(rename = "grpc-service-name", default)]
    pub grpc_service_name: Option<String>,
    #[serde(rename = "idle-timeout", default)]
    pub idle_timeout: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HttpTransportOptions {
    #[serde(default)]
    pub path: Option<Value>,
    #[serde(default)]
    pub host: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
}

/// Stream multiplexing (`smux`) settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SmuxOptions {
    #[serde(default, deserialize_with = "de::flag")]
    pub enabled: bool,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(rename = "max-connections", default, deserialize_with = "de::lenient_u32")]
    pub max_connections: Option<u32>,
    #[serde(rename = "min-streams", default, deserialize_with = "de::lenient_u32")]
    pub min_streams: Option<u32>,
    #[serde(rename = "max-streams", default, deserialize_with = "de::lenient_u32")]
    pub max_streams: Option<u32>,
    #[serde(default)]
    pub padding: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShadowsocksOptions {
    #[serde(default)]
    pub cipher: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub plugin: Option<String>,
    #[serde(rename = "plugin-opts", default)]
    pub plugin_opts: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShadowsocksROptions {
    #[serde(default)]
    pub cipher: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(rename = "protocol-param", default)]
    pub protocol_param: Option<String>,
    #[serde(default)]
    pub obfs: Option<String>,
    #[serde(rename = "obfs-param", default)]
    pub obfs_param: Option<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub udp: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VmessOptions {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(rename = "alterId", default, deserialize_with = "de::lenient_u32")]
    pub alter_id: Option<u32>,
    #[serde(default)]
    pub cipher: Option<String>,
    #[serde(rename = "global-padding", default)]
    pub global_padding: Option<bool>,
    #[serde(rename = "authenticated-length", default)]
    pub authenticated_length: Option<bool>,
    #[serde(flatten)]
    pub tls: TlsOptions,
    #[serde(flatten)]
    pub transport: TransportOptions,
    #[serde(default)]
    pub smux: Option<SmuxOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VlessOptions {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub flow: Option<String>,
    #[serde(rename = "packet-encoding", default)]
    pub packet_encoding: Option<String>,
    #[serde(flatten)]
    pub tls: TlsOptions,
    #[serde(flatten)]
    pub transport: TransportOptions,
    #[serde(default)]
    pub smux: Option<SmuxOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrojanOptions {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(flatten)]
    pub tls: TlsOptions,
    #[serde(flatten)]
    pub transport: TransportOptions,
    #[serde(default)]
    pub smux: Option<SmuxOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Hysteria2Options {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    /// Upload bandwidth, a number or a `"<int> <unit>"` string.
    #[serde(default)]
    pub up: Option<Value>,
    /// Download bandwidth, a number or a `"<int> <unit>"` string.
    #[serde(default)]
    pub down: Option<Value>,
    #[serde(default)]
    pub obfs: Option<String>,
    #[serde(rename = "obfs-password", default)]
    pub obfs_password: Option<String>,
    #[serde(flatten)]
    pub tls: TlsOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TuicOptions {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(rename = "congestion-controller", default)]
    pub congestion_controller: Option<String>,
    #[serde(rename = "udp-relay-mode", default)]
    pub udp_relay_mode: Option<String>,
    #[serde(rename = "reduce-rtt", default, deserialize_with = "de::flag")]
    pub reduce_rtt: bool,
    #[serde(flatten)]
    pub tls: TlsOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireguardOptions {
    #[serde(rename = "private-key", default)]
    pub private_key: Option<String>,
    #[serde(rename = "public-key", default)]
    pub public_key: Option<String>,
    #[serde(rename = "pre-shared-key", default)]
    pub pre_shared_key: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub ipv6: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_u32")]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub reserved: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HttpOptions {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(flatten)]
    pub tls: TlsOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SocksOptions {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}
