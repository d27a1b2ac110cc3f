//! Canonical record to outbound mapping.
//!
//! The shared builders ([`build_tls`], [`build_transport`],
//! [`build_multiplex`]) are pure functions of the record; the per-protocol
//! arms layer protocol fields on top.

use serde_json::Value;
use tracing::warn;

use crate::codec;
use crate::error::ConvertError;
use crate::model::{
    Protocol, ProxyRecord, SmuxOptions, TlsOptions, TransportOptions, WireguardOptions,
};
use crate::outbound::{
    Multiplex, Obfs, Outbound, OutboundSettings, Reality, TlsConfig, Transport, Utls,
};

const EARLY_DATA_HEADER: &str = "Sec-WebSocket-Protocol";

/// Maps one record to an outbound.
pub fn encode(record: &ProxyRecord) -> Result<Outbound, ConvertError> {
    let missing = |field: &'static str| ConvertError::MissingField {
        protocol: record.type_name(),
        name: record.name.clone(),
        field,
    };
    let server = record.server.as_str();

    let settings = match &record.protocol {
        Protocol::Shadowsocks(opts) => OutboundSettings::Shadowsocks {
            method: required(&opts.cipher).ok_or_else(|| missing("cipher"))?,
            password: opts.password.clone().ok_or_else(|| missing("password"))?,
            plugin: opts.plugin.clone(),
            plugin_opts: opts.plugin_opts.as_ref().and_then(plugin_opts),
        },
        Protocol::ShadowsocksR(opts) => OutboundSettings::ShadowsocksR {
            method: required(&opts.cipher).ok_or_else(|| missing("cipher"))?,
            password: opts.password.clone().ok_or_else(|| missing("password"))?,
            obfs: required(&opts.obfs).ok_or_else(|| missing("obfs"))?,
            obfs_param: opts.obfs_param.clone(),
            protocol: required(&opts.protocol).ok_or_else(|| missing("protocol"))?,
            protocol_param: opts.protocol_param.clone(),
        },
        Protocol::Vmess(opts) => OutboundSettings::Vmess {
            uuid: required(&opts.uuid).ok_or_else(|| missing("uuid"))?,
            security: required(&opts.cipher).unwrap_or_else(|| "auto".to_string()),
            alter_id: opts.alter_id.unwrap_or(0),
            global_padding: opts.global_padding,
            authenticated_length: opts.authenticated_length,
            tls: build_tls(&opts.tls, server, false),
            transport: build_transport(&opts.transport),
            multiplex: build_multiplex(opts.smux.as_ref()),
        },
        Protocol::Vless(opts) => OutboundSettings::Vless {
            uuid: required(&opts.uuid).ok_or_else(|| missing("uuid"))?,
            flow: required(&opts.flow),
            packet_encoding: required(&opts.packet_encoding)
                .unwrap_or_else(|| "xudp".to_string()),
            tls: build_tls(&opts.tls, server, false),
            transport: build_transport(&opts.transport),
            multiplex: build_multiplex(opts.smux.as_ref()),
        },
        Protocol::Trojan(opts) => OutboundSettings::Trojan {
            password: opts.password.clone().ok_or_else(|| missing("password"))?,
            tls: build_tls(&opts.tls, server, true),
            transport: build_transport(&opts.transport),
            multiplex: build_multiplex(opts.smux.as_ref()),
        },
        Protocol::Hysteria2(opts) => OutboundSettings::Hysteria2 {
            password: required(&opts.password)
                .or_else(|| required(&opts.auth))
                .ok_or_else(|| missing("password"))?,
            up_mbps: opts.up.as_ref().and_then(parse_bandwidth),
            down_mbps: opts.down.as_ref().and_then(parse_bandwidth),
            tls: build_tls(&opts.tls, server, true).unwrap_or_else(TlsConfig::enabled),
            obfs: required(&opts.obfs).map(|kind| Obfs {
                kind,
                password: opts.obfs_password.clone(),
            }),
        },
        Protocol::Tuic(opts) => OutboundSettings::Tuic {
            uuid: required(&opts.uuid).ok_or_else(|| missing("uuid"))?,
            password: opts.password.clone(),
            congestion_control: required(&opts.congestion_controller)
                .unwrap_or_else(|| "bbr".to_string()),
            udp_relay_mode: required(&opts.udp_relay_mode)
                .unwrap_or_else(|| "native".to_string()),
            zero_rtt_handshake: opts.reduce_rtt,
            tls: TlsConfig {
                server_name: required(&opts.tls.sni).or_else(|| required(&opts.tls.servername)),
                insecure: opts.tls.skip_cert_verify,
                alpn: Some(
                    opts.tls
                        .alpn
                        .clone()
                        .unwrap_or_else(|| vec!["h3".to_string()]),
                ),
                ..TlsConfig::enabled()
            },
        },
        Protocol::Wireguard(opts) => OutboundSettings::Wireguard {
            endpoint: None,
            private_key: required(&opts.private_key).ok_or_else(|| missing("private-key"))?,
            peer_public_key: opts.public_key.clone(),
            pre_shared_key: opts.pre_shared_key.clone(),
            mtu: opts.mtu,
            local_address: local_addresses(opts),
            reserved: opts.reserved.clone(),
        },
        Protocol::Http(opts) => OutboundSettings::Http {
            username: opts.username.clone(),
            password: opts.password.clone(),
            tls: opts.tls.tls.then(|| TlsConfig {
                insecure: opts.tls.skip_cert_verify,
                ..TlsConfig::enabled()
            }),
        },
        Protocol::Socks5(opts) => OutboundSettings::Socks {
            version: "5".to_string(),
            username: opts.username.clone(),
            password: opts.password.clone(),
        },
    };

    Ok(Outbound::new(
        record.name.clone(),
        server,
        record.port,
        settings,
    ))
}

/// Encodes every record, dropping the ones that fail.
///
/// Order is preserved for the survivors.
pub fn convert_batch(records: Vec<ProxyRecord>) -> Vec<Outbound> {
    let total = records.len();
    let outbounds: Vec<Outbound> = records
        .iter()
        .filter_map(|record| match encode(record) {
            Ok(outbound) => Some(outbound),
            Err(e) => {
                warn!(error = %e, "skipping record");
                None
            }
        })
        .collect();

    if outbounds.len() < total {
        warn!(
            converted = outbounds.len(),
            skipped = total - outbounds.len(),
            "batch converted with failures"
        );
    }
    outbounds
}

fn required(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Builds the TLS block; `implied` marks protocols that are always TLS.
pub fn build_tls(tls: &TlsOptions, server: &str, implied: bool) -> Option<TlsConfig> {
    if !(tls.tls || tls.reality_opts.is_some() || implied) {
        return None;
    }

    let mut server_name = required(&tls.servername)
        .or_else(|| required(&tls.sni))
        .unwrap_or_else(|| server.to_string());

    let utls = required(&tls.client_fingerprint).map(|fingerprint| Utls {
        enabled: true,
        fingerprint,
    });

    let reality = tls.reality_opts.as_ref().map(|opts| {
        if let Some(name) = required(&opts.servername) {
            server_name = name;
        }
        Reality {
            enabled: true,
            public_key: opts.public_key.clone(),
            short_id: opts.short_id.clone(),
        }
    });

    Some(TlsConfig {
        enabled: true,
        server_name: Some(server_name),
        insecure: tls.skip_cert_verify,
        alpn: tls.alpn.clone(),
        utls,
        reality,
    })
}

/// Builds the transport block from `network`; plain TCP has none.
pub fn build_transport(transport: &TransportOptions) -> Option<Transport> {
    match transport.network.as_deref()? {
        "ws" => {
            let opts = transport.ws_opts.clone().unwrap_or_default();
            Some(Transport::Ws {
                path: required(&opts.path).unwrap_or_else(|| "/".to_string()),
                headers: opts.headers.filter(|h| !h.is_empty()),
                max_early_data: opts.max_early_data,
                early_data_header_name: required(&opts.early_data_header_name)
                    .unwrap_or_else(|| EARLY_DATA_HEADER.to_string()),
            })
        }
        "grpc" => {
            let opts = transport.grpc_opts.clone().unwrap_or_default();
            Some(Transport::Grpc {
                service_name: required(&opts.grpc_service_name),
                idle_timeout: opts.idle_timeout,
            })
        }
        "h2" | "http" => {
            let opts = transport
                .h2_opts
                .clone()
                .or_else(|| transport.http_opts.clone())
                .unwrap_or_default();
            let path = opts
                .path
                .filter(|p| !matches!(p, Value::Null) && p.as_str() != Some(""))
                .unwrap_or_else(|| Value::String("/".to_string()));
            Some(Transport::Http {
                path,
                host: opts.host,
                method: required(&opts.method),
            })
        }
        _ => None,
    }
}

/// Builds the multiplex block; only an explicit `enabled` turns it on.
pub fn build_multiplex(smux: Option<&SmuxOptions>) -> Option<Multiplex> {
    let smux = smux.filter(|s| s.enabled)?;
    Some(Multiplex {
        enabled: true,
        protocol: required(&smux.protocol).unwrap_or_else(|| "h2mux".to_string()),
        max_connections: smux.max_connections,
        min_streams: smux.min_streams,
        max_streams: smux.max_streams,
        padding: smux.padding,
    })
}

/// Parses `100`, `"100"`, `"100 Mbps"` or `"1 Gbps"` into Mbps.
fn parse_bandwidth(value: &Value) -> Option<u32> {
    let mbps = match value {
        Value::String(s) => {
            let n = codec::parse_int(s)?;
            if s.to_ascii_lowercase().contains('g') {
                n.checked_mul(1000)?
            } else {
                n
            }
        }
        other => codec::coerce_int(other)?,
    };
    u32::try_from(mbps).ok().filter(|n| *n > 0)
}

fn plugin_opts(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) if !map.is_empty() => Some(
            map.iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{k}={s}"),
                    Value::Bool(true) => k.clone(),
                    other => format!("{k}={other}"),
                })
                .collect::<Vec<_>>()
                .join(";"),
        ),
        _ => None,
    }
}

fn local_addresses(opts: &WireguardOptions) -> Vec<String> {
    let mut addresses = Vec::new();
    if let Some(ip) = required(&opts.ip) {
        addresses.push(with_prefix(ip, 32));
    }
    if let Some(ip) = required(&opts.ipv6) {
        addresses.push(with_prefix(ip, 128));
    }
    addresses
}

fn with_prefix(address: String, bits: u8) -> String {
    if address.contains('/') {
        address
    } else {
        format!("{address}/{bits}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Hysteria2Options, RealityOptions, ShadowsocksOptions, TuicOptions, VlessOptions,
        VmessOptions, WsOptions,
    };
    use serde_json::json;

    fn record(protocol: Protocol) -> ProxyRecord {
        ProxyRecord::new("node", "203.0.113.1", 443, protocol)
    }

    #[test]
    fn test_vless_reality_server_name_priority() {
        let outbound = encode(&record(Protocol::Vless(VlessOptions {
            uuid: Some("u".into()),
            tls: TlsOptions {
                tls: true,
                servername: Some("outer.example.com".into()),
                client_fingerprint: Some("chrome".into()),
                reality_opts: Some(RealityOptions {
                    public_key: Some("pk".into()),
                    short_id: Some("01".into()),
                    servername: Some("reality.example.com".into()),
                }),
                ..Default::default()
            },
            ..Default::default()
        })))
        .unwrap();

        let value = serde_json::to_value(&outbound).unwrap();
        assert_eq!(value["type"], "vless");
        assert_eq!(value["packet_encoding"], "xudp");
        assert_eq!(value["tls"]["server_name"], "reality.example.com");
        assert_eq!(value["tls"]["utls"]["fingerprint"], "chrome");
        assert_eq!(value["tls"]["reality"]["public_key"], "pk");
        assert!(value.get("transport").is_none());
        assert!(value.get("multiplex").is_none());
    }

    #[test]
    fn test_tls_server_name_falls_back_to_host() {
        let tls = build_tls(
            &TlsOptions {
                tls: true,
                ..Default::default()
            },
            "203.0.113.1",
            false,
        )
        .unwrap();
        assert_eq!(tls.server_name.as_deref(), Some("203.0.113.1"));

        assert!(build_tls(&TlsOptions::default(), "h", false).is_none());
        assert!(build_tls(&TlsOptions::default(), "h", true).is_some());
    }

    #[test]
    fn test_vmess_alter_id_defaults_to_zero() {
        let outbound = encode(&record(Protocol::Vmess(VmessOptions {
            uuid: Some("u".into()),
            transport: TransportOptions {
                network: Some("ws".into()),
                ws_opts: Some(WsOptions::default()),
                ..Default::default()
            },
            ..Default::default()
        })))
        .unwrap();

        let value = serde_json::to_value(&outbound).unwrap();
        assert_eq!(value["alter_id"], 0);
        assert_eq!(value["security"], "auto");
        assert_eq!(
            value["transport"],
            json!({"type": "ws", "path": "/", "early_data_header_name": "Sec-WebSocket-Protocol"})
        );
        assert!(value.get("tls").is_none());
    }

    #[test]
    fn test_tcp_network_has_no_transport() {
        let transport = TransportOptions {
            network: Some("tcp".into()),
            ..Default::default()
        };
        assert!(build_transport(&transport).is_none());
        assert!(build_transport(&TransportOptions::default()).is_none());
    }

    #[test]
    fn test_multiplex_requires_enabled_flag() {
        let smux = SmuxOptions {
            enabled: false,
            max_streams: Some(4),
            ..Default::default()
        };
        assert!(build_multiplex(Some(&smux)).is_none());

        let smux = SmuxOptions {
            enabled: true,
            ..smux
        };
        let multiplex = build_multiplex(Some(&smux)).unwrap();
        assert_eq!(multiplex.protocol, "h2mux");
        assert_eq!(multiplex.max_streams, Some(4));
    }

    #[test]
    fn test_hysteria2_bandwidth_and_obfs() {
        let outbound = encode(&record(Protocol::Hysteria2(Hysteria2Options {
            auth: Some("secret".into()),
            up: Some(json!("50 Mbps")),
            down: Some(json!("1 Gbps")),
            obfs: Some("salamander".into()),
            obfs_password: Some("x".into()),
            ..Default::default()
        })))
        .unwrap();

        let value = serde_json::to_value(&outbound).unwrap();
        assert_eq!(value["password"], "secret");
        assert_eq!(value["up_mbps"], 50);
        assert_eq!(value["down_mbps"], 1000);
        assert_eq!(value["obfs"], json!({"type": "salamander", "password": "x"}));
        assert_eq!(value["tls"]["enabled"], true);
    }

    #[test]
    fn test_hysteria2_non_numeric_bandwidth_is_omitted() {
        let outbound = encode(&record(Protocol::Hysteria2(Hysteria2Options {
            password: Some("p".into()),
            up: Some(json!("fast")),
            ..Default::default()
        })))
        .unwrap();
        let value = serde_json::to_value(&outbound).unwrap();
        assert!(value.get("up_mbps").is_none());
    }

    #[test]
    fn test_tuic_defaults() {
        let outbound = encode(&record(Protocol::Tuic(TuicOptions {
            uuid: Some("u".into()),
            password: Some("p".into()),
            ..Default::default()
        })))
        .unwrap();
        let value = serde_json::to_value(&outbound).unwrap();
        assert_eq!(value["congestion_control"], "bbr");
        assert_eq!(value["udp_relay_mode"], "native");
        assert_eq!(value["tls"]["alpn"], json!(["h3"]));
        assert_eq!(value["zero_rtt_handshake"], false);
    }

    #[test]
    fn test_wireguard_address_prefixes() {
        let outbound = encode(&record(Protocol::Wireguard(WireguardOptions {
            private_key: Some("k".into()),
            ip: Some("172.16.0.2".into()),
            ipv6: Some("fd00::2/64".into()),
            ..Default::default()
        })))
        .unwrap();
        let OutboundSettings::Wireguard { local_address, .. } = outbound.settings else {
            panic!("expected wireguard");
        };
        assert_eq!(local_address, vec!["172.16.0.2/32", "fd00::2/64"]);

        let v6_only = WireguardOptions {
            ipv6: Some("fd00::3".into()),
            ..Default::default()
        };
        assert_eq!(local_addresses(&v6_only), vec!["fd00::3/128"]);
    }

    #[test]
    fn test_shadowsocks_plugin_opts_from_map() {
        let outbound = encode(&record(Protocol::Shadowsocks(ShadowsocksOptions {
            cipher: Some("aes-128-gcm".into()),
            password: Some("p".into()),
            plugin: Some("v2ray-plugin".into()),
            plugin_opts: Some(json!({"mode": "websocket", "tls": true})),
        })))
        .unwrap();
        let OutboundSettings::Shadowsocks { plugin_opts, .. } = outbound.settings else {
            panic!("expected shadowsocks");
        };
        assert_eq!(plugin_opts.as_deref(), Some("mode=websocket;tls"));
    }

    #[test]
    fn test_missing_mandatory_field_fails() {
        let err = encode(&record(Protocol::Shadowsocks(ShadowsocksOptions {
            cipher: Some("aes-128-gcm".into()),
            ..Default::default()
        })))
        .unwrap_err();
        assert!(matches!(err, ConvertError::MissingField { field: "password", .. }));

        assert!(encode(&record(Protocol::Vless(VlessOptions::default()))).is_err());
    }

    #[test]
    fn test_batch_skips_failures_and_keeps_order() {
        let good = |name: &str| {
            ProxyRecord::new(
                name,
                "203.0.113.1",
                1080,
                Protocol::Socks5(Default::default()),
            )
        };
        let bad = ProxyRecord::new("bad", "203.0.113.1", 443, Protocol::Vless(Default::default()));

        let outbounds = convert_batch(vec![good("a"), bad, good("b")]);
        let tags: Vec<_> = outbounds.iter().map(|o| o.tag.as_str()).collect();
        assert_eq!(tags, vec!["a", "b"]);
        assert!(convert_batch(Vec::new()).is_empty());
    }
}
