//! Subforge Core - proxy share-link conversion and group synthesis.
//!
//! This crate turns proxy descriptions into routing-engine configurations:
//!
//! - [`link`] decodes single-line share links (`ss://`, `vmess://`, `vless://`, ...)
//!   into canonical [`ProxyRecord`]s
//! - [`source`] recognises whole subscription bodies (Clash YAML, link lists,
//!   Base64-wrapped link lists) and hashes the accepted content
//! - [`encoder`] maps records to typed [`Outbound`]s, one batch per source
//! - [`synth`] merges batches into a template and builds the group hierarchy
//! - [`filter`] compiles the tag filters used by templates
//!
//! # Example
//!
//! ```
//! use subforge_core::{encoder, link, synth, Template};
//!
//! let template = Template::from_json(
//!     r#"[{"outbounds": [{"tag": "🐸 手动选择", "type": "selector"}]},
//!         {"outboundGroupMap": {"🐸 手动选择": "基本分组"}}]"#,
//! )
//! .unwrap();
//!
//! let record = link::decode("ss://YWVzLTI1Ni1nY206c2VjcmV0@203.0.113.7:8388#Tokyo").unwrap();
//! let batch = encoder::convert_batch(vec![record]);
//! let config = synth::synthesize(template, vec![batch], false);
//!
//! assert!(config.outbound("Tokyo").is_some());
//! ```

pub mod codec;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod link;
pub mod model;
pub mod outbound;
pub mod source;
pub mod synth;
pub mod template;

pub use encoder::{convert_batch, encode};
pub use error::{ConvertError, FilterError, SourceError, TemplateError};
pub use filter::TagFilter;
pub use model::{Protocol, ProxyRecord};
pub use outbound::{Endpoint, Outbound, OutboundSettings};
pub use source::{content_hash, extract, Extracted};
pub use synth::{synthesize, Configuration};
pub use template::Template;
