//! TileJSON synthesis.
//!
//! Archives may embed a JSON object describing their layers, attribution and
//! so on. The document handed to clients is that object with the
//! header-derived fields written over it, so a client always sees the zoom
//! range and bounds the archive actually serves.

use serde_json::{json, Map, Value};

use crate::format::{Header, TileType};
use crate::source::PMTILES_SCHEME;

/// TileJSON version written into every document.
pub const TILEJSON_VERSION: &str = "3.0.0";

/// Parse embedded metadata, tolerating anything that is not a JSON object.
fn embedded_object(embedded: Option<&[u8]>) -> Map<String, Value> {
    match embedded {
        Some(bytes) if !bytes.is_empty() => match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => Map::new(),
        },
        _ => Map::new(),
    }
}

/// Build the TileJSON document for an archive.
///
/// `embedded` is the already decompressed embedded metadata region, if the
/// archive has one. `archive_url` is the archive address without the
/// `pmtiles://` prefix.
pub fn synthesize_tilejson(header: &Header, embedded: Option<&[u8]>, archive_url: &str) -> String {
    let mut doc = embedded_object(embedded);

    doc.insert("tilejson".into(), json!(TILEJSON_VERSION));
    doc.insert("scheme".into(), json!("xyz"));
    doc.insert("format".into(), json!(header.tile_type.format()));
    doc.insert(
        "tiles".into(),
        json!([format!("{}{}", PMTILES_SCHEME, archive_url)]),
    );
    if header.tile_type == TileType::Mlt {
        doc.insert("encoding".into(), json!("mlt"));
    }

    let bounds = header.bounds;
    doc.insert(
        "bounds".into(),
        json!([bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat]),
    );
    let center = header.center;
    doc.insert("center".into(), json!([center.lon, center.lat, center.zoom]));
    doc.insert("minzoom".into(), json!(header.min_zoom));
    doc.insert("maxzoom".into(), json!(header.max_zoom));

    Value::Object(doc).to_string()
}
