//! Minimal `META-INF/MANIFEST.MF` reader.
//!
//! Only the main section is read, and only the six package attributes are kept.

use crate::resource::{Attribute, PackageAttributes};

pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

pub fn parse_main_attributes(content: &[u8]) -> PackageAttributes {
    let text = String::from_utf8_lossy(content);
    let mut attributes = PackageAttributes::new();
    let mut current: Option<(String, String)> = None;

    for raw in text.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if let Some(rest) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str(rest);
            }
            continue;
        }

        if let Some((key, value)) = current.take() {
            apply(&mut attributes, &key, value);
        }

        // main section ends at the first blank line
        if line.is_empty() {
            break;
        }

        if let Some((key, value)) = line.split_once(':') {
            let value = value.strip_prefix(' ').unwrap_or(value);
            current = Some((key.trim().to_string(), value.to_string()));
        }
    }

    if let Some((key, value)) = current.take() {
        apply(&mut attributes, &key, value);
    }

    attributes
}

fn apply(attributes: &mut PackageAttributes, key: &str, value: String) {
    if let Some(kind) = Attribute::from_manifest_key(key) {
        attributes.insert(kind, value.trim_end());
    }
}
