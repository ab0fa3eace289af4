//! PDF post-processing: document info dictionary and stream compression.

use crate::profile::DocumentInfo;
use lopdf::{Dictionary, Document, Object, StringFormat};

pub const CREATOR: &str = "resume-press";

/// PDF text string: literal when ASCII, UTF-16BE with BOM otherwise.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Set the info dictionary of `pdf` and optionally recompress its streams.
pub fn finalize_pdf(
    pdf: &[u8],
    info: &DocumentInfo,
    compress: bool,
) -> Result<Vec<u8>, lopdf::Error> {
    let mut document = Document::load_mem(pdf)?;

    let mut dict = Dictionary::new();
    dict.set("Title", text_string(&info.title));
    dict.set("Author", text_string(&info.author));
    dict.set("Subject", text_string(&info.subject));
    if !info.keywords.is_empty() {
        dict.set("Keywords", text_string(&info.keywords_line()));
    }
    dict.set("Creator", Object::string_literal(CREATOR));
    dict.set(
        "Producer",
        Object::string_literal(format!("{CREATOR} {}", env!("CARGO_PKG_VERSION"))),
    );
    let info_id = document.add_object(dict);
    document.trailer.set("Info", Object::Reference(info_id));

    if compress {
        document.compress();
    }

    let mut buffer = Vec::new();
    document.save_to(&mut buffer)?;
    Ok(buffer)
}
