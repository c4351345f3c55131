//! Attestation overlay on top of an existing document

use crate::error::StampError;
use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Annotation flags: Print (bit 3) | Locked (bit 8), so the stamp shows
/// up on paper and cannot be moved in a viewer.
const ANNOT_FLAGS: i64 = 4 | 128;

/// Stamp box on the first page, in PDF points: [x, y, width, height].
const STAMP_RECT: [f64; 4] = [24.0, 24.0, 420.0, 28.0];

/// What the stamp attests.
#[derive(Debug, Clone)]
pub struct Attestation<'a> {
    pub signer_name: &'a str,
    pub signed_at: DateTime<Utc>,
    pub ip_address: &'a str,
}

impl Attestation<'_> {
    /// The human-readable line placed on the document.
    pub fn text(&self) -> String {
        format!(
            "Digitally signed by {} on {} (IP {})",
            self.signer_name,
            self.signed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.ip_address
        )
    }
}

/// Escape special characters for PDF string literals
fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            _ if c.is_ascii() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

/// Overlay the attestation on the first page and return a new buffer.
///
/// The original bytes are left untouched; any failure leaves no partial
/// output behind.
pub fn stamp_attestation(pdf_bytes: &[u8], attestation: &Attestation<'_>) -> Result<Vec<u8>, StampError> {
    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| StampError::ParseError(e.to_string()))?;

    let first_page = doc
        .get_pages()
        .into_iter()
        .min_by_key(|(number, _)| *number)
        .map(|(_, id)| id)
        .ok_or(StampError::NoPages)?;

    let annot_id = build_attestation_annotation(&mut doc, &attestation.text());
    add_annotation_to_page(&mut doc, first_page, annot_id)?;

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| StampError::OperationError(e.to_string()))?;

    Ok(output)
}

fn build_attestation_annotation(doc: &mut Document, text: &str) -> ObjectId {
    let mut annot = Dictionary::new();
    annot.set("Type", Object::Name(b"Annot".to_vec()));
    annot.set("Subtype", Object::Name(b"FreeText".to_vec()));
    annot.set(
        "Rect",
        Object::Array(vec![
            Object::Real(STAMP_RECT[0] as f32),
            Object::Real(STAMP_RECT[1] as f32),
            Object::Real((STAMP_RECT[0] + STAMP_RECT[2]) as f32),
            Object::Real((STAMP_RECT[1] + STAMP_RECT[3]) as f32),
        ]),
    );
    annot.set(
        "Contents",
        Object::String(
            escape_pdf_string(text).into_bytes(),
            lopdf::StringFormat::Literal,
        ),
    );

    // Default appearance: 9pt Helvetica, black
    annot.set(
        "DA",
        Object::String(b"/Helv 9 Tf 0 0 0 rg".to_vec(), lopdf::StringFormat::Literal),
    );
    annot.set("F", Object::Integer(ANNOT_FLAGS));

    // No border
    let mut bs = Dictionary::new();
    bs.set("W", Object::Integer(0));
    annot.set("BS", Object::Dictionary(bs));

    doc.add_object(Object::Dictionary(annot))
}

fn add_annotation_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), StampError> {
    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| StampError::OperationError(e.to_string()))?;

    if let Object::Dictionary(ref mut page_dict) = page {
        if let Ok(Object::Array(ref mut arr)) = page_dict.get_mut(b"Annots") {
            arr.push(Object::Reference(annot_id));
        } else {
            page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn create_test_pdf() -> Vec<u8> {
        use lopdf::dictionary;

        let mut doc = Document::with_version("1.7");
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn attestation() -> Attestation<'static> {
        Attestation {
            signer_name: "Mario Rossi",
            signed_at: DateTime::parse_from_rfc3339("2025-03-01T10:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            ip_address: "203.0.113.7",
        }
    }

    #[test]
    fn attestation_text_names_signer_time_and_ip() {
        let text = attestation().text();
        assert_eq!(
            text,
            "Digitally signed by Mario Rossi on 2025-03-01 10:30:00 UTC (IP 203.0.113.7)"
        );
    }

    #[test]
    fn stamp_produces_valid_pdf_with_annotation() {
        let pdf = create_test_pdf();
        let stamped = stamp_attestation(&pdf, &attestation()).unwrap();

        assert!(stamped.starts_with(b"%PDF-"));
        let doc = Document::load_mem(&stamped).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        // The stamped output must carry the attestation text somewhere.
        let needle = b"Digitally signed by Mario Rossi";
        assert!(stamped.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn original_buffer_is_untouched() {
        let pdf = create_test_pdf();
        let before = pdf.clone();
        let stamped = stamp_attestation(&pdf, &attestation()).unwrap();
        assert_eq!(pdf, before);
        assert_ne!(stamped, before);
    }

    #[test]
    fn stamping_twice_appends_to_annots_array() {
        let pdf = create_test_pdf();
        let once = stamp_attestation(&pdf, &attestation()).unwrap();
        let twice = stamp_attestation(&once, &attestation()).unwrap();
        assert!(Document::load_mem(&twice).is_ok());
    }

    #[test]
    fn garbage_input_is_a_parse_error() {
        let result = stamp_attestation(b"not a pdf at all", &attestation());
        assert!(matches!(result, Err(StampError::ParseError(_))));
    }

    #[test]
    fn parenthesised_names_are_escaped() {
        assert_eq!(escape_pdf_string("Ro(s)si \\ co"), "Ro\\(s\\)si \\\\ co");
    }
}
