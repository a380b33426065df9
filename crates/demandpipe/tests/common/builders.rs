//! Fixture builders for PDFs and letter metadata.

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, Stream};

/// Builds a PDF with one Courier text line per page.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize PDF");
    bytes
}

/// Builder for letter metadata JSON.
pub struct MetadataBuilder {
    value: serde_json::Value,
}

impl MetadataBuilder {
    pub fn new(client_name: &str) -> Self {
        Self {
            value: serde_json::json!({
                "demand_creation_date": "2025-03-01",
                "date_of_accident": "2024-11-12T08:15:00",
                "client_name": client_name,
            }),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.value[key] = value.into();
        self
    }

    pub fn medical_summary(mut self, summary: &str) -> Self {
        let mut records = self.value["medical_records"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        records.push(serde_json::json!({ "summary": summary }));
        self.value["medical_records"] = serde_json::Value::Array(records);
        self
    }

    pub fn build(self) -> String {
        serde_json::to_string_pretty(&self.value).expect("Failed to serialize metadata")
    }
}
