//! Fixtures shared by unit tests.

use lopdf::{dictionary, Document, Object, Stream};

use crate::db::demand_file_repo::{self, DemandFileRow};
use crate::db::job_repo::{self, JobRow};
use crate::db::{note_repo, Database};

/// Builds a PDF with one Courier text line per page.
pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

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
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// In-memory database with `note-1` and `job-1` attached to it.
pub fn seeded_db() -> Database {
    let db = Database::open_in_memory().expect("Failed to create test database");
    note_repo::insert(&db, "note-1", Some("Doe v. Roe")).unwrap();
    job_repo::insert(&db, &JobRow::new("job-1", Some("note-1".to_string()))).unwrap();
    db
}

/// Adds a demand file of `note-1` pointing at `path`.
pub fn add_demand_file(db: &Database, id: &str, file_name: &str, path: &str) {
    let mut file = DemandFileRow::new(id, "note-1", file_name);
    file.file_path = Some(path.to_string());
    demand_file_repo::insert(db, &file).unwrap();
}
