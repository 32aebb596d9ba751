//! End-to-end signing flows over the in-memory backends: token entry,
//! the step machine, assembly, and the records left behind.

use std::sync::Arc;

use lopdf::dictionary;

use docsign::assembly::AssemblyEngine;
use docsign::error::Error;
use docsign::guard::{make_access_token, AccessGuard};
use docsign::models::{
    FieldId, FieldType, Recipient, RecipientStatus, RequestStatus, SigningRequest, TemplateField,
};
use docsign::session::{SigningSession, SigningStep};
use docsign::signature::SignaturePad;
use docsign::store::{FieldStore, MemoryObjectStore, MemoryStore, ObjectStore};
use docsign::Config;

/// A minimal multi-page PDF with an inherited A4 MediaBox.
fn blank_pdf(pages: u32) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = vec![];
    for _ in 0..pages {
        let content_id = doc.add_object(lopdf::Stream::new(
            dictionary! {},
            lopdf::content::Content { operations: vec![] }
                .encode()
                .unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => lopdf::Object::Reference(pages_id),
            "Contents" => lopdf::Object::Reference(content_id),
        });
        kids.push(lopdf::Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        lopdf::Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => lopdf::Object::Integer(pages as i64),
            "Kids" => lopdf::Object::Array(kids),
            "MediaBox" => lopdf::Object::Array(vec![
                0.into(), 0.into(), 595.into(), 842.into(),
            ]),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => lopdf::Object::Reference(pages_id),
    });
    doc.trailer.set("Root", lopdf::Object::Reference(catalog_id));
    let mut out = vec![];
    doc.save_to(&mut out).unwrap();
    out
}

struct World {
    objects: Arc<MemoryObjectStore>,
    store: Arc<MemoryStore>,
    engine: AssemblyEngine,
    guard: AccessGuard,
    recipient: Recipient,
}

async fn signing_world(fields: Vec<(&str, FieldType, u32, bool)>) -> World {
    let _ = pretty_env_logger::try_init();
    let objects = Arc::new(MemoryObjectStore::new());
    let store = Arc::new(MemoryStore::new());

    let base_file = objects.put("uploads/base.pdf", blank_pdf(2)).await.unwrap();
    let request = SigningRequest {
        id: uuid::Uuid::new_v4(),
        template_id: uuid::Uuid::new_v4(),
        title: "Lease".to_string(),
        message: "please sign".to_string(),
        base_file,
        status: RequestStatus::Sent,
    };
    let recipient = Recipient {
        id: uuid::Uuid::new_v4(),
        signing_request_id: request.id,
        name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
        access_token: make_access_token(),
        status: RecipientStatus::Pending,
        access_count: 0,
        expired_at: None,
    };
    store.add_request(request.clone()).await;
    store.add_recipient(recipient.clone()).await;

    let template_fields = fields
        .into_iter()
        .enumerate()
        .map(|(i, (name, field_type, page, required))| TemplateField {
            id: FieldId::Draft(i as u64 + 1),
            template_id: request.template_id,
            name: name.to_string(),
            field_type,
            page,
            x: 100.0,
            y: 150.0 + i as f64 * 60.0,
            width: if field_type == FieldType::Signature { 200.0 } else { 150.0 },
            height: if field_type == FieldType::Signature { 80.0 } else { 30.0 },
            required,
            placeholder: None,
        })
        .collect();
    store
        .replace_fields(request.template_id, template_fields)
        .await
        .unwrap();

    World {
        objects: objects.clone(),
        store: store.clone(),
        engine: AssemblyEngine::new(objects, store.clone(), Config::default()),
        guard: AccessGuard::new(store.clone(), store),
        recipient,
    }
}

fn field_id(session: &SigningSession, name: &str) -> FieldId {
    session
        .fields()
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.id)
        .unwrap()
}

fn sign(session: &mut SigningSession, name: &str) {
    let id = field_id(session, name);
    let mut pad = SignaturePad::new(200, 80);
    pad.begin_stroke(10.0, 40.0);
    pad.extend_stroke(120.0, 30.0);
    pad.extend_stroke(180.0, 50.0);
    pad.end_stroke();
    session.capture_signature(id, &pad).unwrap();
}

#[tokio::test]
async fn happy_path_leaves_one_artifact_of_each_kind() {
    let world = signing_world(vec![
        ("full_name", FieldType::Text, 2, true),
        ("signature", FieldType::Signature, 1, true),
    ])
    .await;

    let mut session = world
        .guard
        .open_session(&world.recipient.access_token)
        .await
        .unwrap();
    assert_eq!(session.step(), SigningStep::Welcome);

    session.advance().unwrap();
    session.advance().unwrap();
    assert_eq!(session.step(), SigningStep::Form);
    let name_id = field_id(&session, "full_name");
    session.set_value(name_id, "Jane Doe".to_string()).unwrap();
    assert_eq!(session.advance().unwrap(), SigningStep::Signature);
    sign(&mut session, "signature");

    let doc = session.submit(&world.engine).await.unwrap();
    assert_eq!(session.step(), SigningStep::Confirmation);

    // Base upload plus exactly one signed artifact.
    assert_eq!(world.objects.len().await, 2);
    let recipient = world.store.recipient(world.recipient.id).await.unwrap();
    assert_eq!(recipient.status, RecipientStatus::Signed);
    assert!(recipient.expired_at.is_some());
    assert_eq!(world.store.signed_documents().await.len(), 1);

    // The name lands on page 2 and nowhere else.
    let bytes = world.objects.get(&doc.final_document_path).await.unwrap();
    let out = lopdf::Document::load_mem(&bytes).unwrap();
    let pages = out.get_pages();
    let page1 = out.get_page_content(pages[&1]).unwrap();
    let page2 = out.get_page_content(pages[&2]).unwrap();
    assert!(page2.windows(8).any(|w| w == b"Jane Doe"));
    assert!(!page1.windows(8).any(|w| w == b"Jane Doe"));
}

#[tokio::test]
async fn blank_required_name_blocks_the_form_step() {
    let world = signing_world(vec![
        ("full_name", FieldType::Text, 1, true),
        ("signature", FieldType::Signature, 1, true),
    ])
    .await;

    let mut session = world
        .guard
        .open_session(&world.recipient.access_token)
        .await
        .unwrap();
    session.advance().unwrap();
    session.advance().unwrap();

    match session.advance() {
        Err(Error::Validation(missing)) => assert_eq!(missing, vec!["full_name".to_string()]),
        other => panic!("expected a validation failure, got {:?}", other),
    }
    assert_eq!(session.step(), SigningStep::Form);
    assert!(world.store.signed_documents().await.is_empty());
}

#[tokio::test]
async fn two_tabs_on_one_token_produce_one_record() {
    let world = signing_world(vec![("signature", FieldType::Signature, 1, true)]).await;

    let mut first = world
        .guard
        .open_session(&world.recipient.access_token)
        .await
        .unwrap();
    let mut second = world
        .guard
        .open_session(&world.recipient.access_token)
        .await
        .unwrap();

    for session in [&mut first, &mut second] {
        session.advance().unwrap();
        session.advance().unwrap();
        session.advance().unwrap();
        sign(session, "signature");
    }

    first.submit(&world.engine).await.unwrap();
    let err = second.submit(&world.engine).await.unwrap_err();
    assert!(matches!(err, Error::ExpiredLink));

    assert_eq!(world.store.signed_documents().await.len(), 1);
    assert_eq!(second.step(), SigningStep::Signature);
}

#[tokio::test]
async fn a_signed_link_never_reopens() {
    let world = signing_world(vec![("signature", FieldType::Signature, 1, true)]).await;

    let mut session = world
        .guard
        .open_session(&world.recipient.access_token)
        .await
        .unwrap();
    session.advance().unwrap();
    session.advance().unwrap();
    session.advance().unwrap();
    sign(&mut session, "signature");
    session.submit(&world.engine).await.unwrap();

    let err = world
        .guard
        .open_session(&world.recipient.access_token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExpiredLink));
}
