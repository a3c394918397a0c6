//! End-to-end event handling against an in-memory index.

mod support;

use aas_embedding_service::embeddings::hash::HashEmbedder;
use aas_embedding_service::events::{process_event, EventDispatcher, EventKind};
use aas_embedding_service::index::memory::MemoryIndex;
use aas_embedding_service::ingest::{IngestOutcome, IngestPipeline};
use aas_embedding_service::metrics::MetricsRegistry;
use serde_json::json;
use std::sync::Arc;
use support::*;

fn documentation_submodel(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "idShort": "Documentation",
        "submodelElements": [
            {"idShort": "Manual", "modelType": "File",
             "contentType": "application/pdf", "value": "http://files/manual.pdf"},
            {"idShort": "Photo", "modelType": "File", "contentType": "image/png"},
            {"idShort": "Folder", "value": [
                {"idShort": "Sheet", "modelType": "File",
                 "contentType": "application/pdf"}
            ]}
        ]
    })
}

#[tokio::test]
async fn created_submodel_indexes_every_pdf_attachment() {
    let rig = build_rig();
    let ev = event(json!({
        "type": "SM_CREATED",
        "id": "urn:sm:1",
        "submodel": documentation_submodel("urn:sm:1")
    }));

    process_event(&rig.pipeline, EventKind::Created, ev).await;

    let records = rig.index.snapshot();
    let mut paths: Vec<_> = records.iter().map(|r| r.id_short_path.as_str()).collect();
    paths.dedup();
    assert_eq!(paths, ["Manual", "Folder[0]"]);
    assert!(records.iter().all(|r| r.submodel_id == "urn:sm:1"));
    assert_eq!(rig.fetcher.call_count(), 2);
}

#[tokio::test]
async fn repeated_create_does_not_redownload_or_duplicate() {
    let rig = build_rig();
    let payload = json!({
        "type": "SM_CREATED",
        "id": "urn:sm:1",
        "submodel": documentation_submodel("urn:sm:1")
    });

    process_event(&rig.pipeline, EventKind::Created, event(payload.clone())).await;
    let after_first = rig.index.snapshot().len();

    process_event(&rig.pipeline, EventKind::Created, event(payload)).await;

    assert_eq!(rig.index.snapshot().len(), after_first);
    assert_eq!(rig.fetcher.call_count(), 2);
    assert_eq!(rig.metrics.ingest_skipped_total.get(), 2.0);
}

#[tokio::test]
async fn updated_element_replaces_its_records() {
    let rig = build_rig();
    let element = json!({
        "idShort": "Manual", "modelType": "File",
        "contentType": "application/pdf"
    });

    process_event(
        &rig.pipeline,
        EventKind::Created,
        event(json!({
            "type": "FILE_SME_CREATED", "id": "urn:sm:1",
            "smElementPath": "Docs.Manual", "smElement": element.clone()
        })),
    )
    .await;
    assert!(rig
        .index
        .snapshot()
        .iter()
        .all(|r| r.text.contains("maintenance")));

    rig.converter.set_text("revised maintenance instructions v2");
    process_event(
        &rig.pipeline,
        EventKind::Updated,
        event(json!({
            "type": "FILE_SME_UPDATED", "id": "urn:sm:1",
            "smElementPath": "Docs.Manual", "smElement": element
        })),
    )
    .await;

    let records = rig.index.snapshot();
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.text.contains("v2")));
    assert!(records.iter().all(|r| r.id_short_path == "Docs.Manual"));
    assert_eq!(rig.fetcher.call_count(), 2);
}

#[tokio::test]
async fn element_path_falls_back_to_id_short() {
    let rig = build_rig();
    process_event(
        &rig.pipeline,
        EventKind::Created,
        event(json!({
            "type": "FILE_SME_CREATED", "id": "urn:sm:1",
            "smElement": {"idShort": "Manual", "modelType": "File",
                          "contentType": "application/pdf"}
        })),
    )
    .await;

    let records = rig.index.snapshot();
    assert!(records.iter().all(|r| r.id_short_path == "Manual"));
}

#[tokio::test]
async fn deleted_element_removes_only_its_path() {
    let rig = build_rig();
    for path in ["A.B", "A.C"] {
        process_event(
            &rig.pipeline,
            EventKind::Created,
            event(json!({
                "type": "FILE_SME_CREATED", "id": "urn:sm:1",
                "smElementPath": path,
                "smElement": {"idShort": "Doc", "modelType": "File",
                              "contentType": "application/pdf"}
            })),
        )
        .await;
    }

    process_event(
        &rig.pipeline,
        EventKind::Deleted,
        event(json!({
            "type": "FILE_SME_DELETED", "id": "urn:sm:1",
            "smElementPath": "A.B"
        })),
    )
    .await;

    let records = rig.index.snapshot();
    assert!(!records.is_empty());
    // "A.B" is gone, the sibling path survives untouched.
    assert!(records.iter().all(|r| r.id_short_path == "A.C"));
}

#[tokio::test]
async fn deleted_submodel_removes_all_its_records_and_no_others() {
    let rig = build_rig();
    for id in ["urn:sm:1", "urn:sm:2"] {
        process_event(
            &rig.pipeline,
            EventKind::Created,
            event(json!({
                "type": "SM_CREATED", "id": id,
                "submodel": documentation_submodel(id)
            })),
        )
        .await;
    }

    process_event(
        &rig.pipeline,
        EventKind::Deleted,
        event(json!({"type": "SM_DELETED", "id": "urn:sm:1"})),
    )
    .await;

    let records = rig.index.snapshot();
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.submodel_id == "urn:sm:2"));
}

#[tokio::test]
async fn updated_submodel_reindexes_the_whole_entity() {
    let rig = build_rig();
    process_event(
        &rig.pipeline,
        EventKind::Created,
        event(json!({
            "type": "SM_CREATED", "id": "urn:sm:1",
            "submodel": documentation_submodel("urn:sm:1")
        })),
    )
    .await;

    // The update payload dropped one attachment; its records must not
    // survive the re-index.
    rig.converter.set_text("updated body");
    process_event(
        &rig.pipeline,
        EventKind::Updated,
        event(json!({
            "type": "SM_UPDATED", "id": "urn:sm:1",
            "submodel": {
                "id": "urn:sm:1",
                "idShort": "Documentation",
                "submodelElements": [
                    {"idShort": "Manual", "modelType": "File",
                     "contentType": "application/pdf"}
                ]
            }
        })),
    )
    .await;

    let records = rig.index.snapshot();
    assert!(records.iter().all(|r| r.id_short_path == "Manual"));
    assert!(records.iter().all(|r| r.text.contains("updated body")));
}

#[tokio::test]
async fn empty_attachment_is_not_indexed() {
    let rig = build_rig();
    rig.converter.set_text("   ");

    let element = serde_json::from_value(json!({
        "idShort": "Manual", "modelType": "File",
        "contentType": "application/pdf"
    }))
    .unwrap();

    let outcome = rig
        .pipeline
        .ingest_attachment("urn:sm:1", "Manual", &element)
        .await
        .unwrap();

    assert_eq!(outcome, IngestOutcome::EmptyDocument);
    assert!(rig.index.snapshot().is_empty());
}

#[tokio::test]
async fn delete_failure_is_swallowed_and_counted() {
    let index = Arc::new(FailingDeleteIndex {
        inner: MemoryIndex::new(),
    });
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let pipeline = Arc::new(IngestPipeline::new(
        Arc::new(test_config()),
        index,
        Box::new(HashEmbedder::new(16)),
        Arc::new(CountingFetcher::new()),
        Arc::new(ScriptedConverter::new("text")),
        Arc::clone(&metrics),
    ));

    // Must not panic or error out of the event.
    process_event(
        &pipeline,
        EventKind::Deleted,
        event(json!({"type": "SM_DELETED", "id": "urn:sm:1"})),
    )
    .await;

    assert_eq!(metrics.delete_errors_swallowed_total.get(), 1.0);
}

#[tokio::test]
async fn dispatcher_processes_queued_events() {
    let rig = build_rig();
    let dispatcher = EventDispatcher::start(Arc::clone(&rig.pipeline), 2);

    dispatcher.dispatch(
        EventKind::Created,
        event(json!({
            "type": "SM_CREATED", "id": "urn:sm:1",
            "submodel": documentation_submodel("urn:sm:1")
        })),
    );
    let index = Arc::clone(&rig.index);
    wait_until(move || !index.snapshot().is_empty()).await;

    // Same entity routes to the same worker, so the delete runs after the
    // create even though both were queued back to back.
    dispatcher.dispatch(
        EventKind::Deleted,
        event(json!({"type": "SM_DELETED", "id": "urn:sm:1"})),
    );
    let index = Arc::clone(&rig.index);
    wait_until(move || index.snapshot().is_empty()).await;
}
