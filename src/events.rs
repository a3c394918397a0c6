//! Event classification, processing, and the ordered worker pool.

use crate::attachment::is_pdf_attachment;
use crate::ingest::IngestPipeline;
use crate::model::{Element, Event};
use crate::path::PathContext;
use crate::walker;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Supported event kinds, derived from the type suffix. The prefix names
/// the entity (`SM_`, `SME_`, ...) and is not needed for classification:
/// the payload shape decides whether a whole submodel or a single element
/// is affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn classify(event_type: &str) -> Option<Self> {
        let upper = event_type.trim().to_ascii_uppercase();
        if upper.ends_with("_CREATED") {
            Some(Self::Created)
        } else if upper.ends_with("_UPDATED") {
            Some(Self::Updated)
        } else if upper.ends_with("_DELETED") {
            Some(Self::Deleted)
        } else {
            None
        }
    }
}

/// Handle one classified event to completion.
///
/// Per-attachment failures are logged and do not abort the remaining
/// attachments of the same event; deletion failures never propagate at all.
pub async fn process_event(pipeline: &IngestPipeline, kind: EventKind, event: Event) {
    let submodel_id = event.id.clone();

    match kind {
        EventKind::Created => {
            ingest_payload(pipeline, &submodel_id, &event, false).await;
        }
        EventKind::Updated => {
            // Replace semantics: drop the stale records first, scoped to
            // the element path when one is affected, then re-ingest.
            ingest_payload(pipeline, &submodel_id, &event, true).await;
        }
        EventKind::Deleted => {
            pipeline
                .delete_documents(&submodel_id, event.sm_element_path.as_deref())
                .await;
        }
    }
}

/// Ingest every PDF attachment reachable from the event payload. For
/// element-scoped events the element's repository path prefixes all
/// computed paths.
async fn ingest_payload(
    pipeline: &IngestPipeline,
    submodel_id: &str,
    event: &Event,
    replace: bool,
) {
    let (root, base_path) = match (&event.submodel, &event.sm_element) {
        (Some(submodel), _) => (submodel, None),
        (None, Some(element)) => {
            let base = event
                .sm_element_path
                .as_deref()
                .or(element.id_short.as_deref());
            (element, base)
        }
        (None, None) => {
            warn!(
                submodel_id,
                event_type = %event.event_type,
                "event carries no submodel or element payload, nothing to ingest"
            );
            return;
        }
    };

    if replace {
        pipeline.delete_documents(submodel_id, base_path).await;
    }

    let attachments = collect_attachments(root, base_path);
    if attachments.is_empty() {
        info!(submodel_id, "no pdf attachments in event payload");
        return;
    }

    for (location_path, element) in attachments {
        if let Err(err) = pipeline
            .ingest_attachment(submodel_id, &location_path, element)
            .await
        {
            error!(
                submodel_id,
                location_path,
                error = %err,
                "failed to ingest attachment"
            );
        }
    }
}

/// Walk the tree under `root` and return every PDF file node with its
/// resolved location path. Nodes whose path cannot be resolved are logged
/// and skipped; their siblings are unaffected.
pub fn collect_attachments<'a>(
    root: &'a Element,
    base_path: Option<&str>,
) -> Vec<(String, &'a Element)> {
    let mut ctx = PathContext::new(base_path);
    let mut found = Vec::new();

    walker::walk(&mut ctx, root, |ctx, node| {
        if !is_pdf_attachment(node) {
            return;
        }
        match ctx.location_path() {
            Ok(path) => found.push((path, node)),
            Err(err) => warn!(
                id_short = node.id_short.as_deref().unwrap_or("<unnamed>"),
                error = %err,
                "skipping attachment with unresolvable path"
            ),
        }
    });

    found
}

/// Worker pool that processes events concurrently while keeping all events
/// of one entity on the same worker, so per-entity order is preserved.
pub struct EventDispatcher {
    senders: Vec<mpsc::UnboundedSender<(EventKind, Event)>>,
}

impl EventDispatcher {
    pub fn start(pipeline: Arc<IngestPipeline>, workers: usize) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let (tx, mut rx) = mpsc::unbounded_channel::<(EventKind, Event)>();
            let pipeline = Arc::clone(&pipeline);

            tokio::spawn(async move {
                while let Some((kind, event)) = rx.recv().await {
                    info!(
                        worker_id,
                        event_type = %event.event_type,
                        id = %event.id,
                        "processing event"
                    );
                    process_event(&pipeline, kind, event).await;
                }
            });

            senders.push(tx);
        }

        Self { senders }
    }

    /// Route by entity id so a given submodel's events are totally ordered.
    pub fn dispatch(&self, kind: EventKind, event: Event) {
        let mut hasher = DefaultHasher::new();
        event.id.hash(&mut hasher);
        let slot = (hasher.finish() as usize) % self.senders.len();

        if self.senders[slot].send((kind, event)).is_err() {
            error!(slot, "event worker channel closed, dropping event");
        }
    }
}
