use crate::config::Config;
use crate::entry::EntryBuilder;
use crate::location_table::LocationTable;
use crate::pipeline::{BatchSubmitter, SubmitReport};
use crate::store::PropertyValueStore;
use crate::telemetry::{validate_event, InvalidEvent};
use serde_json::Value;
use std::sync::Arc;

/// Process-wide state shared by every invocation.
#[derive(Clone)]
pub struct HandlerContext {
    table: Arc<LocationTable>,
    store: Arc<dyn PropertyValueStore>,
    batch_size: usize,
    submit_concurrency: usize,
}

#[derive(Debug)]
pub enum InvocationOutcome {
    Invalid(InvalidEvent),
    NoEntries {
        skipped_items: usize,
        skipped_attributes: usize,
    },
    Submitted {
        skipped_items: usize,
        skipped_attributes: usize,
        report: SubmitReport,
    },
}

impl InvocationOutcome {
    pub fn log_summary(&self) {
        match self {
            InvocationOutcome::Invalid(err) => {
                tracing::info!(reason = %err, "invocation dropped invalid event");
            }
            InvocationOutcome::NoEntries {
                skipped_items,
                skipped_attributes,
            } => {
                tracing::info!(
                    skipped_items,
                    skipped_attributes,
                    "invocation finished without store calls"
                );
            }
            InvocationOutcome::Submitted {
                skipped_items,
                skipped_attributes,
                report,
            } => {
                tracing::info!(
                    skipped_items,
                    skipped_attributes,
                    chunks = report.chunks.len(),
                    failed_chunks = ?report.failed_chunk_indices(),
                    sent = report.entries_sent(),
                    accepted = report.entries_accepted(),
                    rejected = report.entries_rejected(),
                    "invocation finished"
                );
            }
        }
    }
}

impl HandlerContext {
    pub fn new(
        config: &Config,
        table: Arc<LocationTable>,
        store: Arc<dyn PropertyValueStore>,
    ) -> Self {
        Self {
            table,
            store,
            batch_size: config.batch_size,
            submit_concurrency: config.submit_concurrency,
        }
    }

    /// Runs validate -> build -> submit for one event. Every failure is
    /// logged and folded into the returned outcome; nothing is raised.
    pub async fn handle_event(&self, event: &Value) -> InvocationOutcome {
        tracing::info!("stock telemetry invocation started");
        tracing::debug!(%event, "received event");

        let event = match validate_event(event) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "timestamp or stockItems missing or invalid; aborting");
                return InvocationOutcome::Invalid(err);
            }
        };
        tracing::debug!(
            ts = event.ts,
            captured_at = ?event.captured_at(),
            items = event.stock_items.len(),
            "event validated"
        );

        let built = EntryBuilder::new(&self.table).build(event.ts, &event.stock_items);
        if built.entries.is_empty() {
            tracing::warn!(
                skipped_items = built.skipped_items,
                skipped_attributes = built.skipped_attributes,
                "no valid SiteWise entries generated"
            );
            return InvocationOutcome::NoEntries {
                skipped_items: built.skipped_items,
                skipped_attributes: built.skipped_attributes,
            };
        }

        let report = BatchSubmitter::new(
            self.store.as_ref(),
            self.batch_size,
            self.submit_concurrency,
        )
        .submit(&built.entries)
        .await;

        InvocationOutcome::Submitted {
            skipped_items: built.skipped_items,
            skipped_attributes: built.skipped_attributes,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location_table::{Attribute, LocationRecord};
    use crate::pipeline::tests::ScriptedStore;
    use crate::pipeline::ChunkStatus;
    use crate::store::{EntryError, StoreError};
    use serde_json::json;

    fn config() -> Config {
        Config {
            location_table_path: None,
            batch_size: 10,
            submit_concurrency: 1,
            aws_region: None,
            sitewise_endpoint: None,
            otlp_endpoint: None,
        }
    }

    fn full_record(asset_id: &str) -> LocationRecord {
        LocationRecord::new(asset_id)
            .with_property(Attribute::Id, format!("{asset_id}-id"))
            .with_property(Attribute::Type, format!("{asset_id}-type"))
            .with_property(Attribute::State, format!("{asset_id}-state"))
    }

    fn context(store: Arc<ScriptedStore>) -> HandlerContext {
        let table = LocationTable::new(
            ["A1", "A2", "A3", "B1", "B2", "B3", "C1", "C2"]
                .into_iter()
                .map(|code| (code.to_string(), full_record(&format!("asset-{code}")))),
        );
        HandlerContext::new(&config(), Arc::new(table), store)
    }

    #[tokio::test]
    async fn single_item_scenario_submits_three_entries() {
        let store = Arc::new(ScriptedStore::default());
        let outcome = context(store.clone())
            .handle_event(&json!({
                "ts": 1700000000,
                "stockItems": [{"location": "A1", "workpiece": {"id": "W123", "type": "steel", "state": "raw"}}]
            }))
            .await;

        let calls = store.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![vec!["A1_id", "A1_type", "A1_state"]]);
        match outcome {
            InvocationOutcome::Submitted { report, .. } => {
                assert_eq!(report.entries_accepted(), 3);
                assert_eq!(report.chunks[0].status, ChunkStatus::Accepted);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_events_never_reach_the_store() {
        let store = Arc::new(ScriptedStore::default());
        let ctx = context(store.clone());
        let items = json!([{"location": "A1", "workpiece": {"id": "W"}}]);

        for event in [
            json!({"stockItems": items}),
            json!({"ts": "123", "stockItems": items}),
            json!({"ts": 12.5, "stockItems": items}),
            json!({"ts": 1, "stockItems": []}),
        ] {
            let outcome = ctx.handle_event(&event).await;
            assert!(matches!(outcome, InvocationOutcome::Invalid(_)));
        }
        assert!(store.call_sizes().is_empty());
    }

    #[tokio::test]
    async fn only_unknown_locations_means_no_store_calls() {
        let store = Arc::new(ScriptedStore::default());
        let outcome = context(store.clone())
            .handle_event(&json!({"ts": 1, "stockItems": [{"location": "Z9", "workpiece": {"id": "W"}}]}))
            .await;

        assert!(matches!(
            outcome,
            InvocationOutcome::NoEntries {
                skipped_items: 1,
                skipped_attributes: 0
            }
        ));
        assert!(store.call_sizes().is_empty());
    }

    #[tokio::test]
    async fn conflicting_operation_is_reported_without_reprocessing() {
        let store = Arc::new(ScriptedStore::with_replies([Ok(vec![EntryError {
            entry_id: "A1_state".to_string(),
            error_code: "ConflictingOperation".to_string(),
            error_message: "concurrent update".to_string(),
        }])]));
        let outcome = context(store.clone())
            .handle_event(&json!({
                "ts": 1700000000,
                "stockItems": [{"location": "A1", "workpiece": {"id": "W1", "type": "steel", "state": "raw"}}]
            }))
            .await;

        assert_eq!(store.call_sizes(), vec![3]);
        let InvocationOutcome::Submitted { report, .. } = outcome else {
            panic!("expected submission");
        };
        let errors: Vec<_> = report.entry_errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].entry_id, "A1_state");
        assert_eq!(errors[0].error_code, "ConflictingOperation");
        assert_eq!(report.entries_accepted(), 2);
        assert_eq!(report.entries_rejected(), 1);
    }

    #[tokio::test]
    async fn eight_locations_plus_unknown_batch_as_ten_ten_four() {
        let store = Arc::new(ScriptedStore::with_replies([
            Err(StoreError::Call("throttled".to_string())),
            Ok(Vec::new()),
            Ok(Vec::new()),
        ]));
        let items: Vec<_> = ["A1", "A2", "A3", "Z9", "B1", "B2", "B3", "C1", "C2"]
            .iter()
            .map(|code| json!({"location": code, "workpiece": {"id": format!("W-{code}")}}))
            .collect();

        let outcome = context(store.clone())
            .handle_event(&json!({"ts": 10, "stockItems": items}))
            .await;

        assert_eq!(store.call_sizes(), vec![10, 10, 4]);
        let calls = store.calls.lock().unwrap().clone();
        assert_eq!(calls[0][0], "A1_id");
        assert_eq!(calls[2].last().map(String::as_str), Some("C2_state"));
        let InvocationOutcome::Submitted {
            skipped_items,
            report,
            ..
        } = outcome
        else {
            panic!("expected submission");
        };
        assert_eq!(skipped_items, 1);
        assert_eq!(report.failed_chunks(), 1);
        assert_eq!(report.entries_accepted(), 14);
    }
}
