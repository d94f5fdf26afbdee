//! Store command - read and edit records through the synchronizer

use crate::cli::args::{StoreAction, StoreArgs};
use crate::config::Config;
use crate::error::ElyxResult;
use crate::store::{create_store, ListQuery};
use crate::sync::{CacheKey, MutationPlan, SettleReport, Synchronizer};
use crate::ui::{self, UiContext};
use serde_json::{Map, Value};

/// Execute the store command
pub async fn execute(args: StoreArgs, config: &Config) -> ElyxResult<()> {
    let ctx = UiContext::detect();
    let store = create_store(&config.store)?;
    let sync = Synchronizer::from_config(store, &config.store);

    match args.action {
        StoreAction::Get { collection, id } => {
            let value = sync.read(&CacheKey::entity(collection, id)).await?;
            ui::json(&value);
        }
        StoreAction::List {
            collection,
            page,
            limit,
            filter,
        } => {
            let query = filter
                .into_iter()
                .fold(ListQuery::new(page, limit), |query, (field, value)| {
                    query.with_filter(field, value)
                });
            let value = sync.read(&CacheKey::list(collection, query)).await?;
            ui::json(&value);
        }
        StoreAction::Patch {
            collection,
            id,
            fields,
        } => {
            let key = CacheKey::entity(collection.as_str(), id.as_str());
            sync.read(&key).await?;

            let receipt = sync
                .mutate(MutationPlan::update(&collection, &id, build_patch(fields)))
                .await?;
            report_settle(&ctx, &receipt.report);

            ui::step_ok(&ctx, &format!("Updated {}", key));
            ui::json(&sync.peek(&key).unwrap_or(receipt.payload));
        }
        StoreAction::Delete { collection, id } => {
            let key = CacheKey::entity(collection.as_str(), id.as_str());
            let receipt = sync.mutate(MutationPlan::delete(&collection, &id)).await?;
            report_settle(&ctx, &receipt.report);
            ui::step_ok(&ctx, &format!("Deleted {}", key));
        }
    }

    Ok(())
}

/// Build a JSON patch; values that parse as JSON keep their type
fn build_patch(fields: Vec<(String, String)>) -> Value {
    let map: Map<String, Value> = fields
        .into_iter()
        .map(|(field, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            (field, value)
        })
        .collect();
    Value::Object(map)
}

fn report_settle(ctx: &UiContext, report: &SettleReport) {
    for key in &report.reconciled {
        ui::key_value(ctx, "refreshed", &key.to_string());
    }
    for key in &report.evicted {
        ui::key_value(ctx, "evicted", &key.to_string());
    }
    for err in &report.fetch_errors {
        if err.is_retryable() {
            ui::step_warn_hint(ctx, &err.to_string(), "cached value may be stale");
        } else {
            ui::step_error_detail(ctx, "Reconciliation failed", &err.to_string());
        }
    }
}
