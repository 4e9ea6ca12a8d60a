//! Pool health summary for the gateway health endpoint

use flow_store::AccountStore;

/// Summarize the pool's quota posture as a JSON value.
///
/// Status mapping: every account under quota → healthy, some saturated →
/// degraded, none usable or store unreachable → unhealthy. Saturated is not
/// fatal (selection rolls the pool over) but signals the quota ceiling is
/// being hit.
pub async fn pool_summary(store: &dyn AccountStore) -> serde_json::Value {
    let accounts = match store.list_active().await {
        Ok(accounts) => accounts,
        Err(e) => {
            return serde_json::json!({
                "status": "unhealthy",
                "error": format!("account store unreachable: {e}"),
            });
        }
    };

    let total = accounts.len();
    let ready = accounts.iter().filter(|a| a.under_quota()).count();
    let saturated = total - ready;

    let status = if total == 0 {
        "unhealthy"
    } else if ready == total {
        "healthy"
    } else {
        "degraded"
    };

    let accounts_json: Vec<serde_json::Value> = accounts
        .iter()
        .map(|a| {
            serde_json::json!({
                "id": a.id,
                "usage_count": a.usage_count,
                "usage_limit": a.usage_limit,
                "status": if a.under_quota() { "ready" } else { "saturated" },
            })
        })
        .collect();

    serde_json::json!({
        "status": status,
        "accounts_total": total,
        "accounts_ready": ready,
        "accounts_saturated": saturated,
        "accounts": accounts_json,
    })
}
