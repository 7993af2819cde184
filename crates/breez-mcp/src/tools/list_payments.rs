//! Payment history tool

use serde::Deserialize;
use serde_json::Value;

use super::{
    parse_args, ArgKind, ArgSpec, DispatchError, Hints, ToolContext, ToolEntry, ToolFuture,
};

#[derive(Debug, Default, Deserialize)]
struct ListPaymentsParams {
    #[serde(default)]
    limit: Option<u32>,
}

pub const ENTRY: ToolEntry = ToolEntry {
    name: "list_payments",
    title: "List Payments",
    description: "List the wallet's payment history, newest first.",
    args: &[ArgSpec::optional(
        "limit",
        ArgKind::Number,
        "Maximum number of payments to return (default 100)",
    )],
    hints: Hints::READ,
    handler: handle,
};

fn handle(ctx: &ToolContext, arguments: Value) -> ToolFuture<'_> {
    Box::pin(execute(ctx, arguments))
}

async fn execute(ctx: &ToolContext, arguments: Value) -> Result<Value, DispatchError> {
    let params: ListPaymentsParams = parse_args(arguments)?;
    if params.limit == Some(0) {
        return Err(DispatchError::InvalidArguments(
            "limit must be greater than zero".to_string(),
        ));
    }

    let payments = ctx.session.list_payments(params.limit).await?;
    serde_json::to_value(payments).map_err(|e| DispatchError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support;
    use serde_json::json;

    #[tokio::test]
    async fn test_seeded_history() {
        let (_dir, _wallet, ctx) = test_support::context();
        let payload = execute(&ctx, json!({})).await.unwrap();
        let payments = payload.as_array().unwrap();

        assert_eq!(payments.len(), 2);
        // Newest first
        assert_eq!(payments[0]["direction"], "outgoing");
        assert_eq!(payments[0]["amountSat"], 25_000);
        assert_eq!(payments[1]["direction"], "incoming");
        assert_eq!(payments[1]["status"], "completed");
    }

    #[tokio::test]
    async fn test_limit() {
        let (_dir, _wallet, ctx) = test_support::context();
        let payload = execute(&ctx, json!({"limit": 1})).await.unwrap();
        assert_eq!(payload.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit() {
        let (_dir, _wallet, ctx) = test_support::context();
        assert!(execute(&ctx, json!({"limit": 0})).await.is_err());
    }
}
