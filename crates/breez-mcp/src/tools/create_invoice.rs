//! Invoice creation tool

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    parse_args, ArgKind, ArgSpec, DispatchError, Hints, ToolContext, ToolEntry, ToolFuture,
};
use crate::invariants::{validate_amount, validate_text, MAX_DESCRIPTION_LEN};

#[derive(Debug, Deserialize)]
struct CreateInvoiceParams {
    amount: u64,
    #[serde(default)]
    description: Option<String>,
}

pub const ENTRY: ToolEntry = ToolEntry {
    name: "create_invoice",
    title: "Create Invoice",
    description: "Create a Lightning invoice for receiving a payment of the given amount.",
    args: &[
        ArgSpec::required("amount", ArgKind::Number, "Amount in satoshis"),
        ArgSpec::optional(
            "description",
            ArgKind::String,
            "Optional description for the invoice",
        ),
    ],
    hints: Hints {
        read_only: false,
        destructive: false,
        idempotent: false,
        open_world: true,
    },
    handler: handle,
};

fn handle(ctx: &ToolContext, arguments: Value) -> ToolFuture<'_> {
    Box::pin(execute(ctx, arguments))
}

async fn execute(ctx: &ToolContext, arguments: Value) -> Result<Value, DispatchError> {
    let params: CreateInvoiceParams = parse_args(arguments)?;
    let amount = validate_amount(params.amount)?;
    if let Some(description) = &params.description {
        validate_text(description, "description", MAX_DESCRIPTION_LEN)?;
    }

    let invoice = ctx.session.create_invoice(amount, params.description).await?;

    Ok(json!({
        "invoice": invoice.invoice,
        "amount": invoice.amount_sat,
        "description": invoice.description,
    }))
}
