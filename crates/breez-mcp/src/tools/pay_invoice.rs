//! Lightning invoice payment tool

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    parse_args, ArgKind, ArgSpec, DispatchError, Hints, ToolContext, ToolEntry, ToolFuture,
};
use crate::invariants::validate_destination;

#[derive(Debug, Deserialize)]
struct PayInvoiceParams {
    invoice: String,
}

pub const ENTRY: ToolEntry = ToolEntry {
    name: "pay_invoice",
    title: "Pay Invoice",
    description: "Pay a Lightning invoice. Funds leave the wallet immediately; fees are \
                  chosen by the wallet.",
    args: &[ArgSpec::required(
        "invoice",
        ArgKind::String,
        "Lightning invoice to pay",
    )],
    hints: Hints::SPEND,
    handler: handle,
};

fn handle(ctx: &ToolContext, arguments: Value) -> ToolFuture<'_> {
    Box::pin(execute(ctx, arguments))
}

async fn execute(ctx: &ToolContext, arguments: Value) -> Result<Value, DispatchError> {
    let params: PayInvoiceParams = parse_args(arguments)?;
    let invoice = validate_destination(&params.invoice)?;

    let sent = ctx.session.pay_invoice(invoice).await?;

    Ok(json!({
        "paymentId": sent.payment_id,
        "invoice": invoice,
        "status": sent.status,
    }))
}
