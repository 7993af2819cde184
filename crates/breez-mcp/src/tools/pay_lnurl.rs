//! LNURL-pay and Lightning address payment tool

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    parse_args, ArgKind, ArgSpec, DispatchError, Hints, ToolContext, ToolEntry, ToolFuture,
};
use crate::invariants::{
    validate_amount, validate_destination, validate_text, MAX_COMMENT_LEN,
};

#[derive(Debug, Deserialize)]
struct PayLnurlParams {
    url: String,
    amount: u64,
    #[serde(default)]
    comment: Option<String>,
}

pub const ENTRY: ToolEntry = ToolEntry {
    name: "pay_lnurl",
    title: "Pay LNURL",
    description: "Pay an LNURL-pay endpoint or a Lightning address (user@domain). The amount \
                  must fall inside the range the endpoint accepts. Plain invoices and \
                  addresses are paid directly.",
    args: &[
        ArgSpec::required(
            "url",
            ArgKind::String,
            "LNURL or Lightning address to pay",
        ),
        ArgSpec::required("amount", ArgKind::Number, "Amount in satoshis"),
        ArgSpec::optional(
            "comment",
            ArgKind::String,
            "Comment sent to the recipient, if the endpoint accepts one",
        ),
    ],
    hints: Hints::SPEND,
    handler: handle,
};

fn handle(ctx: &ToolContext, arguments: Value) -> ToolFuture<'_> {
    Box::pin(execute(ctx, arguments))
}

async fn execute(ctx: &ToolContext, arguments: Value) -> Result<Value, DispatchError> {
    let params: PayLnurlParams = parse_args(arguments)?;
    let url = validate_destination(&params.url)?;
    let amount = validate_amount(params.amount)?;
    if let Some(comment) = &params.comment {
        validate_text(comment, "comment", MAX_COMMENT_LEN)?;
    }

    let outcome = ctx.session.pay_lnurl(url, amount, params.comment).await?;

    let mut payload = json!({
        "paymentId": outcome.payment_id,
        "url": url,
        "amount": amount,
        "status": outcome.status,
    });
    if let Some(action) = outcome.success_action {
        payload["successAction"] = serde_json::to_value(action)
            .map_err(|e| DispatchError::InvalidArguments(e.to_string()))?;
    }
    Ok(payload)
}
