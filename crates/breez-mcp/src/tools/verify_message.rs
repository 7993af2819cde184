//! Signature verification tool

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    parse_args, ArgKind, ArgSpec, DispatchError, Hints, ToolContext, ToolEntry, ToolFuture,
};
use crate::invariants::{validate_hex, validate_message};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyMessageParams {
    message: String,
    signature: String,
    public_key: String,
}

pub const ENTRY: ToolEntry = ToolEntry {
    name: "verify_message",
    title: "Verify Message",
    description: "Verify that a signature over a message was produced by the given public key.",
    args: &[
        ArgSpec::required("message", ArgKind::String, "Original message"),
        ArgSpec::required("signature", ArgKind::String, "Message signature"),
        ArgSpec::required(
            "publicKey",
            ArgKind::String,
            "Public key used for signing",
        ),
    ],
    hints: Hints::READ,
    handler: handle,
};

fn handle(ctx: &ToolContext, arguments: Value) -> ToolFuture<'_> {
    Box::pin(execute(ctx, arguments))
}

async fn execute(ctx: &ToolContext, arguments: Value) -> Result<Value, DispatchError> {
    let params: VerifyMessageParams = parse_args(arguments)?;
    validate_message(&params.message)?;
    validate_hex(&params.signature, "signature")?;
    validate_hex(&params.public_key, "publicKey")?;

    let is_valid = ctx
        .session
        .verify_message(&params.message, &params.signature, &params.public_key)
        .await?;

    Ok(json!({
        "message": params.message,
        "signature": params.signature,
        "publicKey": params.public_key,
        "isValid": is_valid,
    }))
}
