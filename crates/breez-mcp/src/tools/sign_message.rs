//! Message signing tool

use serde::Deserialize;
use serde_json::Value;

use super::{
    parse_args, ArgKind, ArgSpec, DispatchError, Hints, ToolContext, ToolEntry, ToolFuture,
};
use crate::invariants::validate_message;

#[derive(Debug, Deserialize)]
struct SignMessageParams {
    message: String,
}

pub const ENTRY: ToolEntry = ToolEntry {
    name: "sign_message",
    title: "Sign Message",
    description: "Sign a message with the wallet's private key. Returns the signature and \
                  the public key needed to verify it.",
    args: &[ArgSpec::required(
        "message",
        ArgKind::String,
        "Message to sign",
    )],
    hints: Hints {
        read_only: true,
        destructive: false,
        idempotent: true,
        open_world: false,
    },
    handler: handle,
};

fn handle(ctx: &ToolContext, arguments: Value) -> ToolFuture<'_> {
    Box::pin(execute(ctx, arguments))
}

async fn execute(ctx: &ToolContext, arguments: Value) -> Result<Value, DispatchError> {
    let params: SignMessageParams = parse_args(arguments)?;
    let message = validate_message(&params.message)?;

    let signed = ctx.session.sign_message(message).await?;
    serde_json::to_value(signed).map_err(|e| DispatchError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support;
    use serde_json::json;

    #[tokio::test]
    async fn test_sign_message() {
        let (_dir, _wallet, ctx) = test_support::context();
        let payload = execute(&ctx, json!({"message": "hello"})).await.unwrap();

        assert_eq!(payload["message"], "hello");
        assert!(payload["publicKey"].as_str().unwrap().starts_with("02"));
        assert_eq!(payload["signature"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_signing_is_deterministic() {
        let (_dir, _wallet, ctx) = test_support::context();
        let first = execute(&ctx, json!({"message": "m"})).await.unwrap();
        let second = execute(&ctx, json!({"message": "m"})).await.unwrap();
        assert_eq!(first["signature"], second["signature"]);
    }

    #[tokio::test]
    async fn test_empty_message() {
        let (_dir, _wallet, ctx) = test_support::context();
        let err = execute(&ctx, json!({"message": ""})).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArguments(_)));
    }
}
