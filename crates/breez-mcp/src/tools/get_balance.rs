//! Wallet balance tool

use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, DispatchError, Hints, ToolContext, ToolEntry, ToolFuture};

#[derive(Debug, Default, Deserialize)]
struct GetBalanceParams {}

pub const ENTRY: ToolEntry = ToolEntry {
    name: "get_balance",
    title: "Get Wallet Balance",
    description: "Get the wallet balance in satoshis and BTC, together with an on-chain \
                  receive address.",
    args: &[],
    hints: Hints::READ,
    handler: handle,
};

fn handle(ctx: &ToolContext, arguments: Value) -> ToolFuture<'_> {
    Box::pin(execute(ctx, arguments))
}

async fn execute(ctx: &ToolContext, arguments: Value) -> Result<Value, DispatchError> {
    let _params: GetBalanceParams = parse_args(arguments)?;
    let info = ctx.session.get_balance().await?;

    Ok(json!({
        "balance": info.balance_sat,
        "address": info.address,
        "balanceBTC": info.balance_btc(),
    }))
}
