//! Invariants and validation for the Breez MCP server
//!
//! Envelope checks run on every request before dispatch. Argument checks
//! run inside tool handlers, after the arguments have been deserialized.

use crate::protocol::{JsonRpcError, JsonRpcRequest, RequestId, JSONRPC_VERSION};

/// Validation result
pub type ValidationResult<T> = Result<T, JsonRpcError>;

/// Total bitcoin supply in satoshis
pub const MAX_AMOUNT_SAT: u64 = 2_100_000_000_000_000;

/// BOLT11 caps the description field at 639 bytes
pub const MAX_DESCRIPTION_LEN: usize = 639;

pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

/// LNURL-pay servers advertise their own limit; this bounds what we forward
pub const MAX_COMMENT_LEN: usize = 2000;

// ============================================================================
// Protocol Invariants
// ============================================================================

/// Validate that a JSON-RPC request is well-formed
pub fn validate_request(request: &JsonRpcRequest) -> ValidationResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(JsonRpcError::invalid_request(format!(
            "jsonrpc must be \"{}\"",
            JSONRPC_VERSION
        )));
    }

    if request.method.is_empty() {
        return Err(JsonRpcError::invalid_request("method must not be empty"));
    }

    // "rpc." is reserved for JSON-RPC internal methods
    if request.method.starts_with("rpc.") {
        return Err(JsonRpcError::invalid_request(
            "methods starting with 'rpc.' are reserved",
        ));
    }

    Ok(())
}

/// Requests must carry a non-null id
pub fn validate_request_id(id: &RequestId) -> ValidationResult<()> {
    match id {
        RequestId::Null => Err(JsonRpcError::invalid_request("request id must not be null")),
        _ => Ok(()),
    }
}

// ============================================================================
// Tool Argument Validation
// ============================================================================

/// Amount in satoshis: positive and within the coin supply
pub fn validate_amount(amount_sat: u64) -> ValidationResult<u64> {
    if amount_sat == 0 {
        return Err(JsonRpcError::invalid_params("amount must be greater than zero"));
    }
    if amount_sat > MAX_AMOUNT_SAT {
        return Err(JsonRpcError::invalid_params(format!(
            "amount exceeds {} sats",
            MAX_AMOUNT_SAT
        )));
    }
    Ok(amount_sat)
}

/// Free text that ends up in an invoice or an LNURL comment; errors name `field`
pub fn validate_text<'a>(value: &'a str, field: &str, max_len: usize) -> ValidationResult<&'a str> {
    if value.len() > max_len {
        return Err(JsonRpcError::invalid_params(format!(
            "{} exceeds {} bytes",
            field, max_len
        )));
    }

    if value.chars().any(|c| c.is_control() && c != '\n') {
        return Err(JsonRpcError::invalid_params(format!(
            "{} contains control characters",
            field
        )));
    }

    Ok(value)
}

/// Message to sign or verify
pub fn validate_message(message: &str) -> ValidationResult<&str> {
    if message.is_empty() {
        return Err(JsonRpcError::invalid_params("message must not be empty"));
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(JsonRpcError::invalid_params(format!(
            "message exceeds {} bytes",
            MAX_MESSAGE_LEN
        )));
    }
    Ok(message)
}

/// Invoice, LNURL or address; trimmed
pub fn validate_destination(destination: &str) -> ValidationResult<&str> {
    let trimmed = destination.trim();
    if trimmed.is_empty() {
        return Err(JsonRpcError::invalid_params("destination must not be empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(JsonRpcError::invalid_params(
            "destination must not contain whitespace",
        ));
    }
    Ok(trimmed)
}

/// Hex-encoded public key or signature
pub fn validate_hex<'a>(value: &'a str, field: &str) -> ValidationResult<&'a str> {
    if value.is_empty() {
        return Err(JsonRpcError::invalid_params(format!("{} must not be empty", field)));
    }
    hex::decode(value)
        .map_err(|e| JsonRpcError::invalid_params(format!("{} is not valid hex: {}", field, e)))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codes;

    #[test]
    fn test_validate_request_valid() {
        let request = JsonRpcRequest::new(1, "tools/list");
        assert!(validate_request(&request).is_ok());
    }

    #[test]
    fn test_validate_request_wrong_version() {
        let mut request = JsonRpcRequest::new(1, "tools/list");
        request.jsonrpc = "1.0".to_string();
        let err = validate_request(&request).unwrap_err();
        assert_eq!(err.code, codes::INVALID_REQUEST);
    }

    #[test]
    fn test_validate_request_empty_method() {
        let request = JsonRpcRequest::new(1, "");
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_validate_request_reserved_method() {
        let request = JsonRpcRequest::new(1, "rpc.discover");
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_validate_request_id() {
        assert!(validate_request_id(&RequestId::Number(0)).is_ok());
        assert!(validate_request_id(&RequestId::String("a".into())).is_ok());
        assert!(validate_request_id(&RequestId::Null).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert_eq!(validate_amount(1).unwrap(), 1);
        assert_eq!(validate_amount(MAX_AMOUNT_SAT).unwrap(), MAX_AMOUNT_SAT);
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(MAX_AMOUNT_SAT + 1).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("Coffee", "description", MAX_DESCRIPTION_LEN).is_ok());
        assert!(validate_text("", "description", MAX_DESCRIPTION_LEN).is_ok());
        assert!(validate_text("two\nlines", "description", MAX_DESCRIPTION_LEN).is_ok());
    }

    #[test]
    fn test_validate_text_too_long() {
        let long = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        let err = validate_text(&long, "description", MAX_DESCRIPTION_LEN).unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert!(err.message.starts_with("description exceeds"));
    }

    #[test]
    fn test_validate_text_control_chars() {
        let err = validate_text("bell\u{7}", "comment", MAX_COMMENT_LEN).unwrap_err();
        assert_eq!(err.message, "comment contains control characters");
    }

    #[test]
    fn test_validate_message() {
        assert!(validate_message("hello").is_ok());
        assert!(validate_message("").is_err());
        assert!(validate_message(&"m".repeat(MAX_MESSAGE_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_destination_trims() {
        assert_eq!(validate_destination("  lntb1000n1abc \n").unwrap(), "lntb1000n1abc");
        assert!(validate_destination("   ").is_err());
        assert!(validate_destination("lntb1 000").is_err());
    }

    #[test]
    fn test_validate_hex() {
        let field = String::from("publicKey");
        let checked = validate_hex("02abcdef", &field);
        drop(field);
        assert_eq!(checked.unwrap(), "02abcdef");
        assert!(validate_hex("", "publicKey").is_err());
        let err = validate_hex("zz", "signature").unwrap_err();
        assert!(err.message.contains("signature"));
    }
}
