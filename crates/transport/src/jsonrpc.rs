//! JSON-RPC 2.0 envelopes

use ethers::providers::JsonRpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct Request<'a, T> {
    pub jsonrpc: &'a str,
    pub id: u64,
    pub method: &'a str,
    pub params: T,
}

impl<'a, T> Request<'a, T> {
    pub fn new(id: u64, method: &'a str, params: T) -> Self {
        Self { jsonrpc: "2.0", id, method, params }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl Response {
    /// Result payload, or the upstream error object. A missing result is JSON `null`.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Params as sent upstream: `null` (no params) becomes an empty positional list
pub fn normalize_params(params: Value) -> Value {
    match params {
        Value::Null => Value::Array(vec![]),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_envelope() {
        let req = Request::new(7, "eth_chainId", normalize_params(Value::Null));
        assert_eq!(
            serde_json::to_value(req).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "eth_chainId", "params": []})
        );
    }

    #[test]
    fn response_error_wins() {
        let res: Response = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32602, "message": "invalid params"}
        }))
        .unwrap();
        assert_eq!(res.into_result().unwrap_err().code, -32602);

        let res: Response =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert_eq!(res.into_result().unwrap(), Value::Null);
    }
}
