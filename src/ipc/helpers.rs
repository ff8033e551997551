use serde::de::DeserializeOwned;
use serde_json::json;

use crate::ipc::error::err;
use crate::ipc::types::Request;

/// Deserializes `params` into a typed request. A missing `params` is treated
/// as an empty object so all-optional inputs still parse.
pub fn parse_params<T: DeserializeOwned>(req: &Request) -> Result<T, serde_json::Value> {
    let params = if req.params.is_null() {
        json!({})
    } else {
        req.params.clone()
    };
    serde_json::from_value(params)
        .map_err(|e| err(&req.id, "bad_params", format!("invalid params: {e}"), None))
}

pub fn no_workspace(req: &Request) -> serde_json::Value {
    err(&req.id, "no_workspace", "select a workspace first", None)
}
