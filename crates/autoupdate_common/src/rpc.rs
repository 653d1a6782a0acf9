//! JSON-RPC 2.0 types for autoupdated communication.

use serde::{Deserialize, Serialize};

use crate::update_state::{UpdateResult, UpdateStatus};

/// RPC methods supported by autoupdated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RpcMethod {
    Ping,
    GetConfig,
    SetConfig,
    GetBatteryLevel,
    GetIsCharging,
    LogDebug,
    LogInfo,
    LogWarning,
    LogError,
    UpdateDeckyLoader,
    RpmOstreeUpdate,
    ReadyForUpdate,
    SetSteamUpdateStatus,
    GetRestartAction,
}

/// JSON-RPC 2.0 request
///
/// `method` stays a string on the wire so unknown methods can be answered
/// with a proper error instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// String or number, echoed back unchanged; absent means null
    #[serde(default)]
    pub id: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: impl Into<serde_json::Value>, method: RpcMethod, params: Option<serde_json::Value>) -> Self {
        let method = serde_json::to_value(method)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Self {
            jsonrpc: "2.0".to_string(),
            method,
            params,
            id: id.into(),
        }
    }

    pub fn parsed_method(&self) -> Option<RpcMethod> {
        serde_json::from_value(serde_json::Value::String(self.method.clone())).ok()
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: serde_json::Value,
}

impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: serde_json::Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Parameters for set_config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConfigParams {
    pub key: String,
    pub value: serde_json::Value,
}

/// Parameters for the log_* methods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogParams {
    pub msg: String,
}

/// Parameters for set_steam_update_status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteamStatusParams {
    pub status: UpdateStatus,
}

/// Result payload of the update methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReply {
    pub result: UpdateResult,
    pub code: i32,
}

impl From<UpdateResult> for UpdateReply {
    fn from(result: UpdateResult) -> Self {
        Self {
            result,
            code: result.code(),
        }
    }
}
