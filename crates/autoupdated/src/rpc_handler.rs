//! RPC request handlers.

use autoupdate_common::error::AutoUpdateError;
use autoupdate_common::rpc::{
    LogParams, RpcMethod, RpcRequest, RpcResponse, SetConfigParams, SteamStatusParams,
    UpdateReply,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::state::PluginState;

/// Handle an RPC request
pub async fn handle_request(state: &PluginState, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();

    let Some(method) = request.parsed_method() else {
        let err = AutoUpdateError::UnknownMethod(request.method.clone());
        warn!("{}", err);
        return RpcResponse::error(id, err.code(), err.to_string());
    };
    debug!("Executing {:?}", method);

    let result = match method {
        RpcMethod::Ping => Ok(Value::from("pong")),
        RpcMethod::GetConfig => handle_get_config(state).await,
        RpcMethod::SetConfig => handle_set_config(state, request.params).await,
        RpcMethod::GetBatteryLevel => to_value(state.battery.battery_level()),
        RpcMethod::GetIsCharging => to_value(state.battery.is_charging()),
        RpcMethod::LogDebug
        | RpcMethod::LogInfo
        | RpcMethod::LogWarning
        | RpcMethod::LogError => handle_log(method, request.params),
        RpcMethod::UpdateDeckyLoader => to_value(UpdateReply::from(state.run_loader_update().await)),
        RpcMethod::RpmOstreeUpdate => to_value(UpdateReply::from(state.run_os_update().await)),
        RpcMethod::ReadyForUpdate => to_value(state.ready_for_update().await),
        RpcMethod::SetSteamUpdateStatus => handle_set_steam_status(state, request.params).await,
        RpcMethod::GetRestartAction => to_value(state.restart.lock().await.pending_action()),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(e) => {
            error!("{:?} failed: {}", method, e);
            RpcResponse::error(id, e.code(), e.to_string())
        }
    }
}

type HandlerResult = Result<Value, AutoUpdateError>;

fn to_value<T: Serialize>(value: T) -> HandlerResult {
    Ok(serde_json::to_value(value)?)
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, AutoUpdateError> {
    let params = params.ok_or_else(|| AutoUpdateError::InvalidParams("missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| AutoUpdateError::InvalidParams(e.to_string()))
}

async fn handle_get_config(state: &PluginState) -> HandlerResult {
    Ok(Value::Object(state.config.read().await.get_config()))
}

async fn handle_set_config(state: &PluginState, params: Option<Value>) -> HandlerResult {
    let params: SetConfigParams = parse_params(params)?;
    debug!("set_config(key={}, value={})", params.key, params.value);
    state
        .config
        .write()
        .await
        .set_config(&params.key, params.value)?;
    Ok(Value::Null)
}

/// Forward a front-end log line into the daemon log
fn handle_log(method: RpcMethod, params: Option<Value>) -> HandlerResult {
    let LogParams { msg } = parse_params(params)?;
    match method {
        RpcMethod::LogDebug => debug!(target: "frontend", "{}", msg),
        RpcMethod::LogInfo => info!(target: "frontend", "{}", msg),
        RpcMethod::LogWarning => warn!(target: "frontend", "{}", msg),
        _ => error!(target: "frontend", "{}", msg),
    }
    Ok(Value::Null)
}

async fn handle_set_steam_status(state: &PluginState, params: Option<Value>) -> HandlerResult {
    let SteamStatusParams { status } = parse_params(params)?;
    state.restart.lock().await.set_steam_status(status);
    Ok(Value::Null)
}
