//! autoupdated library - exposes modules for testing.

pub mod logging;
pub mod rpc_handler;
pub mod rpc_server;
pub mod scheduler;
pub mod state;
