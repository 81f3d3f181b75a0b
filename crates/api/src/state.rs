use std::sync::Arc;

use siteaudit_analyzer::ScanManager;
use siteaudit_core::store::JobStore;
use siteaudit_events::ScanBroadcaster;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Job record store (in-memory or PostgreSQL).
    pub store: Arc<dyn JobStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Observer subscription registry and event fan-out.
    pub broadcaster: Arc<ScanBroadcaster>,
    /// Scan job orchestrator.
    pub scan_manager: Arc<ScanManager>,
}
