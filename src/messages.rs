/// WebSocket and HTTP message types for client-server communication
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::controls::ControlUpdate;
use crate::dashboard::{Panel, PanelOutput, PanelResult};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Receive re-rendered panels whenever any client changes a control
    Subscribe,

    /// Request one panel
    Render { panel: Panel },

    /// Request every panel
    RenderAll,

    /// Change one or more controls
    UpdateControls { update: ControlUpdate },
}

/// Outcome of rendering one panel.
#[derive(Debug, Clone, Serialize)]
pub struct PanelEntry {
    pub panel: Panel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Arc<PanelOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<(Panel, PanelResult)> for PanelEntry {
    fn from((panel, result): (Panel, PanelResult)) -> Self {
        match result {
            Ok(output) => PanelEntry {
                panel,
                output: Some(output),
                error: None,
            },
            Err(e) => PanelEntry {
                panel,
                output: None,
                error: Some(e.root_cause().to_string()),
            },
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Subscription confirmed
    Subscribed { panels: Vec<Panel> },

    /// One rendered panel
    Panel {
        panel: Panel,
        output: Arc<PanelOutput>,
    },

    /// Several panels, each with its own outcome
    Panels { panels: Vec<PanelEntry> },

    /// Error occurred
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        panel: Option<Panel>,
        message: String,
    },
}

impl ServerMessage {
    pub fn panels(results: Vec<(Panel, PanelResult)>) -> Self {
        ServerMessage::Panels {
            panels: results.into_iter().map(PanelEntry::from).collect(),
        }
    }

    /// Reply to a single render request.
    pub fn rendered(panel: Panel, result: PanelResult) -> Self {
        match result {
            Ok(output) => ServerMessage::Panel { panel, output },
            Err(e) => ServerMessage::Error {
                panel: Some(panel),
                message: e.root_cause().to_string(),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            panel: None,
            message: message.into(),
        }
    }
}
