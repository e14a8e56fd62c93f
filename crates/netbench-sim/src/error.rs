use netbench_stack::StackError;

use crate::config::ConfigError;
use crate::routing::RouteError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid routing table: {0}")]
    Route(#[from] RouteError),
    #[error("protocol stack: {0}")]
    Stack(#[from] StackError),
}
