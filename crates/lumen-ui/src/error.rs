use std::path::PathBuf;

use lumen_engine::window::WindowError;

use crate::node::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("no node {0:?} in this scene")]
    UnknownNode(NodeId),

    #[error("node {0:?} is not a viewport")]
    NotAViewport(NodeId),

    #[error("node {id:?} is not a {expected} node")]
    WrongKind { id: NodeId, expected: &'static str },

    #[error("the root viewport cannot be removed or moved")]
    Root,

    #[error("failed to write `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PNG encoding failed")]
    Encode(#[source] image::ImageError),

    /// Presenting the root viewport through its window failed.
    #[error(transparent)]
    Window(#[from] WindowError),
}
