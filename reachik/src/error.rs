use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no node tree is linked to the solver")]
    InvalidTree,

    #[error("failed to build chain forest: {message}")]
    ChainBuildFailure { message: String },

    #[error("solve requires a successful rebuild first")]
    NotBuilt,

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("node id {id} already exists in this tree")]
    DuplicateNodeId { id: u32 },

    #[error("node {id} already has {kind} attached")]
    AlreadyAttached { kind: &'static str, id: u32 },

    #[error("the tree root cannot be unlinked")]
    RootUnlink,
}
