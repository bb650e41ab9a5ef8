use crate::label::Label;

/// Emitter errors
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("label {0} is referenced but was never bound")]
    UnboundLabel(Label),

    #[error("label {0} is already bound at offset {1:#x}")]
    LabelRebound(Label, usize),

    #[error("label {0} does not belong to this emitter")]
    UnknownLabel(Label),

    #[error("cannot map an empty code buffer")]
    EmptyBuffer,

    #[error("failed to map executable memory: {0}")]
    Map(#[from] std::io::Error),
}
