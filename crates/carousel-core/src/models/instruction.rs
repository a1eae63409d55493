use serde::{Deserialize, Serialize};

/// One entry of the payload the host form submits for an attachment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Instruction {
    /// Link a file uploaded during this session.
    Create {
        upload_id: String,
        ordering: u32,
        is_main: bool,
    },
    /// Keep a previously persisted file, possibly at a new position.
    Keep {
        upload_id: String,
        ordering: u32,
        is_main: bool,
    },
    /// Unlink a file that was marked for deletion.
    Delete { upload_id: String },
}

impl Instruction {
    pub fn upload_id(&self) -> &str {
        match self {
            Instruction::Create { upload_id, .. }
            | Instruction::Keep { upload_id, .. }
            | Instruction::Delete { upload_id } => upload_id,
        }
    }
}
