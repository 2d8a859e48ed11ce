use serde::{Deserialize, Serialize};
use std::fmt;

use crate::supplier::SupplierFields;

/// An independently ordered queue lane, one per command type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Create,
    Update,
    Delete,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::Create, Lane::Update, Lane::Delete];

    /// Broker-side queue/topic name for this lane.
    pub fn topic(&self) -> &'static str {
        match self {
            Lane::Create => "create_supplier",
            Lane::Update => "update_supplier",
            Lane::Delete => "delete_supplier",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic())
    }
}

/// A pending supplier mutation. Serialized once by the gateway and decoded from the
/// same bytes by the consumer; carries no timestamp or sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationCommand {
    Create {
        company_name: String,
        contact_person: String,
        phone: String,
    },
    Update {
        id: i64,
        company_name: String,
        contact_person: String,
        phone: String,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Malformed command payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{command} command delivered on lane {lane}")]
    WrongLane { command: Lane, lane: Lane },
}

impl MutationCommand {
    pub fn create(fields: SupplierFields) -> Self {
        MutationCommand::Create {
            company_name: fields.company_name,
            contact_person: fields.contact_person,
            phone: fields.phone,
        }
    }

    pub fn update(id: i64, fields: SupplierFields) -> Self {
        MutationCommand::Update {
            id,
            company_name: fields.company_name,
            contact_person: fields.contact_person,
            phone: fields.phone,
        }
    }

    pub fn delete(id: i64) -> Self {
        MutationCommand::Delete { id }
    }

    pub fn lane(&self) -> Lane {
        match self {
            MutationCommand::Create { .. } => Lane::Create,
            MutationCommand::Update { .. } => Lane::Update,
            MutationCommand::Delete { .. } => Lane::Delete,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CommandError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, CommandError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Decode a payload received on `lane`, rejecting commands that belong to another lane.
    pub fn decode_for_lane(payload: &[u8], lane: Lane) -> Result<Self, CommandError> {
        let command = Self::decode(payload)?;
        if command.lane() != lane {
            return Err(CommandError::WrongLane {
                command: command.lane(),
                lane,
            });
        }
        Ok(command)
    }
}
