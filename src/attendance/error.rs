use serde_json::json;

pub type Result<T> = std::result::Result<T, AttendanceError>;

#[derive(thiserror::Error, Debug)]
pub enum AttendanceError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Authorization(String),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl AttendanceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    /// Stable wire code for the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "bad_params",
            Self::NotFound { .. } => "not_found",
            Self::Authorization(_) => "forbidden",
            Self::Db(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation { field, .. } => Some(json!({ "field": field })),
            Self::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            Self::Authorization(_) | Self::Db(_) => None,
        }
    }
}
