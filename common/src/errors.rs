// Error handling framework

use thiserror::Error;

/// Errors raised by a cadence tick
#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("Cadence settings not found for user")]
    MissingSettings,

    #[error("Invalid business hours: start {start} must be before end {end}")]
    InvalidBusinessHours { start: u32, end: u32 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Lock error: {0}")]
    Lock(#[from] StorageError),
}

/// Outbound transport errors (email SMTP, WhatsApp Cloud API)
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid destination '{destination}': {reason}")]
    InvalidDestination { destination: String, reason: String },

    #[error("Transport connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send rejected by provider: {0}")]
    Rejected(String),

    #[error("Provider returned malformed response: {0}")]
    MalformedResponse(String),

    #[error("Transport not configured: {0}")]
    NotConfigured(String),
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Redis / lock storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    RedisError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

/// Delivery webhook errors
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Unknown provider message id: {0}")]
    UnknownMessage(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<CadenceError> for ApiError {
    fn from(err: CadenceError) -> Self {
        let code = match err {
            CadenceError::MissingSettings => "CONFIGURATION_ERROR",
            _ => "CADENCE_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        let code = match err {
            WebhookError::InvalidSignature => "UNAUTHORIZED",
            WebhookError::UnknownMessage(_) => "NOT_FOUND",
            WebhookError::InvalidPayload(_) => "VALIDATION_ERROR",
            _ => "WEBHOOK_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::new("DATABASE_ERROR", err.to_string())
    }
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        "23503" => DatabaseError::ForeignKeyViolation(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::RedisError(err.to_string())
    }
}
