use serde::Serialize;

/// Standardized API response wrapper for all outgoing JSON responses.
///
/// Every endpoint returns this envelope:
/// ```json
/// {
///   "success": true,
///   "data": { ... },
///   "message": "Some message"
/// }
/// ```
///
/// - `T` is the type of the `data` payload.
/// - `success` is a boolean indicating operation status.
/// - `message` provides a human-readable context string.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    /// Constructs a success response with the given data and message.
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    /// Constructs an error response with a message and default `data`.
    ///
    /// `T` must implement `Default`, since error responses do not carry a
    /// useful payload.
    pub fn error(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            data: T::default(),
            message: message.into(),
        }
    }
}
