/// Errors from the Shopee API layer.
#[derive(Debug, thiserror::Error)]
pub enum ShopeeError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Shopee answered with a non-2xx status or a non-empty `error` code.
    #[error("Shopee API error ({status}) {error}: {message}")]
    Api {
        status: u16,
        error: String,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Unexpected Shopee response: {0}")]
    Decode(String),

    /// Partner credentials are not configured.
    #[error("Shopee partner credentials are not configured")]
    NotConfigured,
}

/// API error codes Shopee uses for expired or revoked tokens. The
/// misspelling is Shopee's own.
const AUTH_ERROR_CODES: [&str; 3] = ["error_auth", "invalid_access_token", "invalid_acceess_token"];

impl ShopeeError {
    /// Whether this failure looks like an expired or revoked access token.
    pub fn is_auth_error(&self) -> bool {
        match self {
            ShopeeError::Api { status, error, .. } => {
                *status == 401 || *status == 403 || AUTH_ERROR_CODES.contains(&error.as_str())
            }
            _ => false,
        }
    }
}
