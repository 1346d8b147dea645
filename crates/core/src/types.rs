/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Marketplaces that can deliver webhooks.
///
/// Stored as lowercase text; the same string is the path segment of the
/// inbound webhook route (`/webhooks/{platform}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Shopee,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Shopee => "shopee",
        }
    }

    /// Parse a route segment or stored value. Case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "shopee" => Some(Platform::Shopee),
            _ => None,
        }
    }

    /// Name of the header carrying the request signature.
    pub fn signature_header(self) -> &'static str {
        match self {
            Platform::Shopee => "x-shopee-signature",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parse_is_case_insensitive() {
        assert_eq!(Platform::parse("Shopee"), Some(Platform::Shopee));
        assert_eq!(Platform::parse("shopee"), Some(Platform::Shopee));
        assert_eq!(Platform::parse("lazada"), None);
    }

    #[test]
    fn signature_header_is_platform_scoped() {
        assert_eq!(Platform::Shopee.signature_header(), "x-shopee-signature");
    }
}
