//! Client-facing rejection texts.
//!
//! Spanish strings match what existing dashboard clients already parse.

pub use crate::config::MessageLanguage;

impl MessageLanguage {
    pub fn unauthorized(self) -> &'static str {
        match self {
            MessageLanguage::En => "Unauthorized",
            MessageLanguage::Es => "No autorizado",
        }
    }

    pub fn rate_limited(self) -> &'static str {
        match self {
            MessageLanguage::En => "Rate limit exceeded",
            MessageLanguage::Es => "Rate limit excedido",
        }
    }

    pub fn missing_key(self) -> &'static str {
        match self {
            MessageLanguage::En => "Missing API key. Header: X-API-Key",
            MessageLanguage::Es => "API Key faltante. Header: X-API-Key",
        }
    }

    /// Used when the validator gave no reason, failed or timed out.
    pub fn invalid_key(self) -> &'static str {
        match self {
            MessageLanguage::En => "Invalid API key",
            MessageLanguage::Es => "API Key inválida",
        }
    }

    /// Reason reported by the built-in key store for an unknown secret.
    pub fn unknown_key(self) -> &'static str {
        match self {
            MessageLanguage::En => "API key not recognized",
            MessageLanguage::Es => "API Key no válida",
        }
    }

    pub fn quota_exceeded(self, limit: u32) -> String {
        match self {
            MessageLanguage::En => format!("Limit of {limit} req/min reached"),
            MessageLanguage::Es => format!("Límite de {limit} req/min alcanzado"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spanish_texts_keep_the_header_name() {
        assert!(MessageLanguage::Es.missing_key().ends_with("Header: X-API-Key"));
        assert_eq!(MessageLanguage::Es.quota_exceeded(5), "Límite de 5 req/min alcanzado");
        assert_eq!(MessageLanguage::En.quota_exceeded(5), "Limit of 5 req/min reached");
    }
}
