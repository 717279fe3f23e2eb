//! Per-request settings extracted from storefront HTTP headers.

use axum::http::{HeaderMap, header};
use secrecy::SecretString;

use crate::config::CommerceConfig;

/// Cookie set by the storefront after a customer signs in.
pub const ACCESS_TOKEN_COOKIE: &str = "ccs-access_token";

/// Customer id used for the signed-in customer's own resources.
pub const CURRENT_CUSTOMER: &str = "current";

/// Settings that vary per storefront request.
///
/// Implements `Debug` manually to redact the bearer token.
#[derive(Clone)]
pub struct RequestSettings {
    /// Customer bearer token forwarded to the backend
    pub bearer: Option<SecretString>,
    /// Customer the request acts for (`current` when a bearer is present)
    pub customer_id: Option<String>,
    /// Locale for localized backend fields
    pub locale: String,
    /// Currency for carts and prices
    pub currency: String,
    /// Country for carts
    pub country: String,
}

impl std::fmt::Debug for RequestSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSettings")
            .field("bearer", &self.bearer.as_ref().map(|_| "[REDACTED]"))
            .field("customer_id", &self.customer_id)
            .field("locale", &self.locale)
            .field("currency", &self.currency)
            .field("country", &self.country)
            .finish()
    }
}

impl RequestSettings {
    /// Settings for a request without customer authorization.
    #[must_use]
    pub fn anonymous(
        locale: impl Into<String>,
        currency: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            bearer: None,
            customer_id: None,
            locale: locale.into(),
            currency: currency.into(),
            country: country.into(),
        }
    }

    /// Attach a customer bearer token.
    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(SecretString::from(token.into()));
        self.customer_id = Some(CURRENT_CUSTOMER.to_string());
        self
    }

    /// Extract settings from storefront request headers.
    ///
    /// The bearer token is read from the `ccs-access_token` cookie first and
    /// from an `Authorization: Bearer` header otherwise. The locale is the
    /// first `Accept-Language` range, falling back to the configured default.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, commerce: &CommerceConfig) -> Self {
        let locale = headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .and_then(preferred_locale)
            .unwrap_or_else(|| commerce.default_locale.clone());

        let settings = Self::anonymous(locale, &commerce.currency, &commerce.country);

        match bearer_from_cookie(headers).or_else(|| bearer_from_authorization(headers)) {
            Some(token) => settings.with_bearer(token),
            None => settings,
        }
    }
}

fn bearer_from_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_from_authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn preferred_locale(accept_language: &str) -> Option<String> {
    accept_language
        .split(',')
        .filter_map(|range| range.split(';').next())
        .map(str::trim)
        .find(|range| !range.is_empty() && *range != "*")
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use secrecy::ExposeSecret;
    use url::Url;

    use super::*;

    fn commerce() -> CommerceConfig {
        CommerceConfig::new(Url::parse("http://localhost:8080/graphql").unwrap())
    }

    #[test]
    fn test_anonymous_request() {
        let settings = RequestSettings::from_headers(&HeaderMap::new(), &commerce());
        assert!(settings.bearer.is_none());
        assert!(settings.customer_id.is_none());
        assert_eq!(settings.locale, "en");
        assert_eq!(settings.currency, "EUR");
    }

    #[test]
    fn test_bearer_from_cookie_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; ccs-access_token=cookie-token"),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );

        let settings = RequestSettings::from_headers(&headers, &commerce());
        assert_eq!(settings.bearer.unwrap().expose_secret(), "cookie-token");
        assert_eq!(settings.customer_id.as_deref(), Some(CURRENT_CUSTOMER));
    }

    #[test]
    fn test_bearer_from_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );

        let settings = RequestSettings::from_headers(&headers, &commerce());
        assert_eq!(settings.bearer.unwrap().expose_secret(), "header-token");
    }

    #[test]
    fn test_non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );

        let settings = RequestSettings::from_headers(&headers, &commerce());
        assert!(settings.bearer.is_none());
    }

    #[test]
    fn test_accept_language() {
        assert_eq!(preferred_locale("de-DE,de;q=0.9,en;q=0.8").as_deref(), Some("de-DE"));
        assert_eq!(preferred_locale("*, fr;q=0.5").as_deref(), Some("fr"));
        assert_eq!(preferred_locale("*"), None);
    }

    #[test]
    fn test_debug_redacts_bearer() {
        let settings = RequestSettings::anonymous("en", "EUR", "DE").with_bearer("super-secret-token");
        let debug_output = format!("{settings:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-token"));
    }
}
