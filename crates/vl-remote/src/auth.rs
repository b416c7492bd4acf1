use std::fmt;

/// Credential attached to a remote request.
///
/// `Debug` output never contains the token.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthMethod {
    Bearer(String),
    #[default]
    Anonymous,
}

impl AuthMethod {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    /// Value for the `Authorization` header, if any.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::Bearer(token) => Some(format!("Bearer {token}")),
            Self::Anonymous => None,
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Method;
    use crate::transport::ApiRequest;

    #[test]
    fn anonymous_not_authenticated() {
        assert!(!AuthMethod::Anonymous.is_authenticated());
        assert_eq!(AuthMethod::Anonymous.header_value(), None);
    }

    #[test]
    fn bearer_is_authenticated() {
        let auth = AuthMethod::Bearer("gho_abc".into());
        assert!(auth.is_authenticated());
        assert_eq!(auth.header_value().as_deref(), Some("Bearer gho_abc"));
    }

    #[test]
    fn debug_output_redacts_token() {
        let request = ApiRequest {
            method: Method::Get,
            path: "/user".into(),
            auth: AuthMethod::Bearer("gho_secret".into()),
            body: None,
        };
        let logged = format!("{request:?}");
        assert!(!logged.contains("gho_secret"));
        assert!(logged.contains("Bearer(<redacted>)"));
    }

    #[test]
    fn default_is_anonymous() {
        assert_eq!(AuthMethod::default(), AuthMethod::Anonymous);
    }
}
