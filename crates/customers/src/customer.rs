use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use operator_core::validation::not_blank;
use operator_core::{CustomerId, DomainResult, Entity};

/// A customer of the operator. Owns zero or more accounts.
///
/// Only `email` and the password may change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    id: CustomerId,
    creation_date: DateTime<Utc>,
    name: String,
    surname: String,
    email: String,
    password_hash: String,
}

impl Customer {
    /// Validate a create request and build a new customer with a fresh id.
    ///
    /// `password_hash` is the already-hashed form of `request.password`.
    pub fn register(
        request: &CustomerCreateRequest,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        request.validate()?;
        Ok(Self {
            id: CustomerId::new(),
            creation_date: now,
            name: request.name.trim().to_string(),
            surname: request.surname.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash,
        })
    }

    /// Rebuild a customer from persisted state.
    pub fn restore(
        id: CustomerId,
        creation_date: DateTime<Utc>,
        name: String,
        surname: String,
        email: String,
        password_hash: String,
    ) -> Self {
        Self {
            id,
            creation_date,
            name,
            surname,
            email,
            password_hash,
        }
    }

    /// Replace email and password. The request is validated first; on failure
    /// the customer is left untouched.
    pub fn change_credentials(
        &mut self,
        request: &CustomerUpdateRequest,
        password_hash: String,
    ) -> DomainResult<()> {
        request.validate()?;
        self.email = request.email.trim().to_string();
        self.password_hash = password_hash;
        Ok(())
    }

    pub fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn surname(&self) -> &str {
        &self.surname
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> CustomerId {
        self.id
    }
}

/// Request: create a customer.
// TODO: reject an email that is already registered to another customer.
// TODO: require mixed letters, digits and symbols in the password.
#[derive(Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCreateRequest {
    #[validate(custom(function = "not_blank"))]
    pub name: String,

    #[validate(custom(function = "not_blank"))]
    pub surname: String,

    #[validate(
        custom(function = "not_blank"),
        email(message = "must be a well-formed email address")
    )]
    pub email: String,

    #[validate(length(min = 8, max = 16, message = "size must be between 8 and 16"))]
    pub password: String,
}

/// Request: replace a customer's email and password.
// TODO: reject an unchanged email or password.
#[derive(Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdateRequest {
    #[validate(
        custom(function = "not_blank"),
        email(message = "must be a well-formed email address")
    )]
    pub email: String,

    #[validate(length(min = 8, max = 16, message = "size must be between 8 and 16"))]
    pub password: String,
}

impl core::fmt::Debug for CustomerCreateRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CustomerCreateRequest")
            .field("name", &self.name)
            .field("surname", &self.surname)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl core::fmt::Debug for CustomerUpdateRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CustomerUpdateRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use operator_core::DomainError;

    fn create_request(email: &str, password: &str) -> CustomerCreateRequest {
        CustomerCreateRequest {
            name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn violations(err: DomainError) -> operator_core::ValidationErrors {
        match err {
            DomainError::Validation(v) => v,
            other => panic!("Expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn register_assigns_id_and_keeps_fields() {
        let now = Utc::now();
        let customer =
            Customer::register(&create_request("ada@example.com", "secret123"), "h".into(), now)
                .unwrap();

        assert_eq!(customer.name(), "Ada");
        assert_eq!(customer.surname(), "Lovelace");
        assert_eq!(customer.email(), "ada@example.com");
        assert_eq!(customer.creation_date(), now);
        assert_eq!(customer.password_hash(), "h");
    }

    #[test]
    fn register_rejects_email_without_at_sign() {
        let err = Customer::register(&create_request("ada.example.com", "secret123"), "h".into(), Utc::now())
            .unwrap_err();
        assert!(violations(err).has_field("email"));
    }

    #[test]
    fn register_rejects_password_outside_length_bounds() {
        for password in ["short", "this-password-is-too-long"] {
            let err = Customer::register(&create_request("ada@example.com", password), "h".into(), Utc::now())
                .unwrap_err();
            let v = violations(err);
            assert!(v.has_field("password"));
            assert!(!v.has_field("email"));
        }
    }

    #[test]
    fn register_accepts_password_length_boundaries() {
        for password in ["12345678", "1234567890123456"] {
            assert!(
                Customer::register(&create_request("ada@example.com", password), "h".into(), Utc::now())
                    .is_ok()
            );
        }
    }

    #[test]
    fn register_reports_every_blank_field() {
        let request = CustomerCreateRequest {
            name: " ".into(),
            surname: "".into(),
            email: "".into(),
            password: "secret123".into(),
        };
        let v = violations(Customer::register(&request, "h".into(), Utc::now()).unwrap_err());
        assert!(v.has_field("name"));
        assert!(v.has_field("surname"));
        assert!(v.has_field("email"));
    }

    #[test]
    fn change_credentials_is_all_or_nothing() {
        let mut customer =
            Customer::register(&create_request("ada@example.com", "secret123"), "h".into(), Utc::now())
                .unwrap();
        let before = customer.clone();

        let bad = CustomerUpdateRequest {
            email: "new@example.com".into(),
            password: "short".into(),
        };
        assert!(customer.change_credentials(&bad, "h2".into()).is_err());
        assert_eq!(customer, before);

        let good = CustomerUpdateRequest {
            email: "new@example.com".into(),
            password: "secret456".into(),
        };
        customer.change_credentials(&good, "h2".into()).unwrap();
        assert_eq!(customer.email(), "new@example.com");
        assert_eq!(customer.password_hash(), "h2");
        assert_eq!(customer.id(), before.id());
        assert_eq!(customer.creation_date(), before.creation_date());
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", create_request("ada@example.com", "secret123"));
        assert!(!rendered.contains("secret123"));
    }
}
