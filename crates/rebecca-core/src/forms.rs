use crate::error::FormError;

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.username.trim().is_empty() {
            return Err(FormError::MissingUsername);
        }
        if self.password.is_empty() {
            return Err(FormError::MissingPassword);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.username.clear();
        self.password.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.username.trim().is_empty() {
            return Err(FormError::MissingUsername);
        }
        if self.password.is_empty() {
            return Err(FormError::MissingPassword);
        }
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.username.clear();
        self.password.clear();
        self.confirm_password.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_requires_both_fields() {
        let mut form = LoginForm::default();
        assert_eq!(form.validate(), Err(FormError::MissingUsername));

        form.username = "ana".to_string();
        assert_eq!(form.validate(), Err(FormError::MissingPassword));

        form.password = "secret".to_string();
        assert_eq!(form.validate(), Ok(()));
    }

    #[test]
    fn test_register_rejects_mismatched_passwords() {
        let form = RegisterForm {
            username: "ana".to_string(),
            password: "secret".to_string(),
            confirm_password: "secert".to_string(),
        };
        assert_eq!(form.validate(), Err(FormError::PasswordMismatch));
        assert_eq!(FormError::PasswordMismatch.to_string(), "Passwords do not match!");
    }

    #[test]
    fn test_whitespace_username_is_missing() {
        let form = RegisterForm {
            username: "   ".to_string(),
            password: "x".to_string(),
            confirm_password: "x".to_string(),
        };
        assert_eq!(form.validate(), Err(FormError::MissingUsername));
    }
}
