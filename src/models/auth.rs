use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::ValidationError;

pub const LOGIN_PASSWORD_MIN: usize = 6;
pub const SIGNUP_PASSWORD_MIN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

impl LoginRequest {
    /// 手机号必须恰好 10 位数字，密码至少 6 位
    pub fn validate(&self) -> ValidationError {
        let mut errors = ValidationError::new();
        errors.require("phone", &self.phone);
        if !errors.contains("phone") && !is_ten_digits(&self.phone) {
            errors.add("phone", "Phone number must be exactly 10 digits");
        }
        check_password(&mut errors, &self.password, LOGIN_PASSWORD_MIN);
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub phone: String,
    pub student_year: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> ValidationError {
        let mut errors = ValidationError::new();
        errors.require("name", &self.name);
        errors.require("phone", &self.phone);
        if !errors.contains("phone") && !is_ten_digits(&self.phone) {
            errors.add("phone", "Phone number must be 10 digits");
        }
        errors.require("studentYear", &self.student_year);
        check_password(&mut errors, &self.password, SIGNUP_PASSWORD_MIN);
        errors
    }
}

/// 登录 / 注册响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub message: String,
}

static PHONE_RE: OnceLock<Regex> = OnceLock::new();

fn is_ten_digits(phone: &str) -> bool {
    PHONE_RE
        .get_or_init(|| Regex::new(r"^[0-9]{10}$").expect("phone pattern is valid"))
        .is_match(phone)
}

fn check_password(errors: &mut ValidationError, password: &str, min_len: usize) {
    errors.require("password", password);
    if !errors.contains("password") && password.chars().count() < min_len {
        errors.add(
            "password",
            format!("Password must be at least {} characters", min_len),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::REQUIRED_MESSAGE;

    #[test]
    fn test_login_phone_rules() {
        let mut req = LoginRequest {
            phone: "98765 4321".to_string(),
            password: "secret1".to_string(),
        };
        assert_eq!(
            req.validate().message("phone"),
            Some("Phone number must be exactly 10 digits")
        );

        req.phone = "9876543210".to_string();
        assert!(req.validate().is_empty());

        req.password = "12345".to_string();
        assert!(req.validate().contains("password"));
    }

    #[test]
    fn test_phone_pattern_edges() {
        for phone in ["987654321", "98765432101", "98765o4321", "+919876543"] {
            assert!(!is_ten_digits(phone), "{phone}");
        }
        assert!(is_ten_digits("0000000000"));
        assert!(is_ten_digits("9876543210"));
    }

    #[test]
    fn test_signup_requires_everything() {
        let req = SignupRequest {
            name: String::new(),
            phone: String::new(),
            student_year: String::new(),
            password: String::new(),
        };
        let errors = req.validate();
        for field in ["name", "phone", "studentYear", "password"] {
            assert_eq!(errors.message(field), Some(REQUIRED_MESSAGE));
        }
    }

    #[test]
    fn test_signup_password_is_longer_than_login() {
        let req = SignupRequest {
            name: "Meera".to_string(),
            phone: "9876543210".to_string(),
            student_year: "2".to_string(),
            password: "abcdefg".to_string(),
        };
        assert_eq!(
            req.validate().message("password"),
            Some("Password must be at least 8 characters")
        );
    }

    #[test]
    fn test_signup_wire_names() {
        let json = serde_json::to_value(SignupRequest {
            name: "Meera".to_string(),
            phone: "9876543210".to_string(),
            student_year: "3".to_string(),
            password: "longenough".to_string(),
        })
        .unwrap();
        assert_eq!(json["studentYear"], "3");
    }
}
