//! JSON 请求体提取
//!
//! 反序列化失败按字段报告为 400 `{message, fields}`，而不是 axum 默认的 422 纯文本。

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use crate::error::{ValidationError, REQUIRED_MESSAGE};
use crate::server::routes::ServerError;

/// 无法归到某个字段的错误记在这里
pub const BODY_FIELD: &str = "body";

static MISSING_FIELD_RE: OnceLock<Regex> = OnceLock::new();
static LOCATION_RE: OnceLock<Regex> = OnceLock::new();

/// 校验版的 `Json<T>`
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        parse_body(&bytes)
            .map(JsonBody)
            .map_err(|errors| ServerError::Validation(errors).into_response())
    }
}

/// 解析请求体，出错时定位到具体字段
pub fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ValidationError> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let err = match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let path = err.path().to_string();
    let source = err.into_inner();
    let mut errors = ValidationError::new();

    if source.is_syntax() || source.is_eof() {
        errors.add(BODY_FIELD, "Invalid JSON body");
        return Err(errors);
    }

    let message = strip_location(&source.to_string());
    let missing_re = MISSING_FIELD_RE.get_or_init(|| {
        Regex::new(r"^missing field `([^`]+)`$").expect("missing-field pattern is valid")
    });

    match missing_re.captures(&message).and_then(|caps| caps.get(1)) {
        Some(field) => errors.add(field.as_str(), REQUIRED_MESSAGE),
        None if path == "." || path.is_empty() => errors.add(BODY_FIELD, message),
        None => errors.add(path, message),
    }
    Err(errors)
}

/// 去掉 serde_json 附加的 "at line X column Y"
fn strip_location(message: &str) -> String {
    let location_re = LOCATION_RE.get_or_init(|| {
        Regex::new(r"\s+at line \d+ column \d+$").expect("location pattern is valid")
    });
    location_re.replace(message, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNote, NewProblem};

    #[test]
    fn test_missing_key_is_reported_as_required() {
        let errors = parse_body::<NewNote>(
            br#"{"subjectCode":"CS1","subjectName":"Intro","year":"1","category":"Books"}"#,
        )
        .unwrap_err();
        assert_eq!(errors.fields.get("file").map(String::as_str), Some(REQUIRED_MESSAGE));
    }

    #[test]
    fn test_bad_value_is_reported_on_its_field() {
        let errors = parse_body::<NewNote>(
            br#"{"subjectCode":"CS1","subjectName":"Intro","year":"7","category":"Books","file":"x"}"#,
        )
        .unwrap_err();
        assert_eq!(
            errors.fields.get("year").map(String::as_str),
            Some("year must be between 1 and 4, got '7'")
        );
    }

    #[test]
    fn test_broken_json_is_reported_on_body() {
        let errors = parse_body::<NewProblem>(b"{\"problem\": ").unwrap_err();
        assert_eq!(
            errors.fields.get(BODY_FIELD).map(String::as_str),
            Some("Invalid JSON body")
        );

        let problem: NewProblem = parse_body(br#"{"problem":"ok"}"#).unwrap();
        assert_eq!(problem.problem, "ok");
    }
}
