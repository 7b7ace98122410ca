//! 注册/改邮箱时的输入校验

use crate::error::{GateError, Result};

/// 用户名最大长度
const MAX_USERNAME_LEN: usize = 150;
/// 邮箱最大长度
const MAX_EMAIL_LEN: usize = 255;
/// 注册时的最短密码长度
pub(crate) const REGISTER_MIN_PASSWORD_LEN: usize = 4;

/// 校验用户名：150 字符以内，仅字母数字和 ./-/_
pub(crate) fn validate_username(username: &str) -> Result<()> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));

    if username.is_empty() || username.len() > MAX_USERNAME_LEN || !valid_chars {
        return Err(GateError::Validation(
            "Required. 150 characters or fewer. Letters, numbers and ./-/_ characters".to_string(),
        ));
    }
    Ok(())
}

/// 校验邮箱格式与域名白名单
///
/// 空白名单 = 允许任何域名。
pub(crate) fn validate_email(email: &str, allowed_domains: &[String]) -> Result<()> {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.contains(char::is_whitespace) {
        return Err(GateError::InvalidEmail("invalid address".to_string()));
    }

    let (local, domain) = email
        .rsplit_once('@')
        .ok_or_else(|| GateError::InvalidEmail("invalid address".to_string()))?;
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || local.contains('@') {
        return Err(GateError::InvalidEmail("invalid address".to_string()));
    }

    if !allowed_domains.is_empty() && !allowed_domains.iter().any(|d| d == domain) {
        return Err(GateError::InvalidEmail(
            "email domain is not allowed".to_string(),
        ));
    }
    Ok(())
}
