use crate::config::AdminConfig;
use bcrypt::verify;

/// 校验管理员账号密码
///
/// A configured bcrypt hash wins over a plain password. With neither set,
/// nobody can log in.
pub fn verify_admin_credentials(config: &AdminConfig, username: &str, password: &str) -> bool {
    if username != config.username {
        return false;
    }

    if let Some(hash) = config.password_hash.as_deref() {
        return match verify(password, hash) {
            Ok(ok) => ok,
            Err(e) => {
                log::error!("Admin password hash could not be checked: {e}");
                false
            }
        };
    }

    match config.password.as_deref() {
        Some(expected) => constant_time_eq(expected.as_bytes(), password.as_bytes()),
        None => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
