use actix_cors::Cors;

/// 管理后台与公开看板的跨域设置；Twilio 回调不受影响
pub fn create_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}
