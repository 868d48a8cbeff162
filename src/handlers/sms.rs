use crate::config::{RaffleConfig, TwilioConfig};
use crate::error::{AppError, AppResult};
use crate::external::{SIGNATURE_HEADER, TwilioRequestValidator};
use crate::services::SubmissionService;
use crate::utils::twiml::{TWIML_CONTENT_TYPE, message_response};
use actix_web::http::Method;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use chrono::Utc;
use log::{error, warn};

/// Decides whether an inbound request really comes from Twilio.
#[derive(Clone)]
pub struct SmsWebhookGuard {
    validator: TwilioRequestValidator,
    webhook_url: Option<String>,
    validate_signature: bool,
}

impl SmsWebhookGuard {
    pub fn new(config: &TwilioConfig) -> Self {
        Self {
            validator: TwilioRequestValidator::new(config.auth_token.clone()),
            webhook_url: config.webhook_url.clone(),
            validate_signature: config.validate_signature,
        }
    }

    /// URL Twilio signed: the configured callback URL, or the one rebuilt from
    /// the connection info. GET callbacks carry their params in the query string.
    fn signed_url(&self, req: &HttpRequest) -> String {
        match &self.webhook_url {
            Some(url) => {
                if req.method() == Method::GET && !req.query_string().is_empty() {
                    format!("{url}?{}", req.query_string())
                } else {
                    url.clone()
                }
            }
            None => {
                let info = req.connection_info();
                format!("{}://{}{}", info.scheme(), info.host(), req.uri())
            }
        }
    }

    /// 校验顺序：签名头 → MessageSid/SmsSid → 签名
    pub fn check(&self, req: &HttpRequest, params: &[(String, String)]) -> AppResult<()> {
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());

        if self.validate_signature && signature.is_none() {
            warn!("SMS webhook request without {SIGNATURE_HEADER} header");
            return Err(AppError::InvalidSignature);
        }

        let is_sms = params
            .iter()
            .any(|(k, v)| (k == "MessageSid" || k == "SmsSid") && !v.is_empty());
        if !is_sms {
            warn!("SMS webhook request without MessageSid/SmsSid");
            return Err(AppError::InvalidSignature);
        }

        if !self.validate_signature {
            return Ok(());
        }

        let url = self.signed_url(req);
        let signed_params: &[(String, String)] = if req.method() == Method::GET {
            &[]
        } else {
            params
        };
        match signature {
            Some(sig) if self.validator.validate(&url, signed_params, sig) => Ok(()),
            _ => {
                warn!("SMS webhook signature mismatch for {url}");
                Err(AppError::InvalidSignature)
            }
        }
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn twiml(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(TWIML_CONTENT_TYPE)
        .body(body)
}

async fn raffle_check(
    req: &HttpRequest,
    params: Vec<(String, String)>,
    guard: &SmsWebhookGuard,
    submission_service: &SubmissionService,
    copy: &RaffleConfig,
) -> HttpResponse {
    if let Err(e) = guard.check(req, &params) {
        return e.error_response();
    }

    let from = param(&params, "From");
    let body = param(&params, "Body");

    match submission_service
        .handle_submission(from, body, Utc::now())
        .await
    {
        Ok(outcome) => twiml(message_response(outcome.reply_text(copy))),
        Err(e) => {
            error!("Failed to process raffle submission from {from:?}: {e}");
            twiml(message_response(Some(&copy.error_copy)))
        }
    }
}

/// Twilio 以 POST 表单回调
pub async fn raffle_check_post(
    req: HttpRequest,
    form: web::Form<Vec<(String, String)>>,
    guard: web::Data<SmsWebhookGuard>,
    submission_service: web::Data<SubmissionService>,
    copy: web::Data<RaffleConfig>,
) -> Result<HttpResponse> {
    Ok(raffle_check(&req, form.into_inner(), &guard, &submission_service, &copy).await)
}

pub async fn raffle_check_get(
    req: HttpRequest,
    query: web::Query<Vec<(String, String)>>,
    guard: web::Data<SmsWebhookGuard>,
    submission_service: web::Data<SubmissionService>,
    copy: web::Data<RaffleConfig>,
) -> Result<HttpResponse> {
    Ok(raffle_check(&req, query.into_inner(), &guard, &submission_service, &copy).await)
}

pub fn sms_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/sms/raffle-check")
            .route(web::post().to(raffle_check_post))
            .route(web::get().to(raffle_check_get)),
    );
}
