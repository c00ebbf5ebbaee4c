use crate::{
    GateState,
    auth::{Credential, RequestLocale},
    backend::LoginForm,
    error::{ApiError, BackendError},
    i18n::{Locale, MessageKey, Notice, translate},
    models::{
        Area, LoginRequest, LoginResponse, LogoutResponse, NavigationRequest, NavigationResponse,
        SessionResponse,
    },
};
use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

/// Header carrying the message key of a notice attached to a page redirect.
pub const NOTICE_HEADER: HeaderName = HeaderName::from_static("x-portal-notice");

/// LogoutQuery
///
/// Which area's login page to send the caller to after logout.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogoutQuery {
    pub area: Option<Area>,
}

// --- API Handlers ---

/// navigate
///
/// [Public Route] Runs the session gate for a client-side navigation and returns
/// the tagged decision. The SPA renders, redirects, or shows the forbidden view
/// accordingly, and drops responses whose phase is `superseded`.
#[utoipa::path(
    post,
    path = "/api/navigate",
    request_body = NavigationRequest,
    responses(
        (status = 200, description = "Gate decision", body = NavigationResponse),
        (status = 400, description = "Path is not absolute")
    )
)]
pub async fn navigate(
    State(gate): State<GateState>,
    credential: Credential,
    RequestLocale(locale): RequestLocale,
    Json(payload): Json<NavigationRequest>,
) -> Result<Json<NavigationResponse>, ApiError> {
    if !payload.path.starts_with('/') {
        return Err(ApiError::BadRequest(format!(
            "navigation path must be absolute, got {:?}",
            payload.path
        )));
    }
    Ok(Json(gate.navigate(&payload.path, &credential, locale).await))
}

/// get_session
///
/// [Session Route] Returns the caller's session, checking with the backend
/// unless a fresh copy is cached.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Current session", body = SessionResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_session(
    State(gate): State<GateState>,
    credential: Credential,
    RequestLocale(locale): RequestLocale,
) -> Result<Json<SessionResponse>, ApiError> {
    match gate.session(&credential).await {
        Some(session) => Ok(Json(SessionResponse::from(&session))),
        None => Err(ApiError::Unauthenticated(Notice::error(
            locale,
            MessageKey::PleaseLoginFirst,
        ))),
    }
}

/// login
///
/// [Public Route] Forwards a login form to the backend. On success the new
/// session cookie is passed through and the caller is told where to land:
/// administrators go to the console, clients to the portal, and accounts in
/// both groups follow the login page they used.
#[utoipa::path(
    post,
    path = "/api/session/login",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Rejected by the backend"),
        (status = 502, description = "Backend unreachable")
    )
)]
pub async fn login(
    State(gate): State<GateState>,
    credential: Credential,
    RequestLocale(locale): RequestLocale,
    Form(payload): Form<LoginRequest>,
) -> Result<Response, ApiError> {
    let area = payload.area.unwrap_or(Area::Client);
    let form = LoginForm {
        email: payload.email,
        password: payload.password,
        captcha: payload.captcha,
    };

    match gate.login(&credential, &form, area).await {
        Ok(outcome) => {
            let body = LoginResponse {
                redirect_to: outcome.redirect_to.to_string(),
                session: SessionResponse::from(&outcome.session),
                notice: Notice::success(locale, MessageKey::LoginSuccess),
            };
            Ok(with_set_cookies(
                Json(body).into_response(),
                &outcome.set_cookies,
            ))
        }
        Err(BackendError::Rejected { message, .. }) => Err(ApiError::LoginRejected(
            Notice::error(locale, MessageKey::LoginFailed).with_message(&message),
        )),
        Err(err) if err.is_transport() => {
            tracing::warn!(error = %err, "login could not reach the session backend");
            Err(ApiError::BackendUnavailable(Notice::error(
                locale,
                MessageKey::LoginError,
            )))
        }
        Err(err) => {
            tracing::warn!(error = %err, "login failed");
            Err(ApiError::LoginRejected(Notice::error(
                locale,
                MessageKey::LoginFailed,
            )))
        }
    }
}

/// logout
///
/// [Session Route] Forwards the logout and always drops the cached session, so
/// the caller ends up on the login page even if the backend call failed.
#[utoipa::path(
    post,
    path = "/api/session/logout",
    params(LogoutQuery),
    responses((status = 200, description = "Signed out", body = LogoutResponse))
)]
pub async fn logout(
    State(gate): State<GateState>,
    credential: Credential,
    RequestLocale(locale): RequestLocale,
    Query(query): Query<LogoutQuery>,
) -> Response {
    let redirect_to = query.area.unwrap_or(Area::Client).login_path().to_string();

    let (notice, set_cookies) = match gate.logout(&credential).await {
        Ok(reply) => (
            Notice::success(locale, MessageKey::LogoutSuccess),
            reply.set_cookies,
        ),
        Err(BackendError::Rejected { message, .. }) => (
            Notice::error(locale, MessageKey::LogoutFailed).with_message(&message),
            Vec::new(),
        ),
        Err(_) => (Notice::error(locale, MessageKey::LogoutError), Vec::new()),
    };

    with_set_cookies(
        Json(LogoutResponse {
            redirect_to,
            notice,
        })
        .into_response(),
        &set_cookies,
    )
}

// --- Portal Responses ---

/// Appends backend `Set-Cookie` values verbatim; unrepresentable ones are skipped.
pub fn with_set_cookies(mut response: Response, set_cookies: &[String]) -> Response {
    for cookie in set_cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::warn!("dropping unrepresentable Set-Cookie from backend"),
        }
    }
    response
}

/// `303 See Other` to `location`, with the notice key in [`NOTICE_HEADER`] and
/// the localized text as body.
pub fn redirect_response(location: &str, notice: Option<&Notice>) -> Response {
    let body = notice.map(|n| n.message.clone()).unwrap_or_default();
    let mut response = (StatusCode::SEE_OTHER, body).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(location) {
        headers.insert(header::LOCATION, value);
    }
    if let Some(notice) = notice {
        headers.insert(NOTICE_HEADER, HeaderValue::from_static(notice.key.as_str()));
    }
    response
}

/// The access-denied view: a 403 page with a back action, rendered in place.
pub fn forbidden_page(locale: Locale) -> Response {
    let page = format!(
        r#"<!doctype html>
<html lang="{lang}">
<head><meta charset="utf-8"><title>403 | {title}</title></head>
<body>
<main class="result result-403">
<h1>403</h1>
<p>{message}</p>
<button type="button" onclick="history.back()">{back}</button>
</main>
</body>
</html>
"#,
        lang = locale.code().replace('_', "-"),
        title = translate(locale, MessageKey::NotAuthorized),
        message = translate(locale, MessageKey::GroupNotAuthorized),
        back = translate(locale, MessageKey::Back),
    );
    (StatusCode::FORBIDDEN, Html(page)).into_response()
}

/// Served for authorized page loads when no SPA build is configured.
pub async fn portal_shell() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Portal</title></head>
<body><div id="root"></div></body>
</html>
"#,
    )
}
