use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Locale
///
/// The portal ships three translations. `en_GB` is the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Locale {
    #[default]
    #[serde(rename = "en_GB")]
    EnGb,
    #[serde(rename = "zh_CN")]
    ZhCn,
    #[serde(rename = "es_ES")]
    EsEs,
}

impl Locale {
    /// Parses `en_GB`, `zh-CN`, `es` and friends. Only the primary language tag matters.
    pub fn parse(tag: &str) -> Option<Locale> {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Locale::EnGb),
            "zh" => Some(Locale::ZhCn),
            "es" => Some(Locale::EsEs),
            _ => None,
        }
    }

    /// Picks the first supported language from an `Accept-Language` header,
    /// honoring q-values.
    pub fn from_accept_language(header: &str) -> Option<Locale> {
        let mut ranked: Vec<(f32, Locale)> = header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.split(';');
                let locale = Locale::parse(pieces.next()?)?;
                let quality = pieces
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                // q=0 means "not acceptable"
                (quality > 0.0).then_some((quality, locale))
            })
            .collect();
        // stable: equal weights keep header order
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.first().map(|(_, locale)| *locale)
    }

    pub const fn code(self) -> &'static str {
        match self {
            Locale::EnGb => "en_GB",
            Locale::ZhCn => "zh_CN",
            Locale::EsEs => "es_ES",
        }
    }
}

/// MessageKey
///
/// Keys of the messages the gate and session endpoints surface to users. The
/// serialized form matches the SPA's translation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum MessageKey {
    PleaseLoginFirst,
    NotAuthorized,
    GroupNotAuthorized,
    Back,
    LoginSuccess,
    LoginFailed,
    LoginError,
    LogoutSuccess,
    LogoutFailed,
    LogoutError,
}

impl MessageKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageKey::PleaseLoginFirst => "pleaseLoginFirst",
            MessageKey::NotAuthorized => "notAuthorized",
            MessageKey::GroupNotAuthorized => "groupNotAuthorized",
            MessageKey::Back => "back",
            MessageKey::LoginSuccess => "loginSuccess",
            MessageKey::LoginFailed => "loginFailed",
            MessageKey::LoginError => "loginError",
            MessageKey::LogoutSuccess => "logoutSuccess",
            MessageKey::LogoutFailed => "logoutFailed",
            MessageKey::LogoutError => "logoutError",
        }
    }
}

pub fn translate(locale: Locale, key: MessageKey) -> &'static str {
    use MessageKey::*;
    match locale {
        Locale::EnGb => match key {
            PleaseLoginFirst => "Please log in first",
            NotAuthorized => "You are not authorized to access this page",
            GroupNotAuthorized => "Your account group does not have access to this page",
            Back => "Back",
            LoginSuccess => "Login successful",
            LoginFailed => "Login failed",
            LoginError => "Login error, please try again later",
            LogoutSuccess => "Logged out successfully",
            LogoutFailed => "Logout failed",
            LogoutError => "Logout error",
        },
        Locale::ZhCn => match key {
            PleaseLoginFirst => "请先登录",
            NotAuthorized => "您无权访问此页面",
            GroupNotAuthorized => "您所在的用户组无权访问此页面",
            Back => "返回",
            LoginSuccess => "登录成功",
            LoginFailed => "登录失败",
            LoginError => "登录出错，请稍后再试",
            LogoutSuccess => "退出成功",
            LogoutFailed => "退出失败",
            LogoutError => "退出出错",
        },
        Locale::EsEs => match key {
            PleaseLoginFirst => "Por favor, inicie sesión primero",
            NotAuthorized => "No está autorizado para acceder a esta página",
            GroupNotAuthorized => "Su grupo de usuario no tiene acceso a esta página",
            Back => "Volver",
            LoginSuccess => "Inicio de sesión correcto",
            LoginFailed => "Error al iniciar sesión",
            LoginError => "Error de inicio de sesión, inténtelo más tarde",
            LogoutSuccess => "Sesión cerrada correctamente",
            LogoutFailed => "No se pudo cerrar la sesión",
            LogoutError => "Error al cerrar la sesión",
        },
    }
}

/// NoticeLevel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Notice
///
/// A localized, user-visible message. The SPA shows it as a toast; page
/// redirects carry the key in the `x-portal-notice` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Notice {
    pub level: NoticeLevel,
    pub key: MessageKey,
    pub message: String,
}

impl Notice {
    pub fn error(locale: Locale, key: MessageKey) -> Self {
        Self {
            level: NoticeLevel::Error,
            key,
            message: translate(locale, key).to_string(),
        }
    }

    pub fn success(locale: Locale, key: MessageKey) -> Self {
        Self {
            level: NoticeLevel::Success,
            key,
            message: translate(locale, key).to_string(),
        }
    }

    /// Replaces the translated text, e.g. with a message the backend supplied.
    pub fn with_message(mut self, message: &str) -> Self {
        if !message.trim().is_empty() {
            self.message = message.to_string();
        }
        self
    }
}
