/*!
Interoperation between the client (user) and server.

(Not the application and the database; that's covered by `store`.)

Page requests get rendered HTML or a redirect. Mutating endpoints get
a structured `ActionResult` (status + message + destination) that the
client-side script turns into a toast and a redirect.
*/
use std::path::Path;

use axum::{
    http::{header, StatusCode},
    http::header::HeaderMap,
    response::{Html, IntoResponse, Response},
    Json,
};
use handlebars::Handlebars;
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::config::Glob;
use crate::user::User;

pub mod admin;
pub mod visitor;

pub const SESSION_COOKIE: &str = "museo-session";

static TEMPLATES: OnceCell<Handlebars> = OnceCell::new();

static HTML_500: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>museo | Error</title>
<link rel="stylesheet" href="/static/museo.css">
</head>
<body>
<h1>Internal Server Error</h1>
<p>(Error 500)</p>
<p>Something went wrong on our end. No further or more
helpful information is available about the problem.</p>
</body>
</html>"#;

/**
Initializes the resources used in this module. This function should be
called before any functionality of this module or any of its submodules
is used.

Currently the only thing that happens here is loading the templates used
by `serve_template()`, which will panic unless `init()` has been called
first.

The argument is the path to the directory where the templates used by
`serve_template()` can be found.
*/
pub fn init<P: AsRef<Path>>(template_dir: P) -> Result<(), String> {
    if TEMPLATES.get().is_some() {
        log::warn!("Templates directory already initialized; ignoring.");
        return Ok(())
    }

    let template_dir = template_dir.as_ref();

    let mut h = Handlebars::new();
    #[cfg(debug_assertions)]
    h.set_dev_mode(true);
    h.register_templates_directory(".html", template_dir)
        .map_err(|e| format!(
            "Error registering templates directory {}: {}",
            template_dir.display(), &e
        ))?;

    TEMPLATES.set(h)
        .map_err(|old_h| {
            let mut estr = String::from("Templates directory already registered w/templates:");
            for template_name in old_h.get_templates().keys() {
                estr.push('\n');
                estr.push_str(template_name.as_str());
            }
            estr
        })?;

    Ok(())
}

/**
Return an HTML response in the case of an unrecoverable* error.

(*"Unrecoverable" from the perspective of fielding the current request,
not from the perspective of the program crashing.)
*/
pub fn html_500() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(HTML_500)
    ).into_response()
}

pub fn serve_template<S>(
    code: StatusCode,
    template_name: &str,
    data: &S,
) -> Response
where
    S: Serialize + std::fmt::Debug
{
    log::trace!("serve_template( {}, {:?}, ... ) called.", &code, template_name);

    match TEMPLATES.get().unwrap().render(template_name, data) {
        Ok(response_body) => (
            code,
            Html(response_body)
        ).into_response(),
        Err(e) => {
            log::error!(
                "Error rendering template {:?} with data {:?}:\n{}",
                template_name, data, &e
            );
            html_500()
        },
    }
}

/// Structured outcome of a mutating endpoint: did it work, what should
/// the user be told, and where should the client take them next.
#[derive(Debug, Serialize)]
pub struct ActionResult {
    pub ok: bool,
    pub message: String,
    pub redirect: String,
}

/// 200 + toast + destination.
pub fn action_ok(message: &str, redirect: &str) -> Response {
    let body = ActionResult {
        ok: true,
        message: message.to_owned(),
        redirect: redirect.to_owned(),
    };

    (StatusCode::OK, Json(body)).into_response()
}

/// Failure with an explicit status code, toast, and destination.
pub fn action_err(code: StatusCode, message: &str, redirect: &str) -> Response {
    let body = ActionResult {
        ok: false,
        message: message.to_owned(),
        redirect: redirect.to_owned(),
    };

    (code, Json(body)).into_response()
}

/// A store failure surfaced at the route boundary: logged, then turned
/// into a 500-class action result.
pub fn action_store_error(e: &crate::store::DbError, doing: &str, redirect: &str) -> Response {
    log::error!("Error {}: {}", doing, e.display());
    action_err(
        StatusCode::INTERNAL_SERVER_ERROR,
        &format!("An error occurred while {}.", doing),
        redirect,
    )
}

/// "YYYY-MM-DD" for messages, mail bodies, and rendered rows.
pub fn date_str(d: time::Date) -> String {
    d.format(crate::DATE_FMT).unwrap_or_else(|_| format!("{}", d))
}

pub fn redirect_to(location: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.to_owned())]
    ).into_response()
}

/// Pull the session key out of the request's Cookie header.
pub fn session_key(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;

    for pair in cookies.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            if name == SESSION_COOKIE {
                return Some(value.to_owned());
            }
        }
    }

    None
}

/// The Set-Cookie value installing a session key at login.
pub fn session_cookie(key: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, key)
}

/// The Set-Cookie value clearing the session at logout.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE)
}

/**
The access gate: resolve the request's session cookie to a logged-in
user and rearm the session's activity deadline.

A missing, idle, or destroyed session is a logged-out request; the
caller gets a redirect to the sign-in page to return as-is.
*/
pub async fn require_user(
    headers: &HeaderMap,
    glob: &Glob,
) -> Result<(String, User), Response> {
    let key = match session_key(headers) {
        Some(k) => k,
        None => { return Err(redirect_to("/signIn")); },
    };

    match glob.sessions.touch(&key).await {
        Some(user) => Ok((key, user)),
        None => Err(redirect_to("/signIn")),
    }
}

/// The gate for the admin console: a logged-in user with `Role::Admin`.
pub async fn require_admin(
    headers: &HeaderMap,
    glob: &Glob,
) -> Result<(String, User), Response> {
    let (key, user) = require_user(headers, glob).await?;

    if user.is_admin() {
        Ok((key, user))
    } else {
        log::warn!("{:?} tried the admin console without the role.", &user.email);
        Err((
            StatusCode::FORBIDDEN,
            "Who is this? What's your operating number?".to_owned(),
        ).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::HeaderValue;

    #[test]
    fn cookie_parsing() {
        let mut headers = HeaderMap::new();
        assert!(session_key(&headers).is_none());

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; museo-session=abc123; other=x"),
        );
        assert_eq!(session_key(&headers).unwrap(), "abc123");

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark"),
        );
        assert!(session_key(&headers).is_none());
    }

    #[test]
    fn cookie_round_trip() {
        let set = session_cookie("abc123");
        let mut headers = HeaderMap::new();
        // the browser echoes back only the name=value part
        let echoed = set.split(';').next().unwrap().to_owned();
        headers.insert(header::COOKIE, HeaderValue::from_str(&echoed).unwrap());
        assert_eq!(session_key(&headers).unwrap(), "abc123");
    }

    #[test]
    fn action_result_shape() {
        let body = ActionResult {
            ok: false,
            message: "Slot taken.".to_owned(),
            redirect: "/reservation".to_owned(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["message"], "Slot taken.");
        assert_eq!(json["redirect"], "/reservation");
    }
}
