/*!
Public pages and the routes a signed-in visitor uses: account signup
and verification, login/logout, password reset, visit reservations,
the artifact catalog, and the games page.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    auth,
    avail::{self, SlotError},
    booking::{self, TIME_SLOTS},
    config::Glob,
    store::{reservations::SlotWrite, users::UserInsert},
    user::Role,
};
use super::*;

fn today() -> time::Date {
    OffsetDateTime::now_utc().date()
}

/*

Public pages.

*/

pub async fn home() -> Response {
    serve_template(StatusCode::OK, "home", &json!({}))
}

pub async fn about_page() -> Response {
    serve_template(StatusCode::OK, "aboutUs", &json!({}))
}

pub async fn signup_page() -> Response {
    serve_template(StatusCode::OK, "signUp", &json!({}))
}

pub async fn signin_page() -> Response {
    serve_template(StatusCode::OK, "signIn", &json!({}))
}

pub async fn forgot_page() -> Response {
    serve_template(StatusCode::OK, "forgotPassword", &json!({}))
}

/*

Account lifecycle.

*/

#[derive(Debug, Deserialize)]
pub struct SignupData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

pub async fn signup(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<SignupData>,
) -> Response {
    log::trace!("visitor::signup( {:?}, {:?} ) called.", &form.name, &form.email);

    let name = form.name.trim();
    let email = form.email.trim();
    if name.is_empty() || email.is_empty() || form.password.is_empty() {
        return action_err(
            StatusCode::BAD_REQUEST,
            "Name, email, and password are all required.",
            "/signUp",
        );
    }

    let role: Role = match form.role.parse() {
        Ok(Role::Admin) => {
            // admin accounts are seeded, never self-service
            log::warn!("Signup for {:?} requested the Admin role.", email);
            return action_err(
                StatusCode::BAD_REQUEST,
                "That is not a valid visitor type.",
                "/signUp",
            );
        },
        Ok(r) => r,
        Err(e) => {
            return action_err(StatusCode::BAD_REQUEST, &e, "/signUp");
        },
    };

    let hash = match auth::hash_password(form.password).await {
        Ok(h) => h,
        Err(e) => {
            log::error!("Error hashing signup password for {:?}: {}", email, &e);
            return html_500();
        },
    };

    let code = auth::generate_verification_code();
    match glob.store.insert_user(name, email, &hash, role, &code).await {
        Err(e) => action_store_error(&e, "creating your account", "/signUp"),
        Ok(UserInsert::DuplicateEmail) => action_err(
            StatusCode::CONFLICT,
            "User already exists.",
            "/signIn",
        ),
        Ok(UserInsert::Created(id)) => {
            log::info!("New {} account {} ({:?}).", role, id, email);
            glob.mailer.send_verification(email, &code);
            action_ok(
                "Account created. Please check your email for a verification link.",
                "/signIn",
            )
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyData {
    pub code: Option<String>,
}

async fn redeem_code(glob: &Glob, code: Option<String>) -> Response {
    let code = match code {
        Some(c) if !c.trim().is_empty() => c.trim().to_owned(),
        _ => {
            return serve_template(
                StatusCode::BAD_REQUEST,
                "verify",
                &json!({ "ok": false, "message": "No verification code supplied." }),
            );
        },
    };

    match glob.store.redeem_verification_code(&code).await {
        Err(e) => {
            log::error!("Error redeeming verification code: {}", e.display());
            html_500()
        },
        // an unknown code and an already-redeemed one look the same
        Ok(None) => serve_template(
            StatusCode::UNAUTHORIZED,
            "verify",
            &json!({ "ok": false, "message": "Invalid verification code." }),
        ),
        Ok(Some(u)) => {
            log::info!("Account {:?} verified.", &u.email);
            serve_template(
                StatusCode::OK,
                "verify",
                &json!({
                    "ok": true,
                    "message": "Your email has been verified. You can now sign in.",
                }),
            )
        },
    }
}

/// The link from the verification email lands here with `?code=`.
pub async fn verify_get(
    Query(q): Query<VerifyData>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("visitor::verify_get() called.");
    redeem_code(&glob, q.code).await
}

pub async fn verify_post(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<VerifyData>,
) -> Response {
    log::trace!("visitor::verify_post() called.");
    redeem_code(&glob, form.code).await
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub email: String,
    pub password: String,
}

pub async fn signin(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<LoginData>,
) -> Response {
    log::trace!("visitor::signin( {:?} ) called.", &form.email);

    let user = match glob.store.get_user_by_email(form.email.trim()).await {
        Err(e) => {
            return action_store_error(&e, "signing you in", "/signIn");
        },
        Ok(None) => {
            return action_err(
                StatusCode::UNAUTHORIZED,
                "No account with that email address.",
                "/signUp",
            );
        },
        Ok(Some(u)) => u,
    };

    if !user.verified {
        return action_err(
            StatusCode::UNAUTHORIZED,
            "Your email is not verified. Please check your inbox for the verification link.",
            "/signIn",
        );
    }

    match auth::verify_password(user.password_hash.clone(), form.password).await {
        Err(e) => {
            log::error!("Error checking password for {:?}: {}", &user.email, &e);
            return html_500();
        },
        Ok(false) => {
            return action_err(
                StatusCode::UNAUTHORIZED,
                "Incorrect password.",
                "/signIn",
            );
        },
        Ok(true) => { },
    }

    let destination = if user.is_admin() { "/admin" } else { "/account" };
    let key = glob.sessions.open(user).await;

    let body = ActionResult {
        ok: true,
        message: "Signed in.".to_owned(),
        redirect: destination.to_owned(),
    };

    (
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&key))],
        Json(body),
    ).into_response()
}

pub async fn logout(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("visitor::logout() called.");

    if let Some(key) = session_key(&headers) {
        glob.sessions.close(&key).await;
    }

    (
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, clear_session_cookie()),
            (header::LOCATION, "/".to_owned()),
        ],
    ).into_response()
}

/// The client-side activity heartbeat; rearms the idle deadline.
pub async fn keep_alive(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    match session_key(&headers) {
        Some(key) => match glob.sessions.touch(&key).await {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => StatusCode::UNAUTHORIZED.into_response(),
        },
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotData {
    pub email: String,
}

pub async fn forgot_password(
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<ForgotData>,
) -> Response {
    log::trace!("visitor::forgot_password( {:?} ) called.", &form.email);

    let email = form.email.trim();
    let token = auth::generate_reset_token();
    let expires = OffsetDateTime::now_utc() + auth::RESET_TOKEN_TTL;

    match glob.store.set_reset_token(email, &token, expires).await {
        Err(e) => action_store_error(&e, "requesting a password reset", "/forgotPassword"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No account with that email address.",
            "/forgotPassword",
        ),
        Ok(true) => {
            glob.mailer.send_password_reset(email, &token);
            action_ok(
                "A password reset link has been sent to your email.",
                "/signIn",
            )
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub code: Option<String>,
}

/// The link from the reset email lands here with `?code=`; a usable
/// token gets the new-password form, anything else gets told why not.
pub async fn reset_page(
    Query(q): Query<ResetQuery>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("visitor::reset_page() called.");

    let token = match q.code {
        Some(t) if !t.trim().is_empty() => t.trim().to_owned(),
        _ => {
            return serve_template(
                StatusCode::BAD_REQUEST,
                "reset",
                &json!({ "usable": false, "message": "No reset code supplied." }),
            );
        },
    };

    match glob.store.reset_token_usable(&token, OffsetDateTime::now_utc()).await {
        Err(e) => {
            log::error!("Error checking reset token: {}", e.display());
            html_500()
        },
        Ok(false) => serve_template(
            StatusCode::UNAUTHORIZED,
            "reset",
            &json!({
                "usable": false,
                "message": "This reset link is invalid or has expired.",
            }),
        ),
        Ok(true) => serve_template(
            StatusCode::OK,
            "reset",
            &json!({ "usable": true, "token": token }),
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetData {
    pub password: String,
}

pub async fn reset_password(
    Path(token): Path<String>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<ResetData>,
) -> Response {
    log::trace!("visitor::reset_password() called.");

    if form.password.is_empty() {
        return action_err(
            StatusCode::BAD_REQUEST,
            "A new password is required.",
            "/forgotPassword",
        );
    }

    let hash = match auth::hash_password(form.password).await {
        Ok(h) => h,
        Err(e) => {
            log::error!("Error hashing reset password: {}", &e);
            return html_500();
        },
    };

    let now = OffsetDateTime::now_utc();
    match glob.store.redeem_reset_token(&token, now, &hash).await {
        Err(e) => action_store_error(&e, "resetting your password", "/forgotPassword"),
        Ok(false) => action_err(
            StatusCode::UNAUTHORIZED,
            "This reset link is invalid or has expired.",
            "/forgotPassword",
        ),
        Ok(true) => {
            log::info!("Password reset token redeemed.");
            action_ok("Your password has been reset. Please sign in.", "/signIn")
        },
    }
}

/*

Signed-in visitor pages.

*/

pub async fn account_page(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, user) = match require_user(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };

    let reservations = match glob.store.reservations_for_email(&user.email).await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching reservations for account page: {}", e.display());
            return html_500();
        },
    };

    let rows: Vec<serde_json::Value> = reservations.iter()
        .map(|r| json!({
            "id": r.id,
            "visit_date": date_str(r.visit_date),
            "visit_time": &r.visit_time,
            "contact": &r.contact,
            "party_size": r.party_size,
        }))
        .collect();

    serve_template(
        StatusCode::OK,
        "account",
        &json!({
            "user": user,
            "reservations": rows,
            "time_slots": TIME_SLOTS,
        }),
    )
}

pub async fn reservation_page(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, user) = match require_user(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };

    serve_template(
        StatusCode::OK,
        "reservation",
        &json!({
            "user": user,
            "time_slots": TIME_SLOTS,
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

pub async fn artifacts_page(
    headers: HeaderMap,
    Query(q): Query<SearchQuery>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, user) = match require_user(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };

    let mut artifacts = match glob.store.get_artifacts().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching artifacts: {}", e.display());
            return html_500();
        },
    };

    let search = q.search.unwrap_or_default();
    let needle = search.trim();
    if !needle.is_empty() {
        artifacts.retain(|a| a.title_matches(needle));
    }

    serve_template(
        StatusCode::OK,
        "artifacts",
        &json!({
            "user": user,
            "artifacts": artifacts,
            "search": needle,
        }),
    )
}

pub async fn games_page(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, user) = match require_user(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };

    let questions = match glob.store.get_questions().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching questions: {}", e.display());
            return html_500();
        },
    };

    let leaders = match glob.store.leaderboard(10).await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching leaderboard: {}", e.display());
            return html_500();
        },
    };

    // the quiz runs client-side, so the question bank is embedded as a
    // JSON literal rather than rendered
    let questions_json = match serde_json::to_string(&questions) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Error serializing questions: {}", &e);
            return html_500();
        },
    };

    serve_template(
        StatusCode::OK,
        "games",
        &json!({
            "user": user,
            "questions_json": questions_json,
            "leaders": leaders,
        }),
    )
}

/*

Reservation actions.

*/

#[derive(Debug, Deserialize)]
pub struct ReservationData {
    pub visit_date: String,
    pub visit_time: String,
    pub contact: String,
    pub party_size: i32,
}

fn slot_error_response(e: SlotError, redirect: &str) -> Response {
    let code = match e {
        SlotError::DateInPast => StatusCode::BAD_REQUEST,
        _ => StatusCode::CONFLICT,
    };
    action_err(code, &e.to_string(), redirect)
}

/// Availability check shared by booking and rebooking: load both
/// registries and cross-reference the candidate slot.
async fn check_availability(
    glob: &Glob,
    email: &str,
    date: time::Date,
    slot: &str,
    exclude: Option<i64>,
) -> Result<(), Response> {
    let blocked = glob.store.get_blocked_slots().await
        .map_err(|e| action_store_error(&e, "checking availability", "/reservation"))?;
    let reservations = glob.store.get_reservations().await
        .map_err(|e| action_store_error(&e, "checking availability", "/reservation"))?;

    if glob.one_reservation_per_account
        && avail::holds_reservation(email, &reservations, exclude)
    {
        return Err(slot_error_response(SlotError::AlreadyBooked, "/account"));
    }

    avail::check_slot(today(), date, slot, &blocked, &reservations, exclude)
        .map_err(|e| slot_error_response(e, "/reservation"))
}

pub async fn make_reservation(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<ReservationData>,
) -> Response {
    let (_, user) = match require_user(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };
    log::trace!(
        "visitor::make_reservation( {:?}, {:?}, {:?} ) called.",
        &user.email, &form.visit_date, &form.visit_time
    );

    let date = match booking::parse_date(&form.visit_date) {
        Ok(d) => d,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/reservation"); },
    };
    let slot = match booking::parse_slot(&form.visit_time) {
        Ok(s) => s,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/reservation"); },
    };
    if form.party_size < 1 {
        return action_err(
            StatusCode::BAD_REQUEST,
            "Party size must be at least 1.",
            "/reservation",
        );
    }

    if let Err(r) = check_availability(&glob, &user.email, date, &slot, None).await {
        return r;
    }

    let res = glob.store.insert_reservation(
        date, &slot, &user.name, &user.email, form.contact.trim(), form.party_size,
    ).await;

    match res {
        Err(e) => action_store_error(&e, "confirming your reservation", "/reservation"),
        // lost the race between check and write
        Ok(SlotWrite::SlotClash) =>
            slot_error_response(SlotError::SlotTaken, "/reservation"),
        Ok(SlotWrite::Gone) => {
            log::error!("Reservation insert reported Gone, which shouldn't happen.");
            html_500()
        },
        Ok(SlotWrite::Ok(id)) => {
            log::info!(
                "Reservation {} confirmed: {:?} on {} at {}.",
                id, &user.email, date, &slot
            );
            glob.mailer.send_reservation_confirmed(
                &user.name, &user.email, &date_str(date), &slot,
            );
            action_ok(
                &format!("Reservation confirmed for {} at {}.", date_str(date), &slot),
                "/account",
            )
        },
    }
}

/// Fetch a reservation and confirm the caller owns it.
async fn owned_reservation(
    glob: &Glob,
    id: i64,
    email: &str,
) -> Result<crate::booking::Reservation, Response> {
    let r = glob.store.get_reservation(id).await
        .map_err(|e| action_store_error(&e, "looking up your reservation", "/account"))?;

    match r {
        None => Err(action_err(
            StatusCode::NOT_FOUND,
            "No such reservation.",
            "/account",
        )),
        Some(r) if r.email != email => {
            log::warn!(
                "{:?} tried to modify reservation {} belonging to {:?}.",
                email, id, &r.email
            );
            Err(action_err(
                StatusCode::FORBIDDEN,
                "That reservation is not yours.",
                "/account",
            ))
        },
        Some(r) => Ok(r),
    }
}

pub async fn rebook_reservation(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<ReservationData>,
) -> Response {
    let (_, user) = match require_user(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };
    log::trace!(
        "visitor::rebook_reservation( {}, {:?} ) called.",
        id, &user.email
    );

    if let Err(r) = owned_reservation(&glob, id, &user.email).await {
        return r;
    }

    let date = match booking::parse_date(&form.visit_date) {
        Ok(d) => d,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/account"); },
    };
    let slot = match booking::parse_slot(&form.visit_time) {
        Ok(s) => s,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/account"); },
    };
    if form.party_size < 1 {
        return action_err(
            StatusCode::BAD_REQUEST,
            "Party size must be at least 1.",
            "/account",
        );
    }

    // the reservation being moved doesn't collide with itself
    if let Err(r) = check_availability(&glob, &user.email, date, &slot, Some(id)).await {
        return r;
    }

    let res = glob.store.rebook_reservation(
        id, date, &slot, form.contact.trim(), form.party_size,
    ).await;

    match res {
        Err(e) => action_store_error(&e, "updating your reservation", "/account"),
        Ok(SlotWrite::SlotClash) => slot_error_response(SlotError::SlotTaken, "/account"),
        Ok(SlotWrite::Gone) => action_err(
            StatusCode::NOT_FOUND,
            "No such reservation.",
            "/account",
        ),
        Ok(SlotWrite::Ok(_)) => {
            log::info!(
                "Reservation {} rebooked: {:?} to {} at {}.",
                id, &user.email, date, &slot
            );
            glob.mailer.send_reservation_updated(
                &user.name, &user.email, &date_str(date), &slot,
            );
            action_ok(
                &format!("Reservation updated to {} at {}.", date_str(date), &slot),
                "/account",
            )
        },
    }
}

pub async fn cancel_reservation(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, user) = match require_user(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };
    log::trace!(
        "visitor::cancel_reservation( {}, {:?} ) called.",
        id, &user.email
    );

    if let Err(r) = owned_reservation(&glob, id, &user.email).await {
        return r;
    }

    match glob.store.delete_reservation(id).await {
        Err(e) => action_store_error(&e, "cancelling your reservation", "/account"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such reservation.",
            "/account",
        ),
        Ok(true) => {
            log::info!("Reservation {} cancelled by {:?}.", id, &user.email);
            action_ok("Reservation cancelled.", "/account")
        },
    }
}

/*

Quiz scoring.

*/

#[derive(Debug, Deserialize)]
pub struct ScoreData {
    pub score: i32,
}

pub async fn post_score(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<ScoreData>,
) -> Response {
    let (key, user) = match require_user(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };
    log::trace!(
        "visitor::post_score( {:?}, {} ) called.",
        &user.email, form.score
    );

    match glob.store.update_score_by_email(&user.email, form.score).await {
        Err(e) => action_store_error(&e, "saving your score", "/games"),
        Ok(None) => action_err(
            StatusCode::NOT_FOUND,
            "Your account no longer exists.",
            "/logout",
        ),
        Ok(Some(updated)) => {
            // keep the session snapshot current for the games page
            glob.sessions.update_user(&key, updated).await;
            action_ok("Score saved.", "/games")
        },
    }
}
