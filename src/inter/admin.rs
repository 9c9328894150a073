/*!
The admin console: user management, the reservation ledger, blocked
slots, the artifact catalog, and the quiz question bank.

Every handler here passes through `require_admin` first.
*/
use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Multipart, Path, Query},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth,
    avail::SlotError,
    booking::{self, TIME_SLOTS},
    catalog::Artifact,
    config::Glob,
    img,
    quiz::{self, QuestionKind},
    store::reservations::SlotWrite,
};
use super::*;

/*

Console pages.

*/

#[derive(Debug, Deserialize)]
pub struct UserSearch {
    pub search: Option<String>,
}

/// Case-insensitive name-or-email match for the console search boxes.
/// The needle is lowercased for matching only; the page echoes it back
/// into the search box exactly as typed.
fn matches_needle(needle: &str, name: &str, email: &str) -> bool {
    let needle = needle.to_lowercase();
    name.to_lowercase().contains(&needle)
        || email.to_lowercase().contains(&needle)
}

pub async fn users_page(
    headers: HeaderMap,
    Query(q): Query<UserSearch>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, admin) = match require_admin(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };

    let mut users = match glob.store.get_users().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching users: {}", e.display());
            return html_500();
        },
    };

    let search = q.search.unwrap_or_default();
    let search = search.trim();
    if !search.is_empty() {
        users.retain(|u| matches_needle(search, &u.name, &u.email));
    }

    serve_template(
        StatusCode::OK,
        "admin_users",
        &json!({
            "user": admin,
            "users": users,
            "search": search,
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct ReservationSearch {
    pub search: Option<String>,
    pub date: Option<String>,
}

pub async fn reservations_page(
    headers: HeaderMap,
    Query(q): Query<ReservationSearch>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, admin) = match require_admin(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };

    let mut reservations = match glob.store.get_reservations().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching reservations: {}", e.display());
            return html_500();
        },
    };

    let search = q.search.unwrap_or_default();
    let search = search.trim();
    if !search.is_empty() {
        reservations.retain(|r| matches_needle(search, &r.full_name, &r.email));
    }
    // the date box matches on the rendered "YYYY-MM-DD", so a bare
    // "2025-06" finds a whole month
    let date = q.date.unwrap_or_default();
    let date_needle = date.trim();
    if !date_needle.is_empty() {
        reservations.retain(|r| date_str(r.visit_date).contains(date_needle));
    }

    let rows: Vec<serde_json::Value> = reservations.iter()
        .map(|r| json!({
            "id": r.id,
            "visit_date": date_str(r.visit_date),
            "visit_time": &r.visit_time,
            "full_name": &r.full_name,
            "email": &r.email,
            "contact": &r.contact,
            "party_size": r.party_size,
        }))
        .collect();

    serve_template(
        StatusCode::OK,
        "admin_reservations",
        &json!({
            "user": admin,
            "reservations": rows,
            "search": search,
            "date": date_needle,
            "time_slots": TIME_SLOTS,
        }),
    )
}

pub async fn blocked_page(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, admin) = match require_admin(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };

    let blocked = match glob.store.get_blocked_slots().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching blocked slots: {}", e.display());
            return html_500();
        },
    };

    let rows: Vec<serde_json::Value> = blocked.iter()
        .map(|b| json!({
            "id": b.id,
            "day": date_str(b.day),
            "times": &b.times,
        }))
        .collect();

    serve_template(
        StatusCode::OK,
        "admin_blocked",
        &json!({
            "user": admin,
            "blocked": rows,
            "time_slots": TIME_SLOTS,
        }),
    )
}

pub async fn artifacts_page(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, admin) = match require_admin(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };

    let artifacts = match glob.store.get_artifacts().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching artifacts: {}", e.display());
            return html_500();
        },
    };

    serve_template(
        StatusCode::OK,
        "admin_artifacts",
        &json!({
            "user": admin,
            "artifacts": artifacts,
        }),
    )
}

pub async fn questions_page(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, admin) = match require_admin(&headers, &glob).await {
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

    serve_template(
        StatusCode::OK,
        "admin_questions",
        &json!({
            "user": admin,
            "questions": questions,
        }),
    )
}

/// Tally the catalog by kind for the reports page. Kinds are free
/// text, compared as entered; the tally comes back sorted by kind.
fn kind_tally(artifacts: &[Artifact]) -> Vec<(String, usize)> {
    let mut tally: BTreeMap<&str, usize> = BTreeMap::new();
    for a in artifacts.iter() {
        *tally.entry(a.kind.as_str()).or_insert(0) += 1;
    }

    tally.into_iter()
        .map(|(kind, n)| (kind.to_owned(), n))
        .collect()
}

/// The cross-section report: everything on the books, on one page.
pub async fn reports_page(
    headers: HeaderMap,
    Query(q): Query<UserSearch>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, admin) = match require_admin(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };

    let mut users = match glob.store.get_users().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching users: {}", e.display());
            return html_500();
        },
    };
    let reservations = match glob.store.get_reservations().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching reservations: {}", e.display());
            return html_500();
        },
    };
    let blocked = match glob.store.get_blocked_slots().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching blocked slots: {}", e.display());
            return html_500();
        },
    };
    let artifacts = match glob.store.get_artifacts().await {
        Ok(v) => v,
        Err(e) => {
            log::error!("Error fetching artifacts: {}", e.display());
            return html_500();
        },
    };

    let search = q.search.unwrap_or_default();
    let search = search.trim();
    if !search.is_empty() {
        users.retain(|u| matches_needle(search, &u.name, &u.email));
    }

    let reservation_rows: Vec<serde_json::Value> = reservations.iter()
        .map(|r| json!({
            "visit_date": date_str(r.visit_date),
            "visit_time": &r.visit_time,
            "full_name": &r.full_name,
            "email": &r.email,
            "party_size": r.party_size,
        }))
        .collect();
    let blocked_rows: Vec<serde_json::Value> = blocked.iter()
        .map(|b| json!({
            "day": date_str(b.day),
            "times": &b.times,
        }))
        .collect();
    let kinds: Vec<serde_json::Value> = kind_tally(&artifacts).into_iter()
        .map(|(kind, n)| json!({ "kind": kind, "count": n }))
        .collect();

    serve_template(
        StatusCode::OK,
        "admin_reports",
        &json!({
            "user": admin,
            "users": users,
            "search": search,
            "reservations": reservation_rows,
            "blocked": blocked_rows,
            "kinds": kinds,
            "n_artifacts": artifacts.len(),
        }),
    )
}

/*

User management.

*/

#[derive(Debug, Deserialize)]
pub struct UserUpdateData {
    pub name: Option<String>,
    pub email: Option<String>,
}

fn nonempty(s: Option<String>) -> Option<String> {
    match s {
        Some(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => None,
    }
}

pub async fn update_user(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<UserUpdateData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::update_user( {} ) called.", id);

    let name = nonempty(form.name);
    let email = nonempty(form.email);
    if name.is_none() && email.is_none() {
        return action_err(
            StatusCode::BAD_REQUEST,
            "Nothing to update.",
            "/admin",
        );
    }

    match glob.store.update_user_details(
        id, name.as_deref(), email.as_deref(),
    ).await {
        Err(e) => action_store_error(&e, "updating the user", "/admin"),
        Ok(false) => action_err(StatusCode::NOT_FOUND, "No such user.", "/admin"),
        Ok(true) => action_ok("User updated.", "/admin"),
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordData {
    pub password: String,
}

pub async fn set_user_password(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<PasswordData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::set_user_password( {} ) called.", id);

    if form.password.is_empty() {
        return action_err(
            StatusCode::BAD_REQUEST,
            "A new password is required.",
            "/admin",
        );
    }

    let hash = match auth::hash_password(form.password).await {
        Ok(h) => h,
        Err(e) => {
            log::error!("Error hashing admin-set password: {}", &e);
            return html_500();
        },
    };

    match glob.store.update_user_password(id, &hash).await {
        Err(e) => action_store_error(&e, "setting the password", "/admin"),
        Ok(false) => action_err(StatusCode::NOT_FOUND, "No such user.", "/admin"),
        Ok(true) => action_ok("Password updated.", "/admin"),
    }
}

#[derive(Debug, Deserialize)]
pub struct ScoreData {
    pub score: i32,
}

pub async fn set_user_score(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<ScoreData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::set_user_score( {}, {} ) called.", id, form.score);

    match glob.store.update_user_score(id, form.score).await {
        Err(e) => action_store_error(&e, "setting the score", "/admin"),
        Ok(false) => action_err(StatusCode::NOT_FOUND, "No such user.", "/admin"),
        Ok(true) => action_ok("Score updated.", "/admin"),
    }
}

pub async fn delete_user(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, admin) = match require_admin(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };
    log::trace!("admin::delete_user( {} ) called.", id);

    if admin.id == id {
        return action_err(
            StatusCode::BAD_REQUEST,
            "You cannot remove the account you are signed in with.",
            "/admin",
        );
    }

    match glob.store.delete_user(id).await {
        Err(e) => action_store_error(&e, "removing the user", "/admin"),
        Ok(false) => action_err(StatusCode::NOT_FOUND, "No such user.", "/admin"),
        Ok(true) => {
            log::info!("Admin {:?} removed user {}.", &admin.email, id);
            action_ok("User removed.", "/admin")
        },
    }
}

/*

Reservation ledger.

*/

#[derive(Debug, Deserialize)]
pub struct VisitDateData {
    pub visit_date: String,
}

pub async fn set_visit_date(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<VisitDateData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::set_visit_date( {}, {:?} ) called.", id, &form.visit_date);

    let date = match booking::parse_date(&form.visit_date) {
        Ok(d) => d,
        Err(e) => {
            return action_err(StatusCode::BAD_REQUEST, &e, "/admin/reservations");
        },
    };
    // a single-field edit re-checks only that the date isn't past; the
    // uniqueness constraint still catches a slot collision
    if date < time::OffsetDateTime::now_utc().date() {
        return action_err(
            StatusCode::BAD_REQUEST,
            &SlotError::DateInPast.to_string(),
            "/admin/reservations",
        );
    }

    match glob.store.update_visit_date(id, date).await {
        Err(e) => action_store_error(&e, "updating the visit date", "/admin/reservations"),
        Ok(SlotWrite::Gone) => action_err(
            StatusCode::NOT_FOUND,
            "No such reservation.",
            "/admin/reservations",
        ),
        Ok(SlotWrite::SlotClash) => action_err(
            StatusCode::CONFLICT,
            &SlotError::SlotTaken.to_string(),
            "/admin/reservations",
        ),
        Ok(SlotWrite::Ok(_)) => action_ok("Visit date updated.", "/admin/reservations"),
    }
}

#[derive(Debug, Deserialize)]
pub struct VisitTimeData {
    pub visit_time: String,
}

pub async fn set_visit_time(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<VisitTimeData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::set_visit_time( {}, {:?} ) called.", id, &form.visit_time);

    let slot = match booking::parse_slot(&form.visit_time) {
        Ok(s) => s,
        Err(e) => {
            return action_err(StatusCode::BAD_REQUEST, &e, "/admin/reservations");
        },
    };

    match glob.store.update_visit_time(id, &slot).await {
        Err(e) => action_store_error(&e, "updating the visit time", "/admin/reservations"),
        Ok(SlotWrite::Gone) => action_err(
            StatusCode::NOT_FOUND,
            "No such reservation.",
            "/admin/reservations",
        ),
        Ok(SlotWrite::SlotClash) => action_err(
            StatusCode::CONFLICT,
            &SlotError::SlotTaken.to_string(),
            "/admin/reservations",
        ),
        Ok(SlotWrite::Ok(_)) => action_ok("Visit time updated.", "/admin/reservations"),
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactData {
    pub contact: String,
}

pub async fn set_contact(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<ContactData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::set_contact( {} ) called.", id);

    match glob.store.update_contact(id, form.contact.trim()).await {
        Err(e) => action_store_error(&e, "updating the contact number", "/admin/reservations"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such reservation.",
            "/admin/reservations",
        ),
        Ok(true) => action_ok("Contact number updated.", "/admin/reservations"),
    }
}

#[derive(Debug, Deserialize)]
pub struct PartyData {
    pub party_size: i32,
}

pub async fn set_party_size(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<PartyData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::set_party_size( {}, {} ) called.", id, form.party_size);

    if form.party_size < 1 {
        return action_err(
            StatusCode::BAD_REQUEST,
            "Party size must be at least 1.",
            "/admin/reservations",
        );
    }

    match glob.store.update_party_size(id, form.party_size).await {
        Err(e) => action_store_error(&e, "updating the party size", "/admin/reservations"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such reservation.",
            "/admin/reservations",
        ),
        Ok(true) => action_ok("Party size updated.", "/admin/reservations"),
    }
}

pub async fn delete_reservation(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    let (_, admin) = match require_admin(&headers, &glob).await {
        Ok(x) => x,
        Err(r) => { return r; },
    };
    log::trace!("admin::delete_reservation( {} ) called.", id);

    match glob.store.delete_reservation(id).await {
        Err(e) => action_store_error(&e, "removing the reservation", "/admin/reservations"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such reservation.",
            "/admin/reservations",
        ),
        Ok(true) => {
            log::info!("Admin {:?} removed reservation {}.", &admin.email, id);
            action_ok("Reservation removed.", "/admin/reservations")
        },
    }
}

/*

Blocked slots.

*/

#[derive(Debug, Deserialize)]
pub struct BlockData {
    pub start_date: String,
    pub end_date: Option<String>,
    /// Comma-separated slot strings, as the console form submits them.
    pub times: String,
}

pub async fn add_blocked(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<BlockData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!(
        "admin::add_blocked( {:?}, {:?}, {:?} ) called.",
        &form.start_date, &form.end_date, &form.times
    );

    let start = match booking::parse_date(&form.start_date) {
        Ok(d) => d,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/admin/blocked"); },
    };
    // no end date means a single-day range
    let end = match form.end_date {
        Some(ref s) if !s.trim().is_empty() => match booking::parse_date(s) {
            Ok(d) => d,
            Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/admin/blocked"); },
        },
        _ => start,
    };
    if end < start {
        return action_err(
            StatusCode::BAD_REQUEST,
            "The end date is before the start date.",
            "/admin/blocked",
        );
    }

    let mut times: Vec<String> = Vec::new();
    for raw in form.times.split(',') {
        let raw = raw.trim();
        if raw.is_empty() { continue; }
        match booking::parse_slot(raw) {
            Ok(s) => times.push(s),
            Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/admin/blocked"); },
        }
    }
    if times.is_empty() {
        return action_err(
            StatusCode::BAD_REQUEST,
            "At least one time slot is required.",
            "/admin/blocked",
        );
    }

    match glob.store.block_dates(start, end, &times).await {
        Err(e) => action_store_error(&e, "blocking the dates", "/admin/blocked"),
        Ok(n) => action_ok(
            &format!("Blocked {} time slot(s) across {} date(s).", times.len(), n),
            "/admin/blocked",
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct RedateData {
    pub day: String,
}

pub async fn redate_blocked(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<RedateData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::redate_blocked( {}, {:?} ) called.", id, &form.day);

    let day = match booking::parse_date(&form.day) {
        Ok(d) => d,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/admin/blocked"); },
    };

    match glob.store.update_blocked_date(id, day).await {
        Err(e) => {
            log::error!("Error re-dating blocked record {}: {}", id, e.display());
            action_err(StatusCode::CONFLICT, e.display(), "/admin/blocked")
        },
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such blocked date.",
            "/admin/blocked",
        ),
        Ok(true) => action_ok("Blocked date updated.", "/admin/blocked"),
    }
}

#[derive(Debug, Deserialize)]
pub struct UnblockTimeData {
    pub time: String,
}

pub async fn remove_blocked_time(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<UnblockTimeData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::remove_blocked_time( {}, {:?} ) called.", id, &form.time);

    match glob.store.unblock_time(id, form.time.trim()).await {
        Err(e) => action_store_error(&e, "unblocking the time", "/admin/blocked"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such blocked date.",
            "/admin/blocked",
        ),
        Ok(true) => action_ok("Time slot unblocked.", "/admin/blocked"),
    }
}

pub async fn delete_blocked(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::delete_blocked( {} ) called.", id);

    match glob.store.unblock_date(id).await {
        Err(e) => action_store_error(&e, "unblocking the date", "/admin/blocked"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such blocked date.",
            "/admin/blocked",
        ),
        Ok(true) => action_ok("Blocked date removed.", "/admin/blocked"),
    }
}

/*

Artifact catalog.

*/

#[derive(Debug, Default)]
struct ArtifactUpload {
    title: String,
    kind: String,
    status: String,
    description: String,
    model_link: Option<String>,
    /// (file name, declared MIME type, bytes), when a file was sent.
    image: Option<(String, String, Vec<u8>)>,
}

/// Drain the multipart body into the fields the artifact forms carry.
async fn read_artifact_upload(mut parts: Multipart) -> Result<ArtifactUpload, String> {
    let mut up = ArtifactUpload::default();

    while let Some(field) = parts.next_field().await
        .map_err(|e| format!("Error reading upload: {}", &e))?
    {
        let name = field.name().unwrap_or("").to_owned();
        match name.as_str() {
            "title" => { up.title = field.text().await
                .map_err(|e| format!("Error reading title: {}", &e))?; },
            "kind" => { up.kind = field.text().await
                .map_err(|e| format!("Error reading kind: {}", &e))?; },
            "status" => { up.status = field.text().await
                .map_err(|e| format!("Error reading status: {}", &e))?; },
            "description" => { up.description = field.text().await
                .map_err(|e| format!("Error reading description: {}", &e))?; },
            "model_link" => {
                let link = field.text().await
                    .map_err(|e| format!("Error reading model link: {}", &e))?;
                let link = link.trim();
                if !link.is_empty() {
                    up.model_link = Some(link.to_owned());
                }
            },
            "image" => {
                let filename = field.file_name().unwrap_or("").to_owned();
                let mime = field.content_type().unwrap_or("").to_owned();
                let bytes = field.bytes().await
                    .map_err(|e| format!("Error reading image bytes: {}", &e))?;
                // browsers send an empty file part when none was chosen
                if !filename.is_empty() && !bytes.is_empty() {
                    up.image = Some((filename, mime, bytes.to_vec()));
                }
            },
            x => { log::warn!("Ignoring unexpected upload field {:?}.", x); },
        }
    }

    if up.title.trim().is_empty() {
        return Err("An artifact title is required.".to_owned());
    }

    Ok(up)
}

pub async fn add_artifact(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    parts: Multipart,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::add_artifact() called.");

    let up = match read_artifact_upload(parts).await {
        Ok(u) => u,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/admin/artifacts"); },
    };

    let image_url = match up.image {
        None => None,
        Some((filename, mime, bytes)) => {
            if let Err(e) = img::acceptable_upload(&filename, &mime) {
                return action_err(StatusCode::BAD_REQUEST, &e, "/admin/artifacts");
            }
            match glob.image_host.store(&filename, &bytes) {
                Ok(url) => Some(url),
                Err(e) => {
                    log::error!("Image host error storing {:?}: {}", &filename, &e);
                    return action_err(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "The image could not be stored.",
                        "/admin/artifacts",
                    );
                },
            }
        },
    };

    let res = glob.store.insert_artifact(
        up.title.trim(),
        up.kind.trim(),
        up.status.trim(),
        up.description.trim(),
        image_url.as_deref(),
        up.model_link.as_deref(),
    ).await;

    match res {
        Err(e) => {
            // don't strand the hosted image if the record write failed
            if let Some(ref url) = image_url {
                if let Err(e) = glob.image_host.delete(url) {
                    log::error!("Error removing orphaned image {:?}: {}", url, &e);
                }
            }
            action_store_error(&e, "adding the artifact", "/admin/artifacts")
        },
        Ok(id) => {
            log::info!("Artifact {} ({:?}) added.", id, up.title.trim());
            action_ok("Artifact added.", "/admin/artifacts")
        },
    }
}

pub async fn update_artifact(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    parts: Multipart,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::update_artifact( {} ) called.", id);

    let existing = match glob.store.get_artifact(id).await {
        Err(e) => { return action_store_error(&e, "looking up the artifact", "/admin/artifacts"); },
        Ok(None) => {
            return action_err(
                StatusCode::NOT_FOUND,
                "No such artifact.",
                "/admin/artifacts",
            );
        },
        Ok(Some(a)) => a,
    };

    let up = match read_artifact_upload(parts).await {
        Ok(u) => u,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/admin/artifacts"); },
    };

    // no new file keeps the existing reference
    let image_url = match up.image {
        None => existing.image_url.clone(),
        Some((filename, mime, bytes)) => {
            if let Err(e) = img::acceptable_upload(&filename, &mime) {
                return action_err(StatusCode::BAD_REQUEST, &e, "/admin/artifacts");
            }
            match glob.image_host.store(&filename, &bytes) {
                Ok(url) => Some(url),
                Err(e) => {
                    log::error!("Image host error storing {:?}: {}", &filename, &e);
                    return action_err(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "The image could not be stored.",
                        "/admin/artifacts",
                    );
                },
            }
        },
    };
    let replaced_image = image_url != existing.image_url;

    let res = glob.store.update_artifact(
        id,
        up.title.trim(),
        up.kind.trim(),
        up.status.trim(),
        up.description.trim(),
        image_url.as_deref(),
        up.model_link.as_deref(),
    ).await;

    match res {
        Err(e) => action_store_error(&e, "updating the artifact", "/admin/artifacts"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such artifact.",
            "/admin/artifacts",
        ),
        Ok(true) => {
            if replaced_image {
                if let Some(ref old) = existing.image_url {
                    if let Err(e) = glob.image_host.delete(old) {
                        log::error!("Error deleting replaced image {:?}: {}", old, &e);
                    }
                }
            }
            action_ok("Artifact updated.", "/admin/artifacts")
        },
    }
}

pub async fn delete_artifact(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::delete_artifact( {} ) called.", id);

    let existing = match glob.store.get_artifact(id).await {
        Err(e) => { return action_store_error(&e, "looking up the artifact", "/admin/artifacts"); },
        Ok(None) => {
            return action_err(
                StatusCode::NOT_FOUND,
                "No such artifact.",
                "/admin/artifacts",
            );
        },
        Ok(Some(a)) => a,
    };

    match glob.store.delete_artifact(id).await {
        Err(e) => action_store_error(&e, "removing the artifact", "/admin/artifacts"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such artifact.",
            "/admin/artifacts",
        ),
        Ok(true) => {
            // the record is gone; a host failure here is logged and
            // swallowed
            if let Some(ref url) = existing.image_url {
                if let Err(e) = glob.image_host.delete(url) {
                    log::error!("Error deleting image {:?}: {}", url, &e);
                }
            }
            action_ok("Artifact removed.", "/admin/artifacts")
        },
    }
}

/*

Quiz question bank.

*/

#[derive(Debug, Deserialize)]
pub struct QuestionData {
    pub kind: String,
    pub prompt: String,
    /// Comma-separated options; ignored for fill-in-the-blank.
    pub options: Option<String>,
    pub answer: String,
}

fn parse_question(form: QuestionData) -> Result<(QuestionKind, String, Vec<String>, String), String> {
    let kind: QuestionKind = form.kind.parse()?;
    let prompt = form.prompt.trim().to_owned();
    if prompt.is_empty() {
        return Err("A question prompt is required.".to_owned());
    }
    let answer = form.answer.trim().to_owned();
    if answer.is_empty() {
        return Err("An answer is required.".to_owned());
    }

    let options = quiz::parse_options(kind, form.options.as_deref().unwrap_or(""));
    if kind == QuestionKind::MultipleChoice && options.len() < 2 {
        return Err("Multiple-choice questions need at least two options.".to_owned());
    }

    Ok((kind, prompt, options, answer))
}

pub async fn add_question(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<QuestionData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::add_question( {:?} ) called.", &form.prompt);

    let (kind, prompt, options, answer) = match parse_question(form) {
        Ok(x) => x,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/admin/questions"); },
    };

    match glob.store.insert_question(kind, &prompt, &options, &answer).await {
        Err(e) => action_store_error(&e, "adding the question", "/admin/questions"),
        Ok(id) => {
            log::info!("Question {} added.", id);
            action_ok("Question added.", "/admin/questions")
        },
    }
}

pub async fn update_question(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
    Form(form): Form<QuestionData>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::update_question( {} ) called.", id);

    let (kind, prompt, options, answer) = match parse_question(form) {
        Ok(x) => x,
        Err(e) => { return action_err(StatusCode::BAD_REQUEST, &e, "/admin/questions"); },
    };

    match glob.store.update_question(id, kind, &prompt, &options, &answer).await {
        Err(e) => action_store_error(&e, "updating the question", "/admin/questions"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such question.",
            "/admin/questions",
        ),
        Ok(true) => action_ok("Question updated.", "/admin/questions"),
    }
}

pub async fn delete_question(
    headers: HeaderMap,
    Path(id): Path<i64>,
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    if let Err(r) = require_admin(&headers, &glob).await {
        return r;
    }
    log::trace!("admin::delete_question( {} ) called.", id);

    match glob.store.delete_question(id).await {
        Err(e) => action_store_error(&e, "removing the question", "/admin/questions"),
        Ok(false) => action_err(
            StatusCode::NOT_FOUND,
            "No such question.",
            "/admin/questions",
        ),
        Ok(true) => action_ok("Question removed.", "/admin/questions"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_search_ignores_case_both_ways() {
        assert!(matches_needle("ana", "Ana Maria", "a@x.com"));
        // a capitalized needle must still hit lowercased records
        assert!(matches_needle("Ana", "ana maria", "a@x.com"));
        assert!(matches_needle("X.COM", "Ben", "b@x.com"));
        assert!(!matches_needle("zed", "Ana Maria", "a@x.com"));
    }

    fn artifact(kind: &str) -> Artifact {
        Artifact {
            id: 0,
            title: "t".to_owned(),
            kind: kind.to_owned(),
            status: "on display".to_owned(),
            description: String::new(),
            image_url: None,
            model_link: None,
        }
    }

    #[test]
    fn report_tallies_artifact_kinds() {
        let arts = vec![
            artifact("pottery"),
            artifact("textile"),
            artifact("pottery"),
        ];
        assert_eq!(
            kind_tally(&arts),
            vec![("pottery".to_owned(), 2), ("textile".to_owned(), 1)]
        );
        assert!(kind_tally(&[]).is_empty());
    }

    #[test]
    fn question_forms_parse() {
        let (kind, prompt, options, answer) = parse_question(QuestionData {
            kind: "multiple-choice".to_owned(),
            prompt: " Which vessel is from Palawan? ".to_owned(),
            options: Some("jar, bowl, lid".to_owned()),
            answer: "jar".to_owned(),
        }).unwrap();
        assert_eq!(kind, QuestionKind::MultipleChoice);
        assert_eq!(prompt, "Which vessel is from Palawan?");
        assert_eq!(options, vec!["jar", "bowl", "lid"]);
        assert_eq!(answer, "jar");

        // fill-in-the-blank drops any submitted options
        let (kind, _, options, _) = parse_question(QuestionData {
            kind: "fill-in-the-blank".to_owned(),
            prompt: "The Manunggul ___ is from Palawan.".to_owned(),
            options: Some("ignored".to_owned()),
            answer: "jar".to_owned(),
        }).unwrap();
        assert_eq!(kind, QuestionKind::FillInTheBlank);
        assert!(options.is_empty());
    }

    #[test]
    fn bad_question_forms_rejected() {
        // unknown kind
        assert!(parse_question(QuestionData {
            kind: "essay".to_owned(),
            prompt: "p".to_owned(),
            options: None,
            answer: "a".to_owned(),
        }).is_err());

        // multiple choice with too few options
        assert!(parse_question(QuestionData {
            kind: "multiple-choice".to_owned(),
            prompt: "p".to_owned(),
            options: Some("only".to_owned()),
            answer: "only".to_owned(),
        }).is_err());

        // blank prompt
        assert!(parse_question(QuestionData {
            kind: "fill-in-the-blank".to_owned(),
            prompt: "  ".to_owned(),
            options: None,
            answer: "a".to_owned(),
        }).is_err());
    }
}
