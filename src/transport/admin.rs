//! HTTP administration of hosts and unix accounts
//!
//! Every route needs the session cookie of a user with
//! `Privilege::Administrator`; anyone else gets 401.
//!
//! | route                             | method | parameters |
//! |-----------------------------------|--------|------------|
//! | `/admin/hosts`                    | GET    | optional `host_id` query |
//! | `/admin/hosts`                    | POST   | form `host_id`, `hostname` |
//! | `/admin/hosts`                    | DELETE | `host_id` query |
//! | `/admin/unix_accounts`            | GET    | optional `unix_account_id` query |
//! | `/admin/unix_accounts`            | POST   | form `unix_account_id`, `unix_account_name`, optional `associated_user_id` |
//! | `/admin/unix_accounts`            | DELETE | `unix_account_id` query |
//! | `/admin/unix_accounts/{id}/users` | GET    | |
//! | `/admin/unix_accounts/{id}/users` | POST   | form `user_id` |
//! | `/admin/unix_accounts/{id}/users` | DELETE | `user_id` query |

use std::io;
use std::sync::Arc;

use axum::extract::{Form, FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::backchannel::parse_unix_account_id;
use super::websocket::cookie_value;
use crate::auth::{Privilege, User, UserSerializer};
use crate::persistence::{Host, Storage, UnixAccount};
use crate::utils::error::StorageError;

#[derive(Clone)]
pub struct AdminState {
    pub storage: Storage,
    pub users: Arc<dyn UserSerializer>,
    /// Cookie holding the session token.
    pub cookie_name: String,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Administrator privilege required")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AdminError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Storage(e) => {
                error!("Administration request failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

type AdminResult<T> = Result<T, AdminError>;

/// The administrator making the request.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AdminState> for RequireAdmin {
    type Rejection = AdminError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AdminState,
    ) -> Result<Self, Self::Rejection> {
        let user = cookie_value(&parts.headers, &state.cookie_name)
            .map(|token| state.users.unserialize(token))
            .unwrap_or_else(User::anonymous);
        if user.privilege != Privilege::Administrator {
            warn!("Refused administration request from '{}'", user.id);
            return Err(AdminError::Unauthorized);
        }
        Ok(RequireAdmin(user))
    }
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route(
            "/admin/hosts",
            get(list_hosts).post(add_host).delete(remove_host),
        )
        .route(
            "/admin/unix_accounts",
            get(list_unix_accounts)
                .post(add_unix_account)
                .delete(remove_unix_account),
        )
        .route(
            "/admin/unix_accounts/{id}/users",
            get(list_associated_users)
                .post(associate_user)
                .delete(disassociate_user),
        )
        .with_state(state)
}

pub async fn start_admin_server(addr: &str, state: AdminState) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Administration listening on http://{addr}");
    axum::serve(listener, router(state)).await
}

fn required(value: Option<String>, name: &str) -> AdminResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AdminError::bad_request(format!("Missing parameter '{name}'")))
}

fn numeric_id(raw: &str) -> AdminResult<u32> {
    parse_unix_account_id(raw)
        .ok_or_else(|| AdminError::bad_request("Unix account id must be numeric"))
}

#[derive(Debug, Default, Deserialize)]
pub struct HostQuery {
    pub host_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HostForm {
    pub host_id: Option<String>,
    pub hostname: Option<String>,
}

async fn list_hosts(
    State(state): State<AdminState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<HostQuery>,
) -> Json<serde_json::Value> {
    let hosts = match query.host_id {
        Some(id) => state.storage.hosts.get_host_by_id(&id).into_iter().collect(),
        None => state.storage.hosts.get_all_hosts(),
    };
    Json(json!({ "hosts": hosts }))
}

async fn add_host(
    State(state): State<AdminState>,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<HostForm>,
) -> AdminResult<StatusCode> {
    let id = required(form.host_id, "host_id")?;
    let name = required(form.hostname, "hostname")?;
    if state.storage.hosts.host_exists(&id) {
        return Err(AdminError::bad_request(format!(
            "Host with id '{id}' already exists"
        )));
    }
    if !state.storage.hosts.add_host(Host::new(id.clone(), name))? {
        return Err(AdminError::bad_request(format!("Host with id '{id}' not added")));
    }
    info!("{} added host {id}", admin.name);
    Ok(StatusCode::OK)
}

async fn remove_host(
    State(state): State<AdminState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<HostQuery>,
) -> AdminResult<StatusCode> {
    let id = required(query.host_id, "host_id")?;
    if !state.storage.hosts.remove_host_by_id(&id)? {
        return Err(AdminError::bad_request(format!("Host with id '{id}' not found")));
    }
    info!("{} removed host {id}", admin.name);
    Ok(StatusCode::OK)
}

#[derive(Debug, Default, Deserialize)]
pub struct UnixAccountQuery {
    pub unix_account_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UnixAccountForm {
    pub unix_account_id: Option<String>,
    pub unix_account_name: Option<String>,
    pub associated_user_id: Option<String>,
}

async fn list_unix_accounts(
    State(state): State<AdminState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<UnixAccountQuery>,
) -> AdminResult<Json<serde_json::Value>> {
    let accounts: Vec<UnixAccount> = match query.unix_account_id {
        Some(raw) => state
            .storage
            .unix_accounts
            .get_unix_account_by_id(numeric_id(&raw)?)
            .into_iter()
            .collect(),
        None => state.storage.unix_accounts.get_all_unix_accounts(),
    };
    Ok(Json(json!({ "unix_accounts": accounts })))
}

async fn add_unix_account(
    State(state): State<AdminState>,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<UnixAccountForm>,
) -> AdminResult<StatusCode> {
    let id = numeric_id(&required(form.unix_account_id, "unix_account_id")?)?;
    let name = required(form.unix_account_name, "unix_account_name")?;
    let associated_user = form.associated_user_id.filter(|user| !user.is_empty());
    if !state
        .storage
        .unix_accounts
        .add_unix_account(UnixAccount::new(id, name), associated_user.as_deref())?
    {
        return Err(AdminError::bad_request(format!(
            "Unix account with id '{id}' already exists"
        )));
    }
    info!("{} added unix account {id}", admin.name);
    Ok(StatusCode::OK)
}

async fn remove_unix_account(
    State(state): State<AdminState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<UnixAccountQuery>,
) -> AdminResult<StatusCode> {
    let id = numeric_id(&required(query.unix_account_id, "unix_account_id")?)?;
    if !state.storage.unix_accounts.remove_unix_account_by_id(id)? {
        return Err(AdminError::bad_request("Unix account id does not exist"));
    }
    info!("{} removed unix account {id}", admin.name);
    Ok(StatusCode::OK)
}

#[derive(Debug, Default, Deserialize)]
pub struct AssociationParams {
    pub user_id: Option<String>,
}

/// Parses the path id and checks that the account exists.
fn existing_unix_account(state: &AdminState, raw: &str) -> AdminResult<u32> {
    let id = numeric_id(raw)?;
    if !state.storage.unix_accounts.unix_account_exists(id) {
        return Err(AdminError::bad_request("Unix account id does not exist"));
    }
    Ok(id)
}

async fn list_associated_users(
    State(state): State<AdminState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(raw_id): Path<String>,
) -> AdminResult<Json<serde_json::Value>> {
    let id = numeric_id(&raw_id)?;
    let users = state
        .storage
        .unix_accounts
        .get_associated_users_for_unix_account(id);
    Ok(Json(json!({ "associated_users": users })))
}

async fn associate_user(
    State(state): State<AdminState>,
    RequireAdmin(admin): RequireAdmin,
    Path(raw_id): Path<String>,
    Form(form): Form<AssociationParams>,
) -> AdminResult<StatusCode> {
    let id = existing_unix_account(&state, &raw_id)?;
    let user_id = required(form.user_id, "user_id")?;
    if !state
        .storage
        .unix_accounts
        .associate_user_to_unix_account(&user_id, id)?
    {
        return Err(AdminError::bad_request(format!(
            "User '{user_id}' is already associated"
        )));
    }
    info!("{} associated user {user_id} to unix account {id}", admin.name);
    Ok(StatusCode::OK)
}

async fn disassociate_user(
    State(state): State<AdminState>,
    RequireAdmin(admin): RequireAdmin,
    Path(raw_id): Path<String>,
    Query(query): Query<AssociationParams>,
) -> AdminResult<StatusCode> {
    let id = existing_unix_account(&state, &raw_id)?;
    let user_id = required(query.user_id, "user_id")?;
    if !state
        .storage
        .unix_accounts
        .disassociate_user_from_unix_account(&user_id, id)?
    {
        return Err(AdminError::bad_request(format!(
            "User '{user_id}' is not associated"
        )));
    }
    info!(
        "{} disassociated user {user_id} from unix account {id}",
        admin.name
    );
    Ok(StatusCode::OK)
}
