//! Account workflow: registration, credential checks, password and role changes.

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{ChangePasswordRequest, LoginRequest, NewUser, RegisterUserRequest, Role, User, UserProfile},
    oauth::OAuthIdentity,
    password::{OAUTH_ONLY_PASSWORD, hash_password, verify_password},
    policy::{Action, Actor, Resource, authorize},
    repository::{Repository, RepositoryError},
};

const MIN_PASSWORD_LEN: usize = 4;
const MAX_USERNAME_LEN: usize = 80;

fn validate_username(raw: &str) -> Result<String, AppError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(username.to_string())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// register
///
/// Self-service sign-up. The role defaults to `student`; `instructor` may be chosen,
/// `admin` may not (administrators come from seeding or a role change).
pub async fn register(repo: &dyn Repository, request: RegisterUserRequest) -> Result<User, AppError> {
    let username = validate_username(&request.username)?;
    validate_password(&request.password)?;

    let role = request.role.unwrap_or_default();
    if role == Role::Admin {
        return Err(AppError::Validation(
            "administrator accounts cannot be self-registered".to_string(),
        ));
    }

    let password_hash = hash_password(&request.password)?;
    let user = repo
        .create_user(NewUser {
            username,
            password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict => AppError::Duplicate("username already taken".to_string()),
            other => other.into(),
        })?;

    tracing::info!(user_id = user.id, role = %user.role, "user registered");
    Ok(user)
}

/// authenticate
///
/// Unknown user or wrong password is `Unauthorized`. With correct credentials, a role
/// that was supplied and differs from the stored one is `AccessDenied`.
pub async fn authenticate(repo: &dyn Repository, request: &LoginRequest) -> Result<User, AppError> {
    let user = repo
        .find_user_by_username(request.username.trim())
        .await
        .ok_or(AppError::Unauthorized)?;

    // OAuth-only accounts have no password hash and can never match.
    let matches = verify_password(&request.password, &user.password_hash).unwrap_or(false);
    if !matches {
        tracing::debug!(username = %user.username, "password mismatch");
        return Err(AppError::Unauthorized);
    }

    if let Some(role) = request.role {
        if role != user.role {
            return Err(AppError::AccessDenied);
        }
    }

    Ok(user)
}

/// sign_in_with_oauth
///
/// Finds the local account for a provider identity, creating a `student` on first login.
pub async fn sign_in_with_oauth(repo: &dyn Repository, identity: &OAuthIdentity) -> Result<User, AppError> {
    let username = identity.username();
    if let Some(user) = repo.find_user_by_username(&username).await {
        return Ok(user);
    }

    let created = repo
        .create_user(NewUser {
            username: username.clone(),
            password_hash: OAUTH_ONLY_PASSWORD.to_string(),
            role: Role::Student,
        })
        .await;

    match created {
        Ok(user) => {
            tracing::info!(user_id = user.id, "account created from oauth login");
            Ok(user)
        }
        // Lost a race with a concurrent first login.
        Err(RepositoryError::Conflict) => repo
            .find_user_by_username(&username)
            .await
            .ok_or_else(|| AppError::Internal(format!("oauth user {username} vanished after conflict"))),
        Err(e) => Err(e.into()),
    }
}

pub async fn change_password(
    repo: &dyn Repository,
    actor: &AuthUser,
    request: &ChangePasswordRequest,
) -> Result<(), AppError> {
    authorize(Actor::from(actor), Resource::UserAccount { id: actor.id }, Action::Edit).require()?;
    validate_password(&request.new_password)?;

    let user = repo.get_user(actor.id).await.ok_or_else(|| AppError::not_found("user"))?;
    if !verify_password(&request.current_password, &user.password_hash).unwrap_or(false) {
        return Err(AppError::Unauthorized);
    }

    let password_hash = hash_password(&request.new_password)?;
    if !repo.update_password(user.id, &password_hash).await? {
        return Err(AppError::not_found("user"));
    }

    tracing::info!(user_id = user.id, "password changed");
    Ok(())
}

pub async fn list_users(repo: &dyn Repository, actor: &AuthUser) -> Result<Vec<UserProfile>, AppError> {
    authorize(Actor::from(actor), Resource::Users, Action::View).require()?;
    Ok(repo.list_users().await.into_iter().map(UserProfile::from).collect())
}

pub async fn change_role(
    repo: &dyn Repository,
    actor: &AuthUser,
    user_id: i64,
    role: Role,
) -> Result<UserProfile, AppError> {
    authorize(Actor::from(actor), Resource::Users, Action::Edit).require()?;

    let user = repo
        .update_user_role(user_id, role)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;

    tracing::info!(actor_id = actor.id, user_id, role = %role, "role changed");
    Ok(user.into())
}

/// delete_user
///
/// Removes an account and (through cascading) its enrollments. An administrator can
/// never delete their own account.
pub async fn delete_user(repo: &dyn Repository, actor: &AuthUser, user_id: i64) -> Result<(), AppError> {
    authorize(Actor::from(actor), Resource::Users, Action::Delete).require()?;

    if user_id == actor.id {
        return Err(AppError::Conflict(
            "administrators cannot delete their own account".to_string(),
        ));
    }

    let deleted = repo.delete_user(user_id).await.map_err(|e| match e {
        RepositoryError::Conflict => {
            AppError::Conflict("the user's courses clash with existing unowned course names".to_string())
        }
        other => other.into(),
    })?;
    if !deleted {
        return Err(AppError::not_found("user"));
    }

    tracing::info!(actor_id = actor.id, user_id, "user deleted");
    Ok(())
}
