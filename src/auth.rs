/*
 * Copyright (C) 2020 Oakes, Gregory <gregoryoakes@fastmail.com>
 * Author: Oakes, Gregory <gregory.oakes@fastmail.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use std::fs;

use chrono::Utc;
use crypto::{digest::Digest, sha3::Sha3};
use jsonwebtoken::{
    decode as jwt_decode, encode as jwt_encode, Algorithm, DecodingKey, EncodingKey,
    Header as JWTHeader, Validation,
};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use warp::{Filter, Rejection};

use crate::{
    config::JWTConfig,
    crud::{needs_data, Body},
    guard,
    models::{Id, User, UserJson},
    resources::{self, users},
    response::Response,
    store, Error, State,
};

const SALT_LEN: usize = 10;
const RANDOM_SECRET_LEN: usize = 32;
/// One week.
pub const DEFAULT_SESSION_TTL: i64 = 604800;

/// Opaque password digests.
pub trait PasswordHasher: Send + Sync + 'static {
    fn hash(&self, plaintext: &str) -> String;

    fn verify(&self, plaintext: &str, digest: &str) -> bool;
}

/// Salted SHA3-256, stored as `salt$hex`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha3Hasher;

impl PasswordHasher for Sha3Hasher {
    fn hash(&self, plaintext: &str) -> String {
        let salt = random_string(SALT_LEN);
        let hash = secure_hash(plaintext, &salt);
        format!("{}${}", salt, hash)
    }

    fn verify(&self, plaintext: &str, digest: &str) -> bool {
        match digest.split_once('$') {
            Some((salt, hash)) => secure_hash(plaintext, salt) == hash,
            None => false,
        }
    }
}

fn secure_hash(password: &str, salt: &str) -> String {
    let mut hasher = Sha3::sha3_256();
    hasher.input_str(password);
    hasher.input_str(salt);
    hasher.result_str()
}

pub fn random_string(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// The claims of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerToken {
    pub iat: i64,
    pub exp: i64,
    pub user_id: Id,
}

/// Issues and checks the JWTs that stand in for a login session.
#[derive(Clone)]
pub struct Sessions {
    encoder: EncodingKey,
    decoder: DecodingKey,
    algorithm: Algorithm,
    ttl: i64,
}

impl Sessions {
    pub fn from_secret(secret: &[u8]) -> Self {
        Sessions {
            encoder: EncodingKey::from_secret(secret),
            decoder: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn from_rsa_pem(private: &[u8], public: &[u8]) -> Result<Self, Error> {
        Ok(Sessions {
            encoder: EncodingKey::from_rsa_pem(private)?,
            decoder: DecodingKey::from_rsa_pem(public)?,
            algorithm: Algorithm::RS256,
            ttl: DEFAULT_SESSION_TTL,
        })
    }

    pub fn from_config(config: &JWTConfig) -> Result<Self, Error> {
        match config {
            JWTConfig::Secret(secret) => Ok(Sessions::from_secret(secret.as_bytes())),
            JWTConfig::RsaPem {
                private_key,
                public_key,
            } => Sessions::from_rsa_pem(&fs::read(private_key)?, &fs::read(public_key)?),
            JWTConfig::Random => {
                tracing::warn!("no JWT key configured, sessions will not survive a restart");
                Ok(Sessions::from_secret(random_string(RANDOM_SECRET_LEN).as_bytes()))
            }
        }
    }

    /// Token lifetime in seconds.
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue(&self, user: &User) -> Result<String, Error> {
        let now = Utc::now().timestamp();
        let payload = BearerToken {
            iat: now,
            exp: now + self.ttl,
            user_id: user.id,
        };
        Ok(jwt_encode(
            &JWTHeader::new(self.algorithm),
            &payload,
            &self.encoder,
        )?)
    }

    pub fn authenticate(&self, token: &str) -> Result<BearerToken, Error> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 60;
        jwt_decode::<BearerToken>(token, &self.decoder, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected session token");
                Error::Unauthenticated
            })
    }
}

/// A freshly opened session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserJson,
}

pub fn api(state: State) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let register = warp::path!("auth" / "register")
        .and(warp::post())
        .and(guard::json_body())
        .and(guard::with_state(state.clone()))
        .and_then(register);

    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(guard::json_body())
        .and(guard::with_state(state.clone()))
        .and_then(login);

    let current = warp::path!("auth" / "current")
        .and(warp::get())
        .and(guard::authenticated(state.clone()))
        .and(guard::with_state(state))
        .and_then(current);

    register.or(login).unify().or(current).unify()
}

async fn open_session(state: &State, user: User) -> Result<Session, Error> {
    let token = state.sessions.issue(&user)?;
    let user = resources::user_json(state.store.as_ref(), user).await?;
    Ok(Session { token, user })
}

pub async fn register(body: Body, state: State) -> Result<Response, Rejection> {
    let user = users::create_account(state.store.as_ref(), state.hasher.as_ref(), &body, false)
        .await?;
    tracing::info!(user = user.id, "registered");
    Ok(Response::created(&open_session(&state, user).await?)?)
}

pub async fn login(body: Body, state: State) -> Result<Response, Rejection> {
    needs_data(&body, &["username", "password"])?;
    let (username, password) = match (&body["username"], &body["password"]) {
        (serde_json::Value::String(u), serde_json::Value::String(p)) => (u, p),
        _ => return Err(Error::Unauthenticated.into()),
    };
    let user = store::user_by_username(state.store.as_ref(), username)
        .await?
        .filter(|user| state.hasher.verify(password, &user.password_hash))
        .ok_or(Error::Unauthenticated)?;
    Ok(Response::ok(&open_session(&state, user).await?)?)
}

pub async fn current(actor: User, state: State) -> Result<Response, Rejection> {
    Ok(Response::ok(
        &resources::user_json(state.store.as_ref(), actor).await?,
    )?)
}
