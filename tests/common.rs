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

#![allow(dead_code)]

use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde_json::Value;
use warp::http::StatusCode;

use open_ccg::{
    auth::{random_string, Sessions},
    models::{NewUser, User},
    response::Envelope,
    store::{MemoryStore, Mutation},
    State,
};

lazy_static! {
    static ref SECRET: String = random_string(32);
}

pub const PASSWORD: &str = "password";

pub fn sessions() -> Sessions {
    Sessions::from_secret(SECRET.as_bytes())
}

/// A fresh in-memory backend.
pub fn state() -> State {
    State::new(MemoryStore::new_shared(), sessions())
}

/// Inserts an account straight into the store and opens a session for it.
pub async fn user(state: &State, username: &str, admin: bool) -> (User, String) {
    let id = state
        .store
        .commit(Mutation::InsertUser(NewUser {
            username: username.to_string(),
            password_hash: state.hasher.hash(PASSWORD),
            real_name: username.to_uppercase(),
            admin,
        }))
        .await
        .expect("user inserted");
    let user = state.store.user(id).await.unwrap().expect("user stored");
    let token = state.sessions.issue(&user).expect("token issued");
    (user, token)
}

/// Sends one request through the full filter tree.
pub async fn call<T: DeserializeOwned>(
    state: &State,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Envelope<T>) {
    let api = open_ccg::api(state.clone()).expect("api built");
    let mut req = warp::test::request()
        .method(method)
        .path(path)
        .header("Accept", "application/json");
    if let Some(token) = token {
        req = req.header("Authorization", format!("Bearer {}", token));
    }
    if let Some(body) = body {
        req = req.json(&body);
    }
    let res = req.reply(&api).await;
    let body = String::from_utf8_lossy(res.body());
    let envelope = serde_json::from_str::<Envelope<T>>(body.as_ref())
        .unwrap_or_else(|e| panic!("{} {} responded with {:?}: {}", method, path, body, e));
    (res.status(), envelope)
}

pub async fn get<T: DeserializeOwned>(state: &State, path: &str, token: &str) -> (StatusCode, Envelope<T>) {
    call(state, "GET", path, Some(token), None).await
}

pub async fn post<T: DeserializeOwned>(
    state: &State,
    path: &str,
    token: &str,
    body: Value,
) -> (StatusCode, Envelope<T>) {
    call(state, "POST", path, Some(token), Some(body)).await
}

pub async fn put<T: DeserializeOwned>(
    state: &State,
    path: &str,
    token: &str,
    body: Value,
) -> (StatusCode, Envelope<T>) {
    call(state, "PUT", path, Some(token), Some(body)).await
}

pub async fn delete(state: &State, path: &str, token: &str) -> (StatusCode, Envelope<Value>) {
    call(state, "DELETE", path, Some(token), None).await
}
