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

use serde_json::{json, Value};
use warp::http::StatusCode;

use open_ccg::{
    auth::Session,
    models::{Card, DeckJson, UserJson},
    response::NO_ALTERATIONS,
};

mod common;

#[tokio::test]
async fn user_administration_is_admin_only() {
    let state = common::state();
    let (geralt, _) = common::user(&state, "geralt", false).await;
    let (_, ciri) = common::user(&state, "ciri", false).await;

    let (status, envelope) =
        common::delete(&state, &format!("/api/users/{}", geralt.id), &ciri).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "non-admin cannot delete users");
    assert_eq!(envelope.message.as_deref(), Some("Permission denied."));

    let (status, _) = common::get::<Value>(&state, "/api/users", &ciri).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = common::get::<Value>(&state, &format!("/api/users/{}", geralt.id), &ciri).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = common::post::<Value>(
        &state,
        "/api/users",
        &ciri,
        json!({"username": "x", "password": "y", "real_name": "z"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = common::put::<Value>(
        &state,
        &format!("/api/users/{}", geralt.id),
        &ciri,
        json!({"admin": true}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, envelope) = common::get::<UserJson>(&state, "/api/auth/current", &ciri).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!envelope.data.unwrap().admin, "still not an admin");
}

#[tokio::test]
async fn non_admins_are_refused_before_id_checks() {
    let state = common::state();
    let (_, ciri) = common::user(&state, "ciri", false).await;

    let (status, envelope) = common::get::<Value>(&state, "/api/users/abc", &ciri).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "malformed id");
    assert_eq!(envelope.message.as_deref(), Some("Permission denied."));

    let (status, _) = common::put::<Value>(&state, "/api/users", &ciri, json!({"admin": true})).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "missing id");

    let (status, _) = common::delete(&state, "/api/users/0", &ciri).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "zero id");

    let (_, admin) = common::user(&state, "admin", true).await;
    let (status, _) = common::get::<Value>(&state, "/api/users/abc", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "admins still get id validation");
}

#[tokio::test]
async fn admins_cannot_delete_themselves() {
    let state = common::state();
    let (admin, token) = common::user(&state, "admin", true).await;

    let (status, envelope) =
        common::delete(&state, &format!("/api/users/{}", admin.id), &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(envelope.message.as_deref(), Some("Cannot delete yourself."));

    let (status, envelope) =
        common::get::<UserJson>(&state, &format!("/api/users/{}", admin.id), &token).await;
    assert_eq!(status, StatusCode::OK, "admin still exists");
    assert_eq!(envelope.data.unwrap().username, "admin");
}

#[tokio::test]
async fn usernames_are_unique() {
    let state = common::state();
    let (_, admin) = common::user(&state, "admin", true).await;
    let body = json!({"username": "lambert", "password": "pw", "real_name": "Lambert"});

    let (status, envelope) = common::post::<UserJson>(&state, "/api/users", &admin, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let lambert = envelope.data.unwrap();
    assert_eq!(lambert.real_name, "Lambert");

    let (status, envelope) = common::post::<Value>(&state, "/api/users", &admin, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope.message.as_deref(), Some("lambert is taken."));

    let (_, envelope) =
        common::get::<Vec<UserJson>>(&state, "/api/users?username=lambert", &admin).await;
    assert_eq!(envelope.data.unwrap().len(), 1, "exactly one lambert");

    // Renaming onto a taken username fails too.
    let (_, envelope) = common::post::<UserJson>(
        &state,
        "/api/users",
        &admin,
        json!({"username": "eskel", "password": "pw", "real_name": "Eskel"}),
    )
    .await;
    let eskel = envelope.data.unwrap();
    let (status, _) = common::put::<Value>(
        &state,
        &format!("/api/users/{}", eskel.id),
        &admin,
        json!({"username": "lambert"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, envelope) =
        common::get::<UserJson>(&state, &format!("/api/users/{}", eskel.id), &admin).await;
    assert_eq!(envelope.data.unwrap().username, "eskel");
}

#[tokio::test]
async fn user_updates() {
    let state = common::state();
    let (_, admin) = common::user(&state, "admin", true).await;
    let (geralt, _) = common::user(&state, "geralt", false).await;
    let path = format!("/api/users/{}", geralt.id);

    let (status, envelope) = common::put::<UserJson>(
        &state,
        &path,
        &admin,
        json!({"real_name": "Gwynbleidd", "password": "roach", "admin": "true"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let user = envelope.data.unwrap();
    assert_eq!(user.real_name, "Gwynbleidd");
    assert!(user.admin);

    let (status, envelope) = common::put::<UserJson>(
        &state,
        &path,
        &admin,
        json!({"real_name": "Gwynbleidd", "password": "roach", "admin": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope.message.as_deref(), Some(NO_ALTERATIONS));

    // The new password is the one that works.
    let (status, _) = common::call::<Value>(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "geralt", "password": common::PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "old password");
    let (status, envelope) = common::call::<Session>(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "geralt", "password": "roach"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "new password");
    assert!(envelope.data.unwrap().user.admin);

    let (status, _) = common::put::<Value>(&state, &path, &admin, json!({"admin": "maybe"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_listing_filters() {
    let state = common::state();
    let (_, admin) = common::user(&state, "admin", true).await;
    common::user(&state, "geralt", false).await;
    common::user(&state, "ciri", false).await;

    let usernames = |users: Option<Vec<UserJson>>| -> Vec<String> {
        users.unwrap().into_iter().map(|u| u.username).collect()
    };

    let (_, envelope) = common::get::<Vec<UserJson>>(&state, "/api/users", &admin).await;
    assert_eq!(usernames(envelope.data), vec!["admin", "geralt", "ciri"]);

    let (_, envelope) = common::get::<Vec<UserJson>>(&state, "/api/users?admin=false", &admin).await;
    assert_eq!(usernames(envelope.data), vec!["geralt", "ciri"]);

    let (_, envelope) = common::get::<Vec<UserJson>>(&state, "/api/users?real_name=CIRI", &admin).await;
    assert_eq!(usernames(envelope.data), vec!["ciri"]);

    let (_, envelope) = common::get::<Vec<UserJson>>(&state, "/api/users?username=ger", &admin).await;
    assert!(envelope.data.unwrap().is_empty(), "usernames match exactly");
}

#[tokio::test]
async fn deleting_a_user_removes_their_collection() {
    let state = common::state();
    let (_, admin) = common::user(&state, "admin", true).await;
    let (geralt, token) = common::user(&state, "geralt", false).await;

    let (_, envelope) =
        common::post::<DeckJson>(&state, "/api/decks", &token, json!({"name": "Aggro"})).await;
    let deck = envelope.data.unwrap();
    let (_, envelope) = common::post::<Card>(
        &state,
        &format!("/api/decks/{}/cards", deck.id),
        &token,
        json!({"name": "Roach", "power": 2}),
    )
    .await;
    let card = envelope.data.unwrap();

    let (_, envelope) =
        common::get::<UserJson>(&state, &format!("/api/users/{}", geralt.id), &admin).await;
    let json = envelope.data.unwrap();
    assert_eq!(json.decks.len(), 1);
    assert_eq!(json.decks[0].cards, vec![card.clone()]);
    assert_eq!(json.cards, vec![card.clone()]);

    let (status, envelope) =
        common::delete(&state, &format!("/api/users/{}", geralt.id), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope.message.as_deref(), Some("Deleted geralt"));

    let (status, _) = common::get::<Value>(&state, &format!("/api/decks/{}", deck.id), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = common::get::<Value>(&state, &format!("/api/cards/{}", card.id), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = common::delete(&state, &format!("/api/users/{}", geralt.id), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
