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

use async_trait::async_trait;
use warp::http::StatusCode;

use super::user_json;
use crate::{
    auth::PasswordHasher,
    crud::{gets_by_id, needs_admin, needs_data, parse_id, Args, Body, Ctx, Permission, Resource, Verb},
    models::{Id, NewUser, User, UserFilter},
    patch::{bool_value, parse_bool, string_value, UserField},
    response::Response,
    store::{self, Mutation, Store},
    Error,
};

/// Account administration. Every verb is admin-only.
pub struct Users;

#[async_trait]
impl Resource for Users {
    const NAME: &'static str = "users";
    const METHODS: &'static [Verb] = &Verb::ALL;

    async fn guard(&self, ctx: &Ctx<'_>) -> Result<(), Error> {
        needs_admin(ctx.actor)
    }

    async fn create(&self, ctx: &Ctx<'_>, body: &Body, _args: &Args) -> Result<Response, Error> {
        let user = create_account(ctx.store, ctx.hasher, body, true).await?;
        Response::created(&user_json(ctx.store, user).await?)
    }

    async fn read(&self, ctx: &Ctx<'_>, id: Option<Id>, args: &Args) -> Result<Response, Error> {
        match id {
            Some(id) => {
                let user: User = gets_by_id(ctx, id, Permission::NotRequired).await?;
                Response::ok(&user_json(ctx.store, user).await?)
            }
            None => {
                let filter = UserFilter {
                    id: args.get("id").map(|raw| parse_id(raw)).transpose()?,
                    username: args.get("username").cloned(),
                    real_name: args.get("real_name").cloned(),
                    admin: args
                        .get("admin")
                        .map(|raw| parse_bool("admin", raw))
                        .transpose()?,
                };
                let mut users = Vec::new();
                for user in ctx.store.users(&filter).await? {
                    users.push(user_json(ctx.store, user).await?);
                }
                Response::ok(&users)
            }
        }
    }

    async fn update(&self, ctx: &Ctx<'_>, id: Id, body: &Body) -> Result<Response, Error> {
        let mut user: User = gets_by_id(ctx, id, Permission::NotRequired).await?;
        let fields = UserField::parse(body)?;
        let before = user.clone();
        user.apply(&fields, ctx.hasher);

        if user.username != before.username {
            ensure_username_free(ctx.store, &user.username).await?;
        }
        let changed = user != before;
        if changed {
            ctx.store.commit(Mutation::UpdateUser(user.clone())).await?;
        }
        Ok(Response::ok(&user_json(ctx.store, user).await?)?.altered(changed))
    }

    async fn delete(&self, ctx: &Ctx<'_>, id: Id) -> Result<Response, Error> {
        if id == ctx.actor.id {
            return Err(Error::CannotSelfDelete);
        }
        let user: User = gets_by_id(ctx, id, Permission::NotRequired).await?;
        ctx.store.commit(Mutation::DeleteUser(user.id)).await?;
        tracing::info!(user = user.id, by = ctx.actor.id, "user deleted");
        Ok(Response::message(
            StatusCode::OK,
            format!("Deleted {}", user.username),
        ))
    }
}

async fn ensure_username_free(store: &dyn Store, username: &str) -> Result<(), Error> {
    match store::user_by_username(store, username).await? {
        Some(_) => Err(Error::UsernameTaken(username.to_string())),
        None => Ok(()),
    }
}

/// Creates an account from a `{username, password, real_name}` body. `admin` in the
/// body is only honoured when `allow_admin` is set.
pub async fn create_account(
    store: &dyn Store,
    hasher: &dyn PasswordHasher,
    body: &Body,
    allow_admin: bool,
) -> Result<User, Error> {
    needs_data(body, &["username", "password", "real_name"])?;
    let username = string_value("username", &body["username"])?;
    let password = string_value("password", &body["password"])?;
    let real_name = string_value("real_name", &body["real_name"])?;
    let admin = match body.get("admin") {
        Some(value) if allow_admin && !value.is_null() => bool_value("admin", value)?,
        _ => false,
    };
    ensure_username_free(store, &username).await?;

    let id = store
        .commit(Mutation::InsertUser(NewUser {
            username,
            password_hash: hasher.hash(&password),
            real_name,
            admin,
        }))
        .await?;
    store.user(id).await?.ok_or(Error::NotFound)
}
