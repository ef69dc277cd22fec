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

use std::{convert::Infallible, sync::Arc};

use warp::{Filter, Reply};

pub mod auth;
pub mod config;
pub mod crud;
pub mod guard;
pub mod models;
pub mod patch;
pub mod policy;
pub mod resources;
pub mod response;
pub mod store;

mod error;
pub use error::{handle_rejects, Error};

use auth::{PasswordHasher, Sessions, Sha3Hasher};
use config::{AdminSeed, Config};
use crud::{Crud, Ctx, Verb};
use models::{NewUser, User};
use resources::{Cards, Decks, Users};
use store::{MemoryStore, Mutation, PgStore, Store};

/// The collaborators every request is served with.
#[derive(Clone)]
pub struct State {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<Sessions>,
    pub hasher: Arc<dyn PasswordHasher>,
}

impl State {
    pub fn new(store: Arc<dyn Store>, sessions: Sessions) -> Self {
        State {
            store,
            sessions: Arc::new(sessions),
            hasher: Arc::new(Sha3Hasher),
        }
    }

    pub fn ctx<'a>(&'a self, actor: &'a User) -> Ctx<'a> {
        Ctx {
            store: self.store.as_ref(),
            hasher: self.hasher.as_ref(),
            actor,
        }
    }
}

/// Builds the whole `/api` tree.
pub fn api(state: State) -> Result<impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone, Error> {
    let decks = crud::routes(Crud::new(Decks, &Verb::ALL)?, state.clone());
    let cards = crud::routes(Crud::new(Cards, &Verb::ALL)?, state.clone());
    let users = crud::routes(Crud::new(Users, &Verb::ALL)?, state.clone());

    let route = warp::path("api")
        .and(
            auth::api(state.clone())
                .or(resources::decks::management_routes(state.clone()))
                .unify()
                .or(resources::cards::management_routes(state))
                .unify()
                .or(decks)
                .unify()
                .or(cards)
                .unify()
                .or(users)
                .unify(),
        )
        .with(warp::trace::request())
        .recover(handle_rejects);
    Ok(route)
}

/// Picks postgres when a database URL is configured, memory otherwise.
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>, Error> {
    match &config.database_url {
        Some(url) => Ok(Arc::new(PgStore::connect(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Ok(MemoryStore::new_shared())
        }
    }
}

/// Creates the seeded admin unless an account with that username exists.
pub async fn seed_admin(state: &State, seed: &AdminSeed) -> Result<(), Error> {
    if store::user_by_username(state.store.as_ref(), &seed.username)
        .await?
        .is_some()
    {
        return Ok(());
    }
    let id = state
        .store
        .commit(Mutation::InsertUser(NewUser {
            username: seed.username.clone(),
            password_hash: state.hasher.hash(&seed.password),
            real_name: seed.real_name.clone(),
            admin: true,
        }))
        .await?;
    tracing::info!(user = id, username = %seed.username, "seeded admin account");
    Ok(())
}
