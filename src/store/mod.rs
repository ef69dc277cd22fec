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

//! The persistence collaborator.
//!
//! Reads go through typed lookups and filtered queries; every write is a single
//! [`Mutation`] handed to [`Store::commit`], which applies it atomically.

use async_trait::async_trait;

use crate::{
    models::{Card, CardFilter, Deck, DeckFilter, Id, NewCard, NewDeck, NewUser, User, UserFilter},
    Error,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One atomic write.
#[derive(Debug, Clone)]
pub enum Mutation {
    InsertUser(NewUser),
    UpdateUser(User),
    /// Deletes the user together with every deck and card they own.
    DeleteUser(Id),
    InsertDeck(NewDeck),
    /// Rewrites the deck row. With `cards`, the deck's membership becomes exactly that set.
    UpdateDeck { deck: Deck, cards: Option<Vec<Id>> },
    /// Deletes the deck; its cards stay with their owner, unassigned.
    DeleteDeck(Id),
    InsertCard(NewCard),
    UpdateCard(Card),
    DeleteCard(Id),
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn user(&self, id: Id) -> Result<Option<User>, Error>;

    async fn users(&self, filter: &UserFilter) -> Result<Vec<User>, Error>;

    async fn deck(&self, id: Id) -> Result<Option<Deck>, Error>;

    async fn decks(&self, filter: &DeckFilter) -> Result<Vec<Deck>, Error>;

    async fn card(&self, id: Id) -> Result<Option<Card>, Error>;

    async fn cards(&self, filter: &CardFilter) -> Result<Vec<Card>, Error>;

    /// Applies the mutation, returning the id of the row it created or touched.
    ///
    /// A duplicate username fails with [`Error::UsernameTaken`]; a reference to a
    /// missing row fails with [`Error::NotFound`]. Either way nothing is written.
    async fn commit(&self, mutation: Mutation) -> Result<Id, Error>;
}

/// Single-row lookup by id, generic over the entity kind.
#[async_trait]
pub trait Fetch: Sized + Send {
    async fn fetch(store: &dyn Store, id: Id) -> Result<Option<Self>, Error>;
}

#[async_trait]
impl Fetch for User {
    async fn fetch(store: &dyn Store, id: Id) -> Result<Option<Self>, Error> {
        store.user(id).await
    }
}

#[async_trait]
impl Fetch for Deck {
    async fn fetch(store: &dyn Store, id: Id) -> Result<Option<Self>, Error> {
        store.deck(id).await
    }
}

#[async_trait]
impl Fetch for Card {
    async fn fetch(store: &dyn Store, id: Id) -> Result<Option<Self>, Error> {
        store.card(id).await
    }
}

pub async fn user_by_username(store: &dyn Store, username: &str) -> Result<Option<User>, Error> {
    Ok(store
        .users(&UserFilter::username(username))
        .await?
        .into_iter()
        .next())
}
