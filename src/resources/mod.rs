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

//! Resource specializations: the per-kind creation rules, filters, and cross-entity
//! checks layered on the generic handler.

use futures::future::try_join_all;

use crate::{
    crud::{parse_id, Args, Ctx},
    models::{CardFilter, Deck, DeckFilter, DeckJson, Id, User, UserJson},
    store::Store,
    Error,
};

pub mod cards;
pub mod decks;
pub mod users;

pub use cards::Cards;
pub use decks::Decks;
pub use users::Users;

/// Query argument naming another tenant. Only honoured for admins.
const USER_ARG: &str = "user";

pub async fn deck_json(store: &dyn Store, deck: Deck) -> Result<DeckJson, Error> {
    let cards = store.cards(&CardFilter::in_deck(deck.id)).await?;
    Ok(DeckJson::new(deck, cards))
}

pub async fn deck_jsons(store: &dyn Store, decks: Vec<Deck>) -> Result<Vec<DeckJson>, Error> {
    try_join_all(decks.into_iter().map(|deck| deck_json(store, deck))).await
}

pub async fn user_json(store: &dyn Store, user: User) -> Result<UserJson, Error> {
    let decks = store.decks(&DeckFilter::owned_by(user.id)).await?;
    let decks = deck_jsons(store, decks).await?;
    let cards = store.cards(&CardFilter::owned_by(user.id)).await?;
    Ok(UserJson::new(user, decks, cards))
}

/// The owner of a new row: the actor, or for admins the user named in the query.
async fn owner_for(ctx: &Ctx<'_>, args: &Args) -> Result<Id, Error> {
    match args.get(USER_ARG) {
        Some(raw) if ctx.actor.admin => {
            let id = parse_id(raw)?;
            ctx.store.user(id).await?.ok_or(Error::NotFound)?;
            Ok(id)
        }
        _ => Ok(ctx.actor.id),
    }
}

/// The tenant a listing is confined to. Non-admins always see only their own rows.
fn scope(ctx: &Ctx<'_>, args: &Args) -> Result<Id, Error> {
    match args.get(USER_ARG) {
        Some(raw) if ctx.actor.admin => parse_id(raw),
        _ => Ok(ctx.actor.id),
    }
}

/// Checks every card exists and belongs to `owner`. Returns the ids sorted, without
/// duplicates.
async fn owned_cards(ctx: &Ctx<'_>, ids: &[Id], owner: Id) -> Result<Vec<Id>, Error> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    for id in &ids {
        let card = ctx.store.card(*id).await?.ok_or(Error::NotFound)?;
        if card.user_id != owner {
            return Err(Error::Forbidden);
        }
    }
    Ok(ids)
}
