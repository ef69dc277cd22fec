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
use warp::{http::StatusCode, Filter, Rejection};

use super::{cards, deck_json, deck_jsons, owned_cards, owner_for, scope};
use crate::{
    crud::{gets_by_id, needs_data, parse_id, Args, Body, Ctx, Permission, Resource, Verb},
    guard,
    models::{Card, CardFilter, Deck, DeckFilter, Id, NewDeck, User},
    patch::{id_list, string_value, DeckField},
    response::Response,
    store::Mutation,
    Error, State,
};

pub struct Decks;

#[async_trait]
impl Resource for Decks {
    const NAME: &'static str = "decks";
    const METHODS: &'static [Verb] = &Verb::ALL;

    async fn create(&self, ctx: &Ctx<'_>, body: &Body, args: &Args) -> Result<Response, Error> {
        needs_data(body, &["name"])?;
        let name = string_value("name", &body["name"])?;
        let cards = match body.get("cards") {
            Some(value) => id_list("cards", value)?,
            None => Vec::new(),
        };
        let user_id = owner_for(ctx, args).await?;
        let cards = owned_cards(ctx, &cards, user_id).await?;

        let id = ctx
            .store
            .commit(Mutation::InsertDeck(NewDeck {
                name,
                user_id,
                cards,
            }))
            .await?;
        let deck = ctx.store.deck(id).await?.ok_or(Error::NotFound)?;
        tracing::info!(deck = id, owner = user_id, "deck created");
        Response::created(&deck_json(ctx.store, deck).await?)
    }

    async fn read(&self, ctx: &Ctx<'_>, id: Option<Id>, args: &Args) -> Result<Response, Error> {
        match id {
            Some(id) => {
                let deck: Deck = gets_by_id(ctx, id, Permission::Required).await?;
                Response::ok(&deck_json(ctx.store, deck).await?)
            }
            None => {
                let filter = DeckFilter {
                    user_id: Some(scope(ctx, args)?),
                    name: args.get("name").cloned(),
                };
                let decks = ctx.store.decks(&filter).await?;
                Response::ok(&deck_jsons(ctx.store, decks).await?)
            }
        }
    }

    async fn update(&self, ctx: &Ctx<'_>, id: Id, body: &Body) -> Result<Response, Error> {
        let mut deck: Deck = gets_by_id(ctx, id, Permission::Required).await?;
        let fields = DeckField::parse(body)?;
        let before = deck.clone();
        let cards = match deck.apply(&fields) {
            Some(ids) => Some(owned_cards(ctx, &ids, deck.user_id).await?),
            None => None,
        };
        let membership_changed = match &cards {
            Some(ids) => *ids != member_ids(ctx, deck.id).await?,
            None => false,
        };

        let changed = deck != before || membership_changed;
        if changed {
            ctx.store
                .commit(Mutation::UpdateDeck {
                    deck: deck.clone(),
                    cards,
                })
                .await?;
        }
        Ok(Response::ok(&deck_json(ctx.store, deck).await?)?.altered(changed))
    }

    async fn delete(&self, ctx: &Ctx<'_>, id: Id) -> Result<Response, Error> {
        let deck: Deck = gets_by_id(ctx, id, Permission::Required).await?;
        ctx.store.commit(Mutation::DeleteDeck(deck.id)).await?;
        tracing::info!(deck = deck.id, "deck deleted");
        Ok(Response::message(
            StatusCode::OK,
            format!("Deleted {}", deck.name),
        ))
    }
}

async fn member_ids(ctx: &Ctx<'_>, deck_id: Id) -> Result<Vec<Id>, Error> {
    let mut ids: Vec<Id> = ctx
        .store
        .cards(&CardFilter::in_deck(deck_id))
        .await?
        .iter()
        .map(|c| c.id)
        .collect();
    ids.sort_unstable();
    Ok(ids)
}

/// Places an existing card in a deck of the same owner.
pub async fn add_card(ctx: &Ctx<'_>, deck_id: Id, card_id: Id) -> Result<Response, Error> {
    let deck: Deck = gets_by_id(ctx, deck_id, Permission::Required).await?;
    let mut card: Card = gets_by_id(ctx, card_id, Permission::Required).await?;
    if card.user_id != deck.user_id {
        return Err(Error::Forbidden);
    }

    let changed = card.deck_id != Some(deck.id);
    if changed {
        card.deck_id = Some(deck.id);
        ctx.store.commit(Mutation::UpdateCard(card)).await?;
    }
    Ok(Response::ok(&deck_json(ctx.store, deck).await?)?.altered(changed))
}

/// Creates a card for the deck's owner directly inside the deck.
pub async fn add_new_card(ctx: &Ctx<'_>, deck_id: Id, body: &Body) -> Result<Response, Error> {
    let deck: Deck = gets_by_id(ctx, deck_id, Permission::Required).await?;
    let card = cards::insert_card(ctx, body, deck.user_id, Some(deck.id)).await?;
    Response::created(&card)
}

/// `POST /decks/{id}/cards/{card_id}` and `POST /decks/{id}/cards`.
pub fn management_routes(
    state: State,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let existing = warp::path!("decks" / String / "cards" / String)
        .and(warp::post())
        .and(guard::authenticated(state.clone()))
        .and(guard::with_state(state.clone()))
        .and_then(
            |deck_id: String, card_id: String, actor: User, state: State| async move {
                let ctx = state.ctx(&actor);
                add_card(&ctx, parse_id(&deck_id)?, parse_id(&card_id)?)
                    .await
                    .map_err(Rejection::from)
            },
        );

    let new = warp::path!("decks" / String / "cards")
        .and(warp::post())
        .and(guard::authenticated(state.clone()))
        .and(guard::json_body())
        .and(guard::with_state(state))
        .and_then(
            |deck_id: String, actor: User, body: Body, state: State| async move {
                let ctx = state.ctx(&actor);
                add_new_card(&ctx, parse_id(&deck_id)?, &body)
                    .await
                    .map_err(Rejection::from)
            },
        );

    existing.or(new).unify()
}
