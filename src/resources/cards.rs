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

use super::{owner_for, scope};
use crate::{
    crud::{gets_by_id, needs_data, parse_id, Args, Body, Ctx, Permission, Resource, Verb},
    guard,
    models::{Card, CardFilter, Deck, Id, NewCard, User},
    patch::{parse_power, power_value, string_value, CardField},
    policy,
    response::Response,
    store::Mutation,
    Error, State,
};

pub struct Cards;

#[async_trait]
impl Resource for Cards {
    const NAME: &'static str = "cards";
    const METHODS: &'static [Verb] = &Verb::ALL;

    async fn create(&self, ctx: &Ctx<'_>, body: &Body, args: &Args) -> Result<Response, Error> {
        let user_id = owner_for(ctx, args).await?;
        let card = insert_card(ctx, body, user_id, None).await?;
        Response::created(&card)
    }

    async fn read(&self, ctx: &Ctx<'_>, id: Option<Id>, args: &Args) -> Result<Response, Error> {
        match id {
            Some(id) => {
                let card: Card = gets_by_id(ctx, id, Permission::Required).await?;
                Response::ok(&card)
            }
            None => {
                let filter = CardFilter {
                    user_id: Some(scope(ctx, args)?),
                    deck_id: args.get("deck_id").map(|raw| parse_id(raw)).transpose()?,
                    name: args.get("name").cloned(),
                    description: args.get("description").cloned(),
                    power: args.get("power").map(|raw| parse_power(raw)).transpose()?,
                };
                Response::ok(&ctx.store.cards(&filter).await?)
            }
        }
    }

    async fn update(&self, ctx: &Ctx<'_>, id: Id, body: &Body) -> Result<Response, Error> {
        let mut card: Card = gets_by_id(ctx, id, Permission::Required).await?;
        let fields = CardField::parse(body)?;
        if let Some(deck_id) = CardField::target_deck(&fields) {
            check_target_deck(ctx, &card, deck_id).await?;
        }

        let before = card.clone();
        card.apply(&fields);
        let changed = card != before;
        if changed {
            ctx.store.commit(Mutation::UpdateCard(card.clone())).await?;
        }
        Ok(Response::ok(&card)?.altered(changed))
    }

    async fn delete(&self, ctx: &Ctx<'_>, id: Id) -> Result<Response, Error> {
        let card: Card = gets_by_id(ctx, id, Permission::Required).await?;
        ctx.store.commit(Mutation::DeleteCard(card.id)).await?;
        tracing::info!(card = card.id, "card deleted");
        Ok(Response::message(
            StatusCode::OK,
            format!("Deleted {}", card.name),
        ))
    }
}

/// A card may only move into a deck the actor can reach and its owner owns.
async fn check_target_deck(ctx: &Ctx<'_>, card: &Card, deck_id: Id) -> Result<(), Error> {
    let deck: Deck = ctx.store.deck(deck_id).await?.ok_or(Error::NotFound)?;
    if !policy::can_access(&deck, ctx.actor) || deck.user_id != card.user_id {
        return Err(Error::Forbidden);
    }
    Ok(())
}

/// Validates a card body and stores it for `user_id`.
pub(crate) async fn insert_card(
    ctx: &Ctx<'_>,
    body: &Body,
    user_id: Id,
    deck_id: Option<Id>,
) -> Result<Card, Error> {
    needs_data(body, &["name", "power"])?;
    let name = string_value("name", &body["name"])?;
    let power = power_value(&body["power"])?;
    let description = match body.get("description") {
        Some(value) if !value.is_null() => string_value("description", value)?,
        _ => String::new(),
    };

    let id = ctx
        .store
        .commit(Mutation::InsertCard(NewCard {
            power,
            name,
            description,
            deck_id,
            user_id,
        }))
        .await?;
    tracing::info!(card = id, owner = user_id, "card created");
    ctx.store.card(id).await?.ok_or(Error::NotFound)
}

/// Takes a card out of its deck.
pub async fn isolate(ctx: &Ctx<'_>, id: Id) -> Result<Response, Error> {
    let mut card: Card = gets_by_id(ctx, id, Permission::Required).await?;
    let changed = card.deck_id.is_some();
    if changed {
        card.deck_id = None;
        ctx.store.commit(Mutation::UpdateCard(card.clone())).await?;
    }
    Ok(Response::ok(&card)?.altered(changed))
}

/// `PUT /cards/{id}/isolate`.
pub fn management_routes(
    state: State,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("cards" / String / "isolate")
        .and(warp::put())
        .and(guard::authenticated(state.clone()))
        .and(guard::with_state(state))
        .and_then(|id: String, actor: User, state: State| async move {
            let ctx = state.ctx(&actor);
            isolate(&ctx, parse_id(&id)?).await.map_err(Rejection::from)
        })
}
