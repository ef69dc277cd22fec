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

use serde::{Deserialize, Serialize};

/// Row identifier shared by every table.
pub type Id = i32;

/// A stored account. The digest never leaves the process; see [`UserJson`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub password_hash: String,
    pub real_name: String,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: Id,
    pub name: String,
    pub user_id: Id,
}

/// A card owned by `user_id`, optionally placed in a deck of the same owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: Id,
    pub power: i32,
    pub name: String,
    pub description: String,
    pub deck_id: Option<Id>,
    pub user_id: Id,
}

/// The insertion type of a new user entry.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub real_name: String,
    pub admin: bool,
}

/// The insertion type of a new deck. `cards` are moved into the deck on insert.
#[derive(Debug, Clone)]
pub struct NewDeck {
    pub name: String,
    pub user_id: Id,
    pub cards: Vec<Id>,
}

#[derive(Debug, Clone)]
pub struct NewCard {
    pub power: i32,
    pub name: String,
    pub description: String,
    pub deck_id: Option<Id>,
    pub user_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckJson {
    pub id: Id,
    pub name: String,
    pub cards: Vec<Card>,
    pub user_id: Id,
}

impl DeckJson {
    pub fn new(deck: Deck, cards: Vec<Card>) -> Self {
        DeckJson {
            id: deck.id,
            name: deck.name,
            cards,
            user_id: deck.user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJson {
    pub id: Id,
    pub username: String,
    pub real_name: String,
    pub decks: Vec<DeckJson>,
    pub cards: Vec<Card>,
    pub admin: bool,
}

impl UserJson {
    pub fn new(user: User, decks: Vec<DeckJson>, cards: Vec<Card>) -> Self {
        UserJson {
            id: user.id,
            username: user.username,
            real_name: user.real_name,
            decks,
            cards,
            admin: user.admin,
        }
    }
}

/// Exact-match user lookup. `None` fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub id: Option<Id>,
    pub username: Option<String>,
    pub real_name: Option<String>,
    pub admin: Option<bool>,
}

impl UserFilter {
    pub fn username<S: Into<String>>(username: S) -> Self {
        UserFilter {
            username: Some(username.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        self.id.map_or(true, |id| user.id == id)
            && self.username.as_ref().map_or(true, |u| &user.username == u)
            && self.real_name.as_ref().map_or(true, |n| &user.real_name == n)
            && self.admin.map_or(true, |a| user.admin == a)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeckFilter {
    pub user_id: Option<Id>,
    /// Substring of the deck name.
    pub name: Option<String>,
}

impl DeckFilter {
    pub fn owned_by(user_id: Id) -> Self {
        DeckFilter {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, deck: &Deck) -> bool {
        self.user_id.map_or(true, |id| deck.user_id == id)
            && self.name.as_ref().map_or(true, |n| deck.name.contains(n.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFilter {
    pub user_id: Option<Id>,
    pub deck_id: Option<Id>,
    /// Substring of the card name.
    pub name: Option<String>,
    /// Substring of the card description.
    pub description: Option<String>,
    pub power: Option<i32>,
}

impl CardFilter {
    pub fn owned_by(user_id: Id) -> Self {
        CardFilter {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn in_deck(deck_id: Id) -> Self {
        CardFilter {
            deck_id: Some(deck_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, card: &Card) -> bool {
        self.user_id.map_or(true, |id| card.user_id == id)
            && self.deck_id.map_or(true, |id| card.deck_id == Some(id))
            && self.name.as_ref().map_or(true, |n| card.name.contains(n.as_str()))
            && self
                .description
                .as_ref()
                .map_or(true, |d| card.description.contains(d.as_str()))
            && self.power.map_or(true, |p| card.power == p)
    }
}
