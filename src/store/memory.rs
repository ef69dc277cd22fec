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

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Mutation, Store};
use crate::{
    models::{Card, CardFilter, Deck, DeckFilter, Id, User, UserFilter},
    Error,
};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Id, User>,
    decks: BTreeMap<Id, Deck>,
    cards: BTreeMap<Id, Card>,
    last_user: Id,
    last_deck: Id,
    last_card: Id,
}

fn next_id(seq: &mut Id) -> Id {
    *seq += 1;
    *seq
}

impl Tables {
    fn username_taken(&self, username: &str, except: Option<Id>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn require_user(&self, id: Id) -> Result<(), Error> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    fn require_deck(&self, id: Id) -> Result<(), Error> {
        if self.decks.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    fn require_cards(&self, ids: &[Id]) -> Result<(), Error> {
        if ids.iter().all(|id| self.cards.contains_key(id)) {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    fn set_membership(&mut self, deck_id: Id, ids: &[Id]) {
        for card in self.cards.values_mut() {
            if ids.contains(&card.id) {
                card.deck_id = Some(deck_id);
            } else if card.deck_id == Some(deck_id) {
                card.deck_id = None;
            }
        }
    }

    /// Validates before writing so a failed mutation leaves the tables untouched.
    fn apply(&mut self, mutation: Mutation) -> Result<Id, Error> {
        match mutation {
            Mutation::InsertUser(new) => {
                if self.username_taken(&new.username, None) {
                    return Err(Error::UsernameTaken(new.username));
                }
                let id = next_id(&mut self.last_user);
                self.users.insert(
                    id,
                    User {
                        id,
                        username: new.username,
                        password_hash: new.password_hash,
                        real_name: new.real_name,
                        admin: new.admin,
                    },
                );
                Ok(id)
            }
            Mutation::UpdateUser(user) => {
                self.require_user(user.id)?;
                if self.username_taken(&user.username, Some(user.id)) {
                    return Err(Error::UsernameTaken(user.username));
                }
                let id = user.id;
                self.users.insert(id, user);
                Ok(id)
            }
            Mutation::DeleteUser(id) => {
                self.users.remove(&id).ok_or(Error::NotFound)?;
                self.decks.retain(|_, d| d.user_id != id);
                self.cards.retain(|_, c| c.user_id != id);
                Ok(id)
            }
            Mutation::InsertDeck(new) => {
                self.require_user(new.user_id)?;
                self.require_cards(&new.cards)?;
                let id = next_id(&mut self.last_deck);
                self.decks.insert(
                    id,
                    Deck {
                        id,
                        name: new.name,
                        user_id: new.user_id,
                    },
                );
                self.set_membership(id, &new.cards);
                Ok(id)
            }
            Mutation::UpdateDeck { deck, cards } => {
                self.require_deck(deck.id)?;
                if let Some(ids) = &cards {
                    self.require_cards(ids)?;
                }
                let id = deck.id;
                self.decks.insert(id, deck);
                if let Some(ids) = cards {
                    self.set_membership(id, &ids);
                }
                Ok(id)
            }
            Mutation::DeleteDeck(id) => {
                self.decks.remove(&id).ok_or(Error::NotFound)?;
                for card in self.cards.values_mut().filter(|c| c.deck_id == Some(id)) {
                    card.deck_id = None;
                }
                Ok(id)
            }
            Mutation::InsertCard(new) => {
                self.require_user(new.user_id)?;
                if let Some(deck_id) = new.deck_id {
                    self.require_deck(deck_id)?;
                }
                let id = next_id(&mut self.last_card);
                self.cards.insert(
                    id,
                    Card {
                        id,
                        power: new.power,
                        name: new.name,
                        description: new.description,
                        deck_id: new.deck_id,
                        user_id: new.user_id,
                    },
                );
                Ok(id)
            }
            Mutation::UpdateCard(card) => {
                if !self.cards.contains_key(&card.id) {
                    return Err(Error::NotFound);
                }
                if let Some(deck_id) = card.deck_id {
                    self.require_deck(deck_id)?;
                }
                let id = card.id;
                self.cards.insert(id, card);
                Ok(id)
            }
            Mutation::DeleteCard(id) => {
                self.cards.remove(&id).ok_or(Error::NotFound)?;
                Ok(id)
            }
        }
    }
}

/// In-process store. Rows are kept in id order, so queries return oldest first.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user(&self, id: Id) -> Result<Option<User>, Error> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn users(&self, filter: &UserFilter) -> Result<Vec<User>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect())
    }

    async fn deck(&self, id: Id) -> Result<Option<Deck>, Error> {
        Ok(self.tables.read().await.decks.get(&id).cloned())
    }

    async fn decks(&self, filter: &DeckFilter) -> Result<Vec<Deck>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .decks
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn card(&self, id: Id) -> Result<Option<Card>, Error> {
        Ok(self.tables.read().await.cards.get(&id).cloned())
    }

    async fn cards(&self, filter: &CardFilter) -> Result<Vec<Card>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .cards
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn commit(&self, mutation: Mutation) -> Result<Id, Error> {
        self.tables.write().await.apply(mutation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCard, NewDeck, NewUser};

    fn new_user(username: &str) -> Mutation {
        Mutation::InsertUser(NewUser {
            username: username.to_string(),
            password_hash: "x".to_string(),
            real_name: username.to_string(),
            admin: false,
        })
    }

    fn new_card(user_id: Id, deck_id: Option<Id>) -> Mutation {
        Mutation::InsertCard(NewCard {
            power: 3,
            name: "Roach".to_string(),
            description: String::new(),
            deck_id,
            user_id,
        })
    }

    #[tokio::test]
    async fn deleting_a_deck_unassigns_its_cards() {
        let store = MemoryStore::new();
        let user = store.commit(new_user("geralt")).await.unwrap();
        let card = store.commit(new_card(user, None)).await.unwrap();
        let deck = store
            .commit(Mutation::InsertDeck(NewDeck {
                name: "Aggro".to_string(),
                user_id: user,
                cards: vec![card],
            }))
            .await
            .unwrap();
        assert_eq!(store.card(card).await.unwrap().unwrap().deck_id, Some(deck));

        store.commit(Mutation::DeleteDeck(deck)).await.unwrap();
        let card = store.card(card).await.unwrap().expect("card survives");
        assert_eq!(card.deck_id, None);
    }

    #[tokio::test]
    async fn deleting_a_user_cascades() {
        let store = MemoryStore::new();
        let user = store.commit(new_user("geralt")).await.unwrap();
        let other = store.commit(new_user("yen")).await.unwrap();
        store.commit(new_card(user, None)).await.unwrap();
        let kept = store.commit(new_card(other, None)).await.unwrap();
        store
            .commit(Mutation::InsertDeck(NewDeck {
                name: "Aggro".to_string(),
                user_id: user,
                cards: vec![],
            }))
            .await
            .unwrap();

        store.commit(Mutation::DeleteUser(user)).await.unwrap();
        assert!(store.decks(&DeckFilter::default()).await.unwrap().is_empty());
        let cards = store.cards(&CardFilter::default()).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, kept);
    }

    #[tokio::test]
    async fn failed_mutation_writes_nothing() {
        let store = MemoryStore::new();
        let user = store.commit(new_user("geralt")).await.unwrap();
        let res = store
            .commit(Mutation::InsertDeck(NewDeck {
                name: "Aggro".to_string(),
                user_id: user,
                cards: vec![99],
            }))
            .await;
        assert!(matches!(res, Err(Error::NotFound)));
        assert!(store.decks(&DeckFilter::default()).await.unwrap().is_empty());

        let res = store.commit(new_user("geralt")).await;
        assert!(matches!(res, Err(Error::UsernameTaken(_))));
        assert_eq!(store.users(&UserFilter::default()).await.unwrap().len(), 1);
    }
}
