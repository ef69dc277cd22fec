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

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use mobc::Connection;
use mobc_postgres::{
    tokio_postgres::{row::Row, Config, NoTls},
    PgConnectionManager,
};

use super::{Mutation, Store};
use crate::{
    models::{Card, CardFilter, Deck, DeckFilter, Id, User, UserFilter},
    Error,
};

pub type Conn = Connection<PgConnectionManager<NoTls>>;
pub type Pool = mobc::Pool<PgConnectionManager<NoTls>>;

const DB_POOL_MAX_OPEN: u64 = 32;
const DB_POOL_MAX_IDLE: u64 = 8;
const DB_POOL_TIMEOUT_SECONDS: u64 = 15;

const USER_COLUMNS: &str = "id, username, password_hash, real_name, admin";
const DECK_COLUMNS: &str = "id, name, user_id";
const CARD_COLUMNS: &str = "id, power, name, description, deck_id, user_id";

pub fn create_pool(db_url: &str) -> Result<Pool, Error> {
    let config = Config::from_str(db_url)?;

    let manager = PgConnectionManager::new(config, NoTls);
    Ok(mobc::Pool::builder()
        .max_open(DB_POOL_MAX_OPEN)
        .max_idle(DB_POOL_MAX_IDLE)
        .get_timeout(Some(Duration::from_secs(DB_POOL_TIMEOUT_SECONDS)))
        .build(manager))
}

pub async fn get_db_conn(db_pool: &Pool) -> Result<Conn, Error> {
    Ok(db_pool.get().await?)
}

impl<'a> From<&'a Row> for User {
    fn from(item: &'a Row) -> Self {
        User {
            id: item.get("id"),
            username: item.get("username"),
            password_hash: item.get("password_hash"),
            real_name: item.get("real_name"),
            admin: item.get("admin"),
        }
    }
}

impl<'a> From<&'a Row> for Deck {
    fn from(item: &'a Row) -> Self {
        Deck {
            id: item.get("id"),
            name: item.get("name"),
            user_id: item.get("user_id"),
        }
    }
}

impl<'a> From<&'a Row> for Card {
    fn from(item: &'a Row) -> Self {
        Card {
            id: item.get("id"),
            power: item.get("power"),
            name: item.get("name"),
            description: item.get("description"),
            deck_id: item.get("deck_id"),
            user_id: item.get("user_id"),
        }
    }
}

fn expect_rows(affected: u64, expected: usize) -> Result<(), Error> {
    if affected as usize == expected {
        Ok(())
    } else {
        Err(Error::NotFound)
    }
}

/// Postgres-backed store. Foreign keys carry the cascade rules: deleting a user
/// deletes their decks and cards, deleting a deck nulls `cards.deck_id`.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        PgStore { pool }
    }

    /// Opens a pool on `db_url` and creates the schema if it is missing.
    pub async fn connect(db_url: &str) -> Result<Self, Error> {
        let store = PgStore::new(create_pool(db_url)?);
        store.init_db().await?;
        Ok(store)
    }

    pub async fn init_db(&self) -> Result<(), Error> {
        let init_sql = include_str!("init.sql");
        let conn = get_db_conn(&self.pool).await?;
        conn.batch_execute(init_sql).await.map_err(Error::DBError)?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn user(&self, id: Id) -> Result<Option<User>, Error> {
        let conn = get_db_conn(&self.pool).await?;
        let row = conn
            .query_opt(
                format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS).as_str(),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(User::from))
    }

    async fn users(&self, filter: &UserFilter) -> Result<Vec<User>, Error> {
        let conn = get_db_conn(&self.pool).await?;
        let rows = conn
            .query(
                format!(
                    r#"
                    SELECT {} FROM users
                    WHERE ($1::INT IS NULL OR id = $1)
                        AND ($2::TEXT IS NULL OR username = $2)
                        AND ($3::TEXT IS NULL OR real_name = $3)
                        AND ($4::BOOLEAN IS NULL OR admin = $4)
                    ORDER BY id
                    "#,
                    USER_COLUMNS
                )
                .as_str(),
                &[&filter.id, &filter.username, &filter.real_name, &filter.admin],
            )
            .await?;
        Ok(rows.iter().map(User::from).collect())
    }

    async fn deck(&self, id: Id) -> Result<Option<Deck>, Error> {
        let conn = get_db_conn(&self.pool).await?;
        let row = conn
            .query_opt(
                format!("SELECT {} FROM decks WHERE id = $1", DECK_COLUMNS).as_str(),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(Deck::from))
    }

    async fn decks(&self, filter: &DeckFilter) -> Result<Vec<Deck>, Error> {
        let conn = get_db_conn(&self.pool).await?;
        let rows = conn
            .query(
                format!(
                    r#"
                    SELECT {} FROM decks
                    WHERE ($1::INT IS NULL OR user_id = $1)
                        AND ($2::TEXT IS NULL OR strpos(name, $2) > 0)
                    ORDER BY id
                    "#,
                    DECK_COLUMNS
                )
                .as_str(),
                &[&filter.user_id, &filter.name],
            )
            .await?;
        Ok(rows.iter().map(Deck::from).collect())
    }

    async fn card(&self, id: Id) -> Result<Option<Card>, Error> {
        let conn = get_db_conn(&self.pool).await?;
        let row = conn
            .query_opt(
                format!("SELECT {} FROM cards WHERE id = $1", CARD_COLUMNS).as_str(),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(Card::from))
    }

    async fn cards(&self, filter: &CardFilter) -> Result<Vec<Card>, Error> {
        let conn = get_db_conn(&self.pool).await?;
        let rows = conn
            .query(
                format!(
                    r#"
                    SELECT {} FROM cards
                    WHERE ($1::INT IS NULL OR user_id = $1)
                        AND ($2::INT IS NULL OR deck_id = $2)
                        AND ($3::TEXT IS NULL OR strpos(name, $3) > 0)
                        AND ($4::TEXT IS NULL OR strpos(description, $4) > 0)
                        AND ($5::INT IS NULL OR power = $5)
                    ORDER BY id
                    "#,
                    CARD_COLUMNS
                )
                .as_str(),
                &[
                    &filter.user_id,
                    &filter.deck_id,
                    &filter.name,
                    &filter.description,
                    &filter.power,
                ],
            )
            .await?;
        Ok(rows.iter().map(Card::from).collect())
    }

    async fn commit(&self, mutation: Mutation) -> Result<Id, Error> {
        let mut conn = get_db_conn(&self.pool).await?;
        match mutation {
            Mutation::InsertUser(new) => {
                let row = conn
                    .query_one(
                        r#"
                        INSERT INTO users (username, password_hash, real_name, admin)
                        VALUES ($1, $2, $3, $4)
                        RETURNING id
                        "#,
                        &[&new.username, &new.password_hash, &new.real_name, &new.admin],
                    )
                    .await
                    .map_err(|e| Error::from_db(e, Some(new.username.as_str())))?;
                Ok(row.get("id"))
            }
            Mutation::UpdateUser(user) => {
                let n = conn
                    .execute(
                        r#"
                        UPDATE users
                        SET username = $1, password_hash = $2, real_name = $3, admin = $4
                        WHERE id = $5
                        "#,
                        &[
                            &user.username,
                            &user.password_hash,
                            &user.real_name,
                            &user.admin,
                            &user.id,
                        ],
                    )
                    .await
                    .map_err(|e| Error::from_db(e, Some(user.username.as_str())))?;
                expect_rows(n, 1)?;
                Ok(user.id)
            }
            Mutation::DeleteUser(id) => {
                let n = conn
                    .execute("DELETE FROM users WHERE id = $1", &[&id])
                    .await?;
                expect_rows(n, 1)?;
                Ok(id)
            }
            Mutation::InsertDeck(new) => {
                let tx = conn.transaction().await?;
                let row = tx
                    .query_one(
                        "INSERT INTO decks (name, user_id) VALUES ($1, $2) RETURNING id",
                        &[&new.name, &new.user_id],
                    )
                    .await
                    .map_err(|e| Error::from_db(e, None))?;
                let id: Id = row.get("id");
                if !new.cards.is_empty() {
                    let n = tx
                        .execute(
                            "UPDATE cards SET deck_id = $1 WHERE id = ANY($2)",
                            &[&id, &new.cards],
                        )
                        .await?;
                    expect_rows(n, new.cards.len())?;
                }
                tx.commit().await?;
                Ok(id)
            }
            Mutation::UpdateDeck { deck, cards } => {
                let tx = conn.transaction().await?;
                let n = tx
                    .execute(
                        "UPDATE decks SET name = $1 WHERE id = $2",
                        &[&deck.name, &deck.id],
                    )
                    .await?;
                expect_rows(n, 1)?;
                if let Some(ids) = cards {
                    tx.execute(
                        "UPDATE cards SET deck_id = NULL WHERE deck_id = $1 AND NOT (id = ANY($2))",
                        &[&deck.id, &ids],
                    )
                    .await?;
                    let n = tx
                        .execute(
                            "UPDATE cards SET deck_id = $1 WHERE id = ANY($2)",
                            &[&deck.id, &ids],
                        )
                        .await?;
                    expect_rows(n, ids.len())?;
                }
                tx.commit().await?;
                Ok(deck.id)
            }
            Mutation::DeleteDeck(id) => {
                let n = conn
                    .execute("DELETE FROM decks WHERE id = $1", &[&id])
                    .await?;
                expect_rows(n, 1)?;
                Ok(id)
            }
            Mutation::InsertCard(new) => {
                let row = conn
                    .query_one(
                        r#"
                        INSERT INTO cards (power, name, description, deck_id, user_id)
                        VALUES ($1, $2, $3, $4, $5)
                        RETURNING id
                        "#,
                        &[
                            &new.power,
                            &new.name,
                            &new.description,
                            &new.deck_id,
                            &new.user_id,
                        ],
                    )
                    .await
                    .map_err(|e| Error::from_db(e, None))?;
                Ok(row.get("id"))
            }
            Mutation::UpdateCard(card) => {
                let n = conn
                    .execute(
                        r#"
                        UPDATE cards
                        SET power = $1, name = $2, description = $3, deck_id = $4
                        WHERE id = $5
                        "#,
                        &[
                            &card.power,
                            &card.name,
                            &card.description,
                            &card.deck_id,
                            &card.id,
                        ],
                    )
                    .await
                    .map_err(|e| Error::from_db(e, None))?;
                expect_rows(n, 1)?;
                Ok(card.id)
            }
            Mutation::DeleteCard(id) => {
                let n = conn
                    .execute("DELETE FROM cards WHERE id = $1", &[&id])
                    .await?;
                expect_rows(n, 1)?;
                Ok(id)
            }
        }
    }
}
