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

//! Partial updates.
//!
//! A PUT body is read into a list of typed fields, one enum per entity kind, and
//! applied in place. Keys that do not name an updatable field are ignored. Ids and
//! ownership are not updatable.

use std::convert::TryFrom;

use serde_json::Value;

use crate::{
    auth::PasswordHasher,
    crud::{parse_id, Body},
    models::{Card, Deck, Id, User},
    Error,
};

pub fn string_value(key: &str, value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(Error::InvalidField(key.to_string())),
    }
}

pub fn bool_value(key: &str, value: &Value) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => parse_bool(key, s),
        _ => Err(Error::InvalidField(key.to_string())),
    }
}

pub fn parse_bool(key: &str, raw: &str) -> Result<bool, Error> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(Error::InvalidField(key.to_string())),
    }
}

/// Power accepts integers and strings holding one.
pub fn power_value(value: &Value) -> Result<i32, Error> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|p| i32::try_from(p).ok())
            .ok_or(Error::InvalidPower),
        Value::String(s) => parse_power(s),
        _ => Err(Error::InvalidPower),
    }
}

pub fn parse_power(raw: &str) -> Result<i32, Error> {
    raw.trim().parse().map_err(|_| Error::InvalidPower)
}

pub fn id_value(value: &Value) -> Result<Id, Error> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|id| Id::try_from(id).ok())
            .filter(|id| *id > 0)
            .ok_or(Error::InvalidId),
        Value::String(s) => parse_id(s),
        _ => Err(Error::InvalidId),
    }
}

pub fn id_list(key: &str, value: &Value) -> Result<Vec<Id>, Error> {
    match value {
        Value::Array(items) => items.iter().map(id_value).collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(Error::InvalidField(key.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardField {
    Power(i32),
    Name(String),
    Description(String),
    /// `None` takes the card out of its deck.
    DeckId(Option<Id>),
}

impl CardField {
    pub fn parse(body: &Body) -> Result<Vec<CardField>, Error> {
        let mut fields = Vec::new();
        for (key, value) in body {
            fields.push(match key.as_str() {
                "power" => CardField::Power(power_value(value)?),
                "name" => CardField::Name(string_value(key, value)?),
                "description" => CardField::Description(string_value(key, value)?),
                "deck_id" if value.is_null() => CardField::DeckId(None),
                "deck_id" => CardField::DeckId(Some(id_value(value)?)),
                _ => continue,
            });
        }
        Ok(fields)
    }

    /// The deck a patch moves the card into, if any.
    pub fn target_deck(fields: &[CardField]) -> Option<Id> {
        fields.iter().find_map(|f| match f {
            CardField::DeckId(deck) => *deck,
            _ => None,
        })
    }
}

impl Card {
    pub fn apply(&mut self, fields: &[CardField]) {
        for field in fields {
            match field {
                CardField::Power(power) => self.power = *power,
                CardField::Name(name) => self.name = name.clone(),
                CardField::Description(description) => self.description = description.clone(),
                CardField::DeckId(deck_id) => self.deck_id = *deck_id,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckField {
    Name(String),
    /// The complete new membership of the deck.
    Cards(Vec<Id>),
}

impl DeckField {
    pub fn parse(body: &Body) -> Result<Vec<DeckField>, Error> {
        let mut fields = Vec::new();
        for (key, value) in body {
            fields.push(match key.as_str() {
                "name" => DeckField::Name(string_value(key, value)?),
                "cards" if value.is_null() => continue,
                "cards" => DeckField::Cards(id_list(key, value)?),
                _ => continue,
            });
        }
        Ok(fields)
    }
}

impl Deck {
    /// Applies the row fields and hands back the requested membership, which lives
    /// on the cards rather than on the deck.
    pub fn apply(&mut self, fields: &[DeckField]) -> Option<Vec<Id>> {
        let mut cards = None;
        for field in fields {
            match field {
                DeckField::Name(name) => self.name = name.clone(),
                DeckField::Cards(ids) => cards = Some(ids.clone()),
            }
        }
        cards
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserField {
    Username(String),
    /// Plaintext; hashed on apply.
    Password(String),
    RealName(String),
    Admin(bool),
}

impl UserField {
    pub fn parse(body: &Body) -> Result<Vec<UserField>, Error> {
        let mut fields = Vec::new();
        for (key, value) in body {
            fields.push(match key.as_str() {
                "username" => UserField::Username(string_value(key, value)?),
                "password" => UserField::Password(string_value(key, value)?),
                "real_name" => UserField::RealName(string_value(key, value)?),
                "admin" => UserField::Admin(bool_value(key, value)?),
                _ => continue,
            });
        }
        Ok(fields)
    }
}

impl User {
    /// A password equal to the current one keeps the stored digest, so repeating a
    /// patch is not reported as a change.
    pub fn apply(&mut self, fields: &[UserField], hasher: &dyn PasswordHasher) {
        for field in fields {
            match field {
                UserField::Username(username) => self.username = username.clone(),
                UserField::Password(password) => {
                    if !hasher.verify(password, &self.password_hash) {
                        self.password_hash = hasher.hash(password);
                    }
                }
                UserField::RealName(real_name) => self.real_name = real_name.clone(),
                UserField::Admin(admin) => self.admin = *admin,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::auth::Sha3Hasher;

    fn body(value: Value) -> Body {
        value.as_object().cloned().unwrap()
    }

    fn card() -> Card {
        Card {
            id: 1,
            power: 9,
            name: "Geralt".to_string(),
            description: String::new(),
            deck_id: Some(2),
            user_id: 3,
        }
    }

    #[test]
    fn unknown_and_fixed_keys_are_ignored() {
        let fields =
            CardField::parse(&body(json!({"id": 40, "user_id": 8, "colour": "red"}))).unwrap();
        assert!(fields.is_empty());
    }

    #[test]
    fn card_patch_applies_in_place() {
        let fields = CardField::parse(&body(
            json!({"power": "12", "description": "Witcher", "deck_id": null}),
        ))
        .unwrap();
        let mut c = card();
        c.apply(&fields);
        assert_eq!(c.power, 12);
        assert_eq!(c.description, "Witcher");
        assert_eq!(c.deck_id, None);
        assert_eq!(c.user_id, 3);
        assert_eq!(CardField::target_deck(&fields), None);
    }

    #[test]
    fn power_must_be_an_integer() {
        for bad in &[json!("not-a-number"), json!(1.5), json!(true), json!(null)] {
            assert!(matches!(power_value(bad), Err(Error::InvalidPower)));
        }
        assert_eq!(power_value(&json!(-4)).unwrap(), -4);
        assert!(matches!(
            CardField::parse(&body(json!({"power": "x"}))),
            Err(Error::InvalidPower)
        ));
    }

    #[test]
    fn deck_patch_returns_membership() {
        let mut deck = Deck {
            id: 2,
            name: "Aggro".to_string(),
            user_id: 3,
        };
        let fields = DeckField::parse(&body(json!({"name": "Control", "cards": [1, "4"]}))).unwrap();
        assert_eq!(deck.apply(&fields), Some(vec![1, 4]));
        assert_eq!(deck.name, "Control");
        assert!(matches!(
            DeckField::parse(&body(json!({"cards": [0]}))),
            Err(Error::InvalidId)
        ));
        assert!(matches!(
            DeckField::parse(&body(json!({"cards": "1"}))),
            Err(Error::InvalidField(_))
        ));
    }

    #[test]
    fn null_cards_leave_membership_alone() {
        let fields = DeckField::parse(&body(json!({"cards": null}))).unwrap();
        assert!(fields.is_empty());
        let fields = DeckField::parse(&body(json!({"cards": []}))).unwrap();
        assert_eq!(fields, vec![DeckField::Cards(vec![])]);
    }

    #[test]
    fn same_password_keeps_digest() {
        let hasher = Sha3Hasher;
        let mut user = User {
            id: 1,
            username: "ciri".to_string(),
            password_hash: hasher.hash("swallow"),
            real_name: "Cirilla".to_string(),
            admin: false,
        };
        let before = user.clone();
        user.apply(&[UserField::Password("swallow".to_string())], &hasher);
        assert_eq!(user, before);
        user.apply(&[UserField::Password("zireael".to_string())], &hasher);
        assert_ne!(user.password_hash, before.password_hash);
        assert!(hasher.verify("zireael", &user.password_hash));
    }
}
