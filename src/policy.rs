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

//! Who may touch what.
//!
//! Decks and cards are readable and writable by their owner and by admins. User
//! accounts have no owner: only admins reach them through the CRUD layer.

use crate::models::{Card, Deck, Id, User};

pub trait Owned {
    fn owner_id(&self) -> Option<Id>;
}

impl Owned for Deck {
    fn owner_id(&self) -> Option<Id> {
        Some(self.user_id)
    }
}

impl Owned for Card {
    fn owner_id(&self) -> Option<Id> {
        Some(self.user_id)
    }
}

impl Owned for User {
    fn owner_id(&self) -> Option<Id> {
        None
    }
}

pub fn can_access<E: Owned + ?Sized>(entity: &E, actor: &User) -> bool {
    actor.admin || entity.owner_id() == Some(actor.id)
}

pub fn can_manage_users(actor: &User) -> bool {
    actor.admin
}
