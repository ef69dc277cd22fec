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

use std::convert::Infallible;

use warp::{Filter, Rejection};

use crate::{models::User, Error, State};

/// Upper bound on request bodies.
pub const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Rejects requests declaring a body over [`MAX_BODY_BYTES`]. Bodies stay optional.
pub fn body_limit() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(|len: Option<u64>| async move {
            match len {
                Some(len) if len > MAX_BODY_BYTES => {
                    Err(Rejection::from(Error::PayloadTooLarge))
                }
                _ => Ok(()),
            }
        })
        .untuple_one()
}

/// A required JSON body of at most [`MAX_BODY_BYTES`].
pub fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn with_state(state: State) -> impl Filter<Extract = (State,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Resolves the `Authorization: Bearer` header to the acting user.
pub fn authenticated(state: State) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(authenticate)
}

async fn authenticate(header: Option<String>, state: State) -> Result<User, Rejection> {
    let header = header.ok_or(Error::Unauthenticated)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(Error::Unauthenticated)?;
    let claims = state.sessions.authenticate(token)?;
    // The account may have been deleted since the token was issued.
    let user = state
        .store
        .user(claims.user_id)
        .await?
        .ok_or(Error::Unauthenticated)?;
    Ok(user)
}
