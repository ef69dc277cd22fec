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
use serde_json::Value;
use warp::{http::StatusCode, reply, Reply};

use crate::Error;

/// Informational message for an update that left the entity as it was.
pub const NO_ALTERATIONS: &str = "No alterations";

/// The uniform body of every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    pub data: Option<T>,
    pub message: Option<String>,
}

/// An envelope paired with the status it is sent with.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub envelope: Envelope,
}

impl Response {
    pub fn with_data<T: Serialize>(status: StatusCode, data: &T) -> Result<Response, Error> {
        Ok(Response {
            status,
            envelope: Envelope {
                data: Some(serde_json::to_value(data)?),
                message: None,
            },
        })
    }

    pub fn ok<T: Serialize>(data: &T) -> Result<Response, Error> {
        Response::with_data(StatusCode::OK, data)
    }

    pub fn created<T: Serialize>(data: &T) -> Result<Response, Error> {
        Response::with_data(StatusCode::CREATED, data)
    }

    pub fn message<S: Into<String>>(status: StatusCode, message: S) -> Response {
        Response {
            status,
            envelope: Envelope {
                data: None,
                message: Some(message.into()),
            },
        }
    }

    /// Attaches [`NO_ALTERATIONS`] when `changed` is false.
    pub fn altered(mut self, changed: bool) -> Response {
        if !changed {
            self.envelope.message = Some(NO_ALTERATIONS.to_string());
        }
        self
    }
}

impl Reply for Response {
    fn into_response(self) -> reply::Response {
        reply::with_status(reply::json(&self.envelope), self.status).into_response()
    }
}
