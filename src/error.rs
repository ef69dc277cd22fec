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

use mobc_postgres::tokio_postgres::error::SqlState;
use warp::{http::StatusCode, reject, Rejection, Reply};

use crate::response::Response;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Not provided: {0}")]
    MissingField(String),
    #[error("Invalid value for: {0}")]
    InvalidField(String),
    #[error("Invalid id.")]
    InvalidId,
    #[error("Power must be an integer.")]
    InvalidPower,
    #[error("Doesn't exist.")]
    NotFound,
    #[error("Permission denied.")]
    Forbidden,
    #[error("Unauthorized.")]
    Unauthenticated,
    #[error("{0} is taken.")]
    UsernameTaken(String),
    #[error("Method {0} not allowed.")]
    MethodNotAllowed(String),
    #[error("Cannot delete yourself.")]
    CannotSelfDelete,
    #[error("Bad request.")]
    MalformedRequest,
    #[error("Request body too large.")]
    PayloadTooLarge,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    DBPoolError(#[from] mobc::Error<mobc_postgres::tokio_postgres::Error>),
    #[error(transparent)]
    DBError(#[from] mobc_postgres::tokio_postgres::Error),
    #[error(transparent)]
    JWTError(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingField(_)
            | Error::InvalidField(_)
            | Error::InvalidId
            | Error::InvalidPower
            | Error::UsernameTaken(_)
            | Error::MalformedRequest => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden | Error::CannotSelfDelete => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error is the caller's fault and safe to echo back.
    pub fn is_request_error(&self) -> bool {
        self.status() != StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Maps constraint violations raised by postgres onto request errors.
    pub(crate) fn from_db(e: mobc_postgres::tokio_postgres::Error, username: Option<&str>) -> Error {
        match (e.code(), username) {
            (Some(code), Some(username)) if *code == SqlState::UNIQUE_VIOLATION => {
                Error::UsernameTaken(username.to_string())
            }
            (Some(code), _) if *code == SqlState::FOREIGN_KEY_VIOLATION => Error::NotFound,
            _ => Error::DBError(e),
        }
    }
}

impl reject::Reject for Error {}

impl From<&Error> for Response {
    fn from(err: &Error) -> Response {
        if err.is_request_error() {
            Response::message(err.status(), err.to_string())
        } else {
            tracing::error!(error = %err, "request failed");
            Response::message(err.status(), "Internal server error.")
        }
    }
}

pub async fn handle_rejects(err: Rejection) -> Result<impl Reply, Infallible> {
    let resp = if let Some(e) = err.find::<Error>() {
        Response::from(e)
    } else if err.is_not_found() {
        Response::message(StatusCode::NOT_FOUND, "Not found.")
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
    {
        Response::message(StatusCode::BAD_REQUEST, "Bad request.")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        Response::from(&Error::PayloadTooLarge)
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        Response::message(StatusCode::LENGTH_REQUIRED, "Content-Length required.")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        Response::message(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        Response::message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    };

    Ok(resp)
}
