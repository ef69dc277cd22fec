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

//! The generic resource handler.
//!
//! A request runs through `AUTHENTICATE -> VALIDATE -> LOAD -> AUTHORIZE -> EXECUTE ->
//! RESPOND`. Authentication happens in [`guard::authenticated`] before a request reaches
//! [`Crud::handle`]; the remaining gates are the plain functions in this module, which
//! each [`Resource`] calls in order before touching the store. Any gate failing
//! short-circuits the request.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use warp::{http::Method, Filter, Rejection};

use crate::{
    auth::PasswordHasher,
    guard,
    models::{Id, User},
    policy::{self, Owned},
    response::Response,
    store::{Fetch, Store},
    Error, State,
};

/// A JSON request body.
pub type Body = Map<String, Value>;
/// Decoded query string.
pub type Args = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 4] = [Verb::Get, Verb::Post, Verb::Put, Verb::Delete];

    pub fn from_method(method: &Method) -> Result<Verb, Error> {
        match *method {
            Method::GET => Ok(Verb::Get),
            Method::POST => Ok(Verb::Post),
            Method::PUT => Ok(Verb::Put),
            Method::DELETE => Ok(Verb::Delete),
            _ => Err(Error::MethodNotAllowed(method.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport-independent request against one resource kind.
#[derive(Debug, Clone)]
pub struct Request {
    pub verb: Verb,
    pub id: Option<String>,
    pub body: Option<Body>,
    pub query: Args,
}

impl Request {
    pub fn new(verb: Verb) -> Self {
        Request {
            verb,
            id: None,
            body: None,
            query: Args::new(),
        }
    }

    pub fn id<S: ToString>(mut self, id: S) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Sets the body. Anything but a JSON object is dropped.
    pub fn body(mut self, body: Value) -> Self {
        self.body = match body {
            Value::Object(map) => Some(map),
            _ => None,
        };
        self
    }

    pub fn arg<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }
}

/// Everything a resource method may touch while serving one request.
#[derive(Clone, Copy)]
pub struct Ctx<'a> {
    pub store: &'a dyn Store,
    pub hasher: &'a dyn PasswordHasher,
    pub actor: &'a User,
}

/// A resource kind: the verb-specific half of the handler.
///
/// Methods a kind does not list in `METHODS` keep the default body and are never
/// reached through [`Crud`].
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Path segment the kind is mounted under.
    const NAME: &'static str;
    /// The verbs this kind implements.
    const METHODS: &'static [Verb];

    /// Runs before anything else in the request, ids included.
    async fn guard(&self, _ctx: &Ctx<'_>) -> Result<(), Error> {
        Ok(())
    }

    async fn create(&self, _ctx: &Ctx<'_>, _body: &Body, _args: &Args) -> Result<Response, Error> {
        Err(Error::MethodNotAllowed(Verb::Post.to_string()))
    }

    async fn read(&self, _ctx: &Ctx<'_>, _id: Option<Id>, _args: &Args) -> Result<Response, Error> {
        Err(Error::MethodNotAllowed(Verb::Get.to_string()))
    }

    async fn update(&self, _ctx: &Ctx<'_>, _id: Id, _body: &Body) -> Result<Response, Error> {
        Err(Error::MethodNotAllowed(Verb::Put.to_string()))
    }

    async fn delete(&self, _ctx: &Ctx<'_>, _id: Id) -> Result<Response, Error> {
        Err(Error::MethodNotAllowed(Verb::Delete.to_string()))
    }
}

/// Maps verbs onto a [`Resource`]'s methods.
pub struct Crud<R> {
    resource: R,
    methods: Vec<Verb>,
}

impl<R: Resource> Crud<R> {
    /// Enables `methods` on `resource`. Asking for a verb the kind does not declare
    /// fails here, before any request is served.
    pub fn new(resource: R, methods: &[Verb]) -> Result<Self, Error> {
        if let Some(verb) = methods.iter().find(|v| !R::METHODS.contains(v)) {
            return Err(Error::MethodNotAllowed(verb.to_string()));
        }
        let mut enabled = methods.to_vec();
        enabled.dedup();
        Ok(Crud {
            resource,
            methods: enabled,
        })
    }

    pub fn methods(&self) -> &[Verb] {
        &self.methods
    }

    #[tracing::instrument(
        name = "crud",
        skip(self, ctx, request),
        fields(resource = R::NAME, verb = %request.verb, actor = ctx.actor.id)
    )]
    pub async fn handle(&self, ctx: &Ctx<'_>, request: Request) -> Result<Response, Error> {
        let result = self.dispatch(ctx, request).await;
        if let Err(e) = &result {
            if e.is_request_error() {
                tracing::debug!(error = %e, "request rejected");
            }
        }
        result
    }

    async fn dispatch(&self, ctx: &Ctx<'_>, request: Request) -> Result<Response, Error> {
        if !self.methods.contains(&request.verb) {
            return Err(Error::MethodNotAllowed(request.verb.to_string()));
        }
        self.resource.guard(ctx).await?;
        let id = request.id.as_deref().map(parse_id).transpose()?;
        let body = request.body.unwrap_or_default();
        match request.verb {
            Verb::Get => self.resource.read(ctx, id, &request.query).await,
            Verb::Post => self.resource.create(ctx, &body, &request.query).await,
            Verb::Put => {
                let id = id.ok_or_else(|| Error::MissingField("id".to_string()))?;
                self.resource.update(ctx, id, &body).await
            }
            Verb::Delete => {
                let id = id.ok_or_else(|| Error::MissingField("id".to_string()))?;
                self.resource.delete(ctx, id).await
            }
        }
    }
}

/// Coerces a raw id to a positive integer.
pub fn parse_id(raw: &str) -> Result<Id, Error> {
    match raw.trim().parse::<Id>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(Error::InvalidId),
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Fails on the first of `fields` that is absent, null, or an empty string.
pub fn needs_data(body: &Body, fields: &[&str]) -> Result<(), Error> {
    match fields.iter().find(|f| !is_present(body.get(**f))) {
        Some(missing) => Err(Error::MissingField(missing.to_string())),
        None => Ok(()),
    }
}

pub fn needs_admin(actor: &User) -> Result<(), Error> {
    if policy::can_manage_users(actor) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Required,
    NotRequired,
}

/// Loads an entity, optionally checking the actor may access it.
pub async fn gets_by_id<E>(ctx: &Ctx<'_>, id: Id, permission: Permission) -> Result<E, Error>
where
    E: Fetch + Owned,
{
    let entity = E::fetch(ctx.store, id).await?.ok_or(Error::NotFound)?;
    if permission == Permission::Required && !policy::can_access(&entity, ctx.actor) {
        return Err(Error::Forbidden);
    }
    Ok(entity)
}

/// An empty body is no body; anything else has to be a JSON object.
pub fn parse_body(raw: &[u8]) -> Result<Option<Body>, Error> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        _ => Err(Error::MalformedRequest),
    }
}

/// Mounts `crud` at `/{R::NAME}` and `/{R::NAME}/{id}`.
pub fn routes<R: Resource>(
    crud: Crud<R>,
    state: State,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let crud = Arc::new(crud);
    warp::path(R::NAME)
        .and(
            warp::path::param::<String>()
                .map(|id: String| Some(id))
                .or(warp::any().map(|| None::<String>))
                .unify(),
        )
        .and(warp::path::end())
        .and(guard::authenticated(state.clone()))
        .and(warp::method())
        .and(warp::query::<Args>())
        .and(guard::body_limit())
        .and(warp::body::bytes())
        .and(warp::any().map(move || crud.clone()))
        .and(guard::with_state(state))
        .and_then(serve::<R>)
}

async fn serve<R: Resource>(
    id: Option<String>,
    actor: User,
    method: Method,
    query: Args,
    body: Bytes,
    crud: Arc<Crud<R>>,
    state: State,
) -> Result<Response, Rejection> {
    let request = Request {
        verb: Verb::from_method(&method)?,
        id,
        body: parse_body(&body)?,
        query,
    };
    let ctx = state.ctx(&actor);
    Ok(crud.handle(&ctx, request).await?)
}
