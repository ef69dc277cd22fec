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

use std::{env, net::SocketAddr, path::PathBuf};

use crate::{auth::DEFAULT_SESSION_TTL, Error};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3030";

/// Where session keys come from.
#[derive(Debug, Clone, PartialEq)]
pub enum JWTConfig {
    Secret(String),
    RsaPem {
        private_key: PathBuf,
        public_key: PathBuf,
    },
    /// A fresh secret per process.
    Random,
}

/// An admin account ensured at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
    pub real_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Postgres connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt: JWTConfig,
    /// Session lifetime in seconds.
    pub session_ttl: i64,
    pub admin: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Config::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr: SocketAddr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|_| Error::InvalidConfig("BIND_ADDR".to_string()))?;

        let jwt = match var("JWT_SECRET") {
            Some(secret) => JWTConfig::Secret(secret),
            None => match (var("JWT_PRIVATE_KEY"), var("JWT_PUBLIC_KEY")) {
                (Some(private), Some(public)) => JWTConfig::RsaPem {
                    private_key: PathBuf::from(private),
                    public_key: PathBuf::from(public),
                },
                _ => JWTConfig::Random,
            },
        };

        let session_ttl = match var("SESSION_TTL_SECONDS") {
            Some(raw) => raw
                .parse()
                .ok()
                .filter(|ttl: &i64| *ttl > 0)
                .ok_or_else(|| Error::InvalidConfig("SESSION_TTL_SECONDS".to_string()))?,
            None => DEFAULT_SESSION_TTL,
        };

        let admin = match (var("ADMIN_USERNAME"), var("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminSeed {
                real_name: var("ADMIN_REAL_NAME").unwrap_or_else(|| username.clone()),
                username,
                password,
            }),
            _ => None,
        };

        Ok(Config {
            bind_addr,
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            jwt,
            session_ttl,
            admin,
        })
    }
}
