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

use open_ccg::{auth::Sessions, config::Config, Error, State};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let store = open_ccg::open_store(&config).await?;
    let sessions = Sessions::from_config(&config.jwt)?.with_ttl(config.session_ttl);
    let state = State::new(store, sessions);
    if let Some(seed) = &config.admin {
        open_ccg::seed_admin(&state, seed).await?;
    }

    let api = open_ccg::api(state)?;
    tracing::info!(addr = %config.bind_addr, "listening");
    warp::serve(api).run(config.bind_addr).await;
    Ok(())
}
