// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of GrpcKit.
//
// GrpcKit is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// GrpcKit is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with GrpcKit. If not, see <https://www.gnu.org/licenses/>.
//! Generated sample data.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::messages::{Player, Team};

const COUNTRIES: [&str; 6] = ["Japan", "Spain", "Germany", "Italy", "England", "France"];

/// Youngest generated age
pub const MIN_AGE: i32 = 16;
/// Oldest generated age
pub const MAX_AGE: i32 = 39;

/// Teams `1..=count`; codes are zero-padded to the width of `count`
pub fn generate_teams(count: usize) -> Vec<Team> {
    let width = count.to_string().len();
    (1..=count)
        .map(|i| {
            let code = format!("{:0width$}", i, width = width);
            Team {
                name: format!("Team{}", code),
                country: COUNTRIES[i % COUNTRIES.len()].to_string(),
                code,
            }
        })
        .collect()
}

/// [`generate_teams`] keyed by code
pub fn teams_by_code(count: usize) -> BTreeMap<String, Team> {
    generate_teams(count)
        .into_iter()
        .map(|team| (team.code.clone(), team))
        .collect()
}

/// Players `initial..initial + count`, each on a random team from `teams`
///
/// Returns no players when `teams` is empty.
pub fn generate_players<R: Rng + ?Sized>(
    rng: &mut R,
    initial: usize,
    count: usize,
    teams: &BTreeMap<String, Team>,
) -> Vec<Player> {
    let codes: Vec<&String> = teams.keys().collect();
    let mut players = Vec::with_capacity(count);
    for n in initial..initial + count {
        let Some(code) = codes.choose(rng) else {
            break;
        };
        players.push(Player {
            name: format!("Player{}", n),
            age: rng.gen_range(MIN_AGE..=MAX_AGE),
            team_code: code.to_string(),
            positions: generate_positions(rng),
        });
    }
    players
}

fn generate_positions<R: Rng + ?Sized>(rng: &mut R) -> Vec<String> {
    let mut positions: Vec<String> = ["FW", "MF", "DF"]
        .iter()
        .filter(|_| rng.gen_bool(0.5))
        .map(|position| position.to_string())
        .collect();
    if positions.is_empty() {
        positions.push("GK".to_string());
    }
    positions
}
