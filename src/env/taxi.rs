use rand::distributions::{Distribution, Uniform};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::cmp::min;

use super::{Env, EnvError};
use crate::utils::categorical_sample;

const N_STATES: usize = 500;
const N_ACTIONS: usize = 6;

/// The 5x5 Taxi task: drive to the passenger, pick them up and drop them off
/// at their destination station.
#[derive(Debug, Clone)]
pub struct TaxiEnv {
    ready: bool,
    initial_state_distrib: Vec<f64>,
    transitions: Vec<[(usize, f64, bool); N_ACTIONS]>,
    curr_obs: usize,
    max_steps: u128,
    curr_step: u128,
    dist: Uniform<f64>,
    rng: SmallRng,
}

impl TaxiEnv {
    const MAP: [&'static str; 7] = [
        "+---------+",
        "|R: | : :G|",
        "| : | : : |",
        "| : : : : |",
        "| | : | : |",
        "|Y| : |B: |",
        "+---------+",
    ];
    pub const LOCS: [(usize, usize); 4] = [(0, 0), (0, 4), (4, 0), (4, 3)];
    pub const STATIONS: [char; 4] = ['R', 'G', 'Y', 'B'];
    pub const ACTIONS: [&'static str; N_ACTIONS] =
        ["SOUTH", "NORTH", "EAST", "WEST", "PICKUP", "DROPOFF"];
    /// Passenger index meaning "inside the taxi".
    pub const IN_TAXI: usize = 4;

    pub fn encode(taxi_row: usize, taxi_col: usize, pass_loc: usize, dest_loc: usize) -> usize {
        let mut i: usize = taxi_row;
        i *= 5;
        i += taxi_col;
        i *= 5;
        i += pass_loc;
        i *= 4;
        i += dest_loc;
        i
    }

    pub fn decode(i: usize) -> (usize, usize, usize, usize) {
        let mut out: (usize, usize, usize, usize) = (0, 0, 0, 0);
        let mut state = i;
        out.3 = state % 4;
        state /= 4;
        out.2 = state % 5;
        state /= 5;
        out.1 = state % 5;
        state /= 5;
        out.0 = state;
        out
    }

    fn open_side(row: usize, col: usize) -> (bool, bool) {
        let line: &[u8] = Self::MAP[1 + row].as_bytes();
        (line[2 * col + 2] == b':', line[2 * col] == b':')
    }

    fn transition(
        row: usize,
        col: usize,
        pass_loc: usize,
        dest_loc: usize,
        action: usize,
    ) -> (usize, f64, bool) {
        let (mut new_row, mut new_col, mut new_pass_loc) = (row, col, pass_loc);
        let mut reward: f64 = -1.0;
        let mut terminated: bool = false;
        let taxi_loc: (usize, usize) = (row, col);
        let (east_open, west_open) = Self::open_side(row, col);

        match action {
            0 => new_row = min(row + 1, 4),
            1 => new_row = row.saturating_sub(1),
            2 if east_open => new_col = min(col + 1, 4),
            3 if west_open => new_col = col.saturating_sub(1),
            4 => {
                if pass_loc < Self::IN_TAXI && taxi_loc == Self::LOCS[pass_loc] {
                    new_pass_loc = Self::IN_TAXI;
                } else {
                    reward = -10.0;
                }
            }
            5 => {
                if taxi_loc == Self::LOCS[dest_loc] && pass_loc == Self::IN_TAXI {
                    new_pass_loc = dest_loc;
                    terminated = true;
                    reward = 20.0;
                } else if pass_loc == Self::IN_TAXI && Self::LOCS.contains(&taxi_loc) {
                    new_pass_loc = Self::LOCS
                        .iter()
                        .position(|loc| *loc == taxi_loc)
                        .unwrap_or(pass_loc);
                } else {
                    reward = -10.0;
                }
            }
            _ => {}
        }
        (
            Self::encode(new_row, new_col, new_pass_loc, dest_loc),
            reward,
            terminated,
        )
    }

    pub fn new(max_steps: u128, seed: u64) -> Self {
        let mut initial_state_distrib: Vec<f64> = vec![0.0; N_STATES];
        let mut transitions: Vec<[(usize, f64, bool); N_ACTIONS]> =
            vec![[(0, 0.0, false); N_ACTIONS]; N_STATES];
        let mut sum: f64 = 0.0;
        for row in 0..5 {
            for col in 0..5 {
                for pass_loc in 0..5 {
                    for dest_loc in 0..4 {
                        let state = Self::encode(row, col, pass_loc, dest_loc);
                        if pass_loc < Self::IN_TAXI && pass_loc != dest_loc {
                            initial_state_distrib[state] += 1.0;
                            sum += 1.0;
                        }
                        for action in 0..N_ACTIONS {
                            transitions[state][action] =
                                Self::transition(row, col, pass_loc, dest_loc, action);
                        }
                    }
                }
            }
        }
        for value in &mut initial_state_distrib {
            *value /= sum;
        }

        Self {
            ready: false,
            initial_state_distrib,
            transitions,
            curr_obs: 0,
            max_steps,
            curr_step: 0,
            dist: Uniform::from(0.0..1.0),
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Env<usize> for TaxiEnv {
    fn reset(&mut self) -> usize {
        let random: f64 = self.dist.sample(&mut self.rng);
        self.curr_obs = categorical_sample(&self.initial_state_distrib, random);
        self.ready = true;
        self.curr_step = 0;
        self.curr_obs
    }

    /// Episodes longer than `max_steps` are cut off with `done` set.
    fn step(&mut self, action: usize) -> Result<(usize, f64, bool), EnvError> {
        if !self.ready {
            return Err(EnvError::EnvNotReady);
        }
        if action >= N_ACTIONS {
            return Err(EnvError::InvalidAction(action));
        }
        self.curr_step += 1;
        let (obs, reward, terminated) = self.transitions[self.curr_obs][action];
        self.curr_obs = obs;
        let done: bool = terminated || self.curr_step >= self.max_steps;
        if done {
            self.ready = false;
        }
        Ok((obs, reward, done))
    }

    /// Map with the taxi as `T` (`P` once the passenger is aboard) and the
    /// destination station in lowercase, followed by a status line.
    fn render(&self) -> String {
        let (row, col, pass_loc, dest_loc) = Self::decode(self.curr_obs);
        let mut lines: Vec<Vec<char>> = Self::MAP.iter().map(|l| l.chars().collect()).collect();
        let (dest_row, dest_col) = Self::LOCS[dest_loc];
        let dest_cell: &mut char = &mut lines[1 + dest_row][2 * dest_col + 1];
        *dest_cell = dest_cell.to_ascii_lowercase();
        lines[1 + row][2 * col + 1] = if pass_loc == Self::IN_TAXI { 'P' } else { 'T' };
        let passenger: String = if pass_loc == Self::IN_TAXI {
            "in taxi".to_string()
        } else {
            format!("waiting at {}", Self::STATIONS[pass_loc])
        };
        let mut map: String = lines
            .into_iter()
            .map(|l| l.into_iter().collect::<String>())
            .collect::<Vec<String>>()
            .join("\n");
        map.push_str(&format!(
            "\npassenger {}, destination {}",
            passenger,
            Self::STATIONS[dest_loc]
        ));
        map
    }

    fn action_label(&self, action: usize) -> String {
        match Self::ACTIONS.get(action) {
            Some(label) => label.to_string(),
            None => action.to_string(),
        }
    }

    fn n_actions(&self) -> usize {
        N_ACTIONS
    }
}
