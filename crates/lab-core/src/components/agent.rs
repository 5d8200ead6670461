//! Agent Components
//!
//! Agents are the endpoints of links: cities in the ant colony, points in the
//! closed-loop GA. Each one is identified by an `AgentId` that is never reused
//! while its registry is alive.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for an agent, and its canonical ordering key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl AgentId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in board (pixel) coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

impl Xy {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: Xy) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Movement per step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: f64,
    pub dy: f64,
}

impl Velocity {
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

/// The rectangle agents live and move in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub width: f64,
    pub height: f64,
}

impl Board {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Uniformly random position on the board
    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Xy {
        Xy::new(
            rng.gen::<f64>() * self.width,
            rng.gen::<f64>() * self.height,
        )
    }

    pub fn contains(&self, p: Xy) -> bool {
        (0.0..=self.width).contains(&p.x) && (0.0..=self.height).contains(&p.y)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(600.0, 600.0)
    }
}

/// A single agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub position: Xy,
    pub velocity: Velocity,
}

impl Agent {
    pub fn new(id: AgentId, position: Xy) -> Self {
        Self {
            id,
            position,
            velocity: Velocity::default(),
        }
    }

    pub fn distance_to(&self, other: &Agent) -> f64 {
        self.position.distance_to(other.position)
    }

    pub fn set_velocity(&mut self, velocity: Velocity) {
        self.velocity = velocity;
    }

    /// Move one step, bouncing off the board edges
    pub fn move_by_velocity(&mut self, board: &Board) {
        let mut x = self.position.x + self.velocity.dx;
        let mut y = self.position.y + self.velocity.dy;

        if x < 0.0 || x > board.width {
            self.velocity.dx = -self.velocity.dx;
            x = x.clamp(0.0, board.width);
        }
        if y < 0.0 || y > board.height {
            self.velocity.dy = -self.velocity.dy;
            y = y.clamp(0.0, board.height);
        }

        self.position = Xy::new(x, y);
    }
}

/// All live agents, keyed and iterated by id
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, Agent>,
    next_id: u64,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an agent at `position` and return its fresh id
    pub fn spawn(&mut self, position: Xy) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        self.agents.insert(id, Agent::new(id, position));
        id
    }

    /// Spawn `count` agents at random board positions
    pub fn spawn_random<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        board: &Board,
        rng: &mut R,
    ) -> Vec<AgentId> {
        (0..count)
            .map(|_| {
                let position = board.random_position(rng);
                self.spawn(position)
            })
            .collect()
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Remove an agent. Links that reference it are left in place.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Distance between two live agents
    pub fn distance(&self, a: AgentId, b: AgentId) -> Option<f64> {
        Some(self.get(a)?.distance_to(self.get(b)?))
    }
}
