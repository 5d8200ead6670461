//! Link Components
//!
//! A link is an edge between two distinct agents. Its identity is a canonical
//! key: the unordered pair of endpoints for an undirected link, the ordered
//! pair for a directed one. Equality and hashing go through that key only, so
//! `Link::new(a, b, false)` and `Link::new(b, a, false)` are the same link.
//!
//! Building a link is pure. Adding it to a world is a separate call to
//! [`LinkSet::insert`](super::world::LinkSet::insert).

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::agent::{AgentId, Xy};
use super::world::{LinkSet, SimWorld};
use crate::render::{label_anchor, Canvas, Color, Labelable};

/// Errors raised when a link is constructed or registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("can't link to a missing agent: agent_1: {agent_1:?}, agent_2: {agent_2:?}")]
    MissingEndpoint {
        agent_1: Option<AgentId>,
        agent_2: Option<AgentId>,
    },

    #[error("can't have a link from an agent to itself: {0}")]
    SelfLoop(AgentId),

    #[error("agent {0} is not in the world")]
    UnknownEndpoint(AgentId),
}

/// Canonical identity of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkKey {
    /// Unordered pair, stored smaller id first
    Undirected(AgentId, AgentId),
    /// Ordered pair (from, to)
    Directed(AgentId, AgentId),
}

impl LinkKey {
    pub fn new(agent_1: AgentId, agent_2: AgentId, directed: bool) -> Self {
        if directed {
            LinkKey::Directed(agent_1, agent_2)
        } else if agent_1 <= agent_2 {
            LinkKey::Undirected(agent_1, agent_2)
        } else {
            LinkKey::Undirected(agent_2, agent_1)
        }
    }

    pub fn endpoints(&self) -> (AgentId, AgentId) {
        match *self {
            LinkKey::Undirected(a, b) | LinkKey::Directed(a, b) => (a, b),
        }
    }

    pub fn is_directed(&self) -> bool {
        matches!(self, LinkKey::Directed(..))
    }

    pub fn includes(&self, agent: AgentId) -> bool {
        let (a, b) = self.endpoints();
        a == agent || b == agent
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKey::Undirected(a, b) => write!(f, "{} <--> {}", a, b),
            LinkKey::Directed(a, b) => write!(f, "{} --> {}", a, b),
        }
    }
}

/// The key a link between `agent_1` and `agent_2` would have
pub fn hash_object(agent_1: AgentId, agent_2: AgentId, directed: bool) -> LinkKey {
    LinkKey::new(agent_1, agent_2, directed)
}

/// An edge between two distinct agents, plus its display attributes
#[derive(Debug, Clone)]
pub struct Link {
    agent_1: AgentId,
    agent_2: AgentId,
    key: LinkKey,
    default_color: Color,
    color: Color,
    width: u32,
    is_best: bool,
}

impl Link {
    /// A white link of width 1
    pub fn new(agent_1: AgentId, agent_2: AgentId, directed: bool) -> Result<Self, LinkError> {
        Self::styled(agent_1, agent_2, directed, Color::WHITE, 1)
    }

    pub fn styled(
        agent_1: AgentId,
        agent_2: AgentId,
        directed: bool,
        color: Color,
        width: u32,
    ) -> Result<Self, LinkError> {
        if agent_1 == agent_2 {
            return Err(LinkError::SelfLoop(agent_1));
        }
        Ok(Self {
            agent_1,
            agent_2,
            key: LinkKey::new(agent_1, agent_2, directed),
            default_color: color,
            color,
            width,
            is_best: false,
        })
    }

    /// Build from endpoints that may be unset
    pub fn from_endpoints(
        agent_1: Option<AgentId>,
        agent_2: Option<AgentId>,
        directed: bool,
    ) -> Result<Self, LinkError> {
        match (agent_1, agent_2) {
            (Some(a), Some(b)) => Self::new(a, b, directed),
            _ => Err(LinkError::MissingEndpoint { agent_1, agent_2 }),
        }
    }

    pub fn agent_1(&self) -> AgentId {
        self.agent_1
    }

    pub fn agent_2(&self) -> AgentId {
        self.agent_2
    }

    pub fn key(&self) -> LinkKey {
        self.key
    }

    pub fn is_directed(&self) -> bool {
        self.key.is_directed()
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_best(&self) -> bool {
        self.is_best
    }

    pub fn includes(&self, agent: AgentId) -> bool {
        agent == self.agent_1 || agent == self.agent_2
    }

    /// The endpoint opposite `agent`, or `None` if `agent` is not on this link
    pub fn other_side(&self, agent: AgentId) -> Option<AgentId> {
        if agent == self.agent_1 {
            Some(self.agent_2)
        } else if agent == self.agent_2 {
            Some(self.agent_1)
        } else {
            None
        }
    }

    /// Linked neighbors of each endpoint, smaller side first.
    ///
    /// Neighbors are taken from every link in `links` touching the endpoint,
    /// regardless of direction. On a tie the `agent_2` side comes first.
    pub fn neighbors_on_each_side(&self, links: &LinkSet) -> (BTreeSet<AgentId>, BTreeSet<AgentId>) {
        let side_1 = links.neighbors(self.agent_1);
        let side_2 = links.neighbors(self.agent_2);
        if side_1.len() < side_2.len() {
            (side_1, side_2)
        } else {
            (side_2, side_1)
        }
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_width(&mut self, width: u32) {
        self.width = width;
    }

    pub fn set_best(&mut self, is_best: bool) {
        self.is_best = is_best;
    }

    pub fn reset_color(&mut self) {
        self.color = self.default_color;
    }

    /// Draw the line between the endpoint positions, then the label if the
    /// labeler produces one. Links with a missing endpoint are skipped.
    pub fn draw(
        &self,
        world: &SimWorld,
        labeler: &dyn Labelable,
        canvas: &mut dyn Canvas,
        patch_size: f64,
    ) {
        let (Some(a1), Some(a2)) = (
            world.agents.get(self.agent_1),
            world.agents.get(self.agent_2),
        ) else {
            return;
        };

        canvas.draw_line(a1.position, a2.position, self.color, self.width);
        if let Some(label) = labeler.link_label(self, world) {
            self.draw_label(&label, a1.position, a2.position, canvas, patch_size);
        }
    }

    fn draw_label(&self, label: &str, p1: Xy, p2: Xy, canvas: &mut dyn Canvas, patch_size: f64) {
        let offset = (0.5 * patch_size).trunc();
        let anchor = label_anchor(p1, p2);
        let text_center = Xy::new(anchor.x + offset, anchor.y + offset);
        canvas.draw_label(label, text_center, anchor, self.color);
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Link {}

impl Hash for Link {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.is_directed() { "-->" } else { "<-->" };
        write!(f, "{} {} {}", self.agent_1, arrow, self.agent_2)
    }
}
