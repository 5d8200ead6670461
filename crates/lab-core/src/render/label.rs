//! Labels
//!
//! Labels are a capability supplied by the caller rather than a method each
//! link or agent kind overrides. The default for both is no label.

use crate::components::{Agent, Link, SimWorld};

/// Produces optional label text for links and agents
pub trait Labelable {
    fn link_label(&self, _link: &Link, _world: &SimWorld) -> Option<String> {
        None
    }

    fn agent_label(&self, _agent: &Agent) -> Option<String> {
        None
    }
}

/// Never labels anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabel;

impl Labelable for NoLabel {}

/// Labels a link with its length, one decimal place
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthLabel;

impl Labelable for LengthLabel {
    fn link_label(&self, link: &Link, world: &SimWorld) -> Option<String> {
        world
            .link_length(&link.key())
            .map(|length| format!("{:.1}", length))
    }
}

/// Length labels on links, plus agent positions when `show_positions` is set
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionLabel {
    pub show_positions: bool,
}

impl Labelable for PositionLabel {
    fn link_label(&self, link: &Link, world: &SimWorld) -> Option<String> {
        LengthLabel.link_label(link, world)
    }

    fn agent_label(&self, agent: &Agent) -> Option<String> {
        self.show_positions
            .then(|| format!("({:.0}, {:.0})", agent.position.x, agent.position.y))
    }
}
