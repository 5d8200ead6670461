//! World Components
//!
//! `LinkSet` is the set of live links, indexed by canonical key. `SimWorld`
//! pairs it with the agent registry and is passed explicitly to whatever
//! needs to create or query links.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use super::agent::{AgentId, AgentRegistry};
use super::link::{Link, LinkError, LinkKey};

/// All live links, keyed by canonical key
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    links: BTreeMap<LinkKey, Link>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link. Returns `false` and keeps the existing link when one with
    /// the same key is already present.
    pub fn insert(&mut self, link: Link) -> bool {
        match self.links.entry(link.key()) {
            Entry::Vacant(slot) => {
                slot.insert(link);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn remove(&mut self, key: &LinkKey) -> Option<Link> {
        self.links.remove(key)
    }

    pub fn get(&self, key: &LinkKey) -> Option<&Link> {
        self.links.get(key)
    }

    pub fn get_mut(&mut self, key: &LinkKey) -> Option<&mut Link> {
        self.links.get_mut(key)
    }

    pub fn contains(&self, key: &LinkKey) -> bool {
        self.links.contains_key(key)
    }

    /// The link between `agent_1` and `agent_2`, if one exists
    pub fn find(&self, agent_1: AgentId, agent_2: AgentId, directed: bool) -> Option<&Link> {
        self.links.get(&LinkKey::new(agent_1, agent_2, directed))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Link> {
        self.links.values_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = LinkKey> + '_ {
        self.links.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Link) -> bool) {
        self.links.retain(|_, link| keep(link));
    }

    /// Links touching `agent`, in either direction
    pub fn links_of(&self, agent: AgentId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |link| link.includes(agent))
    }

    /// Agents linked to `agent` by any link
    pub fn neighbors(&self, agent: AgentId) -> BTreeSet<AgentId> {
        self.links_of(agent)
            .filter_map(|link| link.other_side(agent))
            .collect()
    }

    /// Keys of links whose endpoints are no longer in `agents`
    pub fn dangling(&self, agents: &AgentRegistry) -> Vec<LinkKey> {
        self.links
            .values()
            .filter(|link| !agents.contains(link.agent_1()) || !agents.contains(link.agent_2()))
            .map(Link::key)
            .collect()
    }
}

/// Free-function form of [`LinkSet::find`]
pub fn link_exists(
    links: &LinkSet,
    agent_1: AgentId,
    agent_2: AgentId,
    directed: bool,
) -> Option<&Link> {
    links.find(agent_1, agent_2, directed)
}

/// Agents plus the links between them
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    pub agents: AgentRegistry,
    pub links: LinkSet,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a white link between two live agents and insert it.
    ///
    /// Returns the key whether the link was new or already present.
    pub fn link(
        &mut self,
        agent_1: AgentId,
        agent_2: AgentId,
        directed: bool,
    ) -> Result<LinkKey, LinkError> {
        let link = Link::new(agent_1, agent_2, directed)?;
        for agent in [agent_1, agent_2] {
            if !self.agents.contains(agent) {
                return Err(LinkError::UnknownEndpoint(agent));
            }
        }
        let key = link.key();
        self.links.insert(link);
        Ok(key)
    }

    /// Distance between a link's endpoints
    pub fn link_length(&self, key: &LinkKey) -> Option<f64> {
        let (a, b) = key.endpoints();
        self.agents.distance(a, b)
    }

    /// Sum of the lengths of the given links
    pub fn total_length<'a>(&self, keys: impl IntoIterator<Item = &'a LinkKey>) -> f64 {
        keys.into_iter()
            .filter_map(|key| self.link_length(key))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Xy;
    use crate::render::Color;

    fn world_with(n: usize) -> (SimWorld, Vec<AgentId>) {
        let mut world = SimWorld::new();
        let ids = (0..n)
            .map(|i| world.agents.spawn(Xy::new(i as f64 * 10.0, 0.0)))
            .collect();
        (world, ids)
    }

    #[test]
    fn test_insert_keeps_first_link() {
        let (a, b) = (AgentId(0), AgentId(1));
        let mut links = LinkSet::new();

        let mut first = Link::new(a, b, false).unwrap();
        first.set_width(3);
        assert!(links.insert(first));
        assert!(!links.insert(Link::new(b, a, false).unwrap()));

        assert_eq!(links.len(), 1);
        assert_eq!(links.find(b, a, false).unwrap().width(), 3);
    }

    #[test]
    fn test_world_link_rejects_unknown_agent() {
        let (mut world, ids) = world_with(2);
        let ghost = AgentId(99);

        assert_eq!(world.link(ids[0], ghost, false), Err(LinkError::UnknownEndpoint(ghost)));
        assert_eq!(world.link(ids[1], ids[1], false), Err(LinkError::SelfLoop(ids[1])));
        assert!(world.links.is_empty());
    }

    #[test]
    fn test_neighbors_and_links_of() {
        let (mut world, ids) = world_with(4);
        world.link(ids[0], ids[1], false).unwrap();
        world.link(ids[0], ids[2], false).unwrap();
        world.link(ids[3], ids[0], true).unwrap();

        let nbrs = world.links.neighbors(ids[0]);
        assert_eq!(nbrs, [ids[1], ids[2], ids[3]].into_iter().collect());
        assert_eq!(world.links.links_of(ids[2]).count(), 1);
        assert!(world.links.neighbors(ids[2]).contains(&ids[0]));
    }

    #[test]
    fn test_neighbors_on_each_side_smaller_first() {
        let (mut world, ids) = world_with(5);
        let key = world.link(ids[0], ids[1], false).unwrap();
        world.link(ids[1], ids[2], false).unwrap();
        world.link(ids[1], ids[3], false).unwrap();

        let link = world.links.get(&key).unwrap();
        let (small, large) = link.neighbors_on_each_side(&world.links);

        assert_eq!(small, [ids[1]].into_iter().collect());
        assert_eq!(large, [ids[0], ids[2], ids[3]].into_iter().collect());
    }

    #[test]
    fn test_neighbors_on_each_side_tie_puts_second_endpoint_first() {
        let (mut world, ids) = world_with(4);
        let key = world.link(ids[0], ids[1], false).unwrap();
        world.link(ids[0], ids[2], false).unwrap();
        world.link(ids[1], ids[3], false).unwrap();

        let link = world.links.get(&key).unwrap();
        let (first, second) = link.neighbors_on_each_side(&world.links);

        assert!(first.contains(&ids[3]));
        assert!(second.contains(&ids[2]));
    }

    #[test]
    fn test_set_color_only_touches_one_link() {
        let (mut world, ids) = world_with(3);
        let ab = world.link(ids[0], ids[1], false).unwrap();
        let bc = world.link(ids[1], ids[2], false).unwrap();

        world.links.get_mut(&ab).unwrap().set_color(Color::RED);

        assert_eq!(world.links.get(&ab).unwrap().color(), Color::RED);
        assert_eq!(world.links.get(&bc).unwrap().color(), Color::WHITE);
    }

    #[test]
    fn test_removing_agent_leaves_dangling_links() {
        let (mut world, ids) = world_with(3);
        let ab = world.link(ids[0], ids[1], false).unwrap();
        world.link(ids[1], ids[2], false).unwrap();

        world.agents.remove(ids[0]);

        assert_eq!(world.links.len(), 2);
        assert_eq!(world.links.dangling(&world.agents), vec![ab]);
        assert_eq!(world.link_length(&ab), None);
    }

    #[test]
    fn test_link_length_and_total() {
        let (mut world, ids) = world_with(3);
        let ab = world.link(ids[0], ids[1], false).unwrap();
        let ac = world.link(ids[0], ids[2], false).unwrap();

        assert_eq!(world.link_length(&ab), Some(10.0));
        assert_eq!(world.total_length([&ab, &ac]), 30.0);
    }
}
