//! 1-D Cellular Automaton
//!
//! An elementary automaton. Each cell's next state comes from the rule bit
//! selected by its (left, self, right) neighborhood. The whole history is kept
//! in `ca_lines`, and every stored line always has the same length: when a new
//! line turns on a cell at either edge, the history widens to match.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::CaConfig;

/// How a line shorter or longer than the display is placed in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Justification {
    Left,
    Center,
    #[default]
    Right,
}

/// Neighborhood label for switch `index`, `"000"` through `"111"`
pub fn triple_key(index: usize) -> String {
    format!("{:03b}", index)
}

/// Switch states for a rule number. Switch `i` is bit `i`.
pub fn switches_from_rule(rule_nbr: u8) -> [bool; 8] {
    std::array::from_fn(|i| (rule_nbr >> i) & 1 == 1)
}

pub fn rule_from_switches(switches: &[bool; 8]) -> u8 {
    (0..8)
        .filter(|&i| switches[i])
        .fold(0u8, |rule, i| rule | (1 << i))
}

/// Rule number and the eight neighborhood switches, kept consistent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleControls {
    rule_nbr: u8,
    switches: [bool; 8],
}

impl RuleControls {
    pub fn new(rule_nbr: u8) -> Self {
        Self {
            rule_nbr,
            switches: switches_from_rule(rule_nbr),
        }
    }

    pub fn rule_nbr(&self) -> u8 {
        self.rule_nbr
    }

    pub fn switches(&self) -> &[bool; 8] {
        &self.switches
    }

    /// Flip one switch without touching the rule number; call
    /// [`reconcile`](Self::reconcile) afterwards.
    pub fn set_switch(&mut self, index: usize, on: bool) {
        if let Some(switch) = self.switches.get_mut(index) {
            *switch = on;
        }
    }

    /// Settle on one rule number after the slider or switches changed.
    ///
    /// If the switches no longer match the current rule they win. Otherwise
    /// the slider value is taken. Switches are then rewritten from the result.
    pub fn reconcile(&mut self, slider: u8) -> u8 {
        let from_switches = rule_from_switches(&self.switches);
        self.rule_nbr = if from_switches != self.rule_nbr {
            from_switches
        } else {
            slider
        };
        self.switches = switches_from_rule(self.rule_nbr);
        self.rule_nbr
    }

    /// e.g. `"01101110 (binary)"` for rule 110
    pub fn binary_string(&self) -> String {
        format!("{:08b} (binary)", self.rule_nbr)
    }

    /// Next state of a cell given its neighborhood
    pub fn apply(&self, left: u8, center: u8, right: u8) -> u8 {
        let index = ((left & 1) << 2) | ((center & 1) << 1) | (right & 1);
        (self.rule_nbr >> index) & 1
    }
}

/// Summary of the line a step produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaRow {
    pub rows: usize,
    pub width: usize,
    pub live_cells: usize,
}

/// Resource: the automaton's rule and history
#[derive(Resource, Debug)]
pub struct CaWorld {
    config: CaConfig,
    controls: RuleControls,
    ca_lines: Vec<Vec<u8>>,
}

impl CaWorld {
    /// Apply the configured rule and build the first line
    pub fn setup<R: Rng + ?Sized>(config: CaConfig, rng: &mut R) -> Self {
        let controls = RuleControls::new(config.rule_nbr);
        let mut ca = Self {
            config,
            controls,
            ca_lines: Vec::new(),
        };
        let first = ca.build_initial_line(rng);
        ca.ca_lines.push(first);
        tracing::debug!(
            "CA set up: rule {} ({}), initial width {}",
            ca.controls.rule_nbr(),
            ca.controls.binary_string(),
            ca.width()
        );
        ca
    }

    pub fn controls(&self) -> &RuleControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut RuleControls {
        &mut self.controls
    }

    pub fn config(&self) -> &CaConfig {
        &self.config
    }

    pub fn lines(&self) -> &[Vec<u8>] {
        &self.ca_lines
    }

    /// Number of lines in the history
    pub fn rows(&self) -> usize {
        self.ca_lines.len()
    }

    /// Length shared by every stored line
    pub fn width(&self) -> usize {
        self.ca_lines.last().map_or(0, Vec::len)
    }

    /// Drop the history and start again from a fresh first line
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let first = self.build_initial_line(rng);
        self.ca_lines = vec![first];
    }

    pub fn build_initial_line<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<u8> {
        let width = self.config.display_width;
        if self.config.random {
            return (0..width).map(|_| rng.gen_range(0..=1)).collect();
        }
        if self.config.init_line.is_empty() {
            return vec![0; width];
        }

        let line: Vec<u8> = self
            .config
            .init_line
            .chars()
            .map(|c| if c == '0' || c == ' ' { 0 } else { 1 })
            .collect();

        // With 000 -> 1 the background is live, so a short line has to span the
        // display. Longer lines are kept whole.
        if self.controls.switches()[0] && line.len() < width {
            pad_line(&line, width, self.config.justification)
        } else {
            line
        }
    }

    /// Compute the next line from the last one and append it
    pub fn generate_new_line(&mut self) -> Vec<u8> {
        let last = self.ca_lines.last().cloned().unwrap_or_default();

        let mut padded = Vec::with_capacity(last.len() + 4);
        padded.extend([0, 0]);
        padded.extend_from_slice(&last);
        padded.extend([0, 0]);

        let mut new_line: Vec<u8> = padded
            .windows(3)
            .map(|w| self.controls.apply(w[0], w[1], w[2]))
            .collect();

        if new_line.first() == Some(&1) {
            for line in self.ca_lines.iter_mut() {
                line.insert(0, 0);
            }
        } else {
            new_line.remove(0);
        }

        if new_line.last() == Some(&1) {
            for line in self.ca_lines.iter_mut() {
                line.push(0);
            }
        } else {
            new_line.pop();
        }

        self.ca_lines.push(new_line.clone());
        new_line
    }

    pub fn step(&mut self) -> CaRow {
        let line = self.generate_new_line();
        CaRow {
            rows: self.rows(),
            width: line.len(),
            live_cells: line.iter().filter(|&&c| c == 1).count(),
        }
    }

    /// Display grid of `display_rows` x `display_width` cells. The latest line
    /// is the bottom row; rows with no line yet are all 0.
    pub fn render(
        &self,
        display_width: usize,
        display_rows: usize,
        justification: Justification,
    ) -> Vec<Vec<u8>> {
        let shown = self.ca_lines.len().min(display_rows);
        let blank = display_rows - shown;
        let mut grid = vec![vec![0; display_width]; blank];
        grid.extend(
            self.ca_lines[self.ca_lines.len() - shown..]
                .iter()
                .map(|line| pad_line(line, display_width, justification)),
        );
        grid
    }
}

/// Fit `line` to exactly `width` cells, padding with 0 or cropping per
/// `justification`
pub fn pad_line(line: &[u8], width: usize, justification: Justification) -> Vec<u8> {
    let len = line.len();
    if len >= width {
        let start = match justification {
            Justification::Left => 0,
            Justification::Center => (len - width) / 2,
            Justification::Right => len - width,
        };
        return line[start..start + width].to_vec();
    }

    let left = match justification {
        Justification::Left => 0,
        Justification::Center => (width - len) / 2,
        Justification::Right => width - len,
    };
    let mut padded = vec![0; width];
    padded[left..left + len].copy_from_slice(line);
    padded
}

/// Grid as text, `#` for live cells
pub fn grid_to_string(grid: &[Vec<u8>]) -> String {
    grid.iter()
        .map(|row| {
            row.iter()
                .map(|&c| if c == 1 { '#' } else { '.' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
