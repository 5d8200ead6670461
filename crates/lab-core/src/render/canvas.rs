//! Canvas
//!
//! The drawing collaborator. `FrameRecorder` keeps what was drawn as
//! serializable commands so a run can ship its last frame in a snapshot.

use lab_events::DrawCommand;

use super::color::Color;
use super::label::Labelable;
use crate::components::{Link, SimWorld, Xy};

/// Line and label primitives in board coordinates
pub trait Canvas {
    fn draw_line(&mut self, from: Xy, to: Xy, color: Color, width: u32);

    fn draw_label(&mut self, text: &str, text_center: Xy, anchor: Xy, color: Color);
}

/// Where a link label is anchored: three quarters of the way from the second
/// endpoint toward the first
pub fn label_anchor(p1: Xy, p2: Xy) -> Xy {
    Xy::new((3.0 * p1.x + p2.x) / 4.0, (3.0 * p1.y + p2.y) / 4.0)
}

/// Canvas that records draw calls
#[derive(Debug, Default)]
pub struct FrameRecorder {
    commands: Vec<DrawCommand>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }
}

impl Canvas for FrameRecorder {
    fn draw_line(&mut self, from: Xy, to: Xy, color: Color, width: u32) {
        self.commands.push(DrawCommand::Line {
            from: from.as_tuple(),
            to: to.as_tuple(),
            color: color.to_array(),
            width,
        });
    }

    fn draw_label(&mut self, text: &str, text_center: Xy, anchor: Xy, color: Color) {
        self.commands.push(DrawCommand::Label {
            text: text.to_string(),
            text_center: text_center.as_tuple(),
            anchor: anchor.as_tuple(),
            color: color.to_array(),
        });
    }
}

/// Draw every link accepted by `visible`, then every agent label
pub fn draw_world(
    world: &SimWorld,
    labeler: &dyn Labelable,
    canvas: &mut dyn Canvas,
    patch_size: f64,
    visible: impl Fn(&Link) -> bool,
) {
    for link in world.links.iter().filter(|link| visible(link)) {
        link.draw(world, labeler, canvas, patch_size);
    }

    let offset = (0.5 * patch_size).trunc();
    for agent in world.agents.iter() {
        if let Some(text) = labeler.agent_label(agent) {
            let p = agent.position;
            canvas.draw_label(&text, Xy::new(p.x + offset, p.y + offset), p, Color::WHITE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::LengthLabel;

    #[test]
    fn test_label_anchor_is_three_quarters_toward_first_endpoint() {
        let anchor = label_anchor(Xy::new(0.0, 0.0), Xy::new(8.0, 4.0));
        assert_eq!(anchor, Xy::new(2.0, 1.0));
    }

    #[test]
    fn test_link_draw_records_line_and_label() {
        let mut world = SimWorld::new();
        let a = world.agents.spawn(Xy::new(0.0, 0.0));
        let b = world.agents.spawn(Xy::new(40.0, 0.0));
        world.link(a, b, false).unwrap();

        let mut frame = FrameRecorder::new();
        draw_world(&world, &LengthLabel, &mut frame, 11.0, |_| true);

        let commands = frame.into_commands();
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], DrawCommand::Line { width: 1, .. }));
        match &commands[1] {
            DrawCommand::Label { text, anchor, text_center, .. } => {
                assert_eq!(text, "40.0");
                assert_eq!(*anchor, (10.0, 0.0));
                assert_eq!(*text_center, (15.0, 5.0));
            }
            other => panic!("expected label, got {:?}", other),
        }
    }

    #[test]
    fn test_hidden_links_are_not_drawn() {
        let mut world = SimWorld::new();
        let a = world.agents.spawn(Xy::new(0.0, 0.0));
        let b = world.agents.spawn(Xy::new(1.0, 0.0));
        world.link(a, b, false).unwrap();

        let mut frame = FrameRecorder::new();
        draw_world(&world, &LengthLabel, &mut frame, 11.0, |_| false);
        assert!(frame.commands().is_empty());
    }
}
