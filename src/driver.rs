//! Render drivers position the containers of a navigation view during a transition.

use crate::dom::{Document, ElementId};
use cgmath::{Deg, Matrix3, SquareMatrix};
use core::fmt;

/// Where a container sits relative to the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Center,
    /// Behind the visible area, without any spatial offset.
    Back,
    Left,
    Right,
    Over,
    Below,
    Small,
    Big,
    Clockwise,
    CounterClockwise,
}

impl Position {
    /// The `data-position` token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Center => "center",
            Position::Back => "back",
            Position::Left => "left",
            Position::Right => "right",
            Position::Over => "over",
            Position::Below => "below",
            Position::Small => "small",
            Position::Big => "big",
            Position::Clockwise => "clockwise",
            Position::CounterClockwise => "counterClockwise",
        }
    }

    /// Affine transform of a container at this position, in units of the container size.
    pub fn transform(&self) -> Matrix3<f64> {
        fn translation(x: f64, y: f64) -> Matrix3<f64> {
            Matrix3::new(1., 0., 0., 0., 1., 0., x, y, 1.)
        }
        fn scale(s: f64) -> Matrix3<f64> {
            Matrix3::new(s, 0., 0., 0., s, 0., 0., 0., 1.)
        }

        match self {
            Position::Center | Position::Back => Matrix3::identity(),
            Position::Left => translation(-1., 0.),
            Position::Right => translation(1., 0.),
            Position::Over => translation(0., -1.),
            Position::Below => translation(0., 1.),
            Position::Small => scale(0.5),
            Position::Big => scale(2.),
            Position::Clockwise => Matrix3::from_angle_z(Deg(90.0_f64)),
            Position::CounterClockwise => Matrix3::from_angle_z(Deg(-90.0_f64)),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moves transition containers around. Implemented by the host.
pub trait RenderDriver {
    /// Puts `container` at `position`, animating the move if `animated` is set.
    fn place(
        &mut self,
        document: &mut dyn Document,
        container: ElementId,
        position: Position,
        animated: bool,
    );

    /// Forces the host to lay out and repaint `container`.
    fn flush_layout(&mut self, document: &mut dyn Document, container: ElementId);
}

/// Drives transitions through element attributes, for stylesheet-based animations.
///
/// Writes `data-position`, toggles the `animated` class and stores the position transform as
/// `data-transform="a b c d e f"` (2D affine matrix, column-major). Flushing toggles display
/// off and on again.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeDriver;

impl RenderDriver for AttributeDriver {
    fn place(
        &mut self,
        document: &mut dyn Document,
        container: ElementId,
        position: Position,
        animated: bool,
    ) {
        let m = position.transform();
        let transform = format!(
            "{} {} {} {} {} {}",
            round(m.x.x),
            round(m.x.y),
            round(m.y.x),
            round(m.y.y),
            round(m.z.x),
            round(m.z.y)
        );
        document.toggle_class(container, "animated", animated);
        document.set_attribute(container, "data-position", position.as_str());
        document.set_attribute(container, "data-transform", &transform);
    }

    fn flush_layout(&mut self, document: &mut dyn Document, container: ElementId) {
        document.set_displayed(container, false);
        document.set_displayed(container, true);
    }
}

/// Rounds away float noise from rotations (cos 90° is not exactly 0).
fn round(value: f64) -> f64 {
    let rounded = (value * 1e6).round() / 1e6;
    if rounded == 0. {
        0.
    } else {
        rounded
    }
}
