//! Bubbles - the pieces that live in grid cells and get shot from the turret.
//!
//! A bubble is either plain colored, or colored and carrying a number. The
//! variant decides how bubbles group together (`is_match`) and when a
//! group pops on attachment (`is_connect_match`).

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<BubbleColor>();
    app.register_type::<Bubble>();
}

/// The different bubble colors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize,
)]
pub enum BubbleColor {
    #[default]
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl BubbleColor {
    /// Get all possible bubble colors.
    pub const ALL: [BubbleColor; 6] = [
        BubbleColor::Red,
        BubbleColor::Blue,
        BubbleColor::Green,
        BubbleColor::Yellow,
        BubbleColor::Purple,
        BubbleColor::Orange,
    ];

    /// Get a random bubble color.
    pub fn random() -> Self {
        Self::random_with(&mut rand::rng())
    }

    /// Get a random bubble color from the given generator.
    pub fn random_with(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// A game piece.
///
/// `anchor` is the bubble's position in local render space. Grid logic never
/// looks at it; it is carried along for whoever draws the bubble.
#[derive(Debug, Clone, PartialEq, Reflect)]
pub enum Bubble {
    /// Pops with neighbors of the same color.
    Colored { color: BubbleColor, anchor: Vec2 },
    /// Groups by color, but only pops when its neighbors add up to its number.
    Numbered {
        color: BubbleColor,
        number: i32,
        anchor: Vec2,
    },
}

impl Bubble {
    pub const fn colored(color: BubbleColor) -> Self {
        Bubble::Colored {
            color,
            anchor: Vec2::ZERO,
        }
    }

    pub const fn numbered(color: BubbleColor, number: i32) -> Self {
        Bubble::Numbered {
            color,
            number,
            anchor: Vec2::ZERO,
        }
    }

    pub fn color(&self) -> BubbleColor {
        match self {
            Bubble::Colored { color, .. } | Bubble::Numbered { color, .. } => *color,
        }
    }

    /// The number on a numbered bubble.
    pub fn number(&self) -> Option<i32> {
        match self {
            Bubble::Colored { .. } => None,
            Bubble::Numbered { number, .. } => Some(*number),
        }
    }

    pub fn anchor(&self) -> Vec2 {
        match self {
            Bubble::Colored { anchor, .. } | Bubble::Numbered { anchor, .. } => *anchor,
        }
    }

    pub fn set_anchor(&mut self, position: Vec2) {
        match self {
            Bubble::Colored { anchor, .. } | Bubble::Numbered { anchor, .. } => *anchor = position,
        }
    }

    /// Whether `other` belongs to the same group as this bubble.
    ///
    /// A numbered bubble is also a colored bubble, so it can be compared
    /// against either variant. A colored bubble only knows colored bubbles;
    /// asking it about a numbered one means the grid was seeded with mixed
    /// variants, which is a setup bug.
    ///
    /// # Panics
    ///
    /// When a colored bubble is compared with a numbered bubble.
    #[track_caller]
    pub fn is_match(&self, other: &Bubble) -> bool {
        match (self, other) {
            (Bubble::Colored { .. }, Bubble::Numbered { .. }) => unregistered_pairing(self, other),
            _ => self.color() == other.color(),
        }
    }

    /// Whether attaching this bubble next to `group` should pop it.
    ///
    /// `group` holds the connected bubbles around the attachment point,
    /// without this bubble. Which rule applies is decided by the variant of
    /// the group's first bubble:
    /// - colored: every bubble in the group has this bubble's color
    /// - numbered: the numbers in the group add up to this bubble's number
    ///
    /// An empty group never pops.
    ///
    /// # Panics
    ///
    /// When a colored bubble is tested against a numbered group.
    #[track_caller]
    pub fn is_connect_match<'a>(&self, group: impl IntoIterator<Item = &'a Bubble>) -> bool {
        let mut group = group.into_iter().peekable();
        let Some(&first) = group.peek() else {
            return false;
        };

        match (self, first) {
            (_, Bubble::Colored { .. }) => group.all(|bubble| bubble.color() == self.color()),
            (Bubble::Numbered { number, .. }, Bubble::Numbered { .. }) => {
                group.filter_map(Bubble::number).sum::<i32>() == *number
            }
            (Bubble::Colored { .. }, Bubble::Numbered { .. }) => unregistered_pairing(self, first),
        }
    }
}

#[track_caller]
fn unregistered_pairing(this: &Bubble, other: &Bubble) -> ! {
    panic!(
        "no match rule for a {} bubble against a {} bubble; grid holds mixed bubble variants",
        variant_name(this),
        variant_name(other)
    )
}

fn variant_name(bubble: &Bubble) -> &'static str {
    match bubble {
        Bubble::Colored { .. } => "colored",
        Bubble::Numbered { .. } => "numbered",
    }
}
