#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

/// Color channel a slice pixel is reduced to when extracting density.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelSelector {
    #[default]
    Red,
    Green,
    Blue,
    Alpha,
}

impl ChannelSelector {
    /// Position of the channel inside an RGBA pixel
    pub(crate) fn rgba_index(self) -> usize {
        match self {
            ChannelSelector::Red => 0,
            ChannelSelector::Green => 1,
            ChannelSelector::Blue => 2,
            ChannelSelector::Alpha => 3,
        }
    }
}

/// Tie-breaking rule used when a scaled channel value is rounded to a density.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoundingRule {
    /// `2.5 -> 3`, `3.5 -> 4`
    #[default]
    HalfAwayFromZero,
    /// Banker's rounding: `2.5 -> 2`, `3.5 -> 4`
    HalfToEven,
}

impl RoundingRule {
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        match self {
            RoundingRule::HalfAwayFromZero => value.round(),
            RoundingRule::HalfToEven => value.round_ties_even(),
        }
    }
}

/// Row order in which decoded pixels are laid into the Y axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowOrder {
    /// First image row is `y = 0`
    #[default]
    TopDown,
    /// Last image row is `y = 0` (bottom-left origin)
    BottomUp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_rules_differ_only_on_even_ties() {
        assert_eq!(RoundingRule::HalfAwayFromZero.apply(2.5), 3.0);
        assert_eq!(RoundingRule::HalfToEven.apply(2.5), 2.0);
        assert_eq!(RoundingRule::HalfAwayFromZero.apply(3.5), 4.0);
        assert_eq!(RoundingRule::HalfToEven.apply(3.5), 4.0);
        assert_eq!(RoundingRule::HalfAwayFromZero.apply(127.49), 127.0);
        assert_eq!(RoundingRule::HalfToEven.apply(127.51), 128.0);
    }

    #[test]
    fn default_options_pick_red_and_half_away() {
        assert_eq!(ChannelSelector::default(), ChannelSelector::Red);
        assert_eq!(ChannelSelector::default().rgba_index(), 0);
        assert_eq!(ChannelSelector::Alpha.rgba_index(), 3);
        assert_eq!(RoundingRule::default(), RoundingRule::HalfAwayFromZero);
        assert_eq!(RowOrder::default(), RowOrder::TopDown);
    }
}
